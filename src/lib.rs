//! Topology and configuration core for managing a Greenplum-style cluster.
//!
//! A cluster's topology is read from the coordinator's catalog into a `GpArray`, which
//! validates the primary/mirror pairing of every content id and offers the projections
//! orchestration code needs. The `postgres` module maintains the per-instance configuration
//! files which those projections feed.

pub mod catalog;
#[cfg(test)]
mod catalog_test;
pub mod config;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod gparray;
pub mod postgres;
pub mod segment;
pub mod user;

pub use crate::catalog::{read_gparray, CatalogClient, PgConnector};
pub use crate::config::Config;
pub use crate::error::{CatalogError, ConfError, TopologyError};
pub use crate::gparray::{GpArray, HbaTarget, SegmentPair};
pub use crate::segment::{Role, Segment, SegmentSpec};
pub use crate::user::{EnvUser, FixedUser, UserLookup};
