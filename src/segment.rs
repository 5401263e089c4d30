//! Segment & role model.
//!
//! A `Segment` is one row of `gp_segment_configuration`: the identity and placement of a single
//! database instance. Its acting responsibilities are derived purely from its content id and its
//! current role, never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// The catalog code of the primary role.
pub const ROLE_PRIMARY: &str = "p";
/// The catalog code of the mirror role.
pub const ROLE_MIRROR: &str = "m";

/// The role a segment plays, either currently or as its preferred role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Role {
    #[serde(rename = "p")]
    Primary,
    #[serde(rename = "m")]
    Mirror,
}

impl Role {
    /// Parse the catalog code of a role for the segment with the given dbid.
    pub fn from_code(code: &str, dbid: i32) -> Result<Self, TopologyError> {
        match code.trim() {
            ROLE_PRIMARY => Ok(Role::Primary),
            ROLE_MIRROR => Ok(Role::Mirror),
            _ => Err(TopologyError::MalformedSegment { dbid }),
        }
    }

    /// The catalog code of this role.
    pub fn code(&self) -> &'static str {
        match self {
            Role::Primary => ROLE_PRIMARY,
            Role::Mirror => ROLE_MIRROR,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single database instance of the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Segment {
    /// Unique identity assigned by the catalog.
    pub dbid: i32,
    /// Data partition id; negative for the coordinator and standby.
    pub content: i32,
    /// The role this segment is currently acting in.
    pub role: Role,
    /// The role this segment reverts to after recovery.
    pub preferred_role: Role,
    pub mode: String,
    pub status: String,
    pub port: i32,
    pub hostname: String,
    pub address: String,
    pub data_directory: String,
}

impl Segment {
    /// Is this a coordinator-class instance.
    pub fn is_query_dispatcher(&self) -> bool {
        self.content < 0
    }

    /// Is this an instance holding a data partition.
    pub fn is_query_executor(&self) -> bool {
        self.content >= 0
    }

    pub fn is_acting_coordinator(&self) -> bool {
        self.is_query_dispatcher() && self.role == Role::Primary
    }

    pub fn is_acting_standby(&self) -> bool {
        self.is_query_dispatcher() && self.role == Role::Mirror
    }

    pub fn is_acting_primary(&self) -> bool {
        self.is_query_executor() && self.role == Role::Primary
    }

    pub fn is_acting_mirror(&self) -> bool {
        self.is_query_executor() && self.role == Role::Mirror
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dbid={} content={} role={} host={} port={} datadir={}",
            self.dbid, self.content, self.role, self.hostname, self.port, self.data_directory
        )
    }
}

/// The placement of a segment which is about to be registered with the catalog.
///
/// The catalog assigns the dbid. The content id is only consulted when registering mirrors,
/// which attach to an already numbered partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SegmentSpec {
    pub hostname: String,
    pub address: String,
    pub port: i32,
    pub data_directory: String,
    #[serde(default)]
    pub content: i32,
}
