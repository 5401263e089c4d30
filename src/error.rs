//! Cluster management error abstractions.

use std::path::PathBuf;

use thiserror::Error;

/// A boxed error from a catalog client, usually a `tokio_postgres::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural errors raised while building or querying a cluster topology.
///
/// All of these are terminal for the build attempt which produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// No query executor segments were present in the input.
    #[error("no segments found in the cluster configuration")]
    NoSegmentsFound,
    /// Content ids do not all carry the same number of segments.
    #[error("content {content} has {found} segments, expected {expected} like every other content")]
    InconsistentPartitionSize { content: i32, expected: usize, found: usize },
    /// A content id with a single segment whose segment is not acting as primary.
    #[error("no primary segment found for content {content}")]
    NoPrimaryForContent { content: i32 },
    /// A content id whose two segments do not form a primary/mirror pair.
    #[error("invalid primary/mirror pair for content {content}")]
    InvalidPairForContent { content: i32 },
    /// A content id with more than two segments.
    #[error("content {content} has {found} segments, at most 2 are allowed")]
    TooManySegmentsPerContent { content: i32, found: usize },
    /// A segment whose role/content combination makes no sense.
    #[error("segment with dbid {dbid} has a malformed role or content")]
    MalformedSegment { dbid: i32 },
    /// More than one segment is acting as coordinator.
    #[error("segment with dbid {dbid} is a second acting coordinator")]
    DuplicateCoordinator { dbid: i32 },
    /// More than one segment is acting as standby.
    #[error("segment with dbid {dbid} is a second acting standby")]
    DuplicateStandby { dbid: i32 },
    /// The requested content id is not part of the topology.
    #[error("could not find a segment pair for content {content}")]
    ContentNotFound { content: i32 },
}

/// Errors from reading or writing the segment configuration catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog query failed.
    #[error("error querying {relation}")]
    Query {
        relation: &'static str,
        #[source]
        source: BoxError,
    },
    /// A catalog statement failed.
    #[error("error executing statement {statement:?}")]
    Exec {
        statement: String,
        #[source]
        source: BoxError,
    },
    /// The connection to the coordinator could not be established.
    #[error("error connecting to the coordinator")]
    Connect(#[source] BoxError),
    /// The catalog rows do not describe a valid cluster.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Errors from maintaining configuration files on disk.
#[derive(Debug, Error)]
pub enum ConfError {
    /// The file could not be opened, read or written.
    #[error("error accessing {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A parameter name could not be compiled into a match pattern.
    #[error("invalid config parameter pattern")]
    Pattern(#[from] regex::Error),
    /// The requested parameter is not assigned anywhere in the file.
    #[error("did not find any config parameter named {key:?} in {}", path.display())]
    ParamNotFound { key: String, path: PathBuf },
    /// A parameter holds a value of the wrong type.
    #[error("config parameter {key:?} has invalid value {value:?}")]
    InvalidValue { key: String, value: String },
    /// The current OS user could not be resolved.
    #[error("error resolving the current user")]
    CurrentUser(#[source] envy::Error),
}

impl ConfError {
    /// Build an I/O error for the given path.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
