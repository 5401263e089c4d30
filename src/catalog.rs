//! Segment configuration catalog access.
//!
//! The cluster's topology lives in the coordinator's `gp_segment_configuration` relation. This
//! module reads it into a `GpArray`, and registers new instances with it. All database access
//! goes through the `CatalogClient` trait, which is implemented for `tokio_postgres::Client`.
//!
//! Registration issues one statement per segment, in order, without a surrounding transaction.
//! A failure part way leaves the earlier registrations committed; callers reconcile by reading
//! the catalog again.

use std::path::Path;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use crate::error::{BoxError, CatalogError, ConfError, TopologyError};
use crate::gparray::GpArray;
use crate::postgres::conf::get_config_value;
use crate::segment::{Role, Segment, SegmentSpec};

/// The relation holding the cluster's topology.
pub const SEGMENT_CONFIGURATION: &str = "gp_segment_configuration";
/// The database connected to when none is given.
pub const DEFAULT_DATABASE: &str = "template1";

/// Read every segment, coordinators first, primaries before mirrors.
pub const QUERY_SEGMENTS: &str = "SELECT dbid::int4, content::int4, role::text, preferred_role::text, mode::text, status::text, \
    port::int4, hostname, address, datadir FROM pg_catalog.gp_segment_configuration ORDER BY content ASC, role DESC";
/// Register the coordinator: $1 port, $2 hostname, $3 address, $4 data directory.
pub const ADD_COORDINATOR: &str = "SELECT pg_catalog.gp_add_segment(1::int2, -1::int2, 'p', 'p', 's', 'u', $1, $2, $3, $4)";
/// Register a primary: $1 hostname, $2 address, $3 port, $4 data directory.
pub const ADD_PRIMARY: &str = "SELECT pg_catalog.gp_add_segment_primary($1, $2, $3, $4)";
/// Register a mirror: $1 content, $2 hostname, $3 address, $4 port, $5 data directory.
///
/// The content id is sent as an int4 and narrowed by the server.
pub const ADD_MIRROR: &str = "SELECT pg_catalog.gp_add_segment_mirror($1::int4::int2, $2, $3, $4, $5)";
/// Shift the content ids assigned by `gp_add_segment_primary` down by one.
pub const RENUMBER_PRIMARY_CONTENTS: &str =
    "SET allow_system_table_mods=true; UPDATE gp_segment_configuration SET content = content - 1 WHERE content > 0;";

/// A raw row of the segment configuration relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentRecord {
    pub dbid: i32,
    pub content: i32,
    pub role: String,
    pub preferred_role: String,
    pub mode: String,
    pub status: String,
    pub port: i32,
    pub hostname: String,
    pub address: String,
    pub datadir: String,
}

impl SegmentRecord {
    /// Extract a record from a row returned by `QUERY_SEGMENTS`.
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            dbid: row.try_get(0)?,
            content: row.try_get(1)?,
            role: row.try_get(2)?,
            preferred_role: row.try_get(3)?,
            mode: row.try_get(4)?,
            status: row.try_get(5)?,
            port: row.try_get(6)?,
            hostname: row.try_get(7)?,
            address: row.try_get(8)?,
            datadir: row.try_get(9)?,
        })
    }
}

impl TryFrom<SegmentRecord> for Segment {
    type Error = TopologyError;

    fn try_from(rec: SegmentRecord) -> Result<Self, Self::Error> {
        Ok(Segment {
            role: Role::from_code(&rec.role, rec.dbid)?,
            preferred_role: Role::from_code(&rec.preferred_role, rec.dbid)?,
            dbid: rec.dbid,
            content: rec.content,
            mode: rec.mode,
            status: rec.status,
            port: rec.port,
            hostname: rec.hostname,
            address: rec.address,
            data_directory: rec.datadir,
        })
    }
}

/// A connection to the coordinator's catalog.
///
/// A client must not be shared by concurrent topology reads or registrations.
#[allow(async_fn_in_trait)]
pub trait CatalogClient {
    /// Run the given segment query, returning its raw rows.
    async fn query_segments(&self, query: &str) -> Result<Vec<SegmentRecord>, BoxError>;

    /// Execute a single parameterized statement, returning the number of rows affected.
    async fn execute_statement(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, BoxError>;

    /// Execute one or more unparameterized statements.
    async fn execute_batch(&self, statements: &str) -> Result<(), BoxError>;
}

impl CatalogClient for Client {
    async fn query_segments(&self, query: &str) -> Result<Vec<SegmentRecord>, BoxError> {
        let rows = self.query(query, &[]).await?;
        let records = rows.iter().map(SegmentRecord::from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn execute_statement(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, BoxError> {
        Ok(self.execute(statement, params).await?)
    }

    async fn execute_batch(&self, statements: &str) -> Result<(), BoxError> {
        Ok(self.batch_execute(statements).await?)
    }
}

/// Read the cluster's current topology from the catalog.
#[tracing::instrument(level = "debug", skip(client), err)]
pub async fn read_gparray<C: CatalogClient>(client: &C) -> Result<GpArray, CatalogError> {
    let records = client
        .query_segments(QUERY_SEGMENTS)
        .await
        .map_err(|source| CatalogError::Query {
            relation: SEGMENT_CONFIGURATION,
            source,
        })?;
    tracing::debug!(rows = records.len(), "read {}", SEGMENT_CONFIGURATION);
    let segments = records.into_iter().map(Segment::try_from).collect::<Result<Vec<_>, _>>()?;
    Ok(GpArray::new(segments)?)
}

/// Register the coordinator with the catalog.
#[tracing::instrument(level = "debug", skip(client, seg), fields(host = %seg.hostname, port = seg.port))]
pub async fn register_coordinator<C: CatalogClient>(client: &C, seg: &SegmentSpec) -> Result<(), CatalogError> {
    exec(client, ADD_COORDINATOR, &[&seg.port, &seg.hostname, &seg.address, &seg.data_directory]).await?;
    tracing::info!("registered coordinator");
    Ok(())
}

/// Register the given primaries with the catalog, then renumber their content ids.
///
/// Primaries are numbered by the catalog in registration order.
#[tracing::instrument(level = "debug", skip(client, segs), fields(count = segs.len()))]
pub async fn register_primary_segments<C: CatalogClient>(client: &C, segs: &[SegmentSpec]) -> Result<(), CatalogError> {
    for seg in segs {
        exec(client, ADD_PRIMARY, &[&seg.hostname, &seg.address, &seg.port, &seg.data_directory]).await?;
        tracing::debug!(host = %seg.hostname, port = seg.port, "registered primary segment");
    }
    renumber_primary_contents(client).await?;
    tracing::info!("registered primary segments");
    Ok(())
}

/// Shift every positive content id down by one.
///
/// `gp_add_segment_primary` numbers contents from 1, whereas contents are numbered from 0. This
/// compensates for that after a fresh set of primaries has been registered, and must run exactly
/// once per `register_primary_segments`. It is not a general purpose renumbering.
pub async fn renumber_primary_contents<C: CatalogClient>(client: &C) -> Result<(), CatalogError> {
    client
        .execute_batch(RENUMBER_PRIMARY_CONTENTS)
        .await
        .map_err(|source| CatalogError::Exec {
            statement: RENUMBER_PRIMARY_CONTENTS.into(),
            source,
        })
}

/// Register the given mirrors with the catalog, each attached to its spec's content id.
#[tracing::instrument(level = "debug", skip(client, segs), fields(count = segs.len()))]
pub async fn register_mirror_segments<C: CatalogClient>(client: &C, segs: &[SegmentSpec]) -> Result<(), CatalogError> {
    for seg in segs {
        exec(client, ADD_MIRROR, &[&seg.content, &seg.hostname, &seg.address, &seg.port, &seg.data_directory]).await?;
        tracing::debug!(host = %seg.hostname, port = seg.port, content = seg.content, "registered mirror segment");
    }
    tracing::info!("registered mirror segments");
    Ok(())
}

async fn exec<C: CatalogClient>(client: &C, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, CatalogError> {
    client
        .execute_statement(statement, params)
        .await
        .map_err(|source| CatalogError::Exec {
            statement: statement.into(),
            source,
        })
}

/// Connection parameters for the coordinator's catalog.
///
/// This is the only way this crate opens database connections; pass it to whatever needs one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PgConnector {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// Connect in utility mode, bypassing the dispatcher.
    pub utility: bool,
}

impl PgConnector {
    /// Create a new instance.
    pub fn new(host: impl Into<String>, port: u16, dbname: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            user: user.into(),
            utility: false,
        }
    }

    /// Create an instance for the coordinator owning the given data directory.
    ///
    /// The port is read from the coordinator's `postgresql.conf`. An empty `dbname` selects
    /// `DEFAULT_DATABASE`.
    pub fn for_coordinator(data_dir: impl AsRef<Path>, host: &str, dbname: &str, user: &str) -> Result<Self, ConfError> {
        let value = get_config_value(data_dir, "port")?;
        let port = value.parse().map_err(|_| ConfError::InvalidValue {
            key: "port".into(),
            value: value.clone(),
        })?;
        let dbname = if dbname.is_empty() { DEFAULT_DATABASE } else { dbname };
        Ok(Self::new(host, port, dbname, user))
    }

    /// Set utility mode.
    pub fn utility(mut self, utility: bool) -> Self {
        self.utility = utility;
        self
    }

    /// The driver config for these parameters.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.host(&self.host).port(self.port).dbname(&self.dbname).user(&self.user);
        if self.utility {
            config.options("-c gp_role=utility");
        }
        config
    }

    /// Open a connection, spawning its driver onto the current runtime.
    #[tracing::instrument(level = "debug", skip(self), fields(host = %self.host, port = self.port, dbname = %self.dbname))]
    pub async fn connect(&self) -> Result<Client, CatalogError> {
        let (client, connection) = self
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(|err| CatalogError::Connect(err.into()))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = ?err, "error from coordinator connection");
            }
        });
        Ok(client)
    }
}
