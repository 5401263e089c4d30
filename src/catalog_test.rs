use std::fs;
use std::sync::Mutex;

use anyhow::Result;
use tokio_postgres::types::ToSql;

use crate::catalog::*;
use crate::error::{BoxError, CatalogError, ConfError, TopologyError};
use crate::segment::SegmentSpec;

/// An in-memory catalog which records every statement it is given.
#[derive(Default)]
struct FakeCatalog {
    records: Vec<SegmentRecord>,
    /// Fail any statement starting with this text.
    fail_on: Option<&'static str>,
    log: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeCatalog {
    fn with_records(records: Vec<SegmentRecord>) -> Self {
        Self { records, ..Default::default() }
    }

    fn failing_on(fail_on: &'static str) -> Self {
        Self {
            fail_on: Some(fail_on),
            ..Default::default()
        }
    }

    fn statements(&self) -> Vec<(String, Vec<String>)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(&self, statement: &str, params: Vec<String>) -> Result<(), BoxError> {
        if let Ok(mut log) = self.log.lock() {
            log.push((statement.to_string(), params));
        }
        match self.fail_on {
            Some(prefix) if statement.starts_with(prefix) => Err("injected catalog failure".into()),
            _ => Ok(()),
        }
    }
}

impl CatalogClient for FakeCatalog {
    async fn query_segments(&self, query: &str) -> Result<Vec<SegmentRecord>, BoxError> {
        self.record(query, vec![])?;
        Ok(self.records.clone())
    }

    async fn execute_statement(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, BoxError> {
        self.record(statement, params.iter().map(|param| format!("{:?}", param)).collect())?;
        Ok(1)
    }

    async fn execute_batch(&self, statements: &str) -> Result<(), BoxError> {
        self.record(statements, vec![])
    }
}

fn record(dbid: i32, content: i32, role: &str) -> SegmentRecord {
    SegmentRecord {
        dbid,
        content,
        role: role.into(),
        preferred_role: role.into(),
        mode: "s".into(),
        status: "u".into(),
        port: 7000 + dbid,
        hostname: "cdw".into(),
        address: "cdw.local".into(),
        datadir: format!("/data/gpseg{}", content),
    }
}

fn spec(port: i32, content: i32) -> SegmentSpec {
    SegmentSpec {
        hostname: "sdw1".into(),
        address: "sdw1.local".into(),
        port,
        data_directory: format!("/data/gpseg{}", content),
        content,
    }
}

#[tokio::test]
async fn read_gparray_builds_topology() -> Result<()> {
    let catalog = FakeCatalog::with_records(vec![record(1, -1, "p"), record(3, 0, "p"), record(4, 0, "m")]);

    let gparray = read_gparray(&catalog).await?;

    let coordinator = gparray.coordinator().map(|seg| seg.dbid);
    assert!(coordinator == Some(1), "expected coordinator dbid 1, got {:?}", coordinator);
    let pair = gparray.segment_pair_for_content(0)?;
    assert!(pair.primary.dbid == 3, "expected primary dbid 3, got {}", pair.primary.dbid);
    assert!(pair.primary.data_directory == "/data/gpseg0", "unexpected data directory {}", pair.primary.data_directory);
    assert!(gparray.has_mirrors(), "expected has_mirrors to be true");
    let statements = catalog.statements();
    assert!(
        statements.len() == 1 && statements[0].0 == QUERY_SEGMENTS,
        "expected a single segment query, got {:?}",
        statements
    );

    Ok(())
}

#[tokio::test]
async fn read_gparray_rejects_unknown_role_codes() -> Result<()> {
    let catalog = FakeCatalog::with_records(vec![record(1, -1, "p"), record(2, 0, "x")]);

    let res = read_gparray(&catalog).await;

    assert!(
        matches!(res, Err(CatalogError::Topology(TopologyError::MalformedSegment { dbid: 2 }))),
        "expected MalformedSegment for dbid 2, got {:?}",
        res
    );
    Ok(())
}

#[tokio::test]
async fn read_gparray_surfaces_invalid_topology() -> Result<()> {
    let catalog = FakeCatalog::with_records(vec![record(1, -1, "p"), record(3, 0, "p"), record(4, 0, "p")]);

    let res = read_gparray(&catalog).await;

    assert!(
        matches!(res, Err(CatalogError::Topology(TopologyError::InvalidPairForContent { content: 0 }))),
        "expected InvalidPairForContent for content 0, got {:?}",
        res
    );
    Ok(())
}

#[tokio::test]
async fn read_gparray_wraps_query_failures() -> Result<()> {
    let catalog = FakeCatalog::failing_on("SELECT dbid");

    let res = read_gparray(&catalog).await;

    match res {
        Err(err @ CatalogError::Query { .. }) => {
            let msg = err.to_string();
            assert!(msg.contains(SEGMENT_CONFIGURATION), "expected error to name the relation, got {}", msg);
            let source = std::error::Error::source(&err).map(|source| source.to_string());
            assert!(
                source.as_deref() == Some("injected catalog failure"),
                "expected the underlying error to be preserved, got {:?}",
                source
            );
        }
        other => panic!("expected a query error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn register_coordinator_issues_single_statement() -> Result<()> {
    let catalog = FakeCatalog::default();

    register_coordinator(&catalog, &spec(5432, -1)).await?;

    let statements = catalog.statements();
    assert!(statements.len() == 1, "expected 1 statement, got {:?}", statements);
    assert!(statements[0].0 == ADD_COORDINATOR, "unexpected statement {}", statements[0].0);
    let expected: Vec<String> = vec!["5432".into(), "\"sdw1\"".into(), "\"sdw1.local\"".into(), "\"/data/gpseg-1\"".into()];
    assert!(statements[0].1 == expected, "unexpected params {:?}", statements[0].1);
    Ok(())
}

#[tokio::test]
async fn register_primaries_renumbers_after_all_inserts() -> Result<()> {
    let catalog = FakeCatalog::default();

    register_primary_segments(&catalog, &[spec(7002, 0), spec(7003, 1)]).await?;

    let statements: Vec<String> = catalog.statements().into_iter().map(|(stmt, _)| stmt).collect();
    let expected = vec![ADD_PRIMARY.to_string(), ADD_PRIMARY.to_string(), RENUMBER_PRIMARY_CONTENTS.to_string()];
    assert!(statements == expected, "unexpected statements {:?}", statements);
    Ok(())
}

#[tokio::test]
async fn register_primaries_stops_at_first_failure() -> Result<()> {
    let catalog = FakeCatalog::failing_on("SELECT pg_catalog.gp_add_segment_primary");

    let res = register_primary_segments(&catalog, &[spec(7002, 0), spec(7003, 1)]).await;

    assert!(matches!(res, Err(CatalogError::Exec { .. })), "expected Exec error, got {:?}", res);
    let statements = catalog.statements();
    assert!(statements.len() == 1, "expected no statement after the failure, got {:?}", statements);
    Ok(())
}

#[tokio::test]
async fn register_primaries_reports_renumber_failure() -> Result<()> {
    let catalog = FakeCatalog::failing_on("SET allow_system_table_mods");

    let res = register_primary_segments(&catalog, &[spec(7002, 0)]).await;

    match res {
        Err(CatalogError::Exec { statement, .. }) => {
            assert!(statement == RENUMBER_PRIMARY_CONTENTS, "expected renumbering to fail, got {}", statement)
        }
        other => panic!("expected an Exec error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn register_mirrors_passes_content_ids() -> Result<()> {
    let catalog = FakeCatalog::default();

    register_mirror_segments(&catalog, &[spec(8002, 0), spec(8003, 1)]).await?;

    let statements = catalog.statements();
    assert!(statements.len() == 2, "expected 2 statements, got {:?}", statements);
    for (idx, (stmt, params)) in statements.iter().enumerate() {
        assert!(stmt == ADD_MIRROR, "unexpected statement {}", stmt);
        assert!(params[0] == idx.to_string(), "expected content {} first, got {:?}", idx, params);
    }
    Ok(())
}

#[test]
fn connector_for_coordinator_reads_port() -> Result<()> {
    let tmpdir = tempfile::tempdir()?;
    fs::write(tmpdir.path().join(crate::postgres::POSTGRESQL_CONF_FILE), "port = 5432\nport = 7000\n")?;

    let connector = PgConnector::for_coordinator(tmpdir.path(), "cdw", "", "gpadmin")?.utility(true);

    let expected = PgConnector {
        host: "cdw".into(),
        port: 7000,
        dbname: DEFAULT_DATABASE.into(),
        user: "gpadmin".into(),
        utility: true,
    };
    assert!(connector == expected, "unexpected connector {:?}", connector);
    let options = connector.pg_config().get_options().map(String::from);
    assert!(options.as_deref() == Some("-c gp_role=utility"), "unexpected options {:?}", options);
    Ok(())
}

#[test]
fn connector_for_coordinator_rejects_bad_port() -> Result<()> {
    let tmpdir = tempfile::tempdir()?;
    fs::write(tmpdir.path().join(crate::postgres::POSTGRESQL_CONF_FILE), "port = 'abc'\n")?;

    let res = PgConnector::for_coordinator(tmpdir.path(), "cdw", "postgres", "gpadmin");

    assert!(matches!(res, Err(ConfError::InvalidValue { .. })), "expected InvalidValue, got {:?}", res);
    Ok(())
}
