//! Host-based access file (`pg_hba.conf`) maintenance.
//!
//! Entries are tab separated: `local|host  database  user  [address]  method`. Lines starting
//! with `#` are comments and are always preserved verbatim.

use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfError;
use crate::postgres::{read_lines, write_lines, PG_HBA_CONF_FILE};
use crate::user::UserLookup;

/// The database field granting access to every database.
const DATABASE_ALL: &str = "all";
/// The database field granting replication connections.
const DATABASE_REPLICATION: &str = "replication";
/// The user field granting access to every user.
const USER_ALL: &str = "all";

/// Rebuild `pg_hba.conf` in the coordinator's data directory.
///
/// See `build_coordinator_access_file`.
pub fn build_coordinator_pg_hba_conf(pgdata: impl AsRef<Path>, addrs: &[String], users: &impl UserLookup) -> Result<(), ConfError> {
    let pgdata = pgdata.as_ref();
    build_coordinator_access_file(pgdata.join(PG_HBA_CONF_FILE), addrs, users)?;
    tracing::info!(pgdata = %pgdata.display(), "successfully updated {}", PG_HBA_CONF_FILE);
    Ok(())
}

/// Rebuild the coordinator's access file at the given path.
///
/// Existing comments are kept and every existing entry is dropped. The current user is then
/// granted local access to all databases and to replication, followed by trusted host access to
/// all databases from `localhost` and each of the given addresses, and to replication from
/// `samehost` and each of the given addresses. Each entry is written once, so repeated addresses
/// and `localhost` among them are harmless.
pub fn build_coordinator_access_file(path: impl AsRef<Path>, addrs: &[String], users: &impl UserLookup) -> Result<(), ConfError> {
    let path = path.as_ref();
    let mut lines: Vec<String> = read_lines(path)?.into_iter().filter(|line| line.starts_with('#')).collect();
    let user = users.username()?;

    let mut entries = vec![
        local_entry(DATABASE_ALL, &user),
        local_entry(DATABASE_REPLICATION, &user),
        host_entry(DATABASE_ALL, &user, "localhost"),
    ];
    entries.extend(addrs.iter().map(|addr| host_entry(DATABASE_ALL, &user, addr)));
    entries.push(host_entry(DATABASE_REPLICATION, &user, "samehost"));
    entries.extend(addrs.iter().map(|addr| host_entry(DATABASE_REPLICATION, &user, addr)));
    for entry in entries {
        if !lines.contains(&entry) {
            lines.push(entry);
        }
    }

    write_lines(path, &lines)
}

/// Add access entries to `pg_hba.conf` in a segment's data directory.
///
/// See `append_segment_access_entries`.
pub fn update_segment_pg_hba_conf(
    pgdata: impl AsRef<Path>, addrs: &[String], replication: bool, coordinator_addrs: &[String], users: &impl UserLookup,
) -> Result<(), ConfError> {
    let pgdata = pgdata.as_ref();
    tracing::info!(pgdata = %pgdata.display(), "starting to update {}", PG_HBA_CONF_FILE);
    append_segment_access_entries(pgdata.join(PG_HBA_CONF_FILE), addrs, replication, coordinator_addrs, users)?;
    tracing::info!(pgdata = %pgdata.display(), "successfully updated {}", PG_HBA_CONF_FILE);
    Ok(())
}

/// Append access entries to a segment's access file at the given path.
///
/// Every coordinator address is granted access for all users, then every given address is
/// granted access for the current user, followed by replication access from `samehost` and each
/// given address when `replication` is set.
///
/// Entries already present in the file, compared with whitespace normalized, are not added
/// again. Existing lines are never modified or removed.
pub fn append_segment_access_entries(
    path: impl AsRef<Path>, addrs: &[String], replication: bool, coordinator_addrs: &[String], users: &impl UserLookup,
) -> Result<(), ConfError> {
    let path = path.as_ref();
    let user = users.username()?;

    let mut entries: Vec<String> = coordinator_addrs.iter().map(|addr| host_entry(DATABASE_ALL, USER_ALL, addr)).collect();
    entries.extend(addrs.iter().map(|addr| host_entry(DATABASE_ALL, &user, addr)));
    if replication {
        entries.push(host_entry(DATABASE_REPLICATION, &user, "samehost"));
        entries.extend(addrs.iter().map(|addr| host_entry(DATABASE_REPLICATION, &user, addr)));
    }

    let mut lines = read_lines(path)?;
    let mut seen: HashSet<String> = lines.iter().map(|line| normalize_entry(line)).collect();
    let before = lines.len();
    for entry in entries {
        if seen.insert(normalize_entry(&entry)) {
            lines.push(entry);
        }
    }
    tracing::debug!(path = %path.display(), added = lines.len() - before, "appending access entries");

    write_lines(path, &lines)
}

/// Normalize a line for duplicate detection.
///
/// Comments are compared verbatim, entries with every run of whitespace collapsed to a tab.
fn normalize_entry(line: &str) -> String {
    let line = line.trim();
    if line.starts_with('#') {
        return line.to_string();
    }
    line.split_whitespace().collect::<Vec<_>>().join("\t")
}

fn local_entry(database: &str, user: &str) -> String {
    format!("local\t{}\t{}\tident", database, user)
}

fn host_entry(database: &str, user: &str, addr: &str) -> String {
    format!("host\t{}\t{}\t{}\ttrust", database, user, addr)
}
