//! Maintenance of the per-instance configuration files found in a data directory.

pub mod conf;
pub mod hba;

use std::fs;
use std::path::Path;

use crate::error::ConfError;

/// The runtime parameter file of an instance.
pub const POSTGRESQL_CONF_FILE: &str = "postgresql.conf";
/// The parameter file holding the instance's identity.
pub const INTERNAL_AUTO_CONF_FILE: &str = "internal.auto.conf";
/// The host-based access file of an instance.
pub const PG_HBA_CONF_FILE: &str = "pg_hba.conf";

/// Read the whole file at the given path as a list of lines.
pub(crate) fn read_lines(path: &Path) -> Result<Vec<String>, ConfError> {
    let content = fs::read_to_string(path).map_err(|err| ConfError::io(path, err))?;
    Ok(content.lines().map(String::from).collect())
}

/// Replace the contents of the file at the given path with the given lines.
pub(crate) fn write_lines(path: &Path, lines: &[String]) -> Result<(), ConfError> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|err| ConfError::io(path, err))
}
