//! Runtime parameter (GUC) file maintenance.
//!
//! Parameter files hold one `key = value` (or `key value`) assignment per line, with `#`
//! starting a comment. Updates are merged line by line into the existing file so that
//! administrator comments and unrelated assignments survive untouched.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use regex::Regex;

use crate::error::ConfError;
use crate::postgres::{read_lines, write_lines, INTERNAL_AUTO_CONF_FILE, POSTGRESQL_CONF_FILE};

/// Update `postgresql.conf` in the given data directory with the given parameters.
///
/// See `update_conf_file` for the merge rules.
pub fn update_postgresql_conf(pgdata: impl AsRef<Path>, params: &HashMap<String, String>, overwrite: bool) -> Result<(), ConfError> {
    let pgdata = pgdata.as_ref();
    tracing::debug!(pgdata = %pgdata.display(), ?params, overwrite, "updating {}", POSTGRESQL_CONF_FILE);
    update_conf_file(pgdata.join(POSTGRESQL_CONF_FILE), params, overwrite)?;
    tracing::info!(pgdata = %pgdata.display(), "successfully updated {}", POSTGRESQL_CONF_FILE);
    Ok(())
}

/// Merge the given parameters into the parameter file at the given path.
///
/// Every non-comment line assigning one of the given keys is rewritten to the new value. When
/// `overwrite` is false the old line is kept as a trailing comment of the new assignment. A key
/// assigned on several lines is rewritten on each of them. Keys which are not assigned anywhere
/// are appended to the end of the file.
pub fn update_conf_file(path: impl AsRef<Path>, params: &HashMap<String, String>, overwrite: bool) -> Result<(), ConfError> {
    let path = path.as_ref();
    let lines = read_lines(path)?;

    // Compile everything up front, so that a bad key never leaves a partially written file.
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    let patterns = keys
        .iter()
        .map(|key| Ok((key.as_str(), Regex::new(&format!(r"^{}[\s=]+", regex::escape(key)))?)))
        .collect::<Result<Vec<_>, ConfError>>()?;

    let mut matched = vec![false; patterns.len()];
    let mut updated = Vec::with_capacity(lines.len() + patterns.len());
    for line in lines {
        if line.starts_with('#') {
            updated.push(line);
            continue;
        }
        let hit = patterns.iter().position(|(_, pattern)| pattern.is_match(&line));
        match hit {
            Some(idx) => {
                let key = patterns[idx].0;
                let assignment = format_assignment(key, &params[key]);
                matched[idx] = true;
                if overwrite {
                    updated.push(assignment);
                } else {
                    updated.push(format!("{} # {}", assignment, line));
                }
            }
            None => updated.push(line),
        }
    }

    for (idx, (key, _)) in patterns.iter().enumerate() {
        if !matched[idx] {
            updated.push(format_assignment(key, &params[*key]));
        }
    }

    write_lines(path, &updated)
}

/// Get the value of the given parameter from `postgresql.conf` in the given data directory.
pub fn get_config_value(pgdata: impl AsRef<Path>, key: &str) -> Result<String, ConfError> {
    read_value(pgdata.as_ref().join(POSTGRESQL_CONF_FILE), key)
}

/// Read the value assigned to the given key in the parameter file at the given path.
///
/// When the key is assigned several times, the last assignment wins, as it does for the server.
/// Surrounding single quotes are removed and doubled quotes within them are unescaped.
pub fn read_value(path: impl AsRef<Path>, key: &str) -> Result<String, ConfError> {
    let path = path.as_ref();
    let mut value = None;
    for line in read_lines(path)? {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let rest = match line.strip_prefix(key) {
            Some(rest) if rest.starts_with(|c: char| c.is_whitespace() || c == '=') => rest,
            _ => continue,
        };
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
        if let Some(found) = parse_value(rest) {
            value = Some(found);
        }
    }

    value.ok_or_else(|| ConfError::ParamNotFound {
        key: key.into(),
        path: path.into(),
    })
}

/// Record the dbid of an instance in `internal.auto.conf` in the given data directory, creating
/// the file if needed.
pub fn create_internal_conf(pgdata: impl AsRef<Path>, dbid: i32) -> Result<(), ConfError> {
    let path = pgdata.as_ref().join(INTERNAL_AUTO_CONF_FILE);
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|err| ConfError::io(&path, err))?;
    writeln!(file, "gp_dbid = {}", dbid).map_err(|err| ConfError::io(&path, err))?;
    tracing::info!(path = %path.display(), "successfully created {}", INTERNAL_AUTO_CONF_FILE);
    Ok(())
}

/// Extract the value at the start of the given text, which follows the key and any `=`.
fn parse_value(text: &str) -> Option<String> {
    if let Some(quoted) = text.strip_prefix('\'') {
        let mut value = String::with_capacity(quoted.len());
        let mut chars = quoted.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\'' {
                value.push(c);
            } else if chars.peek() == Some(&'\'') {
                chars.next();
                value.push(c);
            } else {
                break;
            }
        }
        return Some(value);
    }
    text.split(|c: char| c.is_whitespace() || c == '#')
        .next()
        .filter(|value| !value.is_empty())
        .map(String::from)
}

fn format_assignment(key: &str, value: &str) -> String {
    format!("{} = {}", key, quote_if_string(value))
}

/// Wrap the given value in single quotes unless it is a number.
///
/// Embedded single quotes are doubled.
pub fn quote_if_string(value: &str) -> String {
    if value.parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}
