//! Account and group existence checks.
//!
//! Existence is decided by parsing the system databases and comparing the
//! first field exactly, so `alice` never matches an `alice2` line.

use crate::error::Result;
use crate::session::Session;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: Option<u32>,
    pub home: String,
    pub shell: String,
}

/// Parse `/etc/passwd` formatted text. Malformed lines are skipped.
pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 || fields[0].is_empty() {
                return None;
            }
            Some(PasswdEntry {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok(),
                home: fields[5].to_string(),
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

/// Names from the first field of any colon-separated database.
pub fn entry_names(content: &str) -> Vec<&str> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split(':').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn has_entry(content: &str, name: &str) -> bool {
    entry_names(content).contains(&name)
}

pub fn user_exists(session: &mut Session<'_>, name: &str) -> Result<bool> {
    let output = session.query("getent passwd", true)?;
    Ok(output.success && has_entry(&output.stdout, name))
}

pub fn group_exists(session: &mut Session<'_>, name: &str) -> Result<bool> {
    let output = session.query("getent group", true)?;
    Ok(output.success && has_entry(&output.stdout, name))
}
