//! Input validation primitives.
//!
//! Names that end up interpolated into remote command lines (accounts,
//! groups, database roles) are checked here before any command is issued.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static ACCOUNT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_.-]{0,31}$").unwrap());

static PATH_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,63}$").unwrap());

static SQL_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$-]{0,62}$").unwrap());

/// Require an Option to contain a value.
pub fn require<T>(opt: Option<T>, field: &str, message: &str) -> Result<T> {
    opt.ok_or_else(|| Error::validation_invalid_argument(field, message, None, None))
}

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(trimmed)
    }
}

/// Unix user or group name: lowercase, starts with a letter or underscore,
/// at most 32 characters.
pub fn require_account_name<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if ACCOUNT_NAME.is_match(value) {
        Ok(value)
    } else {
        Err(Error::validation_invalid_argument(
            field,
            "Must be a valid Unix account name (lowercase letters, digits, '_', '-', '.')",
            Some(value.to_string()),
            None,
        ))
    }
}

/// A single directory name joined under a home directory. Rejects empty
/// names, `.`, `..` and anything containing a separator.
pub fn require_path_component<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if PATH_COMPONENT.is_match(value) {
        Ok(value)
    } else {
        Err(Error::validation_invalid_argument(
            field,
            "Must be a single directory name (letters, digits, '_', '-', '.'; not '.' or '..')",
            Some(value.to_string()),
            None,
        ))
    }
}

/// PostgreSQL role or database name usable without quoting on the command line.
pub fn require_sql_identifier<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if SQL_IDENTIFIER.is_match(value) {
        Ok(value)
    } else {
        Err(Error::validation_invalid_argument(
            field,
            "Must be a valid PostgreSQL identifier",
            Some(value.to_string()),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_returns_value_when_some() {
        let result = require(Some("value"), "field", "msg");
        assert_eq!(result.unwrap(), "value");
    }

    #[test]
    fn require_returns_error_when_none() {
        let result: Result<&str> = require(None, "field", "Missing field");
        assert!(result.is_err());
    }

    #[test]
    fn require_non_empty_trims_whitespace() {
        let result = require_non_empty("  hello  ", "field", "msg");
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn require_non_empty_fails_for_whitespace_only() {
        let result = require_non_empty("   ", "field", "Cannot be empty");
        assert!(result.is_err());
    }

    #[test]
    fn account_names() {
        assert!(require_account_name("shop-master", "username").is_ok());
        assert!(require_account_name("_svc", "username").is_ok());
        assert!(require_account_name("Bob", "username").is_err());
        assert!(require_account_name("bob; rm -rf /", "username").is_err());
        assert!(require_account_name("", "username").is_err());
    }

    #[test]
    fn path_components() {
        assert!(require_path_component("shop", "project_name").is_ok());
        assert!(require_path_component("shop_v2.site", "project_name").is_ok());
        assert!(require_path_component("..", "project_name").is_err());
        assert!(require_path_component(".", "project_name").is_err());
        assert!(require_path_component("", "project_name").is_err());
        assert!(require_path_component("a/b", "project_name").is_err());
    }

    #[test]
    fn sql_identifiers() {
        assert!(require_sql_identifier("appdb", "dbname").is_ok());
        assert!(require_sql_identifier("App_DB", "dbname").is_ok());
        assert!(require_sql_identifier("app db", "dbname").is_err());
        assert!(require_sql_identifier("1db", "dbname").is_err());
    }
}
