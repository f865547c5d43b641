//! PostgreSQL roles and databases.
//!
//! Every operation is a single command run as the `postgres` superuser,
//! without existence checks. A failure surfaces as `remote.command_failed`.

use crate::error::Result;
use crate::output::Outcome;
use crate::registry::{param, ParamSpec, TaskSpec};
use crate::session::Session;
use crate::utils::shell::quote_arg;
use crate::utils::validation::require_sql_identifier;

const SUPERUSER: &str = "postgres";

/// Quote a value as an SQL string literal.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Login role that may create databases but not roles.
pub fn create_postgres_user(s: &mut Session<'_>, username: &str, password: &str) -> Result<Outcome> {
    let username = require_sql_identifier(username, "username")?;
    let sql = format!(
        "CREATE ROLE {} PASSWORD {} NOSUPERUSER CREATEDB NOCREATEROLE INHERIT LOGIN;",
        username,
        sql_literal(password)
    );
    s.sudo_as(&format!("psql -c {}", quote_arg(&sql)), SUPERUSER)?;
    Ok(Outcome::Completed)
}

pub fn delete_postgres_user(s: &mut Session<'_>, username: &str) -> Result<Outcome> {
    let username = require_sql_identifier(username, "username")?;
    s.sudo_as(&format!("dropuser {}", username), SUPERUSER)?;
    Ok(Outcome::Completed)
}

/// UTF8 database cloned from `template0`, owned by `owner`.
pub fn create_postgres_db(s: &mut Session<'_>, owner: &str, dbname: &str) -> Result<Outcome> {
    let owner = require_sql_identifier(owner, "owner")?;
    let dbname = require_sql_identifier(dbname, "dbname")?;
    s.sudo_as(
        &format!("createdb -E UTF8 -T template0 -O {} {}", owner, dbname),
        SUPERUSER,
    )?;
    Ok(Outcome::Completed)
}

pub fn drop_postgres_db(s: &mut Session<'_>, dbname: &str) -> Result<Outcome> {
    let dbname = require_sql_identifier(dbname, "dbname")?;
    s.sudo_as(&format!("dropdb {}", dbname), SUPERUSER)?;
    Ok(Outcome::Completed)
}

const CREATE_USER_PARAMS: &[ParamSpec] = &[
    param("username", None, "Role name"),
    param("password", None, "Role password"),
];

const USER_PARAMS: &[ParamSpec] = &[param("username", None, "Role name")];

const CREATE_DB_PARAMS: &[ParamSpec] = &[
    param("owner", None, "Owning role"),
    param("dbname", None, "Database name"),
];

const DB_PARAMS: &[ParamSpec] = &[param("dbname", None, "Database name")];

pub fn tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "create_postgres_user",
            domain: "databases",
            summary: "Create a login role with CREATEDB",
            params: CREATE_USER_PARAMS,
            runner: |s, a| create_postgres_user(s, a.require("username")?, a.require("password")?),
        },
        TaskSpec {
            name: "delete_postgres_user",
            domain: "databases",
            summary: "Drop a role",
            params: USER_PARAMS,
            runner: |s, a| delete_postgres_user(s, a.require("username")?),
        },
        TaskSpec {
            name: "create_postgres_db",
            domain: "databases",
            summary: "Create a UTF8 database from template0",
            params: CREATE_DB_PARAMS,
            runner: |s, a| create_postgres_db(s, a.require("owner")?, a.require("dbname")?),
        },
        TaskSpec {
            name: "drop_postgres_db",
            domain: "databases",
            summary: "Drop a database",
            params: DB_PARAMS,
            runner: |s, a| drop_postgres_db(s, a.require("dbname")?),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_literal_doubles_quotes() {
        assert_eq!(sql_literal("pw123"), "'pw123'");
        assert_eq!(sql_literal("it's"), "'it''s'");
    }
}
