//! MySQL seeding.
//!
//! The fixture SQL is parsed very naively: one statement per line, blank
//! lines and `--` comments skipped. MySQL's own client-side parsing is not
//! used, so fixtures must keep every statement on a single line.
//!
//! `Database` is the seam the pipeline seeds through; `MySqlDatabase` is the
//! real server.

use std::fs;
use std::path::Path;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};
use tracing::{debug, info};

use crate::credentials::{DatabaseCredentials, validate_identifier};
use crate::error::{HarnessError, Result};

/// One statement from a fixture file, with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub line: usize,
    pub text: String,
}

/// Split fixture text into executable statements.
pub fn parse_sql_statements(text: &str) -> Vec<SqlStatement> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.starts_with("--") && !line.trim().is_empty())
        .map(|(idx, line)| SqlStatement {
            line: idx + 1,
            text: line.trim_end_matches('\r').to_string(),
        })
        .collect()
}

/// Open a connection. Without `with_database` no schema is selected, which
/// is what creating the database needs.
pub fn connect(credentials: &DatabaseCredentials, with_database: bool) -> Result<Conn> {
    let mut opts = OptsBuilder::new()
        .ip_or_hostname(Some(credentials.host.clone()))
        .tcp_port(credentials.port)
        .user(Some(credentials.username.clone()))
        .pass(Some(credentials.password.clone()));
    if with_database {
        opts = opts.db_name(Some(credentials.database.clone()));
    }
    debug!(
        "Connecting to MySQL at {}:{} (database={})",
        credentials.host,
        credentials.port,
        if with_database { credentials.database.as_str() } else { "<none>" }
    );
    Conn::new(opts).map_err(|e| {
        HarnessError::database(format!(
            "failed to connect to {}:{}: {}",
            credentials.host, credentials.port, e
        ))
    })
}

/// `CREATE DATABASE IF NOT EXISTS` for the configured database.
pub fn ensure_database_exists(credentials: &DatabaseCredentials) -> Result<()> {
    validate_identifier(&credentials.database)?;
    let mut conn = connect(credentials, false)?;
    let statement = format!("CREATE DATABASE IF NOT EXISTS `{}`", credentials.database);
    info!("{}", statement);
    conn.query_drop(statement)?;
    Ok(())
}

/// Execute every statement in `path` against the configured database.
pub fn execute_sql_file(credentials: &DatabaseCredentials, path: &Path) -> Result<usize> {
    let text = fs::read_to_string(path).map_err(|e| {
        HarnessError::database(format!("failed to read {}: {}", path.display(), e))
    })?;
    let statements = parse_sql_statements(&text);
    info!(
        "Executing {} statement(s) from {}",
        statements.len(),
        path.display()
    );

    let mut conn = connect(credentials, true)?;
    for statement in &statements {
        conn.query_drop(&statement.text).map_err(|e| {
            HarnessError::database(format!(
                "{}:{}: {}",
                path.display(),
                statement.line,
                e
            ))
        })?;
    }
    Ok(statements.len())
}

/// The two things a run does to the database.
pub trait Database {
    fn ensure_database_exists(&self, credentials: &DatabaseCredentials) -> Result<()>;

    /// Returns the number of statements executed.
    fn execute_sql_file(&self, credentials: &DatabaseCredentials, path: &Path) -> Result<usize>;
}

/// A MySQL server reached over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDatabase;

impl Database for MySqlDatabase {
    fn ensure_database_exists(&self, credentials: &DatabaseCredentials) -> Result<()> {
        ensure_database_exists(credentials)
    }

    fn execute_sql_file(&self, credentials: &DatabaseCredentials, path: &Path) -> Result<usize> {
        execute_sql_file(credentials, path)
    }
}
