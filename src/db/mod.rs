use diesel::prelude::*;
use diesel::sql_query;
// The Connection alias below shadows the trait from the prelude
use diesel::Connection as ConnectionTrait;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::core::GenericResult;

pub mod models;
pub mod schema;

pub use diesel::sqlite::SqliteConnection as Connection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn connect(url: &str) -> GenericResult<Connection> {
    let mut connection = Connection::establish(url).map_err(|e| format!(
        "Unable to open {url:?} database: {e}"))?;

    // SQLite returns SQLITE_BUSY immediately by default when another
    // connection holds the write lock.
    sql_query("PRAGMA busy_timeout = 5000").execute(&mut connection).map_err(|e| format!(
        "Failed to configure the database connection: {e}"))?;

    connection.run_pending_migrations(MIGRATIONS).map_err(|e| format!(
        "Failed to prepare the database: {e}"))?;

    Ok(connection)
}

#[cfg(test)]
pub fn new_temporary() -> (tempfile::TempDir, Connection) {
    let temp_dir = tempfile::tempdir().unwrap();
    let url = temp_dir.path().join("engine.db");
    let connection = connect(url.to_str().unwrap()).unwrap();
    (temp_dir, connection)
}
