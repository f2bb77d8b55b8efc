use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tablier_api::db::{migrations, Built};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Directory holding uploaded restaurant logos, served at `/uploads`.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Write an uploaded logo to disk, returning the stored filename.
    pub fn write_logo(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.uploads_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(filename), bytes).context("writing logo file")?;
        Ok(())
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("tablier.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        data_dir: data_dir.to_path_buf(),
    })
}

/// In-memory database for tests. Same schema, no files on disk for the DB
/// itself; uploads still go under `data_dir`.
#[cfg(test)]
pub fn init_test_db(data_dir: &Path) -> Result<Db> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        data_dir: data_dir.to_path_buf(),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in migrations::MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ── sea-query → rusqlite bridge ─────────────────────────────────────────────

fn to_sql_value(v: &sea_query::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as R;
    use sea_query::Value as V;
    match v {
        V::Bool(b) => b.map(|b| R::Integer(b.into())).unwrap_or(R::Null),
        V::TinyInt(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::SmallInt(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::Int(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::BigInt(x) => x.map(R::Integer).unwrap_or(R::Null),
        V::TinyUnsigned(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::SmallUnsigned(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::Unsigned(x) => x.map(|x| R::Integer(x.into())).unwrap_or(R::Null),
        V::BigUnsigned(x) => x.map(|x| R::Integer(x as i64)).unwrap_or(R::Null),
        V::Float(x) => x.map(|x| R::Real(x.into())).unwrap_or(R::Null),
        V::Double(x) => x.map(R::Real).unwrap_or(R::Null),
        V::String(s) => s
            .as_deref()
            .map(|s| R::Text(s.clone()))
            .unwrap_or(R::Null),
        V::Char(c) => c.map(|c| R::Text(c.to_string())).unwrap_or(R::Null),
        V::Bytes(b) => b.as_deref().map(|b| R::Blob(b.clone())).unwrap_or(R::Null),
        #[allow(unreachable_patterns)]
        _ => R::Null,
    }
}

fn bind(values: &sea_query::Values) -> Vec<rusqlite::types::Value> {
    values.0.iter().map(to_sql_value).collect()
}

/// Execute a built statement, returning the affected row count.
pub fn sq_execute(conn: &Connection, built: Built) -> rusqlite::Result<usize> {
    let (sql, values) = built;
    conn.execute(&sql, rusqlite::params_from_iter(bind(&values)))
}

/// Run a built SELECT expected to yield one row.
pub fn sq_query_row<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    conn.query_row(&sql, rusqlite::params_from_iter(bind(&values)), f)
}

/// Run a built SELECT, collecting all rows.
pub fn sq_query_map<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bind(&values)), f)?;
    rows.collect()
}
