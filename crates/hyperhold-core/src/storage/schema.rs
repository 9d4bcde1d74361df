//! SQLite schema for the link store
//!
//! Creation is idempotent (`IF NOT EXISTS`) and default rows are seeded with
//! `INSERT OR IGNORE`, so user edits to seeded rows survive re-initialization.

use rusqlite::{params, Connection, Result};
use tracing::debug;

use crate::models::{default_categories, Setting, Settings};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS links (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            domain TEXT NOT NULL,
            favicon TEXT,
            category TEXT NOT NULL,
            createdAt INTEGER NOT NULL,
            updatedAt INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            isDefault INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Listing order and category filter
        CREATE INDEX IF NOT EXISTS idx_links_updated_at ON links(updatedAt);
        CREATE INDEX IF NOT EXISTS idx_links_category ON links(category);
        "#,
    )?;
    debug!("Tables created");

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Seed default categories and settings without touching existing rows
pub fn seed_defaults(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO categories (id, name, color, isDefault) VALUES (?, ?, ?, ?)",
    )?;
    for category in default_categories() {
        stmt.execute(params![
            category.id,
            category.name,
            category.color,
            category.is_default
        ])?;
    }
    debug!("Default categories seeded");

    let defaults = Settings::default();
    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)",
        params![Setting::DARK_MODE_KEY, defaults.dark_mode.as_str()],
    )?;
    debug!("Default settings seeded");

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
