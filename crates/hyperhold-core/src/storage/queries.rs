//! SQL for every store operation
//!
//! Blocking functions over a single `rusqlite::Connection`. Each one is a
//! self-contained unit: writes run in their own transaction so a failure
//! leaves the affected row exactly as it was.
//!
//! User input only ever reaches SQLite as a bound parameter.

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, Row};
use tracing::{info, warn};

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init, seed_defaults, SCHEMA_VERSION};
use crate::models::{Category, Link, Setting, Settings, ALL_CATEGORY_ID};

/// Unicode-aware lowercase; SQLite's own `lower()` and `LIKE` fold ASCII only
const LOWER_FN: &str = "hh_lower";

const LINK_COLUMNS: &str =
    "id, url, title, description, domain, favicon, category, createdAt, updatedAt";

/// Register the SQL functions queries rely on
///
/// Must run once on every new connection.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        LOWER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}

/// Create tables and seed defaults
pub fn initialize(conn: &mut Connection) -> StorageResult<()> {
    let tx = conn.transaction().map_err(StorageError::Schema)?;
    if needs_init(&tx) {
        info!("Creating schema version {}", SCHEMA_VERSION);
    }
    init_schema(&tx).map_err(StorageError::Schema)?;
    seed_defaults(&tx).map_err(StorageError::Schema)?;
    tx.commit().map_err(StorageError::Schema)
}

// ==================== Links ====================

/// Insert or fully replace a link by id
pub fn put_link(conn: &mut Connection, link: &Link) -> StorageResult<()> {
    let write = |e| StorageError::write("save link", e);
    let tx = conn.transaction().map_err(write)?;
    tx.execute(
        r#"
        INSERT OR REPLACE INTO links
            (id, url, title, description, domain, favicon, category, createdAt, updatedAt)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            link.id,
            link.url,
            link.title,
            link.description,
            link.domain,
            link.favicon,
            link.category,
            link.created_at,
            link.updated_at,
        ],
    )
    .map_err(write)?;
    tx.commit().map_err(write)
}

/// All links, or those in `category` unless it is the "all" sentinel
///
/// Most recently updated first; ties broken by id so repeated reads of
/// unchanged data return the same order.
pub fn get_links(conn: &Connection, category: Option<&str>) -> StorageResult<Vec<Link>> {
    let read = |e| StorageError::read("load links", e);

    match category.filter(|c| *c != ALL_CATEGORY_ID) {
        Some(category) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM links WHERE category = ? ORDER BY updatedAt DESC, id ASC",
                    LINK_COLUMNS
                ))
                .map_err(read)?;
            let links = stmt
                .query_map(params![category], link_from_row)
                .map_err(read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read)?;
            Ok(links)
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM links ORDER BY updatedAt DESC, id ASC",
                    LINK_COLUMNS
                ))
                .map_err(read)?;
            let links = stmt
                .query_map([], link_from_row)
                .map_err(read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read)?;
            Ok(links)
        }
    }
}

/// Get a link by id
pub fn get_link(conn: &Connection, id: &str) -> StorageResult<Option<Link>> {
    let read = |e| StorageError::read("load link", e);
    let mut stmt = conn
        .prepare(&format!("SELECT {} FROM links WHERE id = ?", LINK_COLUMNS))
        .map_err(read)?;
    let mut rows = stmt.query(params![id]).map_err(read)?;

    match rows.next().map_err(read)? {
        Some(row) => Ok(Some(link_from_row(row).map_err(read)?)),
        None => Ok(None),
    }
}

/// Case-insensitive substring search over title, domain and description
///
/// Case folding covers all of Unicode, not just ASCII. `%`, `_` and `\` in
/// the query match literally. An empty query matches every link.
pub fn search_links(conn: &Connection, query: &str) -> StorageResult<Vec<Link>> {
    let read = |e| StorageError::read("search links", e);
    let pattern = format!("%{}%", escape_like(&query.to_lowercase()));

    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT {columns} FROM links
            WHERE {lower}(title) LIKE ?1 ESCAPE '\'
               OR {lower}(domain) LIKE ?1 ESCAPE '\'
               OR {lower}(description) LIKE ?1 ESCAPE '\'
            ORDER BY updatedAt DESC, id ASC
            "#,
            columns = LINK_COLUMNS,
            lower = LOWER_FN
        ))
        .map_err(read)?;

    let links = stmt
        .query_map(params![pattern], link_from_row)
        .map_err(read)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read)?;
    Ok(links)
}

/// Delete a link; returns whether a row was removed
pub fn delete_link(conn: &Connection, id: &str) -> StorageResult<bool> {
    let removed = conn
        .execute("DELETE FROM links WHERE id = ?", params![id])
        .map_err(|e| StorageError::write("delete link", e))?;
    Ok(removed > 0)
}

/// Get link count
pub fn link_count(conn: &Connection) -> StorageResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
        .map_err(|e| StorageError::read("count links", e))
}

// ==================== Categories ====================

/// All categories sorted by name
pub fn get_categories(conn: &Connection) -> StorageResult<Vec<Category>> {
    let read = |e| StorageError::read("load categories", e);
    let mut stmt = conn
        .prepare("SELECT id, name, color, isDefault FROM categories ORDER BY name, id")
        .map_err(read)?;

    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                is_default: row.get(3)?,
            })
        })
        .map_err(read)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read)?;
    Ok(categories)
}

/// Insert or replace a category by id
///
/// The reserved "all" category cannot be overwritten.
pub fn put_category(conn: &Connection, category: &Category) -> StorageResult<()> {
    if category.is_protected() {
        return Err(StorageError::ProtectedCategory(category.id.clone()));
    }
    conn.execute(
        "INSERT OR REPLACE INTO categories (id, name, color, isDefault) VALUES (?, ?, ?, ?)",
        params![category.id, category.name, category.color, category.is_default],
    )
    .map_err(|e| StorageError::write("save category", e))?;
    Ok(())
}

/// Delete a category, moving its links to "all"
///
/// Returns the number of links that were reassigned.
pub fn delete_category(conn: &mut Connection, id: &str) -> StorageResult<usize> {
    if id == ALL_CATEGORY_ID {
        return Err(StorageError::ProtectedCategory(id.to_string()));
    }

    let write = |e| StorageError::write("delete category", e);
    let tx = conn.transaction().map_err(write)?;
    let moved = tx
        .execute(
            "UPDATE links SET category = ? WHERE category = ?",
            params![ALL_CATEGORY_ID, id],
        )
        .map_err(write)?;
    tx.execute("DELETE FROM categories WHERE id = ?", params![id])
        .map_err(write)?;
    tx.commit().map_err(write)?;
    Ok(moved)
}

// ==================== Settings ====================

/// Typed settings, with defaults for missing keys
pub fn get_settings(conn: &Connection) -> StorageResult<Settings> {
    let read = |e| StorageError::read("load settings", e);
    let mut stmt = conn.prepare("SELECT key, value FROM settings").map_err(read)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(read)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read)?;

    let mut settings = Settings::default();
    for (key, value) in rows {
        match Setting::decode(&key, &value) {
            Some(setting) => settings.apply(setting),
            None => warn!("Ignoring unrecognized setting {}={}", key, value),
        }
    }
    Ok(settings)
}

/// Upsert one setting in its canonical string form
pub fn put_setting(conn: &Connection, setting: Setting) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
        params![setting.key(), setting.encode()],
    )
    .map_err(|e| StorageError::write("save setting", e))?;
    Ok(())
}

// ==================== Private helpers ====================

fn link_from_row(row: &Row) -> rusqlite::Result<Link> {
    Ok(Link {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        domain: row.get(4)?,
        favicon: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        category: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
