//! Unified storage interface
//!
//! [`LinkStore`] is the contract the [`Coordinator`](crate::state::Coordinator)
//! talks to; [`Store`] is its SQLite implementation. Every call acquires the
//! shared handle from the [`ConnectionManager`], so the first call opens the
//! database and later calls reuse it.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open(&Config::load()?)?;
//! store.initialize().await?;
//!
//! let link = Link::from_input("example.com", "", "", "all");
//! store.put_link(&link).await?;
//!
//! let links = store.list_links(None).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::{Category, Link, Setting, Settings};
use crate::storage::{queries, ConnectionManager, StorageError, StorageResult};

/// Persistent storage for links, categories and settings
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Create the schema if absent and seed default rows
    async fn initialize(&self) -> StorageResult<()>;

    /// Insert or fully replace a link by id
    async fn put_link(&self, link: &Link) -> StorageResult<()>;

    /// Links in `category` (all links for `None` or "all"), newest first
    async fn list_links(&self, category: Option<&str>) -> StorageResult<Vec<Link>>;

    /// Case-insensitive substring match on title, domain or description
    async fn search_links(&self, query: &str) -> StorageResult<Vec<Link>>;

    /// Remove a link; unknown ids are a no-op
    async fn delete_link(&self, id: &str) -> StorageResult<()>;

    /// All categories sorted by name
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    /// Insert or replace a category by id
    async fn put_category(&self, category: &Category) -> StorageResult<()>;

    /// Delete a category, moving its links to "all"; returns how many moved
    async fn delete_category(&self, id: &str) -> StorageResult<usize>;

    /// Settings with defaults filled in
    async fn get_settings(&self) -> StorageResult<Settings>;

    /// Upsert one setting
    async fn put_setting(&self, setting: Setting) -> StorageResult<()>;
}

/// SQLite-backed [`LinkStore`]
#[derive(Clone)]
pub struct Store {
    connections: Arc<ConnectionManager>,
}

impl Store {
    /// Create a store for the configured database file
    ///
    /// Creates the data directory if needed. The database itself is opened
    /// lazily on first use.
    pub fn open(config: &Config) -> StorageResult<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self::with_manager(ConnectionManager::new(
            config.store_location(),
        )))
    }

    /// Create a store over a private in-memory database (for testing)
    pub fn in_memory() -> Self {
        Self::with_manager(ConnectionManager::in_memory())
    }

    /// Create a store over an existing connection manager
    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self {
            connections: Arc::new(manager),
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Get a link by id
    pub async fn get_link(&self, id: &str) -> StorageResult<Option<Link>> {
        let id = id.to_string();
        let db = self.connections.acquire().await?;
        db.run(move |conn| queries::get_link(conn, &id)).await
    }

    /// Get count of links
    pub async fn link_count(&self) -> StorageResult<i64> {
        let db = self.connections.acquire().await?;
        db.run(|conn| queries::link_count(conn)).await
    }
}

/// Log a failed operation before handing the error back
fn logged<T>(operation: &str, result: StorageResult<T>) -> StorageResult<T> {
    if let Err(ref e) = result {
        error!("{} failed: {}", operation, e);
    }
    result
}

#[async_trait]
impl LinkStore for Store {
    async fn initialize(&self) -> StorageResult<()> {
        info!("Initializing store at {}", self.connections.location());
        let db = logged("Open database", self.connections.acquire().await)?;
        logged("Store initialization", db.run(queries::initialize).await)?;
        info!("Store initialized");
        Ok(())
    }

    async fn put_link(&self, link: &Link) -> StorageResult<()> {
        let link = link.clone();
        let id = link.id.clone();
        let db = self.connections.acquire().await?;
        logged(
            "Save link",
            db.run(move |conn| queries::put_link(conn, &link)).await,
        )?;
        debug!("Link saved: {}", id);
        Ok(())
    }

    async fn list_links(&self, category: Option<&str>) -> StorageResult<Vec<Link>> {
        let category = category.map(str::to_string);
        let db = self.connections.acquire().await?;
        logged(
            "Load links",
            db.run(move |conn| queries::get_links(conn, category.as_deref()))
                .await,
        )
    }

    async fn search_links(&self, query: &str) -> StorageResult<Vec<Link>> {
        let query = query.to_string();
        let db = self.connections.acquire().await?;
        logged(
            "Search links",
            db.run(move |conn| queries::search_links(conn, &query)).await,
        )
    }

    async fn delete_link(&self, id: &str) -> StorageResult<()> {
        let owned = id.to_string();
        let db = self.connections.acquire().await?;
        let removed = logged(
            "Delete link",
            db.run(move |conn| queries::delete_link(conn, &owned)).await,
        )?;
        if !removed {
            debug!("Delete of unknown link {} ignored", id);
        }
        Ok(())
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let db = self.connections.acquire().await?;
        logged(
            "Load categories",
            db.run(|conn| queries::get_categories(conn)).await,
        )
    }

    async fn put_category(&self, category: &Category) -> StorageResult<()> {
        let category = category.clone();
        let db = self.connections.acquire().await?;
        logged(
            "Save category",
            db.run(move |conn| queries::put_category(conn, &category))
                .await,
        )
    }

    async fn delete_category(&self, id: &str) -> StorageResult<usize> {
        let id = id.to_string();
        let db = self.connections.acquire().await?;
        logged(
            "Delete category",
            db.run(move |conn| queries::delete_category(conn, &id)).await,
        )
    }

    async fn get_settings(&self) -> StorageResult<Settings> {
        let db = self.connections.acquire().await?;
        logged(
            "Load settings",
            db.run(|conn| queries::get_settings(conn)).await,
        )
    }

    async fn put_setting(&self, setting: Setting) -> StorageResult<()> {
        let db = self.connections.acquire().await?;
        logged(
            "Save setting",
            db.run(move |conn| queries::put_setting(conn, setting)).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DarkMode, ALL_CATEGORY_ID};
    use crate::storage::StoreLocation;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().join("data"),
            database_file: PathBuf::from("hyperhold.db"),
            log_file: None,
        }
    }

    async fn fresh_store() -> Store {
        let store = Store::in_memory();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_open_creates_data_dir_lazily_opens_db() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::open(&config).unwrap();
        assert!(config.data_dir.exists());
        assert!(!store.connections().is_open());

        store.initialize().await.unwrap();
        assert!(store.connections().is_open());
        assert!(config.database_path().exists());
    }

    #[tokio::test]
    async fn test_data_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let link = Link::from_input("example.com", "Example", "", "news");
        {
            let store = Store::open(&config).unwrap();
            store.initialize().await.unwrap();
            store.put_link(&link).await.unwrap();
            store.put_setting(Setting::DarkMode(DarkMode::Dark)).await.unwrap();
        }

        let store = Store::open(&config).unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.get_link(&link.id).await.unwrap(), Some(link));
        // Re-seeding must not reset user settings
        assert_eq!(store.get_settings().await.unwrap().dark_mode, DarkMode::Dark);
    }

    #[tokio::test]
    async fn test_fresh_store_defaults() {
        let store = fresh_store().await;

        let categories = store.list_categories().await.unwrap();
        assert_eq!(categories.len(), 5);
        assert!(categories.iter().any(|c| c.id == ALL_CATEGORY_ID));

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.dark_mode, DarkMode::System);
        assert!(!settings.app_lock);
        assert!(!settings.biometric_auth);
    }

    #[tokio::test]
    async fn test_link_round_trip_through_store() {
        let store = fresh_store().await;
        let mut link = Link::from_input("rust-lang.org", "Rust", "Systems language", "development");
        store.put_link(&link).await.unwrap();

        link.title = "The Rust Language".to_string();
        link.touch();
        store.put_link(&link).await.unwrap();

        assert_eq!(store.link_count().await.unwrap(), 1);
        let listed = store.list_links(Some("development")).await.unwrap();
        assert_eq!(listed, vec![link.clone()]);

        store.delete_link(&link.id).await.unwrap();
        assert!(store.list_links(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_link_is_noop() {
        let store = fresh_store().await;
        store
            .put_link(&Link::from_input("example.com", "", "", "all"))
            .await
            .unwrap();

        store.delete_link("does-not-exist").await.unwrap();
        assert_eq!(store.link_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_through_store() {
        let store = fresh_store().await;
        store
            .put_link(&Link::from_input("example.com", "Example Site", "", "all"))
            .await
            .unwrap();
        store
            .put_link(&Link::from_input("rust-lang.org", "Rust", "", "all"))
            .await
            .unwrap();

        let results = store.search_links("EXA").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Example Site");
    }

    #[tokio::test]
    async fn test_unavailable_store_reports_error() {
        let manager = ConnectionManager::new(StoreLocation::File(PathBuf::from(
            "/nonexistent-hyperhold-dir/sub/hyperhold.db",
        )));
        let store = Store::with_manager(manager);

        let err = store.list_links(None).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert_eq!(store.connections().open_attempts(), 1);

        // Not cached: a second call tries again
        let _ = store.initialize().await;
        assert_eq!(store.connections().open_attempts(), 2);
    }
}
