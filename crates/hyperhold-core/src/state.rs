//! Application state coordination
//!
//! [`AppState`] is the in-memory projection the presentation layer renders.
//! [`Coordinator`] owns it, turns user intents into [`LinkStore`] calls and
//! folds each result back into the projection in a single update, so a
//! subscriber never observes `links` and `all_links` disagreeing.
//!
//! Nothing is applied to the projection until the store call succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::appearance::{resolve_dark_mode, AppearanceSubscription, ColorScheme};
use crate::error::{Error, Result};
use crate::helpers::validate_url;
use crate::models::{Category, Link, SearchFilters, Setting, Settings, ALL_CATEGORY_ID};
use crate::storage::StorageResult;
use crate::store::LinkStore;

/// Snapshot of everything the UI renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Current view: filtered, searched or full, newest first
    pub links: Vec<Link>,
    /// Every stored link, newest first
    pub all_links: Vec<Link>,
    pub categories: Vec<Category>,
    pub settings: Settings,
    pub search_filters: SearchFilters,
    pub is_loading: bool,
    /// `settings.dark_mode` resolved against the system appearance
    pub is_dark_mode: bool,
    pub system_appearance: ColorScheme,
    /// Why the last initialization failed, if it did
    pub init_error: Option<String>,
}

impl AppState {
    /// Initial projection, before the store has been read
    pub fn new(system_appearance: ColorScheme) -> Self {
        let settings = Settings::default();
        Self {
            links: Vec::new(),
            all_links: Vec::new(),
            categories: Vec::new(),
            settings,
            search_filters: SearchFilters::default(),
            is_loading: true,
            is_dark_mode: resolve_dark_mode(settings.dark_mode, system_appearance),
            system_appearance,
            init_error: None,
        }
    }

    /// Number of links per category id
    ///
    /// Counted from `all_links`, so an active search or filter does not
    /// change the result. "all" counts every link.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        self.categories
            .iter()
            .map(|c| (c.id.clone(), self.count_for(&c.id)))
            .collect()
    }

    /// Number of links in one category
    pub fn count_for(&self, category: &str) -> usize {
        self.all_links
            .iter()
            .filter(|link| link.in_category(category))
            .count()
    }

    /// Record a new system scheme; returns whether anything changed
    pub fn apply_system_appearance(&mut self, scheme: ColorScheme) -> bool {
        let is_dark_mode = resolve_dark_mode(self.settings.dark_mode, scheme);
        let changed = self.system_appearance != scheme || self.is_dark_mode != is_dark_mode;
        self.system_appearance = scheme;
        self.is_dark_mode = is_dark_mode;
        changed
    }

    fn link(&self, id: &str) -> Option<&Link> {
        self.all_links.iter().find(|link| link.id == id)
    }

    fn has_category(&self, id: &str) -> bool {
        id == ALL_CATEGORY_ID || self.categories.iter().any(|c| c.id == id)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ColorScheme::default())
    }
}

/// Clears `is_loading` if initialization is abandoned part way
struct LoadingGuard<'a>(&'a watch::Sender<AppState>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| std::mem::replace(&mut state.is_loading, false));
    }
}

/// Owner of the application projection
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn LinkStore>,
    state: Arc<watch::Sender<AppState>>,
}

impl Coordinator {
    /// Create a coordinator over an injected store
    pub fn new(store: Arc<dyn LinkStore>, system_appearance: ColorScheme) -> Self {
        let (state, _) = watch::channel(AppState::new(system_appearance));
        Self {
            store,
            state: Arc::new(state),
        }
    }

    /// Current projection snapshot
    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Receive every projection update
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Look up a link in the master list
    pub fn link(&self, id: &str) -> Option<Link> {
        self.state.borrow().link(id).cloned()
    }

    /// Initialize the store and load links, categories and settings
    ///
    /// `is_loading` is cleared however this ends. A failure is also recorded
    /// in `init_error` and returned; the rest of the projection is left as it
    /// was.
    pub async fn initialize(&self) -> Result<()> {
        info!("Starting app initialization");
        self.state.send_modify(|state| state.is_loading = true);
        let _loading = LoadingGuard(&self.state);

        match self.load_everything().await {
            Ok((links, categories, settings)) => {
                info!(
                    "Data loaded: {} links, {} categories",
                    links.len(),
                    categories.len()
                );
                self.state.send_modify(move |state| {
                    state.all_links = links.clone();
                    state.links = links;
                    state.categories = categories;
                    state.settings = settings;
                    state.is_dark_mode =
                        resolve_dark_mode(settings.dark_mode, state.system_appearance);
                    state.init_error = None;
                    state.is_loading = false;
                });
                info!("App initialization completed");
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize app: {}", e);
                let message = e.to_string();
                self.state.send_modify(move |state| {
                    state.init_error = Some(message);
                    state.is_loading = false;
                });
                Err(e.into())
            }
        }
    }

    async fn load_everything(&self) -> StorageResult<(Vec<Link>, Vec<Category>, Settings)> {
        self.store.initialize().await?;
        tokio::try_join!(
            self.store.list_links(None),
            self.store.list_categories(),
            self.store.get_settings(),
        )
    }

    // ==================== Links ====================

    /// Build, persist and prepend a new link to both lists
    pub async fn add_link(
        &self,
        url: &str,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<Link> {
        debug!("Adding link {}", url);
        let link = Link::from_input(url, title, description, category);
        self.validate(&link)?;

        self.store.put_link(&link).await?;

        let added = link.clone();
        self.state.send_modify(move |state| {
            state.links.insert(0, added.clone());
            state.all_links.insert(0, added);
        });
        info!("Link added: {}", link.id);
        Ok(link)
    }

    /// Persist an edited link and replace it by id in both lists
    ///
    /// The id and `created_at` are kept; `updated_at` moves strictly forward
    /// from both the given value and the one in the projection.
    pub async fn update_link(&self, link: Link) -> Result<Link> {
        let mut link = link;
        link.normalize();
        self.validate(&link)?;

        if let Some(current) = self.link(&link.id) {
            link.updated_at = link.updated_at.max(current.updated_at);
        }
        link.touch();

        self.store.put_link(&link).await?;

        let updated = link.clone();
        self.state.send_modify(move |state| {
            if let Some(slot) = state.links.iter_mut().find(|l| l.id == updated.id) {
                *slot = updated.clone();
            }
            match state.all_links.iter_mut().find(|l| l.id == updated.id) {
                Some(slot) => *slot = updated,
                None => state.all_links.insert(0, updated),
            }
        });
        info!("Link updated: {}", link.id);
        Ok(link)
    }

    /// Delete a link from the store and both lists
    ///
    /// Deleting an unknown id succeeds without touching the projection.
    pub async fn delete_link(&self, id: &str) -> Result<()> {
        self.store.delete_link(id).await?;

        let removed = self.state.send_if_modified(|state| {
            let before = state.links.len() + state.all_links.len();
            state.links.retain(|l| l.id != id);
            state.all_links.retain(|l| l.id != id);
            state.links.len() + state.all_links.len() != before
        });
        if removed {
            info!("Link deleted: {}", id);
        }
        Ok(())
    }

    /// Show links matching `query`; `all_links` is left untouched
    pub async fn search_links(&self, query: &str) -> Result<()> {
        let results = self.store.search_links(query).await?;
        debug!("Search for {:?} matched {} links", query, results.len());
        self.state.send_modify(move |state| state.links = results);
        Ok(())
    }

    /// Show links in `category` (all links for `None` or "all")
    pub async fn load_links(&self, category: Option<&str>) -> Result<()> {
        let links = self.store.list_links(category).await?;
        self.state.send_modify(move |state| state.links = links);
        Ok(())
    }

    /// Re-run the active view
    ///
    /// A non-blank filter query searches; otherwise the filter category is
    /// loaded.
    pub async fn refresh(&self) -> Result<()> {
        let filters = self.state.borrow().search_filters.clone();
        if filters.query.trim().is_empty() {
            self.load_links(Some(&filters.category)).await
        } else {
            self.search_links(&filters.query).await
        }
    }

    pub fn set_search_filters(&self, filters: SearchFilters) {
        self.state.send_modify(move |state| state.search_filters = filters);
    }

    fn validate(&self, link: &Link) -> Result<()> {
        if link.url.is_empty() {
            return Err(invalid("URL is required".to_string()));
        }
        if !validate_url(&link.url) {
            return Err(invalid(format!("Invalid URL: {}", link.url)));
        }
        if !self.state.borrow().has_category(&link.category) {
            return Err(invalid(format!("Unknown category: {}", link.category)));
        }
        Ok(())
    }

    // ==================== Categories ====================

    /// Persist a category and append it (or replace it by id)
    pub async fn add_category(&self, category: Category) -> Result<()> {
        if category.id.trim().is_empty() || category.name.trim().is_empty() {
            return Err(invalid("Category id and name are required".to_string()));
        }

        self.store.put_category(&category).await?;

        info!("Category saved: {}", category.id);
        self.state.send_modify(move |state| {
            match state.categories.iter_mut().find(|c| c.id == category.id) {
                Some(slot) => *slot = category,
                None => state.categories.push(category),
            }
        });
        Ok(())
    }

    /// Delete a category and move its links to "all"
    ///
    /// Returns how many links were moved. An active filter on the deleted
    /// category falls back to "all".
    pub async fn delete_category(&self, id: &str) -> Result<usize> {
        let moved = self.store.delete_category(id).await?;

        self.state.send_modify(|state| {
            state.categories.retain(|c| c.id != id);
            for link in state.links.iter_mut().chain(state.all_links.iter_mut()) {
                if link.category == id {
                    link.category = ALL_CATEGORY_ID.to_string();
                }
            }
            if state.search_filters.category == id {
                state.search_filters.category = ALL_CATEGORY_ID.to_string();
            }
        });
        info!("Category {} deleted, {} links moved to all", id, moved);
        Ok(moved)
    }

    // ==================== Settings ====================

    /// Persist one setting and apply it to the projection
    ///
    /// Changing the dark mode preference re-resolves `is_dark_mode` at once.
    pub async fn update_setting(&self, setting: Setting) -> Result<()> {
        self.store.put_setting(setting).await?;

        self.state.send_modify(|state| {
            state.settings.apply(setting);
            if let Setting::DarkMode(mode) = setting {
                state.is_dark_mode = resolve_dark_mode(mode, state.system_appearance);
            }
        });
        debug!("Setting {} updated to {}", setting.key(), setting.encode());
        Ok(())
    }

    // ==================== Appearance ====================

    /// Apply a system appearance change without writing settings
    pub fn set_system_appearance(&self, scheme: ColorScheme) {
        let changed = self
            .state
            .send_if_modified(|state| state.apply_system_appearance(scheme));
        if changed {
            debug!("System appearance is now {:?}", scheme);
        }
    }

    /// Follow an appearance source until the subscription is dropped
    ///
    /// The receiver's current value is applied immediately. Must be called
    /// from within a Tokio runtime.
    pub fn watch_appearance(
        &self,
        mut appearance: watch::Receiver<ColorScheme>,
    ) -> AppearanceSubscription {
        let initial = *appearance.borrow_and_update();
        self.set_system_appearance(initial);

        let coordinator = self.clone();
        let task = tokio::spawn(async move {
            while appearance.changed().await.is_ok() {
                let scheme = *appearance.borrow_and_update();
                coordinator.set_system_appearance(scheme);
            }
            debug!("Appearance source closed");
        });
        AppearanceSubscription::new(task)
    }
}

fn invalid(message: String) -> Error {
    warn!("Rejected input: {}", message);
    Error::Validation(message)
}
