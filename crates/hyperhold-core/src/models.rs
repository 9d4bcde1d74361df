//! Data models for HyperHold
//!
//! Defines the records the store persists (Link, Category, Setting) and the
//! typed settings view handed to the rest of the application.
//!
//! Timestamps are milliseconds since the Unix epoch, matching the integer
//! columns in the SQLite schema.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::helpers::{extract_domain, favicon_url, generate_id, normalize_url};

/// Id of the reserved category meaning "no filter"
pub const ALL_CATEGORY_ID: &str = "all";

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A saved URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Unique identifier
    pub id: String,
    /// Normalized absolute URL
    pub url: String,
    /// Display title (the domain when the user gave none)
    pub title: String,
    /// Free-form description, possibly empty
    pub description: String,
    /// Hostname without a leading "www."
    pub domain: String,
    /// Favicon fetch URL, or empty when no domain could be derived
    pub favicon: String,
    /// Owning category id ("all" when uncategorized)
    pub category: String,
    /// When this link was created (ms)
    pub created_at: i64,
    /// When this link was last updated (ms)
    pub updated_at: i64,
}

impl Link {
    /// Build a new link from raw user input
    ///
    /// Normalizes the URL, derives domain and favicon, defaults a blank
    /// title to the domain and stamps both timestamps with the same instant.
    pub fn from_input(url: &str, title: &str, description: &str, category: &str) -> Self {
        let category = match category.trim() {
            "" => ALL_CATEGORY_ID.to_string(),
            c => c.to_string(),
        };
        let now = now_millis();

        let mut link = Self {
            id: generate_id(),
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            domain: String::new(),
            favicon: String::new(),
            category,
            created_at: now,
            updated_at: now,
        };
        link.normalize();
        link
    }

    /// Re-derive the URL-dependent fields after `url` or `title` changed
    pub fn normalize(&mut self) {
        self.url = normalize_url(&self.url);
        self.domain = extract_domain(&self.url);
        self.favicon = if self.domain.is_empty() {
            String::new()
        } else {
            favicon_url(&self.domain)
        };
        let title = self.title.trim();
        self.title = if title.is_empty() {
            self.domain.clone()
        } else {
            title.to_string()
        };
    }

    /// Stamp a new `updated_at`
    ///
    /// The new value is strictly greater than the previous one even when the
    /// wall clock has not advanced (or went backwards).
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1);
    }

    /// Whether this link belongs to `category` ("all" matches every link)
    pub fn in_category(&self, category: &str) -> bool {
        category == ALL_CATEGORY_ID || self.category == category
    }
}

/// A named, colored grouping of links
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Display color token (e.g. "#FF9500")
    pub color: String,
    /// Seeded at first initialization rather than user-created
    pub is_default: bool,
}

impl Category {
    /// Create a user category
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            is_default: false,
        }
    }

    /// Whether this is the reserved "all" category
    pub fn is_protected(&self) -> bool {
        self.id == ALL_CATEGORY_ID
    }
}

/// Categories seeded on first store initialization
pub fn default_categories() -> Vec<Category> {
    [
        (ALL_CATEGORY_ID, "All", "#007AFF"),
        ("development", "Development", "#FF9500"),
        ("news", "News", "#FF3B30"),
        ("tutorials", "Tutorials", "#34C759"),
        ("design", "Design", "#AF52DE"),
    ]
    .into_iter()
    .map(|(id, name, color)| Category {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        is_default: true,
    })
    .collect()
}

/// Appearance preference
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DarkMode {
    Light,
    Dark,
    /// Follow the system appearance
    #[default]
    System,
}

impl DarkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DarkMode::Light => "light",
            DarkMode::Dark => "dark",
            DarkMode::System => "system",
        }
    }
}

impl fmt::Display for DarkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DarkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(DarkMode::Light),
            "dark" => Ok(DarkMode::Dark),
            "system" => Ok(DarkMode::System),
            other => Err(format!("unknown dark mode '{}'", other)),
        }
    }
}

/// Typed view of the settings table
///
/// Missing keys fall back to the `Default` values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub dark_mode: DarkMode,
    pub app_lock: bool,
    pub biometric_auth: bool,
}

impl Settings {
    /// Apply one setting to this view
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::DarkMode(mode) => self.dark_mode = mode,
            Setting::AppLock(on) => self.app_lock = on,
            Setting::BiometricAuth(on) => self.biometric_auth = on,
        }
    }
}

/// A single setting update, with its logical type
///
/// Values are encoded to their canonical string form only at the store
/// boundary (see [`Setting::encode`] and [`Setting::decode`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    DarkMode(DarkMode),
    AppLock(bool),
    BiometricAuth(bool),
}

impl Setting {
    pub const DARK_MODE_KEY: &'static str = "darkMode";
    pub const APP_LOCK_KEY: &'static str = "appLock";
    pub const BIOMETRIC_AUTH_KEY: &'static str = "biometricAuth";

    /// Storage key
    pub fn key(&self) -> &'static str {
        match self {
            Setting::DarkMode(_) => Self::DARK_MODE_KEY,
            Setting::AppLock(_) => Self::APP_LOCK_KEY,
            Setting::BiometricAuth(_) => Self::BIOMETRIC_AUTH_KEY,
        }
    }

    /// Canonical stored value ("true"/"false" for booleans)
    pub fn encode(&self) -> String {
        match self {
            Setting::DarkMode(mode) => mode.as_str().to_string(),
            Setting::AppLock(on) | Setting::BiometricAuth(on) => on.to_string(),
        }
    }

    /// Decode a stored row
    ///
    /// Returns `None` for unknown keys or malformed values.
    pub fn decode(key: &str, value: &str) -> Option<Self> {
        match key {
            Self::DARK_MODE_KEY => value.parse().ok().map(Setting::DarkMode),
            Self::APP_LOCK_KEY => value.parse().ok().map(Setting::AppLock),
            Self::BIOMETRIC_AUTH_KEY => value.parse().ok().map(Setting::BiometricAuth),
            _ => None,
        }
    }
}

/// Active search/category filter of the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    pub query: String,
    pub category: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: ALL_CATEGORY_ID.to_string(),
        }
    }
}
