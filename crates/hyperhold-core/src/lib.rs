//! HyperHold Core Library
//!
//! This crate provides the local persistence and state layer of HyperHold,
//! a personal bookmark manager: links saved with a title, description and
//! category, browsed, filtered and searched offline.
//!
//! # Architecture
//!
//! - **SQLite**: source of truth for links, categories and settings
//! - **Coordinator**: in-memory projection of the store that the UI renders
//!
//! The coordinator only changes its projection after the store accepted the
//! write, so the two never diverge.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Arc::new(Store::open(&config)?);
//! let coordinator = Coordinator::new(store, ColorScheme::Light);
//! coordinator.initialize().await?;
//!
//! // Add a link
//! coordinator.add_link("example.com", "", "", "all").await?;
//!
//! // Read the projection
//! let links = coordinator.state().links;
//! ```
//!
//! # Modules
//!
//! - `state`: Application projection and coordinator (main entry point)
//! - `store`: Storage trait and its SQLite implementation
//! - `storage`: Connection manager, schema and queries
//! - `models`: Links, categories and settings
//! - `helpers`: URL and date helpers
//! - `appearance`: System light/dark scheme
//! - `auth`: App lock authentication
//! - `config`: Application configuration
//! - `logging`: File logging setup

pub mod appearance;
pub mod auth;
pub mod config;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;

pub use appearance::{Appearance, AppearanceSubscription, ColorScheme};
pub use auth::{Authenticator, DevicePrompt, LocalAuthenticator};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Category, DarkMode, Link, SearchFilters, Setting, Settings};
pub use state::{AppState, Coordinator};
pub use storage::{ConnectionManager, StorageError, StoreLocation};
pub use store::{LinkStore, Store};
