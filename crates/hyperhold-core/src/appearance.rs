//! System appearance
//!
//! The platform reports its light/dark scheme through an [`Appearance`]
//! source. The coordinator listens on a receiver from that source for as long
//! as the returned [`AppearanceSubscription`] is alive.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::DarkMode;

/// Color scheme reported by the platform
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

/// Resolve the effective dark-mode flag
///
/// "system" follows the platform scheme; explicit preferences ignore it.
pub fn resolve_dark_mode(mode: DarkMode, system: ColorScheme) -> bool {
    match mode {
        DarkMode::Light => false,
        DarkMode::Dark => true,
        DarkMode::System => system == ColorScheme::Dark,
    }
}

/// Source of system appearance changes
///
/// The platform integration owns one of these and calls [`Appearance::set`]
/// whenever the OS scheme changes.
pub struct Appearance {
    scheme: watch::Sender<ColorScheme>,
}

impl Appearance {
    pub fn new(initial: ColorScheme) -> Self {
        let (scheme, _) = watch::channel(initial);
        Self { scheme }
    }

    /// Current scheme
    pub fn current(&self) -> ColorScheme {
        *self.scheme.borrow()
    }

    /// Report a new scheme; listeners are only woken when it differs
    pub fn set(&self, scheme: ColorScheme) {
        let changed = self.scheme.send_if_modified(|current| {
            if *current == scheme {
                return false;
            }
            *current = scheme;
            true
        });
        if changed {
            debug!("System appearance changed to {:?}", scheme);
        }
    }

    /// Subscribe to scheme changes
    pub fn subscribe(&self) -> watch::Receiver<ColorScheme> {
        self.scheme.subscribe()
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Self::new(ColorScheme::default())
    }
}

/// A live registration of the coordinator with an appearance source
///
/// Dropping it unregisters the listener, same as [`unsubscribe`](Self::unsubscribe).
pub struct AppearanceSubscription {
    task: JoinHandle<()>,
}

impl AppearanceSubscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop listening for appearance changes
    pub fn unsubscribe(self) {
        // Drop aborts the listener task
    }

    /// Whether the listener is still running
    ///
    /// Becomes false after unsubscribing or once the source is dropped.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AppearanceSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
