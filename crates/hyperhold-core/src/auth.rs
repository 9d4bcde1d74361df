//! App lock authentication
//!
//! The [`Authenticator`] contract is what the UI lifecycle layer calls; the
//! decision of *when* to lock (e.g. on returning to the foreground) is made
//! there. [`LocalAuthenticator`] applies the app-lock and biometric settings
//! from the live projection and delegates the actual prompt to the platform
//! through [`DevicePrompt`].

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Prompt shown when biometrics are used
pub const BIOMETRIC_REASON: &str = "Please authenticate to access HyperHold";

/// Prompt shown when falling back to the device passcode
pub const PASSCODE_REASON: &str = "Please enter your passcode to access HyperHold";

/// Authentication collaborator
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the app was marked as needing authentication
    fn is_auth_required(&self) -> bool;

    /// Authenticate the user if app lock is on; true means access is granted
    async fn require_authentication(&self) -> bool;

    fn mark_auth_required(&self);

    fn clear_auth_required(&self);
}

/// Platform authentication prompt
#[async_trait]
pub trait DevicePrompt: Send + Sync {
    /// Biometric hardware is present and enrolled
    async fn biometric_available(&self) -> bool;

    /// Show the system prompt; true on success
    ///
    /// The platform may fall back to the device passcode.
    async fn prompt(&self, reason: &str) -> bool;
}

/// Settings-driven [`Authenticator`]
pub struct LocalAuthenticator<P> {
    prompt: P,
    state: watch::Receiver<AppState>,
    auth_required: AtomicBool,
}

impl<P: DevicePrompt> LocalAuthenticator<P> {
    /// Create an authenticator reading settings from a projection receiver
    pub fn new(prompt: P, state: watch::Receiver<AppState>) -> Self {
        Self {
            prompt,
            state,
            auth_required: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<P: DevicePrompt> Authenticator for LocalAuthenticator<P> {
    fn is_auth_required(&self) -> bool {
        self.auth_required.load(Ordering::SeqCst)
    }

    async fn require_authentication(&self) -> bool {
        let settings = self.state.borrow().settings;

        if !settings.app_lock {
            return true;
        }

        if settings.biometric_auth {
            if self.prompt.biometric_available().await {
                debug!("Requesting biometric authentication");
                return self.log_result(self.prompt.prompt(BIOMETRIC_REASON).await);
            }
            debug!("Biometrics unavailable, falling back to passcode");
        }

        self.log_result(self.prompt.prompt(PASSCODE_REASON).await)
    }

    fn mark_auth_required(&self) {
        self.auth_required.store(true, Ordering::SeqCst);
    }

    fn clear_auth_required(&self) {
        self.auth_required.store(false, Ordering::SeqCst);
    }
}

impl<P> LocalAuthenticator<P> {
    fn log_result(&self, granted: bool) -> bool {
        if granted {
            info!("Authentication succeeded");
        } else {
            warn!("Authentication failed or was cancelled");
        }
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::ColorScheme;
    use crate::models::Setting;
    use std::sync::Mutex;

    struct FakePrompt {
        biometric: bool,
        accept: bool,
        reasons: Mutex<Vec<String>>,
    }

    impl FakePrompt {
        fn new(biometric: bool, accept: bool) -> Self {
            Self {
                biometric,
                accept,
                reasons: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DevicePrompt for FakePrompt {
        async fn biometric_available(&self) -> bool {
            self.biometric
        }

        async fn prompt(&self, reason: &str) -> bool {
            self.reasons.lock().unwrap().push(reason.to_string());
            self.accept
        }
    }

    fn state_with(settings: &[Setting]) -> watch::Sender<AppState> {
        let mut state = AppState::new(ColorScheme::Light);
        for setting in settings {
            state.settings.apply(*setting);
        }
        watch::channel(state).0
    }

    #[tokio::test]
    async fn test_no_prompt_without_app_lock() {
        let state = state_with(&[Setting::BiometricAuth(true)]);
        let auth = LocalAuthenticator::new(FakePrompt::new(true, false), state.subscribe());

        assert!(auth.require_authentication().await);
        assert!(auth.prompt.reasons.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_biometric_prompt() {
        let state = state_with(&[Setting::AppLock(true), Setting::BiometricAuth(true)]);
        let auth = LocalAuthenticator::new(FakePrompt::new(true, true), state.subscribe());

        assert!(auth.require_authentication().await);
        assert_eq!(*auth.prompt.reasons.lock().unwrap(), vec![BIOMETRIC_REASON]);
    }

    #[tokio::test]
    async fn test_passcode_fallback() {
        let state = state_with(&[Setting::AppLock(true), Setting::BiometricAuth(true)]);
        let auth = LocalAuthenticator::new(FakePrompt::new(false, false), state.subscribe());

        assert!(!auth.require_authentication().await);
        assert_eq!(*auth.prompt.reasons.lock().unwrap(), vec![PASSCODE_REASON]);
    }

    #[tokio::test]
    async fn test_follows_setting_changes() {
        let state = state_with(&[]);
        let auth = LocalAuthenticator::new(FakePrompt::new(true, false), state.subscribe());
        assert!(auth.require_authentication().await);

        state.send_modify(|s| s.settings.apply(Setting::AppLock(true)));
        assert!(!auth.require_authentication().await);
        assert_eq!(*auth.prompt.reasons.lock().unwrap(), vec![PASSCODE_REASON]);
    }

    #[test]
    fn test_auth_required_flag() {
        let state = state_with(&[]);
        let auth = LocalAuthenticator::new(FakePrompt::new(false, true), state.subscribe());

        assert!(!auth.is_auth_required());
        auth.mark_auth_required();
        assert!(auth.is_auth_required());
        auth.clear_auth_required();
        assert!(!auth.is_auth_required());
    }
}
