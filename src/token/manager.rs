//! Token Manager
//!
//! Caches the bearer token, refreshes it ahead of expiry and makes sure only
//! one login runs at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::HttpTransport;
use crate::error::AuthError;
use crate::flows::Authenticator;
use crate::types::{AccessToken, Credentials, LoginData};

/// Token manager configuration.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Buffer time before expiration to trigger refresh (default: 5 minutes).
    pub refresh_buffer: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_buffer: Duration::from_secs(300),
        }
    }
}

#[derive(Default)]
struct RefreshState {
    /// Outcome of the most recent failed login, replayed to callers that
    /// queued behind it.
    last_failure: Option<AuthError>,
}

/// Bearer token cache guarded by double-checked locking.
pub struct TokenManager {
    config: TokenManagerConfig,
    credentials: Option<Credentials>,
    authenticator: Arc<dyn Authenticator>,
    token: RwLock<Option<AccessToken>>,
    refresh_lock: tokio::sync::Mutex<RefreshState>,
    login_epoch: AtomicU64,
    login_data: Mutex<LoginData>,
}

impl TokenManager {
    pub fn new(
        config: TokenManagerConfig,
        credentials: Option<Credentials>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config,
            credentials,
            authenticator,
            token: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(RefreshState::default()),
            login_epoch: AtomicU64::new(0),
            login_data: Mutex::new(LoginData::default()),
        }
    }

    /// Seed the login data carried into the next login.
    pub fn with_login_data(self, login_data: LoginData) -> Self {
        if let Ok(mut current) = self.login_data.lock() {
            *current = login_data;
        }
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Snapshot of the data written by the last login.
    pub fn login_data(&self) -> LoginData {
        self.login_data
            .lock()
            .map(|data| data.clone())
            .unwrap_or_default()
    }

    /// Cached token, if it is outside the refresh window.
    fn cached(&self) -> Option<String> {
        let guard = self.token.read().ok()?;
        guard
            .as_ref()
            .filter(|token| !token.is_expired_within(self.config.refresh_buffer))
            .map(|token| token.secret().to_string())
    }

    fn store(&self, token: Option<AccessToken>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Drop the cached token so the next call logs in again.
    pub fn invalidate(&self) {
        debug!("Clearing cached access token");
        self.store(None);
    }

    /// Drop the cached token only if it is still the one a rejected call
    /// carried. Returns whether anything was cleared.
    pub fn invalidate_if_current(&self, used: &str) -> bool {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.as_ref().is_some_and(|token| token.secret() == used) {
            debug!("Clearing rejected access token");
            *guard = None;
            true
        } else {
            debug!("Rejected access token already replaced");
            false
        }
    }

    /// Return a usable token, logging in when none is cached.
    ///
    /// Without credentials this returns `Ok(None)` and calls go out
    /// anonymously. Callers that queued behind a failed login receive a
    /// replay of that failure instead of starting another login.
    pub async fn get_access_token(
        &self,
        transport: &dyn HttpTransport,
    ) -> Result<Option<String>, AuthError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        if let Some(token) = self.cached() {
            return Ok(Some(token));
        }

        let observed_epoch = self.login_epoch.load(Ordering::SeqCst);
        let mut state = self.refresh_lock.lock().await;

        if let Some(token) = self.cached() {
            debug!("Access token refreshed by a concurrent caller");
            return Ok(Some(token));
        }
        if self.login_epoch.load(Ordering::SeqCst) != observed_epoch {
            if let Some(failure) = &state.last_failure {
                debug!("Replaying concurrent login failure");
                return Err(failure.replay());
            }
        }

        info!("Access token missing or expiring, logging in");
        let mut login_data = self.login_data();
        let result = self
            .authenticator
            .login(transport, credentials, &mut login_data)
            .await;
        self.login_epoch.fetch_add(1, Ordering::SeqCst);
        // The flow may record the subject before a later step fails.
        if let Ok(mut current) = self.login_data.lock() {
            *current = login_data;
        }

        match result {
            Ok((access_token, expires_in)) => {
                if expires_in <= self.config.refresh_buffer.as_secs() {
                    warn!(expires_in, "Token lifetime is within the refresh buffer");
                }
                self.store(Some(AccessToken::new(
                    access_token.clone(),
                    Duration::from_secs(expires_in),
                )));
                state.last_failure = None;
                Ok(Some(access_token))
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                state.last_failure = Some(err.replay());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::error::InvalidAuthReason;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Issues `tok-N` tokens, optionally slowly or failing.
    struct CountingAuthenticator {
        logins: AtomicU32,
        expires_in: u64,
        delay: Duration,
        fail: bool,
    }

    impl CountingAuthenticator {
        fn new(expires_in: u64) -> Self {
            Self {
                logins: AtomicU32::new(0),
                expires_in,
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn count(&self) -> u32 {
            self.logins.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn login(
            &self,
            _transport: &dyn HttpTransport,
            _credentials: &Credentials,
            login_data: &mut LoginData,
        ) -> Result<(String, u64), AuthError> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(AuthError::invalid_auth(
                    "Invalid username or password",
                    InvalidAuthReason::InvalidCredentials,
                ));
            }
            login_data.sub = Some("user-sub".to_string());
            Ok((format!("tok-{}", n), self.expires_in))
        }
    }

    fn manager(auth: Arc<CountingAuthenticator>) -> TokenManager {
        TokenManager::new(
            TokenManagerConfig::default(),
            Some(Credentials::new("user@example.com", "pw")),
            auth,
        )
    }

    #[tokio::test]
    async fn test_anonymous_without_credentials() {
        let auth = Arc::new(CountingAuthenticator::new(3600));
        let manager = TokenManager::new(TokenManagerConfig::default(), None, auth.clone());

        let token = manager.get_access_token(&MockHttpTransport::new()).await.unwrap();
        assert_eq!(token, None);
        assert_eq!(auth.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_cached_until_refresh_window() {
        let auth = Arc::new(CountingAuthenticator::new(3600));
        let manager = manager(auth.clone());
        let transport = MockHttpTransport::new();

        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-1"));
        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-1"));
        assert_eq!(auth.count(), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-2"));
        assert_eq!(auth.count(), 2);
        assert_eq!(manager.login_data().sub.as_deref(), Some("user-sub"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let auth = Arc::new(CountingAuthenticator::new(3600));
        let manager = manager(auth.clone());
        let transport = MockHttpTransport::new();

        manager.get_access_token(&transport).await.unwrap();
        manager.invalidate();
        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let auth = Arc::new(CountingAuthenticator {
            delay: Duration::from_millis(50),
            ..CountingAuthenticator::new(3600)
        });
        let manager = Arc::new(manager(auth.clone()));
        let transport = Arc::new(MockHttpTransport::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let transport = transport.clone();
                tokio::spawn(async move { manager.get_access_token(transport.as_ref()).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().as_deref(), Some("tok-1"));
        }
        assert_eq!(auth.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let auth = Arc::new(CountingAuthenticator {
            delay: Duration::from_millis(50),
            fail: true,
            ..CountingAuthenticator::new(3600)
        });
        let manager = Arc::new(manager(auth.clone()));
        let transport = Arc::new(MockHttpTransport::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let transport = transport.clone();
                tokio::spawn(async move { manager.get_access_token(transport.as_ref()).await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AuthError::InvalidAuth { .. }));
        }
        assert_eq!(auth.count(), 1);

        // A later, independent call tries again.
        assert!(manager.get_access_token(transport.as_ref()).await.is_err());
        assert_eq!(auth.count(), 2);
    }

    #[tokio::test]
    async fn test_seeded_login_data_reaches_authenticator() {
        struct Recording;

        #[async_trait]
        impl Authenticator for Recording {
            async fn login(
                &self,
                _transport: &dyn HttpTransport,
                _credentials: &Credentials,
                login_data: &mut LoginData,
            ) -> Result<(String, u64), AuthError> {
                Ok((login_data.sub.clone().unwrap_or_default(), 3600))
            }
        }

        let manager = TokenManager::new(
            TokenManagerConfig::default(),
            Some(Credentials::new("u", "p")),
            Arc::new(Recording),
        )
        .with_login_data(LoginData::with_sub("seeded"));

        let token = manager.get_access_token(&MockHttpTransport::new()).await.unwrap();
        assert_eq!(token.as_deref(), Some("seeded"));
    }

    #[tokio::test]
    async fn test_invalidate_if_current_keeps_newer_token() {
        let auth = Arc::new(CountingAuthenticator::new(3600));
        let manager = manager(auth.clone());
        let transport = MockHttpTransport::new();

        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-1"));
        assert!(!manager.invalidate_if_current("tok-0"));
        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-1"));
        assert_eq!(auth.count(), 1);

        assert!(manager.invalidate_if_current("tok-1"));
        assert_eq!(manager.get_access_token(&transport).await.unwrap().as_deref(), Some("tok-2"));
        assert!(!manager.invalidate_if_current("tok-1"));
        assert_eq!(auth.count(), 2);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_recorded_subject() {
        struct FailsAfterSubject;

        #[async_trait]
        impl Authenticator for FailsAfterSubject {
            async fn login(
                &self,
                _transport: &dyn HttpTransport,
                _credentials: &Credentials,
                login_data: &mut LoginData,
            ) -> Result<(String, u64), AuthError> {
                login_data.sub = Some("partial-sub".to_string());
                Err(AuthError::cannot_connect("Token exchange failed"))
            }
        }

        let manager = TokenManager::new(
            TokenManagerConfig::default(),
            Some(Credentials::new("u", "p")),
            Arc::new(FailsAfterSubject),
        );

        assert!(manager.get_access_token(&MockHttpTransport::new()).await.is_err());
        assert_eq!(manager.login_data().sub.as_deref(), Some("partial-sub"));
    }
}
