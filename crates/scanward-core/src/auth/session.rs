//! Session lifecycle: restore on start, establish after login, clear on logout.
//!
//! `SessionStore` is the single owner of the session state. It is an
//! explicitly constructed handle; clone it into whatever needs to read the
//! session (route guard, navbar, request layer). Every clone sees the same
//! state.
//!
//! State changes are single assignments into a `watch` channel, and the
//! bearer header on the `ApiClient` is updated inside the same assignment,
//! so a reader never observes an authenticated state without the header or
//! the reverse. Mutating operations are serialized so storage and memory
//! cannot drift apart.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::storage::{SessionStorage, SESSION_KEY};
use super::token::Credential;
use super::AuthError;
use crate::api::ApiClient;
use crate::models::Identity;

const AUTHORIZATION: &str = "Authorization";

/// Who is logged in right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup: the persisted credential has not been read or decoded yet.
    Restoring,
    Unauthenticated,
    Authenticated {
        identity: Identity,
        credential: Credential,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            SessionState::Authenticated { credential, .. } => Some(credential),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self, SessionState::Restoring)
    }
}

struct Inner {
    state: watch::Sender<SessionState>,
    storage: Arc<dyn SessionStorage>,
    api: ApiClient,
    /// Serializes restore/establish/clear.
    ops: Mutex<()>,
}

/// Owner of the authentication state for one running application.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store in the `Restoring` state. Call `restore` once at startup.
    pub fn new(storage: Arc<dyn SessionStorage>, api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::Restoring);
        Self {
            inner: Arc::new(Inner {
                state,
                storage,
                api,
                ops: Mutex::new(()),
            }),
        }
    }

    /// Fresh snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait until startup restore has resolved the session either way.
    pub async fn wait_until_restored(&self) -> SessionState {
        let mut rx = self.subscribe();
        let resolved = match rx.wait_for(|state| !state.is_restoring()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this is unreachable in practice
            Err(_) => self.state(),
        };
        resolved
    }

    /// The API client whose headers this store manages.
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Load the persisted credential, if any. Runs once; later calls, or a
    /// call after `establish`/`clear` already resolved the session, leave
    /// the state untouched.
    pub async fn restore(&self) -> SessionState {
        let _ops = self.inner.ops.lock().await;
        if !self.inner.state.borrow().is_restoring() {
            debug!("Session already resolved, skipping restore");
            return self.state();
        }

        let token = match self.inner.storage.get(SESSION_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No persisted session");
                self.reset();
                return self.state();
            }
            Err(e) => {
                warn!(error = %e, "Session storage unavailable during restore");
                self.purge().await;
                self.reset();
                return self.state();
            }
        };

        let credential = Credential::new(token);
        let restored = credential
            .decode()
            .and_then(|identity| self.authenticate(identity, credential));

        match restored {
            Ok(identity) => {
                info!(user = %identity.display_name, role = %identity.role, "Session restored");
            }
            Err(e) => {
                warn!(error = %e, "Discarding unusable persisted credential");
                self.purge().await;
                self.reset();
            }
        }

        self.state()
    }

    /// Adopt a freshly issued credential.
    ///
    /// On any failure the session ends up cleared, exactly as after
    /// `clear()`, and the caller must not navigate to a protected view.
    pub async fn establish(&self, token: impl Into<String>) -> Result<Identity, AuthError> {
        let _ops = self.inner.ops.lock().await;
        let credential = Credential::new(token);

        // Re-login never goes straight from one identity to another
        if self.is_authenticated() {
            debug!("Dropping current session before establishing a new one");
            self.reset();
        }

        let identity = match credential.decode() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Rejected credential");
                self.clear_locked().await;
                return Err(e);
            }
        };

        if let Err(e) = self.inner.storage.set(SESSION_KEY, credential.as_str()).await {
            warn!(error = %e, "Failed to persist session");
            self.clear_locked().await;
            return Err(e);
        }

        match self.authenticate(identity, credential) {
            Ok(identity) => {
                info!(user = %identity.display_name, role = %identity.role, "Session established");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "Failed to install credential");
                self.clear_locked().await;
                Err(e)
            }
        }
    }

    /// Log out. Safe to call in any state; never fails.
    pub async fn clear(&self) {
        let _ops = self.inner.ops.lock().await;
        self.clear_locked().await;
    }

    async fn clear_locked(&self) {
        let was_authenticated = self.is_authenticated();
        self.purge().await;
        self.reset();
        if was_authenticated {
            info!("Session cleared");
        }
    }

    /// Best-effort removal of the persisted credential.
    async fn purge(&self) {
        if let Err(e) = self.inner.storage.remove(SESSION_KEY).await {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    /// Switch to `Authenticated` and install the bearer header.
    fn authenticate(&self, identity: Identity, credential: Credential) -> Result<Identity, AuthError> {
        let bearer = credential.bearer_value();
        let mut result = Ok(identity.clone());

        self.inner.state.send_modify(|state| {
            match self.inner.api.set_default_header(AUTHORIZATION, &bearer) {
                Ok(()) => {
                    *state = SessionState::Authenticated {
                        identity,
                        credential,
                    };
                }
                Err(e) => {
                    self.inner.api.remove_default_header(AUTHORIZATION);
                    *state = SessionState::Unauthenticated;
                    result = Err(AuthError::MalformedCredential(e.to_string()));
                }
            }
        });

        result
    }

    /// Switch to `Unauthenticated` and drop the bearer header.
    fn reset(&self) {
        self.inner.state.send_modify(|state| {
            self.inner.api.remove_default_header(AUTHORIZATION);
            *state = SessionState::Unauthenticated;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::client::DEFAULT_API_BASE_URL;
    use crate::auth::storage::MemoryStorage;
    use crate::auth::token::tests::token_with_claims;
    use crate::models::Role;

    fn store_over(storage: &MemoryStorage) -> SessionStore {
        let api = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        SessionStore::new(Arc::new(storage.clone()), api)
    }

    fn admin_token() -> String {
        token_with_claims(r#"{"role":"admin","username":"root","sub":"1"}"#)
    }

    fn user_token() -> String {
        token_with_claims(r#"{"role":"user","email":"analyst@example.com"}"#)
    }

    /// Storage whose writes and reads can be switched off.
    #[derive(Clone, Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        broken: Arc<AtomicBool>,
    }

    impl FlakyStorage {
        fn check(&self) -> Result<(), AuthError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(AuthError::StorageUnavailable("disk full".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionStorage for FlakyStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.check()?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
            self.check()?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), AuthError> {
            self.check()?;
            self.inner.remove(key).await
        }
    }

    /// Storage whose reads block until released.
    #[derive(Clone, Default)]
    struct SlowStorage {
        inner: MemoryStorage,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl SessionStorage for SlowStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.gate.notified().await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), AuthError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn test_new_store_is_restoring() {
        let store = store_over(&MemoryStorage::new());
        assert!(store.state().is_restoring());
        assert_eq!(store.identity(), None);
    }

    #[tokio::test]
    async fn test_restore_without_persisted_session() {
        let store = store_over(&MemoryStorage::new());
        assert_eq!(store.restore().await, SessionState::Unauthenticated);
        assert_eq!(store.api().default_header(AUTHORIZATION), None);
    }

    #[tokio::test]
    async fn test_establish_scenario_email_display_name() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.restore().await;

        let token = format!("a.{}.c", base64_claims(r#"{"role":"admin","email":"a@x.com"}"#));
        let identity = store.establish(token.clone()).await.unwrap();

        assert_eq!(identity, Identity::new("a@x.com", Role::Admin));
        assert_eq!(store.identity(), Some(identity));
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), Some(token.clone()));
        assert_eq!(
            store.api().default_header(AUTHORIZATION),
            Some(format!("Bearer {}", token))
        );
    }

    fn base64_claims(claims: &str) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
        URL_SAFE_NO_PAD.encode(claims)
    }

    #[tokio::test]
    async fn test_establish_malformed_leaves_nothing_behind() {
        let cases = [
            String::new(),
            "garbage".to_string(),
            "a.b".to_string(),
            format!("h.{}.s", base64_claims("{{{")),
            token_with_claims(r#"{"username":"no-role"}"#),
            token_with_claims(r#"{"role":"root"}"#),
        ];

        for case in cases {
            let storage = MemoryStorage::new();
            let store = store_over(&storage);
            store.restore().await;
            // Start from a live session so the failure has something to clear
            store.establish(user_token()).await.unwrap();

            assert!(store.establish(case.clone()).await.is_err(), "accepted {:?}", case);
            assert_eq!(store.state(), SessionState::Unauthenticated);
            assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
            assert_eq!(store.api().default_header(AUTHORIZATION), None);
        }
    }

    #[tokio::test]
    async fn test_establish_then_reload_round_trip() {
        for token in [admin_token(), user_token()] {
            let storage = MemoryStorage::new();
            let store = store_over(&storage);
            store.restore().await;
            let identity = store.establish(token.clone()).await.unwrap();

            // Simulated reload: new store, new client, same storage
            let reloaded = store_over(&storage);
            let state = reloaded.restore().await;
            assert_eq!(state.identity(), Some(&identity));
            assert_eq!(state.credential().map(Credential::as_str), Some(token.as_str()));
            assert_eq!(
                reloaded.api().default_header(AUTHORIZATION),
                Some(format!("Bearer {}", token))
            );
        }
    }

    #[tokio::test]
    async fn test_establish_replaces_previous_identity() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.restore().await;

        store.establish(admin_token()).await.unwrap();
        let mut rx = store.subscribe();
        let _ = rx.borrow_and_update();

        store.establish(user_token()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(store.identity().map(|i| i.role), Some(Role::User));
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), Some(user_token()));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.restore().await;
        store.establish(admin_token()).await.unwrap();

        store.clear().await;
        let once = store.state();
        store.clear().await;

        assert_eq!(once, SessionState::Unauthenticated);
        assert_eq!(store.state(), once);
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
        assert_eq!(store.api().default_header(AUTHORIZATION), None);
    }

    #[tokio::test]
    async fn test_clear_before_restore() {
        let store = store_over(&MemoryStorage::new());
        store.clear().await;
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_purges_corrupt_claims() {
        let storage = MemoryStorage::new();
        let corrupt = format!("h.{}.s", base64_claims("role=admin"));
        storage.set(SESSION_KEY, &corrupt).await.unwrap();

        let store = store_over(&storage);
        assert_eq!(store.restore().await, SessionState::Unauthenticated);
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
        assert_eq!(store.api().default_header(AUTHORIZATION), None);
    }

    #[tokio::test]
    async fn test_restore_purges_role_less_credential() {
        let storage = MemoryStorage::new();
        storage
            .set(SESSION_KEY, &token_with_claims(r#"{"sub":"42"}"#))
            .await
            .unwrap();

        let store = store_over(&storage);
        assert_eq!(store.restore().await, SessionState::Unauthenticated);
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_runs_once() {
        let storage = MemoryStorage::new();
        let store = store_over(&storage);
        store.restore().await;

        // A credential appearing later is not picked up by a second restore
        storage.set(SESSION_KEY, &admin_token()).await.unwrap();
        assert_eq!(store.restore().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_does_not_override_establish() {
        let storage = MemoryStorage::new();
        storage.set(SESSION_KEY, &admin_token()).await.unwrap();

        let store = store_over(&storage);
        store.establish(user_token()).await.unwrap();

        let state = store.restore().await;
        assert_eq!(state.identity().map(|i| i.role), Some(Role::User));
    }

    #[tokio::test]
    async fn test_storage_failure_on_establish() {
        let storage = FlakyStorage::default();
        let api = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        let store = SessionStore::new(Arc::new(storage.clone()), api);
        store.restore().await;

        storage.broken.store(true, Ordering::SeqCst);
        let err = store.establish(admin_token()).await.unwrap_err();

        assert!(matches!(err, AuthError::StorageUnavailable(_)));
        assert!(!err.is_decode_failure());
        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert_eq!(store.api().default_header(AUTHORIZATION), None);

        // Clearing with broken storage still does not fail
        store.clear().await;
    }

    #[tokio::test]
    async fn test_storage_failure_on_restore() {
        let storage = FlakyStorage::default();
        storage.inner.set(SESSION_KEY, &admin_token()).await.unwrap();
        storage.broken.store(true, Ordering::SeqCst);

        let api = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        let store = SessionStore::new(Arc::new(storage), api);
        assert_eq!(store.restore().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_slow_restore_stays_restoring() {
        let storage = SlowStorage::default();
        storage.inner.set(SESSION_KEY, &admin_token()).await.unwrap();

        let api = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        let store = SessionStore::new(Arc::new(storage.clone()), api);

        let restoring = store.clone();
        let task = tokio::spawn(async move { restoring.restore().await });

        tokio::task::yield_now().await;
        assert!(store.state().is_restoring());

        storage.gate.notify_one();
        let resolved = store.wait_until_restored().await;
        assert_eq!(resolved.identity().map(|i| i.role), Some(Role::Admin));
        assert_eq!(task.await.unwrap(), resolved);
    }
}
