// web-server/src/session.rs
use async_trait::async_trait;
use candid::Principal;
use chrono::Utc;
use dashmap::DashMap;
use ic_agent::identity::Secp256k1Identity;
use ic_agent::{Agent, AgentError, Identity};
use k256::SecretKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::canister::{BackendActor, IcBackendActor};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("stored session is corrupt: {0}")]
    Corrupt(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("identity has no principal: {0}")]
    Principal(String),

    #[error("failed to create agent: {0}")]
    Agent(#[from] AgentError),
}

/// Login state as shown on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Authenticated { principal: String },
}

impl SessionStatus {
    pub fn principal(&self) -> Option<&str> {
        match self {
            SessionStatus::Anonymous => None,
            SessionStatus::Authenticated { principal } => Some(principal),
        }
    }
}

/// Identity library seam: owns the login lifecycle of one browser session
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn is_authenticated(&self) -> Result<bool, SessionError>;

    async fn identity(&self) -> Result<Arc<dyn Identity>, SessionError>;

    async fn login(&self, identity_provider: &Url) -> Result<(), SessionError>;

    async fn logout(&self) -> Result<(), SessionError>;
}

/// Builds an actor handle for an identity
#[async_trait]
pub trait ActorFactory: Send + Sync {
    async fn create(&self, identity: Arc<dyn Identity>) -> Result<Arc<dyn BackendActor>, SessionError>;
}

/// Key/value storage for serialized session keys
#[async_trait]
pub trait KeyStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError>;

    async fn remove(&self, key: &str) -> Result<(), SessionError>;

    async fn keys(&self) -> Result<Vec<String>, SessionError>;
}

/// Sessions live as long as the process
#[derive(Default)]
pub struct MemoryKeyStorage {
    entries: DashMap<String, String>,
}

#[async_trait]
impl KeyStorage for MemoryKeyStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// One file per session key under `dir`, so logins survive a restart
pub struct FileKeyStorage {
    dir: PathBuf,
}

impl FileKeyStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyStorage for FileKeyStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    /// Hex-encoded secp256k1 secret
    key: String,
    identity_provider: String,
    expires_at_ms: i64,
}

impl StoredSession {
    fn parse(raw: &str) -> Result<Self, SessionError> {
        serde_json::from_str(raw).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    fn is_expired(&self) -> bool {
        self.expires_at_ms <= Utc::now().timestamp_millis()
    }
}

/// Remove every stored session key that has expired or cannot be read.
/// Returns the number of removed entries.
pub async fn sweep_expired_keys(storage: &dyn KeyStorage) -> Result<usize, SessionError> {
    let mut removed = 0;
    for key in storage.keys().await? {
        let Some(raw) = storage.get(&key).await? else { continue };
        let stale = StoredSession::parse(&raw).map_or(true, |stored| stored.is_expired());
        if stale {
            storage.remove(&key).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Auth client holding a secp256k1 session key in a `KeyStorage`.
///
/// Login mints a fresh key and stores it with an expiry; the identity is the
/// key's self-authenticating principal. The provider is recorded with the
/// key but no delegation is requested from it.
pub struct KeyStoreAuthClient {
    storage: Arc<dyn KeyStorage>,
    storage_key: String,
    max_time_to_live: Duration,
}

impl KeyStoreAuthClient {
    pub fn new(storage: Arc<dyn KeyStorage>, storage_key: impl Into<String>, max_time_to_live: Duration) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
            max_time_to_live,
        }
    }

    /// Stored session that has not expired yet
    async fn current(&self) -> Result<Option<StoredSession>, SessionError> {
        let Some(raw) = self.storage.get(&self.storage_key).await? else {
            return Ok(None);
        };

        let stored = match StoredSession::parse(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Dropping unreadable session key {}: {}", self.storage_key, e);
                self.storage.remove(&self.storage_key).await?;
                return Err(e);
            }
        };

        if stored.is_expired() {
            tracing::debug!("Session key {} expired", self.storage_key);
            self.storage.remove(&self.storage_key).await?;
            return Ok(None);
        }

        Ok(Some(stored))
    }
}

#[async_trait]
impl AuthClient for KeyStoreAuthClient {
    async fn is_authenticated(&self) -> Result<bool, SessionError> {
        Ok(self.current().await?.is_some())
    }

    async fn identity(&self) -> Result<Arc<dyn Identity>, SessionError> {
        let stored = self.current().await?.ok_or(SessionError::NotAuthenticated)?;

        let bytes = hex::decode(&stored.key).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        let secret = SecretKey::from_slice(&bytes).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        Ok(Arc::new(Secp256k1Identity::from_private_key(secret)))
    }

    async fn login(&self, identity_provider: &Url) -> Result<(), SessionError> {
        let secret = SecretKey::random(&mut OsRng);
        let ttl_ms = i64::try_from(self.max_time_to_live.as_millis()).unwrap_or(i64::MAX);

        let stored = StoredSession {
            key: hex::encode(secret.to_bytes()),
            identity_provider: identity_provider.to_string(),
            expires_at_ms: Utc::now().timestamp_millis().saturating_add(ttl_ms),
        };
        let raw = serde_json::to_string(&stored).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        self.storage.set(&self.storage_key, raw).await?;
        tracing::info!("Issued session key via {}", identity_provider);
        Ok(())
    }

    async fn logout(&self) -> Result<(), SessionError> {
        self.storage.remove(&self.storage_key).await
    }
}

/// Creates `IcBackendActor`s talking to one replica and canister
pub struct IcActorFactory {
    replica_url: String,
    canister_id: Principal,
    fetch_root_key: bool,
}

impl IcActorFactory {
    pub fn new(replica_url: impl Into<String>, canister_id: Principal, fetch_root_key: bool) -> Self {
        Self {
            replica_url: replica_url.into(),
            canister_id,
            fetch_root_key,
        }
    }
}

#[async_trait]
impl ActorFactory for IcActorFactory {
    async fn create(&self, identity: Arc<dyn Identity>) -> Result<Arc<dyn BackendActor>, SessionError> {
        let agent = Agent::builder()
            .with_url(self.replica_url.clone())
            .with_arc_identity(identity)
            .build()?;

        if self.fetch_root_key {
            if let Err(e) = agent.fetch_root_key().await {
                tracing::warn!("Unable to fetch root key. Check to ensure that your local replica is running");
                tracing::error!("{}", e);
            }
        }

        Ok(Arc::new(IcBackendActor::new(agent, self.canister_id)))
    }
}

/// Authentication lifecycle of one browser session
pub struct SessionManager {
    auth: Arc<dyn AuthClient>,
    factory: Arc<dyn ActorFactory>,
    identity_provider: Url,
    actor: Option<Arc<dyn BackendActor>>,
    status: SessionStatus,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthClient>, factory: Arc<dyn ActorFactory>, identity_provider: Url) -> Self {
        Self {
            auth,
            factory,
            identity_provider,
            actor: None,
            status: SessionStatus::Anonymous,
        }
    }

    pub fn actor(&self) -> Option<Arc<dyn BackendActor>> {
        self.actor.clone()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn identity_provider(&self) -> &Url {
        &self.identity_provider
    }

    /// Pick up a session stored by an earlier login, if any
    pub async fn restore(&mut self) -> Result<&SessionStatus, SessionError> {
        if self.auth.is_authenticated().await? {
            self.authenticated().await?;
        } else {
            self.clear();
        }
        Ok(&self.status)
    }

    pub async fn login(&mut self) -> Result<&SessionStatus, SessionError> {
        tracing::info!("Logging in with {}", self.identity_provider);
        self.auth.login(&self.identity_provider).await?;
        self.authenticated().await?;
        Ok(&self.status)
    }

    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.auth.logout().await?;
        self.clear();
        Ok(())
    }

    /// Bind a fresh actor handle to the current identity
    async fn authenticated(&mut self) -> Result<(), SessionError> {
        let identity = self.auth.identity().await?;
        let principal = identity.sender().map_err(SessionError::Principal)?;
        let actor = self.factory.create(identity).await?;

        tracing::info!("Logged in as: {}", principal);
        self.actor = Some(actor);
        self.status = SessionStatus::Authenticated {
            principal: principal.to_text(),
        };
        Ok(())
    }

    fn clear(&mut self) {
        self.actor = None;
        self.status = SessionStatus::Anonymous;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canister::CallError;
    use candid::IDLValue;
    use common::models::{Asset, AssetId, AssetPreview, AssetSummary, User};
    use ic_agent::identity::AnonymousIdentity;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Auth client whose login state is a flag
    #[derive(Default)]
    pub(crate) struct FlagAuthClient {
        pub(crate) logged_in: AtomicBool,
        pub(crate) broken: bool,
    }

    #[async_trait]
    impl AuthClient for FlagAuthClient {
        async fn is_authenticated(&self) -> Result<bool, SessionError> {
            if self.broken {
                return Err(SessionError::Corrupt("unreadable".to_string()));
            }
            Ok(self.logged_in.load(Ordering::SeqCst))
        }

        async fn identity(&self) -> Result<Arc<dyn Identity>, SessionError> {
            Ok(Arc::new(AnonymousIdentity))
        }

        async fn login(&self, _identity_provider: &Url) -> Result<(), SessionError> {
            self.logged_in.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn logout(&self) -> Result<(), SessionError> {
            self.logged_in.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NullActor;

    #[async_trait]
    impl BackendActor for NullActor {
        async fn add_user(&self, _user: &User) -> Result<IDLValue, CallError> {
            Ok(IDLValue::Null)
        }
        async fn get_user(&self) -> Result<Option<User>, CallError> {
            Ok(None)
        }
        async fn add_asset(&self, _asset: &Asset) -> Result<(bool, AssetId), CallError> {
            Ok((false, 0))
        }
        async fn list_assets(&self, _page: u64, _page_size: u64) -> Result<Vec<AssetSummary>, CallError> {
            Ok(Vec::new())
        }
        async fn get_asset_preview(&self, _id: AssetId) -> Result<Option<AssetPreview>, CallError> {
            Ok(None)
        }
        async fn get_asset(&self, _id: AssetId) -> Result<Option<Asset>, CallError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    #[async_trait]
    impl ActorFactory for CountingFactory {
        async fn create(&self, _identity: Arc<dyn Identity>) -> Result<Arc<dyn BackendActor>, SessionError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullActor))
        }
    }

    fn provider() -> Url {
        Url::parse("https://identity.ic0.app").unwrap()
    }

    #[tokio::test]
    async fn test_restore_without_session_stays_anonymous() {
        let factory = Arc::new(CountingFactory::default());
        let mut manager = SessionManager::new(Arc::new(FlagAuthClient::default()), factory.clone(), provider());

        assert_eq!(manager.restore().await.unwrap(), &SessionStatus::Anonymous);
        assert!(manager.actor().is_none());
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_existing_session_builds_actor() {
        let auth = FlagAuthClient::default();
        auth.logged_in.store(true, Ordering::SeqCst);
        let factory = Arc::new(CountingFactory::default());
        let mut manager = SessionManager::new(Arc::new(auth), factory.clone(), provider());

        let status = manager.restore().await.unwrap().clone();
        assert_eq!(status.principal(), Some(Principal::anonymous().to_text().as_str()));
        assert!(manager.actor().is_some());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restore_failure_is_reported() {
        let auth = FlagAuthClient {
            broken: true,
            ..Default::default()
        };
        let mut manager = SessionManager::new(Arc::new(auth), Arc::new(CountingFactory::default()), provider());

        assert!(matches!(manager.restore().await, Err(SessionError::Corrupt(_))));
        assert!(manager.actor().is_none());
        assert_eq!(manager.status(), &SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let auth = Arc::new(FlagAuthClient::default());
        let mut manager = SessionManager::new(auth.clone(), Arc::new(CountingFactory::default()), provider());

        manager.login().await.unwrap();
        assert!(auth.logged_in.load(Ordering::SeqCst));
        assert!(manager.actor().is_some());
        assert!(manager.status().principal().is_some());

        manager.logout().await.unwrap();
        assert!(!auth.logged_in.load(Ordering::SeqCst));
        assert!(manager.actor().is_none());
        assert_eq!(manager.status(), &SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_key_store_login_persists_identity() {
        let storage: Arc<dyn KeyStorage> = Arc::new(MemoryKeyStorage::default());
        let client = KeyStoreAuthClient::new(storage.clone(), "abc", Duration::from_secs(60));

        assert!(!client.is_authenticated().await.unwrap());
        assert!(matches!(client.identity().await, Err(SessionError::NotAuthenticated)));

        client.login(&provider()).await.unwrap();
        let principal = client.identity().await.unwrap().sender().unwrap();
        assert_ne!(principal, Principal::anonymous());

        // A new client on the same storage sees the same login
        let restored = KeyStoreAuthClient::new(storage, "abc", Duration::from_secs(60));
        assert!(restored.is_authenticated().await.unwrap());
        assert_eq!(restored.identity().await.unwrap().sender().unwrap(), principal);

        restored.logout().await.unwrap();
        assert!(!client.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_key_store_session_expires() {
        let storage = Arc::new(MemoryKeyStorage::default());
        let client = KeyStoreAuthClient::new(storage.clone(), "abc", Duration::ZERO);

        client.login(&provider()).await.unwrap();
        assert!(!client.is_authenticated().await.unwrap());
        assert_eq!(storage.get("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_key_store_rejects_corrupt_entry() {
        let storage = Arc::new(MemoryKeyStorage::default());
        storage.set("abc", "{".to_string()).await.unwrap();
        let client = KeyStoreAuthClient::new(storage.clone(), "abc", Duration::from_secs(60));

        assert!(matches!(client.is_authenticated().await, Err(SessionError::Corrupt(_))));
        // Reported once, then the entry is gone
        assert_eq!(storage.get("abc").await.unwrap(), None);
        assert!(!client.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_keys() {
        let storage = Arc::new(MemoryKeyStorage::default());
        KeyStoreAuthClient::new(storage.clone(), "live", Duration::from_secs(60))
            .login(&provider())
            .await
            .unwrap();
        KeyStoreAuthClient::new(storage.clone(), "expired", Duration::ZERO)
            .login(&provider())
            .await
            .unwrap();
        storage.set("corrupt", "not json".to_string()).await.unwrap();

        assert_eq!(sweep_expired_keys(storage.as_ref()).await.unwrap(), 2);

        let mut keys = storage.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn test_file_storage_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path().join("keys"));
        assert!(storage.keys().await.unwrap().is_empty());

        KeyStoreAuthClient::new(Arc::new(FileKeyStorage::new(dir.path().join("keys"))), "old", Duration::ZERO)
            .login(&provider())
            .await
            .unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["old".to_string()]);

        assert_eq!(sweep_expired_keys(&storage).await.unwrap(), 1);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path().join("keys"));

        assert_eq!(storage.get("abc").await.unwrap(), None);
        storage.set("abc", "value".to_string()).await.unwrap();
        assert_eq!(storage.get("abc").await.unwrap().as_deref(), Some("value"));

        storage.remove("abc").await.unwrap();
        assert_eq!(storage.get("abc").await.unwrap(), None);
        // Removing twice is fine
        storage.remove("abc").await.unwrap();
    }
}
