// web-server/src/context.rs
use common::{Config, SettingsError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

use crate::session::{
    sweep_expired_keys, ActorFactory, FileKeyStorage, IcActorFactory, KeyStorage, KeyStoreAuthClient,
    MemoryKeyStorage, SessionError, SessionManager, SessionStatus,
};
use crate::utils::token::session_key_id;
use crate::view::{Command, CommandInput, ViewController, ViewSnapshot};

/// Client context shared between requests of one browser session. The mutex
/// makes commands of a session run one after another.
pub type SharedContext = Arc<Mutex<ClientContext>>;

/// Session manager and view controller of one browser session
pub struct ClientContext {
    session: SessionManager,
    controller: ViewController,
}

impl ClientContext {
    pub fn new(session: SessionManager) -> Self {
        let controller = ViewController::new(session.actor());
        Self { session, controller }
    }

    pub fn status(&self) -> &SessionStatus {
        self.session.status()
    }

    pub fn identity_provider(&self) -> &Url {
        self.session.identity_provider()
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn snapshot(&mut self) -> ViewSnapshot {
        self.controller.snapshot()
    }

    /// Page load: restore a stored login, then fetch the first asset page
    pub async fn load(&mut self) -> Result<(), SessionError> {
        let restored = self.session.restore().await.map(|_| ());
        self.sync();

        if self.controller.has_actor() {
            self.controller.list_assets().await;
        }
        restored
    }

    pub async fn login(&mut self) -> Result<(), SessionError> {
        let result = self.session.login().await.map(|_| ());
        self.sync();
        result
    }

    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let result = self.session.logout().await;
        self.sync();
        result
    }

    /// The login button: log out when logged in, log in otherwise
    pub async fn toggle_login(&mut self) -> Result<(), SessionError> {
        match self.session.status() {
            SessionStatus::Authenticated { .. } => self.logout().await,
            SessionStatus::Anonymous => self.login().await,
        }
    }

    pub async fn run(&mut self, command: Command, input: &CommandInput) {
        self.controller.dispatch(command, input).await;
    }

    /// Hand the current actor to the controller and update the login display
    fn sync(&mut self) {
        self.controller.attach(self.session.actor());
        self.controller.show_session(self.session.status());
    }
}

/// Creates the client context for a new browser session
#[derive(Clone)]
pub struct ContextBuilder {
    storage: Arc<dyn KeyStorage>,
    factory: Arc<dyn ActorFactory>,
    identity_provider: Url,
    max_time_to_live: Duration,
}

impl ContextBuilder {
    pub fn new(
        storage: Arc<dyn KeyStorage>,
        factory: Arc<dyn ActorFactory>,
        identity_provider: Url,
        max_time_to_live: Duration,
    ) -> Self {
        Self {
            storage,
            factory,
            identity_provider,
            max_time_to_live,
        }
    }

    /// Wire the ic-agent factory and key storage described by `config`
    pub fn from_config(config: &Config) -> Result<Self, SettingsError> {
        let factory = IcActorFactory::new(
            config.replica_endpoint(),
            config.backend_canister_id()?,
            config.fetch_root_key(),
        );

        let storage: Arc<dyn KeyStorage> = match &config.session.key_store_path {
            Some(dir) => {
                tracing::info!("Persisting session keys in {}", dir);
                Arc::new(FileKeyStorage::new(dir))
            }
            None => Arc::new(MemoryKeyStorage::default()),
        };

        Ok(Self::new(
            storage,
            Arc::new(factory),
            config.identity_provider_url()?,
            Duration::from_secs(config.session.max_time_to_live_seconds),
        ))
    }

    /// Drop the stored keys of dropped browser sessions, then every other
    /// key that has expired. Returns the number of swept keys.
    pub async fn release_keys(&self, session_tokens: Vec<String>) -> usize {
        for token in &session_tokens {
            if let Err(e) = self.storage.remove(&session_key_id(token)).await {
                tracing::warn!("Could not remove session key: {}", e);
            }
        }

        match sweep_expired_keys(self.storage.as_ref()).await {
            Ok(swept) => swept,
            Err(e) => {
                tracing::warn!("Session key sweep failed: {}", e);
                0
            }
        }
    }

    pub fn build(&self, session_token: &str) -> SharedContext {
        let auth = KeyStoreAuthClient::new(
            self.storage.clone(),
            session_key_id(session_token),
            self.max_time_to_live,
        );
        let session = SessionManager::new(Arc::new(auth), self.factory.clone(), self.identity_provider.clone());
        Arc::new(Mutex::new(ClientContext::new(session)))
    }
}
