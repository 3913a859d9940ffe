// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use config::{Config as ConfigFile, File, Environment};
use candid::Principal;
use url::Url;

use crate::error::SettingsError;

/// Identity provider used on mainnet
pub const IC_IDENTITY_PROVIDER: &str = "https://identity.ic0.app";
/// Boundary node for mainnet calls
pub const IC_REPLICA_URL: &str = "https://icp-api.io";
/// Port the local dfx replica listens on
pub const LOCAL_REPLICA_PORT: u16 = 4943;

const BACKEND_CANISTER: &str = "decentfont_backend";
const INTERNET_IDENTITY_CANISTER: &str = "internet_identity";

/// Which replica the front-end talks to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Local,
    Ic,
}

impl Network {
    /// An explicit `DFX_NETWORK` wins, otherwise production builds go to mainnet.
    pub fn resolve(dfx_network: Option<&str>, node_env: Option<&str>) -> Self {
        match dfx_network.map(str::trim).filter(|n| !n.is_empty()) {
            Some("ic") => Network::Ic,
            Some(_) => Network::Local,
            None if node_env == Some("production") => Network::Ic,
            None => Network::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Ic => "ic",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Central configuration for the front-end server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    pub network: Network,
    /// Replica endpoint; derived from `network` when unset
    pub replica_url: Option<String>,
    pub canisters: CanisterConfig,
    pub session: SessionConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanisterConfig {
    pub backend: String,
    pub internet_identity: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a browser session is dropped
    pub ttl_seconds: i64,
    pub cleanup_interval_seconds: u64,
    /// Lifetime of a login before the session key expires
    pub max_time_to_live_seconds: u64,
    /// Directory for persisted session keys; in-memory when unset
    pub key_store_path: Option<String>,
    pub secure_cookie: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            network: Network::Local,
            replica_url: None,
            canisters: CanisterConfig::default(),
            session: SessionConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86400,
            cleanup_interval_seconds: 3600,
            max_time_to_live_seconds: 8 * 3600,
            key_store_path: None,
            secure_cookie: true,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            path: "./static".to_string(),
            index: "index.html".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, SettingsError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        // dfx environment feeds the defaults, files and APP__ variables override it
        let dfx = Self::from_dfx_env();
        let mut builder = ConfigFile::builder()
            .set_default("web_server_addr", dfx.web_server_addr)?
            .set_default("network", dfx.network.as_str())?
            .set_default("canisters.backend", dfx.canisters.backend)?
            .set_default("static_files.path", dfx.static_files.path)?;

        let optional = [
            ("replica_url", dfx.replica_url),
            ("canisters.internet_identity", dfx.canisters.internet_identity),
            ("session.key_store_path", dfx.session.key_store_path),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                builder = builder.set_default(key, value)?;
            }
        }

        let config = builder
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration, falling back to the dfx environment alone when the
    /// layered sources are unusable
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");
                Self::from_dfx_env()
            }
        }
    }

    /// Configuration from the variables dfx exports to front-end builds,
    /// with canister ids read from `canister_ids.json` when not exported
    pub fn from_dfx_env() -> Self {
        let network = Network::resolve(
            env::var("DFX_NETWORK").ok().as_deref(),
            env::var("NODE_ENV").ok().as_deref(),
        );

        let ids = match canister_ids_path(network) {
            path if path.exists() => read_canister_ids(&path, network).unwrap_or_else(|e| {
                tracing::warn!("Ignoring canister ids file: {}", e);
                HashMap::new()
            }),
            path => {
                tracing::debug!("No canister ids file at {}", path.display());
                HashMap::new()
            }
        };

        let backend = env::var("CANISTER_ID_DECENTFONT_BACKEND")
            .ok()
            .or_else(|| ids.get(BACKEND_CANISTER).cloned())
            .unwrap_or_default();

        let internet_identity = env::var("CANISTER_ID_INTERNET_IDENTITY")
            .ok()
            .or_else(|| ids.get(INTERNET_IDENTITY_CANISTER).cloned());

        let defaults = Self::default();

        Self {
            web_server_addr: env::var("WEB_SERVER_ADDR").unwrap_or(defaults.web_server_addr),
            network,
            replica_url: env::var("REPLICA_URL").ok(),
            canisters: CanisterConfig {
                backend,
                internet_identity,
            },
            session: SessionConfig {
                key_store_path: env::var("SESSION_KEY_STORE").ok(),
                ..defaults.session
            },
            static_files: StaticFilesConfig {
                path: env::var("STATIC_FILES_PATH").unwrap_or(defaults.static_files.path),
                ..defaults.static_files
            },
        }
    }

    /// Where login sends the user: mainnet Internet Identity, or the local
    /// Internet Identity canister served by the dfx replica.
    pub fn identity_provider_url(&self) -> Result<Url, SettingsError> {
        let raw = match self.network {
            Network::Ic => IC_IDENTITY_PROVIDER.to_string(),
            Network::Local => {
                let canister = self
                    .canisters
                    .internet_identity
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or(SettingsError::MissingCanisterId(INTERNET_IDENTITY_CANISTER))?;
                format!("http://{}.localhost:{}", canister, LOCAL_REPLICA_PORT)
            }
        };

        Url::parse(&raw).map_err(|source| SettingsError::InvalidUrl { url: raw, source })
    }

    /// Principal of the backend canister the actors call
    pub fn backend_canister_id(&self) -> Result<Principal, SettingsError> {
        let id = self.canisters.backend.trim();
        if id.is_empty() {
            return Err(SettingsError::MissingCanisterId(BACKEND_CANISTER));
        }
        Principal::from_text(id).map_err(|e| SettingsError::InvalidCanisterId {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn replica_endpoint(&self) -> String {
        match (&self.replica_url, self.network) {
            (Some(url), _) => url.clone(),
            (None, Network::Ic) => IC_REPLICA_URL.to_string(),
            (None, Network::Local) => format!("http://127.0.0.1:{}", LOCAL_REPLICA_PORT),
        }
    }

    /// Local replicas sign with a throwaway root key that has to be fetched
    pub fn fetch_root_key(&self) -> bool {
        self.network != Network::Ic
    }
}

fn canister_ids_path(network: Network) -> PathBuf {
    match network {
        Network::Local => Path::new(".dfx").join("local").join("canister_ids.json"),
        Network::Ic => PathBuf::from("canister_ids.json"),
    }
}

/// Read a dfx `canister_ids.json` file
pub fn read_canister_ids(path: &Path, network: Network) -> Result<HashMap<String, String>, SettingsError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_canister_ids(&raw, network)
}

/// Map canister name to its id on `network`, skipping canisters not deployed there.
/// The file shape is `{ "<canister>": { "<network>": "<id>" } }`.
pub fn parse_canister_ids(raw: &str, network: Network) -> Result<HashMap<String, String>, SettingsError> {
    let parsed: HashMap<String, HashMap<String, String>> = serde_json::from_str(raw)?;

    Ok(parsed
        .into_iter()
        .filter_map(|(name, mut by_network)| {
            by_network.remove(network.as_str()).map(|id| (name, id))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_resolution() {
        assert_eq!(Network::resolve(Some("ic"), None), Network::Ic);
        assert_eq!(Network::resolve(Some("local"), Some("production")), Network::Local);
        assert_eq!(Network::resolve(None, Some("production")), Network::Ic);
        assert_eq!(Network::resolve(None, Some("development")), Network::Local);
        assert_eq!(Network::resolve(Some(""), None), Network::Local);
    }

    #[test]
    fn test_mainnet_identity_provider() {
        let config = Config {
            network: Network::Ic,
            ..Config::default()
        };
        let url = config.identity_provider_url().unwrap();
        assert_eq!(url.as_str(), "https://identity.ic0.app/");
        assert!(!config.fetch_root_key());
        assert_eq!(config.replica_endpoint(), IC_REPLICA_URL);
    }

    #[test]
    fn test_local_identity_provider() {
        let config = Config {
            canisters: CanisterConfig {
                backend: "bkyz2-fmaaa-aaaaa-qaaaq-cai".to_string(),
                internet_identity: Some("be2us-64aaa-aaaaa-qaabq-cai".to_string()),
            },
            ..Config::default()
        };
        let url = config.identity_provider_url().unwrap();
        assert_eq!(url.host_str(), Some("be2us-64aaa-aaaaa-qaabq-cai.localhost"));
        assert_eq!(url.port(), Some(4943));
        assert!(config.fetch_root_key());
        assert_eq!(config.replica_endpoint(), "http://127.0.0.1:4943");
    }

    #[test]
    fn test_local_identity_provider_requires_canister() {
        let config = Config::default();
        assert!(matches!(
            config.identity_provider_url(),
            Err(SettingsError::MissingCanisterId("internet_identity"))
        ));
    }

    #[test]
    fn test_backend_canister_id() {
        let mut config = Config::default();
        assert!(matches!(
            config.backend_canister_id(),
            Err(SettingsError::MissingCanisterId("decentfont_backend"))
        ));

        config.canisters.backend = "not a principal".to_string();
        assert!(matches!(
            config.backend_canister_id(),
            Err(SettingsError::InvalidCanisterId { .. })
        ));

        config.canisters.backend = "bkyz2-fmaaa-aaaaa-qaaaq-cai".to_string();
        assert_eq!(
            config.backend_canister_id().unwrap().to_text(),
            "bkyz2-fmaaa-aaaaa-qaaaq-cai"
        );
    }

    #[test]
    fn test_parse_canister_ids() {
        let raw = r#"{
            "decentfont_backend": { "local": "bkyz2-fmaaa-aaaaa-qaaaq-cai", "ic": "abcde-aaaaa-aaaaa-aaaaa-cai" },
            "internet_identity": { "local": "be2us-64aaa-aaaaa-qaabq-cai" }
        }"#;

        let local = parse_canister_ids(raw, Network::Local).unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(local["decentfont_backend"], "bkyz2-fmaaa-aaaaa-qaaaq-cai");

        let ic = parse_canister_ids(raw, Network::Ic).unwrap();
        assert_eq!(ic.len(), 1);
        assert!(!ic.contains_key("internet_identity"));
    }

    #[test]
    fn test_load_takes_process_environment() {
        env::set_var("CONFIG_DIR", "./no-such-config-dir");
        env::set_var("REPLICA_URL", "http://replica.test:8000");
        env::set_var("SESSION_KEY_STORE", "/var/lib/decentfont/keys");

        let config = Config::load().unwrap();

        env::remove_var("CONFIG_DIR");
        env::remove_var("REPLICA_URL");
        env::remove_var("SESSION_KEY_STORE");

        assert_eq!(config.replica_url.as_deref(), Some("http://replica.test:8000"));
        assert_eq!(config.replica_endpoint(), "http://replica.test:8000");
        assert_eq!(config.session.key_store_path.as_deref(), Some("/var/lib/decentfont/keys"));
        assert_eq!(config.session.ttl_seconds, SessionConfig::default().ttl_seconds);
    }

    #[test]
    fn test_parse_canister_ids_rejects_garbage() {
        assert!(matches!(
            parse_canister_ids("not json", Network::Local),
            Err(SettingsError::CanisterIds(_))
        ));
    }
}
