//! Outbound SSH connection to a cpud
//!
//! Resolves the target through the SSH config, loads keys and authenticates.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config};
use russh_keys::key::{KeyPair, PublicKey};
use thiserror::Error;

use cpu_core::config::ClientConfig;
use cpu_core::error::ConfigError;
use cpu_core::ssh_config::SshConfig;

use super::CpuSession;

/// Connection errors that may require special handling
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Private key file missing or unreadable
    #[error("unable to read private key {path}: {source}")]
    KeyNotFound {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Pinned host key missing or unreadable
    #[error("unable to read host key {path}: {source}")]
    HostKeyNotFound {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The server refused our key
    #[error("Authentication rejected by {0}")]
    AuthRejected(String),

    /// The server's host key did not match the pinned key
    #[error("Host key verification failed for {0}")]
    HostKeyRejected(String),

    /// Other connection error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Where and how to connect, after SSH config resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Name the user typed
    pub alias: String,
    /// Host name to dial
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_file: PathBuf,
    pub host_key_file: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl SessionTarget {
    /// Resolve `host` against `config` and the SSH config it names
    pub fn resolve(host: &str, config: &ClientConfig) -> Result<Self, ConfigError> {
        let ssh_config = SshConfig::load_or_default(&config.ssh_config_path());
        Self::resolve_with(host, config, &ssh_config)
    }

    /// Resolve `host` against an already loaded SSH config
    pub fn resolve_with(
        host: &str,
        config: &ClientConfig,
        ssh_config: &SshConfig,
    ) -> Result<Self, ConfigError> {
        if host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }

        let port = ssh_config.resolve_port(host, config.port.as_deref())?;
        let username = config
            .username
            .clone()
            .or_else(|| ssh_config.get(host, "User").map(str::to_string))
            .unwrap_or_else(whoami::username);

        Ok(Self {
            alias: host.to_string(),
            host: ssh_config.resolve_host_name(host),
            port,
            username,
            key_file: ssh_config.resolve_key_file(host, config.private_key_path.as_deref()),
            host_key_file: config.host_key_path.clone(),
            connect_timeout: config.connect_timeout,
        })
    }

    /// `host:port` for log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Holds loaded credentials for one target and opens sessions to it
pub struct Connector {
    target: SessionTarget,
    key: Arc<KeyPair>,
    host_key: Option<PublicKey>,
}

impl Connector {
    /// Load the private key and, if configured, the pinned host key
    pub fn new(target: SessionTarget) -> Result<Self, ConnectionError> {
        let key_path = target.key_file.display().to_string();
        if !target.key_file.exists() {
            return Err(ConnectionError::KeyNotFound {
                path: key_path,
                source: anyhow::anyhow!("File does not exist"),
            });
        }
        let key = russh_keys::load_secret_key(&target.key_file, None).map_err(|e| {
            ConnectionError::KeyNotFound {
                path: key_path,
                source: anyhow::anyhow!("Failed to load key: {}", e),
            }
        })?;

        let host_key = match &target.host_key_file {
            Some(path) => Some(russh_keys::load_public_key(path).map_err(|e| {
                ConnectionError::HostKeyNotFound {
                    path: path.display().to_string(),
                    source: anyhow::anyhow!("{}", e),
                }
            })?),
            None => None,
        };

        Ok(Self {
            target,
            key: Arc::new(key),
            host_key,
        })
    }

    /// Connect, authenticate and open a session channel
    pub async fn connect(&self) -> Result<CpuSession, ConnectionError> {
        let address = self.target.address();
        let ssh_config = Arc::new(Config::default());
        let handler = ClientHandler::new(self.host_key.clone());

        tracing::debug!("Connecting to {}", address);
        let mut handle = tokio::time::timeout(
            self.target.connect_timeout,
            client::connect(
                ssh_config,
                (self.target.host.as_str(), self.target.port),
                handler,
            ),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Connection to {} timed out", address))?
        .map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("Unknown server key") || err_str.contains("server key") {
                return ConnectionError::HostKeyRejected(address.clone());
            }
            ConnectionError::Other(anyhow::anyhow!("Failed to connect to {}: {}", address, e))
        })?;

        tracing::debug!("Authenticating as user '{}'", self.target.username);
        let authenticated = handle
            .authenticate_publickey(&self.target.username, Arc::clone(&self.key))
            .await
            .map_err(|e| anyhow::anyhow!("Authentication error: {}", e))?;

        if !authenticated {
            return Err(ConnectionError::AuthRejected(address));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open session channel: {}", e))?;

        tracing::info!("Connected to {}", address);
        Ok(CpuSession::new(handle, channel))
    }
}

/// SSH client handler: host key policy
pub(crate) struct ClientHandler {
    pinned_host_key: Option<PublicKey>,
}

impl ClientHandler {
    fn new(pinned_host_key: Option<PublicKey>) -> Self {
        Self { pinned_host_key }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Verify the server's host key against the pinned key, if any.
    ///
    /// Without a pinned key every host key is accepted.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: {}", fingerprint);

        match &self.pinned_host_key {
            Some(expected) if expected.fingerprint() == fingerprint => {
                tracing::debug!("Host key verified against pinned key");
                Ok(true)
            }
            Some(expected) => {
                tracing::error!(
                    "Host key mismatch: expected {}, got {}",
                    expected.fingerprint(),
                    fingerprint
                );
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
