//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::{BindError, ConfigError};
use crate::escape::DEFAULT_ESCAPE_CHAR;
use crate::namespace::{self, MountTable};

/// Settings for one cpu session.
///
/// Every session gets its own value, so several sessions in one process can
/// use different keys, mount roots or escape characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Private key for authentication.
    ///
    /// When unset, the SSH config `IdentityFile` for the host is used, then
    /// `~/.ssh/cpu_rsa`.
    pub private_key_path: Option<PathBuf>,

    /// Public host key to pin the server to (OpenSSH `.pub` format)
    pub host_key_path: Option<PathBuf>,

    /// Port to connect to; unset means SSH config `Port`, then 17010
    pub port: Option<String>,

    /// Username for SSH authentication; unset means SSH config `User`, then
    /// the local user name
    pub username: Option<String>,

    /// Bind list (`local=remote:path:...`) describing the remote namespace
    pub namespace: Option<String>,

    /// Extra fstab file appended to the compiled bind list
    pub fstab_path: Option<PathBuf>,

    /// Remote directory the `cpu` mount point lives under
    pub mount_root: PathBuf,

    /// Character that starts an escape sequence at the beginning of a line
    pub escape_char: char,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// OpenSSH client config used for host, port and identity lookups
    pub ssh_config_path: Option<PathBuf>,

    /// Extra `NAME=value` variables sent to the session
    pub env: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            private_key_path: None,
            host_key_path: None,
            port: None,
            username: None,
            namespace: None,
            fstab_path: None,
            mount_root: PathBuf::from("/tmp"),
            escape_char: DEFAULT_ESCAPE_CHAR as char,
            connect_timeout: Duration::from_secs(30),
            ssh_config_path: None,
            env: vec![],
        }
    }
}

impl ClientConfig {
    /// The escape character as the single byte the relay compares against
    pub fn escape_byte(&self) -> Result<u8, ConfigError> {
        if self.escape_char.is_ascii() && !self.escape_char.is_ascii_control() {
            Ok(self.escape_char as u8)
        } else {
            Err(ConfigError::Invalid(format!(
                "escape character {:?} must be a printable ASCII character",
                self.escape_char
            )))
        }
    }

    /// SSH config file to consult
    pub fn ssh_config_path(&self) -> PathBuf {
        self.ssh_config_path
            .clone()
            .unwrap_or_else(super::default_ssh_config_path)
    }

    /// Compile the configured bind list under the mount root
    pub fn mount_table(&self) -> Result<MountTable, BindError> {
        namespace::compile(self.namespace.as_deref().unwrap_or(""), &self.mount_root)
    }

    /// The full fstab for the session: the compiled bind list followed by
    /// the contents of `fstab_path`, if any.
    pub fn fstab(&self) -> Result<String, crate::CpuError> {
        let binds = self.mount_table()?;
        let extra = match &self.fstab_path {
            Some(path) => read_fstab(path)?,
            None => String::new(),
        };
        Ok(namespace::join_fstab(&[binds.as_str(), extra.as_str()]))
    }
}

fn read_fstab(path: &Path) -> Result<String, ConfigError> {
    let path = super::expand_tilde(path);
    std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read fstab {:?}: {}", path, e)))
}
