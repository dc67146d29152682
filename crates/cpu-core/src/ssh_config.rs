//! OpenSSH client config lookups
//!
//! Only the parts the cpu client needs are understood: `Host` blocks with
//! wildcard patterns, and plain `Keyword value` options inside them. As in
//! OpenSSH, the first block that matches a host and sets a keyword wins.

use std::path::{Path, PathBuf};

use crate::config::{default_key_file, expand_tilde};
use crate::error::ConfigError;

/// Port used when neither the command line nor the SSH config pick one
pub const DEFAULT_PORT: &str = "17010";

/// The ssh port; cpud never listens there, so asking for it means "default"
const SSH_PORT: &str = "22";

/// A `Host` block and the options set inside it
#[derive(Debug, Clone)]
struct HostBlock {
    patterns: Vec<String>,
    /// Keywords are stored lowercased
    options: Vec<(String, String)>,
}

impl HostBlock {
    fn matches(&self, host: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if wildcard_match(negated, host) {
                    return false;
                }
            } else if wildcard_match(pattern, host) {
                matched = true;
            }
        }
        matched
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed SSH client config
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    /// Parse config text. Malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        // Options before the first Host line apply to every host
        let mut blocks = vec![HostBlock {
            patterns: vec!["*".to_string()],
            options: Vec::new(),
        }];

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((keyword, value)) = split_option(line) else {
                tracing::debug!("ssh config: skipping {:?}", line);
                continue;
            };
            let keyword = keyword.to_ascii_lowercase();

            if keyword == "host" {
                blocks.push(HostBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    options: Vec::new(),
                });
            } else if let Some(block) = blocks.last_mut() {
                block.options.push((keyword, unquote(value).to_string()));
            }
        }

        Self { blocks }
    }

    /// Load and parse the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read ssh config: {}", e)))?;
        Ok(Self::parse(&content))
    }

    /// Load the config at `path`, or an empty config if it cannot be read
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring ssh config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Value of `key` for `host`, from the first matching block that sets it
    pub fn get(&self, host: &str, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.blocks
            .iter()
            .filter(|b| b.matches(host))
            .find_map(|b| b.get(&key))
    }

    /// Private key file for `host`.
    ///
    /// An explicit path wins, then `IdentityFile`, then `~/.ssh/cpu_rsa`. A
    /// leading `~` is expanded to the home directory.
    pub fn resolve_key_file(&self, host: &str, explicit: Option<&Path>) -> PathBuf {
        let key_file = match explicit {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => match self.get(host, "IdentityFile") {
                Some(file) => {
                    tracing::debug!("key file from config is {:?}", file);
                    PathBuf::from(file)
                }
                None => default_key_file(),
            },
        };
        let key_file = expand_tilde(&key_file);
        tracing::debug!("using key file {:?}", key_file);
        key_file
    }

    /// Real host name for `host`: its `HostName`, or `host` itself
    pub fn resolve_host_name(&self, host: &str) -> String {
        self.get(host, "HostName")
            .filter(|h| !h.is_empty())
            .unwrap_or(host)
            .to_string()
    }

    /// Port for `host`.
    ///
    /// An explicit port wins, then `Port`. An empty result or the ssh port
    /// 22 becomes [`DEFAULT_PORT`].
    pub fn resolve_port(&self, host: &str, explicit: Option<&str>) -> Result<u16, ConfigError> {
        let port = match explicit {
            Some(p) if !p.is_empty() => p,
            _ => self.get(host, "Port").unwrap_or(""),
        };
        let port = if port.is_empty() || port == SSH_PORT {
            DEFAULT_PORT
        } else {
            port
        };
        tracing::debug!("resolved port for {:?}: {}", host, port);

        match port.parse::<u16>() {
            Ok(p) if p != 0 => Ok(p),
            _ => Err(ConfigError::InvalidPort(port.to_string())),
        }
    }
}

/// Split `Keyword value` or `Keyword=value`
fn split_option(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
    if keyword.is_empty() || rest.is_empty() {
        return None;
    }
    Some((keyword, rest))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Match `text` against an OpenSSH pattern with `*` and `?` wildcards
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi].eq_ignore_ascii_case(&t[ti])) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
# cpu hosts
Host rpi
    HostName 10.0.0.7
    Port 23
    IdentityFile ~/.ssh/rpi_key

Host *.lab !bad.lab
    Port=17777
    User lab

Host bad.lab
    Port 22

Host *
    IdentityFile "/etc/cpu/key"
"#;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*.lab", "node1.lab"));
        assert!(wildcard_match("node?", "node7"));
        assert!(wildcard_match("NODE", "node"));
        assert!(!wildcard_match("node?", "node"));
        assert!(!wildcard_match("*.lab", "lab"));
    }

    #[test]
    fn test_get_first_match_wins() {
        let config = SshConfig::parse(CONFIG);
        assert_eq!(config.get("rpi", "IdentityFile"), Some("~/.ssh/rpi_key"));
        assert_eq!(config.get("other", "identityfile"), Some("/etc/cpu/key"));
    }

    #[test]
    fn test_equals_separator_and_negation() {
        let config = SshConfig::parse(CONFIG);
        assert_eq!(config.get("n1.lab", "Port"), Some("17777"));
        assert_eq!(config.get("bad.lab", "Port"), Some("22"));
    }

    #[test]
    fn test_resolve_host_name() {
        let config = SshConfig::parse(CONFIG);
        assert_eq!(config.resolve_host_name("rpi"), "10.0.0.7");
        assert_eq!(config.resolve_host_name("unknown"), "unknown");
    }

    #[test]
    fn test_resolve_port() {
        let config = SshConfig::parse(CONFIG);
        assert_eq!(config.resolve_port("rpi", None).unwrap(), 23);
        assert_eq!(config.resolve_port("rpi", Some("9000")).unwrap(), 9000);
        assert_eq!(config.resolve_port("n1.lab", None).unwrap(), 17777);
        assert_eq!(config.resolve_port("bad.lab", None).unwrap(), 17010);
        assert_eq!(config.resolve_port("unknown", None).unwrap(), 17010);
        assert_eq!(config.resolve_port("unknown", Some("22")).unwrap(), 17010);
    }

    #[test]
    fn test_resolve_port_rejects_out_of_range() {
        let config = SshConfig::default();
        assert!(matches!(
            config.resolve_port("h", Some("70000")),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(config.resolve_port("h", Some("http")).is_err());
    }

    #[test]
    fn test_resolve_key_file() {
        let config = SshConfig::parse(CONFIG);
        assert_eq!(
            config.resolve_key_file("other", None),
            PathBuf::from("/etc/cpu/key")
        );
        assert_eq!(
            config.resolve_key_file("rpi", Some(Path::new("/k"))),
            PathBuf::from("/k")
        );
        let expanded = config.resolve_key_file("rpi", None);
        assert!(expanded.ends_with(".ssh/rpi_key"));
        assert!(!expanded.starts_with("~"));
    }

    #[test]
    fn test_resolve_key_file_default() {
        let config = SshConfig::default();
        assert!(config
            .resolve_key_file("h", None)
            .ends_with(".ssh/cpu_rsa"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        assert!(matches!(
            SshConfig::load(&path),
            Err(ConfigError::NotFound(_))
        ));
        assert!(SshConfig::load_or_default(&path).get("h", "Port").is_none());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "Host box\n  Port 1234\n").unwrap();
        let config = SshConfig::load(&path).unwrap();
        assert_eq!(config.resolve_port("box", None).unwrap(), 1234);
    }
}
