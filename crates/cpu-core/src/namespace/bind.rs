//! Bind list parsing

use std::path::Path;

use crate::error::BindError;

/// Separator between entries of a bind list
pub const BIND_SEPARATOR: char = ':';

/// Separator between the local and remote halves of one entry
const PAIR_SEPARATOR: char = '=';

/// One requested bind: `local` is where the path appears, `remote` is the
/// device-side path relative to `<mount root>/cpu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindEntry {
    pub local: String,
    pub remote: String,
}

impl BindEntry {
    /// Parse entry number `index` of a bind list.
    ///
    /// `path` binds a path to itself; `local=remote` binds two different
    /// paths. Only the first `=` splits the entry, so file names may contain
    /// further `=` characters.
    pub fn parse(index: usize, raw: &str) -> Result<Self, BindError> {
        if raw.is_empty() {
            return Err(BindError::EmptyEntry { index });
        }

        let (local, remote) = raw.split_once(PAIR_SEPARATOR).unwrap_or((raw, raw));

        if local.is_empty() {
            return Err(BindError::EmptyLocal {
                index,
                entry: raw.to_string(),
            });
        }
        if remote.is_empty() {
            return Err(BindError::EmptyRemote {
                index,
                entry: raw.to_string(),
            });
        }

        Ok(Self {
            local: local.to_string(),
            remote: remote.to_string(),
        })
    }

    /// The bind-mount source under `mount_root`.
    ///
    /// In a bind mount the remote side is the "device" and the local path is
    /// the "target".
    pub fn device_path(&self, mount_root: &Path) -> String {
        let root = mount_root.to_string_lossy();
        clean_join(&[&root, "cpu", &self.remote])
    }

    /// The fstab line for this entry, including its trailing newline
    pub fn mount_line(&self, mount_root: &Path) -> String {
        format!(
            "{} {} none defaults,bind 0 0\n",
            self.device_path(mount_root),
            self.local
        )
    }
}

/// Split a bind list into validated entries, in order.
pub fn parse_binds(spec: &str) -> Result<Vec<BindEntry>, BindError> {
    if spec.is_empty() {
        return Ok(Vec::new());
    }
    spec.split(BIND_SEPARATOR)
        .enumerate()
        .map(|(index, raw)| BindEntry::parse(index, raw))
        .collect()
}

/// Join path elements with `/` and clean the result lexically.
fn clean_join(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .copied()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    clean(&joined)
}

/// Lexical path cleaning: drops empty and `.` elements and resolves `..`
/// against the preceding element. Never touches the filesystem.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for elem in path.split('/') {
        match elem {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|e| *e != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            e => out.push(e),
        }
    }

    let body = out.join("/");
    if rooted {
        format!("/{}", body)
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}
