//! Mount table fragments

use std::fmt;
use std::path::Path;

use super::BindEntry;

/// Line terminators stripped from the end of each fragment before joining
const LINE_TERMINATORS: [char; 2] = ['\n', '\r'];

/// An ordered, newline-terminated sequence of fstab lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable(String);

impl MountTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the line for `entry`
    pub fn push(&mut self, entry: &BindEntry, mount_root: &Path) {
        self.0.push_str(&entry.mount_line(mount_root));
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the lines, without terminators
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.lines()
    }
}

impl AsRef<str> for MountTable {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join fstab-style fragments that may carry too many or too few trailing
/// newlines.
///
/// Empty fragments are skipped. The result has exactly one trailing newline
/// and no blank lines between fragments, or is empty if every fragment was.
pub fn join_fstab<S: AsRef<str>>(tables: &[S]) -> String {
    let parts: Vec<&str> = tables
        .iter()
        .map(|t| t.as_ref().trim_end_matches(LINE_TERMINATORS))
        .filter(|t| !t.is_empty())
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    let mut joined = parts.join("\n");
    joined.push('\n');
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_nothing() {
        let empty: [&str; 0] = [];
        assert_eq!(join_fstab(&empty), "");
        assert_eq!(join_fstab(&[""]), "");
        assert_eq!(join_fstab(&["", ""]), "");
    }

    #[test]
    fn test_join_normalizes_newlines() {
        assert_eq!(join_fstab(&["a\n\n", "b"]), "a\nb\n");
    }

    #[test]
    fn test_join_skips_empty_fragments() {
        assert_eq!(join_fstab(&["a", "", "b\n"]), "a\nb\n");
    }

    #[test]
    fn test_join_strips_carriage_returns() {
        assert_eq!(join_fstab(&["a\r\n", "b\r\n"]), "a\nb\n");
    }

    #[test]
    fn test_join_is_idempotent() {
        let once = join_fstab(&["a", "b"]);
        assert_eq!(join_fstab(&[once.as_str()]), once);
    }

    #[test]
    fn test_join_accepts_owned_strings() {
        let tables = vec!["x".to_string(), "y\n".to_string()];
        assert_eq!(join_fstab(&tables), "x\ny\n");
    }

    #[test]
    fn test_mount_table_display() {
        let mut table = MountTable::new();
        let entry = BindEntry::parse(0, "/opt").unwrap();
        table.push(&entry, Path::new("/tmp"));
        assert_eq!(
            table.to_string(),
            "/tmp/cpu/opt /opt none defaults,bind 0 0\n"
        );
        assert_eq!(table.lines().count(), 1);
    }
}
