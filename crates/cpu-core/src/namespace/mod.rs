//! Namespace description sent to the remote `cpud`
//!
//! The user describes which local paths should appear on the remote side with
//! a compact bind list (`CPU_NAMESPACE=/home:/usr/lib=/lib`). This module
//! compiles that list into fstab lines anchored under the session mount root,
//! and joins fstab fragments from several sources into one table.

mod bind;
mod fstab;

pub use bind::{parse_binds, BindEntry, BIND_SEPARATOR};
pub use fstab::{join_fstab, MountTable};

use std::path::Path;

use crate::error::BindError;

/// Environment variable the bind list is read from by default
pub const NAMESPACE_ENV: &str = "CPU_NAMESPACE";

/// Session environment variable the mount table is sent in
pub const FSTAB_ENV: &str = "CPU_FSTAB";

/// Compile a bind specification into a mount table.
///
/// Compilation is all-or-nothing: the first invalid entry aborts it and no
/// partial table is returned. An empty specification yields an empty table.
pub fn compile(spec: &str, mount_root: &Path) -> Result<MountTable, BindError> {
    let entries = parse_binds(spec)?;
    let mut table = MountTable::new();
    for entry in &entries {
        table.push(entry, mount_root);
    }
    tracing::debug!(entries = entries.len(), "compiled bind specification");
    Ok(table)
}
