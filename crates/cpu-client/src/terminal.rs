//! Local terminal handling for interactive sessions

use std::io::IsTerminal;

use anyhow::Result;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size};

/// Terminal type sent with a PTY request when `TERM` is unset
const DEFAULT_TERM: &str = "xterm-256color";

/// Keeps the local terminal in raw mode until dropped
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Enter raw mode
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Whether stdin is attached to a terminal
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

/// Local terminal type and size for a PTY request
pub fn pty_params() -> (String, u16, u16) {
    let term = std::env::var("TERM").unwrap_or_else(|_| DEFAULT_TERM.to_string());
    let (cols, rows) = size().unwrap_or((80, 24));
    (term, cols, rows)
}
