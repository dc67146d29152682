//! Escape-sequence handling for interactive stdin
//!
//! Keystrokes are relayed to the remote side one byte at a time. Typing the
//! escape character (`~` by default) as the first character of a line and
//! then `.` closes the session instead of forwarding anything, the same
//! gesture `ssh` uses.

mod relay;
mod state;

pub use relay::{relay, Multiplexer, RelayExit, SessionSink};
pub use state::{Action, EscapeState};

/// Default escape character
pub const DEFAULT_ESCAPE_CHAR: u8 = b'~';

/// Byte that, following an escape character, closes the session
pub const DISCONNECT_CHAR: u8 = b'.';
