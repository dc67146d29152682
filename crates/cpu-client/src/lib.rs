//! cpu-client: SSH client side of `cpu`
//!
//! Connects to a remote `cpud`, sends the session namespace and environment,
//! runs a command there and relays I/O, with `~.` available to drop the
//! session.

pub mod output;
pub mod session;
pub mod terminal;

pub use session::{ConnectionError, Connector, CpuSession, Outputs, SessionTarget};
