//! cpu-core: Core abstractions and configuration for the cpu client
//!
//! This crate holds the transport-independent pieces of the client: the
//! bind-specification compiler that produces the remote mount table, the
//! escape-sequence stdin multiplexer, SSH-config lookups and the client
//! configuration.

pub mod config;
pub mod env;
pub mod error;
pub mod escape;
pub mod namespace;
pub mod nonce;
pub mod ssh_config;

pub use error::CpuError;
pub use nonce::Nonce;
