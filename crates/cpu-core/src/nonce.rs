//! Per-session nonce

use std::fmt;

use rand::RngCore;

/// Number of random bytes behind a nonce; the printable form is twice as long
const NONCE_BYTES: usize = 16;

/// A 32-character lowercase hex identifier for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh nonce from the thread-local random generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
