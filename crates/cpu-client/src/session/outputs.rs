//! Collected command output

/// Everything a non-interactive command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status reported by the server, if any
    pub exit_status: Option<u32>,
}

impl Outputs {
    /// True if the server reported exit status 0
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}
