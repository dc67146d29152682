//! Byte relay from local input to the session

use std::io::{self, ErrorKind, Read, Write};

use super::{Action, EscapeState, DEFAULT_ESCAPE_CHAR};

/// The input side of a remote session: a byte sink that can be closed.
///
/// Closing ends the whole session, which releases anything waiting on the
/// session from the other direction.
pub trait SessionSink: Write {
    fn close(&mut self) -> io::Result<()>;
}

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Input reached end of stream or failed to read
    InputClosed,
    /// Writing to the session failed
    OutputClosed,
    /// The user typed the disconnect sequence
    Disconnected,
}

/// Escape-watching stdin relay for one session
#[derive(Debug, Clone)]
pub struct Multiplexer {
    escape: u8,
    state: EscapeState,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_CHAR)
    }
}

impl Multiplexer {
    /// Create a multiplexer using `escape` as the escape character
    pub fn new(escape: u8) -> Self {
        Self {
            escape,
            state: EscapeState::default(),
        }
    }

    pub fn state(&self) -> EscapeState {
        self.state
    }

    /// Advance the state machine by one byte
    pub fn feed(&mut self, byte: u8) -> Action {
        let (action, next) = self.state.next(byte, self.escape);
        self.state = next;
        action
    }

    /// Relay `input` into `output` until input ends, output fails, or the
    /// user disconnects.
    ///
    /// I/O failures are the normal way for a relay to end and are not
    /// reported as errors. An escape character still held when input ends is
    /// dropped.
    pub fn run<W, R>(mut self, output: &mut W, mut input: R) -> RelayExit
    where
        W: SessionSink + ?Sized,
        R: Read,
    {
        let mut byte = [0u8; 1];
        loop {
            match input.read(&mut byte) {
                Ok(0) => return RelayExit::InputClosed,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("stdin read failed: {}", e);
                    return RelayExit::InputClosed;
                }
            }

            let written = match self.feed(byte[0]) {
                Action::Forward(b) => output.write_all(&[b]),
                Action::ForwardEscaped(b) => output.write_all(&[self.escape, b]),
                Action::Hold => Ok(()),
                Action::Disconnect => {
                    tracing::debug!("escape sequence: closing session");
                    if let Err(e) = output.close() {
                        tracing::debug!("session close failed: {}", e);
                    }
                    return RelayExit::Disconnected;
                }
            };

            if let Err(e) = written.and_then(|_| output.flush()) {
                tracing::debug!("session write failed: {}", e);
                return RelayExit::OutputClosed;
            }
        }
    }
}

/// Relay `input` into `output` with the default escape character.
pub fn relay<W, R>(output: &mut W, input: R) -> RelayExit
where
    W: SessionSink + ?Sized,
    R: Read,
{
    Multiplexer::default().run(output, input)
}
