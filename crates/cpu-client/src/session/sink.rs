//! Bridge from the blocking stdin relay to the async session loop

use std::io::{self, ErrorKind, Write};

use tokio::sync::mpsc;

use cpu_core::escape::SessionSink;

/// Messages from the stdin relay thread to the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    /// Bytes to send to the remote side
    Data(Vec<u8>),
    /// The user asked to close the session
    Close,
}

/// A [`SessionSink`] that hands bytes to the session loop over a channel.
///
/// Must be used from a plain thread, not from inside the async runtime. Once
/// the session loop drops its receiver every write fails with `BrokenPipe`,
/// which stops the relay.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver the session loop reads from
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, message: SinkMessage) -> io::Result<()> {
        self.tx
            .blocking_send(message)
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "session closed"))
    }
}

impl Write for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.send(SinkMessage::Data(buf.to_vec()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SessionSink for ChannelSink {
    fn close(&mut self) -> io::Result<()> {
        self.send(SinkMessage::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpu_core::escape::{relay, RelayExit};

    #[test]
    fn test_relay_through_channel() {
        let (mut sink, mut rx) = ChannelSink::new(16);
        let exit = relay(&mut sink, &b"ok\n~."[..]);
        assert_eq!(exit, RelayExit::Disconnected);

        let mut received = Vec::new();
        while let Ok(message) = rx.try_recv() {
            received.push(message);
        }
        assert_eq!(
            received,
            vec![
                SinkMessage::Data(b"o".to_vec()),
                SinkMessage::Data(b"k".to_vec()),
                SinkMessage::Data(b"\n".to_vec()),
                SinkMessage::Close,
            ]
        );
    }

    #[test]
    fn test_write_after_receiver_dropped() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        let err = sink.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert_eq!(relay(&mut sink, &b"abc"[..]), RelayExit::OutputClosed);
    }
}
