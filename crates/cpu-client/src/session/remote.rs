//! An open session on the remote cpud

use anyhow::{Context, Result};
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use cpu_core::escape::Multiplexer;

use super::connector::ClientHandler;
use super::sink::{ChannelSink, SinkMessage};
use super::Outputs;

/// Capacity of the stdin relay channel.
///
/// Each message is one keystroke (two for a released escape), so this only
/// fills when the connection stalls.
const STDIN_CHANNEL_CAPACITY: usize = 256;

/// SSH extended data type for stderr
const STDERR_EXT: u32 = 1;

/// One session channel on a connected, authenticated cpud
pub struct CpuSession {
    handle: Handle<ClientHandler>,
    channel: Channel<Msg>,
}

impl CpuSession {
    pub(crate) fn new(handle: Handle<ClientHandler>, channel: Channel<Msg>) -> Self {
        Self { handle, channel }
    }

    /// Wait for the server's reply to a request sent with `want_reply`
    async fn request_reply(&mut self) -> Result<bool> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(true),
                Some(ChannelMsg::Failure) => return Ok(false),
                Some(ChannelMsg::Close) | None => anyhow::bail!("session closed by server"),
                Some(other) => tracing::trace!("ignoring {:?} while awaiting reply", other),
            }
        }
    }

    /// Set session environment variables.
    ///
    /// Servers commonly refuse some variables; each refusal is logged and the
    /// remaining variables are still sent. Returns how many were accepted.
    pub async fn set_env(&mut self, vars: &[(String, String)]) -> Result<usize> {
        let mut accepted = 0;
        for (name, value) in vars {
            self.channel
                .set_env(true, name.as_str(), value.as_str())
                .await
                .with_context(|| format!("Failed to send setenv {}", name))?;
            if self.request_reply().await? {
                accepted += 1;
            } else {
                tracing::warn!("Server refused environment variable {:?}", name);
            }
        }
        tracing::debug!("{} of {} environment variables accepted", accepted, vars.len());
        Ok(accepted)
    }

    /// Ask for a remote PTY of the given type and size
    pub async fn request_pty(&mut self, term: &str, cols: u16, rows: u16) -> Result<()> {
        self.channel
            .request_pty(true, term, u32::from(cols), u32::from(rows), 0, 0, &[])
            .await
            .context("Failed to request PTY")?;
        if !self.request_reply().await? {
            anyhow::bail!("Server refused PTY request");
        }
        Ok(())
    }

    /// Run `command` remotely, or the user's shell when `None`
    pub async fn start(&mut self, command: Option<&str>) -> Result<()> {
        match command {
            Some(cmd) => {
                tracing::debug!("exec {:?}", cmd);
                self.channel
                    .exec(true, cmd)
                    .await
                    .context("Failed to send exec request")?;
            }
            None => {
                tracing::debug!("starting remote shell");
                self.channel
                    .request_shell(true)
                    .await
                    .context("Failed to request shell")?;
            }
        }
        if !self.request_reply().await? {
            anyhow::bail!("Server refused to start the command");
        }
        Ok(())
    }

    /// Forward a signal to the remote command
    pub async fn signal(&self, signal: Sig) -> Result<()> {
        self.channel
            .signal(signal)
            .await
            .context("Failed to forward signal")
    }

    /// Relay local stdin, stdout and stderr until the session ends.
    ///
    /// Stdin goes through the escape multiplexer on its own thread, so
    /// `<escape>.` at the start of a line closes the session. Ctrl-C is
    /// forwarded as `SIGINT`. Returns the remote exit status, if reported.
    pub async fn run_interactive(mut self, escape: u8) -> Result<Option<u32>> {
        let (sink, mut input_rx) = ChannelSink::new(STDIN_CHANNEL_CAPACITY);

        // A plain thread: a blocked stdin read must not keep the runtime alive
        std::thread::Builder::new()
            .name("stdin-relay".to_string())
            .spawn(move || {
                let mut sink = sink;
                let exit = Multiplexer::new(escape).run(&mut sink, std::io::stdin().lock());
                tracing::debug!("stdin relay finished: {:?}", exit);
            })
            .context("Failed to spawn stdin relay")?;

        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut exit_status = None;
        let mut input_open = true;

        loop {
            tokio::select! {
                msg = self.channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Close) | None => break,
                        Some(msg) => {
                            handle_output(msg, &mut stdout, &mut stderr, &mut exit_status).await?;
                        }
                    }
                }

                input = input_rx.recv(), if input_open => {
                    match input {
                        Some(SinkMessage::Data(data)) => {
                            self.channel
                                .data(&data[..])
                                .await
                                .context("Failed to send input")?;
                        }
                        Some(SinkMessage::Close) => {
                            tracing::info!("Closing session on escape request");
                            self.channel.close().await.ok();
                            break;
                        }
                        None => {
                            tracing::debug!("stdin closed, sending EOF");
                            input_open = false;
                            self.channel.eof().await.context("Failed to send EOF")?;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    self.signal(Sig::INT).await?;
                }
            }
        }

        self.disconnect().await;
        Ok(exit_status)
    }

    /// Run without stdin and collect the command's output
    pub async fn run_captured(mut self) -> Result<Outputs> {
        self.channel.eof().await.context("Failed to send EOF")?;

        let mut outputs = Outputs::default();
        loop {
            tokio::select! {
                msg = self.channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Close) | None => break,
                        Some(msg) => {
                            handle_output(
                                msg,
                                &mut outputs.stdout,
                                &mut outputs.stderr,
                                &mut outputs.exit_status,
                            )
                            .await?;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    self.signal(Sig::INT).await?;
                }
            }
        }

        self.disconnect().await;
        Ok(outputs)
    }

    async fn disconnect(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("disconnect: {}", e);
        }
    }
}

/// Route one channel message to the stdout or stderr writer
async fn handle_output<O, E>(
    msg: ChannelMsg,
    stdout: &mut O,
    stderr: &mut E,
    exit_status: &mut Option<u32>,
) -> Result<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    match msg {
        ChannelMsg::Data { data } => {
            stdout.write_all(&data).await.context("Stdout")?;
            stdout.flush().await.context("Stdout")?;
        }
        ChannelMsg::ExtendedData { data, ext } if ext == STDERR_EXT => {
            stderr.write_all(&data).await.context("Stderr")?;
            stderr.flush().await.context("Stderr")?;
        }
        ChannelMsg::ExitStatus { exit_status: code } => {
            tracing::debug!("remote exit status {}", code);
            *exit_status = Some(code);
        }
        ChannelMsg::ExitSignal {
            signal_name,
            error_message,
            ..
        } => {
            tracing::warn!("remote command killed by {:?}: {}", signal_name, error_message);
        }
        ChannelMsg::Eof => tracing::debug!("remote EOF"),
        other => tracing::trace!("ignoring {:?}", other),
    }
    Ok(())
}
