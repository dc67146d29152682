//! cpu client
//!
//! Runs a command on a remote cpud. The remote side sees the local
//! namespace described by `--namespace` / `CPU_NAMESPACE`; typing `~.` at
//! the start of a line drops the session.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cpu_client::output::{print_error, print_warning};
use cpu_client::terminal::{self, RawModeGuard};
use cpu_client::{Connector, SessionTarget};
use cpu_core::config::{self, ClientConfig};
use cpu_core::env::{session_env, NONCE_ENV};
use cpu_core::namespace::{FSTAB_ENV, NAMESPACE_ENV};
use cpu_core::Nonce;

#[derive(Parser)]
#[command(name = "cpu")]
#[command(author, version, about = "Run commands on a remote cpud with your local namespace")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Private key file (default: ssh config IdentityFile, then ~/.ssh/cpu_rsa)
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Public host key to pin the server to
    #[arg(long)]
    host_key: Option<PathBuf>,

    /// Port to connect to (default: ssh config Port, then 17010)
    #[arg(short, long)]
    port: Option<String>,

    /// Remote user name
    #[arg(short, long)]
    user: Option<String>,

    /// Bind list, e.g. /home:/usr/lib=/lib (default: $CPU_NAMESPACE)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Extra fstab file to send along with the bind list
    #[arg(long)]
    fstab: Option<PathBuf>,

    /// Remote directory the cpu mount point lives under
    #[arg(long)]
    mount_root: Option<PathBuf>,

    /// Escape character for line-start commands
    #[arg(short, long)]
    escape_char: Option<char>,

    /// Connection timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Extra environment variable for the session (repeatable)
    #[arg(long = "env", value_name = "NAME=VALUE")]
    envs: Vec<String>,

    /// Collect output instead of relaying the terminal
    #[arg(long)]
    capture: bool,

    /// Print the mount table that would be sent and exit
    #[arg(long)]
    print_fstab: bool,

    /// Host to connect to (ssh config aliases are resolved)
    #[arg(required_unless_present = "print_fstab")]
    host: Option<String>,

    /// Command to run (default: remote shell)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Load the config file and apply command-line overrides
fn load_client_config(cli: &Cli) -> ClientConfig {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };

    if let Some(key) = &cli.key {
        config.private_key_path = Some(key.clone());
    }
    if let Some(host_key) = &cli.host_key {
        config.host_key_path = Some(host_key.clone());
    }
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(user) = &cli.user {
        config.username = Some(user.clone());
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = Some(namespace.clone());
    } else if config.namespace.is_none() {
        config.namespace = std::env::var(NAMESPACE_ENV).ok();
    }
    if let Some(fstab) = &cli.fstab {
        config.fstab_path = Some(fstab.clone());
    }
    if let Some(mount_root) = &cli.mount_root {
        config.mount_root = mount_root.clone();
    }
    if let Some(escape_char) = cli.escape_char {
        config.escape_char = escape_char;
    }
    if let Some(timeout) = cli.timeout {
        config.connect_timeout = Duration::from_secs(timeout);
    }
    config.env.extend(cli.envs.iter().cloned());

    config
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_client_config(&cli);

    let fstab = config.fstab().context("Invalid namespace")?;
    if cli.print_fstab {
        print!("{}", fstab);
        std::io::stdout().flush()?;
        return Ok(0);
    }

    let escape = config.escape_byte()?;
    let host = cli.host.as_deref().context("No host given")?;
    let target = SessionTarget::resolve(host, &config)?;
    tracing::info!("Connecting to {} as {}", target.address(), target.username);

    let connector = Connector::new(target)?;
    let mut session = connector.connect().await?;

    let mut env = session_env(&config.env);
    env.push((NONCE_ENV.to_string(), Nonce::generate().to_string()));
    if !fstab.is_empty() {
        env.push((FSTAB_ENV.to_string(), fstab));
    }
    let sent = env.len();
    if session.set_env(&env).await? < sent {
        tracing::info!("Some environment variables were not accepted by the server");
    }

    let command = (!cli.command.is_empty()).then(|| cli.command.join(" "));

    if cli.capture {
        session.start(command.as_deref()).await?;
        let outputs = session.run_captured().await?;
        std::io::stdout().write_all(&outputs.stdout)?;
        std::io::stderr().write_all(&outputs.stderr)?;
        if !outputs.success() {
            tracing::info!("remote command did not succeed: {:?}", outputs.exit_status);
        }
        return Ok(exit_code(outputs.exit_status));
    }

    let tty = terminal::stdin_is_terminal();
    if tty {
        let (term, cols, rows) = terminal::pty_params();
        session.request_pty(&term, cols, rows).await?;
    }
    session.start(command.as_deref()).await?;

    let status = {
        let _raw_mode = if tty { Some(RawModeGuard::enter()?) } else { None };
        session.run_interactive(escape).await?
    };
    if status.is_none() {
        print_warning("Session ended without an exit status");
    }
    Ok(exit_code(status))
}

/// Map a remote exit status onto a local process exit code
fn exit_code(status: Option<u32>) -> u8 {
    status.map_or(0, |s| u8::try_from(s).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(0)), 0);
        assert_eq!(exit_code(Some(42)), 42);
        assert_eq!(exit_code(Some(300)), 255);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "cpu",
            "--config",
            "/nonexistent/cpu.toml",
            "-n",
            "/a=/b",
            "--mount-root",
            "/run",
            "-e",
            "%",
            "--env",
            "X=1",
            "host",
            "ls",
            "-l",
        ]);
        assert_eq!(cli.command, vec!["ls", "-l"]);

        let config = load_client_config(&cli);
        assert_eq!(config.namespace.as_deref(), Some("/a=/b"));
        assert_eq!(config.mount_root, PathBuf::from("/run"));
        assert_eq!(config.escape_char, '%');
        assert_eq!(config.env, vec!["X=1".to_string()]);
    }
}
