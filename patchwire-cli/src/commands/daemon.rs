//! `patchwire serve|status|stop`: daemon lifecycle.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use patchwire_daemon::paths::SETTINGS_FILE;
use patchwire_daemon::{request_status, request_stop, start_blocking, DaemonError, Settings};

/// Where to find the daemon socket.
#[derive(Args, Debug)]
pub struct SocketArgs {
    /// Settings file naming the socket.
    #[arg(long, default_value = SETTINGS_FILE)]
    pub config: PathBuf,

    /// Socket path; takes precedence over --config.
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

impl SocketArgs {
    fn socket(&self) -> Result<PathBuf> {
        if let Some(socket) = &self.socket {
            return Ok(socket.clone());
        }
        let settings = Settings::load_at(&self.config)
            .with_context(|| format!("load settings from {}", self.config.display()))?;
        Ok(settings.socket)
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Settings file.
    #[arg(long, default_value = SETTINGS_FILE)]
    pub config: PathBuf,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let settings = Settings::load_at(&self.config)
            .with_context(|| format!("load settings from {}", self.config.display()))?;
        start_blocking(settings).context("daemon exited with error")
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: SocketArgs,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.target.socket()?;
        let status = match request_status(&socket) {
            Ok(status) => status,
            Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                "running": false,
                "socket": socket.display().to_string(),
            }),
            Err(err) => return Err(err).context("failed to query daemon status"),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("failed to render daemon status JSON")?
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub target: SocketArgs,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.target.socket()?;
        match request_stop(&socket) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
            Err(err) => bail!("failed to stop daemon: {err}"),
        }
        Ok(())
    }
}
