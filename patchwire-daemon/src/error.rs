use std::path::PathBuf;

use thiserror::Error;

/// Error surface for daemon settings, runtime and protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `dirs::home_dir()` returned `None` while a default path was needed.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("settings file not found: {path}")]
    SettingsNotFound { path: PathBuf },

    #[error("invalid settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("render error: {0}")]
    Render(#[from] patchwire_renderer::RenderError),

    #[error("session error: {0}")]
    Session(#[from] patchwire_sync::SessionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
