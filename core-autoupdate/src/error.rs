use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoUpdateError {
    #[error("Cached file {path} does not exist")]
    NotCached { path: PathBuf },

    #[error("Failed to watch {path}: {source}")]
    WatchArmFailure {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to stop watching {path}: {source}")]
    WatchDisarmFailure {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Upload of {path} failed: {message}")]
    UploadFailure { path: PathBuf, message: String },

    #[error("Change event for unwatched path {path}")]
    StaleEvent { path: PathBuf },

    #[error("Auto-update service is not running")]
    ServiceStopped,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, AutoUpdateError>;
