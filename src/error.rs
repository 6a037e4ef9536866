use thiserror::Error;

/// Unified error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The audio output device could not be acquired. Needs user interaction
    /// (e.g. picking another device) before trying again.
    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(String),

    #[error("Audio engine is not running")]
    EngineClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an asset could not be turned into a decoded buffer.
///
/// These never leave the loader: callers only ever see `None` and fall back
/// to synthesis.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("request for {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("could not read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {url}: {reason}")]
    Decode { url: String, reason: String },
}
