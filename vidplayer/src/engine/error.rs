use thiserror::Error;

/**
    Errors surfaced by the playback engine.

    Mirrors the error kinds the core distinguishes: operations cancelled by
    shutdown, transient conditions a caller should retry, and fatal failures
    that prevent the engine from reaching the running state.
*/
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("aborted")]
    Aborted,

    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("media library error: {0}")]
    Media(#[from] ffmpeg_types::Error),
}

impl EngineError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
