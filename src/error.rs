//! Error types for harmony-player
//!
//! Library code returns [`PlaybackError`]; the binary wraps it in `anyhow` at the edge.

use std::time::Duration;
use thiserror::Error;

use crate::audio::EngineError;
use crate::model::PlaybackStatus;

/// Main error type for the playback core
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Requested position lies outside the current track
    #[error("Invalid position: {position:?} (track duration {duration:?})")]
    InvalidPosition {
        position: Duration,
        duration: Duration,
    },

    /// Operation needs a track but the queue is empty.
    /// Callers treat this as a no-op rather than a failure.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Audio engine failed to prepare or play
    #[error("Audio engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),

    /// Status change not allowed by the session state machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: PlaybackStatus,
        to: PlaybackStatus,
    },

    /// Queue index out of range
    #[error("Index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The session task has shut down
    #[error("Session closed")]
    SessionClosed,

    /// A playback service is already running in this process
    #[error("Playback service already running")]
    AlreadyRunning,

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using [`PlaybackError`]
pub type Result<T> = std::result::Result<T, PlaybackError>;
