//! Snapshot of the session handed to the host and the UI

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::playback::PlaybackState;
use super::queue::QueueManager;
use super::types::{duration_ms, PlaybackStatus, RepeatState, Track};

/// Complete session information for display surfaces
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub queue_index: Option<usize>,
    pub queue_len: usize,
    pub repeat: RepeatState,
    pub shuffle: bool,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn capture(session_id: &str, state: &PlaybackState, queue: &QueueManager) -> Self {
        Self {
            session_id: session_id.to_string(),
            status: state.status,
            track: state.track.clone(),
            position_ms: duration_ms::to_millis(&state.position),
            duration_ms: duration_ms::to_millis(&state.duration()),
            queue_index: queue.current_index(),
            queue_len: queue.len(),
            repeat: queue.repeat_mode(),
            shuffle: queue.shuffle(),
            error: state.error.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Same content, ignoring the timestamp
    pub fn same_state(&self, other: &SessionSnapshot) -> bool {
        self.status == other.status
            && self.track == other.track
            && self.position_ms == other.position_ms
            && self.queue_index == other.queue_index
            && self.queue_len == other.queue_len
            && self.repeat == other.repeat
            && self.shuffle == other.shuffle
            && self.error == other.error
    }
}
