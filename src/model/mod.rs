//! Model module - Playback state and queue
//!
//! - `types`: Core type definitions (track, repeat mode, status)
//! - `playback`: The playback state store and its observers
//! - `queue`: Ordered queue with repeat/shuffle policy
//! - `snapshot`: Serializable state published to the host session

mod types;
mod playback;
mod queue;
mod snapshot;

pub use types::{PlaybackStatus, RepeatState, Track};

pub use playback::{PlaybackState, PlaybackStateStore, SubscriptionId};

pub use queue::{QueueManager, QueueStep, Removal};

pub use snapshot::SessionSnapshot;
