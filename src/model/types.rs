//! Core type definitions for the playback core

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// A single playable audio item. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    #[serde(with = "duration_ms")]
    duration: Duration,
    uri: String,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration: Duration,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration,
            uri: uri.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    All,
    One,
}

impl RepeatState {
    /// Off -> All -> One -> Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatState::Off => RepeatState::All,
            RepeatState::All => RepeatState::One,
            RepeatState::One => RepeatState::Off,
        }
    }
}

impl fmt::Display for RepeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatState::Off => write!(f, "off"),
            RepeatState::All => write!(f, "all"),
            RepeatState::One => write!(f, "one"),
        }
    }
}

/// Transport status of the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Preparing,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl PlaybackStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Every state may fall back to `Idle` (queue emptied or replaced).
    /// `Ended` is terminal otherwise.
    pub fn can_transition_to(self, next: PlaybackStatus) -> bool {
        use PlaybackStatus::*;

        if self == next || next == Idle {
            return true;
        }
        match self {
            Idle => matches!(next, Preparing),
            Preparing => matches!(next, Playing | Paused | Ended),
            Playing => matches!(next, Paused | Buffering | Preparing | Ended),
            Buffering => matches!(next, Playing | Paused | Preparing | Ended),
            Paused => matches!(next, Playing | Preparing | Ended),
            Ended => false,
        }
    }

    /// Playing or about to be (buffering keeps the intent to play)
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Buffering)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Preparing => "preparing",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Buffering => "buffering",
            PlaybackStatus::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}

/// Serialize a `Duration` as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Whole milliseconds, saturating at `u64::MAX`
    pub fn to_millis(value: &Duration) -> u64 {
        u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(to_millis(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_cycle() {
        assert_eq!(RepeatState::Off.cycle(), RepeatState::All);
        assert_eq!(RepeatState::All.cycle(), RepeatState::One);
        assert_eq!(RepeatState::One.cycle(), RepeatState::Off);
    }

    #[test]
    fn test_ended_is_terminal() {
        use PlaybackStatus::*;
        for next in [Preparing, Playing, Paused, Buffering] {
            assert!(!Ended.can_transition_to(next), "ended -> {} must be rejected", next);
        }
        assert!(Ended.can_transition_to(Idle));
    }

    #[test]
    fn test_idle_only_enters_preparing() {
        use PlaybackStatus::*;
        assert!(Idle.can_transition_to(Preparing));
        assert!(!Idle.can_transition_to(Playing));
        assert!(!Idle.can_transition_to(Paused));
        assert!(!Idle.can_transition_to(Ended));
    }

    #[test]
    fn test_track_serializes_duration_as_ms() {
        let track = Track::new("a", "Song", "Band", Duration::from_secs(3), "file:///a.mp3");
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["duration"], 3000);
        assert_eq!(json["uri"], "file:///a.mp3");
    }
}
