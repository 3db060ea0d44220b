//! Playback state and the store that owns it

use std::time::Duration;
use serde::Serialize;
use tokio::sync::watch;

use super::types::{PlaybackStatus, Track};
use crate::error::{PlaybackError, Result};

/// Current track, position and status
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    pub track: Option<Track>,
    #[serde(with = "super::types::duration_ms")]
    pub position: Duration,
    pub status: PlaybackStatus,
    /// Last engine failure surfaced to the UI
    pub error: Option<String>,
}

impl PlaybackState {
    pub fn duration(&self) -> Duration {
        self.track.as_ref().map(Track::duration).unwrap_or_default()
    }
}

/// Handle returned by [`PlaybackStateStore::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&PlaybackState) + Send + Sync>;

/// Owner of the process-wide [`PlaybackState`].
///
/// Every mutation goes through a method here, which checks the invariants and
/// then notifies observers synchronously, in subscription order. A `watch`
/// channel mirrors the latest state for readers that must not block.
pub struct PlaybackStateStore {
    state: PlaybackState,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    watch_tx: watch::Sender<PlaybackState>,
}

impl PlaybackStateStore {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(PlaybackState::default());
        Self {
            state: PlaybackState::default(),
            observers: Vec::new(),
            next_subscription: 0,
            watch_tx,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    pub fn position(&self) -> Duration {
        self.state.position
    }

    pub fn track(&self) -> Option<&Track> {
        self.state.track.as_ref()
    }

    pub fn set_status(&mut self, status: PlaybackStatus) -> Result<()> {
        let from = self.state.status;
        if !from.can_transition_to(status) {
            return Err(PlaybackError::InvalidTransition { from, to: status });
        }
        if from == status {
            return Ok(());
        }
        tracing::debug!(%from, to = %status, "Playback status changed");
        self.state.status = status;
        if status == PlaybackStatus::Idle {
            self.state.position = Duration::ZERO;
        }
        self.notify();
        Ok(())
    }

    /// Move to `position` within the current track.
    ///
    /// Fails with `InvalidPosition` past the end of the track, and with
    /// `EmptyQueue` when no track is loaded.
    pub fn set_position(&mut self, position: Duration) -> Result<()> {
        let Some(track) = &self.state.track else {
            return Err(PlaybackError::EmptyQueue);
        };
        let duration = track.duration();
        if position > duration {
            return Err(PlaybackError::InvalidPosition { position, duration });
        }
        self.state.position = position;
        self.notify();
        Ok(())
    }

    /// Engine-reported positions may overshoot slightly; pin them to the track.
    pub fn clamp_position(&mut self, position: Duration) {
        let clamped = position.min(self.state.duration());
        if clamped != self.state.position {
            self.state.position = clamped;
            self.notify();
        }
    }

    /// Load `track` as the current track, rewound to the start
    pub fn advance(&mut self, track: Track) {
        tracing::debug!(track_id = %track.id(), title = %track.title(), "Advancing to track");
        self.state.track = Some(track);
        self.state.position = Duration::ZERO;
        self.notify();
    }

    /// Drop the current track and return to idle
    pub fn clear(&mut self) {
        self.state = PlaybackState::default();
        self.notify();
    }

    pub fn set_error(&mut self, error: Option<String>) {
        if self.state.error != error {
            self.state.error = error;
            self.notify();
        }
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&PlaybackState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Non-blocking view of the latest state
    pub fn watch(&self) -> watch::Receiver<PlaybackState> {
        self.watch_tx.subscribe()
    }

    fn notify(&self) {
        for (_, observer) in &self.observers {
            observer(&self.state);
        }
        self.watch_tx.send_replace(self.state.clone());
    }
}

impl Default for PlaybackStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn track(secs: u64) -> Track {
        Track::new("t1", "Title", "Artist", Duration::from_secs(secs), "file:///t1.mp3")
    }

    #[test]
    fn test_set_position_within_track() {
        let mut store = PlaybackStateStore::new();
        store.advance(track(180));

        for secs in [0, 1, 90, 179, 180] {
            let p = Duration::from_secs(secs);
            store.set_position(p).unwrap();
            assert_eq!(store.position(), p);
        }
    }

    #[test]
    fn test_set_position_past_end_is_rejected() {
        let mut store = PlaybackStateStore::new();
        store.advance(track(180));
        store.set_position(Duration::from_secs(30)).unwrap();

        let err = store.set_position(Duration::from_secs(181)).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidPosition { .. }));
        assert_eq!(store.position(), Duration::from_secs(30));
    }

    #[test]
    fn test_set_position_without_track() {
        let mut store = PlaybackStateStore::new();
        let err = store.set_position(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PlaybackError::EmptyQueue));
    }

    #[test]
    fn test_clamp_position() {
        let mut store = PlaybackStateStore::new();
        store.advance(track(10));
        store.clamp_position(Duration::from_millis(10_250));
        assert_eq!(store.position(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut store = PlaybackStateStore::new();
        let err = store.set_status(PlaybackStatus::Playing).unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::InvalidTransition { from: PlaybackStatus::Idle, to: PlaybackStatus::Playing }
        ));
        assert_eq!(store.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn test_observers_notified_synchronously() {
        let mut store = PlaybackStateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let id = store.subscribe(move |state| seen_clone.lock().unwrap().push(state.status));

        store.advance(track(60));
        store.set_status(PlaybackStatus::Preparing).unwrap();
        store.set_status(PlaybackStatus::Playing).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PlaybackStatus::Idle, PlaybackStatus::Preparing, PlaybackStatus::Playing]
        );

        assert!(store.unsubscribe(id));
        store.set_status(PlaybackStatus::Paused).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_watch_sees_latest_state() {
        let mut store = PlaybackStateStore::new();
        let rx = store.watch();
        store.advance(track(60));
        store.set_position(Duration::from_secs(12)).unwrap();
        assert_eq!(rx.borrow().position, Duration::from_secs(12));
        assert_eq!(rx.borrow().track.as_ref().map(|t| t.id().to_string()), Some("t1".to_string()));
    }

    #[test]
    fn test_idle_resets_position() {
        let mut store = PlaybackStateStore::new();
        store.advance(track(60));
        store.set_status(PlaybackStatus::Preparing).unwrap();
        store.set_position(Duration::from_secs(5)).unwrap();
        store.set_status(PlaybackStatus::Idle).unwrap();
        assert_eq!(store.position(), Duration::ZERO);
    }
}
