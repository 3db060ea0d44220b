//! Queue Manager
//!
//! Ordered track list, current position and the repeat/shuffle policy.
//!
//! The list order is what the user sees. Playback follows `order`, which is
//! the identity permutation unless shuffle is on.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::types::{RepeatState, Track};
use crate::error::{PlaybackError, Result};

/// Outcome of moving through the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueStep {
    /// Queue is empty, nothing happened
    Empty,
    /// Moved to the neighbouring track at this list index
    Moved(usize),
    /// Wrapped around the end (or start) of the queue
    Wrapped(usize),
    /// Repeat-one: the same track plays again
    Repeated(usize),
    /// Repeat is off and there is nothing further; index unchanged
    Boundary(usize),
}

impl QueueStep {
    pub fn index(self) -> Option<usize> {
        match self {
            QueueStep::Empty => None,
            QueueStep::Moved(i)
            | QueueStep::Wrapped(i)
            | QueueStep::Repeated(i)
            | QueueStep::Boundary(i) => Some(i),
        }
    }

    /// Whether the step selected a track that has to be (re)loaded
    pub fn loads_track(self) -> bool {
        matches!(self, QueueStep::Moved(_) | QueueStep::Wrapped(_) | QueueStep::Repeated(_))
    }
}

/// Result of [`QueueManager::remove_at`]
#[derive(Clone, Debug)]
pub struct Removal {
    pub track: Track,
    /// The removed track was the current one
    pub current_changed: bool,
}

pub struct QueueManager {
    tracks: Vec<Track>,
    /// Play order as list indices
    order: Vec<usize>,
    /// Position within `order`; `None` iff the queue is empty
    position: Option<usize>,
    repeat: RepeatState,
    shuffle: bool,
    rng: StdRng,
}

impl QueueManager {
    /// Create new empty queue manager
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffle order, for reproducible sessions and tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            order: Vec::new(),
            position: None,
            repeat: RepeatState::Off,
            shuffle: false,
            rng,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.position.map(|p| self.order[p])
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index().map(|i| &self.tracks[i])
    }

    pub fn repeat_mode(&self) -> RepeatState {
        self.repeat
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Indices in the order they will play
    pub fn play_order(&self) -> &[usize] {
        &self.order
    }

    pub fn enqueue(&mut self, track: Track) {
        let index = self.tracks.len();
        tracing::debug!(track_id = %track.id(), index, "Enqueued track");
        self.tracks.push(track);

        if self.shuffle {
            let earliest = self.position.map(|p| p + 1).unwrap_or(0);
            let slot = self.rng.gen_range(earliest..=self.order.len());
            self.order.insert(slot, index);
        } else {
            self.order.push(index);
        }

        if self.position.is_none() {
            self.position = self.order.iter().position(|&i| i == index);
        }
    }

    /// Replace the whole queue; the first track becomes current
    pub fn replace(&mut self, tracks: Vec<Track>) {
        tracing::debug!(len = tracks.len(), "Queue replaced");
        self.tracks = tracks;
        self.position = if self.tracks.is_empty() { None } else { Some(0) };
        self.rebuild_order(self.position.map(|_| 0));
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Removal> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfRange { index, len: self.tracks.len() });
        }

        let track = self.tracks.remove(index);
        let slot = self
            .order
            .iter()
            .position(|&i| i == index)
            .unwrap_or(self.order.len() - 1);
        self.order.remove(slot);
        for entry in self.order.iter_mut() {
            if *entry > index {
                *entry -= 1;
            }
        }

        let mut current_changed = false;
        self.position = match self.position {
            None => None,
            Some(_) if self.order.is_empty() => {
                current_changed = true;
                None
            }
            Some(pos) if slot < pos => Some(pos - 1),
            Some(pos) if slot == pos => {
                current_changed = true;
                Some(pos.min(self.order.len() - 1))
            }
            Some(pos) => Some(pos),
        };

        tracing::debug!(track_id = %track.id(), index, current_changed, "Removed track");
        Ok(Removal { track, current_changed })
    }

    /// Explicit skip forward. Repeat-one behaves like repeat-all here.
    pub fn next(&mut self) -> QueueStep {
        let Some(pos) = self.position else {
            return QueueStep::Empty;
        };
        if pos + 1 < self.order.len() {
            self.position = Some(pos + 1);
            return QueueStep::Moved(self.order[pos + 1]);
        }
        match self.repeat {
            RepeatState::Off => QueueStep::Boundary(self.order[pos]),
            RepeatState::All | RepeatState::One => {
                self.position = Some(0);
                QueueStep::Wrapped(self.order[0])
            }
        }
    }

    /// Explicit skip back. Repeat-one behaves like repeat-all here.
    pub fn previous(&mut self) -> QueueStep {
        let Some(pos) = self.position else {
            return QueueStep::Empty;
        };
        if pos > 0 {
            self.position = Some(pos - 1);
            return QueueStep::Moved(self.order[pos - 1]);
        }
        match self.repeat {
            RepeatState::Off => QueueStep::Boundary(self.order[pos]),
            RepeatState::All | RepeatState::One => {
                let last = self.order.len() - 1;
                self.position = Some(last);
                QueueStep::Wrapped(self.order[last])
            }
        }
    }

    /// Automatic advance when the current track finishes
    pub fn on_track_ended(&mut self) -> QueueStep {
        match (self.repeat, self.current_index()) {
            (_, None) => QueueStep::Empty,
            (RepeatState::One, Some(index)) => QueueStep::Repeated(index),
            _ => self.next(),
        }
    }

    pub fn skip_to(&mut self, index: usize) -> Result<QueueStep> {
        let slot = self
            .order
            .iter()
            .position(|&i| i == index)
            .ok_or(PlaybackError::IndexOutOfRange { index, len: self.tracks.len() })?;
        self.position = Some(slot);
        Ok(QueueStep::Moved(index))
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatState) {
        tracing::debug!(%mode, "Repeat mode set");
        self.repeat = mode;
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        if self.shuffle == shuffle {
            return;
        }
        tracing::debug!(shuffle, "Shuffle set");
        self.shuffle = shuffle;
        let current = self.current_index();
        self.rebuild_order(current);
    }

    /// Rebuild the play order around `current`, which keeps playing.
    /// With shuffle on it moves to the front and the rest is shuffled.
    fn rebuild_order(&mut self, current: Option<usize>) {
        if self.shuffle {
            let mut rest: Vec<usize> = (0..self.tracks.len())
                .filter(|&i| Some(i) != current)
                .collect();
            rest.shuffle(&mut self.rng);
            self.order = current.into_iter().chain(rest).collect();
            self.position = current.map(|_| 0);
        } else {
            self.order = (0..self.tracks.len()).collect();
            self.position = current;
        }
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_test_track(id: u8) -> Track {
        Track::new(
            format!("track-{}", id),
            format!("Song {}", id),
            "Artist",
            Duration::from_secs(100 + id as u64),
            format!("file:///music/{}.flac", id),
        )
    }

    fn queue_of(n: u8) -> QueueManager {
        let mut queue = QueueManager::with_seed(7);
        for id in 0..n {
            queue.enqueue(create_test_track(id));
        }
        queue
    }

    #[test]
    fn test_queue_manager_creation() {
        let queue = QueueManager::new();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
        assert_eq!(queue.repeat_mode(), RepeatState::Off);
        assert!(!queue.shuffle());
    }

    #[test]
    fn test_first_enqueue_sets_current() {
        let queue = queue_of(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().id(), "track-0");
    }

    #[test]
    fn test_empty_queue_steps() {
        let mut queue = QueueManager::new();
        assert_eq!(queue.next(), QueueStep::Empty);
        assert_eq!(queue.previous(), QueueStep::Empty);
        assert_eq!(queue.on_track_ended(), QueueStep::Empty);
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_next_repeat_off_stops_at_end() {
        let mut queue = queue_of(2);
        assert_eq!(queue.next(), QueueStep::Moved(1));
        assert_eq!(queue.next(), QueueStep::Boundary(1));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_next_repeat_all_wraps_to_start() {
        let mut queue = queue_of(3);
        queue.set_repeat_mode(RepeatState::All);
        queue.next();
        queue.next();
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.next(), QueueStep::Wrapped(0));
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_previous_wraps_by_repeat_mode() {
        let mut queue = queue_of(3);
        assert_eq!(queue.previous(), QueueStep::Boundary(0));

        queue.set_repeat_mode(RepeatState::All);
        assert_eq!(queue.previous(), QueueStep::Wrapped(2));
        assert_eq!(queue.previous(), QueueStep::Moved(1));
    }

    #[test]
    fn test_repeat_one_skip_and_track_end() {
        let mut queue = queue_of(2);
        queue.set_repeat_mode(RepeatState::One);

        assert_eq!(queue.on_track_ended(), QueueStep::Repeated(0));
        assert_eq!(queue.current_index(), Some(0));

        assert_eq!(queue.next(), QueueStep::Moved(1));
        assert_eq!(queue.next(), QueueStep::Wrapped(0));
    }

    #[test]
    fn test_remove_before_current_keeps_track() {
        let mut queue = queue_of(4);
        queue.skip_to(2).unwrap();

        let removal = queue.remove_at(0).unwrap();
        assert_eq!(removal.track.id(), "track-0");
        assert!(!removal.current_changed);
        assert_eq!(queue.current().unwrap().id(), "track-2");
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_remove_current_moves_to_following() {
        let mut queue = queue_of(3);
        queue.skip_to(1).unwrap();

        let removal = queue.remove_at(1).unwrap();
        assert!(removal.current_changed);
        assert_eq!(queue.current().unwrap().id(), "track-2");
    }

    #[test]
    fn test_remove_current_last_falls_back() {
        let mut queue = queue_of(3);
        queue.skip_to(2).unwrap();

        let removal = queue.remove_at(2).unwrap();
        assert!(removal.current_changed);
        assert_eq!(queue.current().unwrap().id(), "track-1");
    }

    #[test]
    fn test_remove_only_track_empties_queue() {
        let mut queue = queue_of(1);
        let removal = queue.remove_at(0).unwrap();
        assert!(removal.current_changed);
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut queue = queue_of(1);
        let err = queue.remove_at(5).unwrap_err();
        assert!(matches!(err, PlaybackError::IndexOutOfRange { index: 5, len: 1 }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_shuffle_keeps_current_and_visits_all() {
        let mut queue = queue_of(6);
        queue.skip_to(3).unwrap();
        queue.set_shuffle(true);

        assert_eq!(queue.current_index(), Some(3));
        assert_eq!(queue.play_order()[0], 3);

        let mut visited = vec![3];
        while let QueueStep::Moved(i) = queue.next() {
            visited.push(i);
        }
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_shuffle_off_restores_list_order() {
        let mut queue = queue_of(5);
        queue.set_shuffle(true);
        queue.next();
        let current = queue.current_index();

        queue.set_shuffle(false);
        assert_eq!(queue.play_order(), &[0, 1, 2, 3, 4]);
        assert_eq!(queue.current_index(), current);
    }

    #[test]
    fn test_enqueue_while_shuffled_plays_later() {
        let mut queue = queue_of(3);
        queue.set_shuffle(true);
        queue.next();
        let pos = queue.play_order().iter().position(|&i| Some(i) == queue.current_index()).unwrap();

        queue.enqueue(create_test_track(9));
        let new_slot = queue.play_order().iter().position(|&i| i == 3).unwrap();
        assert!(new_slot > pos);
    }

    #[test]
    fn test_replace_and_clear() {
        let mut queue = queue_of(3);
        queue.skip_to(2).unwrap();

        queue.replace(vec![create_test_track(7), create_test_track(8)]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current().unwrap().id(), "track-7");

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }
}
