//! Session state machine
//!
//! Applies transport commands to the store and queue and drives the engine.
//! Runs on the bridge task; nothing here blocks or awaits.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::audio::{self, EngineError, EngineHandle};
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::model::{
    PlaybackStateStore, PlaybackStatus, QueueManager, QueueStep, SessionSnapshot, Track,
};

use super::transport::TransportCommand;
use super::HostSession;

pub struct Session {
    pub(crate) session_id: String,
    pub(crate) store: PlaybackStateStore,
    pub(crate) queue: QueueManager,
    pub(crate) engine: EngineHandle,
    /// Id of the latest prepare; engine events with another id are stale
    pub(crate) request_id: u64,
    /// Start playing once the engine reports the source ready
    pub(crate) play_when_ready: bool,
    /// Seek requested while preparing, applied once prepared
    pub(crate) pending_seek: Option<Duration>,
    pub(crate) retries_left: u32,
    retry_limit: u32,
    restart_threshold: Duration,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    host: Option<Arc<dyn HostSession>>,
}

impl Session {
    pub fn new(config: &PlayerConfig, engine: EngineHandle) -> Self {
        let mut queue = match config.shuffle_seed {
            Some(seed) => QueueManager::with_seed(seed),
            None => QueueManager::new(),
        };
        queue.set_repeat_mode(config.repeat);
        queue.set_shuffle(config.shuffle);

        let session_id = audio::session_id();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::capture(
            &session_id,
            &Default::default(),
            &queue,
        ));

        Self {
            session_id,
            store: PlaybackStateStore::new(),
            queue,
            engine,
            request_id: 0,
            play_when_ready: false,
            pending_seek: None,
            retries_left: config.engine_retry_limit,
            retry_limit: config.engine_retry_limit,
            restart_threshold: config.previous_restart_threshold(),
            snapshot_tx,
            host: None,
        }
    }

    pub fn set_host(&mut self, host: Arc<dyn HostSession>) {
        host.publish(&self.snapshot_tx.borrow());
        self.host = Some(host);
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &PlaybackStateStore {
        &self.store
    }

    /// Mutable access for registering observers
    pub fn store_mut(&mut self) -> &mut PlaybackStateStore {
        &mut self.store
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn status(&self) -> PlaybackStatus {
        self.store.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Apply one command. An empty queue turns any command into a no-op.
    pub fn handle_command(&mut self, command: TransportCommand) -> Result<()> {
        tracing::debug!(?command, status = %self.store.status(), "Transport command");

        let result = match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => self.pause(),
            TransportCommand::TogglePlayPause => {
                if self.wants_playback() {
                    self.pause()
                } else {
                    self.play()
                }
            }
            TransportCommand::Stop => self.stop(),
            TransportCommand::Seek(position) => self.seek(position),
            TransportCommand::SkipNext => self.skip_next(),
            TransportCommand::SkipPrevious => self.skip_previous(),
            TransportCommand::SkipTo(index) => self.skip_to(index),
            TransportCommand::Enqueue(track) => {
                self.enqueue(track);
                Ok(())
            }
            TransportCommand::RemoveAt(index) => self.remove_at(index),
            TransportCommand::LoadQueue(tracks) => {
                self.load_queue(tracks);
                Ok(())
            }
            TransportCommand::SetRepeat(mode) => {
                self.queue.set_repeat_mode(mode);
                Ok(())
            }
            TransportCommand::CycleRepeat => {
                let mode = self.queue.repeat_mode().cycle();
                self.queue.set_repeat_mode(mode);
                Ok(())
            }
            TransportCommand::SetShuffle(shuffle) => {
                self.queue.set_shuffle(shuffle);
                Ok(())
            }
            TransportCommand::ToggleShuffle => {
                let shuffle = !self.queue.shuffle();
                self.queue.set_shuffle(shuffle);
                Ok(())
            }
        };

        self.publish();

        match result {
            Err(PlaybackError::EmptyQueue) => {
                tracing::debug!("Command ignored, queue is empty");
                Ok(())
            }
            other => other,
        }
    }

    /// Release the engine; the session accepts no further playback
    pub fn shutdown(&mut self) {
        tracing::info!(session_id = %self.session_id, "Session shutting down");
        self.engine.release();
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn play(&mut self) -> Result<()> {
        match self.store.status() {
            PlaybackStatus::Idle => {
                let track = self.queue.current().cloned().ok_or(PlaybackError::EmptyQueue)?;
                self.load(track, true)
            }
            PlaybackStatus::Preparing => {
                self.play_when_ready = true;
                Ok(())
            }
            PlaybackStatus::Paused => self.resume(),
            PlaybackStatus::Playing | PlaybackStatus::Buffering => Ok(()),
            PlaybackStatus::Ended => {
                tracing::debug!("Play ignored, session ended until a new queue is loaded");
                Ok(())
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        match self.store.status() {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => {
                if let Err(e) = self.engine.pause() {
                    return self.fail(e);
                }
                self.play_when_ready = false;
                self.store.set_status(PlaybackStatus::Paused)
            }
            PlaybackStatus::Preparing => {
                self.play_when_ready = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.store.status() == PlaybackStatus::Ended {
            return Ok(());
        }
        self.detach_engine();
        self.store.set_status(PlaybackStatus::Idle)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        match self.store.status() {
            PlaybackStatus::Idle | PlaybackStatus::Ended => {
                tracing::debug!(?position, "Seek ignored, nothing prepared");
                Ok(())
            }
            PlaybackStatus::Preparing => {
                self.store.set_position(position)?;
                self.pending_seek = Some(position);
                Ok(())
            }
            _ => {
                self.store.set_position(position)?;
                match self.engine.seek(position) {
                    Ok(()) => Ok(()),
                    Err(e) => self.fail(e),
                }
            }
        }
    }

    fn skip_next(&mut self) -> Result<()> {
        if self.store.status() == PlaybackStatus::Ended {
            return Ok(());
        }
        let step = self.queue.next();
        self.follow(step)
    }

    fn skip_previous(&mut self) -> Result<()> {
        let status = self.store.status();
        if status == PlaybackStatus::Ended {
            return Ok(());
        }
        let restartable = matches!(
            status,
            PlaybackStatus::Playing | PlaybackStatus::Paused | PlaybackStatus::Buffering
        );
        if restartable && self.store.position() > self.restart_threshold {
            tracing::debug!("Restarting current track");
            return self.seek(Duration::ZERO);
        }
        let step = self.queue.previous();
        self.follow(step)
    }

    fn skip_to(&mut self, index: usize) -> Result<()> {
        if self.store.status() == PlaybackStatus::Ended {
            return Ok(());
        }
        let step = self.queue.skip_to(index)?;
        self.follow(step)
    }

    fn enqueue(&mut self, track: Track) {
        self.queue.enqueue(track);
        if self.store.track().is_none() {
            if let Some(current) = self.queue.current().cloned() {
                self.store.advance(current);
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Result<()> {
        let removal = self.queue.remove_at(index)?;

        if self.queue.is_empty() {
            self.detach_engine();
            self.store.clear();
            return Ok(());
        }
        if !removal.current_changed {
            return Ok(());
        }

        let track = self.queue.current().cloned().ok_or(PlaybackError::EmptyQueue)?;
        match self.store.status() {
            PlaybackStatus::Idle | PlaybackStatus::Ended => {
                self.store.advance(track);
                Ok(())
            }
            _ => {
                let play = self.wants_playback();
                self.load(track, play)
            }
        }
    }

    fn load_queue(&mut self, tracks: Vec<Track>) {
        tracing::info!(len = tracks.len(), "Loading new queue");
        self.detach_engine();
        self.queue.replace(tracks);
        self.store.clear();
        if let Some(track) = self.queue.current().cloned() {
            self.store.advance(track);
        }
    }

    /// Act on a queue move: cue the track when idle, otherwise load it
    fn follow(&mut self, step: QueueStep) -> Result<()> {
        if !step.loads_track() {
            tracing::debug!(?step, "Queue did not move");
            return Ok(());
        }
        let track = self.queue.current().cloned().ok_or(PlaybackError::EmptyQueue)?;
        if self.store.status() == PlaybackStatus::Idle {
            self.store.advance(track);
            return Ok(());
        }
        let play = self.wants_playback();
        self.load(track, play)
    }

    // ========================================================================
    // Engine
    // ========================================================================

    pub(crate) fn wants_playback(&self) -> bool {
        match self.store.status() {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => true,
            PlaybackStatus::Preparing => self.play_when_ready,
            _ => false,
        }
    }

    /// Make `track` current and start preparing it
    pub(crate) fn load(&mut self, track: Track, play_when_ready: bool) -> Result<()> {
        tracing::info!(track_id = %track.id(), title = %track.title(), play_when_ready, "Loading track");
        self.store.advance(track);
        self.store.set_error(None);
        self.play_when_ready = play_when_ready;
        self.pending_seek = None;
        self.retries_left = self.retry_limit;
        self.store.set_status(PlaybackStatus::Preparing)?;
        self.start_prepare()
    }

    /// Prepare the current track under a fresh request id, retrying
    /// immediately while retries remain. The retry budget is per track.
    pub(crate) fn start_prepare(&mut self) -> Result<()> {
        let uri = self
            .store
            .track()
            .map(|t| t.uri().to_string())
            .ok_or(PlaybackError::EmptyQueue)?;

        loop {
            self.request_id += 1;
            match self.engine.prepare(self.request_id, &uri) {
                Ok(()) => return Ok(()),
                Err(e) if self.retries_left > 0 => {
                    self.retries_left -= 1;
                    tracing::warn!(error = %e, uri = %uri, "Prepare failed, retrying");
                }
                Err(e) => return self.fail(e),
            }
        }
    }

    pub(crate) fn resume(&mut self) -> Result<()> {
        loop {
            match self.engine.play() {
                Ok(()) => {
                    self.play_when_ready = true;
                    return self.store.set_status(PlaybackStatus::Playing);
                }
                Err(e) if self.retries_left > 0 => {
                    self.retries_left -= 1;
                    tracing::warn!(error = %e, "Play failed, retrying");
                }
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Give up on the engine: surface the error and end the session
    pub(crate) fn fail(&mut self, error: EngineError) -> Result<()> {
        tracing::error!(error = %error, "Audio engine unavailable, ending playback");
        self.detach_engine();
        self.store.set_error(Some(error.to_string()));
        self.store.set_status(PlaybackStatus::Ended)?;
        Err(PlaybackError::EngineUnavailable(error))
    }

    /// Stop the engine and orphan any events still in flight
    pub(crate) fn detach_engine(&mut self) {
        self.engine.stop();
        self.request_id += 1;
        self.play_when_ready = false;
        self.pending_seek = None;
    }

    pub(crate) fn publish(&self) {
        let snapshot = SessionSnapshot::capture(&self.session_id, self.store.state(), &self.queue);
        if self.snapshot_tx.borrow().same_state(&snapshot) {
            return;
        }
        if let Some(host) = &self.host {
            host.publish(&snapshot);
        }
        self.snapshot_tx.send_replace(snapshot);
    }
}
