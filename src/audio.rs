//! Audio engine boundary
//!
//! The session talks to the engine through [`AudioEngine`]. Commands are
//! synchronous and cheap; results arrive later as [`EngineEvent`]s tagged
//! with the request id of the `prepare` call they belong to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const DEVICE_NAME: &str = "Harmony";

/// Errors reported synchronously by an engine command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("no source prepared")]
    NotPrepared,

    #[error("engine released")]
    Released,

    #[error("{0}")]
    Failed(String),
}

/// Callbacks emitted by the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Prepared { request_id: u64, duration: Duration },
    Playing { request_id: u64, position: Duration },
    Paused { request_id: u64, position: Duration },
    PositionChanged { request_id: u64, position: Duration },
    Buffering { request_id: u64 },
    EndOfTrack { request_id: u64 },
    Error { request_id: u64, message: String },
}

impl EngineEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            EngineEvent::Prepared { request_id, .. }
            | EngineEvent::Playing { request_id, .. }
            | EngineEvent::Paused { request_id, .. }
            | EngineEvent::PositionChanged { request_id, .. }
            | EngineEvent::Buffering { request_id }
            | EngineEvent::EndOfTrack { request_id }
            | EngineEvent::Error { request_id, .. } => *request_id,
        }
    }
}

pub type EngineEventChannel = mpsc::UnboundedReceiver<EngineEvent>;

/// Audio engine driven by the session.
///
/// `prepare` starts loading a source and returns; readiness is reported with
/// [`EngineEvent::Prepared`] carrying the same `request_id`. A new `prepare`
/// replaces any source still loading.
pub trait AudioEngine: Send {
    fn prepare(&mut self, request_id: u64, uri: &str) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn seek(&mut self, position: Duration) -> Result<(), EngineError>;
    fn stop(&mut self);
    /// Free the output device. No command succeeds afterwards.
    fn release(&mut self);
}

/// Owns an engine and releases it when dropped
pub struct EngineHandle {
    engine: Box<dyn AudioEngine>,
    released: bool,
}

impl EngineHandle {
    pub fn new(engine: impl AudioEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            released: false,
        }
    }

    pub fn prepare(&mut self, request_id: u64, uri: &str) -> Result<(), EngineError> {
        self.live()?.prepare(request_id, uri)
    }

    pub fn play(&mut self) -> Result<(), EngineError> {
        self.live()?.play()
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.live()?.pause()
    }

    pub fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        self.live()?.seek(position)
    }

    pub fn stop(&mut self) {
        if let Ok(engine) = self.live() {
            engine.stop();
        }
    }

    pub fn release(&mut self) {
        if !self.released {
            tracing::info!("Releasing audio engine");
            self.engine.stop();
            self.engine.release();
            self.released = true;
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn live(&mut self) -> Result<&mut Box<dyn AudioEngine>, EngineError> {
        if self.released {
            Err(EngineError::Released)
        } else {
            Ok(&mut self.engine)
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Name the session advertises to the host, unique per machine
pub fn session_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", DEVICE_NAME, hostname)
}

pub fn device_name() -> &'static str {
    DEVICE_NAME
}

#[derive(Default)]
struct SimulatedState {
    catalog: HashMap<String, Duration>,
    failing_prepares: u32,
    failing_plays: u32,
    request_id: Option<u64>,
    duration: Duration,
    position: Duration,
    playing: bool,
    released: bool,
}

/// Headless engine with no audio output.
///
/// Sources must be registered with their duration before they can be
/// prepared. Time only moves through [`SimulatedEngine::tick`], so callers
/// control progress. Clones share state; keep one to drive the engine after
/// handing the other to a session.
#[derive(Clone)]
pub struct SimulatedEngine {
    state: Arc<Mutex<SimulatedState>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl SimulatedEngine {
    pub fn new() -> (Self, EngineEventChannel) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            state: Arc::new(Mutex::new(SimulatedState::default())),
            events,
        };
        (engine, rx)
    }

    pub fn register(&self, uri: impl Into<String>, duration: Duration) {
        self.lock().catalog.insert(uri.into(), duration);
    }

    /// Make the next `count` prepare calls fail
    pub fn fail_next_prepares(&self, count: u32) {
        self.lock().failing_prepares = count;
    }

    /// Make the next `count` play calls fail
    pub fn fail_next_plays(&self, count: u32) {
        self.lock().failing_plays = count;
    }

    /// Advance playback by `elapsed`, reporting position or end of track
    pub fn tick(&self, elapsed: Duration) {
        let mut state = self.lock();
        let Some(request_id) = state.request_id else {
            return;
        };
        if !state.playing {
            return;
        }
        state.position = (state.position + elapsed).min(state.duration);
        if state.position >= state.duration {
            state.playing = false;
            self.emit(EngineEvent::EndOfTrack { request_id });
        } else {
            self.emit(EngineEvent::PositionChanged { request_id, position: state.position });
        }
    }

    /// Jump to the end of the loaded source
    pub fn finish_track(&self) {
        let mut state = self.lock();
        if let Some(request_id) = state.request_id {
            state.position = state.duration;
            state.playing = false;
            self.emit(EngineEvent::EndOfTrack { request_id });
        }
    }

    /// Report an underrun on the loaded source
    pub fn stall(&self) {
        let state = self.lock();
        if let Some(request_id) = state.request_id {
            self.emit(EngineEvent::Buffering { request_id });
        }
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Engine event dropped, no listener");
        }
    }
}

impl AudioEngine for SimulatedEngine {
    fn prepare(&mut self, request_id: u64, uri: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.released {
            return Err(EngineError::Released);
        }
        if state.failing_prepares > 0 {
            state.failing_prepares -= 1;
            return Err(EngineError::Failed(format!("output device busy while opening {}", uri)));
        }
        let duration = *state
            .catalog
            .get(uri)
            .ok_or_else(|| EngineError::SourceNotFound(uri.to_string()))?;

        tracing::debug!(request_id, uri, "Simulated engine preparing source");
        state.request_id = Some(request_id);
        state.duration = duration;
        state.position = Duration::ZERO;
        state.playing = false;
        self.emit(EngineEvent::Prepared { request_id, duration });
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        let mut state = self.lock();
        let request_id = state.request_id.ok_or(EngineError::NotPrepared)?;
        if state.failing_plays > 0 {
            state.failing_plays -= 1;
            return Err(EngineError::Failed("audio sink rejected start".to_string()));
        }
        state.playing = true;
        self.emit(EngineEvent::Playing { request_id, position: state.position });
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        let mut state = self.lock();
        let request_id = state.request_id.ok_or(EngineError::NotPrepared)?;
        state.playing = false;
        self.emit(EngineEvent::Paused { request_id, position: state.position });
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        let mut state = self.lock();
        let request_id = state.request_id.ok_or(EngineError::NotPrepared)?;
        state.position = position.min(state.duration);
        self.emit(EngineEvent::PositionChanged { request_id, position: state.position });
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.request_id = None;
        state.playing = false;
        state.position = Duration::ZERO;
    }

    fn release(&mut self) {
        tracing::debug!("Simulated engine released");
        let mut state = self.lock();
        state.released = true;
        state.request_id = None;
        state.playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_drop_releases_engine() {
        let (engine, _events) = SimulatedEngine::new();
        let probe = engine.clone();
        {
            let _handle = EngineHandle::new(engine);
            assert!(!probe.is_released());
        }
        assert!(probe.is_released());
    }

    #[test]
    fn test_released_handle_rejects_commands() {
        let (engine, _events) = SimulatedEngine::new();
        engine.register("a", Duration::from_secs(1));
        let mut handle = EngineHandle::new(engine);
        handle.release();
        assert_eq!(handle.prepare(1, "a"), Err(EngineError::Released));
        assert_eq!(handle.play(), Err(EngineError::Released));
    }

    #[test]
    fn test_prepare_unknown_source() {
        let (mut engine, _events) = SimulatedEngine::new();
        let err = engine.prepare(1, "missing").unwrap_err();
        assert_eq!(err, EngineError::SourceNotFound("missing".to_string()));
    }

    #[test]
    fn test_events_carry_request_id() {
        let (mut engine, mut events) = SimulatedEngine::new();
        engine.register("a", Duration::from_secs(2));
        engine.prepare(5, "a").unwrap();
        engine.play().unwrap();
        engine.tick(Duration::from_secs(1));
        engine.tick(Duration::from_secs(5));

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                EngineEvent::Prepared { request_id: 5, duration: Duration::from_secs(2) },
                EngineEvent::Playing { request_id: 5, position: Duration::ZERO },
                EngineEvent::PositionChanged { request_id: 5, position: Duration::from_secs(1) },
                EngineEvent::EndOfTrack { request_id: 5 },
            ]
        );
    }

    #[test]
    fn test_injected_prepare_failures() {
        let (mut engine, _events) = SimulatedEngine::new();
        engine.register("a", Duration::from_secs(1));
        engine.fail_next_prepares(1);
        assert!(matches!(engine.prepare(1, "a"), Err(EngineError::Failed(_))));
        assert!(engine.prepare(2, "a").is_ok());
    }
}
