//! Playback service lifecycle
//!
//! Mirrors the host runtime's service hooks: `create` builds the one session
//! of the process, `session` hands it to controllers, `destroy` tears it down.
//! The engine is released by the session task on exit, and by
//! [`EngineHandle`]'s drop if the task is aborted. The process-wide guard is
//! held by the task, so a new service can only start once the old session and
//! its engine are gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

use crate::audio::{AudioEngine, EngineEventChannel, EngineHandle};
use crate::config::PlayerConfig;
use crate::controller::{HostSession, Session, SessionBridge};
use crate::error::{PlaybackError, Result};

static SERVICE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Clears [`SERVICE_ACTIVE`] when the owning session task finishes
struct ActiveGuard;

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        SERVICE_ACTIVE.store(false, Ordering::SeqCst);
        tracing::debug!("Playback service slot freed");
    }
}

pub struct PlaybackService {
    bridge: Option<SessionBridge>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackService {
    /// Start the process-wide session. Fails while another service is alive.
    pub fn create(
        config: &PlayerConfig,
        engine: impl AudioEngine + 'static,
        events: EngineEventChannel,
        host: Option<Arc<dyn HostSession>>,
    ) -> Result<Self> {
        if SERVICE_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(PlaybackError::AlreadyRunning);
        }
        let active = ActiveGuard;

        let mut session = Session::new(config, EngineHandle::new(engine));
        if let Some(host) = host {
            session.set_host(host);
        }
        tracing::info!(session_id = %session.session_id(), "Playback service created");

        let (bridge, session_task) = SessionBridge::spawn(session, events);
        let task = tokio::spawn(async move {
            let _active = active;
            if let Err(e) = session_task.await {
                tracing::error!(error = %e, "Session task failed");
            }
        });
        Ok(Self {
            bridge: Some(bridge),
            task: Some(task),
        })
    }

    /// The live session, or `None` once destroyed
    pub fn session(&self) -> Option<SessionBridge> {
        self.bridge.clone()
    }

    /// Shut the session down and wait for the engine to be released
    pub async fn destroy(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.shutdown();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Session supervisor failed");
            }
            tracing::info!("Playback service destroyed");
        }
    }

    pub fn is_active() -> bool {
        SERVICE_ACTIVE.load(Ordering::SeqCst)
    }
}

impl Drop for PlaybackService {
    // The detached task keeps the guard until the engine is released
    fn drop(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.shutdown();
        }
    }
}
