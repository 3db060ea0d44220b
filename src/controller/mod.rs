//! Controller module - Session bridge between control surfaces and the engine
//!
//! - `transport`: Transport commands and batch coalescing
//! - `session`: The session state machine (store + queue + engine)
//! - `player_events`: Audio engine event handling
//!
//! [`SessionBridge`] is the cloneable handle. All mutation happens on one task
//! that owns the [`Session`]; handles only send commands and read snapshots.

mod transport;
mod session;
mod player_events;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audio::EngineEventChannel;
use crate::error::{PlaybackError, Result};
use crate::model::{PlaybackState, SessionSnapshot};

pub use session::Session;
pub use transport::{coalesce, TransportCommand};

/// Host-level session object (system media controls, notification).
///
/// Called on the session task after every state change; must not block.
pub trait HostSession: Send + Sync {
    fn publish(&self, snapshot: &SessionSnapshot);
}

enum BridgeMessage {
    Command(TransportCommand),
    Shutdown,
}

#[derive(Clone)]
pub struct SessionBridge {
    commands: mpsc::UnboundedSender<BridgeMessage>,
    snapshots: watch::Receiver<SessionSnapshot>,
    state: watch::Receiver<PlaybackState>,
}

impl SessionBridge {
    /// Move `session` onto its own task. Must be called inside a tokio runtime.
    pub fn spawn(session: Session, events: EngineEventChannel) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            commands,
            snapshots: session.watch_snapshots(),
            state: session.store().watch(),
        };
        let task = tokio::spawn(run_session(session, rx, events));
        (bridge, task)
    }

    /// Queue a command. Never blocks.
    pub fn send(&self, command: TransportCommand) -> Result<()> {
        self.commands
            .send(BridgeMessage::Command(command))
            .map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn play(&self) -> Result<()> {
        self.send(TransportCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(TransportCommand::Pause)
    }

    pub fn seek(&self, position: std::time::Duration) -> Result<()> {
        self.send(TransportCommand::Seek(position))
    }

    pub fn skip_next(&self) -> Result<()> {
        self.send(TransportCommand::SkipNext)
    }

    pub fn skip_previous(&self) -> Result<()> {
        self.send(TransportCommand::SkipPrevious)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn playback_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Ask the session task to release the engine and exit
    pub fn shutdown(&self) {
        if self.commands.send(BridgeMessage::Shutdown).is_err() {
            tracing::debug!("Session already closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

async fn run_session(
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<BridgeMessage>,
    mut events: EngineEventChannel,
) {
    tracing::info!(session_id = %session.session_id(), "Session started");
    let mut events_open = true;

    loop {
        tokio::select! {
            message = commands.recv() => {
                let Some(message) = message else {
                    tracing::debug!("All session handles dropped");
                    break;
                };

                // Drain whatever else is pending so superseded seeks can be dropped
                let mut batch = vec![message];
                while let Ok(message) = commands.try_recv() {
                    batch.push(message);
                }

                let mut shutdown = false;
                let mut pending = Vec::with_capacity(batch.len());
                for message in batch {
                    match message {
                        BridgeMessage::Command(command) => pending.push(command),
                        BridgeMessage::Shutdown => {
                            shutdown = true;
                            break;
                        }
                    }
                }

                for command in coalesce(pending) {
                    if let Err(e) = session.handle_command(command) {
                        tracing::warn!(error = %e, "Transport command failed");
                    }
                }

                if shutdown {
                    break;
                }
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => session.handle_engine_event(event),
                    None => {
                        tracing::warn!("Engine event channel closed");
                        events_open = false;
                    }
                }
            }
        }
    }

    session.shutdown();
}
