//! Engine event handling

use std::time::Duration;

use crate::audio::{EngineError, EngineEvent};
use crate::error::Result;
use crate::model::{PlaybackStatus, QueueStep};

use super::session::Session;

impl Session {
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if event.request_id() != self.request_id {
            tracing::trace!(?event, current = self.request_id, "Stale engine event ignored");
            return;
        }

        let result = match event {
            EngineEvent::Prepared { duration, .. } => self.on_prepared(duration),
            EngineEvent::Playing { position, .. } => {
                tracing::trace!(?position, "EngineEvent::Playing");
                self.store.clamp_position(position);
                if self.store.status() == PlaybackStatus::Buffering {
                    self.store.set_status(PlaybackStatus::Playing)
                } else {
                    Ok(())
                }
            }
            EngineEvent::Paused { position, .. } => {
                tracing::debug!(?position, "EngineEvent::Paused");
                self.store.clamp_position(position);
                Ok(())
            }
            EngineEvent::PositionChanged { position, .. } => {
                tracing::trace!(?position, "EngineEvent::PositionChanged");
                self.store.clamp_position(position);
                Ok(())
            }
            EngineEvent::Buffering { .. } => {
                tracing::debug!("EngineEvent::Buffering");
                if self.store.status() == PlaybackStatus::Playing {
                    self.store.set_status(PlaybackStatus::Buffering)
                } else {
                    Ok(())
                }
            }
            EngineEvent::EndOfTrack { .. } => {
                tracing::debug!("EngineEvent::EndOfTrack");
                self.on_track_ended()
            }
            EngineEvent::Error { message, .. } => {
                tracing::warn!(%message, "EngineEvent::Error");
                self.on_engine_error(message)
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Engine event handling failed");
        }
        self.publish();
    }

    fn on_prepared(&mut self, duration: Duration) -> Result<()> {
        if self.store.status() != PlaybackStatus::Preparing {
            tracing::trace!(status = %self.store.status(), "Prepared outside of preparing, ignored");
            return Ok(());
        }
        if let Some(track) = self.store.track() {
            if track.duration().abs_diff(duration) > Duration::from_secs(1) {
                tracing::debug!(
                    track_id = %track.id(),
                    metadata = ?track.duration(),
                    engine = ?duration,
                    "Engine duration differs from track metadata"
                );
            }
        }

        if let Some(position) = self.pending_seek.take() {
            if let Err(e) = self.engine.seek(position) {
                return self.fail(e);
            }
            self.store.clamp_position(position);
        }

        if self.play_when_ready {
            self.resume()
        } else {
            self.store.set_status(PlaybackStatus::Paused)
        }
    }

    fn on_track_ended(&mut self) -> Result<()> {
        if !matches!(
            self.store.status(),
            PlaybackStatus::Playing | PlaybackStatus::Buffering | PlaybackStatus::Paused
        ) {
            return Ok(());
        }

        match self.queue.on_track_ended() {
            step @ (QueueStep::Moved(_) | QueueStep::Wrapped(_) | QueueStep::Repeated(_)) => {
                tracing::debug!(?step, "Advancing after end of track");
                let Some(track) = self.queue.current().cloned() else {
                    return Ok(());
                };
                self.load(track, true)
            }
            QueueStep::Boundary(index) => {
                tracing::info!(index, "Reached end of queue");
                let end = self.store.state().duration();
                self.store.clamp_position(end);
                self.detach_engine();
                self.store.set_status(PlaybackStatus::Ended)
            }
            QueueStep::Empty => {
                self.store.clear();
                Ok(())
            }
        }
    }

    /// One immediate re-prepare of the same track, then give up
    fn on_engine_error(&mut self, message: String) -> Result<()> {
        let status = self.store.status();
        if matches!(status, PlaybackStatus::Idle | PlaybackStatus::Ended) {
            return Ok(());
        }
        if self.retries_left == 0 {
            return self.fail(EngineError::Failed(message));
        }

        self.retries_left -= 1;
        let resume_at = self.store.position();
        self.play_when_ready = self.wants_playback();
        self.pending_seek = (resume_at > Duration::ZERO).then_some(resume_at);
        tracing::warn!(?resume_at, "Re-preparing track after engine error");
        self.store.set_status(PlaybackStatus::Preparing)?;
        self.start_prepare()
    }
}
