//! harmony-player - media playback core
//!
//! A session manager coordinating transport state, the play queue and a host
//! media session against an external audio engine.
//!
//! - [`model`]: playback state store, queue manager, snapshots
//! - [`controller`]: session state machine and the [`SessionBridge`] handle
//! - [`audio`]: engine boundary, scoped engine handle, simulated engine
//! - [`service`]: process-wide service lifecycle
//! - [`config`], [`logging`], [`error`]: ambient concerns

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;

pub use controller::{HostSession, SessionBridge, TransportCommand};
pub use error::{PlaybackError, Result};
pub use service::PlaybackService;
