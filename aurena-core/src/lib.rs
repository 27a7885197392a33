//! Aurena remote controller - core library
//!
//! Keeps a local mirror of an Aurena player's state (playback, master
//! and per-device volume, enable flags, clock statistics) synchronized
//! over the server's WebSocket event stream, and issues control
//! commands that are neither undone nor flooded by the state echoes
//! they provoke. Rendering is the caller's job: views attach through
//! [`ControllerObserver`] and drive a [`ControllerSession`].

pub mod config;
pub mod connection;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod roster;
pub mod session;
pub mod state;
pub mod volume;

// Re-exports for convenience
pub use config::ControllerConfig;
pub use control::{ControlClient, ControlSurface};
pub use error::{ControlError, Result};
pub use protocol::{ClockStats, PlayerClient, ServerEvent};
pub use session::ControllerSession;
pub use state::{
    ClientId, ControllerObserver, DeviceState, PlaybackState, StateStore, MASTER_ID, MAX_VOLUME,
    MIN_VOLUME,
};
pub use volume::VolumeSync;
