//! Wire protocol
//!
//! JSON payloads exchanged with the player server: the discriminated
//! event envelope pushed over the event stream and the roster document
//! served by the player-info endpoint.

mod event;
mod roster;

pub use event::{ClockStats, ServerEvent};
pub use roster::{PlayerClient, PlayerInfo};
