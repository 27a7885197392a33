//! Control endpoint client
//!
//! The write path of the protocol: volume, enable flags and transport
//! commands are POSTed (setclient: GET) to the server's `control/*`
//! endpoints, and the device roster is read from `client/player_info`.

mod client;
mod surface;

pub use client::ControlClient;
pub use surface::ControlSurface;
