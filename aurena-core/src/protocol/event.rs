//! Event stream envelope

use serde::{Deserialize, Serialize};

/// Clock synchronization statistics reported per playback device.
///
/// Replaced wholesale on every `client-stats` event; values are in
/// nanoseconds on the player clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockStats {
    pub synchronised: bool,
    pub rtt_average_ns: u64,
    pub remote_min_error_ns: i64,
    pub remote_max_error_ns: i64,
    pub position_ns: u64,
    pub expected_position_ns: u64,
}

/// A message pushed by the server on the control event stream.
///
/// The envelope is a JSON object discriminated by its `msg-type` string
/// field. Discriminants the controller does not recognize decode to
/// [`ServerEvent::Unknown`] so the dispatcher can log and drop them
/// without failing the stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "msg-type")]
pub enum ServerEvent {
    /// Full state push sent when the controller (re)attaches
    #[serde(rename = "enrol", rename_all = "kebab-case")]
    Enrol {
        volume_level: f64,
        #[serde(default)]
        paused: Option<bool>,
        #[serde(default)]
        resource_id: Option<u32>,
    },

    #[serde(rename = "play")]
    Play,

    #[serde(rename = "pause")]
    Pause,

    #[serde(rename = "set-media", rename_all = "kebab-case")]
    SetMedia { paused: bool, resource_id: u32 },

    /// Master volume changed
    #[serde(rename = "volume")]
    Volume { level: f64 },

    /// A single device's volume changed
    #[serde(rename = "client-volume", rename_all = "kebab-case")]
    ClientVolume { client_id: u32, level: f64 },

    /// A device's enable flags changed; absent fields are left untouched
    #[serde(rename = "client-setting", rename_all = "kebab-case")]
    ClientSetting {
        client_id: u32,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        record_enabled: Option<bool>,
    },

    /// Free-form diagnostic line from a device
    #[serde(rename = "client-message", rename_all = "kebab-case")]
    ClientMessage {
        #[serde(default)]
        client_id: u32,
        message: String,
    },

    /// Clock statistics snapshot for a device
    #[serde(rename = "client-stats", rename_all = "kebab-case")]
    ClientStats {
        client_id: u32,
        #[serde(flatten)]
        stats: ClockStats,
    },

    /// The set of playback devices changed; the roster should be re-read
    #[serde(rename = "player-clients-changed")]
    PlayerClientsChanged,

    /// Liveness marker, no payload
    #[serde(rename = "ping")]
    Ping,

    #[serde(other)]
    Unknown,
}
