//! Roster document served by the player-info endpoint

use serde::{Deserialize, Serialize};

/// Response of `GET client/player_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlayerInfo {
    pub player_clients: Vec<PlayerClient>,
}

/// One playback device as reported by the roster endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlayerClient {
    pub client_id: u32,
    pub host: String,
    pub volume: f64,
    pub enabled: bool,
    #[serde(default)]
    pub record_enabled: bool,
}
