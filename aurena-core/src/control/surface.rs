//! Transport seam for the control endpoint

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::PlayerClient;
use crate::state::ClientId;

/// Outbound interface to the player server.
///
/// The coordinator, roster manager and command dispatcher talk to the
/// server exclusively through this trait so tests can substitute a mock
/// transport for the HTTP client.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Set the volume of the master mix or one device
    async fn set_volume(&self, target: ClientId, level: f64) -> Result<()>;

    /// Set a device's enable and record-enable flags
    async fn set_client_setting(
        &self,
        client_id: ClientId,
        enable: bool,
        record_enable: bool,
    ) -> Result<()>;

    /// Issue a bodyless named control command (`play`, `pause`, ...)
    async fn command(&self, name: &str) -> Result<()>;

    /// Issue a named control command carrying a resource id
    async fn command_with_id(&self, name: &str, id: &str) -> Result<()>;

    /// Seek within the current media, position in nanoseconds
    async fn seek(&self, position_ns: u64) -> Result<()>;

    /// Read the current device roster
    async fn fetch_roster(&self) -> Result<Vec<PlayerClient>>;
}
