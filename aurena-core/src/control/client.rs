//! HTTP implementation of the control surface

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::surface::ControlSurface;
use crate::error::{ControlError, Result};
use crate::protocol::{PlayerClient, PlayerInfo};
use crate::state::{ClientId, MASTER_ID};

/// Connection timeout (short since the server lives on the LAN)
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the player server's control and roster endpoints
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base_url: Url,
}

impl ControlClient {
    /// Create a client for a server base URL (e.g. `http://host:5457/`)
    pub fn new(base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ControlError::InvalidUrl(e.to_string()))
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<()> {
        let url = self.endpoint(path)?;
        debug!(%url, "posting control request");
        let request = self.http.post(url);
        let request = if form.is_empty() {
            request
        } else {
            request.form(form)
        };
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ControlSurface for ControlClient {
    async fn set_volume(&self, target: ClientId, level: f64) -> Result<()> {
        let mut form = vec![("level", level.to_string())];
        // The master form omits the client id, matching the original
        // master-only controller.
        if target != MASTER_ID {
            form.push(("client_id", target.to_string()));
        }
        self.post_form("control/volume", &form).await
    }

    async fn set_client_setting(
        &self,
        client_id: ClientId,
        enable: bool,
        record_enable: bool,
    ) -> Result<()> {
        let url = self.endpoint("control/setclient")?;
        self.http
            .get(url)
            .query(&[
                ("client_id", client_id.to_string()),
                ("enable", u8::from(enable).to_string()),
                ("record_enable", u8::from(record_enable).to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn command(&self, name: &str) -> Result<()> {
        self.post_form(&format!("control/{name}"), &[]).await
    }

    async fn command_with_id(&self, name: &str, id: &str) -> Result<()> {
        self.post_form(&format!("control/{name}"), &[("id", id.to_string())])
            .await
    }

    async fn seek(&self, position_ns: u64) -> Result<()> {
        self.post_form("control/seek", &[("position", position_ns.to_string())])
            .await
    }

    async fn fetch_roster(&self) -> Result<Vec<PlayerClient>> {
        let url = self.endpoint("client/player_info")?;
        let info: PlayerInfo = self.http.get(url).send().await?.json().await?;
        Ok(info.player_clients)
    }
}
