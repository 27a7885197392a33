//! Session configuration

use std::time::Duration;

use url::Url;

use crate::error::{ControlError, Result};

/// Sub-protocol token negotiated on the event stream
pub const EVENT_SUBPROTOCOL: &str = "aurena";

/// Event stream path for the default deployment variant
pub const EVENTS_PATH_CONTROL: &str = "client/control";

/// Event stream path for deployments that multiplex roles on one endpoint
pub const EVENTS_PATH_ROLES: &str = "client/events?roles=controller";

/// Fixed delay before each reconnection attempt
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Settle delay after a slider drag ends before remote updates apply again
const DEFAULT_DRAG_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Configuration for a controller session
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP base URL of the player server, e.g. `http://localhost:5457/`
    pub server_url: Url,
    /// Path of the event stream endpoint, relative to `server_url`
    pub events_path: String,
    /// Delay between a stream loss and the next connection attempt
    pub reconnect_delay: Duration,
    /// Settle delay applied when a volume drag ends
    pub drag_settle_delay: Duration,
}

impl ControllerConfig {
    /// Create a configuration for the default `client/control` variant
    pub fn new(mut server_url: Url) -> Self {
        // Url::join treats the last segment as a file unless the path ends
        // with a slash; normalize once here so endpoint joins stay relative.
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }

        Self {
            server_url,
            events_path: EVENTS_PATH_CONTROL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            drag_settle_delay: DEFAULT_DRAG_SETTLE_DELAY,
        }
    }

    /// Switch to the `client/events?roles=controller` deployment variant
    pub fn with_events_roles(mut self) -> Self {
        self.events_path = EVENTS_PATH_ROLES.to_string();
        self
    }

    /// Resolve the WebSocket URL of the event stream.
    ///
    /// Maps the configured base onto the `ws`/`wss` scheme the same way the
    /// original controller rewrites its page URL. A base whose scheme has no
    /// stream mapping is a capability gap: reported once, never retried.
    pub fn events_url(&self) -> Result<Url> {
        let mut url = self
            .server_url
            .join(&self.events_path)
            .map_err(|e| ControlError::InvalidUrl(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ControlError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| ControlError::InvalidUrl(format!("cannot use scheme {scheme}")))?;

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> ControllerConfig {
        ControllerConfig::new(Url::parse(base).unwrap())
    }

    #[test]
    fn events_url_maps_http_to_ws() {
        let url = config("http://player.local:5457").events_url().unwrap();
        assert_eq!(url.as_str(), "ws://player.local:5457/client/control");
    }

    #[test]
    fn events_url_maps_https_to_wss() {
        let url = config("https://player.local/").events_url().unwrap();
        assert_eq!(url.as_str(), "wss://player.local/client/control");
    }

    #[test]
    fn events_url_keeps_base_path() {
        let url = config("http://player.local/aurena").events_url().unwrap();
        assert_eq!(url.as_str(), "ws://player.local/aurena/client/control");
    }

    #[test]
    fn roles_variant_carries_query() {
        let url = config("http://player.local:5457")
            .with_events_roles()
            .events_url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://player.local:5457/client/events?roles=controller"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = config("file:///tmp/player").events_url().unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedScheme(_)));
    }
}
