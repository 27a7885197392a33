//! Event stream connection management
//!
//! Owns the one WebSocket connection to the server's control event
//! endpoint. Text frames are forwarded to the dispatcher in arrival
//! order; on any close or error the connection is dropped and reopened
//! after a fixed delay, indefinitely. There is no backoff growth and no
//! retry cap: this is a LAN control tool, not a resilience layer.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

use crate::config::{ControllerConfig, EVENT_SUBPROTOCOL};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::roster::RosterManager;
use crate::state::StateStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the running event stream task. Dropping it stops the task
/// and with it all reconnection attempts.
#[derive(Debug)]
pub struct EventStream {
    task: JoinHandle<()>,
}

impl EventStream {
    /// Start the connection task.
    ///
    /// Fails only when the configured base URL cannot carry an event
    /// stream at all (the capability gap is reported once, here, and
    /// never retried); transport-level failures after this point all
    /// feed the reconnect loop.
    pub(crate) fn spawn(
        config: &ControllerConfig,
        dispatcher: Arc<Dispatcher>,
        store: Arc<StateStore>,
        roster: RosterManager,
    ) -> Result<Self> {
        let url = config.events_url()?;
        let delay = config.reconnect_delay;
        let task = tokio::spawn(run(url, delay, dispatcher, store, roster));
        Ok(Self { task })
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    url: Url,
    reconnect_delay: Duration,
    dispatcher: Arc<Dispatcher>,
    store: Arc<StateStore>,
    roster: RosterManager,
) {
    loop {
        match open(&url).await {
            Ok(ws) => {
                info!(%url, "event stream connected");
                store.notify_connection(true);
                // Converge immediately instead of waiting for the next
                // player-clients-changed push.
                roster.refresh();

                read_frames(ws, &dispatcher).await;

                store.notify_connection(false);
                info!("event stream disconnected");
            }
            Err(err) => {
                warn!(%url, %err, "event stream connect failed");
            }
        }

        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn open(url: &Url) -> Result<WsStream> {
    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(EVENT_SUBPROTOCOL),
    );
    let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws)
}

/// Forward frames until the stream closes or errors. Only text frames
/// carry events; everything else is transport noise.
async fn read_frames(mut ws: WsStream, dispatcher: &Arc<Dispatcher>) {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatcher.handle(&text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "event stream read error");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use crate::control::ControlSurface;
    use crate::error::ControlError;
    use crate::protocol::PlayerClient;
    use crate::state::{ClientId, ControllerObserver};
    use crate::volume::VolumeSync;

    struct NullSurface;

    #[async_trait]
    impl ControlSurface for NullSurface {
        async fn set_volume(&self, _: ClientId, _: f64) -> crate::error::Result<()> {
            Ok(())
        }
        async fn set_client_setting(&self, _: ClientId, _: bool, _: bool) -> crate::error::Result<()> {
            Ok(())
        }
        async fn command(&self, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn command_with_id(&self, _: &str, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn seek(&self, _: u64) -> crate::error::Result<()> {
            Ok(())
        }
        async fn fetch_roster(&self) -> crate::error::Result<Vec<PlayerClient>> {
            Ok(Vec::new())
        }
    }

    struct ConnectionLog(mpsc::UnboundedSender<bool>);

    impl ControllerObserver for ConnectionLog {
        fn on_connection_changed(&self, connected: bool) {
            let _ = self.0.send(connected);
        }
    }

    fn session_parts() -> (Arc<StateStore>, Arc<Dispatcher>, RosterManager) {
        let surface = Arc::new(NullSurface) as Arc<dyn ControlSurface>;
        let store = StateStore::new();
        let volume = VolumeSync::new(Arc::clone(&store), surface.clone(), Duration::from_millis(100));
        let roster = RosterManager::new(Arc::clone(&store), volume.clone(), surface);
        let dispatcher = Dispatcher::new(Arc::clone(&store), volume, roster.clone());
        (store, dispatcher, roster)
    }

    #[tokio::test]
    async fn reconnects_after_close_without_duplicate_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Server: accept, deliver one event, then drop the connection.
        let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                accepted_tx.send(()).unwrap();
                ws.send(Message::Text(r#"{"msg-type":"play"}"#.into()))
                    .await
                    .unwrap();
                let _ = ws.close(None).await;
            }
        });

        let (store, dispatcher, roster) = session_parts();
        let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();
        store.add_observer(Arc::new(ConnectionLog(conn_tx)));

        let mut config = ControllerConfig::new(Url::parse(&format!("http://{addr}/")).unwrap());
        config.reconnect_delay = Duration::from_millis(20);

        let _stream = EventStream::spawn(&config, dispatcher, Arc::clone(&store), roster).unwrap();

        // First connection, then exactly one scheduled reconnect.
        accepted_rx.recv().await.unwrap();
        accepted_rx.recv().await.unwrap();

        assert_eq!(conn_rx.recv().await, Some(true));
        assert_eq!(conn_rx.recv().await, Some(false));
        assert_eq!(conn_rx.recv().await, Some(true));

        // The delivered event was dispatched in stream order.
        assert!(!store.playback().paused);
    }

    #[tokio::test]
    async fn unsupported_scheme_is_reported_once_and_never_retried() {
        let (store, dispatcher, roster) = session_parts();
        let config = ControllerConfig::new(Url::parse("ftp://player.local/").unwrap());

        let err = EventStream::spawn(&config, dispatcher, store, roster).unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedScheme(_)));
    }
}
