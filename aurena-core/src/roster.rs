//! Device roster management
//!
//! Fetches the set of playback devices from the player-info endpoint,
//! replaces the store's device map wholesale, and issues enable /
//! record-enable control requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::control::ControlSurface;
use crate::error::Result;
use crate::state::{ClientId, StateStore};
use crate::volume::VolumeSync;

struct RosterInner {
    store: Arc<StateStore>,
    volume: VolumeSync,
    control: Arc<dyn ControlSurface>,
    /// One guard for all enable toggles: a toggle while a request is in
    /// flight is dropped, not queued. Looser than the per-target volume
    /// coalescing; kept as the original behaves.
    sending_enable: AtomicBool,
}

/// Fetches and replaces the device roster; sends enable toggles.
///
/// Cheap to clone; clones share the toggle guard.
#[derive(Clone)]
pub struct RosterManager {
    inner: Arc<RosterInner>,
}

impl RosterManager {
    pub fn new(store: Arc<StateStore>, volume: VolumeSync, control: Arc<dyn ControlSurface>) -> Self {
        Self {
            inner: Arc::new(RosterInner {
                store,
                volume,
                control,
                sending_enable: AtomicBool::new(false),
            }),
        }
    }

    /// Fire-and-forget roster refresh, used by the message dispatcher
    /// which must never block on I/O
    pub fn refresh(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.refresh_now().await {
                warn!(%err, "roster refresh failed");
            }
        });
    }

    /// Read the roster and replace the local device set wholesale.
    ///
    /// Devices absent from the response are dropped together with their
    /// coordinator flag state; each fetched device's volume is applied
    /// through the coordinator with echo suppression so initialization
    /// never produces outbound writes.
    pub async fn refresh_now(&self) -> Result<()> {
        let clients = self.inner.control.fetch_roster().await?;
        info!(devices = clients.len(), "roster fetched");

        let keep = clients.iter().map(|c| c.client_id).collect();
        self.inner.store.replace_devices(&clients);
        self.inner.volume.retain_targets(&keep);
        for client in &clients {
            self.inner
                .volume
                .apply_remote(client.client_id, client.volume, false);
        }

        self.inner.store.notify_roster();
        Ok(())
    }

    /// Toggle a device's enable flags.
    ///
    /// The local mirror updates immediately (the control the user
    /// flipped already shows the new state); the outbound request is
    /// dropped when another toggle is still in flight.
    pub fn set_client_enable(&self, client_id: ClientId, enable: bool, record_enable: bool) {
        self.inner
            .store
            .set_client_flags(client_id, Some(enable), Some(record_enable));

        if self.inner.sending_enable.swap(true, Ordering::SeqCst) {
            debug!(client_id, "enable toggle dropped, request in flight");
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this
                .inner
                .control
                .set_client_setting(client_id, enable, record_enable)
                .await
            {
                warn!(client_id, %err, "setclient request failed");
            }
            this.inner.sending_enable.store(false, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::{mpsc, Semaphore};

    use crate::protocol::PlayerClient;

    struct MockSurface {
        roster: Mutex<Vec<PlayerClient>>,
        volume_sends: Mutex<Vec<(ClientId, f64)>>,
        setting_started: mpsc::UnboundedSender<(ClientId, bool, bool)>,
        setting_gate: Semaphore,
        settings: Mutex<Vec<(ClientId, bool, bool)>>,
    }

    impl MockSurface {
        fn new(
            roster: Vec<PlayerClient>,
        ) -> (Arc<Self>, mpsc::UnboundedReceiver<(ClientId, bool, bool)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let surface = Arc::new(Self {
                roster: Mutex::new(roster),
                volume_sends: Mutex::new(Vec::new()),
                setting_started: tx,
                setting_gate: Semaphore::new(0),
                settings: Mutex::new(Vec::new()),
            });
            (surface, rx)
        }
    }

    #[async_trait]
    impl ControlSurface for MockSurface {
        async fn set_volume(&self, target: ClientId, level: f64) -> Result<()> {
            self.volume_sends.lock().push((target, level));
            Ok(())
        }

        async fn set_client_setting(
            &self,
            client_id: ClientId,
            enable: bool,
            record_enable: bool,
        ) -> Result<()> {
            self.setting_started
                .send((client_id, enable, record_enable))
                .unwrap();
            self.setting_gate.acquire().await.unwrap().forget();
            self.settings.lock().push((client_id, enable, record_enable));
            Ok(())
        }

        async fn command(&self, _: &str) -> Result<()> {
            Ok(())
        }

        async fn command_with_id(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn seek(&self, _: u64) -> Result<()> {
            Ok(())
        }

        async fn fetch_roster(&self) -> Result<Vec<PlayerClient>> {
            Ok(self.roster.lock().clone())
        }
    }

    fn client(id: ClientId, volume: f64) -> PlayerClient {
        PlayerClient {
            client_id: id,
            host: format!("host-{id}"),
            volume,
            enabled: true,
            record_enabled: false,
        }
    }

    fn fixture(
        roster: Vec<PlayerClient>,
    ) -> (
        Arc<MockSurface>,
        mpsc::UnboundedReceiver<(ClientId, bool, bool)>,
        Arc<StateStore>,
        RosterManager,
    ) {
        let (surface, rx) = MockSurface::new(roster);
        let store = StateStore::new();
        let volume = VolumeSync::new(
            Arc::clone(&store),
            surface.clone() as Arc<dyn ControlSurface>,
            Duration::from_millis(100),
        );
        let manager = RosterManager::new(
            Arc::clone(&store),
            volume,
            surface.clone() as Arc<dyn ControlSurface>,
        );
        (surface, rx, store, manager)
    }

    #[tokio::test]
    async fn refresh_replaces_devices_without_sending_volumes() {
        let (surface, _rx, store, manager) = fixture(vec![client(1, 0.9), client(2, 0.4)]);

        manager.refresh_now().await.unwrap();
        assert_eq!(store.devices().len(), 2);
        assert_eq!(store.volume_of(2), Some(0.4));

        tokio::task::yield_now().await;
        // Initialization goes through the echo-suppressed path.
        assert_eq!(surface.volume_sends.lock().clone(), Vec::new());
    }

    #[tokio::test]
    async fn refresh_drops_devices_missing_from_response() {
        let (surface, _rx, store, manager) = fixture(vec![client(1, 1.0), client(2, 1.0)]);
        manager.refresh_now().await.unwrap();
        assert!(store.device(2).is_some());

        *surface.roster.lock() = vec![client(1, 1.0)];
        manager.refresh_now().await.unwrap();
        assert!(store.device(2).is_none());
    }

    #[tokio::test]
    async fn second_toggle_in_flight_is_dropped() {
        let (surface, mut rx, store, manager) = fixture(vec![client(3, 1.0), client(4, 1.0)]);
        manager.refresh_now().await.unwrap();

        manager.set_client_enable(3, false, false);
        assert_eq!(rx.recv().await, Some((3, false, false)));

        // A second toggle while the first request is outstanding: the
        // mirror updates, the request is dropped.
        manager.set_client_enable(4, false, true);
        assert!(!store.device(4).unwrap().enabled);
        assert!(store.device(4).unwrap().record_enabled);

        surface.setting_gate.add_permits(1);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(surface.settings.lock().clone(), vec![(3, false, false)]);

        // Once the flight completes, toggles flow again.
        manager.set_client_enable(4, true, false);
        assert_eq!(rx.recv().await, Some((4, true, false)));
    }
}
