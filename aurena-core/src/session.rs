//! Controller session
//!
//! The explicit session object owning every component: the state
//! store, the volume sync coordinator, the roster manager, the control
//! client and the event stream connection. The view layer holds one
//! session, registers an observer, and calls the methods below; there
//! is no ambient global state.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ControllerConfig;
use crate::connection::EventStream;
use crate::control::{ControlClient, ControlSurface};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::roster::RosterManager;
use crate::state::{ClientId, ControllerObserver, StateStore, MASTER_ID};
use crate::volume::VolumeSync;

/// A control session against one player server
pub struct ControllerSession {
    config: ControllerConfig,
    store: Arc<StateStore>,
    volume: VolumeSync,
    roster: RosterManager,
    control: Arc<dyn ControlSurface>,
    dispatcher: Arc<Dispatcher>,
    events: Mutex<Option<EventStream>>,
}

impl ControllerSession {
    /// Build a session. No network activity happens until
    /// [`ControllerSession::connect`].
    pub fn new(config: ControllerConfig) -> Result<Arc<Self>> {
        let control: Arc<dyn ControlSurface> =
            Arc::new(ControlClient::new(config.server_url.clone())?);
        Ok(Self::with_control(config, control))
    }

    /// Build a session over a caller-supplied control transport
    pub fn with_control(config: ControllerConfig, control: Arc<dyn ControlSurface>) -> Arc<Self> {
        let store = StateStore::new();
        let volume = VolumeSync::new(
            Arc::clone(&store),
            Arc::clone(&control),
            config.drag_settle_delay,
        );
        let roster = RosterManager::new(Arc::clone(&store), volume.clone(), Arc::clone(&control));
        let dispatcher = Dispatcher::new(Arc::clone(&store), volume.clone(), roster.clone());

        Arc::new(Self {
            config,
            store,
            volume,
            roster,
            control,
            dispatcher,
            events: Mutex::new(None),
        })
    }

    /// Start listening on the event stream. Idempotent: a session holds
    /// at most one connection, and a second call while one is live is a
    /// no-op.
    pub fn connect(&self) -> Result<()> {
        let mut events = self.events.lock();
        if events.is_some() {
            return Ok(());
        }

        info!(server = %self.config.server_url, "starting controller session");
        *events = Some(EventStream::spawn(
            &self.config,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.store),
            self.roster.clone(),
        )?);
        Ok(())
    }

    /// The local state mirror
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Register a view-layer observer
    pub fn add_observer(&self, observer: Arc<dyn ControllerObserver>) {
        self.store.add_observer(observer);
    }

    // ── Volume ──────────────────────────────────────────────────────

    /// User edit of the master volume
    pub fn set_master_volume(&self, level: f64) {
        self.volume.set_local(MASTER_ID, level);
    }

    /// User edit of one device's volume
    pub fn set_device_volume(&self, client_id: ClientId, level: f64) {
        self.volume.set_local(client_id, level);
    }

    /// The user grabbed a volume slider; server pushes for this target
    /// are held until the drag ends and settles
    pub fn begin_volume_drag(&self, target: ClientId) {
        self.volume.begin_drag(target);
    }

    pub fn end_volume_drag(&self, target: ClientId) {
        self.volume.end_drag(target);
    }

    // ── Devices ─────────────────────────────────────────────────────

    /// Toggle a device's enable / record-enable flags
    pub fn set_client_enable(&self, client_id: ClientId, enable: bool, record_enable: bool) {
        self.roster.set_client_enable(client_id, enable, record_enable);
    }

    /// Re-read the device roster now
    pub fn refresh_roster(&self) {
        self.roster.refresh();
    }

    // ── Transport commands ──────────────────────────────────────────
    //
    // All fire-and-forget: failures are logged, never retried, and the
    // next authoritative event corrects any optimistic state.

    pub fn play(&self) {
        self.spawn_command("play");
    }

    pub fn pause(&self) {
        self.spawn_command("pause");
    }

    /// Toggle playback, optimistically flipping the local paused flag
    /// ahead of the server's confirmation
    pub fn play_pause(&self) {
        let paused = self.store.playback().paused;
        if paused {
            self.play();
        } else {
            self.pause();
        }
        self.store.set_paused(!paused);
    }

    pub fn next(&self) {
        self.spawn_command("next");
    }

    pub fn previous(&self) {
        self.spawn_command("previous");
    }

    pub fn calibrate(&self) {
        self.spawn_command("calibration");
    }

    /// Jump to a specific resource. Accepts an integer track index or a
    /// URL beginning with `http`; anything else is rejected locally and
    /// returns false.
    pub fn jump_to(&self, id: &str) -> bool {
        let id = id.trim();
        if id.parse::<i64>().is_err() && !id.starts_with("http") {
            return false;
        }

        let control = Arc::clone(&self.control);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(err) = control.command_with_id("next", &id).await {
                warn!(id, %err, "jump-to-track failed");
            }
        });
        true
    }

    /// Enqueue a resource after the current one
    pub fn enqueue(&self, id: &str) {
        let control = Arc::clone(&self.control);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(err) = control.command_with_id("enqueue", &id).await {
                warn!(id, %err, "enqueue failed");
            }
        });
    }

    /// Seek within the current media, position in nanoseconds
    pub fn seek(&self, position_ns: u64) {
        let control = Arc::clone(&self.control);
        tokio::spawn(async move {
            if let Err(err) = control.seek(position_ns).await {
                warn!(position_ns, %err, "seek failed");
            }
        });
    }

    /// Issue any other named control command (e.g. `language`)
    pub fn send_command(&self, name: &str) {
        self.spawn_command(name);
    }

    fn spawn_command(&self, name: &str) {
        let control = Arc::clone(&self.control);
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(err) = control.command(&name).await {
                warn!(command = name, %err, "control command failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::protocol::PlayerClient;

    #[derive(Default)]
    struct RecordingSurface {
        commands: Mutex<Vec<String>>,
        ids: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ControlSurface for RecordingSurface {
        async fn set_volume(&self, _: ClientId, _: f64) -> Result<()> {
            Ok(())
        }
        async fn set_client_setting(&self, _: ClientId, _: bool, _: bool) -> Result<()> {
            Ok(())
        }
        async fn command(&self, name: &str) -> Result<()> {
            self.commands.lock().push(name.to_string());
            Ok(())
        }
        async fn command_with_id(&self, name: &str, id: &str) -> Result<()> {
            self.ids.lock().push((name.to_string(), id.to_string()));
            Ok(())
        }
        async fn seek(&self, _: u64) -> Result<()> {
            Ok(())
        }
        async fn fetch_roster(&self) -> Result<Vec<PlayerClient>> {
            Ok(Vec::new())
        }
    }

    fn session() -> (Arc<RecordingSurface>, Arc<ControllerSession>) {
        let surface = Arc::new(RecordingSurface::default());
        let config = ControllerConfig::new(url::Url::parse("http://player.local:5457/").unwrap());
        let session = ControllerSession::with_control(config, surface.clone());
        (surface, session)
    }

    #[tokio::test]
    async fn play_pause_flips_optimistically() {
        let (surface, session) = session();
        assert!(session.store().playback().paused);

        session.play_pause();
        assert!(!session.store().playback().paused);

        session.play_pause();
        assert!(session.store().playback().paused);

        tokio::task::yield_now().await;
        assert_eq!(surface.commands.lock().clone(), vec!["play", "pause"]);
    }

    #[tokio::test]
    async fn jump_to_validates_track_ids() {
        let (surface, session) = session();

        assert!(session.jump_to("12"));
        assert!(session.jump_to("http://media.local/song.ogg"));
        assert!(!session.jump_to("not-a-track"));
        assert!(!session.jump_to(""));

        tokio::task::yield_now().await;
        assert_eq!(
            surface.ids.lock().clone(),
            vec![
                ("next".to_string(), "12".to_string()),
                ("next".to_string(), "http://media.local/song.ogg".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn named_commands_pass_through() {
        let (surface, session) = session();
        session.next();
        session.previous();
        session.calibrate();
        session.send_command("language");

        tokio::task::yield_now().await;
        assert_eq!(
            surface.commands.lock().clone(),
            vec!["next", "previous", "calibration", "language"]
        );
    }
}
