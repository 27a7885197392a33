//! Local mirror of the player's state
//!
//! The store is a plain data holder: every mutation is a field assignment
//! under a short-lived lock, with observers notified after the lock is
//! released. All policy (echo suppression, send coalescing, roster
//! replacement) lives in the components that write to it.

use std::collections::HashMap;

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::protocol::{ClockStats, PlayerClient};

/// Identifier of a volume-bearing target: a playback device, or
/// [`MASTER_ID`] for the master mix.
pub type ClientId = u32;

/// Sentinel id addressing the master mix target
pub const MASTER_ID: ClientId = 0;

/// Volume bounds enforced on every write
pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 1.5;

/// Playback status of the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub paused: bool,
    /// Current media resource; `None` renders as "no media". The wire
    /// carries resource id `0` for that case.
    pub current_media: Option<u32>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        // A controller starts out assuming a paused, idle player until the
        // first enrol arrives.
        Self {
            paused: true,
            current_media: None,
        }
    }
}

/// Last known state of one playback device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub client_id: ClientId,
    pub host: String,
    pub volume: f64,
    pub enabled: bool,
    pub record_enabled: bool,
    pub stats: Option<ClockStats>,
}

/// Notification interface for the view layer.
///
/// Methods default to no-ops so a view implements only what it renders.
/// Callbacks run synchronously on the handler that caused the change and
/// must not block.
pub trait ControllerObserver: Send + Sync {
    /// Event stream attached or lost
    fn on_connection_changed(&self, _connected: bool) {}

    /// Playback status or current media changed
    fn on_playback_changed(&self, _playback: &PlaybackState) {}

    /// A device's enable flags or stats changed
    fn on_device_changed(&self, _client_id: ClientId) {}

    /// The device set was replaced wholesale by a roster refresh
    fn on_roster_changed(&self) {}

    /// A volume value changed; `animate` hints whether the view should
    /// ease toward the value (server pushes) or snap (enrol, local edits)
    fn on_volume_changed(&self, _target: ClientId, _level: f64, _animate: bool) {}

    /// Diagnostic line reported by a device
    fn on_client_message(&self, _client_id: ClientId, _message: &str) {}
}

/// The authoritative local mirror: playback state, master volume, the
/// per-device map and the diagnostic message log.
#[derive(Default)]
pub struct StateStore {
    playback: RwLock<PlaybackState>,
    master_volume: RwLock<f64>,
    devices: RwLock<HashMap<ClientId, DeviceState>>,
    messages: RwLock<Vec<String>>,
    observers: RwLock<Vec<Arc<dyn ControllerObserver>>>,
}

impl StateStore {
    pub fn new() -> Arc<Self> {
        let store = Self {
            master_volume: RwLock::new(1.0),
            ..Self::default()
        };
        Arc::new(store)
    }

    pub fn add_observer(&self, observer: Arc<dyn ControllerObserver>) {
        self.observers.write().push(observer);
    }

    fn observers(&self) -> Vec<Arc<dyn ControllerObserver>> {
        self.observers.read().clone()
    }

    // ── Playback ────────────────────────────────────────────────────

    pub fn playback(&self) -> PlaybackState {
        self.playback.read().clone()
    }

    pub fn set_paused(&self, paused: bool) {
        self.update_playback(Some(paused), None);
    }

    /// Apply playback fields from an event. `resource` uses the wire
    /// convention where id `0` means "no media". Absent fields are left
    /// untouched (the lean enrol variant omits them).
    pub fn update_playback(&self, paused: Option<bool>, resource: Option<u32>) {
        let snapshot = {
            let mut playback = self.playback.write();
            if let Some(paused) = paused {
                playback.paused = paused;
            }
            if let Some(id) = resource {
                playback.current_media = (id != 0).then_some(id);
            }
            playback.clone()
        };
        for observer in self.observers() {
            observer.on_playback_changed(&snapshot);
        }
    }

    // ── Volume ──────────────────────────────────────────────────────

    /// Current volume of a target, if the target is known
    pub fn volume_of(&self, target: ClientId) -> Option<f64> {
        if target == MASTER_ID {
            Some(*self.master_volume.read())
        } else {
            self.devices.read().get(&target).map(|d| d.volume)
        }
    }

    /// Write a volume value, clamped to `[MIN_VOLUME, MAX_VOLUME]`.
    ///
    /// Returns the applied value, or `None` when the target is unknown.
    /// Does not notify observers: volume writes always flow through the
    /// sync coordinator, which owns the notification and its animate hint.
    pub fn set_volume(&self, target: ClientId, level: f64) -> Option<f64> {
        let level = level.clamp(MIN_VOLUME, MAX_VOLUME);
        if target == MASTER_ID {
            *self.master_volume.write() = level;
            Some(level)
        } else {
            let mut devices = self.devices.write();
            let device = devices.get_mut(&target)?;
            device.volume = level;
            Some(level)
        }
    }

    /// Volume as the percentage the original controller renders
    pub fn volume_percent(&self, target: ClientId) -> Option<u32> {
        self.volume_of(target).map(|v| (v * 100.0).round() as u32)
    }

    pub(crate) fn notify_volume(&self, target: ClientId, level: f64, animate: bool) {
        for observer in self.observers() {
            observer.on_volume_changed(target, level, animate);
        }
    }

    // ── Devices ─────────────────────────────────────────────────────

    pub fn device(&self, client_id: ClientId) -> Option<DeviceState> {
        self.devices.read().get(&client_id).cloned()
    }

    /// Snapshot of all known devices, ordered by client id
    pub fn devices(&self) -> Vec<DeviceState> {
        let mut devices: Vec<DeviceState> = self.devices.read().values().cloned().collect();
        devices.sort_by_key(|d| d.client_id);
        devices
    }

    /// Replace the whole device map from a fresh roster read. Devices
    /// absent from `clients` are dropped along with their state.
    pub fn replace_devices(&self, clients: &[PlayerClient]) {
        let mut map = HashMap::with_capacity(clients.len());
        for client in clients {
            map.insert(
                client.client_id,
                DeviceState {
                    client_id: client.client_id,
                    host: client.host.clone(),
                    volume: client.volume.clamp(MIN_VOLUME, MAX_VOLUME),
                    enabled: client.enabled,
                    record_enabled: client.record_enabled,
                    stats: None,
                },
            );
        }
        *self.devices.write() = map;
    }

    pub(crate) fn notify_roster(&self) {
        for observer in self.observers() {
            observer.on_roster_changed();
        }
    }

    /// Update a device's enable flags; absent fields are untouched.
    /// Returns false when the device is unknown.
    pub fn set_client_flags(
        &self,
        client_id: ClientId,
        enabled: Option<bool>,
        record_enabled: Option<bool>,
    ) -> bool {
        {
            let mut devices = self.devices.write();
            let Some(device) = devices.get_mut(&client_id) else {
                return false;
            };
            if let Some(enabled) = enabled {
                device.enabled = enabled;
            }
            if let Some(record_enabled) = record_enabled {
                device.record_enabled = record_enabled;
            }
        }
        self.notify_device(client_id);
        true
    }

    /// Replace a device's clock stats wholesale.
    /// Returns false when the device is unknown.
    pub fn set_client_stats(&self, client_id: ClientId, stats: ClockStats) -> bool {
        {
            let mut devices = self.devices.write();
            let Some(device) = devices.get_mut(&client_id) else {
                return false;
            };
            device.stats = Some(stats);
        }
        self.notify_device(client_id);
        true
    }

    fn notify_device(&self, client_id: ClientId) {
        for observer in self.observers() {
            observer.on_device_changed(client_id);
        }
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    /// Append a device diagnostic to the message log. The log is
    /// append-only and unbounded, as the original debug panel is.
    pub fn push_message(&self, client_id: ClientId, message: &str) {
        self.messages.write().push(message.to_string());
        debug!(client_id, message, "client message");
        for observer in self.observers() {
            observer.on_client_message(client_id, message);
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    pub(crate) fn notify_connection(&self, connected: bool) {
        for observer in self.observers() {
            observer.on_connection_changed(connected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: ClientId, volume: f64) -> PlayerClient {
        PlayerClient {
            client_id: id,
            host: format!("host-{id}"),
            volume,
            enabled: true,
            record_enabled: false,
        }
    }

    #[test]
    fn volume_writes_are_clamped() {
        let store = StateStore::new();
        assert_eq!(store.set_volume(MASTER_ID, 2.4), Some(MAX_VOLUME));
        assert_eq!(store.set_volume(MASTER_ID, -0.5), Some(MIN_VOLUME));
        assert_eq!(store.volume_of(MASTER_ID), Some(MIN_VOLUME));
    }

    #[test]
    fn unknown_device_volume_is_rejected() {
        let store = StateStore::new();
        assert_eq!(store.set_volume(9, 0.5), None);
    }

    #[test]
    fn zero_resource_id_means_no_media() {
        let store = StateStore::new();
        store.update_playback(Some(false), Some(42));
        assert_eq!(store.playback().current_media, Some(42));

        store.update_playback(Some(false), Some(0));
        assert_eq!(store.playback().current_media, None);
    }

    #[test]
    fn roster_replacement_drops_absent_devices() {
        let store = StateStore::new();
        store.replace_devices(&[client(1, 1.0), client(2, 0.7)]);
        assert!(store.device(2).is_some());

        store.replace_devices(&[client(1, 1.0)]);
        assert!(store.device(2).is_none());
        assert_eq!(store.devices().len(), 1);
    }

    #[test]
    fn roster_replacement_clamps_reported_volume() {
        let store = StateStore::new();
        store.replace_devices(&[client(1, 7.5)]);
        assert_eq!(store.volume_of(1), Some(MAX_VOLUME));
    }

    #[test]
    fn client_flags_update_only_named_device() {
        let store = StateStore::new();
        store.replace_devices(&[client(1, 1.0), client(7, 1.0)]);

        assert!(store.set_client_flags(7, Some(false), Some(true)));
        let seven = store.device(7).unwrap();
        assert!(!seven.enabled);
        assert!(seven.record_enabled);

        let one = store.device(1).unwrap();
        assert!(one.enabled);
        assert!(!one.record_enabled);
    }

    #[test]
    fn volume_percent_rounds() {
        let store = StateStore::new();
        store.set_volume(MASTER_ID, 0.675);
        assert_eq!(store.volume_percent(MASTER_ID), Some(68));
    }
}
