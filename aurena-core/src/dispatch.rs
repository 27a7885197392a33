//! Inbound event dispatch
//!
//! Decodes each text frame from the event stream and routes it by its
//! `msg-type` discriminant. Handlers run synchronously in arrival order
//! and never block on network I/O; a roster refresh is fire-and-forget.
//! Malformed payloads and unknown discriminants are logged and dropped,
//! never fatal.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::protocol::ServerEvent;
use crate::roster::RosterManager;
use crate::state::{StateStore, MASTER_ID};
use crate::volume::VolumeSync;

/// Routes decoded server events into the store and coordinator
pub struct Dispatcher {
    store: Arc<StateStore>,
    volume: VolumeSync,
    roster: RosterManager,
}

impl Dispatcher {
    pub fn new(store: Arc<StateStore>, volume: VolumeSync, roster: RosterManager) -> Arc<Self> {
        Arc::new(Self {
            store,
            volume,
            roster,
        })
    }

    /// Handle one raw text frame from the event stream
    pub fn handle(&self, raw: &str) {
        let event = match serde_json::from_str::<ServerEvent>(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, raw, "dropping malformed event");
                return;
            }
        };

        match event {
            ServerEvent::Enrol {
                volume_level,
                paused,
                resource_id,
            } => {
                self.store.update_playback(paused, resource_id);
                // Full state sync snaps the slider rather than easing it.
                self.volume.apply_remote(MASTER_ID, volume_level, false);
            }

            ServerEvent::Play => self.store.set_paused(false),
            ServerEvent::Pause => self.store.set_paused(true),

            ServerEvent::SetMedia {
                paused,
                resource_id,
            } => self.store.update_playback(Some(paused), Some(resource_id)),

            ServerEvent::Volume { level } => {
                self.volume.apply_remote(MASTER_ID, level, true);
            }

            ServerEvent::ClientVolume { client_id, level } => {
                self.volume.apply_remote(client_id, level, true);
            }

            ServerEvent::ClientSetting {
                client_id,
                enabled,
                record_enabled,
            } => {
                if !self.store.set_client_flags(client_id, enabled, record_enabled) {
                    debug!(client_id, "setting for unknown device dropped");
                }
            }

            ServerEvent::ClientMessage { client_id, message } => {
                self.store.push_message(client_id, &message);
            }

            ServerEvent::ClientStats { client_id, stats } => {
                if !self.store.set_client_stats(client_id, stats) {
                    debug!(client_id, "stats for unknown device dropped");
                }
            }

            ServerEvent::PlayerClientsChanged => self.roster.refresh(),

            ServerEvent::Ping => trace!("ping"),

            ServerEvent::Unknown => warn!(raw, "unrecognized event"),
        }
    }
}
