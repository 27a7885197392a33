//! Volume sync coordination
//!
//! Reconciles two writers of the same scalar - the user dragging a
//! slider and the server pushing confirmations - without echoing remote
//! updates back out and without flooding the control endpoint with one
//! request per intermediate drag position.
//!
//! Per target (master mix or one device) the coordinator keeps a
//! [`SyncFlag`]: `sending` bounds outbound traffic to one request in
//! flight, `dirty` remembers that the value moved while a request was
//! outstanding, and `suppress_echo` marks a programmatic assignment so
//! the change hook ignores it. A request completion re-checks `dirty`,
//! so the last observed value is always the next one transmitted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::control::ControlSurface;
use crate::state::{ClientId, StateStore, MASTER_ID};

/// Concurrency-control state for one volume target
#[derive(Debug, Default)]
struct SyncFlag {
    /// An outbound request is awaiting completion
    sending: bool,
    /// The value changed since the last request was issued
    dirty: bool,
    /// A programmatic assignment is in progress; the change hook must
    /// ignore it
    suppress_echo: bool,
    /// A drag is in progress (or settling); remote updates are dropped
    holding: bool,
    /// Monotonic drag counter so a stale settle timer cannot release a
    /// newer drag's hold
    drag_epoch: u64,
}

struct VolumeInner {
    flags: Mutex<HashMap<ClientId, SyncFlag>>,
    store: Arc<StateStore>,
    control: Arc<dyn ControlSurface>,
    settle_delay: Duration,
}

/// Per-target single-flight volume sender with echo suppression.
///
/// Cheap to clone; clones share one flag table.
#[derive(Clone)]
pub struct VolumeSync {
    inner: Arc<VolumeInner>,
}

impl VolumeSync {
    pub fn new(
        store: Arc<StateStore>,
        control: Arc<dyn ControlSurface>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(VolumeInner {
                flags: Mutex::new(HashMap::new()),
                store,
                control,
                settle_delay,
            }),
        }
    }

    /// Apply a server-originated volume value.
    ///
    /// The assignment runs with `suppress_echo` asserted, so the change
    /// hook it triggers never turns the update into an outbound request.
    /// Updates for a target mid-drag are dropped, not queued; the next
    /// periodic state push reconciles. Unknown targets are dropped with
    /// a debug log.
    pub fn apply_remote(&self, target: ClientId, level: f64, animate: bool) {
        if self.inner.store.volume_of(target).is_none() {
            debug!(client_id = target, level, "volume update for unknown target dropped");
            return;
        }

        {
            let mut flags = self.inner.flags.lock();
            let flag = flags.entry(target).or_default();
            if flag.holding {
                debug!(client_id = target, level, "remote volume dropped mid-drag");
                return;
            }
            if flag.suppress_echo {
                return;
            }
            flag.suppress_echo = true;
        }

        if let Some(applied) = self.inner.store.set_volume(target, level) {
            self.inner.store.notify_volume(target, applied, animate);
        }
        self.value_changed(target);

        if let Some(flag) = self.inner.flags.lock().get_mut(&target) {
            flag.suppress_echo = false;
        }
    }

    /// Apply a user-originated volume value (slider drag or direct edit)
    pub fn set_local(&self, target: ClientId, level: f64) {
        let Some(applied) = self.inner.store.set_volume(target, level) else {
            debug!(client_id = target, level, "local volume for unknown target dropped");
            return;
        };
        self.inner.store.notify_volume(target, applied, false);
        self.value_changed(target);
    }

    /// Change hook: runs for every value assignment, local or
    /// programmatic. Programmatic assignments are recognized by
    /// `suppress_echo` and never start a send.
    fn value_changed(&self, target: ClientId) {
        {
            let mut flags = self.inner.flags.lock();
            let flag = flags.entry(target).or_default();
            if flag.suppress_echo {
                return;
            }
            flag.dirty = true;
        }
        self.try_send(target);
    }

    /// Single-flight send with trailing recheck.
    ///
    /// Reads the store's current value at issue time, so when several
    /// changes pile up behind one outstanding request only the final
    /// value is transmitted next.
    fn try_send(&self, target: ClientId) {
        let level = {
            let mut flags = self.inner.flags.lock();
            // The target may have been dropped by a roster refresh while
            // a request was in flight; its completion lands here.
            let Some(flag) = flags.get_mut(&target) else {
                return;
            };
            if flag.sending || !flag.dirty {
                return;
            }
            let Some(level) = self.inner.store.volume_of(target) else {
                return;
            };
            flag.sending = true;
            flag.dirty = false;
            level
        };

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.inner.control.set_volume(target, level).await {
                // Failures are not retried; the next local or remote
                // change re-opens the flow.
                warn!(client_id = target, level, %err, "volume send failed");
            }
            if let Some(flag) = this.inner.flags.lock().get_mut(&target) {
                flag.sending = false;
            }
            this.try_send(target);
        });
    }

    /// A slider drag started: hold off remote updates for this target
    pub fn begin_drag(&self, target: ClientId) {
        let mut flags = self.inner.flags.lock();
        let flag = flags.entry(target).or_default();
        flag.holding = true;
        flag.drag_epoch += 1;
    }

    /// A slider drag ended: release the hold after the settle delay.
    /// A drag that begins before the timer fires keeps its hold.
    pub fn end_drag(&self, target: ClientId) {
        let epoch = {
            let mut flags = self.inner.flags.lock();
            flags.entry(target).or_default().drag_epoch
        };

        let this = self.clone();
        let delay = self.inner.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut flags = this.inner.flags.lock();
            if let Some(flag) = flags.get_mut(&target) {
                if flag.drag_epoch == epoch {
                    flag.holding = false;
                }
            }
        });
    }

    /// Drop flag state for targets removed by a roster refresh. The
    /// master target always survives. A target that later reappears
    /// starts from fresh flags.
    pub fn retain_targets(&self, keep: &HashSet<ClientId>) {
        self.inner
            .flags
            .lock()
            .retain(|id, _| *id == MASTER_ID || keep.contains(id));
    }

    #[cfg(test)]
    fn flag_snapshot(&self, target: ClientId) -> Option<(bool, bool)> {
        self.inner
            .flags
            .lock()
            .get(&target)
            .map(|f| (f.sending, f.dirty))
    }
}
