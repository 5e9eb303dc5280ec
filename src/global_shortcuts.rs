//! `org.freedesktop.impl.portal.GlobalShortcuts`, backed by Hyprland's
//! `hyprland_global_shortcuts_manager_v1` protocol. Ported from
//! `examples/original_source/src/globalshortcuts/global_shortcuts.c`.
//!
//! `hyprland_global_shortcut_v1.pressed`/`.released` arrive on the Wayland
//! `Dispatch` callback below, which has no path back onto the async D-Bus
//! signal machinery. Rather than reaching across that boundary directly, it
//! pushes onto [`GlobalShortcutsRegistry::pending`]; [`crate::app_state::AppState::pump_global_shortcuts`]
//! drains that queue once per reactor tick and emits the matching
//! `Activated`/`Deactivated` signal, mirroring the screencast module's
//! `CaptureEvent` queue for the same reason.

use std::sync::Arc;

use parking_lot::RwLock;
use wayland_client::backend::ObjectId;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};

use crate::wayland::hyprland_shortcuts::hyprland_global_shortcut_v1::{
    Event as ShortcutEvent, HyprlandGlobalShortcutV1,
};
use crate::wayland::WaylandContext;

/// Identity of a bound `hyprland_global_shortcut_v1` Wayland object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortcutHandle(pub ObjectId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutDescriptor {
    pub id: String,
    pub description: String,
}

struct BoundShortcut {
    descriptor: ShortcutDescriptor,
    handle: Option<ShortcutHandle>,
}

/// Per-session shortcut state (spec §4.C.3's per-portal session payload).
#[derive(Default)]
pub struct GlobalShortcutsSessionData {
    shortcuts: Vec<BoundShortcut>,
    pub parent_window: Option<String>,
    pub sent_shortcuts: bool,
}

impl GlobalShortcutsSessionData {
    /// `CreateSession`/`BindShortcuts` both append descriptors the first
    /// time shortcuts are sent; `sent_shortcuts` makes a second send a
    /// silent no-op (`client->sentShortcuts` in the original). Returns
    /// whether this call actually applied the descriptors, so the caller
    /// knows whether to issue `register_shortcut` requests.
    pub fn add_descriptors(&mut self, descriptors: Vec<ShortcutDescriptor>) -> bool {
        if self.sent_shortcuts {
            return false;
        }
        self.sent_shortcuts = true;
        self.shortcuts = descriptors
            .into_iter()
            .map(|descriptor| BoundShortcut { descriptor, handle: None })
            .collect();
        true
    }

    pub fn descriptors(&self) -> Vec<ShortcutDescriptor> {
        self.shortcuts.iter().map(|s| s.descriptor.clone()).collect()
    }

    pub fn set_handle(&mut self, id: &str, handle: ShortcutHandle) {
        if let Some(s) = self.shortcuts.iter_mut().find(|s| s.descriptor.id == id) {
            s.handle = Some(handle);
        }
    }

    fn find_by_handle(&self, handle: &ShortcutHandle) -> Option<&ShortcutDescriptor> {
        self.shortcuts
            .iter()
            .find(|s| s.handle.as_ref() == Some(handle))
            .map(|s| &s.descriptor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutEdge {
    Pressed,
    Released,
}

/// A `pressed`/`released` event queued by the Wayland `Dispatch` impl below,
/// awaiting the next reactor tick's pump.
pub struct PendingShortcutEvent {
    pub handle: ShortcutHandle,
    pub edge: ShortcutEdge,
    pub timestamp_ms: u64,
}

/// Global registry mapping a fired `ShortcutHandle` back to the owning
/// session, used by the Activated/Deactivated dispatch below.
///
/// Resolves spec §9 Open Question 2: the original's `handleActivated`
/// uses a `goto found` that falls through to dereferencing `currc`/`curr`
/// even when the nested loop never matched, reading whatever those
/// pointers last held. Here the lookup returns `Option` and a miss is
/// logged and dropped instead of emitting garbage.
#[derive(Default)]
pub struct GlobalShortcutsRegistry {
    sessions: RwLock<Vec<(String, Arc<RwLock<GlobalShortcutsSessionData>>)>>,
    pending: RwLock<Vec<PendingShortcutEvent>>,
}

impl GlobalShortcutsRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_session(&self, session_handle: String, data: Arc<RwLock<GlobalShortcutsSessionData>>) {
        self.sessions.write().push((session_handle, data));
    }

    pub fn unregister_session(&self, session_handle: &str) {
        self.sessions.write().retain(|(h, _)| h != session_handle);
    }

    /// Resolve a fired `hyprland_global_shortcut_v1.pressed`/`.released`
    /// event back to the session and descriptor that own it. A miss (the
    /// `goto found`-without-match hazard from the original, spec §9 Open
    /// Question 2) is reported as `None` instead of dereferencing stale data;
    /// the caller (`dbus::global_shortcuts`) logs and drops it.
    pub fn resolve_owner(&self, handle: &ShortcutHandle) -> Option<(String, ShortcutDescriptor)> {
        for (session_handle, data) in self.sessions.read().iter() {
            if let Some(descriptor) = data.read().find_by_handle(handle) {
                return Some((session_handle.clone(), descriptor.clone()));
            }
        }
        None
    }

    fn push_pending(&self, event: PendingShortcutEvent) {
        self.pending.write().push(event);
    }

    /// Drain every event queued since the last tick, in arrival order.
    pub fn drain_pending(&self) -> Vec<PendingShortcutEvent> {
        std::mem::take(&mut *self.pending.write())
    }
}

/// `tv_sec_hi`/`tv_sec_lo`/`tv_nsec` (spec §4.C.3, `register_shortcut`'s
/// listener args) combine into one 64-bit seconds value the same way the
/// original's `handleActivated`/`handleDeactivated` do, then collapse to
/// milliseconds for the `timestamp` argument `Activated`/`Deactivated` use.
fn combine_timestamp_ms(tv_sec_hi: u32, tv_sec_lo: u32, tv_nsec: u32) -> u64 {
    let seconds = ((tv_sec_hi as u64) << 32) | tv_sec_lo as u64;
    seconds * 1000 + (tv_nsec as u64) / 1_000_000
}

impl Dispatch<HyprlandGlobalShortcutV1, Arc<GlobalShortcutsRegistry>> for WaylandContext {
    fn event(
        _: &mut Self,
        proxy: &HyprlandGlobalShortcutV1,
        event: ShortcutEvent,
        registry: &Arc<GlobalShortcutsRegistry>,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let handle = ShortcutHandle(proxy.id());
        let (edge, tv_sec_hi, tv_sec_lo, tv_nsec) = match event {
            ShortcutEvent::Pressed { tv_sec_hi, tv_sec_lo, tv_nsec } => {
                (ShortcutEdge::Pressed, tv_sec_hi, tv_sec_lo, tv_nsec)
            }
            ShortcutEvent::Released { tv_sec_hi, tv_sec_lo, tv_nsec } => {
                (ShortcutEdge::Released, tv_sec_hi, tv_sec_lo, tv_nsec)
            }
        };
        registry.push_pending(PendingShortcutEvent {
            handle,
            edge,
            timestamp_ms: combine_timestamp_ms(tv_sec_hi, tv_sec_lo, tv_nsec),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_add_descriptors_call_is_a_no_op() {
        let mut data = GlobalShortcutsSessionData::default();
        assert!(data.add_descriptors(vec![ShortcutDescriptor { id: "a".into(), description: "A".into() }]));
        assert!(!data.add_descriptors(vec![ShortcutDescriptor { id: "b".into(), description: "B".into() }]));
        assert_eq!(data.descriptors(), vec![ShortcutDescriptor { id: "a".into(), description: "A".into() }]);
    }

    #[test]
    fn registry_lookup_misses_cleanly_with_no_sessions() {
        let registry = GlobalShortcutsRegistry::default();
        assert!(registry.drain_pending().is_empty());
    }

    #[test]
    fn timestamp_combines_seconds_and_nanoseconds() {
        assert_eq!(combine_timestamp_ms(0, 1, 500_000_000), 1500);
        assert_eq!(combine_timestamp_ms(1, 0, 0), (1u64 << 32) * 1000);
    }
}
