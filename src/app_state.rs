//! Shared daemon state (spec §4 "Component design" root): the Session
//! Registry, the single Wayland connection, the `GlobalShortcuts` registry,
//! loaded configuration, and the D-Bus connection the `dbus::*` interface
//! impls are registered against.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use zbus::Connection;

use crate::config::Config;
use crate::dbus::global_shortcuts::GlobalShortcutsInterface;
use crate::dbus::input_capture::InputCaptureInterface;
use crate::dbus::PORTAL_PATH;
use crate::global_shortcuts::{GlobalShortcutsRegistry, ShortcutEdge};
use crate::session::{SessionPayload, SessionRegistry};
use crate::wayland::WaylandContext;

pub struct AppState {
    pub connection: Connection,
    pub wayland: Arc<Mutex<WaylandContext>>,
    pub sessions: Arc<SessionRegistry>,
    pub global_shortcuts: Arc<GlobalShortcutsRegistry>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        connection: Connection,
        wayland: Arc<Mutex<WaylandContext>>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection,
            wayland,
            sessions: SessionRegistry::new(),
            global_shortcuts: GlobalShortcutsRegistry::new(),
            config,
        })
    }

    /// Called once per reactor tick: pump every live `ScreenCast` instance's
    /// PipeWire loop and request the next frame once the previous one has
    /// been consumed. Mirrors the original's per-instance `wl_display_dispatch`
    /// plus `pw_loop_iterate` pairing in `screencast.c`'s main loop, folded
    /// into one tick here since both now share the same thread.
    pub fn pump_screencast_streams(&self) {
        let ctx = self.wayland.lock();
        for session in self.sessions.snapshot() {
            let payload = session.payload.read();
            let SessionPayload::ScreenCast(data) = &*payload else {
                continue;
            };
            let Some(instance) = &data.instance else {
                continue;
            };
            let mut instance = instance.write();
            if instance.quit {
                continue;
            }
            if let Some(stream) = instance.pipewire.as_mut() {
                stream.dispatch_pending();
            }
            instance.request_next_frame(&ctx);
        }
    }

    /// Pump the EIS socket of every active `InputCapture` session, and drain
    /// any pointer-enter crossing queued since the last tick into a
    /// `dispatch_activated` call (spec §4.F, §8 scenario 4).
    pub async fn pump_input_capture(&self) {
        let mut activations: Vec<(String, f64, f64)> = Vec::new();
        for session in self.sessions.snapshot() {
            let input_capture = {
                let payload = session.payload.read();
                match &*payload {
                    SessionPayload::InputCapture(ic) => Some(ic.clone()),
                    _ => None,
                }
            };
            let Some(ic) = input_capture else { continue };
            let events = {
                let mut ic = ic.write();
                match ic.pump_eis().await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("app_state: eis pump failed for session {}: {e}", session.handle);
                        continue;
                    }
                }
            };
            if !events.is_empty() {
                debug!("app_state: session {} produced {} input event(s)", session.handle, events.len());
            }
            if let Some((x, y)) = ic.write().take_pending_activation() {
                activations.push((session.handle.clone(), x, y));
            }
        }
        if activations.is_empty() {
            return;
        }
        let iface_ref = match self
            .connection
            .object_server()
            .interface::<_, InputCaptureInterface>(PORTAL_PATH)
            .await
        {
            Ok(iface_ref) => iface_ref,
            Err(e) => {
                warn!("app_state: InputCapture interface unavailable: {e}");
                return;
            }
        };
        let iface = iface_ref.get().await;
        let ctx = iface_ref.signal_context();
        for (session_handle, x, y) in activations {
            // No discrete barrier ids for the fullscreen capture surface;
            // barrier_id 0 marks "crossed the single capture region".
            iface.dispatch_activated(ctx, &session_handle, 0, (x, y)).await;
        }
    }

    /// Drain `hyprland_global_shortcut_v1.pressed`/`.released` events queued
    /// by the Wayland `Dispatch` callback since the last tick and emit the
    /// matching `Activated`/`Deactivated` D-Bus signal for each.
    pub async fn pump_global_shortcuts(&self) {
        let pending = self.global_shortcuts.drain_pending();
        if pending.is_empty() {
            return;
        }
        let iface_ref = match self
            .connection
            .object_server()
            .interface::<_, GlobalShortcutsInterface>(PORTAL_PATH)
            .await
        {
            Ok(iface_ref) => iface_ref,
            Err(e) => {
                warn!("app_state: GlobalShortcuts interface unavailable: {e}");
                return;
            }
        };
        let iface = iface_ref.get().await;
        let ctx = iface_ref.signal_context();
        for event in pending {
            match event.edge {
                ShortcutEdge::Pressed => iface.dispatch_activated(ctx, &event.handle, event.timestamp_ms).await,
                ShortcutEdge::Released => iface.dispatch_deactivated(ctx, &event.handle, event.timestamp_ms).await,
            }
        }
    }
}
