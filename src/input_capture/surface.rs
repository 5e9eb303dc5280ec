//! Wayland objects backing an enabled `InputCapture` session: the
//! fullscreen layer-surface anchored to all four edges, the pointer it
//! captures through, and (if `Keyboard` was requested) the keyboard it
//! captures through plus the shortcuts inhibitor. Grounded on
//! `examples/original_source/src/input_capture/input_capture.c`'s
//! `dbus_method_Enable` and `wayland_handle_pointer_enter`.

use std::sync::Arc;

use anyhow::Context as _;
use parking_lot::RwLock;
use tracing::{debug, warn};
use wayland_client::protocol::{wl_keyboard::WlKeyboard, wl_pointer, wl_pointer::WlPointer, wl_surface::WlSurface};
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::wp::keyboard_shortcuts_inhibit::zv1::client::zwp_keyboard_shortcuts_inhibitor_v1::ZwpKeyboardShortcutsInhibitorV1;
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_locked_pointer_v1::ZwpLockedPointerV1;
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_pointer_constraints_v1::Lifetime;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::Layer;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::{
    self, Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1,
};

use crate::input_capture::{InputCaptureSession, CAP_KEYBOARD, CAP_POINTER};
use crate::wayland::WaylandContext;

/// The Wayland-side resources `Enable` creates (spec §4.F). Torn down in
/// reverse creation order by [`Self::destroy`], matching the original's
/// `cleanup_session_wayland`.
pub struct CaptureSurfaceBundle {
    pub surface: WlSurface,
    pub layer_surface: ZwlrLayerSurfaceV1,
    pub pointer: Option<WlPointer>,
    pub keyboard: Option<WlKeyboard>,
    pub locked_pointer: Option<ZwpLockedPointerV1>,
    pub shortcuts_inhibitor: Option<ZwpKeyboardShortcutsInhibitorV1>,
}

impl CaptureSurfaceBundle {
    pub fn destroy(self) {
        if let Some(inhibitor) = self.shortcuts_inhibitor {
            inhibitor.destroy();
        }
        if let Some(locked) = self.locked_pointer {
            locked.destroy();
        }
        if let Some(keyboard) = self.keyboard {
            keyboard.release();
        }
        if let Some(pointer) = self.pointer {
            pointer.release();
        }
        self.layer_surface.destroy();
        self.surface.destroy();
    }
}

/// Create the layer-surface bundle for a freshly enabled session: one
/// surface anchored to all four edges with size (0,0), committed, plus a
/// pointer/keyboard from the seat for whichever capabilities were granted
/// and (if Keyboard) a keyboard-shortcuts inhibitor. The persistent pointer
/// lock is created lazily on the first `wl_pointer.enter`, same as the
/// original.
pub fn create(
    ctx: &WaylandContext,
    session: Arc<RwLock<InputCaptureSession>>,
    capabilities: u32,
) -> anyhow::Result<CaptureSurfaceBundle> {
    let compositor = ctx.compositor.as_ref().context("wl_compositor not bound")?;
    let layer_shell = ctx.layer_shell.as_ref().context("zwlr_layer_shell_v1 not bound")?;
    let seat = ctx.seat.as_ref().context("wl_seat not bound")?;

    let surface = compositor.create_surface(&ctx.qh, ());
    let layer_surface = layer_shell.get_layer_surface(
        &surface,
        None,
        Layer::Overlay,
        "input-capture-portal".to_string(),
        &ctx.qh,
        session.clone(),
    );
    layer_surface.set_anchor(Anchor::Top | Anchor::Left | Anchor::Right | Anchor::Bottom);
    layer_surface.set_size(0, 0);

    let keyboard_requested = capabilities & CAP_KEYBOARD != 0;
    if keyboard_requested {
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
    }
    surface.commit();

    let pointer = (capabilities & CAP_POINTER != 0).then(|| seat.get_pointer(&ctx.qh, session.clone()));
    let keyboard = keyboard_requested.then(|| seat.get_keyboard(&ctx.qh, session.clone()));
    let shortcuts_inhibitor = keyboard_requested
        .then(|| ctx.keyboard_shortcuts_inhibit_manager.as_ref())
        .flatten()
        .map(|mgr| mgr.inhibit_shortcuts(&surface, seat, &ctx.qh, ()));

    debug!("input_capture: layer-surface bundle created (keyboard: {keyboard_requested})");
    Ok(CaptureSurfaceBundle { surface, layer_surface, pointer, keyboard, locked_pointer: None, shortcuts_inhibitor })
}

impl Dispatch<ZwlrLayerSurfaceV1, Arc<RwLock<InputCaptureSession>>> for WaylandContext {
    fn event(
        _: &mut Self,
        surface: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        session: &Arc<RwLock<InputCaptureSession>>,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure { serial, .. } => {
                surface.ack_configure(serial);
                if let Some(bundle) = &session.read().surfaces {
                    bundle.surface.commit();
                }
            }
            zwlr_layer_surface_v1::Event::Closed => {
                warn!("input_capture: layer surface closed unexpectedly, disabling session");
                session.write().handle_surface_closed();
            }
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, Arc<RwLock<InputCaptureSession>>> for WaylandContext {
    fn event(
        state: &mut Self,
        pointer: &WlPointer,
        event: wl_pointer::Event,
        session: &Arc<RwLock<InputCaptureSession>>,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_pointer::Event::Enter { surface, surface_x, surface_y, .. } = event {
            debug!("input_capture: pointer entered capture surface at ({surface_x}, {surface_y})");
            let mut guard = session.write();
            if let Some(bundle) = &mut guard.surfaces {
                if bundle.locked_pointer.is_none() {
                    if let Some(constraints) = &state.pointer_constraints {
                        let locked = constraints.lock_pointer(&surface, pointer, None, Lifetime::Persistent, qh, ());
                        bundle.locked_pointer = Some(locked);
                    }
                }
            }
            guard.queue_activation(surface_x, surface_y);
        }
    }
}

impl Dispatch<WlKeyboard, Arc<RwLock<InputCaptureSession>>> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &WlKeyboard,
        _: wayland_client::protocol::wl_keyboard::Event,
        _: &Arc<RwLock<InputCaptureSession>>,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpLockedPointerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpLockedPointerV1,
        _: <ZwpLockedPointerV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}
