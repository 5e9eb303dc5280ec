//! Wayland Resource Manager (spec §4.D): owns the single `wayland-client`
//! connection, binds the globals every portal module needs, and keeps the
//! output list plus buffer-capable globals up to date.
//!
//! Grounded on `examples/helixml-helix/desktop/gst-pipewire-zerocopy/src/wlr_screencopy.rs`
//! for the registry/Dispatch shape, adapted from its dedicated-thread model to
//! the single-threaded reactor required here: instead of `blocking_dispatch`
//! on a worker thread, [`WaylandContext::connection_fd`] is registered with
//! the [`crate::reactor::EventLoop`] and [`WaylandContext::dispatch_pending`]
//! is called whenever that fd is readable.

pub mod hyprland_shortcuts;
pub mod output;

use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_output::WlOutput, wl_registry, wl_seat::WlSeat, wl_shm::WlShm,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols::ext::image_capture_source::v1::client::ext_output_image_capture_source_manager_v1::ExtOutputImageCaptureSourceManagerV1;
use wayland_protocols::ext::image_copy_capture::v1::client::ext_image_copy_capture_manager_v1::ExtImageCopyCaptureManagerV1;
use wayland_protocols::wp::keyboard_shortcuts_inhibit::zv1::client::zwp_keyboard_shortcuts_inhibit_manager_v1::ZwpKeyboardShortcutsInhibitManagerV1;
use wayland_protocols::wp::keyboard_shortcuts_inhibit::zv1::client::zwp_keyboard_shortcuts_inhibitor_v1::ZwpKeyboardShortcutsInhibitorV1;
use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1;
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_pointer_constraints_v1::ZwpPointerConstraintsV1;
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1;
use wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_manager_v1::ZwlrVirtualPointerManagerV1;
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::zwp_virtual_keyboard_manager_v1::ZwpVirtualKeyboardManagerV1;

use hyprland_shortcuts::hyprland_global_shortcuts_manager_v1::HyprlandGlobalShortcutsManagerV1;
use output::OutputInfo;

/// Everything bound from the registry, plus connection plumbing. One
/// instance lives for the lifetime of the daemon (spec §4.D "Invariants":
/// "exactly one Wayland connection for the process").
pub struct WaylandContext {
    pub connection: Connection,
    pub event_queue: Mutex<Option<EventQueue<WaylandContext>>>,
    pub qh: QueueHandle<WaylandContext>,

    pub shm: Option<WlShm>,
    pub seat: Option<WlSeat>,
    pub compositor: Option<WlCompositor>,
    pub screencopy_manager: Option<ZwlrScreencopyManagerV1>,
    pub image_copy_capture_manager: Option<ExtImageCopyCaptureManagerV1>,
    pub image_capture_source_manager: Option<ExtOutputImageCaptureSourceManagerV1>,
    pub virtual_pointer_manager: Option<ZwlrVirtualPointerManagerV1>,
    pub virtual_keyboard_manager: Option<ZwpVirtualKeyboardManagerV1>,
    pub keyboard_shortcuts_inhibit_manager: Option<ZwpKeyboardShortcutsInhibitManagerV1>,
    pub global_shortcuts_manager: Option<HyprlandGlobalShortcutsManagerV1>,
    pub layer_shell: Option<ZwlrLayerShellV1>,
    pub pointer_constraints: Option<ZwpPointerConstraintsV1>,
    pub xdg_output_manager: Option<ZxdgOutputManagerV1>,
    pub linux_dmabuf: Option<ZwpLinuxDmabufV1>,

    pub outputs: Mutex<Vec<Arc<OutputInfo>>>,
}

impl WaylandContext {
    /// Connect and perform the initial registry roundtrip so every global
    /// is bound and every output has received its first `done` before the
    /// daemon starts accepting D-Bus calls.
    pub fn connect() -> anyhow::Result<(Arc<Mutex<Self>>, RawFd)> {
        let connection = Connection::connect_to_env()?;
        let display = connection.display();
        let mut event_queue: EventQueue<WaylandContext> = connection.new_event_queue();
        let qh = event_queue.handle();
        let _registry = display.get_registry(&qh, ());

        let mut ctx = WaylandContext {
            connection: connection.clone(),
            event_queue: Mutex::new(None),
            qh,
            shm: None,
            seat: None,
            compositor: None,
            screencopy_manager: None,
            image_copy_capture_manager: None,
            image_capture_source_manager: None,
            virtual_pointer_manager: None,
            virtual_keyboard_manager: None,
            keyboard_shortcuts_inhibit_manager: None,
            global_shortcuts_manager: None,
            layer_shell: None,
            pointer_constraints: None,
            xdg_output_manager: None,
            linux_dmabuf: None,
            outputs: Mutex::new(Vec::new()),
        };

        event_queue.roundtrip(&mut ctx)?;
        // a second roundtrip lets wl_output/xdg_output `done` events land
        // for outputs bound during the first one.
        event_queue.roundtrip(&mut ctx)?;

        if ctx.screencopy_manager.is_none() && ctx.image_copy_capture_manager.is_none() {
            warn!("wayland: neither zwlr_screencopy_manager_v1 nor ext_image_copy_capture_manager_v1 is advertised");
        }

        let fd = connection.as_fd().as_raw_fd();
        ctx.event_queue = Mutex::new(Some(event_queue));
        Ok((Arc::new(Mutex::new(ctx)), fd))
    }

    /// Drain whatever the compositor has already written into our socket.
    /// Called by the reactor when the connection fd becomes readable.
    pub fn dispatch_pending(this: &Arc<Mutex<Self>>) -> anyhow::Result<()> {
        let mut guard = this.lock();
        let mut queue = guard.event_queue.lock().take().expect("event queue missing");
        drop(guard);
        let result = queue.dispatch_pending(&mut *this.lock());
        this.lock().event_queue.lock().replace(queue);
        result.map(|_| ()).map_err(anyhow::Error::from)
    }

    /// Flush any pending outgoing requests. Must be called after every
    /// batch of protocol requests the rest of the daemon issues, since we
    /// are not running `blocking_dispatch` on this connection.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.connection.flush()?;
        Ok(())
    }

    pub fn output_named(&self, name: &str) -> Option<Arc<OutputInfo>> {
        self.outputs
            .lock()
            .iter()
            .find(|o| o.display_name() == name)
            .cloned()
    }

    pub fn first_output(&self) -> Option<Arc<OutputInfo>> {
        self.outputs.lock().first().cloned()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.lock().iter().map(|o| o.display_name()).collect()
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandContext {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };

        macro_rules! bind {
            ($iface:ty, $max:expr) => {
                registry.bind::<$iface, _, _>(name, version.min($max), qh, ())
            };
        }

        match interface.as_str() {
            "wl_shm" => state.shm = Some(bind!(WlShm, 1)),
            "wl_seat" => state.seat = Some(bind!(WlSeat, 7)),
            "wl_compositor" => state.compositor = Some(bind!(WlCompositor, 4)),
            "wl_output" => {
                let wl_output: WlOutput = bind!(WlOutput, 4);
                let info = OutputInfo::new(wl_output.clone(), name);
                if let Some(mgr) = &state.xdg_output_manager {
                    let xdg_output = mgr.get_xdg_output(&wl_output, qh, info.clone());
                    *info.xdg_output.lock() = Some(xdg_output);
                }
                debug!("wayland: output global {name} bound");
                state.outputs.lock().push(info);
            }
            "zwlr_screencopy_manager_v1" => {
                state.screencopy_manager = Some(bind!(ZwlrScreencopyManagerV1, 3))
            }
            "ext_image_copy_capture_manager_v1" => {
                state.image_copy_capture_manager = Some(bind!(ExtImageCopyCaptureManagerV1, 1))
            }
            "ext_output_image_capture_source_manager_v1" => {
                state.image_capture_source_manager =
                    Some(bind!(ExtOutputImageCaptureSourceManagerV1, 1))
            }
            "zwlr_virtual_pointer_manager_v1" => {
                state.virtual_pointer_manager = Some(bind!(ZwlrVirtualPointerManagerV1, 2))
            }
            "zwp_virtual_keyboard_manager_v1" => {
                state.virtual_keyboard_manager = Some(bind!(ZwpVirtualKeyboardManagerV1, 1))
            }
            "zwp_keyboard_shortcuts_inhibit_manager_v1" => {
                state.keyboard_shortcuts_inhibit_manager =
                    Some(bind!(ZwpKeyboardShortcutsInhibitManagerV1, 1))
            }
            "hyprland_global_shortcuts_manager_v1" => {
                state.global_shortcuts_manager = Some(bind!(HyprlandGlobalShortcutsManagerV1, 1))
            }
            "zwlr_layer_shell_v1" => state.layer_shell = Some(bind!(ZwlrLayerShellV1, 4)),
            "zwp_pointer_constraints_v1" => {
                state.pointer_constraints = Some(bind!(ZwpPointerConstraintsV1, 1))
            }
            "zxdg_output_manager_v1" => {
                state.xdg_output_manager = Some(bind!(ZxdgOutputManagerV1, 3))
            }
            "zwp_linux_dmabuf_v1" => state.linux_dmabuf = Some(bind!(ZwpLinuxDmabufV1, 4)),
            other => {
                tracing::trace!("wayland: ignoring global {other} v{version}");
            }
        }
    }
}

impl Dispatch<ZwlrScreencopyManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwlrScreencopyManagerV1,
        _: <ZwlrScreencopyManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ExtImageCopyCaptureManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ExtImageCopyCaptureManagerV1,
        _: <ExtImageCopyCaptureManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ExtOutputImageCaptureSourceManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ExtOutputImageCaptureSourceManagerV1,
        _: <ExtOutputImageCaptureSourceManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrVirtualPointerManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwlrVirtualPointerManagerV1,
        _: <ZwlrVirtualPointerManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpVirtualKeyboardManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpVirtualKeyboardManagerV1,
        _: <ZwpVirtualKeyboardManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpKeyboardShortcutsInhibitManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpKeyboardShortcutsInhibitManagerV1,
        _: <ZwpKeyboardShortcutsInhibitManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpKeyboardShortcutsInhibitorV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpKeyboardShortcutsInhibitorV1,
        event: <ZwpKeyboardShortcutsInhibitorV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_protocols::wp::keyboard_shortcuts_inhibit::zv1::client::zwp_keyboard_shortcuts_inhibitor_v1::Event;
        match event {
            Event::Active => debug!("wayland: keyboard shortcuts inhibited"),
            Event::Inactive => debug!("wayland: keyboard shortcuts inhibitor deactivated"),
            _ => {}
        }
    }
}

impl Dispatch<HyprlandGlobalShortcutsManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &HyprlandGlobalShortcutsManagerV1,
        _: <HyprlandGlobalShortcutsManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrLayerShellV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwlrLayerShellV1,
        _: <ZwlrLayerShellV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpPointerConstraintsV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpPointerConstraintsV1,
        _: <ZwpPointerConstraintsV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZxdgOutputManagerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZxdgOutputManagerV1,
        _: <ZxdgOutputManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpLinuxDmabufV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpLinuxDmabufV1,
        _: <ZwpLinuxDmabufV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlShm, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &WlShm,
        _: <WlShm as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlCompositor, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &WlCompositor,
        _: <WlCompositor as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlSeat, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &WlSeat,
        _: <WlSeat as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}
