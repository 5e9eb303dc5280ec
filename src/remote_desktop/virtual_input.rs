//! Virtual pointer/keyboard forwarding for `RemoteDesktop`'s `Notify*`
//! methods. Ported from `examples/original_source/src/remotedesktop/remotedesktop.c`
//! (the `zwlr_virtual_pointer_v1_*`/`zwp_virtual_keyboard_v1_*` call sites)
//! and `virtual_input.c` (global binding).

use std::time::Instant;

use anyhow::{bail, Result};
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::zwp_virtual_keyboard_v1::ZwpVirtualKeyboardV1;
use wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_v1::ZwlrVirtualPointerV1;
use xkbcommon::xkb;

use crate::wayland::WaylandContext;

/// The wlroots pointer axis enum values (`wl_pointer.axis`), reused by
/// `zwlr_virtual_pointer_v1.axis`.
pub const AXIS_VERTICAL_SCROLL: u32 = 0;
pub const AXIS_HORIZONTAL_SCROLL: u32 = 1;

/// One session's virtual input devices. Created once a `RemoteDesktop`
/// session reaches `Start` (spec §4.C.2 "invariants": devices aren't bound
/// until the session actually starts, mirroring `remotedesktop.c`'s
/// `remote->virtual_pointer` being NULL until then).
pub struct VirtualInputDevices {
    pointer: ZwlrVirtualPointerV1,
    keyboard: Option<ZwpVirtualKeyboardV1>,
    /// Session `Start` time; Wayland input-event timestamps are ms elapsed
    /// since this, not wall-clock time (`get_timestamp_ms` in the original).
    start: Instant,
}

impl VirtualInputDevices {
    pub fn new(ctx: &WaylandContext) -> Result<Self> {
        let Some(pointer_manager) = &ctx.virtual_pointer_manager else {
            bail!("remote_desktop: zwlr_virtual_pointer_manager_v1 not advertised");
        };
        let pointer = pointer_manager.create_virtual_pointer(None, &ctx.qh, ());

        let keyboard = match &ctx.virtual_keyboard_manager {
            Some(mgr) => {
                let seat = ctx
                    .seat
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("remote_desktop: no wl_seat bound for virtual keyboard"))?;
                let keyboard = mgr.create_virtual_keyboard(seat, &ctx.qh, ());
                let (keymap_fd, keymap_size) = default_keymap_fd_and_size()?;
                keyboard.keymap(
                    wayland_client::protocol::wl_keyboard::KeymapFormat::XkbV1 as u32,
                    keymap_fd,
                    keymap_size,
                );
                Some(keyboard)
            }
            None => {
                tracing::warn!("remote_desktop: zwp_virtual_keyboard_manager_v1 not advertised, keyboard events will be dropped");
                None
            }
        };

        ctx.flush()?;
        Ok(Self { pointer, keyboard, start: Instant::now() })
    }

    pub fn pointer(&self) -> &ZwlrVirtualPointerV1 {
        &self.pointer
    }

    /// Milliseconds elapsed since this session's `Start`, matching
    /// `get_timestamp_ms`'s `t_stop - t_start` in the original rather than
    /// absolute wall-clock time.
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    pub fn motion(&self, dx: f64, dy: f64) {
        self.pointer.motion(self.now_ms(), dx, dy);
        self.pointer.frame();
    }

    pub fn motion_absolute(&self, x: u32, y: u32, x_extent: u32, y_extent: u32) {
        self.pointer.motion_absolute(self.now_ms(), x, y, x_extent, y_extent);
        self.pointer.frame();
    }

    pub fn button(&self, button: u32, pressed: bool) {
        let state = if pressed {
            wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_v1::ButtonState::Pressed
        } else {
            wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_v1::ButtonState::Released
        };
        self.pointer.button(self.now_ms(), button, state);
        self.pointer.frame();
    }

    pub fn axis(&self, dx: f64, dy: f64) {
        let time = self.now_ms();
        if dx != 0.0 {
            self.pointer.axis(time, AXIS_HORIZONTAL_SCROLL, dx);
        }
        if dy != 0.0 {
            self.pointer.axis(time, AXIS_VERTICAL_SCROLL, dy);
        }
        self.pointer.frame();
    }

    pub fn axis_discrete(&self, axis: u32, value: f64, discrete: i32) {
        self.pointer.axis_discrete(self.now_ms(), axis, value, discrete);
        self.pointer.frame();
    }

    /// Emit `zwlr_virtual_pointer_v1.axis_stop` for both axes (spec §4.C.2
    /// `NotifyPointerAxis`'s `finish` option), grounded on the original's
    /// `method_remotedesktop_notify_pointer_axis`'s `b` option handling.
    pub fn axis_stop(&self) {
        let time = self.now_ms();
        self.pointer.axis_stop(time, AXIS_HORIZONTAL_SCROLL);
        self.pointer.axis_stop(time, AXIS_VERTICAL_SCROLL);
        self.pointer.frame();
    }

    pub fn keyboard_keycode(&self, keycode: i32, pressed: bool) -> Result<()> {
        let Some(keyboard) = &self.keyboard else {
            bail!("remote_desktop: no virtual keyboard bound");
        };
        let state = if pressed { 1 } else { 0 };
        keyboard.key(self.now_ms(), keycode as u32, state);
        Ok(())
    }

    /// `NotifyKeyboardKeysym`: resolve the xkb keysym to an evdev keycode via
    /// a scratch xkb state, per `remotedesktop.c`'s use of `xkb_keymap_key_for_each`.
    pub fn keyboard_keysym(&self, keysym: i32, pressed: bool) -> Result<()> {
        let Some(keyboard) = &self.keyboard else {
            bail!("remote_desktop: no virtual keyboard bound");
        };
        let keycode = keycode_for_keysym(keysym as u32)
            .ok_or_else(|| anyhow::anyhow!("remote_desktop: no keycode maps to keysym {keysym:#x}"))?;
        let state = if pressed { 1 } else { 0 };
        keyboard.key(self.now_ms(), keycode, state);
        Ok(())
    }
}

/// Search the default keymap's keys for one producing `keysym` at level 0,
/// group 0 — a linear scan is fine here since this only runs on demand, not
/// per-frame.
fn keycode_for_keysym(keysym: u32) -> Option<u32> {
    let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
    let keymap = xkb::Keymap::new_from_names(&context, "", "", "", "", None, xkb::KEYMAP_COMPILE_NO_FLAGS)?;
    let min = keymap.min_keycode();
    let max = keymap.max_keycode();
    for raw in min.raw()..=max.raw() {
        let code = xkb::Keycode::new(raw);
        let syms = keymap.key_get_syms_by_level(code, 0, 0);
        if syms.iter().any(|s| *s == keysym) {
            // Wayland keycodes are evdev keycodes = xkb keycode - 8.
            return Some(raw.saturating_sub(8));
        }
    }
    None
}

/// Compile the empty-names (system default) xkb keymap, write it into an
/// anonymous memfd as a nul-terminated string, and return both the fd and
/// its size the way `zwp_virtual_keyboard_v1.keymap` expects.
fn default_keymap_fd_and_size() -> Result<(std::os::fd::OwnedFd, u32)> {
    use std::io::Write;
    use std::os::fd::{AsRawFd, FromRawFd};

    let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
    let keymap = xkb::Keymap::new_from_names(&context, "", "", "", "", None, xkb::KEYMAP_COMPILE_NO_FLAGS)
        .ok_or_else(|| anyhow::anyhow!("remote_desktop: failed to compile default xkb keymap"))?;
    let mut keymap_str = keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1).into_bytes();
    keymap_str.push(0);
    let size = keymap_str.len() as u32;

    let fd = unsafe {
        let raw = libc::memfd_create(
            b"xdg-desktop-portal-wlr-keymap\0".as_ptr() as *const libc::c_char,
            libc::MFD_CLOEXEC | libc::MFD_ALLOW_SEALING,
        );
        if raw < 0 {
            bail!("memfd_create failed: {}", std::io::Error::last_os_error());
        }
        std::os::fd::OwnedFd::from_raw_fd(raw)
    };
    let mut file = unsafe { std::fs::File::from_raw_fd(libc::dup(fd.as_raw_fd())) };
    file.write_all(&keymap_str)?;
    file.flush()?;

    Ok((fd, size))
}

impl wayland_client::Dispatch<ZwlrVirtualPointerV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwlrVirtualPointerV1,
        _: <ZwlrVirtualPointerV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &wayland_client::Connection,
        _: &wayland_client::QueueHandle<Self>,
    ) {
    }
}

impl wayland_client::Dispatch<ZwpVirtualKeyboardV1, ()> for WaylandContext {
    fn event(
        _: &mut Self,
        _: &ZwpVirtualKeyboardV1,
        _: <ZwpVirtualKeyboardV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &wayland_client::Connection,
        _: &wayland_client::QueueHandle<Self>,
    ) {
    }
}
