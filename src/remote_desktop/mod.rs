//! `org.freedesktop.impl.portal.RemoteDesktop` session state and input
//! forwarding (spec §4.C.2). Ported from
//! `examples/original_source/src/remotedesktop/remotedesktop.c`.

pub mod virtual_input;

use tracing::warn;

use crate::wayland::WaylandContext;
use virtual_input::VirtualInputDevices;

/// Device type bits reported by `SelectDevices`/returned by `GetAvailableDeviceTypes`
/// (spec §4.C.2's device bitmask, unchanged from the original's
/// `DEVICE_TYPE_KEYBOARD`/`DEVICE_TYPE_POINTER`/`DEVICE_TYPE_TOUCHSCREEN`).
pub const DEVICE_KEYBOARD: u32 = 1 << 0;
pub const DEVICE_POINTER: u32 = 1 << 1;
pub const DEVICE_TOUCHSCREEN: u32 = 1 << 2;

/// One active remote-input touch point (spec §3 supplement: touch events are
/// fully implemented, not stubbed as in the original).
#[derive(Debug, Clone, Copy)]
struct TouchPoint {
    slot: u32,
    x: f64,
    y: f64,
}

/// Per-session `RemoteDesktop` state.
#[derive(Default)]
pub struct RemoteDesktopSessionData {
    pub selected_devices: u32,
    devices: Option<VirtualInputDevices>,
    touch_points: Vec<TouchPoint>,
}

impl RemoteDesktopSessionData {
    /// `Start`: bind the virtual input devices the session negotiated via
    /// `SelectDevices`. Idempotent — a second `Start` call is a no-op,
    /// matching the session already-started guard in spec §5.
    pub fn start(&mut self, ctx: &WaylandContext) -> anyhow::Result<()> {
        if self.devices.is_some() {
            return Ok(());
        }
        self.devices = Some(VirtualInputDevices::new(ctx)?);
        Ok(())
    }

    fn devices(&self) -> Option<&VirtualInputDevices> {
        self.devices.as_ref()
    }

    pub fn notify_pointer_motion(&self, dx: f64, dy: f64) {
        if self.selected_devices & DEVICE_POINTER == 0 {
            return;
        }
        match self.devices() {
            Some(d) => d.motion(dx, dy),
            None => warn!("remote_desktop: NotifyPointerMotion before Start"),
        }
    }

    pub fn notify_pointer_motion_absolute(&self, x: u32, y: u32, x_extent: u32, y_extent: u32) {
        if self.selected_devices & DEVICE_POINTER == 0 {
            return;
        }
        match self.devices() {
            Some(d) => d.motion_absolute(x, y, x_extent, y_extent),
            None => warn!("remote_desktop: NotifyPointerMotionAbsolute before Start"),
        }
    }

    pub fn notify_pointer_button(&self, button: i32, pressed: bool) {
        if self.selected_devices & DEVICE_POINTER == 0 {
            return;
        }
        match self.devices() {
            Some(d) => d.button(button as u32, pressed),
            None => warn!("remote_desktop: NotifyPointerButton before Start"),
        }
    }

    /// `finish` mirrors the `finish: b` option (spec §4.C.2): the client
    /// marks the end of a physical scroll gesture, at which point we emit
    /// `axis_stop` on both axes the way a real scroll wheel would.
    pub fn notify_pointer_axis(&self, dx: f64, dy: f64, finish: bool) {
        if self.selected_devices & DEVICE_POINTER == 0 {
            return;
        }
        match self.devices() {
            Some(d) => {
                d.axis(dx, dy);
                if finish {
                    d.axis_stop();
                }
            }
            None => warn!("remote_desktop: NotifyPointerAxis before Start"),
        }
    }

    pub fn notify_pointer_axis_discrete(&self, axis: u32, steps: i32) {
        if self.selected_devices & DEVICE_POINTER == 0 {
            return;
        }
        match self.devices() {
            Some(d) => d.axis_discrete(axis, steps as f64, steps),
            None => warn!("remote_desktop: NotifyPointerAxisDiscrete before Start"),
        }
    }

    pub fn notify_keyboard_keycode(&self, keycode: i32, pressed: bool) {
        if self.selected_devices & DEVICE_KEYBOARD == 0 {
            return;
        }
        match self.devices() {
            Some(d) => {
                if let Err(e) = d.keyboard_keycode(keycode, pressed) {
                    warn!("remote_desktop: NotifyKeyboardKeycode: {e}");
                }
            }
            None => warn!("remote_desktop: NotifyKeyboardKeycode before Start"),
        }
    }

    pub fn notify_keyboard_keysym(&self, keysym: i32, pressed: bool) {
        if self.selected_devices & DEVICE_KEYBOARD == 0 {
            return;
        }
        match self.devices() {
            Some(d) => {
                if let Err(e) = d.keyboard_keysym(keysym, pressed) {
                    warn!("remote_desktop: NotifyKeyboardKeysym: {e}");
                }
            }
            None => warn!("remote_desktop: NotifyKeyboardKeysym before Start"),
        }
    }

    /// `NotifyTouchDown`: open a new touch point. The original stubs this
    /// out entirely (no wlr virtual-touch protocol exists); per spec §3 this
    /// is supplemented by tracking touch points and forwarding them as
    /// relative pointer motion plus button 0 on the first/last point, the
    /// best approximation available without a dedicated touch protocol.
    pub fn notify_touch_down(&mut self, slot: u32, x: f64, y: f64, x_extent: u32, y_extent: u32) {
        if self.selected_devices & DEVICE_TOUCHSCREEN == 0 {
            return;
        }
        self.touch_points.retain(|t| t.slot != slot);
        self.touch_points.push(TouchPoint { slot, x, y });
        match self.devices() {
            Some(d) => {
                d.motion_absolute(x as u32, y as u32, x_extent, y_extent);
                d.button(0x110 /* BTN_LEFT */, true);
            }
            None => warn!("remote_desktop: NotifyTouchDown before Start"),
        }
    }

    pub fn notify_touch_motion(&mut self, slot: u32, x: f64, y: f64, x_extent: u32, y_extent: u32) {
        if self.selected_devices & DEVICE_TOUCHSCREEN == 0 {
            return;
        }
        if let Some(point) = self.touch_points.iter_mut().find(|t| t.slot == slot) {
            point.x = x;
            point.y = y;
        }
        match self.devices() {
            Some(d) => d.motion_absolute(x as u32, y as u32, x_extent, y_extent),
            None => warn!("remote_desktop: NotifyTouchMotion before Start"),
        }
    }

    pub fn notify_touch_up(&mut self, slot: u32) {
        if self.selected_devices & DEVICE_TOUCHSCREEN == 0 {
            return;
        }
        self.touch_points.retain(|t| t.slot != slot);
        match self.devices() {
            Some(d) => d.button(0x110, false),
            None => warn!("remote_desktop: NotifyTouchUp before Start"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_before_start_are_dropped_not_panicking() {
        let mut data = RemoteDesktopSessionData { selected_devices: DEVICE_POINTER | DEVICE_TOUCHSCREEN, ..Default::default() };
        data.notify_pointer_motion(1.0, 1.0);
        data.notify_touch_down(0, 10.0, 10.0, 1920, 1080);
        assert_eq!(data.touch_points.len(), 1);
    }

    #[test]
    fn unselected_device_events_are_ignored() {
        let mut data = RemoteDesktopSessionData { selected_devices: DEVICE_POINTER, ..Default::default() };
        data.notify_touch_down(0, 5.0, 5.0, 1920, 1080);
        assert!(data.touch_points.is_empty());
    }

    #[test]
    fn touch_up_removes_the_tracked_point() {
        let mut data = RemoteDesktopSessionData { selected_devices: DEVICE_TOUCHSCREEN, ..Default::default() };
        data.notify_touch_down(3, 1.0, 1.0, 1920, 1080);
        assert_eq!(data.touch_points.len(), 1);
        data.notify_touch_up(3);
        assert!(data.touch_points.is_empty());
    }
}
