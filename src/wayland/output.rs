//! Wayland output tracking: geometry, mode, name and description, per
//! `wl_output`/`xdg_output_v1`. Mirrors `struct xdpw_wlr_output` in
//! `examples/original_source/src/screencast/wlr_screencast.c`.

use parking_lot::Mutex;
use std::sync::Arc;
use wayland_client::protocol::wl_output::{self, WlOutput};
use wayland_client::{Dispatch, QueueHandle};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_v1::{self, ZxdgOutputV1};

use super::WaylandContext;

/// One compositor output. `ready` flips true once both `wl_output.done`
/// and (if bound) `zxdg_output_v1.done` have fired at least once — the
/// same two-phase readiness the original waits on before offering an
/// output to the chooser (`wlr_screencast.c`'s `output->state != XDPW_OUTPUT_PENDING`).
#[derive(Debug, Default, Clone)]
pub struct OutputGeometry {
    pub x: i32,
    pub y: i32,
    pub width_mm: i32,
    pub height_mm: i32,
    pub make: String,
    pub model: String,
    pub transform: i32,
}

#[derive(Debug, Default, Clone)]
pub struct OutputMode {
    pub width: i32,
    pub height: i32,
    pub refresh_mhz: i32,
}

pub struct OutputInfo {
    pub wl_output: WlOutput,
    pub global_name: u32,
    pub name: Mutex<Option<String>>,
    pub description: Mutex<Option<String>>,
    pub geometry: Mutex<OutputGeometry>,
    pub mode: Mutex<OutputMode>,
    pub logical_width: Mutex<i32>,
    pub logical_height: Mutex<i32>,
    pub xdg_output: Mutex<Option<ZxdgOutputV1>>,
    wl_done: std::sync::atomic::AtomicBool,
    xdg_done: std::sync::atomic::AtomicBool,
}

impl OutputInfo {
    pub fn new(wl_output: WlOutput, global_name: u32) -> Arc<Self> {
        Arc::new(Self {
            wl_output,
            global_name,
            name: Mutex::new(None),
            description: Mutex::new(None),
            geometry: Mutex::new(OutputGeometry::default()),
            mode: Mutex::new(OutputMode::default()),
            logical_width: Mutex::new(0),
            logical_height: Mutex::new(0),
            xdg_output: Mutex::new(None),
            wl_done: std::sync::atomic::AtomicBool::new(false),
            xdg_done: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// An output is usable once `wl_output` has sent its initial `done`
    /// and, if an `xdg_output` was bound for it, that has too.
    pub fn ready(&self) -> bool {
        use std::sync::atomic::Ordering::Relaxed;
        self.wl_done.load(Relaxed) && (self.xdg_output.lock().is_none() || self.xdg_done.load(Relaxed))
    }

    pub fn display_name(&self) -> String {
        self.name
            .lock()
            .clone()
            .unwrap_or_else(|| format!("output-{}", self.global_name))
    }
}

impl Dispatch<WlOutput, Arc<OutputInfo>> for WaylandContext {
    fn event(
        state: &mut Self,
        _proxy: &WlOutput,
        event: wl_output::Event,
        data: &Arc<OutputInfo>,
        _conn: &wayland_client::Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let _ = state;
        match event {
            wl_output::Event::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                make,
                model,
                transform,
                ..
            } => {
                let mut geo = data.geometry.lock();
                geo.x = x;
                geo.y = y;
                geo.width_mm = physical_width;
                geo.height_mm = physical_height;
                geo.make = make;
                geo.model = model;
                geo.transform = match transform {
                    wayland_client::WEnum::Value(t) => t as i32,
                    wayland_client::WEnum::Unknown(v) => v as i32,
                };
            }
            wl_output::Event::Mode {
                width,
                height,
                refresh,
                ..
            } => {
                let mut mode = data.mode.lock();
                mode.width = width;
                mode.height = height;
                mode.refresh_mhz = refresh;
            }
            wl_output::Event::Name { name } => {
                *data.name.lock() = Some(name);
            }
            wl_output::Event::Description { description } => {
                *data.description.lock() = Some(description);
            }
            wl_output::Event::Done => {
                data.wl_done.store(true, std::sync::atomic::Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

impl Dispatch<ZxdgOutputV1, Arc<OutputInfo>> for WaylandContext {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        data: &Arc<OutputInfo>,
        _conn: &wayland_client::Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let _ = state;
        match event {
            zxdg_output_v1::Event::LogicalSize { width, height } => {
                *data.logical_width.lock() = width;
                *data.logical_height.lock() = height;
            }
            zxdg_output_v1::Event::Name { name } => {
                *data.name.lock() = Some(name);
            }
            zxdg_output_v1::Event::Done => {
                data.xdg_done.store(true, std::sync::atomic::Ordering::Relaxed);
            }
            _ => {}
        }
    }
}
