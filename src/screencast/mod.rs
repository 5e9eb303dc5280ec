//! ScreenCast capture pipeline orchestration (spec §4.C.1).
//!
//! Grounded on `examples/original_source/src/screencast/screencast.c` for
//! the instance lifecycle (refcounted, `exec_before`/`exec_after` hooks,
//! `quit` flag) and on
//! `examples/helixml-helix/desktop/gst-pipewire-zerocopy/src/wlr_screencopy.rs`
//! for the capture-cycle shape (request frame -> buffer -> copy -> ready).

pub mod backend;
pub mod buffer;
pub mod chooser;
pub mod damage;
pub mod fps_limit;
pub mod share_picker;
pub mod stream;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use wayland_protocols::ext::image_copy_capture::v1::client::{
    ext_image_copy_capture_frame_v1::{self, ExtImageCopyCaptureFrameV1},
    ext_image_copy_capture_session_v1::{self, ExtImageCopyCaptureSessionV1},
};
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_frame_v1::{
    self, ZwlrScreencopyFrameV1,
};

use crate::config::{ForcedPixelFormat, ScreencastConfig};
use crate::wayland::output::OutputInfo;
use crate::wayland::WaylandContext;
use backend::{translate_ext_image_copy_event, translate_screencopy_event, translate_session_event, CaptureBackend, CaptureEvent};
use buffer::BufferConstraints;
use damage::DamageTracker;
use fps_limit::FpsLimiter;

/// A running (or just-negotiated) capture. One `ScreencastInstance` is
/// shared by every `Session` that was told to share the same stream;
/// `refcount` tracks how many, and reaching zero sets `quit` instead of
/// tearing down synchronously, so the next reactor tick can do it off the
/// D-Bus call stack (mirrors `screencast.c`'s `cast->quit`).
pub struct ScreencastInstance {
    pub output: Arc<OutputInfo>,
    pub config: ScreencastConfig,
    pub backend: CaptureBackend,
    pub damage: DamageTracker,
    pub fps_limiter: FpsLimiter,
    pub constraints: Option<BufferConstraints>,
    pub pipewire: Option<stream::PipewireStream>,
    pub refcount: u32,
    pub quit: bool,
    pub exec_before_ran: bool,
}

impl ScreencastInstance {
    pub fn new(output: Arc<OutputInfo>, config: ScreencastConfig, ctx: &WaylandContext) -> anyhow::Result<Arc<RwLock<Self>>> {
        let backend = CaptureBackend::new_for_output(ctx, &output)?;
        let fps_limiter = FpsLimiter::new(config.max_fps);
        let instance = Self {
            output,
            config,
            backend,
            damage: DamageTracker::new(),
            fps_limiter,
            constraints: None,
            pipewire: None,
            refcount: 1,
            quit: false,
            exec_before_ran: false,
        };
        Ok(Arc::new(RwLock::new(instance)))
    }

    /// Run the `exec_before` hook exactly once, the way `screencast.c`
    /// fires it as soon as `Start` begins negotiating. Non-fatal: a
    /// misconfigured or missing command is logged and otherwise ignored.
    pub fn run_exec_before(&mut self) {
        if self.exec_before_ran {
            return;
        }
        self.exec_before_ran = true;
        if let Some(cmd) = self.config.exec_before.clone() {
            spawn_hook("exec_before", &cmd);
        }
    }

    fn run_exec_after(&self) {
        if let Some(cmd) = &self.config.exec_after {
            spawn_hook("exec_after", cmd);
        }
    }

    pub fn acquire(this: &Arc<RwLock<Self>>) {
        this.write().refcount += 1;
    }

    /// Mirrors `xdpw_screencast_instance_destroy`'s refcounting: only the
    /// last releaser actually tears the capture down.
    pub fn release(&mut self) {
        if self.refcount == 0 {
            warn!("screencast: release() called on an instance with refcount already 0");
            return;
        }
        self.refcount -= 1;
        if self.refcount == 0 {
            self.quit = true;
            self.run_exec_after();
            info!("screencast: instance for {} marked for teardown", self.output.display_name());
        }
    }

    pub fn request_next_frame(&mut self, ctx: &WaylandContext) {
        if self.quit {
            return;
        }
        self.fps_limiter.measure_start();
        let overlay_cursor = self.config.cropmode != crate::config::CropMode::Pipewire;
        self.backend.request_frame(ctx, &self.output, overlay_cursor);
    }

    /// Apply one normalized capture event. Returns `true` if a frame is
    /// now ready to hand to PipeWire.
    pub fn handle_event(&mut self, event: CaptureEvent) -> bool {
        match event {
            CaptureEvent::BufferConstraints(constraints) => {
                let resized = self.constraints != Some(constraints);
                self.constraints = Some(constraints);
                if resized {
                    self.damage.mark_full_frame(constraints.width as i32, constraints.height as i32);
                    self.rebuild_pipewire_stream(constraints);
                }
                false
            }
            CaptureEvent::Damage(rect) => {
                self.damage.add(rect);
                false
            }
            CaptureEvent::Ready => true,
            CaptureEvent::Failed => {
                warn!("screencast: frame capture failed for {}", self.output.display_name());
                false
            }
        }
    }

    /// Rebuild the PipeWire stream's negotiated parameters whenever
    /// `BufferConstraints` change (spec §4.E "Stream parameters are
    /// rebuilt whenever BufferConstraints change"). `-p/--pixelformat`
    /// overrides only the advertised fourcc, not the buffer actually
    /// captured — per spec, no conversion is performed.
    fn rebuild_pipewire_stream(&mut self, mut constraints: BufferConstraints) {
        if let Some(forced) = self.config.forced_pixel_format {
            constraints.format = forced.into();
        }
        match stream::PipewireStream::new(constraints, 0) {
            Ok(new_stream) => {
                info!(
                    "screencast: (re)built PipeWire stream for {} at {}x{}",
                    self.output.display_name(),
                    constraints.width,
                    constraints.height
                );
                self.pipewire = Some(new_stream);
            }
            Err(e) => warn!("screencast: failed to (re)build PipeWire stream: {e}"),
        }
    }
}

impl From<ForcedPixelFormat> for drm_fourcc::DrmFourcc {
    fn from(value: ForcedPixelFormat) -> Self {
        match value {
            ForcedPixelFormat::Bgrx => drm_fourcc::DrmFourcc::Xbgr8888,
            ForcedPixelFormat::Rgbx => drm_fourcc::DrmFourcc::Xrgb8888,
        }
    }
}

fn spawn_hook(which: &str, cmd: &str) {
    match std::process::Command::new("/bin/sh").arg("-c").arg(cmd).spawn() {
        Ok(mut child) => {
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => warn!("screencast: {which} hook '{cmd}' failed to spawn: {e}"),
    }
}

/// Holds the per-frame Wayland objects and routes their events to the
/// owning instance. Registered as the `Dispatch` user-data so the
/// `WaylandContext` callbacks below can find their way back without a
/// global lookup table.
pub type InstanceHandle = Arc<RwLock<ScreencastInstance>>;

impl wayland_client::Dispatch<ZwlrScreencopyFrameV1, InstanceHandle> for WaylandContext {
    fn event(
        _state: &mut Self,
        _proxy: &ZwlrScreencopyFrameV1,
        event: zwlr_screencopy_frame_v1::Event,
        data: &InstanceHandle,
        _conn: &wayland_client::Connection,
        _qh: &wayland_client::QueueHandle<Self>,
    ) {
        if let Some(event) = translate_screencopy_event(event) {
            data.write().handle_event(event);
        }
    }
}

impl wayland_client::Dispatch<ExtImageCopyCaptureFrameV1, InstanceHandle> for WaylandContext {
    fn event(
        _state: &mut Self,
        _proxy: &ExtImageCopyCaptureFrameV1,
        event: ext_image_copy_capture_frame_v1::Event,
        data: &InstanceHandle,
        _conn: &wayland_client::Connection,
        _qh: &wayland_client::QueueHandle<Self>,
    ) {
        if let Some(event) = translate_ext_image_copy_event(event) {
            data.write().handle_event(event);
        }
    }
}

impl wayland_client::Dispatch<ExtImageCopyCaptureSessionV1, InstanceHandle> for WaylandContext {
    fn event(
        _state: &mut Self,
        _proxy: &ExtImageCopyCaptureSessionV1,
        event: ext_image_copy_capture_session_v1::Event,
        data: &InstanceHandle,
        _conn: &wayland_client::Connection,
        _qh: &wayland_client::QueueHandle<Self>,
    ) {
        if let Some(event) = translate_session_event(event) {
            data.write().handle_event(event);
        }
    }
}

