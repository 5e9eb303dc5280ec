//! The single-threaded cooperative event loop spec §4.A requires: one
//! `tokio::select!` driving the D-Bus connection, the Wayland display fd,
//! the PipeWire loop fd, and the EIS socket fds for any active
//! `InputCapture` sessions, with no second executor and no bespoke poll(2)
//! loop of our own.
//!
//! The teacher (`winux-notifications`, `winux-compositor`) always drives
//! its daemons from `#[tokio::main]` plus `zbus`'s own `tokio` feature for
//! the bus connection; this module is the thin layer the rest of the
//! original's event sources (Wayland, PipeWire, EIS) get folded into
//! alongside that.

use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tracing::{error, warn};

use crate::app_state::AppState;

/// One registered, level-triggered fd source. `on_readable` is called
/// whenever the fd is readable; errors are logged and do not stop the loop
/// (spec §4.A "Invariants": "a single misbehaving source must not stall the
/// others").
struct FdSource {
    name: &'static str,
    async_fd: AsyncFd<BorrowedRawFd>,
}

/// `AsyncFd` needs an owner implementing `AsRawFd`; since the fds here are
/// all owned elsewhere (the Wayland connection, PipeWire's loop, EIS
/// sockets), this just wraps the raw value without taking ownership.
struct BorrowedRawFd(RawFd);

impl std::os::fd::AsRawFd for BorrowedRawFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl FdSource {
    fn new(name: &'static str, fd: RawFd) -> std::io::Result<Self> {
        Ok(Self { name, async_fd: AsyncFd::new(BorrowedRawFd(fd))? })
    }
}

/// Drives the daemon's single reactor tick. Owns no domain state itself —
/// that all lives in [`AppState`] — just the fd registrations and the
/// periodic-tick timer used to drain frame/EIS events that don't arrive as
/// fd readiness (e.g. PipeWire's loop wants to be pumped even between fd
/// wakeups).
pub struct EventLoop {
    wayland: FdSource,
    tick: Duration,
}

impl EventLoop {
    pub fn new(wayland_fd: RawFd) -> std::io::Result<Self> {
        Ok(Self {
            wayland: FdSource::new("wayland", wayland_fd)?,
            tick: Duration::from_millis(16),
        })
    }

    /// Run until `shutdown` fires. Each iteration either reacts to the
    /// Wayland fd becoming readable or, on the tick timeout, pumps every
    /// running `ScreencastInstance`'s PipeWire loop and every active
    /// `InputCaptureSession`'s EIS socket — both need periodic pumping
    /// rather than pure fd-readiness, since PipeWire's own loop object
    /// owns the fd lifecycle.
    pub async fn run_until(
        &self,
        state: Arc<AppState>,
        mut shutdown: tokio::sync::mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    warn!("reactor: shutdown requested");
                    return;
                }

                guard = self.wayland.async_fd.readable() => {
                    match guard {
                        Ok(mut guard) => {
                            if let Err(e) = crate::wayland::WaylandContext::dispatch_pending(&state.wayland) {
                                error!("reactor: {} dispatch failed: {e}", self.wayland.name);
                            }
                            guard.clear_ready();
                        }
                        Err(e) => error!("reactor: {} fd error: {e}", self.wayland.name),
                    }
                }

                _ = tokio::time::sleep(self.tick) => {
                    state.pump_screencast_streams();
                    state.pump_input_capture().await;
                    state.pump_global_shortcuts().await;
                }
            }
        }
    }
}
