//! `org.freedesktop.impl.portal.InputCapture` state machine (spec §4.C.4):
//! barrier validation, the compositor-derived zone set, the libei connection
//! handed out by `ConnectToEIS`, and the enable/disable/release lifecycle.
//! Ported from `examples/original_source/src/input_capture/input_capture.c`
//! and `include/input_capture.h`.

pub mod barrier;
pub mod eis;
pub mod surface;
pub mod zone;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::input_capture::barrier::{validate_barriers, Barrier, Zone};
use crate::input_capture::eis::{create_eis_socketpair, CapturedEvent, EisServer};
use crate::input_capture::zone::{zones_from_outputs, ZoneSetId};
use crate::wayland::output::OutputInfo;

/// Capability bits reported by `GetZones`' sibling, `supported_capabilities`
/// (spec §4.C.4's "keyboard" / "pointer" / "touchscreen" capability mask).
pub const CAP_KEYBOARD: u32 = 1 << 0;
pub const CAP_POINTER: u32 = 1 << 1;
pub const CAP_TOUCHSCREEN: u32 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Session created, zones not yet retrieved.
    Init,
    /// Zones reported at least once; barriers may be set.
    Idle,
    /// A barrier has been crossed and EIS events are being forwarded.
    Active,
    /// The session's owner asked to stop capturing (but hasn't closed the session).
    Disabled,
}

/// Per-session input-capture state (spec §4.C.4 payload).
pub struct InputCaptureSession {
    pub capabilities: u32,
    pub state: CaptureState,
    pub zones: Vec<Zone>,
    pub zone_set_id: ZoneSetId,
    pub barriers: Vec<Barrier>,
    /// Strictly monotone over the session's lifetime (spec §7 invariant).
    pub activation_id: u32,
    /// The layer-surface/pointer-lock/inhibitor bundle `Enable` created,
    /// torn down by `Disable`/`Release`/an unexpected `closed` event.
    pub surfaces: Option<surface::CaptureSurfaceBundle>,
    /// Cursor position from the most recent `wl_pointer.enter` on the
    /// capture surface, awaiting the next reactor tick's pump into an
    /// `activate()` call plus `Activated` emission (spec §4.F "when the
    /// pointer enters the layer-surface").
    pending_activation: Option<(f64, f64)>,
    eis: Option<EisServer>,
}

impl InputCaptureSession {
    pub fn new(capabilities: u32) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self {
            capabilities,
            state: CaptureState::Init,
            zones: Vec::new(),
            zone_set_id: ZoneSetId::default(),
            barriers: Vec::new(),
            activation_id: 0,
            surfaces: None,
            pending_activation: None,
            eis: None,
        }))
    }

    /// `GetZones`: recompute from the live output list and bump the zone set
    /// id, invalidating any barriers a stale client might still be holding.
    pub fn refresh_zones(&mut self, outputs: &[Arc<OutputInfo>]) -> ZoneSetId {
        self.set_zones(zones_from_outputs(outputs))
    }

    /// Shared by [`Self::refresh_zones`] and tests that don't want to build
    /// a live `OutputInfo`: install a zone set directly and bump the id.
    fn set_zones(&mut self, zones: Vec<Zone>) -> ZoneSetId {
        self.zones = zones;
        self.zone_set_id = self.zone_set_id.next();
        self.barriers.clear();
        if self.state == CaptureState::Init {
            self.state = CaptureState::Idle;
        }
        debug!("input_capture: zones refreshed, set id {:?}", self.zone_set_id);
        self.zone_set_id
    }

    /// `SetPointerBarriers`: validate against the current zone set, keep only
    /// the valid ones, and report which ids failed (spec §4.C.4 "failed_barriers").
    pub fn set_barriers(&mut self, requested: &[Barrier]) -> Vec<u32> {
        let (valid, failed) = validate_barriers(requested, &self.zones);
        if !failed.is_empty() {
            warn!("input_capture: {} barrier(s) failed validation: {failed:?}", failed.len());
        }
        self.barriers = valid;
        failed
    }

    /// `ConnectToEIS`: create the socketpair, keep the server half, hand the
    /// client half's fd back to the caller.
    pub fn connect_to_eis(&mut self) -> anyhow::Result<std::os::fd::OwnedFd> {
        let (server, client_fd) = create_eis_socketpair()?;
        self.eis = Some(server);
        info!("input_capture: EIS connection established");
        Ok(client_fd)
    }

    /// Called when a configured barrier is crossed (the layer-surface/pointer-lock
    /// side of this is driven by the Wayland integration; this is the transition
    /// it calls into once it detects one). Returns the freshly minted
    /// `activation_id` on success.
    pub fn activate(&mut self, barrier_id: u32) -> Option<u32> {
        if self.state != CaptureState::Idle {
            debug!("input_capture: activate ignored in state {:?}", self.state);
            return None;
        }
        self.state = CaptureState::Active;
        self.activation_id = self.activation_id.wrapping_add(1);
        info!("input_capture: activated via barrier {barrier_id}, activation_id {}", self.activation_id);
        Some(self.activation_id)
    }

    /// `Disable`: client-requested pause. Destroys the layer-surface bundle
    /// in reverse creation order (spec §4.F) and returns to `Idle` on the
    /// next `Enable`.
    pub fn disable(&mut self) {
        if let Some(bundle) = self.surfaces.take() {
            bundle.destroy();
        }
        self.state = CaptureState::Disabled;
    }

    pub fn enable(&mut self) {
        if self.state == CaptureState::Disabled {
            self.state = CaptureState::Idle;
        }
    }

    /// `Release`: drop the EIS connection, destroy the layer-surface
    /// bundle, and return to `Idle`.
    pub fn release_capture(&mut self) {
        self.eis = None;
        if let Some(bundle) = self.surfaces.take() {
            bundle.destroy();
        }
        if self.state == CaptureState::Active {
            self.state = CaptureState::Idle;
        }
    }

    /// Install the layer-surface bundle `Enable` created.
    pub fn install_surfaces(&mut self, bundle: surface::CaptureSurfaceBundle) {
        self.surfaces = Some(bundle);
    }

    /// `zwlr_layer_surface_v1.closed` fired outside a client-requested
    /// `Disable`/`Release`: the surface is already gone compositor-side, so
    /// just drop our handle and fall back to `Idle` (spec §4.G
    /// "layer-surface closed unexpectedly").
    pub fn handle_surface_closed(&mut self) {
        self.surfaces = None;
        self.state = CaptureState::Idle;
    }

    /// Record where the pointer crossed into the capture surface, for
    /// [`AppState::pump_input_capture`](crate::app_state::AppState::pump_input_capture)
    /// to turn into an `activate()` call plus `Activated` signal on the
    /// next tick.
    pub fn queue_activation(&mut self, sx: f64, sy: f64) {
        self.pending_activation = Some((sx, sy));
    }

    pub fn take_pending_activation(&mut self) -> Option<(f64, f64)> {
        self.pending_activation.take()
    }

    /// Pump pending EIS requests while capture is active. A no-op when no
    /// EIS connection exists yet (session not past `ConnectToEIS`) or while
    /// not `Active` (events arriving before a barrier crossing are dropped,
    /// matching the original's behavior of only forwarding while captured).
    pub async fn pump_eis(&mut self) -> anyhow::Result<Vec<CapturedEvent>> {
        if self.state != CaptureState::Active {
            return Ok(Vec::new());
        }
        match &mut self.eis {
            Some(server) => server.poll().await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_zone() -> Vec<Zone> {
        vec![Zone { x: 0, y: 0, width: 1920, height: 1080 }]
    }

    #[test]
    fn set_zones_moves_init_to_idle() {
        let session = InputCaptureSession::new(CAP_POINTER);
        session.write().set_zones(one_zone());
        assert_eq!(session.read().state, CaptureState::Idle);
        assert_eq!(session.read().zones.len(), 1);
    }

    #[test]
    fn invalid_barriers_are_rejected_and_reported() {
        let session = InputCaptureSession::new(CAP_POINTER);
        session.write().set_zones(one_zone());
        let barriers = vec![
            Barrier { id: 1, x1: 0, y1: 0, x2: 1920, y2: 0 },
            Barrier { id: 2, x1: 100, y1: 100, x2: 200, y2: 100 },
        ];
        let failed = session.write().set_barriers(&barriers);
        assert_eq!(failed, vec![2]);
        assert_eq!(session.read().barriers.len(), 1);
    }

    #[test]
    fn activate_only_transitions_from_idle() {
        let session = InputCaptureSession::new(CAP_POINTER);
        session.write().activate(1);
        assert_eq!(session.read().state, CaptureState::Init);

        session.write().set_zones(one_zone());
        session.write().activate(1);
        assert_eq!(session.read().state, CaptureState::Active);
    }

    #[test]
    fn disable_then_enable_returns_to_idle() {
        let session = InputCaptureSession::new(CAP_POINTER);
        session.write().set_zones(one_zone());
        session.write().activate(1);
        session.write().disable();
        assert_eq!(session.read().state, CaptureState::Disabled);
        session.write().enable();
        assert_eq!(session.read().state, CaptureState::Idle);
    }

    #[test]
    fn refreshing_zones_invalidates_existing_barriers() {
        let session = InputCaptureSession::new(CAP_POINTER);
        session.write().set_zones(one_zone());
        let barriers = vec![Barrier { id: 1, x1: 0, y1: 0, x2: 1920, y2: 0 }];
        session.write().set_barriers(&barriers);
        assert_eq!(session.read().barriers.len(), 1);
        session.write().set_zones(one_zone());
        assert!(session.read().barriers.is_empty());
    }
}
