//! `org.freedesktop.impl.portal.InputCapture`, wiring the barrier/zone/EIS
//! state machine in [`crate::input_capture`] onto the bus. Method bodies
//! follow `examples/original_source/src/input_capture/input_capture.c`.
//!
//! The "at most one enabled InputCaptureSession at a time" invariant (spec
//! §3 "Invariants") is process-wide, not per-session, so it's tracked here
//! rather than inside [`crate::input_capture::InputCaptureSession`]: this
//! interface object is registered exactly once and lives for the process's
//! lifetime, making it the natural home for the global active-session slot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use zbus::object_server::SignalContext;
use zbus::zvariant::{ObjectPath, OwnedFd, OwnedValue, Value};
use zbus::{fdo, interface};

use crate::app_state::AppState;
use crate::error::ResponseCode;
use crate::input_capture::barrier::Barrier;
use crate::input_capture::{surface, InputCaptureSession, CAP_KEYBOARD, CAP_POINTER, CAP_TOUCHSCREEN};
use crate::session::{create_request, create_session_object_with_hook, destroy_request, Session, SessionPayload};

pub struct InputCaptureInterface {
    pub state: Arc<AppState>,
    /// Handle of the session currently holding the global active slot, if any.
    active_session: Mutex<Option<String>>,
}

impl InputCaptureInterface {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, active_session: Mutex::new(None) }
    }
}

fn parse_barrier(id: u32, dict: &HashMap<String, OwnedValue>) -> Option<Barrier> {
    let position = dict.get("position")?;
    let (x1, y1, x2, y2): (i32, i32, i32, i32) = position.clone().try_into().ok()?;
    Some(Barrier { id, x1, y1, x2, y2 })
}

#[interface(name = "org.freedesktop.impl.portal.InputCapture")]
impl InputCaptureInterface {
    #[zbus(property)]
    async fn supported_capabilities(&self) -> u32 {
        CAP_KEYBOARD | CAP_POINTER | CAP_TOUCHSCREEN
    }

    #[zbus(property)]
    async fn version(&self) -> u32 {
        1
    }

    async fn create_session(
        &self,
        handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        app_id: String,
        options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        info!("input_capture: CreateSession({session_handle}) for {app_id}");
        let capabilities = options
            .get("capabilities")
            .and_then(|v| u32::try_from(v.clone()).ok())
            .unwrap_or(0);
        let supported = CAP_KEYBOARD | CAP_POINTER | CAP_TOUCHSCREEN;
        if capabilities & supported == 0 {
            return Err(fdo::Error::NotSupported("no requested capability is supported".into()));
        }

        let cancel = create_request(&self.state.connection, handle.as_str())
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;

        let ic = InputCaptureSession::new(capabilities & supported);
        let session = Session::new(
            session_handle.as_str().to_string(),
            app_id,
            SessionPayload::InputCapture(ic),
        );
        if let Err(e) =
            create_session_object_with_hook(&self.state.connection, &self.state.sessions, session, None).await
        {
            let _ = destroy_request(&self.state.connection, handle.as_str()).await;
            return Err(fdo::Error::Failed(e.to_string()));
        }
        drop(cancel);

        let mut results = HashMap::new();
        results.insert(
            "capabilities".to_string(),
            Value::from(capabilities & supported).try_into().expect("u32 is a valid Value"),
        );
        Ok((ResponseCode::Success as u32, results))
    }

    async fn get_zones(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let payload = session.payload.read();
        let SessionPayload::InputCapture(ic) = &*payload else {
            return Err(fdo::Error::Failed("session is not an InputCapture session".into()));
        };

        let outputs = self.state.wayland.lock().outputs.lock().clone();
        let zone_set_id = ic.write().refresh_zones(&outputs);
        let zones: Vec<(i32, i32, i32, i32)> = ic
            .read()
            .zones
            .iter()
            .map(|z| (z.width, z.height, z.x, z.y))
            .collect();

        let mut results = HashMap::new();
        results.insert("zone_set".to_string(), Value::from(zone_set_id.0).try_into().expect("u32 is valid"));
        results.insert("zones".to_string(), Value::from(zones).try_into().expect("zones array is valid"));
        Ok((ResponseCode::Success as u32, results))
    }

    async fn set_pointer_barriers(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        barriers: Vec<HashMap<String, OwnedValue>>,
        zone_set: u32,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let payload = session.payload.read();
        let SessionPayload::InputCapture(ic) = &*payload else {
            return Err(fdo::Error::Failed("session is not an InputCapture session".into()));
        };
        let mut ic = ic.write();
        if ic.zone_set_id.0 != zone_set {
            ic.barriers.clear();
            return Err(fdo::Error::FileNotFound("zone_set is stale".into()));
        }

        let parsed: Vec<Barrier> = barriers
            .iter()
            .filter_map(|d| {
                let id = d.get("barrier_id").and_then(|v| u32::try_from(v.clone()).ok())?;
                if id == 0 {
                    return None;
                }
                parse_barrier(id, d)
            })
            .collect();
        let requested_ids: Vec<u32> = barriers
            .iter()
            .filter_map(|d| d.get("barrier_id").and_then(|v| u32::try_from(v.clone()).ok()))
            .collect();
        let parsed_ids: Vec<u32> = parsed.iter().map(|b| b.id).collect();
        let mut failed: Vec<u32> = requested_ids.into_iter().filter(|id| !parsed_ids.contains(id)).collect();
        failed.extend(ic.set_barriers(&parsed));

        let mut results = HashMap::new();
        results.insert("failed_barriers".to_string(), Value::from(failed).try_into().expect("u32 array is valid"));
        Ok((ResponseCode::Success as u32, results))
    }

    async fn enable(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<()> {
        {
            let mut active = self.active_session.lock();
            match &*active {
                Some(h) if h != session_handle.as_str() => {
                    return Err(fdo::Error::LimitsExceeded("another session is already enabled".into()))
                }
                _ => *active = Some(session_handle.as_str().to_string()),
            }
        }
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            *self.active_session.lock() = None;
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let ic = {
            let payload = session.payload.read();
            let SessionPayload::InputCapture(ic) = &*payload else {
                *self.active_session.lock() = None;
                return Err(fdo::Error::Failed("session is not an InputCapture session".into()));
            };
            ic.clone()
        };

        let already_enabled = ic.read().surfaces.is_some();
        if !already_enabled {
            let ctx = self.state.wayland.lock();
            let required = ctx.compositor.is_some()
                && ctx.layer_shell.is_some()
                && ctx.seat.is_some()
                && ctx.pointer_constraints.is_some()
                && ctx.keyboard_shortcuts_inhibit_manager.is_some();
            if !required {
                *self.active_session.lock() = None;
                return Err(fdo::Error::NotSupported("compositor is missing required Wayland protocols".into()));
            }
            let capabilities = ic.read().capabilities;
            let bundle = surface::create(&ctx, ic.clone(), capabilities)
                .map_err(|e| fdo::Error::Failed(format!("failed to create capture surface: {e}")))?;
            ctx.flush().map_err(|e| fdo::Error::Failed(e.to_string()))?;
            ic.write().install_surfaces(bundle);
            info!("input_capture: enabled session {session_handle}, capture surface created");
        }
        ic.write().enable();
        Ok(())
    }

    async fn disable(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<()> {
        let mut active = self.active_session.lock();
        if active.as_deref() == Some(session_handle.as_str()) {
            *active = None;
        }
        drop(active);
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::InputCapture(ic) = &*payload {
                ic.write().disable();
            }
        }
        Ok(())
    }

    async fn release(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<()> {
        let mut active = self.active_session.lock();
        if active.as_deref() == Some(session_handle.as_str()) {
            *active = None;
        }
        drop(active);
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::InputCapture(ic) = &*payload {
                ic.write().release_capture();
            }
        }
        Ok(())
    }

    async fn connect_to_eis(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<OwnedFd> {
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let mut payload = session.payload.write();
        let SessionPayload::InputCapture(ic) = &mut *payload else {
            return Err(fdo::Error::Failed("session is not an InputCapture session".into()));
        };
        let fd = ic
            .write()
            .connect_to_eis()
            .map_err(|e| fdo::Error::Failed(format!("failed to set up EIS connection: {e}")))?;
        Ok(OwnedFd::from(fd))
    }

    /// Called by the Wayland integration once a configured barrier is
    /// crossed while the session is enabled (spec §4.F). Emits `Activated`
    /// with the session's freshly minted `activation_id`.
    pub async fn dispatch_activated(
        &self,
        ctx: &SignalContext<'_>,
        session_handle: &str,
        barrier_id: u32,
        cursor_position: (f64, f64),
    ) {
        let Some(session) = self.state.sessions.lookup(session_handle) else { return };
        let payload = session.payload.read();
        let SessionPayload::InputCapture(ic) = &*payload else { return };
        let Some(activation_id) = ic.write().activate(barrier_id) else { return };
        let mut options = HashMap::new();
        options.insert(
            "barrier_id".to_string(),
            Value::from(barrier_id).try_into().expect("u32 is valid"),
        );
        if let Err(e) = Self::activated(ctx, session_handle, activation_id, cursor_position, options).await {
            warn!("input_capture: failed to emit Activated: {e}");
        }
    }

    pub async fn dispatch_disabled(&self, ctx: &SignalContext<'_>, session_handle: &str) {
        let mut active = self.active_session.lock();
        if active.as_deref() == Some(session_handle) {
            *active = None;
        }
        drop(active);
        if let Some(session) = self.state.sessions.lookup(session_handle) {
            let payload = session.payload.read();
            if let SessionPayload::InputCapture(ic) = &*payload {
                ic.write().disable();
            }
        }
        if let Err(e) = Self::disabled(ctx, session_handle, HashMap::new()).await {
            warn!("input_capture: failed to emit Disabled: {e}");
        }
    }

    pub async fn dispatch_zones_changed(&self, ctx: &SignalContext<'_>, session_handle: &str) {
        if let Err(e) = Self::zones_changed(ctx, session_handle, HashMap::new()).await {
            warn!("input_capture: failed to emit ZonesChanged: {e}");
        }
    }

    #[zbus(signal)]
    async fn activated(
        ctx: &SignalContext<'_>,
        session_handle: &str,
        activation_id: u32,
        cursor_position: (f64, f64),
        options: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn deactivated(
        ctx: &SignalContext<'_>,
        session_handle: &str,
        activation_id: u32,
        cursor_position: (f64, f64),
        options: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn disabled(ctx: &SignalContext<'_>, session_handle: &str, options: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn zones_changed(ctx: &SignalContext<'_>, session_handle: &str, options: HashMap<String, OwnedValue>) -> zbus::Result<()>;
}
