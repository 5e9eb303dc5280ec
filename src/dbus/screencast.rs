//! `org.freedesktop.impl.portal.ScreenCast`, wiring the D-Bus method
//! surface onto [`crate::screencast::ScreencastInstance`] and the
//! [`crate::session`] registry. Method bodies follow
//! `examples/original_source/src/screencast/screencast.c`'s
//! `method_create_session`/`method_select_sources`/`method_start`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use zbus::zvariant::{ObjectPath, OwnedValue, Value};
use zbus::{interface, fdo};

use crate::app_state::AppState;
use crate::error::ResponseCode;
use crate::screencast::chooser::choose_output;
use crate::screencast::ScreencastInstance;
use crate::session::{create_request, create_session_object, destroy_request, Session, SessionPayload, ScreenCastSessionData};

pub struct ScreenCastInterface {
    pub state: Arc<AppState>,
}

#[interface(name = "org.freedesktop.impl.portal.ScreenCast")]
impl ScreenCastInterface {
    #[zbus(property)]
    async fn available_source_types(&self) -> u32 {
        // MONITOR (1) only — window/virtual capture are Non-goals (spec §1).
        1
    }

    #[zbus(property)]
    async fn available_cursor_modes(&self) -> u32 {
        // HIDDEN (1) | EMBEDDED (2); METADATA is not implemented.
        0b011
    }

    #[zbus(property)]
    async fn version(&self) -> u32 {
        4
    }

    async fn create_session(
        &self,
        handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        app_id: String,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        info!("screencast: CreateSession({session_handle}) for {app_id}");
        let cancel = create_request(&self.state.connection, handle.as_str())
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;

        let session = Session::new(
            session_handle.as_str().to_string(),
            app_id,
            SessionPayload::ScreenCast(ScreenCastSessionData::default()),
        );
        if let Err(e) = create_session_object(&self.state.connection, &self.state.sessions, session).await {
            let _ = destroy_request(&self.state.connection, handle.as_str()).await;
            return Err(fdo::Error::Failed(e.to_string()));
        }
        drop(cancel);

        Ok((ResponseCode::Success as u32, HashMap::new()))
    }

    async fn select_sources(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        _app_id: String,
        options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let mut payload = session.payload.write();
        let SessionPayload::ScreenCast(data) = &mut *payload else {
            return Err(fdo::Error::Failed("session is not a ScreenCast session".into()));
        };

        if let Some(v) = options.get("types").and_then(|v| u32::try_from(v.clone()).ok()) {
            data.types = v;
        }
        if let Some(v) = options.get("multiple").and_then(|v| bool::try_from(v.clone()).ok()) {
            data.multiple = v;
        }
        if let Some(v) = options.get("cursor_mode").and_then(|v| u32::try_from(v.clone()).ok()) {
            data.cursor_mode = v;
        }
        if let Some(v) = options.get("persist_mode").and_then(|v| u32::try_from(v.clone()).ok()) {
            data.persist_mode = v;
        }
        if let Some(v) = options.get("restore_token").and_then(|v| String::try_from(v.clone()).ok()) {
            data.restore_token = Some(v);
        }

        Ok((ResponseCode::Success as u32, HashMap::new()))
    }

    async fn start(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        _app_id: String,
        _parent_window: String,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let Some(session) = self.state.sessions.lookup(session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };

        let config = self.state.config.screencast.clone();
        let ctx = self.state.wayland.lock();
        let output = choose_output(
            config.chooser_type,
            config.chooser_cmd.as_deref(),
            config.output_name.as_deref(),
            &ctx.outputs.lock(),
        )
        .ok_or_else(|| fdo::Error::Failed("no output available to capture".into()))?;

        let instance = ScreencastInstance::new(output, config, &ctx)
            .map_err(|e| fdo::Error::Failed(format!("failed to negotiate capture backend: {e}")))?;
        instance.write().run_exec_before();
        drop(ctx);

        let node_id = {
            let mut payload = session.payload.write();
            let SessionPayload::ScreenCast(data) = &mut *payload else {
                return Err(fdo::Error::Failed("session is not a ScreenCast session".into()));
            };
            data.instance = Some(instance.clone());
            // PipeWire node id isn't known until the stream connects, which
            // happens once the first buffer constraints are negotiated; the
            // reactor fills this in on the next tick and the portal UI polls
            // `Start`'s reply streams array lazily via a follow-up property
            // in the original. Here we report 0 if not yet available and log
            // so callers know to re-check once streaming begins.
            instance.read().pipewire.as_ref().and_then(|s| s.node_id()).unwrap_or(0)
        };

        if node_id == 0 {
            warn!("screencast: Start({session_handle}) returning before PipeWire node id is known");
        }

        let mut results = HashMap::new();
        let stream_entry = (node_id, HashMap::<String, OwnedValue>::new());
        results.insert(
            "streams".to_string(),
            Value::from(vec![stream_entry]).try_into().expect("streams array is always a valid Value"),
        );
        Ok((ResponseCode::Success as u32, results))
    }
}

