//! `org.freedesktop.impl.portal.RemoteDesktop`, wiring D-Bus `Notify*`
//! calls onto [`crate::remote_desktop::RemoteDesktopSessionData`]. Method
//! bodies follow `examples/original_source/src/remotedesktop/remotedesktop.c`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use zbus::zvariant::{ObjectPath, OwnedValue};
use zbus::{fdo, interface};

use crate::app_state::AppState;
use crate::error::ResponseCode;
use crate::remote_desktop::RemoteDesktopSessionData;
use crate::session::{create_request, create_session_object, destroy_request, Session, SessionPayload};

pub struct RemoteDesktopInterface {
    pub state: Arc<AppState>,
}

macro_rules! with_remote_desktop_session {
    ($self:expr, $session_handle:expr, |$data:ident| $body:expr) => {{
        let Some(session) = $self.state.sessions.lookup($session_handle.as_str()) else {
            return Err(fdo::Error::Failed("unknown session".into()));
        };
        let mut payload = session.payload.write();
        let SessionPayload::RemoteDesktop($data) = &mut *payload else {
            return Err(fdo::Error::Failed("session is not a RemoteDesktop session".into()));
        };
        $body
    }};
}

#[interface(name = "org.freedesktop.impl.portal.RemoteDesktop")]
impl RemoteDesktopInterface {
    #[zbus(property)]
    async fn available_device_types(&self) -> u32 {
        crate::remote_desktop::DEVICE_KEYBOARD
            | crate::remote_desktop::DEVICE_POINTER
            | crate::remote_desktop::DEVICE_TOUCHSCREEN
    }

    #[zbus(property)]
    async fn version(&self) -> u32 {
        2
    }

    async fn create_session(
        &self,
        handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        app_id: String,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        info!("remote_desktop: CreateSession({session_handle}) for {app_id}");
        let cancel = create_request(&self.state.connection, handle.as_str())
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;

        let session = Session::new(
            session_handle.as_str().to_string(),
            app_id,
            SessionPayload::RemoteDesktop(RemoteDesktopSessionData::default()),
        );
        if let Err(e) = create_session_object(&self.state.connection, &self.state.sessions, session).await {
            let _ = destroy_request(&self.state.connection, handle.as_str()).await;
            return Err(fdo::Error::Failed(e.to_string()));
        }
        drop(cancel);
        Ok((ResponseCode::Success as u32, HashMap::new()))
    }

    async fn select_devices(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        _app_id: String,
        options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let devices = options
            .get("types")
            .and_then(|v| u32::try_from(v.clone()).ok())
            .unwrap_or(0);
        with_remote_desktop_session!(self, session_handle, |data| {
            data.selected_devices = devices;
            Ok((ResponseCode::Success as u32, HashMap::new()))
        })
    }

    async fn start(
        &self,
        _handle: ObjectPath<'_>,
        session_handle: ObjectPath<'_>,
        _app_id: String,
        _parent_window: String,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let ctx = self.state.wayland.lock();
        with_remote_desktop_session!(self, session_handle, |data| {
            data.start(&ctx).map_err(|e| fdo::Error::Failed(e.to_string()))?;
            Ok((ResponseCode::Success as u32, HashMap::new()))
        })
    }

    async fn notify_pointer_motion(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        dx: f64,
        dy: f64,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_pointer_motion(dx, dy);
            }
        }
    }

    async fn notify_pointer_motion_absolute(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        _stream: u32,
        x: f64,
        y: f64,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_pointer_motion_absolute(x as u32, y as u32, u32::MAX, u32::MAX);
            }
        }
    }

    async fn notify_pointer_button(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        button: i32,
        state: u32,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_pointer_button(button, state == 1);
            }
        }
    }

    async fn notify_pointer_axis(
        &self,
        session_handle: ObjectPath<'_>,
        options: HashMap<String, OwnedValue>,
        dx: f64,
        dy: f64,
    ) {
        let finish = options.get("finish").and_then(|v| bool::try_from(v.clone()).ok()).unwrap_or(false);
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_pointer_axis(dx, dy, finish);
            }
        }
    }

    async fn notify_pointer_axis_discrete(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        axis: u32,
        steps: i32,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_pointer_axis_discrete(axis, steps);
            }
        }
    }

    async fn notify_keyboard_keycode(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        keycode: i32,
        state: u32,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_keyboard_keycode(keycode, state == 1);
            }
        }
    }

    async fn notify_keyboard_keysym(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        keysym: i32,
        state: u32,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let payload = session.payload.read();
            if let SessionPayload::RemoteDesktop(data) = &*payload {
                data.notify_keyboard_keysym(keysym, state == 1);
            }
        }
    }

    async fn notify_touch_down(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        _stream: u32,
        slot: u32,
        x: f64,
        y: f64,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let mut payload = session.payload.write();
            if let SessionPayload::RemoteDesktop(data) = &mut *payload {
                data.notify_touch_down(slot, x, y, u32::MAX, u32::MAX);
            }
        }
    }

    async fn notify_touch_motion(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        _stream: u32,
        slot: u32,
        x: f64,
        y: f64,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let mut payload = session.payload.write();
            if let SessionPayload::RemoteDesktop(data) = &mut *payload {
                data.notify_touch_motion(slot, x, y, u32::MAX, u32::MAX);
            }
        }
    }

    async fn notify_touch_up(
        &self,
        session_handle: ObjectPath<'_>,
        _options: HashMap<String, OwnedValue>,
        slot: u32,
    ) {
        if let Some(session) = self.state.sessions.lookup(session_handle.as_str()) {
            let mut payload = session.payload.write();
            if let SessionPayload::RemoteDesktop(data) = &mut *payload {
                data.notify_touch_up(slot);
            }
        }
    }
}
