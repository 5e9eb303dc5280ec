//! Session Registry (spec §4.B) and the generic `org.freedesktop.impl.portal.{Session,Request}`
//! objects every portal method materializes (spec §4.C.2/4.C.3).
//!
//! Grounded on `examples/original_source/src/core/session.c` and
//! `src/core/request.c`: a `Session` is little more than a bus object plus
//! a payload; `Request` is a short-lived cancellable handle. The refcounted
//! `ScreencastInstance` teardown-on-last-release behavior lives in
//! [`crate::screencast::ScreencastInstance`]; the registry only decrements it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use zbus::{interface, Connection};

use crate::global_shortcuts::GlobalShortcutsSessionData;
use crate::input_capture::InputCaptureSession;
use crate::remote_desktop::RemoteDesktopSessionData;
use crate::screencast::ScreencastInstance;

/// Which portal owns a given session, and its interface-specific state.
/// "never more than one active" per spec §3 is enforced by construction:
/// a `Session` is created already carrying its one variant.
pub enum SessionPayload {
    ScreenCast(ScreenCastSessionData),
    RemoteDesktop(RemoteDesktopSessionData),
    GlobalShortcuts(Arc<RwLock<GlobalShortcutsSessionData>>),
    InputCapture(Arc<RwLock<InputCaptureSession>>),
}

impl SessionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionPayload::ScreenCast(_) => "screencast",
            SessionPayload::RemoteDesktop(_) => "remote_desktop",
            SessionPayload::GlobalShortcuts(_) => "global_shortcuts",
            SessionPayload::InputCapture(_) => "input_capture",
        }
    }
}

/// Screencast-specific session data: the `Start`ed capture instance, once
/// it exists, plus the selection state gathered by `SelectSources`.
#[derive(Default)]
pub struct ScreenCastSessionData {
    pub instance: Option<Arc<RwLock<ScreencastInstance>>>,
    pub multiple: bool,
    pub types: u32,
    pub cursor_mode: u32,
    pub restore_token: Option<String>,
    pub persist_mode: u32,
}

/// A long-lived portal session, per spec §3 "Session".
pub struct Session {
    pub handle: String,
    pub app_id: String,
    pub payload: RwLock<SessionPayload>,
}

impl Session {
    pub fn new(handle: String, app_id: String, payload: SessionPayload) -> Arc<Self> {
        Arc::new(Self {
            handle,
            app_id,
            payload: RwLock::new(payload),
        })
    }
}

/// Owns every active session, indexed by bus object path, plus the
/// insertion-ordered list used for broadcast iteration (spec §3
/// "Invariants": "iteration must be safe against concurrent removal").
///
/// The snapshot-on-read design satisfies that: [`SessionRegistry::snapshot`]
/// clones the `Arc` list under the lock and releases it immediately, so a
/// callback firing during iteration may freely call back into
/// [`SessionRegistry::destroy`] without deadlocking or invalidating the
/// iterator.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    order: RwLock<Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a freshly created session. The handle must not already be
    /// present (spec §3 invariant: "A session handle string appears at most
    /// once in the Session Registry").
    pub fn insert(&self, session: Arc<Session>) {
        let handle = session.handle.clone();
        let mut sessions = self.sessions.write();
        if sessions.insert(handle.clone(), session).is_none() {
            self.order.write().push(handle);
        }
    }

    pub fn lookup(&self, handle: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(handle).cloned()
    }

    /// Snapshot of all live sessions in insertion order, safe to iterate
    /// while other tasks concurrently destroy sessions.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read();
        self.order
            .read()
            .iter()
            .filter_map(|h| sessions.get(h).cloned())
            .collect()
    }

    /// Remove a session from the registry. Idempotent: destroying an
    /// already-absent handle is a silent no-op (spec §8 "Session close is
    /// idempotent").
    pub fn destroy(&self, handle: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(handle);
        if removed.is_some() {
            self.order.write().retain(|h| h != handle);
            info!("session: destroyed {handle}");
        } else {
            debug!("session: destroy on unknown handle {handle} (idempotent no-op)");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The `org.freedesktop.impl.portal.Session` object itself. One instance
/// is registered per session's bus object path; `Close` tears the session
/// down through the registry (which, for screencast sessions, decrements
/// the `ScreencastInstance` refcount — spec §3 "Invariants"). `on_destroy`
/// lets a portal whose session owns state outside the registry (currently
/// only `GlobalShortcuts`, which also indexes sessions by shortcut handle)
/// hook cleanup without `SessionObject` needing to know about every portal.
pub struct SessionObject {
    pub handle: String,
    pub registry: Arc<SessionRegistry>,
    pub on_destroy: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

#[interface(name = "org.freedesktop.impl.portal.Session")]
impl SessionObject {
    async fn close(&self) {
        info!("session: Close({})", self.handle);
        if let Some(session) = self.registry.destroy(&self.handle) {
            let mut payload = session.payload.write();
            if let SessionPayload::ScreenCast(data) = &mut *payload {
                if let Some(instance) = data.instance.take() {
                    instance.write().release();
                }
            }
        }
        if let Some(hook) = &self.on_destroy {
            hook(&self.handle);
        }
    }
}

/// A short-lived `org.freedesktop.impl.portal.Request` object (spec §3
/// "Request"). `Close` is idempotent and, if the method handler is still
/// running, asks it to complete with the `Cancelled` response code instead
/// of its normal result (spec §5 "Cancellation").
pub struct RequestObject {
    pub handle_path: String,
    pub cancel: Arc<tokio::sync::Notify>,
}

#[interface(name = "org.freedesktop.impl.portal.Request")]
impl RequestObject {
    async fn close(&self) {
        info!("request: Close({})", self.handle_path);
        self.cancel.notify_waiters();
    }
}

/// Materialize a `Request` object at `request_path` on `connection`. If the
/// caller later fails to create the accompanying `Session` (spec §4.C.3:
/// "if session creation fails after the request is registered, the request
/// must be destroyed"), call [`destroy_request`].
pub async fn create_request(
    connection: &Connection,
    request_path: &str,
) -> zbus::Result<Arc<tokio::sync::Notify>> {
    let cancel = Arc::new(tokio::sync::Notify::new());
    let object = RequestObject {
        handle_path: request_path.to_string(),
        cancel: cancel.clone(),
    };
    connection.object_server().at(request_path, object).await?;
    Ok(cancel)
}

pub async fn destroy_request(connection: &Connection, request_path: &str) -> zbus::Result<()> {
    connection
        .object_server()
        .remove::<RequestObject, _>(request_path)
        .await?;
    Ok(())
}

/// Materialize the `Session` object for a freshly created [`Session`] and
/// register it in the [`SessionRegistry`].
pub async fn create_session_object(
    connection: &Connection,
    registry: &Arc<SessionRegistry>,
    session: Arc<Session>,
) -> zbus::Result<()> {
    create_session_object_with_hook(connection, registry, session, None).await
}

/// As [`create_session_object`], but lets a portal register a `Close` hook
/// for state it keeps outside the [`SessionRegistry`] (e.g. GlobalShortcuts'
/// shortcut-handle index).
pub async fn create_session_object_with_hook(
    connection: &Connection,
    registry: &Arc<SessionRegistry>,
    session: Arc<Session>,
    on_destroy: Option<Arc<dyn Fn(&str) + Send + Sync>>,
) -> zbus::Result<()> {
    let object = SessionObject {
        handle: session.handle.clone(),
        registry: registry.clone(),
        on_destroy,
    };
    connection.object_server().at(&session.handle, object).await?;
    registry.insert(session);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_session(handle: &str) -> Arc<Session> {
        Session::new(
            handle.to_string(),
            "app.test".to_string(),
            SessionPayload::ScreenCast(ScreenCastSessionData::default()),
        )
    }

    #[test]
    fn insert_and_lookup() {
        let registry = SessionRegistry::new();
        registry.insert(dummy_session("/session/1"));
        assert!(registry.lookup("/session/1").is_some());
        assert!(registry.lookup("/session/2").is_none());
    }

    #[test]
    fn handle_appears_at_most_once() {
        let registry = SessionRegistry::new();
        registry.insert(dummy_session("/session/1"));
        registry.insert(dummy_session("/session/1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn double_destroy_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.insert(dummy_session("/session/1"));
        assert!(registry.destroy("/session/1").is_some());
        assert!(registry.destroy("/session/1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let registry = SessionRegistry::new();
        registry.insert(dummy_session("/session/1"));
        registry.insert(dummy_session("/session/2"));
        registry.insert(dummy_session("/session/3"));
        let handles: Vec<_> = registry.snapshot().iter().map(|s| s.handle.clone()).collect();
        assert_eq!(handles, vec!["/session/1", "/session/2", "/session/3"]);
    }

    #[test]
    fn snapshot_safe_during_destroy() {
        let registry = SessionRegistry::new();
        registry.insert(dummy_session("/session/1"));
        registry.insert(dummy_session("/session/2"));
        let snapshot = registry.snapshot();
        registry.destroy("/session/1");
        // snapshot still holds its own Arc; iterating it doesn't observe the removal.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
