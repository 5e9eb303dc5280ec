//! D-Bus object tree: the four in-scope `org.freedesktop.impl.portal.*`
//! interfaces plus the supplemented `Screenshot` sibling (spec §3, §6), each
//! registered once at startup under `/org/freedesktop/portal/desktop`
//! (spec §4 "External interfaces").

pub mod global_shortcuts;
pub mod input_capture;
pub mod remote_desktop;
pub mod screencast;
pub mod screenshot;

use std::sync::Arc;

use tracing::info;
use zbus::Connection;

use crate::app_state::AppState;

pub const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
pub const BUS_NAME: &str = "org.freedesktop.impl.portal.desktop.wlr";

/// Register every portal interface on the shared object path and claim the
/// backend's well-known bus name (spec §4 "the process owns exactly one
/// well-known name").
pub async fn register(connection: &Connection, state: Arc<AppState>) -> anyhow::Result<()> {
    let object_server = connection.object_server();

    object_server
        .at(PORTAL_PATH, screencast::ScreenCastInterface { state: state.clone() })
        .await?;
    object_server
        .at(PORTAL_PATH, remote_desktop::RemoteDesktopInterface { state: state.clone() })
        .await?;
    object_server
        .at(PORTAL_PATH, global_shortcuts::GlobalShortcutsInterface { state: state.clone() })
        .await?;
    object_server
        .at(PORTAL_PATH, input_capture::InputCaptureInterface::new(state.clone()))
        .await?;
    object_server
        .at(PORTAL_PATH, screenshot::ScreenshotInterface::default())
        .await?;

    connection.request_name(BUS_NAME).await?;
    info!("dbus: registered portal interfaces at {PORTAL_PATH}, owning {BUS_NAME}");
    Ok(())
}
