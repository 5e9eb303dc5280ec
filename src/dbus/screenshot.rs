//! `org.freedesktop.impl.portal.Screenshot` (spec §3 supplement): a thin,
//! session-less sibling to the other four portals — `Screenshot`/`PickColor`
//! shell out to `grim`/`slurp` and reply immediately, matching
//! `examples/original_source/src/screenshot/screenshot.c`'s
//! `method_screenshot`/`method_pick_color`.

use std::collections::HashMap;

use tracing::info;
use zbus::zvariant::{ObjectPath, OwnedValue, Value};
use zbus::{fdo, interface};

use crate::error::ResponseCode;
use crate::screenshot::{capture_screenshot, pick_color};

/// Unlike the other four portals, `Screenshot` keeps no session state and
/// needs neither the registry nor the Wayland connection — each call is a
/// self-contained helper-process round trip.
#[derive(Default)]
pub struct ScreenshotInterface;

#[interface(name = "org.freedesktop.impl.portal.Screenshot")]
impl ScreenshotInterface {
    #[zbus(property)]
    async fn version(&self) -> u32 {
        2
    }

    async fn screenshot(
        &self,
        _handle: ObjectPath<'_>,
        app_id: String,
        _parent_window: String,
        options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        let interactive = options
            .get("interactive")
            .and_then(|v| bool::try_from(v.clone()).ok())
            .unwrap_or(false);
        info!("screenshot: Screenshot(interactive={interactive}) for {app_id}");

        let Some(path) = capture_screenshot(interactive) else {
            return Err(fdo::Error::Failed("screenshot helper failed".into()));
        };

        let mut results = HashMap::new();
        results.insert(
            "uri".to_string(),
            Value::from(format!("file://{}", path.display())).try_into().expect("string is a valid Value"),
        );
        Ok((ResponseCode::Success as u32, results))
    }

    async fn pick_color(
        &self,
        _handle: ObjectPath<'_>,
        app_id: String,
        _parent_window: String,
        _options: HashMap<String, OwnedValue>,
    ) -> fdo::Result<(u32, HashMap<String, OwnedValue>)> {
        info!("screenshot: PickColor for {app_id}");
        let Some(picked) = pick_color() else {
            return Err(fdo::Error::Failed("color picker failed".into()));
        };

        let mut results = HashMap::new();
        results.insert(
            "color".to_string(),
            Value::from((picked.red, picked.green, picked.blue)).try_into().expect("(ddd) is a valid Value"),
        );
        Ok((ResponseCode::Success as u32, results))
    }
}
