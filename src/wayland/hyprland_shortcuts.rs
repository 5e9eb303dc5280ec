//! Generated bindings for `hyprland_global_shortcuts_manager_v1` /
//! `hyprland_global_shortcut_v1` (spec §4.D, §4.C.3). Hyprland's shortcut
//! protocol isn't published through the `wayland-protocols` crate the way
//! wlr-* protocols are — it ships as XML in Hyprland's own source tree and
//! is normally vendored and scanned per-project. `protocols/
//! hyprland-global-shortcuts-v1.xml` is that vendored copy (transcribed
//! from `examples/original_source/src/globalshortcuts/global_shortcuts.c`'s
//! actual wire calls: `register_shortcut`'s `(name, app_id, description,
//! trigger_description)` argument order and the `pressed`/`released`
//! `(tv_sec_hi, tv_sec_lo, tv_nsec)` event shape both come directly from
//! that file), generated at compile time the same way `wayland-scanner`
//! itself documents for out-of-tree protocols.

pub mod __interfaces {
    use wayland_client::protocol::__interfaces::*;
    wayland_scanner::generate_interfaces!("./protocols/hyprland-global-shortcuts-v1.xml");
}
use self::__interfaces::*;

wayland_scanner::generate_client_code!("./protocols/hyprland-global-shortcuts-v1.xml");
