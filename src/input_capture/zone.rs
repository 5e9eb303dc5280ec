//! Zone set: the logical-pixel regions (mirroring `wl_output` layout) the
//! `GetZones` method reports, generated from the Wayland Resource Manager's
//! current output list rather than hand-maintained state.

use std::sync::Arc;

use crate::input_capture::barrier::Zone;
use crate::wayland::output::OutputInfo;

/// Build the zone set from every ready output's logical geometry (spec
/// §4.D's "logical size" fields populated by `zxdg_output_v1`).
pub fn zones_from_outputs(outputs: &[Arc<OutputInfo>]) -> Vec<Zone> {
    outputs
        .iter()
        .filter(|o| o.ready())
        .map(|o| {
            let geo = o.geometry.lock();
            let logical_width = *o.logical_width.lock();
            let logical_height = *o.logical_height.lock();
            let width = if logical_width > 0 { logical_width } else { o.mode.lock().width };
            let height = if logical_height > 0 { logical_height } else { o.mode.lock().height };
            Zone { x: geo.x, y: geo.y, width, height }
        })
        .collect()
}

/// A monotonically increasing generation counter for the zone set, so
/// `GetZones` can report `zone_set` per the portal's "invalidate stale
/// zone references after a hotplug" requirement (spec §4.C "Invariants").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSetId(pub u32);

impl ZoneSetId {
    pub fn next(self) -> Self {
        ZoneSetId(self.0.wrapping_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_set_id_wraps_instead_of_panicking() {
        assert_eq!(ZoneSetId(u32::MAX).next(), ZoneSetId(0));
    }
}
