//! PipeWire media stream: the producer side of the ScreenCast portal's
//! contract with `org.freedesktop.PipeWire`, negotiated with the consumer's
//! `Start` reply (spec §4.C.1 "PipeWire handoff").
//!
//! `pipewire-rs`'s `MainLoop` is not `Send`, so it cannot be driven directly
//! from the `tokio` reactor; instead it runs on its own loop whose file
//! descriptor (`MainLoop::loop_().fd()`) is registered with
//! [`crate::reactor::EventLoop`], keeping frame delivery on the same
//! single-threaded cooperative model as everything else (spec §9, Open
//! Question 1).

use std::io::Cursor;
use std::os::fd::RawFd;
use std::sync::Arc;

use anyhow::{Context, Result};
use drm_fourcc::DrmFourcc;
use parking_lot::Mutex;
use pipewire::spa::param::format::{FormatProperties, MediaSubtype, MediaType};
use pipewire::spa::param::video::VideoFormat;
use pipewire::spa::param::ParamType;
use pipewire::spa::pod::serialize::PodSerializer;
use pipewire::spa::pod::{ChoiceValue, Object, Property, PropertyFlags, Value};
use pipewire::spa::utils::{Choice, ChoiceEnum, ChoiceFlags, Fraction, Id, Rectangle, SpaTypes};
use pipewire::{
    context::Context as PwContext,
    core::Core,
    main_loop::MainLoop,
    properties::properties,
    stream::{Stream, StreamFlags, StreamListener},
};
use tracing::{debug, info};

use crate::screencast::buffer::BufferConstraints;

pub struct PipewireStream {
    main_loop: MainLoop,
    _context: PwContext,
    _core: Core,
    stream: Stream,
    _listener: StreamListener<()>,
    pub node_id: Arc<Mutex<Option<u32>>>,
}

impl PipewireStream {
    /// Create a video stream of the given size and connect it, returning
    /// once PipeWire has assigned a node id (consumed by the portal's
    /// `Start` response, spec §4.C.1).
    pub fn new(constraints: BufferConstraints, cursor_mode: u32) -> Result<Self> {
        let main_loop = MainLoop::new(None).context("pipewire: failed to create main loop")?;
        let context = PwContext::new(&main_loop).context("pipewire: failed to create context")?;
        let core = context.connect(None).context("pipewire: failed to connect to core")?;

        let stream = Stream::new(
            &core,
            "xdg-desktop-portal-wlr-rs",
            properties! {
                *pipewire::keys::MEDIA_CLASS => "Video/Source",
                *pipewire::keys::MEDIA_ROLE => "Screen",
            },
        )
        .context("pipewire: failed to create stream")?;

        let node_id = Arc::new(Mutex::new(None));
        let node_id_cb = node_id.clone();

        let listener = stream
            .add_local_listener::<()>()
            .state_changed(move |_stream, _, old, new| {
                debug!("pipewire: stream state {:?} -> {:?}", old, new);
            })
            .param_changed(move |_stream, _, id, pod| {
                if id == pipewire::spa::param::ParamType::Format.as_raw() {
                    let _ = pod;
                }
            })
            .register()
            .context("pipewire: failed to register stream listener")?;

        let format_pod = build_format_pod(constraints, cursor_mode)?;
        stream
            .connect(
                pipewire::spa::utils::Direction::Output,
                None,
                StreamFlags::MAP_BUFFERS | StreamFlags::DRIVER,
                &mut [format_pod.as_ref()],
            )
            .context("pipewire: failed to connect stream")?;

        if let Some(id) = stream.node_id() {
            *node_id_cb.lock() = Some(id);
            info!("pipewire: stream connected, node id {id}");
        }

        Ok(Self {
            main_loop,
            _context: context,
            _core: core,
            stream,
            _listener: listener,
            node_id,
        })
    }

    pub fn loop_fd(&self) -> RawFd {
        self.main_loop.loop_().fd()
    }

    /// Run one iteration of PipeWire's own loop; called by the reactor
    /// whenever `loop_fd` becomes readable.
    pub fn dispatch_pending(&self) {
        self.main_loop.loop_().iterate(std::time::Duration::ZERO);
    }

    pub fn node_id(&self) -> Option<u32> {
        *self.node_id.lock()
    }

    /// Push one captured frame's bytes into the stream's current buffer.
    pub fn push_frame(&self, data: &[u8]) -> Result<()> {
        let Some(mut buffer) = self.stream.dequeue_buffer() else {
            debug!("pipewire: no buffer available, dropping frame");
            return Ok(());
        };
        let datas = buffer.datas_mut();
        if let Some(d) = datas.get_mut(0) {
            if let Some(slice) = d.data() {
                let len = slice.len().min(data.len());
                slice[..len].copy_from_slice(&data[..len]);
                d.chunk_mut().set_size(len as u32);
            }
        }
        Ok(())
    }
}

fn drm_fourcc_to_spa_video_format(format: DrmFourcc) -> VideoFormat {
    match format {
        DrmFourcc::Argb8888 => VideoFormat::ARGB,
        DrmFourcc::Xrgb8888 => VideoFormat::xRGB,
        DrmFourcc::Abgr8888 => VideoFormat::ABGR,
        DrmFourcc::Xbgr8888 => VideoFormat::xBGR,
        _ => VideoFormat::xRGB,
    }
}

/// Build the `SPA_PARAM_EnumFormat` video pod `Stream::connect` negotiates
/// against: a single video format matching the captured buffer's fourcc,
/// a size range bounding future resizes, and a variable framerate (the
/// compositor paces frames via damage, not the stream). Grounded on
/// `pwr_start`'s `spa_pod_builder_add_object` call in the original and on
/// the `Object`/`Property`/`PodSerializer` shape used for the same param.
fn build_format_pod(constraints: BufferConstraints, _cursor_mode: u32) -> Result<Cursor<Vec<u8>>> {
    let properties = vec![
        Property {
            key: FormatProperties::MediaType.as_raw(),
            flags: PropertyFlags::empty(),
            value: Value::Id(Id(MediaType::Video.as_raw())),
        },
        Property {
            key: FormatProperties::MediaSubtype.as_raw(),
            flags: PropertyFlags::empty(),
            value: Value::Id(Id(MediaSubtype::Raw.as_raw())),
        },
        Property {
            key: FormatProperties::VideoFormat.as_raw(),
            flags: PropertyFlags::empty(),
            value: Value::Id(Id(drm_fourcc_to_spa_video_format(constraints.format).as_raw())),
        },
        Property {
            key: FormatProperties::VideoSize.as_raw(),
            flags: PropertyFlags::empty(),
            value: Value::Choice(ChoiceValue::Rectangle(Choice(
                ChoiceFlags::empty(),
                ChoiceEnum::Range {
                    default: Rectangle { width: constraints.width, height: constraints.height },
                    min: Rectangle { width: 1, height: 1 },
                    max: Rectangle { width: 4096, height: 4096 },
                },
            ))),
        },
        Property {
            key: FormatProperties::VideoFramerate.as_raw(),
            flags: PropertyFlags::empty(),
            value: Value::Fraction(Fraction { num: 0, denom: 1 }),
        },
    ];
    let object = Object { type_: SpaTypes::ObjectParamFormat.as_raw(), id: ParamType::EnumFormat.as_raw(), properties };
    let (cursor, _) = PodSerializer::serialize(Cursor::new(Vec::new()), &Value::Object(object))
        .map_err(|e| anyhow::anyhow!("pipewire: failed to serialize format pod: {e:?}"))?;
    Ok(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drm_fourcc::DrmFourcc;

    #[test]
    fn format_pod_builder_does_not_panic_on_typical_constraints() {
        let constraints = BufferConstraints { width: 1920, height: 1080, stride: 1920 * 4, format: DrmFourcc::Xrgb8888 };
        assert!(build_format_pod(constraints, 0).is_ok());
    }
}
