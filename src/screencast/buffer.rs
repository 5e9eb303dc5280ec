//! Capture buffers: SHM-backed (always available) or DMA-BUF-backed (when
//! the compositor and `gbm` device agree on a modifier), per spec §4.C.1
//! "Buffer negotiation". Grounded on the `ShmBuffer` in
//! `examples/helixml-helix/desktop/gst-pipewire-zerocopy/src/wlr_screencopy.rs`,
//! generalized to also support DMA-BUF via `gbm`.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use drm_fourcc::DrmFourcc;

/// Negotiated pixel layout for one capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConstraints {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: DrmFourcc,
}

impl BufferConstraints {
    pub fn shm_size(&self) -> usize {
        (self.stride as usize) * (self.height as usize)
    }
}

/// A single capture buffer, either anonymous shared memory or a GBM-backed
/// DMA-BUF. Dropping it unmaps/closes the backing memory.
pub enum Buffer {
    Shm(ShmBuffer),
    DmaBuf(DmaBufBuffer),
}

impl Buffer {
    pub fn constraints(&self) -> BufferConstraints {
        match self {
            Buffer::Shm(b) => b.constraints,
            Buffer::DmaBuf(b) => b.constraints,
        }
    }
}

pub struct ShmBuffer {
    fd: OwnedFd,
    ptr: *mut u8,
    size: usize,
    constraints: BufferConstraints,
}

impl ShmBuffer {
    pub fn new(constraints: BufferConstraints) -> Result<Self> {
        let size = constraints.shm_size();
        let fd = anonymous_shm_open()?;

        if unsafe { libc::ftruncate(fd.as_raw_fd(), size as libc::off_t) } < 0 {
            bail!("ftruncate failed: {}", std::io::Error::last_os_error());
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            bail!("mmap failed: {}", std::io::Error::last_os_error());
        }

        Ok(Self { fd, ptr: ptr as *mut u8, size, constraints })
    }

    pub fn fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

// The mmap'd region is only ever touched from the single-threaded reactor.
unsafe impl Send for ShmBuffer {}

/// Open an anonymous POSIX shared-memory object under a randomized
/// `/xdpw-shm-XXXXXX` name, unlinking it immediately so only our fd keeps it
/// alive. Retries on a name collision up to 100 times, matching the
/// original's `anonymous_shm_open`.
fn anonymous_shm_open() -> Result<OwnedFd> {
    let mut retries = 100;
    loop {
        let name = CString::new(randname()).expect("generated shm name has no interior nul");
        let raw = unsafe { libc::shm_open(name.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, 0o600) };
        if raw >= 0 {
            unsafe { libc::shm_unlink(name.as_ptr()) };
            return Ok(unsafe { OwnedFd::from_raw_fd(raw) });
        }
        let err = std::io::Error::last_os_error();
        retries -= 1;
        if retries == 0 || err.raw_os_error() != Some(libc::EEXIST) {
            bail!("shm_open failed: {err}");
        }
    }
}

/// Six pseudo-random alnum-ish characters derived from the current
/// nanosecond clock, the same bit-twiddling `randname` uses in the original.
fn randname() -> String {
    let mut r = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    let mut suffix = String::with_capacity(6);
    for _ in 0..6 {
        let c = b'A' + (r & 15) as u8 + (r & 16) as u8 * 2;
        suffix.push(c as char);
        r >>= 5;
    }
    format!("/xdpw-shm-{suffix}")
}

/// A GBM buffer object exported as a DMA-BUF, used when the negotiated
/// format has a linear (or compositor-advertised) modifier. `force_mod_linear`
/// in the config (spec §6) forces `DRM_FORMAT_MOD_LINEAR` even when the
/// compositor would offer an implicit modifier, trading performance for the
/// compatibility PipeWire consumers without modifier negotiation need.
pub struct DmaBufBuffer {
    bo: gbm::BufferObject<()>,
    constraints: BufferConstraints,
}

impl DmaBufBuffer {
    pub fn new(
        device: &gbm::Device<std::fs::File>,
        constraints: BufferConstraints,
        force_mod_linear: bool,
    ) -> Result<Self> {
        let gbm_format = gbm::Format::try_from(constraints.format as u32)
            .context("unsupported DRM fourcc for DMA-BUF export")?;

        let bo = if force_mod_linear {
            device
                .create_buffer_object_with_modifiers2::<()>(
                    constraints.width,
                    constraints.height,
                    gbm_format,
                    std::iter::once(gbm::Modifier::Linear),
                    gbm::BufferObjectFlags::empty(),
                )
                .context("gbm: failed to allocate linear buffer object")?
        } else {
            device
                .create_buffer_object::<()>(
                    constraints.width,
                    constraints.height,
                    gbm_format,
                    gbm::BufferObjectFlags::RENDERING | gbm::BufferObjectFlags::LINEAR,
                )
                .context("gbm: failed to allocate buffer object")?
        };

        Ok(Self { bo, constraints })
    }

    pub fn export_fd(&self) -> Result<OwnedFd> {
        self.bo.fd().context("gbm: failed to export DMA-BUF fd")
    }

    pub fn modifier(&self) -> Result<u64> {
        Ok(self.bo.modifier().context("gbm: failed to query modifier")?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shm_size_is_stride_times_height() {
        let c = BufferConstraints { width: 1920, height: 1080, stride: 1920 * 4, format: DrmFourcc::Xrgb8888 };
        assert_eq!(c.shm_size(), 1920 * 1080 * 4);
    }

    #[test]
    fn shm_buffer_roundtrips_bytes() {
        let constraints = BufferConstraints { width: 4, height: 4, stride: 16, format: DrmFourcc::Xrgb8888 };
        let mut buf = ShmBuffer::new(constraints).unwrap();
        buf.as_mut_slice()[0] = 0xAB;
        assert_eq!(buf.as_slice()[0], 0xAB);
    }
}
