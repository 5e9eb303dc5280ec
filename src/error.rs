//! Portal-wide error kinds and their mapping onto D-Bus error names.
//!
//! Mirrors the split the original C core made between `sd_bus_error` (wire)
//! and plain `int` status codes (internal): here the internal type is
//! [`PortalError`], translated at the D-Bus boundary by [`PortalError::into_fdo`].

use thiserror::Error;

/// Internal error taxonomy, per spec §7.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// Translate into the matching `org.freedesktop.DBus.Error.*` name.
    ///
    /// `Cancelled` has no wire representation: callers complete the
    /// in-flight `Request` with the `cancelled` response code instead of
    /// replying with an error (spec §5, "Cancellation").
    pub fn into_fdo(self) -> zbus::fdo::Error {
        match self {
            PortalError::InvalidArgs(msg) => zbus::fdo::Error::InvalidArgs(msg),
            PortalError::NotFound(msg) => zbus::fdo::Error::Failed(format!("NotFound: {msg}")),
            PortalError::NotSupported(msg) => {
                zbus::fdo::Error::NotSupported(msg)
            }
            PortalError::Busy(msg) => zbus::fdo::Error::Failed(format!("Busy: {msg}")),
            PortalError::Cancelled => zbus::fdo::Error::Failed("cancelled".into()),
            PortalError::CaptureFailed(msg) => zbus::fdo::Error::Failed(msg),
            PortalError::Fatal(err) => zbus::fdo::Error::Failed(err.to_string()),
        }
    }
}

/// Response codes returned in the `(u, a{sv})` tuple every portal method
/// yields on success, per spec §4.C.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResponseCode {
    Success = 0,
    Cancelled = 1,
    Ended = 2,
}
