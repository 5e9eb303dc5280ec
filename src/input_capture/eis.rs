//! EIS (Emulated Input System) server: the daemon's half of `ConnectToEIS`.
//! Once a session calls `ConnectToEIS`, this module accepts libei's
//! handshake on the connected socket pair and pumps `reis::eis` events into
//! canonical [`CapturedEvent`]s for the rest of the input-capture state
//! machine.
//!
//! Grounded on the *client*-side usage in
//! `examples/other_examples/0764674e_AatozInnoInc-PC-Unifier__src-platform-linux-wayland-capture.rs.rs`
//! (`reis::ei`/`event::EiEvent`, tokio `StreamExt` pump) mirrored onto the
//! server half of the same crate (`reis::eis`), since this daemon is the
//! EIS server an application's libei client connects to, not the other way
//! around.

use std::os::unix::net::UnixStream;

use anyhow::{Context, Result};
use futures::StreamExt;
use reis::eis;
use tracing::{debug, info, warn};

/// Canonical event this module hands to the rest of the capture state
/// machine, decoupling it from `reis`'s own event enum.
#[derive(Debug, Clone)]
pub enum CapturedEvent {
    KeyboardKey { keycode: u32, pressed: bool },
    PointerMotion { dx: f64, dy: f64 },
    PointerButton { button: u32, pressed: bool },
    PointerScroll { dx: f64, dy: f64 },
    Disconnected,
}

/// Owns the EIS server context for one `ConnectToEIS` socket.
pub struct EisServer {
    context: eis::Context,
}

impl EisServer {
    /// `socket` is the daemon's end of the socketpair created for
    /// `ConnectToEIS`; the other end's fd is handed back to the caller over
    /// D-Bus as a `UnixFD`.
    pub fn new(socket: UnixStream) -> Result<Self> {
        socket.set_nonblocking(true).context("eis: failed to set socket non-blocking")?;
        let context = eis::Context::new(socket).context("eis: failed to create server context")?;
        Ok(Self { context })
    }

    /// Pump one batch of pending libei requests, translating them into
    /// [`CapturedEvent`]s. Intended to be called by the reactor whenever the
    /// EIS socket fd is readable.
    pub async fn poll(&mut self) -> Result<Vec<CapturedEvent>> {
        let mut events = Vec::new();
        while let Some(request) = self.context.next().await {
            let request = request.context("eis: malformed request from client")?;
            if let Some(event) = translate(request) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn translate(request: eis::Event) -> Option<CapturedEvent> {
    match request {
        eis::Event::KeyboardKey(key) => Some(CapturedEvent::KeyboardKey {
            keycode: key.key,
            pressed: key.state == eis::KeyState::Press,
        }),
        eis::Event::PointerMotion(motion) => {
            Some(CapturedEvent::PointerMotion { dx: motion.dx, dy: motion.dy })
        }
        eis::Event::PointerButton(button) => Some(CapturedEvent::PointerButton {
            button: button.button,
            pressed: button.state == eis::ButtonState::Press,
        }),
        eis::Event::PointerScroll(scroll) => {
            Some(CapturedEvent::PointerScroll { dx: scroll.dx, dy: scroll.dy })
        }
        eis::Event::Disconnected(reason) => {
            if let Some(reason) = reason {
                warn!("eis: client disconnected: {reason:?}");
            } else {
                debug!("eis: client disconnected cleanly");
            }
            Some(CapturedEvent::Disconnected)
        }
        other => {
            debug!("eis: ignoring unhandled request {other:?}");
            None
        }
    }
}

/// Create the socketpair handed back by `ConnectToEIS`: one end is wrapped
/// in an [`EisServer`], the other's fd is returned for the D-Bus reply.
pub fn create_eis_socketpair() -> Result<(EisServer, std::os::fd::OwnedFd)> {
    let (server_end, client_end) =
        UnixStream::pair().context("eis: failed to create socketpair")?;
    let server = EisServer::new(server_end)?;
    let client_fd: std::os::fd::OwnedFd = client_end.into();
    info!("eis: socketpair created for ConnectToEIS");
    Ok((server, client_fd))
}
