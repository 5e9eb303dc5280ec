//! `xdg-desktop-portal-wlr` — XDG Desktop Portal backend for wlroots-based
//! Wayland compositors (spec §1 OVERVIEW). Bootstraps configuration,
//! logging, the Wayland connection, the D-Bus session, and the single
//! reactor described in `reactor.rs`, then runs until SIGTERM/SIGINT.

mod app_state;
mod config;
mod dbus;
mod error;
mod global_shortcuts;
mod input_capture;
mod reactor;
mod remote_desktop;
mod screencast;
mod screenshot;
mod session;
mod wayland;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app_state::AppState;
use config::{Config, ForcedPixelFormat};

const HELP: &str = "\
xdg-desktop-portal-wlr

USAGE:
    xdg-desktop-portal-wlr [OPTIONS]

OPTIONS:
    -p, --pixelformat <BGRx|RGBx>   Force the pixel format advertised over PipeWire
    -h, --help                      Print this help and exit";

struct Args {
    forced_pixel_format: Option<ForcedPixelFormat>,
}

/// Hand-rolled parsing of the two flags spec §6 defines — not worth a
/// dependency for a daemon with no subcommands.
fn parse_args() -> Result<Args> {
    let mut forced_pixel_format = None;
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{HELP}");
                std::process::exit(0);
            }
            "-p" | "--pixelformat" => {
                let value = iter.next().context("-p/--pixelformat requires an argument")?;
                forced_pixel_format = Some(
                    ForcedPixelFormat::parse(&value)
                        .with_context(|| format!("invalid pixel format '{value}', expected BGRx or RGBx"))?,
                );
            }
            other => anyhow::bail!("unrecognized argument '{other}' (see --help)"),
        }
    }
    Ok(Args { forced_pixel_format })
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// SIGTERM or SIGINT, whichever arrives first — mirrors the teacher's
/// `wait_for_shutdown`, feeding a one-shot channel instead since
/// `reactor::EventLoop::run_until` selects over an `mpsc::Receiver`
/// alongside the Wayland fd.
async fn wait_for_shutdown(tx: tokio::sync::mpsc::Sender<()>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("main: received SIGTERM"),
        _ = sigint.recv() => tracing::info!("main: received SIGINT"),
    }
    let _ = tx.send(()).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    init_logging();
    tracing::info!("xdg-desktop-portal-wlr v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(None).context("failed to load configuration")?;
    if let Some(forced) = args.forced_pixel_format {
        config.screencast.forced_pixel_format = Some(forced);
    }

    let (wayland, wayland_fd) = wayland::WaylandContext::connect().context("failed to connect to the Wayland display")?;

    let connection = zbus::Connection::session().await.context("failed to connect to the D-Bus session bus")?;
    let state = AppState::new(connection.clone(), wayland, config);
    dbus::register(&connection, state.clone()).await.context("failed to register D-Bus portal interfaces")?;

    let event_loop = reactor::EventLoop::new(wayland_fd).context("failed to set up the reactor")?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(wait_for_shutdown(shutdown_tx));

    event_loop.run_until(state, shutdown_rx).await;
    tracing::info!("xdg-desktop-portal-wlr exiting");
    Ok(())
}
