//! Live preview server.
//!
//! Serves the site from memory, rendering each requested leaf on demand
//! while file watchers keep the loaded state current.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │   Main Thread    │   │   HTTP Thread    │   │  Watcher Thread  │
//! │ (signal loop)    │   │ (tiny_http)      │   │ (notify)         │
//! └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//!   Restart / Shutdown     handle() per request   schedule_reload()
//!   (config change,        on its own thread      or Signal::Restart
//!    Ctrl+C)                      │                      │
//!          │                      └──────────┬───────────┘
//!          ▼                                 ▼
//!   stop + start session            PreviewServer snapshot
//! ```

mod gate;
mod http;
mod routing;
mod server;
mod watch;

pub use gate::{BusyGuard, ReloadGate, Resource};
pub use http::Listener;
pub use routing::{ContentMap, NOT_FOUND_BODY, Reply, content_type, normalize_url};
pub use server::{ChangeEvent, PreviewServer};

use crate::{cli::Cli, config::SiteConfig, environment::Environment, log};
use anyhow::{Context, Result};
use std::sync::{Arc, mpsc};
use watch::SiteWatcher;

/// Control messages for the main preview loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The config file changed.
    Restart,
    Shutdown,
}

/// One running server: listener, watchers and their shared state.
struct Session {
    listener: Listener,
    watcher: Option<SiteWatcher>,
}

impl Session {
    fn start(
        config: SiteConfig,
        setup: &dyn Fn(&mut Environment),
        signals: &mpsc::Sender<Signal>,
    ) -> Result<Self> {
        let interface = config.serve.interface.clone();
        let port = config.serve.port;
        let watch = config.serve.watch;

        let mut env = Environment::new(config);
        setup(&mut env);
        let server = Arc::new(PreviewServer::load(env).context("Failed to load site")?);
        log!("preview"; "loaded {} leaves", server.leaf_count());

        let watcher = if watch {
            Some(SiteWatcher::start(Arc::clone(&server), signals.clone())?)
        } else {
            None
        };
        let listener = Listener::start(server, &interface, port)?;
        log!("preview"; "http://{}", listener.addr());

        Ok(Self { listener, watcher })
    }

    fn stop(self) {
        drop(self.watcher);
        self.listener.stop();
    }
}

/// Run the preview server until Ctrl+C.
///
/// `setup` registers plugins, views and generators on every fresh
/// environment, including after a config-triggered restart. A restart whose
/// new config fails to load keeps the running session.
pub fn preview_site(cli: &Cli, setup: &dyn Fn(&mut Environment)) -> Result<()> {
    let (signals, rx) = mpsc::channel();

    let for_ctrlc = signals.clone();
    ctrlc::set_handler(move || {
        log!("preview"; "shutting down...");
        for_ctrlc.send(Signal::Shutdown).ok();
    })
    .context("Failed to set Ctrl+C handler")?;

    let config = SiteConfig::load(cli)?;
    let mut session = Session::start(config, setup, &signals)?;

    while let Ok(signal) = rx.recv() {
        match signal {
            Signal::Shutdown => break,
            Signal::Restart => match SiteConfig::load(cli) {
                Ok(config) => {
                    session.stop();
                    session = Session::start(config, setup, &signals)?;
                }
                Err(err) => log!("error"; "config reload failed, keeping current server: {err:#}"),
            },
        }
    }

    session.stop();
    Ok(())
}
