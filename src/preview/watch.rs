//! File watching for the preview server.
//!
//! # Architecture
//!
//! ```text
//! notify events ──► Debouncer (100ms) ──► categorize_path()
//!                                             │
//!                     ┌───────────────────────┼─────────────────────────┐
//!                     ▼                       ▼                         ▼
//!                  Config              Contents / Templates /     IgnoredContent
//!              (hash changed?)           Views / Locals          (change event only)
//!                     │                       │
//!                     ▼                       ▼
//!              Signal::Restart      schedule_reload(resource)
//! ```

use super::{Signal, gate::Resource, server::PreviewServer};
use crate::{config::SiteConfig, content::FilePath, log};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileCategory {
    Config,
    Resource(Resource),
    /// Below the content root but matching an ignore glob.
    IgnoredContent,
    Unknown,
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

fn categorize_path(path: &Path, server: &PreviewServer) -> FileCategory {
    let config = server.env().config();
    let build = &config.build;

    if path == config.config_path {
        return FileCategory::Config;
    }
    if build.locals_file.as_deref() == Some(path) {
        return FileCategory::Resource(Resource::Locals);
    }
    if path.starts_with(&build.contents) {
        let file = FilePath::new(&build.contents, path.to_path_buf());
        return if server.env().is_ignored(&file) {
            FileCategory::IgnoredContent
        } else {
            FileCategory::Resource(Resource::Contents)
        };
    }
    if path.starts_with(&build.templates) {
        return FileCategory::Resource(Resource::Templates);
    }
    if build.views.as_deref().is_some_and(|views| path.starts_with(views)) {
        return FileCategory::Resource(Resource::Views);
    }
    FileCategory::Unknown
}

/// Batches rapid file events.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Handles watched changes for one preview session.
struct ChangeHandler {
    server: Arc<PreviewServer>,
    signals: mpsc::Sender<Signal>,
    config_hash: Option<blake3::Hash>,
}

impl ChangeHandler {
    fn handle(&mut self, paths: Vec<PathBuf>) {
        let mut reloads = Vec::new();
        let mut config_changed = false;

        for path in paths {
            match categorize_path(&path, &self.server) {
                FileCategory::Config => config_changed = true,
                FileCategory::Resource(resource) => {
                    self.server.notify_change(&path);
                    if !reloads.contains(&resource) {
                        reloads.push(resource);
                    }
                }
                FileCategory::IgnoredContent => self.server.notify_change(&path),
                FileCategory::Unknown => {}
            }
        }

        if config_changed {
            let hash = self.server.env().config().content_hash();
            if hash == self.config_hash {
                log!("watch"; "config saved without changes");
            } else {
                self.config_hash = hash;
                log!("watch"; "config changed, restarting...");
                self.signals.send(Signal::Restart).ok();
                return;
            }
        }

        for resource in reloads {
            log!("watch"; "{resource} changed, reloading...");
            self.server.schedule_reload(resource);
        }
    }
}

/// Watches the session's paths until dropped.
pub struct SiteWatcher {
    // dropping the watcher disconnects the event loop
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl SiteWatcher {
    pub fn start(server: Arc<PreviewServer>, signals: mpsc::Sender<Signal>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
        setup_watchers(&mut watcher, server.env().config())?;

        let mut handler = ChangeHandler {
            config_hash: server.env().config().content_hash(),
            server,
            signals,
        };

        let thread = thread::Builder::new()
            .name("thicket-watch".into())
            .spawn(move || {
                let mut debouncer = Debouncer::new();
                loop {
                    match rx.recv_timeout(debouncer.timeout()) {
                        Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
                        Ok(Err(e)) => log!("watch"; "error: {e}"),
                        Err(mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                            handler.handle(debouncer.take());
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        _ => {}
                    }
                }
            })?;

        Ok(Self {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }
}

impl Drop for SiteWatcher {
    fn drop(&mut self) {
        drop(self.watcher.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log!("error"; "watch thread panicked");
        }
    }
}

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let build = &config.build;
    let mut targets = vec![
        (build.contents.as_path(), RecursiveMode::Recursive),
        (build.templates.as_path(), RecursiveMode::Recursive),
    ];
    if let Some(views) = &build.views {
        targets.push((views.as_path(), RecursiveMode::Recursive));
    }
    if let Some(locals) = &build.locals_file {
        targets.push((locals.as_path(), RecursiveMode::NonRecursive));
    }
    if config.serve.restart_on_config_change {
        targets.push((config.config_path.as_path(), RecursiveMode::NonRecursive));
    }

    let root = config.get_root();
    let mut watched = Vec::new();
    for (path, mode) in targets {
        if !path.exists() {
            continue;
        }
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        watched.push(path.strip_prefix(root).unwrap_or(path).display().to_string());
    }

    log!("watch"; "watching {}", watched.join(", "));
    Ok(())
}
