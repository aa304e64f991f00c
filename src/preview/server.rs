//! Live preview state and request handling.
//!
//! # State
//!
//! ```text
//! ArcSwap<Snapshot>
//!   ├── contents ─────────── static tree      ◄── reload(Contents)
//!   ├── contents_map ─────── URL → leaf
//!   ├── templates ────────── TemplateMap      ◄── reload(Templates)
//!   ├── views ────────────── ViewMap          ◄── reload(Views)
//!   ├── locals ───────────── Locals           ◄── reload(Locals)
//!   └── generated ────────── cache: combined tree, URL → generated leaf, timestamp
//! ```
//!
//! Requests read the latest committed snapshot. Reloads build their new
//! value completely and commit it with one swap; a failed reload is logged
//! and the previous value stays in place.

use super::{
    gate::{BusyGuard, ReloadGate, Resource},
    routing::{ContentMap, Reply, content_type, normalize_url},
};
use crate::{
    config::Locals,
    content::{ContentTree, Leaf},
    environment::Environment,
    error::ContentError,
    generator::run_generators,
    log,
    render::{RenderScope, ViewMap, render_view},
    templates::TemplateMap,
};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
    time::Instant,
};

/// Notification sent to subscribers for every watched change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
}

/// Generator output cached between requests.
struct GeneratedCache {
    /// Static tree the generators ran against.
    base: Arc<ContentTree>,
    /// Static tree with the generated tree merged over it.
    tree: Arc<ContentTree>,
    map: ContentMap,
    at: Instant,
}

#[derive(Clone)]
struct Snapshot {
    contents: Arc<ContentTree>,
    contents_map: Arc<ContentMap>,
    templates: Arc<TemplateMap>,
    views: Arc<ViewMap>,
    locals: Arc<Locals>,
    generated: Option<Arc<GeneratedCache>>,
}

pub struct PreviewServer {
    env: Environment,
    state: ArcSwap<Snapshot>,
    gate: Arc<ReloadGate>,
    regenerating: Mutex<()>,
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
}

impl PreviewServer {
    /// Load contents, templates, views and locals, in that order.
    pub fn load(env: Environment) -> Result<Self, ContentError> {
        let contents = env.load_contents()?;
        let contents_map = ContentMap::build(&contents);
        let templates = env.load_templates()?;
        let views = env.load_views();
        let locals = env.load_locals()?;

        let snapshot = Snapshot {
            contents: Arc::new(contents),
            contents_map: Arc::new(contents_map),
            templates: Arc::new(templates),
            views: Arc::new(views),
            locals: Arc::new(locals),
            generated: None,
        };

        Ok(Self {
            env,
            state: ArcSwap::from_pointee(snapshot),
            gate: ReloadGate::new(),
            regenerating: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn gate(&self) -> &Arc<ReloadGate> {
        &self.gate
    }

    /// Route and render one request.
    pub fn handle(&self, raw_url: &str) -> Reply {
        self.gate.wait_idle();

        let path = normalize_url(raw_url);
        let snapshot = self.state.load_full();

        let matched = snapshot
            .generated
            .as_ref()
            .and_then(|cache| cache.map.get(&path))
            .or_else(|| snapshot.contents_map.get(&path))
            .is_some();
        // with a cache present, an unknown path cannot appear by regenerating
        if !matched && snapshot.generated.is_some() {
            return Reply::not_found();
        }

        let cache = match self.generated(&snapshot) {
            Ok(cache) => cache,
            Err(err) => {
                log!("error"; "{err}");
                return Reply::error(&err.to_string());
            }
        };

        let Some(leaf) = cache
            .map
            .get(&path)
            .or_else(|| snapshot.contents_map.get(&path))
        else {
            return Reply::not_found();
        };

        self.render(&snapshot, &cache.tree, leaf, &path)
    }

    fn render(&self, snapshot: &Snapshot, tree: &ContentTree, leaf: &Leaf, path: &str) -> Reply {
        let scope = RenderScope {
            env: &self.env,
            views: &snapshot.views,
            locals: &snapshot.locals,
            contents: tree,
            templates: &snapshot.templates,
        };

        let rendered = render_view(&scope, leaf).and_then(|rendered| {
            rendered
                .map(|rendered| {
                    rendered
                        .into_bytes()
                        .map_err(|err| ContentError::Io(PathBuf::from(leaf.filename()), err))
                })
                .transpose()
        });

        match rendered {
            Ok(Some(body)) => {
                log!("preview"; "200 {path}");
                Reply::ok(content_type(&leaf.filename(), path), body)
            }
            Ok(None) => {
                log!("preview"; "404 {path} (view rendered nothing)");
                Reply::not_found()
            }
            Err(err) => {
                log!("error"; "500 {path}: {err}");
                Reply::error(&err.to_string())
            }
        }
    }

    /// Current generator cache, regenerated when absent or older than
    /// `[serve].regeneration_delay`.
    fn generated(&self, snapshot: &Snapshot) -> Result<Arc<GeneratedCache>, ContentError> {
        let delay = self.env.config().serve.regeneration_delay();
        let fresh = |cache: &Arc<GeneratedCache>| {
            Arc::ptr_eq(&cache.base, &snapshot.contents) && cache.at.elapsed() < delay
        };

        if let Some(cache) = snapshot.generated.as_ref().filter(|cache| fresh(cache)) {
            return Ok(Arc::clone(cache));
        }

        let _running = self.regenerating.lock();
        // another request may have regenerated while we waited
        if let Some(cache) = self.state.load().generated.as_ref().filter(|cache| fresh(cache)) {
            return Ok(Arc::clone(cache));
        }

        let base = Arc::clone(&snapshot.contents);
        let cache = if self.env.generators().is_empty() {
            GeneratedCache {
                tree: Arc::clone(&base),
                base,
                map: ContentMap::default(),
                at: Instant::now(),
            }
        } else {
            let generated = run_generators(&self.env, &base)?;
            let map = ContentMap::build(&generated);
            let mut combined = ContentTree::clone(&base);
            combined.merge(Some(&generated));
            GeneratedCache {
                base,
                tree: Arc::new(combined),
                map,
                at: Instant::now(),
            }
        };
        let cache = Arc::new(cache);

        self.state.rcu(|current| {
            let mut next = Snapshot::clone(current);
            // contents reloaded meanwhile: this cache is already stale
            if Arc::ptr_eq(&current.contents, &cache.base) {
                next.generated = Some(Arc::clone(&cache));
            }
            next
        });
        Ok(cache)
    }

    /// Reload `resource` now, unless a reload of it is already running.
    ///
    /// Returns whether a reload ran and was committed.
    pub fn reload(&self, resource: Resource) -> bool {
        match self.gate.try_begin(resource) {
            Some(guard) => self.reload_with(&guard),
            None => false,
        }
    }

    /// Reload `resource` on a background thread. Requests arriving while it
    /// runs wait for it; further requests for the same resource are dropped.
    pub fn schedule_reload(self: &Arc<Self>, resource: Resource) {
        let Some(guard) = self.gate.try_begin(resource) else {
            log!("watch"; "{resource} reload already running, coalescing");
            return;
        };

        let server = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("thicket-reload-{resource}"))
            .spawn(move || {
                server.reload_with(&guard);
            });
        if let Err(err) = spawned {
            log!("error"; "failed to start {resource} reload: {err}");
        }
    }

    fn reload_with(&self, guard: &BusyGuard) -> bool {
        let resource = guard.resource();
        let started = Instant::now();

        let result = match resource {
            Resource::Contents => self.env.load_contents().map(|contents| {
                let map = ContentMap::build(&contents);
                let contents = Arc::new(contents);
                let map = Arc::new(map);
                self.commit(|next| {
                    next.contents = Arc::clone(&contents);
                    next.contents_map = Arc::clone(&map);
                    next.generated = None;
                });
            }),
            Resource::Templates => self.env.load_templates().map(|templates| {
                let templates = Arc::new(templates);
                self.commit(|next| next.templates = Arc::clone(&templates));
            }),
            Resource::Views => {
                let views = Arc::new(self.env.load_views());
                self.commit(|next| next.views = Arc::clone(&views));
                Ok(())
            }
            Resource::Locals => self.env.load_locals().map(|locals| {
                let locals = Arc::new(locals);
                self.commit(|next| next.locals = Arc::clone(&locals));
            }),
        };

        match result {
            Ok(()) => {
                log!("watch"; "reloaded {resource} in {:.2?}", started.elapsed());
                true
            }
            Err(err) => {
                log!("error"; "failed to reload {resource}, keeping previous: {err}");
                false
            }
        }
    }

    fn commit(&self, update: impl Fn(&mut Snapshot)) {
        self.state.rcu(|current| {
            let mut next = Snapshot::clone(current);
            update(&mut next);
            next
        });
    }

    /// Receive a [`ChangeEvent`] for every relevant watched change.
    pub fn subscribe(&self) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn notify_change(&self, path: &Path) {
        let event = ChangeEvent {
            path: path.to_path_buf(),
        };
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Number of leaves in the current static tree.
    pub fn leaf_count(&self) -> usize {
        self.state.load().contents_map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::GeneratedTree,
        render::{Rendered, View},
        test_support::{FakeContent, FakePlugin, test_config, write_files},
    };
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn server_with(
        setup: impl FnOnce(&mut Environment),
        files: &[(&str, &str)],
    ) -> (tempfile::TempDir, Arc<PreviewServer>) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_files(&config.build.contents, files);
        let mut env = Environment::new(config);
        env.register_content_plugin("pages", "**/*.html", Arc::new(FakePlugin::new("Page")));
        setup(&mut env);
        (dir, Arc::new(PreviewServer::load(env).unwrap()))
    }

    #[test]
    fn test_unmapped_path_is_404() {
        let (_dir, server) = server_with(|_| {}, &[("index.html", "home")]);
        let reply = server.handle("/missing.html");
        assert_eq!(reply, Reply::not_found());
        assert_eq!(reply.body, b"404 Not Found");
    }

    #[test]
    fn test_mapped_path_is_200() {
        let files = [("index.html", "home"), ("docs/index.html", "docs")];
        let (_dir, server) = server_with(|_| {}, &files);

        let reply = server.handle("/");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"home");
        assert_eq!(reply.content_type, "text/html; charset=utf-8");

        assert_eq!(server.handle("/docs").body, b"docs");
        assert_eq!(server.handle("/docs/?x=1").body, b"docs");
    }

    #[test]
    fn test_static_files_are_streamed() {
        let (_dir, server) = server_with(|_| {}, &[("img/logo.png", "png")]);
        let reply = server.handle("/img/logo.png");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "image/png");
        assert_eq!(reply.body, b"png");
    }

    #[test]
    fn test_none_render_is_404() {
        let (_dir, server) = server_with(
            |env| {
                env.register_generator("drafts", "drafts", |_, _| {
                    let mut out = GeneratedTree::new();
                    let draft = FakeContent::new("draft.html").with_view(View::named("none"));
                    out.insert_content("draft.html", draft);
                    Ok(out)
                });
            },
            &[],
        );
        assert_eq!(server.handle("/draft.html").status, 404);
    }

    #[test]
    fn test_render_error_is_500() {
        let (_dir, server) = server_with(
            |env| {
                env.register_generator("broken", "pages", |_, _| {
                    let mut out = GeneratedTree::new();
                    let view = View::func(|_, _| anyhow::bail!("kaboom"));
                    out.insert_content("bad.html", FakeContent::new("bad.html").with_view(view));
                    Ok(out)
                });
            },
            &[],
        );
        let reply = server.handle("/bad.html");
        assert_eq!(reply.status, 500);
        assert!(String::from_utf8(reply.body).unwrap().contains("kaboom"));
    }

    #[test]
    fn test_generated_content_wins_and_sees_static_tree() {
        let (_dir, server) = server_with(
            |env| {
                env.register_generator("count", "pages", |_, tree| {
                    let mut out = GeneratedTree::new();
                    let body = format!("{} static", tree.leaves().len());
                    let index = FakeContent::new("index.html").with_body(&body);
                    out.insert_content("index.html", index);
                    Ok(out)
                });
            },
            &[("index.html", "home"), ("about.html", "about")],
        );

        assert_eq!(server.handle("/").body, b"2 static");
        assert_eq!(server.handle("/about.html").body, b"about");
    }

    #[test]
    fn test_views_see_generated_leaf_on_collision() {
        let (_dir, server) = server_with(
            |env| {
                env.register_generator("gen", "pages", |_, _| {
                    let mut out = GeneratedTree::new();
                    let index = FakeContent::new("index.html").with_body("generated");
                    out.insert_content("index.html", index);
                    let who = View::func(|scope, _| {
                        let contents = scope.contents;
                        let plugin = contents
                            .lookup("index.html")
                            .and_then(|id| contents.leaf(id))
                            .map(|leaf| leaf.plugin().name.clone())
                            .unwrap_or_default();
                        Ok(Some(Rendered::from(plugin)))
                    });
                    out.insert_content("who.txt", FakeContent::new("who.txt").with_view(who));
                    Ok(out)
                });
            },
            &[("index.html", "home")],
        );

        assert_eq!(server.handle("/").body, b"generated");
        assert_eq!(server.handle("/who.txt").body, b"gen");
    }

    #[test]
    fn test_stream_failure_reports_cause() {
        struct Unplugged;
        impl std::io::Read for Unplugged {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk unplugged"))
            }
        }

        let (_dir, server) = server_with(
            |env| {
                env.register_generator("feed", "pages", |_, _| {
                    let mut out = GeneratedTree::new();
                    let view = View::func(|_, _| Ok(Some(Rendered::Stream(Box::new(Unplugged)))));
                    out.insert_content("feed.xml", FakeContent::new("feed.xml").with_view(view));
                    Ok(out)
                });
            },
            &[],
        );

        let reply = server.handle("/feed.xml");
        assert_eq!(reply.status, 500);
        assert!(String::from_utf8(reply.body).unwrap().contains("disk unplugged"));
    }

    #[test]
    fn test_generators_rerun_only_when_stale() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.serve.regeneration_delay = 60_000;
        let mut env = Environment::new(config);
        env.register_generator("count", "pages", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut out = GeneratedTree::new();
            out.insert_content("x.html", FakeContent::new("x.html").with_body("x"));
            Ok(out)
        });
        let server = PreviewServer::load(env).unwrap();

        assert_eq!(server.handle("/x.html").status, 200);
        assert_eq!(server.handle("/x.html").status, 200);
        assert_eq!(server.handle("/nope.html").status, 404);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // a contents reload drops the cache
        assert!(server.reload(Resource::Contents));
        assert_eq!(server.handle("/x.html").status, 200);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_delay_regenerates_every_request() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.serve.regeneration_delay = 0;
        let mut env = Environment::new(config);
        env.register_generator("count", "pages", move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let mut out = GeneratedTree::new();
            let body = n.to_string();
            out.insert_content("n.txt", FakeContent::new("n.txt").with_body(&body));
            Ok(out)
        });
        let server = PreviewServer::load(env).unwrap();

        assert_eq!(server.handle("/n.txt").body, b"1");
        thread::sleep(Duration::from_millis(5));
        assert_eq!(server.handle("/n.txt").body, b"2");
    }

    #[test]
    fn test_reload_contents_picks_up_new_files() {
        let (dir, server) = server_with(|_| {}, &[("index.html", "home")]);
        assert_eq!(server.handle("/new.html").status, 404);

        let contents = &server.env().config().build.contents;
        fs::write(contents.join("new.html"), "fresh").unwrap();
        assert!(server.reload(Resource::Contents));

        assert_eq!(server.handle("/new.html").body, b"fresh");
        assert_eq!(server.leaf_count(), 2);
        drop(dir);
    }

    #[test]
    fn test_failed_reload_keeps_last_good_snapshot() {
        let (_dir, server) = server_with(|_| {}, &[("index.html", "home")]);
        let contents = server.env().config().build.contents.clone();
        fs::remove_dir_all(&contents).unwrap();

        assert!(!server.reload(Resource::Contents));
        assert_eq!(server.handle("/").body, b"home");
    }

    #[test]
    fn test_reload_is_coalesced_while_busy() {
        let (_dir, server) = server_with(|_| {}, &[("index.html", "home")]);
        let guard = server.gate().try_begin(Resource::Templates).unwrap();
        assert!(!server.reload(Resource::Templates));
        drop(guard);
        assert!(server.reload(Resource::Templates));
    }

    #[test]
    fn test_request_waits_for_running_reload() {
        let (_dir, server) = server_with(|_| {}, &[("index.html", "home")]);
        let guard = server.gate().try_begin(Resource::Locals).unwrap();

        let request = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.handle("/"))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!request.is_finished());

        drop(guard);
        assert_eq!(request.join().unwrap().status, 200);
    }

    #[test]
    fn test_subscribers_receive_changes() {
        let (_dir, server) = server_with(|_| {}, &[]);
        let rx = server.subscribe();
        server.notify_change(Path::new("/site/contents/a.md"));
        assert_eq!(rx.recv().unwrap().path, PathBuf::from("/site/contents/a.md"));

        drop(rx);
        // disconnected subscribers are pruned
        server.notify_change(Path::new("/site/contents/b.md"));
        assert!(server.subscribers.lock().is_empty());
    }

    #[test]
    fn test_locals_reload_updates_views() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        let file = dir.path().join("locals.json");
        fs::write(&file, r#"{"greeting": "hi"}"#).unwrap();
        config.build.locals_file = Some(file.clone());
        let mut env = Environment::new(config);
        env.register_view(
            "greet",
            View::func(|scope, _| {
                let greeting = scope.locals["greeting"].as_str().unwrap_or_default();
                Ok(Some(Rendered::from(greeting.to_owned())))
            }),
        );
        env.register_generator("hello", "pages", |_, _| {
            let mut out = GeneratedTree::new();
            let hello = FakeContent::new("hello.txt").with_view(View::named("greet"));
            out.insert_content("hello.txt", hello);
            Ok(out)
        });
        let server = PreviewServer::load(env).unwrap();
        assert_eq!(server.handle("/hello.txt").body, b"hi");

        fs::write(&file, r#"{"greeting": "hello"}"#).unwrap();
        assert!(server.reload(Resource::Locals));
        assert_eq!(server.handle("/hello.txt").body, b"hello");
    }
}
