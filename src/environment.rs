//! Session state shared by build and preview.
//!
//! An [`Environment`] owns the configuration and everything registered
//! against it: content and template plugins, named views and generators.
//! Loading routines read from disk through it but never store their
//! results; build and preview decide what to keep.

use crate::{
    config::{Locals, SiteConfig},
    content::{ContentTree, FilePath},
    error::ContentError,
    generator::{GeneratedTree, GeneratorDef},
    log,
    plugin::{ContentPlugin, Registry, TemplatePlugin},
    render::{View, ViewFn, ViewMap},
    templates::{self, TemplateMap},
};
use std::{fs, sync::Arc};

/// Name of the built-in view that renders nothing.
pub const NONE_VIEW: &str = "none";

pub struct Environment {
    config: Arc<SiteConfig>,
    registry: Registry,
    views: ViewMap,
    generators: Vec<GeneratorDef>,
    base_url: Arc<str>,
}

impl Environment {
    pub fn new(config: SiteConfig) -> Self {
        let base_url = Arc::from(config.build.base_url.as_str());
        let mut env = Self {
            config: Arc::new(config),
            registry: Registry::default(),
            views: ViewMap::default(),
            generators: Vec::new(),
            base_url,
        };
        env.register_view(NONE_VIEW, View::func(|_, _| Ok(None)));
        env
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn base_url(&self) -> &Arc<str> {
        &self.base_url
    }

    pub fn register_content_plugin(
        &mut self,
        group: &str,
        pattern: &str,
        plugin: Arc<dyn ContentPlugin>,
    ) {
        self.registry.register(group, pattern, plugin);
    }

    pub fn register_template_plugin(&mut self, pattern: &str, plugin: Arc<dyn TemplatePlugin>) {
        self.registry.register_template(pattern, plugin);
    }

    /// Register a named view. Only function views can be registered.
    pub fn register_view(&mut self, name: &str, view: View) {
        match view {
            View::Func(view) => {
                self.views.insert(name.to_owned(), view);
            }
            View::Named(alias) => {
                log!("error"; "view `{name}` must be a function, got alias `{alias}`");
            }
        }
    }

    /// Register a generator; `group` is the group its leaves are filed under.
    pub fn register_generator<F>(&mut self, name: &str, group: &str, generator: F)
    where
        F: Fn(&Environment, &ContentTree) -> anyhow::Result<GeneratedTree> + Send + Sync + 'static,
    {
        self.generators.push(GeneratorDef {
            name: name.to_owned(),
            group: group.to_owned(),
            func: Arc::new(generator),
        });
    }

    pub fn generators(&self) -> &[GeneratorDef] {
        &self.generators
    }

    /// Groups every new branch declares: registered plugin and generator
    /// groups, deduplicated in registration order.
    pub fn content_groups(&self) -> Arc<[String]> {
        let mut names: Vec<String> = Vec::new();
        let groups = self
            .registry
            .registrations()
            .iter()
            .map(|registration| &registration.def.group)
            .chain(self.generators.iter().map(|generator| &generator.group));
        for group in groups {
            if !names.contains(group) {
                names.push(group.clone());
            }
        }
        names.into()
    }

    /// Whether `path` matches any `[build].ignore` glob. Matches are logged.
    pub fn is_ignored(&self, path: &FilePath) -> bool {
        let relative = path.relative_str();
        let matched = self
            .config
            .build
            .ignore
            .iter()
            .find(|pattern| self.registry.matcher().matches(&relative, pattern));
        if let Some(pattern) = matched {
            log!("content"; "ignoring {relative} (matches `{pattern}`)");
        }
        matched.is_some()
    }

    /// Resolve the content directory, scanning at most `file_limit` entries
    /// concurrently.
    pub fn load_contents(&self) -> Result<ContentTree, ContentError> {
        let contents = &self.config.build.contents;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.build.file_limit)
            .thread_name(|i| format!("thicket-scan-{i}"))
            .build()?;
        let tree = pool.install(|| ContentTree::from_directory(self, contents))?;
        log!("content"; "resolved {} leaves in {}", tree.leaves().len(), contents.display());
        Ok(tree)
    }

    pub fn load_templates(&self) -> Result<TemplateMap, ContentError> {
        templates::load_templates(&self.registry, &self.config.build.templates)
    }

    /// Snapshot of the registered views.
    pub fn load_views(&self) -> ViewMap {
        self.views.clone()
    }

    pub fn view(&self, name: &str) -> Option<&ViewFn> {
        self.views.get(name)
    }

    /// `[locals]` with the optional `locals_file` merged over it.
    pub fn load_locals(&self) -> Result<Locals, ContentError> {
        let mut locals = self.config.locals.clone();
        let Some(file) = &self.config.build.locals_file else {
            return Ok(locals);
        };

        let content = fs::read_to_string(file).map_err(|err| ContentError::Io(file.clone(), err))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|err| ContentError::Locals(file.clone(), err))?;
        let serde_json::Value::Object(overrides) = value else {
            return Err(ContentError::LocalsNotObject(file.clone()));
        };
        locals.extend(overrides);
        Ok(locals)
    }
}
