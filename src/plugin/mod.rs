//! Plugin registry and resolver.
//!
//! Content plugins turn source files into [`Content`] instances; template
//! plugins turn template files into [`Template`] instances. Both are held in
//! registration order and resolved by scanning that order **backwards**, so
//! the most recently registered matching pattern wins.
//!
//! ```text
//! register("pages", "**/*.md", Markdown)    ┐
//! register("pages", "**/*.md", Fancy)       ┘ resolve("a.md") → Fancy
//! resolve("logo.png")                         → StaticFile (fallback)
//! ```

mod matcher;
mod static_file;

pub use matcher::{GlobMatcher, Matcher};
pub use static_file::{StaticFile, StaticFilePlugin};

use crate::{
    config::Locals,
    content::{Content, FilePath, Leaf, LeafSource},
    error::ContentError,
};
use std::sync::Arc;

/// Identity of the plugin (or generator) that produced a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDef {
    pub name: String,
    pub group: String,
    /// `None` for the fallback and for generators.
    pub pattern: Option<String>,
}

/// Factory turning a source file into a content instance.
pub trait ContentPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn from_file(&self, path: &FilePath) -> anyhow::Result<Box<dyn Content>>;
}

/// Factory turning a template file into a compiled template.
pub trait TemplatePlugin: Send + Sync {
    fn name(&self) -> &str;

    fn from_file(&self, path: &FilePath) -> anyhow::Result<Box<dyn Template>>;
}

pub trait Template: Send + Sync {
    fn render(&self, locals: &Locals) -> anyhow::Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct Registration {
    pub def: PluginDef,
    pub plugin: Arc<dyn ContentPlugin>,
}

#[derive(Clone)]
struct TemplateRegistration {
    pattern: String,
    plugin: Arc<dyn TemplatePlugin>,
}

pub struct Registry {
    content: Vec<Registration>,
    templates: Vec<TemplateRegistration>,
    fallback: Registration,
    matcher: Arc<dyn Matcher>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(GlobMatcher::new()))
    }
}

impl Registry {
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self {
            content: Vec::new(),
            templates: Vec::new(),
            fallback: StaticFilePlugin::registration(),
            matcher,
        }
    }

    pub fn matcher(&self) -> &dyn Matcher {
        self.matcher.as_ref()
    }

    pub fn register(&mut self, group: &str, pattern: &str, plugin: Arc<dyn ContentPlugin>) {
        let def = PluginDef {
            name: plugin.name().to_owned(),
            group: group.to_owned(),
            pattern: Some(pattern.to_owned()),
        };
        self.content.push(Registration { def, plugin });
    }

    pub fn register_template(&mut self, pattern: &str, plugin: Arc<dyn TemplatePlugin>) {
        self.templates.push(TemplateRegistration {
            pattern: pattern.to_owned(),
            plugin,
        });
    }

    /// Registered content plugins, in registration order.
    pub fn registrations(&self) -> &[Registration] {
        &self.content
    }

    /// Last registered content plugin whose pattern matches, else the fallback.
    pub fn resolve(&self, path: &FilePath) -> &Registration {
        let relative = path.relative_str();
        self.content
            .iter()
            .rev()
            .find(|registration| {
                registration
                    .def
                    .pattern
                    .as_deref()
                    .is_some_and(|pattern| self.matcher.matches(&relative, pattern))
            })
            .unwrap_or(&self.fallback)
    }

    /// Last registered template plugin whose pattern matches.
    pub fn resolve_template(&self, path: &FilePath) -> Option<&Arc<dyn TemplatePlugin>> {
        let relative = path.relative_str();
        self.templates
            .iter()
            .rev()
            .find(|registration| self.matcher.matches(&relative, &registration.pattern))
            .map(|registration| &registration.plugin)
    }

    /// Run the plugin factory and stamp the result into a leaf.
    ///
    /// Factory errors are returned with the relative path prefixed.
    pub fn instantiate(
        &self,
        path: &FilePath,
        registration: &Registration,
        base_url: &Arc<str>,
    ) -> Result<Arc<Leaf>, ContentError> {
        let content = registration
            .plugin
            .from_file(path)
            .map_err(|source| ContentError::Factory {
                path: path.relative_str(),
                source,
            })?;

        Ok(Arc::new(Leaf::new(
            content,
            registration.def.clone(),
            LeafSource::File(path.clone()),
            Arc::clone(base_url),
        )))
    }
}
