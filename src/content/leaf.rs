//! Leaves: resolved, renderable units of content.

use super::FilePath;
use crate::{plugin::PluginDef, render::View};
use std::{any::Any, fmt, path::Path, sync::Arc};

/// Instance produced by a content plugin or a generator.
///
/// `as_any` lets views reach the concrete type through [`Leaf::downcast`].
pub trait Content: Send + Sync {
    /// Output path relative to the output directory.
    fn filename(&self) -> String;

    fn view(&self) -> View;

    /// Color tag used by `inspect`.
    fn color(&self) -> &str {
        "cyan"
    }

    fn as_any(&self) -> &dyn Any;
}

/// Where a leaf came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafSource {
    File(FilePath),
    /// Produced by a generator, not backed by a file.
    Generated,
}

impl LeafSource {
    pub fn full_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(&path.full),
            Self::Generated => None,
        }
    }
}

/// A content instance stamped with its plugin identity and source.
pub struct Leaf {
    content: Box<dyn Content>,
    plugin: PluginDef,
    source: LeafSource,
    base_url: Arc<str>,
}

impl Leaf {
    pub fn new(
        content: Box<dyn Content>,
        plugin: PluginDef,
        source: LeafSource,
        base_url: Arc<str>,
    ) -> Self {
        Self {
            content,
            plugin,
            source,
            base_url,
        }
    }

    pub fn filename(&self) -> String {
        self.content.filename()
    }

    pub fn view(&self) -> View {
        self.content.view()
    }

    pub fn color(&self) -> &str {
        self.content.color()
    }

    pub fn url(&self) -> String {
        resolve_url(&self.base_url, &self.filename())
    }

    pub fn plugin(&self) -> &PluginDef {
        &self.plugin
    }

    pub fn source(&self) -> &LeafSource {
        &self.source
    }

    pub fn content(&self) -> &dyn Content {
        self.content.as_ref()
    }

    /// Borrow the underlying content as its concrete type.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.content.as_any().downcast_ref::<T>()
    }

    /// `url: …, plugin: …` summary shown by `inspect`.
    pub fn info(&self) -> String {
        format!("url: {}, plugin: {}", self.url(), self.plugin.name)
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("filename", &self.filename())
            .field("plugin", &self.plugin)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Join a base URL and a leaf filename.
///
/// Backslashes become `/`. An absolute filename replaces the base path but
/// keeps the origin of an absolute base (`https://host`).
pub fn resolve_url(base: &str, filename: &str) -> String {
    let filename = filename.replace('\\', "/");
    if filename.starts_with('/') {
        return match origin(base) {
            Some(origin) => format!("{origin}{filename}"),
            None => filename,
        };
    }

    let mut url = base.to_owned();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(&filename);
    url
}

/// `scheme://host` part of an absolute URL.
fn origin(base: &str) -> Option<&str> {
    let start = base.find("://")? + 3;
    let end = base[start..].find('/').map_or(base.len(), |i| start + i);
    Some(&base[..end])
}
