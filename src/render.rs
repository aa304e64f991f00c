//! Render pipeline: resolve each leaf's view and write its output.
//!
//! ```text
//! render()
//!     │
//!     ├── flatten(contents) ──► [leaf, leaf, ...]
//!     │
//!     └── for each leaf (sequential, or rayon when [build].parallel)
//!             ├── render_view() ──► Some(buffer | stream) ──► output/<filename>
//!             └──                └► None ──► skipped
//! ```

use crate::{
    config::Locals,
    content::{ContentTree, Leaf},
    environment::Environment,
    error::ContentError,
    log,
    logger::ProgressBars,
    templates::TemplateMap,
};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::{
    fmt,
    fs::{self, File},
    io::{self, Read, Write},
    path::Path,
    sync::Arc,
};

/// Signature shared by every view.
pub type ViewFn =
    Arc<dyn Fn(&RenderScope<'_>, &Leaf) -> anyhow::Result<Option<Rendered>> + Send + Sync>;

/// Views addressable by name.
pub type ViewMap = FxHashMap<String, ViewFn>;

/// How a leaf renders: directly, or through a registered view.
#[derive(Clone)]
pub enum View {
    Named(String),
    Func(ViewFn),
}

impl View {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn func<F>(view: F) -> Self
    where
        F: Fn(&RenderScope<'_>, &Leaf) -> anyhow::Result<Option<Rendered>> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(view))
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Output of a view.
pub enum Rendered {
    Buffer(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl Rendered {
    /// Collect into memory, draining a stream.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Buffer(buffer) => Ok(buffer),
            Self::Stream(mut stream) => {
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

impl From<Vec<u8>> for Rendered {
    fn from(buffer: Vec<u8>) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<String> for Rendered {
    fn from(text: String) -> Self {
        Self::Buffer(text.into_bytes())
    }
}

/// Everything a view can see besides its own leaf.
///
/// `locals` are the user locals; the environment and the content tree are
/// reachable as `env` and `contents`.
pub struct RenderScope<'a> {
    pub env: &'a Environment,
    pub views: &'a ViewMap,
    pub locals: &'a Locals,
    pub contents: &'a ContentTree,
    pub templates: &'a TemplateMap,
}

/// Resolve and invoke a leaf's view, returning its output unchanged.
pub fn render_view(scope: &RenderScope<'_>, leaf: &Leaf) -> Result<Option<Rendered>, ContentError> {
    let view = match leaf.view() {
        View::Func(view) => view,
        View::Named(name) => scope
            .views
            .get(&name)
            .cloned()
            .ok_or(ContentError::UnknownView(name))?,
    };

    view(scope, leaf).map_err(|source| ContentError::View {
        filename: leaf.filename(),
        source,
    })
}

/// Render every leaf of `scope.contents` into `output`.
///
/// Fails fast on the first view or write error.
pub fn render(scope: &RenderScope<'_>, output: &Path) -> Result<(), ContentError> {
    let leaves = scope.contents.leaves();
    log!("render"; "rendering {} leaves to {}", leaves.len(), output.display());

    let progress = ProgressBars::new(&[("render", leaves.len())]);
    let render_one = |leaf: &Arc<Leaf>| {
        let result = render_leaf(scope, leaf, output);
        progress.inc_by_name("render");
        result
    };

    let result = if scope.env.config().build.parallel {
        leaves.par_iter().try_for_each(render_one)
    } else {
        leaves.iter().try_for_each(render_one)
    };
    progress.finish();
    result
}

fn render_leaf(scope: &RenderScope<'_>, leaf: &Leaf, output: &Path) -> Result<(), ContentError> {
    match render_view(scope, leaf)? {
        Some(rendered) => {
            let destination = output.join(leaf.filename().trim_start_matches(['/', '\\']));
            write_rendered(&destination, rendered)
                .map_err(|err| ContentError::Io(destination, err))
        }
        None => {
            log!("render"; "skipping {}", leaf.url());
            Ok(())
        }
    }
}

fn write_rendered(destination: &Path, rendered: Rendered) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(destination)?;
    match rendered {
        Rendered::Buffer(buffer) => file.write_all(&buffer),
        Rendered::Stream(mut stream) => io::copy(&mut stream, &mut file).map(|_| ()),
    }
}
