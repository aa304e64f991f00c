//! Fallback plugin: copies the source file to the output unchanged.

use super::{ContentPlugin, PluginDef, Registration};
use crate::{
    content::{Content, FilePath, Leaf},
    render::{RenderScope, Rendered, View},
};
use anyhow::{Context, Result};
use std::{any::Any, fs::File, sync::Arc};

pub struct StaticFilePlugin;

impl StaticFilePlugin {
    pub const NAME: &'static str = "StaticFile";

    /// Fallback registration; never added to the registry's list.
    pub(super) fn registration() -> Registration {
        Registration {
            def: PluginDef {
                name: Self::NAME.to_owned(),
                group: crate::content::FILES.to_owned(),
                pattern: None,
            },
            plugin: Arc::new(Self),
        }
    }
}

impl ContentPlugin for StaticFilePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn from_file(&self, path: &FilePath) -> Result<Box<dyn Content>> {
        Ok(Box::new(StaticFile { path: path.clone() }))
    }
}

#[derive(Debug)]
pub struct StaticFile {
    path: FilePath,
}

impl StaticFile {
    pub fn path(&self) -> &FilePath {
        &self.path
    }
}

impl Content for StaticFile {
    fn filename(&self) -> String {
        self.path.relative_str()
    }

    fn view(&self) -> View {
        View::func(stream_file)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn stream_file(_: &RenderScope<'_>, leaf: &Leaf) -> Result<Option<Rendered>> {
    let file = leaf
        .downcast::<StaticFile>()
        .context("static view used on a non-static leaf")?;
    let source = File::open(&file.path.full)
        .with_context(|| format!("Failed to open {}", file.path.full.display()))?;
    Ok(Some(Rendered::Stream(Box::new(source))))
}
