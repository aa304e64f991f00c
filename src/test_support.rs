//! Shared fixtures for unit tests.

use crate::{
    config::SiteConfig,
    content::{Content, FilePath, Leaf, LeafSource},
    plugin::{ContentPlugin, PluginDef},
    render::{Rendered, View},
};
use std::{any::Any, fs, path::Path, sync::Arc};

/// Content whose default view returns `body`.
#[derive(Debug, Clone)]
pub struct FakeContent {
    pub filename: String,
    pub body: String,
    pub color: String,
    pub plugin: String,
    view: Option<View>,
}

impl FakeContent {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_owned(),
            body: String::new(),
            color: "cyan".to_owned(),
            plugin: "Fake".to_owned(),
            view: None,
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_owned();
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = color.to_owned();
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.view = Some(view);
        self
    }
}

impl Content for FakeContent {
    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn view(&self) -> View {
        match &self.view {
            Some(view) => view.clone(),
            None => View::func(|_, leaf| {
                let content = leaf
                    .downcast::<FakeContent>()
                    .ok_or_else(|| anyhow::anyhow!("not a fake"))?;
                Ok(Some(Rendered::Buffer(content.body.clone().into_bytes())))
            }),
        }
    }

    fn color(&self) -> &str {
        &self.color
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Catch-all plugin keeping the relative path as filename and the file
/// content as body.
pub struct FakePlugin {
    name: String,
}

impl FakePlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

impl ContentPlugin for FakePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn from_file(&self, path: &FilePath) -> anyhow::Result<Box<dyn Content>> {
        let mut content = FakeContent::new(&path.relative_str());
        content.body = fs::read_to_string(&path.full).unwrap_or_default();
        content.plugin = self.name.clone();
        Ok(Box::new(content))
    }
}

pub struct FailingPlugin;

impl ContentPlugin for FailingPlugin {
    fn name(&self) -> &str {
        "Failing"
    }

    fn from_file(&self, _: &FilePath) -> anyhow::Result<Box<dyn Content>> {
        anyhow::bail!("cannot parse")
    }
}

pub fn groups(names: &[&str]) -> Arc<[String]> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

pub fn fake_leaf(filename: &str, group: &str) -> Arc<Leaf> {
    fake_leaf_with(FakeContent::new(filename), group)
}

pub fn fake_leaf_with(content: FakeContent, group: &str) -> Arc<Leaf> {
    let plugin = PluginDef {
        name: content.plugin.clone(),
        group: group.to_owned(),
        pattern: None,
    };
    Arc::new(Leaf::new(
        Box::new(content),
        plugin,
        LeafSource::Generated,
        Arc::from("/"),
    ))
}

/// Config rooted at `root` with an existing, empty content directory.
pub fn test_config(root: &Path) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.update_path_with_root(root);
    fs::create_dir_all(&config.build.contents).unwrap();
    config
}

/// Write `(relative path, content)` pairs below `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}
