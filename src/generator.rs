//! Generators: functions producing content not backed by a source file.
//!
//! A generator receives the current tree by shared reference and returns a
//! [`GeneratedTree`] holding only additions. The runner stamps every
//! returned content into a fresh [`ContentTree`] which callers merge.
//!
//! ```text
//! base tree ──┬── feed(env, &base)    ──► GeneratedTree ──► ContentTree ┐
//!             └── sitemap(env, &base) ──► GeneratedTree ──► ContentTree ┴─ merge (in order) ──► output
//! ```

use crate::{
    content::{Content, ContentTree, Leaf, LeafSource, NodeId},
    environment::Environment,
    error::ContentError,
    log,
    plugin::PluginDef,
};
use rayon::prelude::*;
use std::{collections::BTreeMap, sync::Arc};

pub type GeneratorFn =
    Arc<dyn Fn(&Environment, &ContentTree) -> anyhow::Result<GeneratedTree> + Send + Sync>;

#[derive(Clone)]
pub struct GeneratorDef {
    pub name: String,
    pub group: String,
    pub func: GeneratorFn,
}

impl GeneratorDef {
    fn plugin(&self) -> PluginDef {
        PluginDef {
            name: self.name.clone(),
            group: self.group.clone(),
            pattern: None,
        }
    }
}

/// Shape returned by a generator: keys map to content or nested directories.
///
/// A key holds either content or a directory, never both.
#[derive(Default)]
pub struct GeneratedTree {
    contents: BTreeMap<String, Box<dyn Content>>,
    directories: BTreeMap<String, GeneratedTree>,
}

impl GeneratedTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_content(&mut self, key: &str, content: impl Content + 'static) -> &mut Self {
        self.directories.remove(key);
        self.contents.insert(key.to_owned(), Box::new(content));
        self
    }

    /// Directory under `key`, created if missing or if `key` held content.
    pub fn insert_directory(&mut self, key: &str) -> &mut GeneratedTree {
        self.contents.remove(key);
        self.directories.entry(key.to_owned()).or_default()
    }

    pub fn len(&self) -> usize {
        self.contents.len() + self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty() && self.directories.is_empty()
    }
}

/// Run one generator against `tree` and stamp its output.
pub fn run_generator(
    env: &Environment,
    tree: &ContentTree,
    def: &GeneratorDef,
) -> Result<ContentTree, ContentError> {
    let generated = (def.func)(env, tree).map_err(|source| ContentError::Generator {
        name: def.name.clone(),
        source,
    })?;

    let plugin = def.plugin();
    let mut output = ContentTree::new(env.content_groups());
    let root = output.root();
    attach(env, &mut output, root, generated, &plugin)?;
    log!("content"; "generator `{}` produced {} leaves", def.name, output.leaves().len());
    Ok(output)
}

fn attach(
    env: &Environment,
    output: &mut ContentTree,
    parent: NodeId,
    generated: GeneratedTree,
    plugin: &PluginDef,
) -> Result<(), ContentError> {
    for (key, content) in generated.contents {
        let leaf = Leaf::new(
            content,
            plugin.clone(),
            LeafSource::Generated,
            Arc::clone(env.base_url()),
        );
        output.add_leaf(parent, &key, Arc::new(leaf))?;
    }
    for (key, sub) in generated.directories {
        let branch = output.add_branch(parent, &key)?;
        attach(env, output, branch, sub, plugin)?;
    }
    Ok(())
}

/// Run every registered generator against the same base tree and merge the
/// outputs in registration order. Later keys overwrite earlier ones.
pub fn run_generators(env: &Environment, tree: &ContentTree) -> Result<ContentTree, ContentError> {
    let outputs = env
        .generators()
        .par_iter()
        .map(|def| run_generator(env, tree, def))
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = ContentTree::new(env.content_groups());
    for output in &outputs {
        merged.merge(Some(output));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        test_support::{FakeContent, fake_leaf, groups},
    };

    fn base() -> ContentTree {
        let mut tree = ContentTree::new(groups(&[]));
        let root = tree.root();
        tree.add_leaf(root, "a.md", fake_leaf("a.html", "pages")).unwrap();
        tree.add_leaf(root, "b.md", fake_leaf("b.html", "pages")).unwrap();
        tree
    }

    #[test]
    fn test_run_generator_stamps_leaves() {
        let mut env = Environment::new(SiteConfig::default());
        env.register_generator("feed", "feeds", |_, tree| {
            let mut out = GeneratedTree::new();
            out.insert_directory("feeds")
                .insert_content("all.xml", FakeContent::new("feeds/all.xml"));
            out.insert_content("count.txt", FakeContent::new(&tree.leaves().len().to_string()));
            Ok(out)
        });

        let output = run_generator(&env, &base(), &env.generators()[0]).unwrap();
        let feeds = output.lookup("feeds").unwrap();
        let id = output.lookup("feeds/all.xml").unwrap();
        let leaf = output.leaf(id).unwrap();

        assert_eq!(leaf.source(), &LeafSource::Generated);
        assert_eq!(leaf.plugin().name, "feed");
        assert_eq!(leaf.plugin().group, "feeds");
        assert_eq!(leaf.plugin().pattern, None);
        assert_eq!(output.group(feeds, "feeds"), &[id]);
        assert_eq!(output.parent(id), Some(feeds));

        let count = output.leaf(output.lookup("count.txt").unwrap()).unwrap();
        assert_eq!(count.filename(), "2");
    }

    #[test]
    fn test_generators_see_pristine_base() {
        let mut env = Environment::new(SiteConfig::default());
        for name in ["first", "second"] {
            env.register_generator(name, "extra", move |_, tree| {
                let mut out = GeneratedTree::new();
                let seen = tree.leaves().len().to_string();
                out.insert_content(&format!("{name}.txt"), FakeContent::new(&seen));
                Ok(out)
            });
        }

        let merged = run_generators(&env, &base()).unwrap();
        for key in ["first.txt", "second.txt"] {
            let leaf = merged.leaf(merged.lookup(key).unwrap()).unwrap();
            assert_eq!(leaf.filename(), "2");
        }
    }

    #[test]
    fn test_later_generator_wins_on_collision() {
        let mut env = Environment::new(SiteConfig::default());
        for name in ["first", "second"] {
            env.register_generator(name, "extra", move |_, _| {
                let mut out = GeneratedTree::new();
                out.insert_content("same.txt", FakeContent::new(name));
                Ok(out)
            });
        }

        let merged = run_generators(&env, &base()).unwrap();
        let leaf = merged.leaf(merged.lookup("same.txt").unwrap()).unwrap();
        assert_eq!(leaf.plugin().name, "second");
        assert_eq!(merged.group(merged.root(), "extra").len(), 1);
    }

    #[test]
    fn test_generator_error_is_named() {
        let mut env = Environment::new(SiteConfig::default());
        env.register_generator("broken", "extra", |_, _| anyhow::bail!("no data"));

        let err = run_generators(&env, &base()).unwrap_err();
        assert!(matches!(err, ContentError::Generator { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_insert_directory_reuses_existing() {
        let mut tree = GeneratedTree::new();
        tree.insert_directory("a").insert_content("x", FakeContent::new("x"));
        tree.insert_directory("a").insert_content("y", FakeContent::new("y"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_key_holds_content_or_directory() {
        let mut tree = GeneratedTree::new();
        tree.insert_content("a", FakeContent::new("a"));
        tree.insert_directory("a").insert_content("x", FakeContent::new("x"));
        assert_eq!(tree.len(), 1);
        assert!(tree.contents.is_empty());

        tree.insert_content("a", FakeContent::new("a"));
        assert_eq!(tree.len(), 1);
        assert!(tree.directories.is_empty());
    }
}
