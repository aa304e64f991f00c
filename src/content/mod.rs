//! Content model: file paths, leaves and the branch/leaf tree.
//!
//! # Architecture
//!
//! ```text
//! contents/                    ContentTree (arena)
//! ├── index.md        ──►      root ─┬─ index.md   Leaf  (group: pages)
//! ├── style.css                      ├─ style.css  Leaf  (group: files)
//! └── posts/                         └─ posts      Branch (group: directories)
//!     └── hello.md                        └─ hello.md Leaf
//! ```
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Leaves are
//! shared `Arc<Leaf>` values, so merging one tree into another installs the
//! same leaf instance in both without copying it.

mod inspect;
mod leaf;
mod scan;
mod tree;

pub use leaf::{Content, Leaf, LeafSource, resolve_url};
pub use tree::{Branch, ContentTree, DIRECTORIES, FILES, LeafNode, Node, NodeId};

use std::path::{Component, Path, PathBuf};

/// A source file, located both absolutely and relative to its content root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    pub full: PathBuf,
    pub relative: PathBuf,
}

impl FilePath {
    /// Build from an absolute path below `root`.
    pub fn new(root: &Path, full: PathBuf) -> Self {
        let relative = full.strip_prefix(root).unwrap_or(&full).to_path_buf();
        Self { full, relative }
    }

    /// Relative path with `/` separators on every platform.
    pub fn relative_str(&self) -> String {
        self.relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Final path component, used as the node key.
    pub fn name(&self) -> String {
        self.full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
