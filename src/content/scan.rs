//! Building a content tree from a directory.
//!
//! Sibling entries are resolved in parallel on the current rayon pool. Each
//! directory's entries are sorted by name first and collected in that order,
//! so children are always inserted lexicographically regardless of which
//! worker finishes first.

use super::{ContentTree, FilePath, Leaf, NodeId};
use crate::{environment::Environment, error::ContentError};
use rayon::prelude::*;
use std::{fs, path::Path, sync::Arc};

/// Result of scanning one directory entry, before it is attached.
enum Scanned {
    Directory { name: String, entries: Vec<Scanned> },
    File { name: String, leaf: Arc<Leaf> },
}

impl ContentTree {
    /// Resolve every non-ignored file below `dir` into a tree.
    ///
    /// Fails on the first unreadable directory or plugin factory error.
    pub fn from_directory(env: &Environment, dir: &Path) -> Result<Self, ContentError> {
        let entries = scan_dir(env, dir, dir)?;
        let mut tree = Self::new(env.content_groups());
        let root = tree.root();
        attach(&mut tree, root, entries)?;
        Ok(tree)
    }
}

fn scan_dir(env: &Environment, root: &Path, dir: &Path) -> Result<Vec<Scanned>, ContentError> {
    let mut paths = fs::read_dir(dir)
        .map_err(|err| ContentError::Io(dir.to_path_buf(), err))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ContentError::Io(dir.to_path_buf(), err))?;
    paths.sort();

    let scanned: Vec<Option<Scanned>> = paths
        .into_par_iter()
        .map(|full| {
            let path = FilePath::new(root, full);
            if env.is_ignored(&path) {
                return Ok(None);
            }
            scan_entry(env, root, path).map(Some)
        })
        .collect::<Result<_, ContentError>>()?;

    Ok(scanned.into_iter().flatten().collect())
}

fn scan_entry(env: &Environment, root: &Path, path: FilePath) -> Result<Scanned, ContentError> {
    // follows symlinks
    let metadata =
        fs::metadata(&path.full).map_err(|err| ContentError::Io(path.full.clone(), err))?;

    if metadata.is_dir() {
        Ok(Scanned::Directory {
            name: path.name(),
            entries: scan_dir(env, root, &path.full)?,
        })
    } else {
        let registry = env.registry();
        let leaf = registry.instantiate(&path, registry.resolve(&path), env.base_url())?;
        Ok(Scanned::File {
            name: path.name(),
            leaf,
        })
    }
}

fn attach(tree: &mut ContentTree, parent: NodeId, entries: Vec<Scanned>) -> Result<(), ContentError> {
    for entry in entries {
        match entry {
            Scanned::Directory { name, entries } => {
                let branch = tree.add_branch(parent, &name)?;
                attach(tree, branch, entries)?;
            }
            Scanned::File { name, leaf } => {
                tree.add_leaf(parent, &name, leaf)?;
            }
        }
    }
    Ok(())
}
