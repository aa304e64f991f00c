//! Arena-backed content tree.
//!
//! Branches own an ordered list of child ids plus a name → position index,
//! and a group index bucketing children by kind. Parents are stored as ids,
//! so there are no reference cycles to manage.

use super::Leaf;
use crate::{error::ContentError, log};
use rustc_hash::FxHashMap;
use std::{collections::BTreeMap, sync::Arc};

/// Reserved group holding every branch child.
pub const DIRECTORIES: &str = "directories";
/// Reserved default leaf group.
pub const FILES: &str = "files";

/// Stable handle to a node inside one [`ContentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum Node {
    Branch(Branch),
    Leaf(LeafNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(branch) => &branch.name,
            Self::Leaf(leaf) => &leaf.name,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Branch(branch) => branch.parent,
            Self::Leaf(leaf) => Some(leaf.parent),
        }
    }

    pub const fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }
}

/// A directory or synthetic grouping node.
#[derive(Debug, Clone)]
pub struct Branch {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    positions: FxHashMap<String, usize>,
    groups: BTreeMap<String, Vec<NodeId>>,
    group_names: Arc<[String]>,
}

impl Branch {
    fn new(name: &str, parent: Option<NodeId>, group_names: Arc<[String]>) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(DIRECTORIES.to_owned(), Vec::new());
        groups.insert(FILES.to_owned(), Vec::new());
        for group in group_names.iter() {
            groups.entry(group.clone()).or_insert_with(Vec::new);
        }

        Self {
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            positions: FxHashMap::default(),
            groups,
            group_names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Group names declared when the branch was created.
    pub fn group_names(&self) -> &Arc<[String]> {
        &self.group_names
    }

    /// Every group list, including lazily created ones.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.groups
            .iter()
            .map(|(name, members)| (name.as_str(), members.as_slice()))
    }
}

#[derive(Debug, Clone)]
pub struct LeafNode {
    name: String,
    parent: NodeId,
    leaf: Arc<Leaf>,
}

impl LeafNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn leaf(&self) -> &Arc<Leaf> {
        &self.leaf
    }
}

/// Site content as a tree of branches and leaves. The root is always a branch.
#[derive(Debug, Clone)]
pub struct ContentTree {
    nodes: Vec<Node>,
}

impl ContentTree {
    /// Empty tree whose root declares `group_names`.
    pub fn new(group_names: Arc<[String]>) -> Self {
        Self {
            nodes: vec![Node::Branch(Branch::new("", None, group_names))],
        }
    }

    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn branch(&self, id: NodeId) -> Option<&Branch> {
        match self.get(id) {
            Some(Node::Branch(branch)) => Some(branch),
            _ => None,
        }
    }

    pub fn leaf(&self, id: NodeId) -> Option<&Arc<Leaf>> {
        match self.get(id) {
            Some(Node::Leaf(node)) => Some(&node.leaf),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    /// Child of `branch` stored under `name`.
    pub fn child(&self, branch: NodeId, name: &str) -> Option<NodeId> {
        let branch = self.branch(branch)?;
        branch
            .positions
            .get(name)
            .map(|&position| branch.children[position])
    }

    /// Walk a `/`-separated path from the root.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root(), |node, part| self.child(node, part))
    }

    /// Members of a group list; empty if the group was never populated.
    pub fn group(&self, branch: NodeId, group: &str) -> &[NodeId] {
        self.branch(branch)
            .and_then(|branch| branch.groups.get(group))
            .map_or(&[], Vec::as_slice)
    }

    /// First child whose key starts with `index.`, in child order.
    pub fn index(&self, branch: NodeId) -> Option<NodeId> {
        self.branch(branch)?
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].name().starts_with("index."))
    }

    /// Attach an empty branch inheriting the parent's declared groups.
    pub fn add_branch(&mut self, parent: NodeId, name: &str) -> Result<NodeId, ContentError> {
        let group_names = self
            .branch(parent)
            .map(|branch| Arc::clone(&branch.group_names))
            .ok_or_else(|| not_a_branch(parent))?;
        self.add_branch_with_groups(parent, name, group_names)
    }

    fn add_branch_with_groups(
        &mut self,
        parent: NodeId,
        name: &str,
        group_names: Arc<[String]>,
    ) -> Result<NodeId, ContentError> {
        let node = Node::Branch(Branch::new(name, Some(parent), group_names));
        self.insert(parent, name, node, DIRECTORIES)
    }

    /// Attach a leaf, filing it under its plugin group.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        name: &str,
        leaf: Arc<Leaf>,
    ) -> Result<NodeId, ContentError> {
        let group = leaf.plugin().group.clone();
        let node = Node::Leaf(LeafNode {
            name: name.to_owned(),
            parent,
            leaf,
        });
        self.insert(parent, name, node, &group)
    }

    /// Insert `node` under `name`, displacing any previous child with that key.
    ///
    /// A displaced node is removed from every group list of the parent, so a
    /// key never has more than one group entry.
    fn insert(
        &mut self,
        parent: NodeId,
        name: &str,
        node: Node,
        group: &str,
    ) -> Result<NodeId, ContentError> {
        let id = NodeId(self.nodes.len());
        let Some(Node::Branch(branch)) = self.nodes.get_mut(parent.0) else {
            return Err(not_a_branch(parent));
        };

        match branch.positions.get(name) {
            Some(&position) => {
                let displaced = std::mem::replace(&mut branch.children[position], id);
                for members in branch.groups.values_mut() {
                    members.retain(|&member| member != displaced);
                }
            }
            None => {
                branch.positions.insert(name.to_owned(), branch.children.len());
                branch.children.push(id);
            }
        }
        branch.groups.entry(group.to_owned()).or_default().push(id);

        self.nodes.push(node);
        Ok(id)
    }

    /// Every leaf below `id`, depth first in child order.
    pub fn flatten(&self, id: NodeId) -> Vec<Arc<Leaf>> {
        let mut leaves = Vec::new();
        self.collect_leaves(id, &mut leaves);
        leaves
    }

    /// Concatenation of [`flatten`](Self::flatten) over `ids`, in order.
    pub fn flatten_all(&self, ids: &[NodeId]) -> Vec<Arc<Leaf>> {
        let mut leaves = Vec::new();
        for &id in ids {
            self.collect_leaves(id, &mut leaves);
        }
        leaves
    }

    /// Every leaf reachable from the root.
    pub fn leaves(&self) -> Vec<Arc<Leaf>> {
        self.flatten(self.root())
    }

    fn collect_leaves(&self, id: NodeId, leaves: &mut Vec<Arc<Leaf>>) {
        match self.get(id) {
            Some(Node::Leaf(node)) => leaves.push(Arc::clone(&node.leaf)),
            Some(Node::Branch(branch)) => {
                for &child in &branch.children {
                    self.collect_leaves(child, leaves);
                }
            }
            None => {}
        }
    }

    /// Number of branches below `id`, excluding `id` itself.
    pub fn branch_count(&self, id: NodeId) -> usize {
        self.branch(id).map_or(0, |branch| {
            branch
                .children
                .iter()
                .filter(|&&child| self.nodes[child.0].is_branch())
                .map(|&child| 1 + self.branch_count(child))
                .sum()
        })
    }

    /// Merge `source`'s root into this tree's root. `None` is a no-op.
    pub fn merge(&mut self, source: Option<&ContentTree>) {
        if let Some(source) = source {
            self.merge_into(self.root(), source, source.root());
        }
    }

    /// Merge the branch `from` of `source` into the branch `target` of `self`.
    ///
    /// Leaves are installed by reference and win over existing keys. Branches
    /// are reused when present and created otherwise. `source` is untouched.
    /// Structural problems are logged and the offending entry is skipped.
    pub fn merge_into(&mut self, target: NodeId, source: &ContentTree, from: NodeId) {
        let Some(branch) = source.branch(from) else {
            log!("error"; "{}", not_a_branch(from));
            return;
        };

        for &child in &branch.children {
            let result = match source.get(child) {
                Some(Node::Leaf(node)) => self
                    .add_leaf(target, &node.name, Arc::clone(&node.leaf))
                    .map(|_| ()),
                Some(Node::Branch(sub)) => {
                    let existing = self
                        .child(target, &sub.name)
                        .filter(|&id| self.nodes[id.0].is_branch());
                    let next = match existing {
                        Some(id) => Ok(id),
                        None => self.add_branch_with_groups(
                            target,
                            &sub.name,
                            Arc::clone(&sub.group_names),
                        ),
                    };
                    next.map(|next| self.merge_into(next, source, child))
                }
                None => Err(ContentError::Structural(format!(
                    "`{}` lists missing node {child:?}",
                    branch.name
                ))),
            };

            if let Err(err) = result {
                log!("error"; "merge skipped an entry: {err}");
            }
        }
    }
}

fn not_a_branch(id: NodeId) -> ContentError {
    ContentError::Structural(format!("node {id:?} is not a branch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_leaf, groups};

    fn sample() -> ContentTree {
        let mut tree = ContentTree::new(groups(&["pages"]));
        let root = tree.root();
        tree.add_leaf(root, "index.md", fake_leaf("index.html", "pages"))
            .unwrap();
        let posts = tree.add_branch(root, "posts").unwrap();
        tree.add_leaf(posts, "a.md", fake_leaf("posts/a.html", "pages"))
            .unwrap();
        tree.add_leaf(posts, "b.css", fake_leaf("posts/b.css", FILES))
            .unwrap();
        tree
    }

    #[test]
    fn test_new_branch_declares_groups() {
        let tree = ContentTree::new(groups(&["pages", "feeds"]));
        let names: Vec<_> = tree.branch(tree.root()).unwrap().groups().map(|(name, _)| name).collect();
        assert_eq!(names, vec![DIRECTORIES, "feeds", FILES, "pages"]);
    }

    #[test]
    fn test_parent_and_groups() {
        let tree = sample();
        let posts = tree.lookup("posts").unwrap();
        let a = tree.lookup("posts/a.md").unwrap();

        assert_eq!(tree.parent(a), Some(posts));
        assert_eq!(tree.parent(posts), Some(tree.root()));
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.group(tree.root(), DIRECTORIES), &[posts]);
        assert_eq!(tree.group(posts, "pages"), &[a]);
        assert_eq!(tree.group(posts, FILES).len(), 1);
        assert!(tree.group(posts, "unknown").is_empty());
    }

    #[test]
    fn test_lazy_group_creation() {
        let mut tree = ContentTree::new(groups(&[]));
        let root = tree.root();
        let id = tree.add_leaf(root, "feed.xml", fake_leaf("feed.xml", "feeds")).unwrap();
        assert_eq!(tree.group(root, "feeds"), &[id]);
    }

    #[test]
    fn test_index_lookup_uses_prefix() {
        let mut tree = ContentTree::new(groups(&[]));
        let root = tree.root();
        tree.add_leaf(root, "test.html", fake_leaf("test.html", FILES)).unwrap();
        let index = tree.add_leaf(root, "index.html", fake_leaf("index.html", FILES)).unwrap();
        tree.add_leaf(root, "index.json", fake_leaf("index.json", FILES)).unwrap();

        assert_eq!(tree.index(root), Some(index));
    }

    #[test]
    fn test_index_absent() {
        let tree = sample();
        assert_eq!(tree.index(tree.lookup("posts").unwrap()), None);
    }

    #[test]
    fn test_flatten_depth_first() {
        let tree = sample();
        let files: Vec<_> = tree.leaves().iter().map(|leaf| leaf.filename()).collect();
        assert_eq!(files, vec!["index.html", "posts/a.html", "posts/b.css"]);

        // repeatable, no side effects
        assert_eq!(tree.leaves().len(), 3);
    }

    #[test]
    fn test_flatten_all_concatenates_in_order() {
        let tree = sample();
        let posts = tree.lookup("posts").unwrap();
        let index = tree.lookup("index.md").unwrap();
        let files: Vec<_> = tree
            .flatten_all(&[posts, index])
            .iter()
            .map(|leaf| leaf.filename())
            .collect();
        assert_eq!(files, vec!["posts/a.html", "posts/b.css", "index.html"]);
    }

    #[test]
    fn test_branch_count() {
        let mut tree = sample();
        let posts = tree.lookup("posts").unwrap();
        tree.add_branch(posts, "drafts").unwrap();
        assert_eq!(tree.branch_count(tree.root()), 2);
        assert_eq!(tree.branch_count(posts), 1);
    }

    #[test]
    fn test_add_to_leaf_is_structural_error() {
        let mut tree = sample();
        let leaf = tree.lookup("index.md").unwrap();
        assert!(matches!(
            tree.add_branch(leaf, "nested"),
            Err(ContentError::Structural(_))
        ));
    }

    #[test]
    fn test_merge_none_is_noop() {
        let mut tree = sample();
        tree.merge(None);
        assert_eq!(tree.leaves().len(), 3);
    }

    #[test]
    fn test_merge_leaves_source_untouched() {
        let mut target = sample();
        let source = sample();
        let before: Vec<_> = (0..source.nodes.len())
            .map(|i| {
                let id = NodeId(i);
                (source.get(id).unwrap().name().to_owned(), source.parent(id))
            })
            .collect();

        target.merge(Some(&source));

        let after: Vec<_> = (0..source.nodes.len())
            .map(|i| {
                let id = NodeId(i);
                (source.get(id).unwrap().name().to_owned(), source.parent(id))
            })
            .collect();
        assert_eq!(before, after);
        assert_eq!(source.group(source.lookup("posts").unwrap(), "pages").len(), 1);

        // every source leaf is installed by reference
        for path in ["index.md", "posts/a.md", "posts/b.css"] {
            let merged = target.leaf(target.lookup(path).unwrap()).unwrap();
            let original = source.leaf(source.lookup(path).unwrap()).unwrap();
            assert!(Arc::ptr_eq(merged, original));
        }
    }

    #[test]
    fn test_merge_source_leaf_wins() {
        let mut target = sample();
        let mut source = ContentTree::new(groups(&["pages"]));
        let posts = source.add_branch(source.root(), "posts").unwrap();
        let replacement = fake_leaf("posts/a-v2.html", "pages");
        source.add_leaf(posts, "a.md", Arc::clone(&replacement)).unwrap();

        target.merge(Some(&source));

        let target_posts = target.lookup("posts").unwrap();
        let merged = target.lookup("posts/a.md").unwrap();
        assert!(Arc::ptr_eq(target.leaf(merged).unwrap(), &replacement));
        assert_eq!(target.group(target_posts, "pages"), &[merged]);
        assert_eq!(target.parent(merged), Some(target_posts));
        // the existing branch was reused
        assert_eq!(target.group(target.root(), DIRECTORIES), &[target_posts]);
    }

    #[test]
    fn test_merge_creates_missing_branches() {
        let mut target = ContentTree::new(groups(&[]));
        let source = sample();
        target.merge(Some(&source));

        let posts = target.lookup("posts").unwrap();
        assert_eq!(target.group(target.root(), DIRECTORIES), &[posts]);
        let declared: &[String] = target.branch(posts).unwrap().group_names();
        assert_eq!(declared, ["pages"]);
        assert_eq!(target.leaves().len(), 3);
    }

    #[test]
    fn test_repeated_merge_does_not_duplicate_group_members() {
        let mut target = ContentTree::new(groups(&["pages"]));
        let source = sample();
        target.merge(Some(&source));
        target.merge(Some(&source));

        let posts = target.lookup("posts").unwrap();
        assert_eq!(target.group(posts, "pages").len(), 1);
        assert_eq!(target.group(target.root(), DIRECTORIES).len(), 1);
        assert_eq!(target.leaves().len(), 3);
    }
}
