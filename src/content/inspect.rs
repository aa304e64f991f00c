//! Human-readable tree listing.
//!
//! ```text
//! index.md (url: /index.html, plugin: Page)
//! posts/
//!   hello.md (url: /posts/hello.html, plugin: Page)
//! ```

use super::{ContentTree, Leaf, Node, NodeId};
use crate::error::ContentError;
use colored::{Color, Colorize};
use std::fmt::Write;

impl ContentTree {
    /// Sorted, indented listing of everything below `id`.
    ///
    /// Leaves come before branches, each sorted by key. Fails if a leaf
    /// declares an unknown color.
    pub fn inspect(&self, id: NodeId) -> Result<String, ContentError> {
        let mut out = String::new();
        self.inspect_into(id, 0, &mut out)?;
        Ok(out)
    }

    fn inspect_into(&self, id: NodeId, depth: usize, out: &mut String) -> Result<(), ContentError> {
        let Some(branch) = self.branch(id) else {
            if let Some(Node::Leaf(node)) = self.get(id) {
                write_leaf(out, depth, node.name(), node.leaf())?;
            }
            return Ok(());
        };

        let mut children: Vec<(&Node, NodeId)> = branch
            .children()
            .iter()
            .filter_map(|&child| self.get(child).map(|node| (node, child)))
            .collect();
        children.sort_by(|(a, _), (b, _)| {
            a.is_branch()
                .cmp(&b.is_branch())
                .then_with(|| a.name().cmp(b.name()))
        });

        for (node, child) in children {
            match node {
                Node::Leaf(leaf) => write_leaf(out, depth, leaf.name(), leaf.leaf())?,
                Node::Branch(sub) => {
                    let label = format!("{}/", sub.name());
                    let _ = writeln!(out, "{}{}", indent(depth), label.as_str().bold());
                    self.inspect_into(child, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }
}

fn write_leaf(out: &mut String, depth: usize, name: &str, leaf: &Leaf) -> Result<(), ContentError> {
    let color = known_color(leaf.color()).ok_or_else(|| ContentError::UnknownColor {
        color: leaf.color().to_owned(),
        plugin: leaf.plugin().name.clone(),
    })?;
    let info = format!("({})", leaf.info());
    let _ = writeln!(out, "{}{} {}", indent(depth), name.color(color), info.as_str().dimmed());
    Ok(())
}

fn known_color(tag: &str) -> Option<Color> {
    Some(match tag {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "grey" | "gray" => Color::BrightBlack,
        _ => return None,
    })
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
