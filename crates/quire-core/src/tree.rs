//! Reply-tree assembly.
//!
//! [`assemble`] turns a flat, creation-ordered list of comments into a
//! [`Forest`] of root nodes carrying nested replies. Comments that cannot be
//! placed (dangling parent, cycle, duplicate id, or a descendant of any of
//! those) are kept out of the tree and listed in [`Forest::orphans`].
//!
//! Reply chains can be arbitrarily long, so build, walk, clamp, and drop are
//! all iterative.

use serde::Serialize;
use std::collections::HashMap;
use std::mem;

use crate::model::comment::{Comment, CommentId};

/// A comment with its direct replies, in input order.
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    #[must_use]
    pub const fn new(comment: Comment) -> Self {
        Self {
            comment,
            replies: Vec::new(),
        }
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Assembled comment tree of one post.
#[derive(Debug, Default)]
pub struct Forest {
    pub roots: Vec<CommentNode>,
    /// Comments present in the input but unreachable from any root.
    pub orphans: Vec<CommentId>,
}

/// Nest `comments` into a forest.
///
/// Pass one indexes ids to input slots; pass two attaches each comment to
/// the root list or to its parent's reply list. Sibling order follows input
/// order. When an id appears twice only its first occurrence is placed.
#[must_use]
pub fn assemble(comments: &[Comment]) -> Forest {
    let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(comments.len());
    for (slot, comment) in comments.iter().enumerate() {
        index.entry(comment.id).or_insert(slot);
    }

    let mut root_slots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    for (slot, comment) in comments.iter().enumerate() {
        if index.get(&comment.id) != Some(&slot) {
            continue;
        }
        match comment.parent_id {
            None => root_slots.push(slot),
            Some(parent) => match index.get(&parent) {
                Some(&parent_slot) if parent_slot != slot => children[parent_slot].push(slot),
                _ => {}
            },
        }
    }

    // Post-order over an explicit stack: a node is materialized once all of
    // its replies have been.
    let mut reached = vec![false; comments.len()];
    let mut built: Vec<Option<CommentNode>> = Vec::with_capacity(comments.len());
    built.resize_with(comments.len(), || None);
    let mut roots = Vec::with_capacity(root_slots.len());

    for &root in &root_slots {
        let mut stack = vec![(root, false)];
        while let Some((slot, expanded)) = stack.pop() {
            if expanded {
                let mut node = CommentNode::new(comments[slot].clone());
                node.replies = children[slot]
                    .iter()
                    .filter_map(|&child| built[child].take())
                    .collect();
                built[slot] = Some(node);
                continue;
            }
            if mem::replace(&mut reached[slot], true) {
                continue;
            }
            stack.push((slot, true));
            stack.extend(children[slot].iter().rev().map(|&child| (child, false)));
        }
        if let Some(node) = built[root].take() {
            roots.push(node);
        }
    }

    let orphans = comments
        .iter()
        .zip(&reached)
        .filter(|&(_, &placed)| !placed)
        .map(|(comment, _)| comment.id)
        .collect();

    Forest { roots, orphans }
}

impl Forest {
    /// Number of comments placed in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth of the deepest reply. Roots sit at depth 0.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.flatten()
            .into_iter()
            .map(|(depth, _)| depth)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order walk yielding `(depth, comment)`.
    #[must_use]
    pub fn flatten(&self) -> Vec<(usize, &Comment)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &CommentNode)> =
            self.roots.iter().rev().map(|node| (0, node)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, &node.comment));
            stack.extend(node.replies.iter().rev().map(|child| (depth + 1, child)));
        }
        out
    }

    /// Bound reply depth to `limit` (at least 1).
    ///
    /// A reply that would sit deeper is re-hung under its ancestor at depth
    /// `limit - 1`, so the pre-order sequence is unchanged.
    #[must_use]
    pub fn clamp_depth(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        let mut stack: Vec<(&mut CommentNode, usize)> =
            self.roots.iter_mut().map(|node| (node, 0)).collect();
        while let Some((node, depth)) = stack.pop() {
            if depth + 1 >= limit {
                let replies = mem::take(&mut node.replies);
                node.replies = preorder(replies);
            } else {
                stack.extend(node.replies.iter_mut().map(|child| (child, depth + 1)));
            }
        }
        self
    }
}

/// Flatten subtrees into a single sibling list in pre-order.
fn preorder(nodes: Vec<CommentNode>) -> Vec<CommentNode> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut stack: Vec<CommentNode> = nodes.into_iter().rev().collect();
    while let Some(mut node) = stack.pop() {
        let replies = mem::take(&mut node.replies);
        stack.extend(replies.into_iter().rev());
        out.push(node);
    }
    out
}
