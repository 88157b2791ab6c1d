//! Position resolution: turning a flat integer offset back into a
//! structural address (chain of parents plus an offset) in O(depth).

use super::{ModelError, Node};

#[derive(Debug, Clone)]
struct PathEntry {
    /// The node visited at this depth.
    node: Node,
    /// Child index the resolution descended into (or stopped at).
    index: usize,
    /// Absolute position at which that child begins.
    child_start: usize,
}

/// A position resolved against a specific document root. Exposes the
/// parent chain without the caller ever re-walking the tree.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

/// Resolve `pos` within `doc`'s content coordinates (`0..=content_size`).
///
/// Walks down from the root: at each level the covering child is located
/// through the fragment's cached sizes, descending while the position
/// falls strictly inside a non-text child.
pub(super) fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos, ModelError> {
    if pos > doc.content_size() {
        return Err(ModelError::InvalidPosition {
            pos,
            max: doc.content_size(),
        });
    }
    let mut path = Vec::new();
    let mut start = 0;
    let mut parent_offset = pos;
    let mut node = doc.clone();
    loop {
        let (index, offset) = node.content().find_index(parent_offset)?;
        let rem = parent_offset - offset;
        path.push(PathEntry {
            node: node.clone(),
            index,
            child_start: start + offset,
        });
        if rem == 0 {
            break;
        }
        // rem > 0 means the position falls inside the child at `index`
        let child = node
            .child(index)
            .cloned()
            .ok_or(ModelError::InvalidPosition {
                pos,
                max: doc.content_size(),
            })?;
        if child.is_text() {
            break;
        }
        parent_offset = rem - 1;
        start += offset + 1;
        node = child;
    }
    Ok(ResolvedPos {
        pos,
        path,
        parent_offset,
    })
}

impl ResolvedPos {
    /// The absolute position this was resolved from.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Depth of the deepest node containing the position; the root is 0.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// The ancestor node at `depth`.
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    /// The deepest node containing the position.
    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// Offset of the position within the parent's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Child index the position points at (or into) within the ancestor
    /// at `depth`.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Absolute position where the content of the ancestor at `depth`
    /// starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].child_start + 1
        }
    }

    /// Absolute position where the content of the ancestor at `depth`
    /// ends.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Absolute position directly before the ancestor at `depth`
    /// (undefined for the root).
    pub fn before(&self, depth: usize) -> Option<usize> {
        if depth == 0 {
            None
        } else {
            Some(self.path[depth - 1].child_start)
        }
    }

    /// Absolute position directly after the ancestor at `depth`.
    pub fn after(&self, depth: usize) -> Option<usize> {
        self.before(depth)
            .map(|before| before + self.node(depth).node_size())
    }

    /// When the position falls inside a text node: the character offset
    /// into it. Zero when the position sits on a node boundary.
    pub fn text_offset(&self) -> usize {
        let last = self.path.last().expect("path is never empty");
        self.pos - last.child_start
    }

    /// The node directly after the position, cut open when the position
    /// splits a text node.
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if index == parent.child_count() {
            return None;
        }
        let child = parent.child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut_text(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    /// The node directly before the position, cut open when the position
    /// splits a text node.
    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return parent.child(index).map(|child| child.cut_text(0, offset));
        }
        if index == 0 {
            None
        } else {
            parent.child(index - 1).cloned()
        }
    }

    /// The deepest depth at which the ancestor containing this position
    /// also spans `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && pos <= self.end(depth) {
                return depth;
            }
        }
        0
    }
}
