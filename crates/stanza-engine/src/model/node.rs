//! The node type: one immutable element of the document tree.

use std::fmt;
use std::sync::Arc;

use crate::schema::{NodeType, Schema};

use super::{Attrs, Fragment, MarkSet, ModelError, ResolvedPos, compute_attrs, position};

/// An immutable, typed tree element. Cloning is cheap (shared data);
/// every mutation constructs a new node.
///
/// Invariants, enforced by the validating constructors on [`Schema`] and
/// re-checked whenever [`replace`](Node::replace) rebuilds a node:
///
/// - `content` matches the type's content expression,
/// - a text node carries no content, every other node carries no text,
/// - every child's marks are permitted by this node's mark policy,
/// - `node_size` is the character count for text nodes and
///   `content_size + 2` otherwise.
#[derive(Clone)]
pub struct Node {
    data: Arc<NodeData>,
}

struct NodeData {
    kind: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: MarkSet,
    text: Option<String>,
    /// Cached flattened size of this node.
    size: usize,
}

impl Node {
    fn from_parts(
        kind: NodeType,
        attrs: Attrs,
        content: Fragment,
        marks: MarkSet,
        text: Option<String>,
    ) -> Self {
        let size = match &text {
            Some(text) => text.chars().count(),
            None => content.size() + 2,
        };
        Self {
            data: Arc::new(NodeData {
                kind,
                attrs,
                content,
                marks,
                text,
                size,
            }),
        }
    }

    pub fn kind(&self) -> &NodeType {
        &self.data.kind
    }

    /// The node type's registered name.
    pub fn name(&self) -> &str {
        self.data.kind.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.data.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.attrs.get(name)
    }

    pub fn marks(&self) -> &MarkSet {
        &self.data.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.data.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.data.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.data.kind.is_leaf()
    }

    pub fn content(&self) -> &Fragment {
        &self.data.content
    }

    pub fn child_count(&self) -> usize {
        self.data.content.count()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.data.content.child(index)
    }

    /// Flattened size: character count for text nodes, otherwise
    /// `content_size + 2` for the two boundary tokens.
    pub fn node_size(&self) -> usize {
        self.data.size
    }

    pub fn content_size(&self) -> usize {
        self.data.content.size()
    }

    /// Concatenated text of every text descendant.
    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.data.content.text_content(),
        }
    }

    /// Same type, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.data.kind == other.data.kind
            && self.data.attrs == other.data.attrs
            && self.data.marks == other.data.marks
    }

    /// Resolve a flat position within this node's content into a
    /// structural address. O(depth), not O(size).
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        position::resolve(self, pos)
    }

    /// The node starting directly at `pos`, if any.
    pub fn node_at(&self, pos: usize) -> Result<Option<Node>, ModelError> {
        Ok(self.resolve(pos)?.node_after())
    }

    /// A copy of this node with different content. Not validated; only
    /// the replace machinery and codec builders may call it, and both
    /// validate before the node becomes reachable from a committed root.
    #[must_use]
    pub(crate) fn copy(&self, content: Fragment) -> Node {
        Node::from_parts(
            self.data.kind.clone(),
            self.data.attrs.clone(),
            content,
            self.data.marks.clone(),
            None,
        )
    }

    /// A copy of this node with a different mark set.
    #[must_use]
    pub(crate) fn with_marks(&self, marks: MarkSet) -> Node {
        Node::from_parts(
            self.data.kind.clone(),
            self.data.attrs.clone(),
            self.data.content.clone(),
            marks,
            self.data.text.clone(),
        )
    }

    /// A copy of this node with one attribute changed. Callers validate.
    #[must_use]
    pub(crate) fn with_attrs(&self, attrs: Attrs) -> Node {
        Node::from_parts(
            self.data.kind.clone(),
            attrs,
            self.data.content.clone(),
            self.data.marks.clone(),
            self.data.text.clone(),
        )
    }

    /// A text node carrying different characters but the same markup.
    #[must_use]
    pub(crate) fn with_text(&self, text: String) -> Node {
        debug_assert!(self.is_text());
        Node::from_parts(
            self.data.kind.clone(),
            self.data.attrs.clone(),
            Fragment::empty(),
            self.data.marks.clone(),
            Some(text),
        )
    }

    /// Cut a text node between two character offsets.
    #[must_use]
    pub(crate) fn cut_text(&self, from: usize, to: usize) -> Node {
        let text = self.text().unwrap_or_default();
        let piece: String = text.chars().skip(from).take(to.saturating_sub(from)).collect();
        self.with_text(piece)
    }

    /// Cut this node open between two offsets of its content coordinate
    /// space. Unvalidated, used for slice content only.
    #[must_use]
    pub(crate) fn cut(&self, from: usize, to: usize) -> Node {
        if self.is_text() {
            self.cut_text(from, to)
        } else if from == 0 && to == self.content_size() {
            self.clone()
        } else {
            self.copy(self.data.content.cut(from, to))
        }
    }

    /// Walk every descendant, depth first, with its absolute position
    /// (the position before the node). The callback returns whether to
    /// descend into the node's children.
    pub fn descendants(&self, f: &mut impl FnMut(&Node, usize) -> bool) {
        fn walk(fragment: &Fragment, base: usize, f: &mut impl FnMut(&Node, usize) -> bool) {
            let mut pos = base;
            for child in fragment.children() {
                if f(child, pos) && !child.is_text() {
                    walk(child.content(), pos + 1, f);
                }
                pos += child.node_size();
            }
        }
        walk(self.content(), 0, f);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        self.data.kind == other.data.kind
            && self.data.attrs == other.data.attrs
            && self.data.marks == other.data.marks
            && self.data.text == other.data.text
            && self.data.content == other.data.content
    }
}

// Rendered as `doc(paragraph("One."))`-style trees, which keeps test
// diffs readable.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.text() {
            if self.marks().is_empty() {
                write!(f, "{text:?}")
            } else {
                let marks: Vec<&str> = self.marks().iter().map(|m| m.kind().name()).collect();
                write!(f, "{:?}<{}>", text, marks.join("+"))
            }
        } else {
            write!(f, "{}(", self.name())?;
            for (i, child) in self.content().children().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child:?}")?;
            }
            write!(f, ")")
        }
    }
}

/// Check a fragment against a node type: content expression plus the
/// type's mark policy for its children.
pub(crate) fn check_content(kind: &NodeType, content: &Fragment) -> Result<(), ModelError> {
    match kind.content_match() {
        Some(expr) => {
            if !expr.matches(content.children().map(Node::name)) {
                let found: Vec<&str> = content.children().map(Node::name).collect();
                return Err(ModelError::ContentMismatch {
                    type_name: kind.name().to_string(),
                    expr: expr.expr().to_string(),
                    found: found.join(" "),
                });
            }
        }
        None => {
            if !content.is_empty() {
                return Err(ModelError::ContentMismatch {
                    type_name: kind.name().to_string(),
                    expr: String::new(),
                    found: "non-empty content in leaf".to_string(),
                });
            }
        }
    }
    for child in content.children() {
        for mark in child.marks().iter() {
            if !kind.allows_mark(mark.kind()) {
                return Err(ModelError::NotAllowedMark {
                    type_name: kind.name().to_string(),
                    mark: mark.kind().name().to_string(),
                });
            }
        }
    }
    Ok(())
}

impl Schema {
    /// Construct a validated non-text node.
    pub fn node(
        &self,
        name: &str,
        given: &Attrs,
        children: Vec<Node>,
        marks: MarkSet,
    ) -> Result<Node, ModelError> {
        let kind = self
            .node_type(name)
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))?
            .clone();
        if kind.is_text() {
            return Err(ModelError::UnknownNodeType(
                "text nodes are built with Schema::text".to_string(),
            ));
        }
        let attrs = compute_attrs(name, kind.attr_specs(), given)?;
        let content = Fragment::from_nodes(children);
        check_content(&kind, &content)?;
        Ok(Node::from_parts(kind, attrs, content, marks, None))
    }

    /// Construct a text node.
    pub fn text(&self, text: &str) -> Result<Node, ModelError> {
        self.text_with_marks(text, MarkSet::empty())
    }

    /// Construct a text node carrying marks.
    pub fn text_with_marks(&self, text: &str, marks: MarkSet) -> Result<Node, ModelError> {
        if text.is_empty() {
            return Err(ModelError::EmptyText);
        }
        let kind = self
            .text_type()
            .ok_or_else(|| ModelError::UnknownNodeType("text".to_string()))?
            .clone();
        Ok(Node::from_parts(
            kind,
            Attrs::new(),
            Fragment::empty(),
            marks,
            Some(text.to_string()),
        ))
    }
}
