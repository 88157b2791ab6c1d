//! Fragments: ordered child sequences with cached flattened size.

use std::sync::Arc;

use super::{ModelError, Node};

/// An immutable sequence of sibling nodes. The summed flattened size of
/// the children is cached so position arithmetic never re-walks subtrees.
#[derive(Debug, Clone)]
pub struct Fragment {
    inner: Arc<FragmentInner>,
}

#[derive(Debug)]
struct FragmentInner {
    children: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::from_nodes(Vec::new())
    }

    pub fn from_nodes(children: Vec<Node>) -> Self {
        let size = children.iter().map(Node::node_size).sum();
        Self {
            inner: Arc::new(FragmentInner { children, size }),
        }
    }

    /// Summed flattened size of all children.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn count(&self) -> usize {
        self.inner.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.children.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.inner.children.get(index)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.inner.children.iter()
    }

    /// Locate the child covering `offset` (an offset into this fragment's
    /// flattened coordinate space). Returns `(index, start)` where
    /// `start` is the offset at which that child begins; an `offset`
    /// sitting exactly on a boundary yields the index of the child after
    /// it, and `offset == size` yields `(count, size)`.
    pub(crate) fn find_index(&self, offset: usize) -> Result<(usize, usize), ModelError> {
        if offset > self.size() {
            return Err(ModelError::InvalidPosition {
                pos: offset,
                max: self.size(),
            });
        }
        let mut cur = 0;
        for (i, child) in self.children().enumerate() {
            if offset == cur {
                return Ok((i, cur));
            }
            let end = cur + child.node_size();
            if offset < end {
                return Ok((i, cur));
            }
            cur = end;
        }
        Ok((self.count(), cur))
    }

    /// Cut out the sub-fragment between two offsets. Children straddling
    /// an edge are cut open (text truncated, other nodes recursively cut);
    /// the result is only meaningful as slice content and is not validated
    /// until placed back into a tree.
    #[must_use]
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        let to = to.min(self.size());
        let from = from.min(to);
        if from == 0 && to == self.size() {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in self.children() {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let piece = if pos < from || end > to {
                        if child.is_text() {
                            let start = from.saturating_sub(pos);
                            let stop = child.node_size().min(to - pos);
                            child.cut_text(start, stop)
                        } else {
                            let start = from.saturating_sub(pos + 1);
                            let stop = child.content_size().min(to - pos - 1);
                            child.copy(child.content().cut(start, stop))
                        }
                    } else {
                        child.clone()
                    };
                    result.push(piece);
                }
                pos = end;
            }
        }
        Fragment::from_nodes(result)
    }

    /// A fragment with the child at `index` swapped out.
    #[must_use]
    pub(crate) fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut children = self.inner.children.clone();
        children[index] = node;
        Fragment::from_nodes(children)
    }

    /// Concatenate two fragments, merging a text node boundary with
    /// identical markup so canonical documents never hold two adjacent
    /// mergeable text runs.
    #[must_use]
    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut children = self.inner.children.clone();
        let mut rest = other.children();
        if let (Some(last), Some(first)) = (children.last(), other.child(0))
            && last.is_text()
            && first.is_text()
            && last.same_markup(first)
        {
            let merged = last.with_text(format!(
                "{}{}",
                last.text().unwrap_or_default(),
                first.text().unwrap_or_default()
            ));
            *children.last_mut().expect("non-empty") = merged;
            rest.next();
        }
        children.extend(rest.cloned());
        Fragment::from_nodes(children)
    }

    /// Concatenated text of every text descendant.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            match child.text() {
                Some(text) => out.push_str(text),
                None => out.push_str(&child.content().text_content()),
            }
        }
        out
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.children == other.inner.children
    }
}

impl FromIterator<Node> for Fragment {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Fragment::from_nodes(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::basic::document_schema;
    use pretty_assertions::assert_eq;

    fn paragraph(text: &str) -> Node {
        let schema = document_schema().unwrap();
        let text = schema.text(text).unwrap();
        schema
            .node("paragraph", &Attrs::new(), vec![text], MarkSet::empty())
            .unwrap()
    }

    use crate::model::MarkSet;

    #[test]
    fn size_is_cached_sum_of_children() {
        let frag = Fragment::from_nodes(vec![paragraph("One."), paragraph("Two!")]);
        assert_eq!(frag.size(), 12);
        assert_eq!(frag.count(), 2);
    }

    #[test]
    fn find_index_boundaries_and_interiors() {
        let frag = Fragment::from_nodes(vec![paragraph("One."), paragraph("Two!")]);
        // boundary before first child
        assert_eq!(frag.find_index(0).unwrap(), (0, 0));
        // inside first child
        assert_eq!(frag.find_index(3).unwrap(), (0, 0));
        // boundary between children
        assert_eq!(frag.find_index(6).unwrap(), (1, 6));
        // inside second child
        assert_eq!(frag.find_index(7).unwrap(), (1, 6));
        // end of fragment
        assert_eq!(frag.find_index(12).unwrap(), (2, 12));
        assert!(frag.find_index(13).is_err());
    }

    #[test]
    fn cut_keeps_whole_children_and_opens_partial_ones() {
        let frag = Fragment::from_nodes(vec![paragraph("One."), paragraph("Two!")]);

        let whole = frag.cut(0, 12);
        assert_eq!(whole, frag);

        let first = frag.cut(0, 6);
        assert_eq!(first.count(), 1);
        assert_eq!(first.text_content(), "One.");

        // straddles both paragraphs: both come back cut open
        let middle = frag.cut(3, 9);
        assert_eq!(middle.count(), 2);
        assert_eq!(middle.text_content(), "e.Tw");
    }
}
