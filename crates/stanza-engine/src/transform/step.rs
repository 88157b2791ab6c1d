//! Steps: the atomic, invertible units a transaction is made of.

use serde_json::Value;

use crate::model::{Fragment, Mark, MarkSet, ModelError, Node, Slice, compute_attrs};
use crate::schema::NodeType;

use super::map::StepMap;

/// A single-step failure. Transactions reject wholesale on the first one.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("position {pos} outside of document (0..={max})")]
    OutOfRange { pos: usize, max: usize },
    #[error("no mark of type `{mark}` between {from} and {to}")]
    MarkNotPresent {
        mark: String,
        from: usize,
        to: usize,
    },
    #[error("no node starts at position {0}")]
    NoNodeAt(usize),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// One atomic document change. Every variant can be applied to a
/// document, inverted against the document it applies to, and describes
/// how it moves positions around.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace the range `from..to` with a slice.
    Replace { from: usize, to: usize, slice: Slice },
    /// Add a mark to the inline content in `from..to`, where the schema
    /// permits it.
    AddMark { from: usize, to: usize, mark: Mark },
    /// Remove every mark of a type from the inline content in `from..to`.
    RemoveMark {
        from: usize,
        to: usize,
        mark_type: String,
    },
    /// Change one attribute of the node starting at `pos`.
    SetAttr {
        pos: usize,
        attr: String,
        value: Value,
    },
}

impl Step {
    /// Apply this step to a document, producing a new one. The input is
    /// untouched on failure.
    pub fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        match self {
            Step::Replace { from, to, slice } => {
                check_range(doc, *from, *to)?;
                Ok(doc.replace(*from, *to, slice)?)
            }
            Step::AddMark { from, to, mark } => {
                check_range(doc, *from, *to)?;
                if from == to {
                    return Ok(doc.clone());
                }
                let mapped = map_range_marks(doc, *from, *to, &mut |child, parent| {
                    parent
                        .allows_mark(mark.kind())
                        .then(|| child.marks().add(mark.clone()))
                })?;
                Ok(doc.replace(*from, *to, &mapped)?)
            }
            Step::RemoveMark {
                from,
                to,
                mark_type,
            } => {
                check_range(doc, *from, *to)?;
                let mut removed = false;
                let mapped = map_range_marks(doc, *from, *to, &mut |child, _| {
                    child.marks().contains_type(mark_type).then(|| {
                        removed = true;
                        child.marks().remove_type(mark_type)
                    })
                })?;
                if !removed {
                    return Err(StepError::MarkNotPresent {
                        mark: mark_type.clone(),
                        from: *from,
                        to: *to,
                    });
                }
                Ok(doc.replace(*from, *to, &mapped)?)
            }
            Step::SetAttr { pos, attr, value } => {
                let (rpos, child) = node_starting_at(doc, *pos)?;
                let mut given = child.attrs().clone();
                given.insert(attr.clone(), value.clone());
                let computed =
                    compute_attrs(child.name(), child.kind().attr_specs(), &given)
                        .map_err(StepError::Model)?;
                let mut node = child.with_attrs(computed);
                for depth in (0..=rpos.depth()).rev() {
                    let parent = rpos.node(depth);
                    node = parent.copy(parent.content().replace_child(rpos.index(depth), node));
                }
                Ok(node)
            }
        }
    }

    /// The step that undoes this one, built against the document this
    /// step applies to (before application).
    pub fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        match self {
            Step::Replace { from, to, slice } => {
                check_range(doc, *from, *to)?;
                Ok(Step::Replace {
                    from: *from,
                    to: from + slice.size(),
                    slice: doc.slice(*from, *to)?,
                })
            }
            Step::AddMark { from, to, mark } => Ok(Step::RemoveMark {
                from: *from,
                to: *to,
                mark_type: mark.kind().name().to_string(),
            }),
            Step::RemoveMark {
                from,
                to,
                mark_type,
            } => {
                let mark = find_mark(doc, *from, *to, mark_type).ok_or_else(|| {
                    StepError::MarkNotPresent {
                        mark: mark_type.clone(),
                        from: *from,
                        to: *to,
                    }
                })?;
                Ok(Step::AddMark {
                    from: *from,
                    to: *to,
                    mark,
                })
            }
            Step::SetAttr { pos, attr, .. } => {
                let (_, child) = node_starting_at(doc, *pos)?;
                let value = child.attr(attr).cloned().ok_or_else(|| {
                    StepError::Model(ModelError::UnknownAttr {
                        type_name: child.name().to_string(),
                        attr: attr.clone(),
                    })
                })?;
                Ok(Step::SetAttr {
                    pos: *pos,
                    attr: attr.clone(),
                    value,
                })
            }
        }
    }

    /// How this step moves document positions.
    pub fn pos_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => {
                StepMap::new(vec![(*from, to - from, slice.size())])
            }
            _ => StepMap::identity(),
        }
    }
}

fn check_range(doc: &Node, from: usize, to: usize) -> Result<(), StepError> {
    let max = doc.content_size();
    if from > max {
        return Err(StepError::OutOfRange { pos: from, max });
    }
    if to > max {
        return Err(StepError::OutOfRange { pos: to, max });
    }
    if from > to {
        return Err(StepError::OutOfRange { pos: from, max: to });
    }
    Ok(())
}

/// Resolve `pos` and return the non-split node starting exactly there.
fn node_starting_at(
    doc: &Node,
    pos: usize,
) -> Result<(crate::model::ResolvedPos, Node), StepError> {
    if pos > doc.content_size() {
        return Err(StepError::OutOfRange {
            pos,
            max: doc.content_size(),
        });
    }
    let rpos = doc.resolve(pos)?;
    if rpos.text_offset() > 0 {
        return Err(StepError::NoNodeAt(pos));
    }
    let child = rpos
        .parent()
        .child(rpos.index(rpos.depth()))
        .cloned()
        .ok_or(StepError::NoNodeAt(pos))?;
    Ok((rpos, child))
}

/// Slice out `from..to` and rewrite the mark set of every text node in
/// it. `f` sees each text node and its parent's type and returns the new
/// mark set, or `None` to leave the node alone. The result re-enters the
/// document through `replace`, so schema validation still applies.
fn map_range_marks(
    doc: &Node,
    from: usize,
    to: usize,
    f: &mut impl FnMut(&Node, &NodeType) -> Option<MarkSet>,
) -> Result<Slice, StepError> {
    let slice = doc.slice(from, to)?;
    let rfrom = doc.resolve(from)?;
    let parent = rfrom.node(rfrom.shared_depth(to)).kind().clone();
    let content = map_fragment_marks(slice.content(), &parent, f);
    Ok(Slice::new(content, slice.open_start(), slice.open_end()))
}

fn map_fragment_marks(
    fragment: &Fragment,
    parent: &NodeType,
    f: &mut impl FnMut(&Node, &NodeType) -> Option<MarkSet>,
) -> Fragment {
    fragment
        .children()
        .map(|child| {
            if child.is_text() {
                match f(child, parent) {
                    Some(marks) => child.with_marks(marks),
                    None => child.clone(),
                }
            } else {
                child.copy(map_fragment_marks(child.content(), child.kind(), f))
            }
        })
        .collect()
}

/// The first mark of the given type on a text node overlapping the range.
fn find_mark(doc: &Node, from: usize, to: usize, mark_type: &str) -> Option<Mark> {
    let mut found = None;
    doc.descendants(&mut |node, pos| {
        if found.is_some() || pos >= to {
            return false;
        }
        if node.is_text()
            && pos < to
            && pos + node.node_size() > from
            && let Some(mark) = node.marks().get(mark_type)
        {
            found = Some(mark.clone());
        }
        true
    });
    found
}
