//! Marks: non-structural annotations on inline content.

use crate::schema::{MarkType, Schema};

use super::{Attrs, ModelError, compute_attrs};

/// An instance of a [`MarkType`] with computed attributes, attached to a
/// text run or inline node.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    kind: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub fn kind(&self) -> &MarkType {
        &self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.attrs.get(name)
    }
}

/// A set of marks: at most one mark per type, kept sorted by type name so
/// ordering carries no significance and equal sets compare equal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkSet {
    marks: Vec<Mark>,
}

impl MarkSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_marks(marks: impl IntoIterator<Item = Mark>) -> Self {
        let mut set = Self::empty();
        for mark in marks {
            set = set.add(mark);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter()
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.marks.iter().any(|m| m.kind().name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Mark> {
        self.marks.iter().find(|m| m.kind().name() == name)
    }

    /// Add a mark, replacing any existing mark of the same type.
    #[must_use]
    pub fn add(&self, mark: Mark) -> MarkSet {
        let mut marks: Vec<Mark> = self
            .marks
            .iter()
            .filter(|m| m.kind() != mark.kind())
            .cloned()
            .collect();
        marks.push(mark);
        marks.sort_by(|a, b| a.kind().name().cmp(b.kind().name()));
        MarkSet { marks }
    }

    /// Remove every mark of the given type.
    #[must_use]
    pub fn remove_type(&self, name: &str) -> MarkSet {
        MarkSet {
            marks: self
                .marks
                .iter()
                .filter(|m| m.kind().name() != name)
                .cloned()
                .collect(),
        }
    }
}

impl Schema {
    /// Construct a mark instance, computing and validating attributes.
    pub fn mark(&self, name: &str, given: &Attrs) -> Result<Mark, ModelError> {
        let kind = self
            .mark_type(name)
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))?
            .clone();
        let attrs = compute_attrs(name, kind.attr_specs(), given)?;
        Ok(Mark { kind, attrs })
    }
}
