//! Transactions: ordered step lists applied atomically.

use serde_json::Value;

use crate::model::{Fragment, Mark, ModelError, Node, Slice};
use crate::schema::Schema;

use super::map::Mapping;
use super::step::{Step, StepError};

/// Application failure: the first failing step, with its index. Nothing
/// of the transaction has been applied when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("step {step} rejected: {source}")]
    Rejected { step: usize, source: StepError },
}

/// An ordered list of steps plus origin metadata. Built up front, never
/// mutated after dispatch, applied exactly once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transaction {
    steps: Vec<Step>,
    origin: Option<String>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the transaction with where it came from (input, undo, an
    /// automated edit). Carried for logging and subscribers, never
    /// interpreted by the pipeline.
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn replace_range(self, from: usize, to: usize, slice: Slice) -> Self {
        self.step(Step::Replace { from, to, slice })
    }

    #[must_use]
    pub fn delete_range(self, from: usize, to: usize) -> Self {
        self.replace_range(from, to, Slice::empty())
    }

    /// Insert plain text at a position.
    pub fn insert_text(
        self,
        schema: &Schema,
        pos: usize,
        text: &str,
    ) -> Result<Self, ModelError> {
        let text = schema.text(text)?;
        let slice = Slice::new(Fragment::from_nodes(vec![text]), 0, 0);
        Ok(self.replace_range(pos, pos, slice))
    }

    #[must_use]
    pub fn add_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::AddMark { from, to, mark })
    }

    #[must_use]
    pub fn remove_mark(self, from: usize, to: usize, mark_type: &str) -> Self {
        self.step(Step::RemoveMark {
            from,
            to,
            mark_type: mark_type.to_string(),
        })
    }

    #[must_use]
    pub fn set_attr(self, pos: usize, attr: &str, value: Value) -> Self {
        self.step(Step::SetAttr {
            pos,
            attr: attr.to_string(),
            value,
        })
    }

    /// The transaction that undoes this one against `doc` (the document
    /// this transaction applies to): each step inverted against the
    /// intermediate document it sees, in reverse order.
    pub fn inverted(&self, doc: &Node) -> Result<Transaction, TransactionError> {
        let mut current = doc.clone();
        let mut inverses = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let rejected = |source| TransactionError::Rejected {
                step: index,
                source,
            };
            inverses.push(step.invert(&current).map_err(rejected)?);
            current = step.apply(&current).map_err(rejected)?;
        }
        inverses.reverse();
        Ok(Transaction {
            steps: inverses,
            origin: self.origin.as_ref().map(|origin| format!("undo:{origin}")),
        })
    }
}

/// The result of a successful application.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The new document root (the old root stays valid).
    pub doc: Node,
    /// Whether the new document differs structurally from the old one.
    pub changed: bool,
    /// Concatenated position maps of every step, for remapping stored
    /// positions across the transaction.
    pub mapping: Mapping,
}

/// Apply every step in order against the in-progress document. The first
/// failure rejects the whole transaction; no partial application is ever
/// observable.
pub fn apply_transaction(doc: &Node, txn: &Transaction) -> Result<Applied, TransactionError> {
    let mut current = doc.clone();
    let mut mapping = Mapping::new();
    for (index, step) in txn.steps().iter().enumerate() {
        current = step
            .apply(&current)
            .map_err(|source| TransactionError::Rejected {
                step: index,
                source,
            })?;
        mapping.push(step.pos_map());
    }
    let changed = current != *doc;
    Ok(Applied {
        doc: current,
        changed,
        mapping,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attrs, MarkSet};
    use crate::schema::basic::document_schema;
    use crate::transform::Bias;
    use pretty_assertions::assert_eq;

    fn doc_one_two(schema: &Schema) -> Node {
        let p1 = schema
            .node(
                "paragraph",
                &Attrs::new(),
                vec![schema.text("One.").unwrap()],
                MarkSet::empty(),
            )
            .unwrap();
        let p2 = schema
            .node(
                "paragraph",
                &Attrs::new(),
                vec![schema.text("Two!").unwrap()],
                MarkSet::empty(),
            )
            .unwrap();
        schema
            .node("doc", &Attrs::new(), vec![p1, p2], MarkSet::empty())
            .unwrap()
    }

    #[test]
    fn zero_step_transaction_is_an_unchanged_no_op() {
        let schema = document_schema().unwrap();
        let doc = doc_one_two(&schema);
        let applied = apply_transaction(&doc, &Transaction::new()).unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.doc, doc);
        assert!(applied.mapping.is_identity());
    }

    #[test]
    fn steps_apply_in_order_against_the_in_progress_document() {
        let schema = document_schema().unwrap();
        let doc = doc_one_two(&schema);
        // delete "e." then type at the position where it used to be
        let txn = Transaction::new()
            .delete_range(3, 5)
            .insert_text(&schema, 3, "ly")
            .unwrap();
        let applied = apply_transaction(&doc, &txn).unwrap();
        assert!(applied.changed);
        assert_eq!(applied.doc.child(0).unwrap().text_content(), "Only");
        // 12 - 2 + 2 tokens
        assert_eq!(applied.doc.content_size(), 12);
        // end of the deleted range rides past the insertion with After
        assert_eq!(applied.mapping.map(5, Bias::After), 5);
        assert_eq!(applied.mapping.map(4, Bias::Before), 3);
    }

    #[test]
    fn first_failing_step_rejects_the_whole_transaction() {
        let schema = document_schema().unwrap();
        let doc = doc_one_two(&schema);
        let txn = Transaction::new()
            .delete_range(3, 5)
            .delete_range(40, 41)
            .delete_range(0, 1);
        let err = apply_transaction(&doc, &txn).unwrap_err();
        let TransactionError::Rejected { step, source } = err;
        assert_eq!(step, 1);
        assert!(matches!(source, StepError::OutOfRange { .. }));
    }

    #[test]
    fn inverted_transaction_restores_structural_equality() {
        let schema = document_schema().unwrap();
        let doc = doc_one_two(&schema);
        let em = schema.mark("em", &Attrs::new()).unwrap();
        let txn = Transaction::new()
            .delete_range(3, 9)
            .add_mark(1, 3, em)
            .with_origin("test-edit");

        let undo = txn.inverted(&doc).unwrap();
        let applied = apply_transaction(&doc, &txn).unwrap();
        let restored = apply_transaction(&applied.doc, &undo).unwrap();
        assert_eq!(restored.doc, doc);
        assert_eq!(undo.origin(), Some("undo:test-edit"));
    }
}
