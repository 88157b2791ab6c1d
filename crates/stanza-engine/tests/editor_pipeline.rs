//! End-to-end pipeline tests: schema → document → transactions →
//! decorations → reactive state, wired the way an embedding would use
//! the crate.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use stanza_engine::schema::basic::document_schema;
use stanza_engine::{
    Attrs, Bias, Decoration, DispatchOutcome, Editor, MarkSet, Node, Schema, StepError, Style,
    Transaction, TransactionError,
};

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

fn style(pairs: &[(&str, &str)]) -> Style {
    pairs
        .iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn the_two_paragraph_document_has_the_documented_sizes() {
    let schema = document_schema().unwrap();
    let doc = doc_one_two(&schema);
    assert_eq!(doc.content_size(), 12);
    assert_eq!(doc.node_size(), 14);
}

#[test]
fn zero_step_dispatch_changes_nothing() {
    let schema = document_schema().unwrap();
    let editor = Editor::new(doc_one_two(&schema));
    let before = editor.state();

    let outcome = editor.dispatch(Transaction::new());
    assert!(matches!(outcome, DispatchOutcome::NoChange));
    assert_eq!(editor.state().version(), before.version());
    assert_eq!(editor.state().doc(), before.doc());
}

#[test]
fn dispatching_a_transaction_and_its_inverse_restores_the_document() {
    let schema = document_schema().unwrap();
    let doc = doc_one_two(&schema);
    let editor = Editor::new(doc.clone());

    let txn = Transaction::new().delete_range(3, 9).with_origin("input");
    let undo = txn.inverted(&doc).unwrap();

    assert!(matches!(
        editor.dispatch(txn),
        DispatchOutcome::Applied { version: 1 }
    ));
    assert_eq!(editor.state().doc().text_content(), "Ono!");

    assert!(matches!(
        editor.dispatch(undo),
        DispatchOutcome::Applied { version: 2 }
    ));
    assert_eq!(editor.state().doc(), &doc);
}

#[test]
fn out_of_range_step_rejects_and_leaves_state_identical() {
    let schema = document_schema().unwrap();
    let editor = Editor::new(doc_one_two(&schema));
    let before = editor.state();
    let notified = Rc::new(RefCell::new(Vec::new()));
    let notified_in = Rc::clone(&notified);
    editor.subscribe(move |state| notified_in.borrow_mut().push(state.version()));

    let outcome = editor.dispatch(Transaction::new().delete_range(20, 22));
    match outcome {
        DispatchOutcome::Rejected(TransactionError::Rejected { step, source }) => {
            assert_eq!(step, 0);
            assert!(matches!(source, StepError::OutOfRange { pos: 20, .. }));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(editor.state().version(), before.version());
    assert_eq!(editor.state().doc(), before.doc());
    // the retained state was re-published so subscribers can tell this
    // from a silent no-op
    assert_eq!(notified.borrow().as_slice(), &[0]);
}

#[test]
fn whole_document_styling_follows_every_commit() {
    let schema = document_schema().unwrap();
    let editor = Editor::new(doc_one_two(&schema));
    editor.add_decoration_source(|ctx| {
        vec![
            Decoration::widget(1, json!({"kind": "badge"})),
            Decoration::inline(0, ctx.doc.content_size(), style(&[("color", "purple")])),
        ]
    });

    let state = editor.state();
    assert_eq!(state.decorations().widgets(), &[(1, json!({"kind": "badge"}))]);
    assert_eq!(state.decorations().inline_segments()[0].to, 12);

    editor.dispatch(Transaction::new().delete_range(3, 9));
    let state = editor.state();
    assert_eq!(state.decorations().inline_segments()[0].to, 6);
}

#[test]
fn stored_highlight_rides_the_mapping_across_a_deletion() {
    let schema = document_schema().unwrap();
    let editor = Editor::new(doc_one_two(&schema));

    // a source holding a concrete range (4..8 covers "." and "Tw") and
    // carrying it across each committed transaction
    let range = Rc::new(RefCell::new((4usize, 8usize)));
    let range_in = Rc::clone(&range);
    editor.add_decoration_source(move |ctx| {
        if let Some(mapping) = ctx.mapping {
            let (from, to) = *range_in.borrow();
            *range_in.borrow_mut() = (mapping.map(from, Bias::Before), mapping.map(to, Bias::Before));
        }
        let (from, to) = *range_in.borrow();
        vec![Decoration::inline(from, to, style(&[("background", "gold")]))]
    });

    let segments = editor.state().decorations().inline_segments().to_vec();
    assert_eq!((segments[0].from, segments[0].to), (4, 8));

    assert!(matches!(
        editor.dispatch(Transaction::new().delete_range(0, 4)),
        DispatchOutcome::Applied { .. }
    ));
    let segments = editor.state().decorations().inline_segments().to_vec();
    assert_eq!((segments[0].from, segments[0].to), (0, 4));
}

#[test]
fn decoration_recomputation_is_pure() {
    let schema = document_schema().unwrap();
    let build = || {
        let editor = Editor::new(doc_one_two(&schema));
        editor.add_decoration_source(|ctx| {
            vec![
                Decoration::widget(0, json!({"kind": "gutter"})),
                Decoration::inline(1, ctx.doc.content_size(), style(&[("color", "purple")])),
                Decoration::inline(4, 8, style(&[("background", "gold")])),
            ]
        });
        editor.dispatch(Transaction::new().delete_range(3, 9));
        editor.state()
    };
    let a = build();
    let b = build();
    assert_eq!(a.decorations(), b.decorations());
    assert_eq!(a.doc(), b.doc());
}
