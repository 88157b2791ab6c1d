/*!
 * # Reactive Bridge
 *
 * [`Editor`] owns the current [`EditorState`] and is the only place it
 * changes: transactions go in through [`Editor::dispatch`], subscribers
 * hear about every commit, and decoration sources are re-run after each
 * one. The container is single-threaded and explicitly constructed;
 * embedders create as many independent editors as they need.
 *
 * Dispatch is synchronous: apply, recompute decorations, bump the
 * version, store, then notify subscribers in subscription order. A
 * subscriber that dispatches again from inside its callback is queued
 * and drained after the current commit, so versions stay monotonic and
 * no notification observes a half-committed state.
 */

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use uuid::Uuid;

use crate::decoration::{Decoration, DecorationContext, DecorationSet, DecorationSource};
use crate::model::Node;
use crate::transform::{Mapping, Transaction, TransactionError, apply_transaction};

/// An immutable snapshot of the editor: the document, the composed
/// decoration overlay, and a version that increases by one per commit.
#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Node,
    decorations: Rc<DecorationSet>,
    version: u64,
}

impl EditorState {
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// What a dispatch did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The transaction committed; this is the new state version.
    Applied { version: u64 },
    /// The transaction left the document structurally identical; state
    /// and version are unchanged.
    NoChange,
    /// A step failed; the retained state is unchanged and was re-published
    /// to subscribers.
    Rejected(TransactionError),
    /// Dispatched from inside a subscriber notification; the transaction
    /// runs after the current commit finishes.
    Queued,
}

/// Handle for removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(Uuid);

/// Handle for removing a decoration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceId(Uuid);

type Subscriber = Rc<dyn Fn(&EditorState)>;

/// The stateful editor container.
pub struct Editor {
    state: RefCell<EditorState>,
    sources: RefCell<Vec<(SourceId, DecorationSource)>>,
    subscribers: RefCell<Vec<(SubscriberId, Subscriber)>>,
    dispatching: Cell<bool>,
    queue: RefCell<VecDeque<Transaction>>,
}

impl Editor {
    /// An editor over an initial document, with no decoration sources
    /// and no subscribers, at version 0.
    pub fn new(doc: Node) -> Self {
        Self {
            state: RefCell::new(EditorState {
                doc,
                decorations: Rc::new(DecorationSet::empty()),
                version: 0,
            }),
            sources: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
            dispatching: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// A clone of the current state snapshot.
    pub fn state(&self) -> EditorState {
        self.state.borrow().clone()
    }

    /// Register a decoration source. Sources run in registration order
    /// after every commit; the current state's overlay is recomputed
    /// immediately so the new source takes effect without an edit.
    pub fn add_decoration_source(
        &self,
        source: impl Fn(&DecorationContext<'_>) -> Vec<Decoration> + 'static,
    ) -> SourceId {
        let id = SourceId(Uuid::new_v4());
        self.sources.borrow_mut().push((id, Box::new(source)));
        let doc = self.state.borrow().doc.clone();
        let decorations = self.compute_decorations(&doc, None);
        self.state.borrow_mut().decorations = Rc::new(decorations);
        id
    }

    pub fn remove_decoration_source(&self, id: SourceId) {
        self.sources.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    /// Register a subscriber, notified synchronously after every commit
    /// and after every rejection (with the unchanged state).
    pub fn subscribe(&self, f: impl Fn(&EditorState) + 'static) -> SubscriberId {
        let id = SubscriberId(Uuid::new_v4());
        self.subscribers.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    /// A subscriber that reports every commit through the `log` crate.
    pub fn attach_change_logger(&self) -> SubscriberId {
        self.subscribe(|state| {
            log::info!(
                "document changed: version {}, {} positions",
                state.version(),
                state.doc().content_size(),
            );
        })
    }

    /// Run a transaction through the pipeline.
    ///
    /// Inside a subscriber notification this queues instead (the
    /// transaction runs against the state as of when the queue drains,
    /// which may differ from the state the subscriber saw).
    pub fn dispatch(&self, txn: Transaction) -> DispatchOutcome {
        if self.dispatching.get() {
            log::debug!("re-entrant dispatch queued (origin {:?})", txn.origin());
            self.queue.borrow_mut().push_back(txn);
            return DispatchOutcome::Queued;
        }
        self.dispatching.set(true);
        let outcome = self.commit(&txn);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(queued) => {
                    let drained = self.commit(&queued);
                    log::debug!("drained queued transaction: {drained:?}");
                }
                None => break,
            }
        }
        self.dispatching.set(false);
        outcome
    }

    fn commit(&self, txn: &Transaction) -> DispatchOutcome {
        log::debug!(
            "dispatch: {} steps (origin {:?})",
            txn.steps().len(),
            txn.origin(),
        );
        let doc = self.state.borrow().doc.clone();
        match apply_transaction(&doc, txn) {
            Err(err) => {
                log::debug!("transaction rejected: {err}");
                // re-publish the retained state so subscribers can tell a
                // rejection from a no-op
                let snapshot = self.state();
                self.notify(&snapshot);
                DispatchOutcome::Rejected(err)
            }
            Ok(applied) if !applied.changed => DispatchOutcome::NoChange,
            Ok(applied) => {
                let decorations = self.compute_decorations(&applied.doc, Some(&applied.mapping));
                let version = {
                    let mut state = self.state.borrow_mut();
                    state.doc = applied.doc;
                    state.decorations = Rc::new(decorations);
                    state.version += 1;
                    state.version
                };
                let snapshot = self.state();
                self.notify(&snapshot);
                DispatchOutcome::Applied { version }
            }
        }
    }

    fn compute_decorations(&self, doc: &Node, mapping: Option<&Mapping>) -> DecorationSet {
        let context = DecorationContext { doc, mapping };
        let mut decorations = Vec::new();
        for (_, source) in self.sources.borrow().iter() {
            decorations.extend(source(&context));
        }
        DecorationSet::build(doc, decorations)
    }

    fn notify(&self, state: &EditorState) {
        // snapshot the list so subscribing or unsubscribing from inside a
        // callback does not invalidate the iteration
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| Rc::clone(f))
            .collect();
        for subscriber in subscribers {
            subscriber(state);
        }
    }
}
