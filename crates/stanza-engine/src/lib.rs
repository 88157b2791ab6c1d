pub mod decoration;
pub mod markdown;
pub mod model;
pub mod schema;
pub mod state;
pub mod transform;

// Re-export key types for easier usage
pub use decoration::{
    Decoration, DecorationContext, DecorationSet, DecorationSource, InlineSegment, Style,
};
pub use model::{Attrs, Fragment, Mark, MarkSet, ModelError, Node, ResolvedPos, Slice};
pub use schema::{
    AttrSpec, MarkPolicy, MarkSpec, MarkType, NodeSpec, NodeType, Schema, SchemaBuilder,
    SchemaError,
};
pub use state::{DispatchOutcome, Editor, EditorState, SourceId, SubscriberId};
pub use transform::{
    Applied, Bias, Mapping, Step, StepError, StepMap, Transaction, TransactionError,
    apply_transaction,
};
