//! The stock document schema used by the markdown codec: basic block and
//! inline types plus list nodes.

use serde_json::Value;

use super::{AttrSpec, MarkPolicy, MarkSpec, NodeSpec, Schema, SchemaError};

/// Build the stock schema.
///
/// Node types: `doc`, `paragraph`, `heading(level)`, `blockquote`,
/// `code_block(params)`, `bullet_list`, `ordered_list(order)`,
/// `list_item`, `text`. Mark types: `em`, `strong`, `code`,
/// `link(href, title)`.
pub fn document_schema() -> Result<Schema, SchemaError> {
    let mut builder = Schema::builder();
    builder
        .add_node(NodeSpec::new("doc").content("block+"))
        .add_node(NodeSpec::new("paragraph").content("inline*").group("block"))
        .add_node(
            NodeSpec::new("heading")
                .content("inline*")
                .group("block")
                .attr(
                    "level",
                    AttrSpec::with_default(1)
                        .validated(|v| v.as_u64().is_some_and(|level| (1..=6).contains(&level))),
                ),
        )
        .add_node(NodeSpec::new("blockquote").content("block+").group("block"))
        .add_node(
            NodeSpec::new("code_block")
                .content("text*")
                .group("block")
                // Code is verbatim: no marks inside a code block.
                .marks(MarkPolicy::None)
                .attr("params", AttrSpec::with_default("")),
        )
        .add_node(
            NodeSpec::new("bullet_list")
                .content("list_item+")
                .group("block"),
        )
        .add_node(
            NodeSpec::new("ordered_list")
                .content("list_item+")
                .group("block")
                .attr(
                    "order",
                    AttrSpec::with_default(1).validated(|v| v.as_u64().is_some()),
                ),
        )
        .add_node(NodeSpec::new("list_item").content("paragraph block*"))
        .add_node(NodeSpec::new("text").group("inline"))
        .add_mark(MarkSpec::new("em"))
        .add_mark(MarkSpec::new("strong"))
        .add_mark(MarkSpec::new("code").inclusive(false))
        .add_mark(
            MarkSpec::new("link")
                .inclusive(false)
                .attr("href", AttrSpec::required().validated(Value::is_string))
                .attr("title", AttrSpec::with_default(Value::Null)),
        );
    builder.build()
}
