/*!
 * # Document Tree
 *
 * An immutable, schema-validated tree of [`Node`]s with flattened integer
 * positions.
 *
 * ## Persistence
 *
 * Nodes are persistent values: editing never mutates a node in place, it
 * builds new nodes along the path from the edit site to the root and
 * structurally shares every unaffected subtree (`Arc`-backed, cheap
 * clones). A caller holding an old root keeps a fully valid snapshot.
 *
 * ## Flattened positions
 *
 * A position is a single integer offset into the flattened document:
 * every non-text node contributes `content_size + 2` (one boundary token
 * on each side), every text node contributes its character count. This
 * lets ranges, steps and decorations address the tree as `(from, to)`
 * integers, and lets [`Node::resolve`] recover the structural address in
 * O(depth) without re-walking the tree.
 *
 * ## Atomic replace
 *
 * [`Node::replace`] is the single structural mutation primitive. It
 * validates every node it rebuilds against the schema and fails without
 * effect — it never yields a partially-built invalid tree.
 */

mod fragment;
pub mod json;
mod mark;
mod node;
mod position;
mod replace;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::schema::AttrSpec;

pub use fragment::Fragment;
pub use mark::{Mark, MarkSet};
pub use node::Node;
pub use position::ResolvedPos;
pub use replace::Slice;

/// Attribute values carried by a node or mark, validated against the
/// owning type's attribute specs.
pub type Attrs = BTreeMap<String, Value>;

/// Failure while constructing or editing a tree. Construction is atomic:
/// when one of these is returned, no part of the input tree has changed.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("position {pos} outside of document (0..={max})")]
    InvalidPosition { pos: usize, max: usize },
    #[error("content [{found}] does not match `{expr}` of node type `{type_name}`")]
    ContentMismatch {
        type_name: String,
        expr: String,
        found: String,
    },
    #[error("mark `{mark}` is not permitted inside `{type_name}`")]
    NotAllowedMark { type_name: String, mark: String },
    #[error("unknown attribute `{attr}` for `{type_name}`")]
    UnknownAttr { type_name: String, attr: String },
    #[error("missing required attribute `{attr}` for `{type_name}`")]
    MissingAttr { type_name: String, attr: String },
    #[error("invalid value for attribute `{attr}` of `{type_name}`")]
    InvalidAttrValue { type_name: String, attr: String },
    #[error("cannot join `{left}` onto `{right}`")]
    CannotJoin { left: String, right: String },
    #[error("invalid slice: {0}")]
    InvalidSlice(String),
    #[error("malformed document JSON: {0}")]
    MalformedJson(String),
    #[error("schema has no node type `{0}`")]
    UnknownNodeType(String),
    #[error("schema has no mark type `{0}`")]
    UnknownMarkType(String),
    #[error("text nodes must not be empty")]
    EmptyText,
}

/// Fill defaults and validate a caller-supplied attribute map against the
/// owning type's specs.
pub(crate) fn compute_attrs(
    type_name: &str,
    specs: &BTreeMap<String, AttrSpec>,
    given: &Attrs,
) -> Result<Attrs, ModelError> {
    for attr in given.keys() {
        if !specs.contains_key(attr) {
            return Err(ModelError::UnknownAttr {
                type_name: type_name.to_string(),
                attr: attr.clone(),
            });
        }
    }
    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = match given.get(name) {
            Some(value) => value.clone(),
            None => match spec.default_value() {
                Some(default) => default.clone(),
                None => {
                    return Err(ModelError::MissingAttr {
                        type_name: type_name.to_string(),
                        attr: name.clone(),
                    });
                }
            },
        };
        if !spec.is_valid(&value) {
            return Err(ModelError::InvalidAttrValue {
                type_name: type_name.to_string(),
                attr: name.clone(),
            });
        }
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

/// Shorthand for building an [`Attrs`] map from literal pairs.
pub fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attrs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
