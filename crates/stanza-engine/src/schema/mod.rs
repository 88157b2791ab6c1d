/*!
 * # Schema Registry
 *
 * The schema defines the vocabulary a document may use: its node types,
 * mark types, per-type attribute specifications and the content
 * expressions constraining how nodes nest. Every tree construction path
 * in the crate validates against it.
 *
 * Registration happens exactly once, through [`SchemaBuilder`], at
 * startup. [`SchemaBuilder::build`] compiles every content expression and
 * resolves group references; anything malformed fails there with a
 * [`SchemaError`], before any document can exist. The resulting
 * [`Schema`] is immutable and cheap to clone (shared internals).
 *
 * Two kinds of registry entries:
 *
 * - [`NodeType`]: structural tree elements (`doc`, `paragraph`, `text`,
 *   ...). Carries the compiled content expression, the attribute specs
 *   and the policy for which marks its *children* may carry.
 * - [`MarkType`]: non-structural annotations attached to inline content
 *   (`em`, `link`, ...), with attributes and an inclusivity flag.
 */

pub mod basic;
mod content;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use content::ContentMatch;

/// Registration-time failure. Fatal: an invalid schema means the editor
/// cannot run, so these abort initialization rather than surfacing later.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid content expression `{expr}` for node type `{type_name}`: {reason}")]
    MalformedContent {
        type_name: String,
        expr: String,
        reason: String,
    },
    #[error("duplicate node type `{0}`")]
    DuplicateNode(String),
    #[error("duplicate mark type `{0}`")]
    DuplicateMark(String),
    #[error("node type `{type_name}` allows unknown mark type `{mark}`")]
    UnknownMark { type_name: String, mark: String },
    #[error("schema has no `{0}` node type")]
    MissingNode(String),
    #[error("attribute `{attr}` of `{type_name}` has a default that fails its own validator")]
    InvalidDefault { type_name: String, attr: String },
}

/// Specification for one attribute of a node or mark type.
#[derive(Clone)]
pub struct AttrSpec {
    default: Option<Value>,
    validate: Option<Arc<dyn Fn(&Value) -> bool + Send + Sync>>,
}

impl AttrSpec {
    /// An attribute that must be supplied on every construction.
    pub fn required() -> Self {
        Self {
            default: None,
            validate: None,
        }
    }

    /// An attribute filled in from `default` when not supplied.
    pub fn with_default(default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            validate: None,
        }
    }

    /// Attach a validator; values failing it are rejected at construction.
    pub fn validated(mut self, validate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        match &self.validate {
            Some(validate) => validate(value),
            None => true,
        }
    }
}

impl fmt::Debug for AttrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrSpec")
            .field("default", &self.default)
            .field("validate", &self.validate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Which mark types the children of a node type may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkPolicy {
    /// No marks permitted (typical for block containers).
    None,
    /// Every registered mark type permitted (typical for inline content).
    All,
    /// Only the named mark types.
    Only(BTreeSet<String>),
}

/// Declarative input to [`SchemaBuilder::add_node`].
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    /// Content expression over child type/group names. `None` for leaves.
    pub content: Option<String>,
    /// Group this type belongs to, referencable from content expressions.
    pub group: Option<String>,
    /// Marks the children of this node may carry. `None` picks a default
    /// at build time: `All` when the content can contain text, else `None`.
    pub marks: Option<MarkPolicy>,
    pub attrs: BTreeMap<String, AttrSpec>,
}

impl NodeSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: None,
            group: None,
            marks: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn content(mut self, expr: &str) -> Self {
        self.content = Some(expr.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn marks(mut self, policy: MarkPolicy) -> Self {
        self.marks = Some(policy);
        self
    }

    pub fn attr(mut self, name: &str, spec: AttrSpec) -> Self {
        self.attrs.insert(name.to_string(), spec);
        self
    }
}

/// Declarative input to [`SchemaBuilder::add_mark`].
#[derive(Debug, Clone)]
pub struct MarkSpec {
    pub name: String,
    pub attrs: BTreeMap<String, AttrSpec>,
    /// Whether the mark extends across a typed boundary when content is
    /// inserted at its edge. Stored for callers building editing
    /// behaviour; the core does not consult it during validation.
    pub inclusive: bool,
}

impl MarkSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: BTreeMap::new(),
            inclusive: true,
        }
    }

    pub fn attr(mut self, name: &str, spec: AttrSpec) -> Self {
        self.attrs.insert(name.to_string(), spec);
        self
    }

    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }
}

#[derive(Debug)]
struct NodeTypeInner {
    name: String,
    is_text: bool,
    content: Option<ContentMatch>,
    marks: MarkPolicy,
    attrs: BTreeMap<String, AttrSpec>,
}

/// An immutable, registered node type. Handles are cheap to clone and
/// compare equal when they come from the same registration.
#[derive(Debug, Clone)]
pub struct NodeType {
    inner: Arc<NodeTypeInner>,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is the text leaf type.
    pub fn is_text(&self) -> bool {
        self.inner.is_text
    }

    /// Whether nodes of this type never carry content.
    pub fn is_leaf(&self) -> bool {
        self.inner.content.is_none()
    }

    /// The compiled content expression, if the type has content.
    pub fn content_match(&self) -> Option<&ContentMatch> {
        self.inner.content.as_ref()
    }

    /// Whether children of this node may carry the given mark type.
    pub fn allows_mark(&self, mark: &MarkType) -> bool {
        match &self.inner.marks {
            MarkPolicy::None => false,
            MarkPolicy::All => true,
            MarkPolicy::Only(names) => names.contains(mark.name()),
        }
    }

    pub fn attr_specs(&self) -> &BTreeMap<String, AttrSpec> {
        &self.inner.attrs
    }

    /// Whether two types have interchangeable content, used when deciding
    /// if partial nodes on either side of a replaced range may be joined.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other
            || match (self.content_match(), other.content_match()) {
                (Some(a), Some(b)) => a.expr() == b.expr(),
                (None, None) => true,
                _ => false,
            }
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.name == other.inner.name
    }
}

impl Eq for NodeType {}

#[derive(Debug)]
struct MarkTypeInner {
    name: String,
    attrs: BTreeMap<String, AttrSpec>,
    inclusive: bool,
}

/// An immutable, registered mark type.
#[derive(Debug, Clone)]
pub struct MarkType {
    inner: Arc<MarkTypeInner>,
}

impl MarkType {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn inclusive(&self) -> bool {
        self.inner.inclusive
    }

    pub fn attr_specs(&self) -> &BTreeMap<String, AttrSpec> {
        &self.inner.attrs
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.name == other.inner.name
    }
}

impl Eq for MarkType {}

#[derive(Debug)]
struct SchemaInner {
    nodes: BTreeMap<String, NodeType>,
    marks: BTreeMap<String, MarkType>,
    top: String,
}

/// The immutable registry of node and mark types.
#[derive(Debug, Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a node type by name.
    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.inner.nodes.get(name)
    }

    /// Look up a mark type by name.
    pub fn mark_type(&self, name: &str) -> Option<&MarkType> {
        self.inner.marks.get(name)
    }

    /// The document's root node type (`doc` by default).
    pub fn top_node_type(&self) -> &NodeType {
        &self.inner.nodes[&self.inner.top]
    }

    /// The text leaf type, if registered.
    pub fn text_type(&self) -> Option<&NodeType> {
        self.inner.nodes.values().find(|t| t.is_text())
    }

    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.inner.nodes.values()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &MarkType> {
        self.inner.marks.values()
    }
}

/// One-shot builder for a [`Schema`]. Node and mark registration happens
/// here; [`SchemaBuilder::build`] compiles and seals the registry.
#[derive(Default)]
pub struct SchemaBuilder {
    nodes: Vec<NodeSpec>,
    marks: Vec<MarkSpec>,
    top: Option<String>,
}

impl SchemaBuilder {
    pub fn add_node(&mut self, spec: NodeSpec) -> &mut Self {
        self.nodes.push(spec);
        self
    }

    pub fn add_mark(&mut self, spec: MarkSpec) -> &mut Self {
        self.marks.push(spec);
        self
    }

    /// Name the root node type. Defaults to `doc`.
    pub fn top_node(&mut self, name: &str) -> &mut Self {
        self.top = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for spec in &self.nodes {
            if !names.insert(spec.name.clone()) {
                return Err(SchemaError::DuplicateNode(spec.name.clone()));
            }
            if let Some(group) = &spec.group {
                groups
                    .entry(group.clone())
                    .or_default()
                    .insert(spec.name.clone());
            }
        }

        let mut marks = BTreeMap::new();
        for spec in self.marks {
            check_attr_defaults(&spec.name, &spec.attrs)
                .map_err(|attr| SchemaError::InvalidDefault {
                    type_name: spec.name.clone(),
                    attr,
                })?;
            let mark = MarkType {
                inner: Arc::new(MarkTypeInner {
                    name: spec.name.clone(),
                    attrs: spec.attrs,
                    inclusive: spec.inclusive,
                }),
            };
            if marks.insert(spec.name.clone(), mark).is_some() {
                return Err(SchemaError::DuplicateMark(spec.name));
            }
        }

        // Names of types that can appear as marked inline content; used
        // for the default mark policy below.
        let text_names: BTreeSet<String> = self
            .nodes
            .iter()
            .filter(|spec| spec.name == "text")
            .map(|spec| spec.name.clone())
            .collect();

        let mut nodes = BTreeMap::new();
        for spec in self.nodes {
            check_attr_defaults(&spec.name, &spec.attrs)
                .map_err(|attr| SchemaError::InvalidDefault {
                    type_name: spec.name.clone(),
                    attr,
                })?;
            let is_text = spec.name == "text";
            let content = match &spec.content {
                Some(expr) => Some(ContentMatch::compile(&spec.name, expr, &names, &groups)?),
                None => None,
            };
            let marks_policy = match spec.marks {
                Some(policy) => {
                    if let MarkPolicy::Only(only) = &policy {
                        for mark in only {
                            if !marks.contains_key(mark) {
                                return Err(SchemaError::UnknownMark {
                                    type_name: spec.name.clone(),
                                    mark: mark.clone(),
                                });
                            }
                        }
                    }
                    policy
                }
                None => {
                    let can_hold_text = content
                        .as_ref()
                        .is_some_and(|m| text_names.iter().any(|t| m.references(t)));
                    if can_hold_text {
                        MarkPolicy::All
                    } else {
                        MarkPolicy::None
                    }
                }
            };
            let node = NodeType {
                inner: Arc::new(NodeTypeInner {
                    name: spec.name.clone(),
                    is_text,
                    content,
                    marks: marks_policy,
                    attrs: spec.attrs,
                }),
            };
            nodes.insert(spec.name, node);
        }

        let top = self.top.unwrap_or_else(|| "doc".to_string());
        if !nodes.contains_key(&top) {
            return Err(SchemaError::MissingNode(top));
        }

        Ok(Schema {
            inner: Arc::new(SchemaInner { nodes, marks, top }),
        })
    }
}

fn check_attr_defaults(
    _type_name: &str,
    attrs: &BTreeMap<String, AttrSpec>,
) -> Result<(), String> {
    for (name, spec) in attrs {
        if let Some(default) = spec.default_value()
            && !spec.is_valid(default)
        {
            return Err(name.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tiny_schema() -> Schema {
        let mut builder = Schema::builder();
        builder
            .add_node(NodeSpec::new("doc").content("block+"))
            .add_node(
                NodeSpec::new("paragraph")
                    .content("inline*")
                    .group("block"),
            )
            .add_node(
                NodeSpec::new("heading")
                    .content("inline*")
                    .group("block")
                    .attr(
                        "level",
                        AttrSpec::with_default(1).validated(|v| {
                            v.as_u64().is_some_and(|level| (1..=6).contains(&level))
                        }),
                    ),
            )
            .add_node(NodeSpec::new("text").group("inline"))
            .add_mark(MarkSpec::new("em"))
            .add_mark(MarkSpec::new("strong"));
        builder.build().expect("tiny schema should build")
    }

    #[test]
    fn builds_and_resolves_types() {
        let schema = tiny_schema();
        assert_eq!(schema.top_node_type().name(), "doc");
        assert!(schema.node_type("paragraph").is_some());
        assert!(schema.node_type("banana").is_none());
        assert!(schema.mark_type("em").is_some());
        assert!(schema.text_type().is_some());
    }

    #[test]
    fn default_mark_policy_follows_text_content() {
        let schema = tiny_schema();
        let em = schema.mark_type("em").unwrap().clone();
        // paragraph holds inline content, so its children may be marked
        assert!(schema.node_type("paragraph").unwrap().allows_mark(&em));
        // doc holds only blocks, so no marks
        assert!(!schema.node_type("doc").unwrap().allows_mark(&em));
    }

    #[test]
    fn malformed_expression_fails_build() {
        let mut builder = Schema::builder();
        builder
            .add_node(NodeSpec::new("doc").content("block+++"))
            .add_node(NodeSpec::new("text"));
        assert!(matches!(
            builder.build(),
            Err(SchemaError::MalformedContent { .. })
        ));
    }

    #[test]
    fn duplicate_node_type_fails_build() {
        let mut builder = Schema::builder();
        builder
            .add_node(NodeSpec::new("doc").content("text*"))
            .add_node(NodeSpec::new("doc"))
            .add_node(NodeSpec::new("text"));
        assert!(matches!(builder.build(), Err(SchemaError::DuplicateNode(_))));
    }

    #[test]
    fn missing_top_node_fails_build() {
        let mut builder = Schema::builder();
        builder.add_node(NodeSpec::new("paragraph"));
        assert!(matches!(builder.build(), Err(SchemaError::MissingNode(_))));
    }

    #[test]
    fn mark_policy_only_checks_registration() {
        let mut builder = Schema::builder();
        builder
            .add_node(NodeSpec::new("doc").content("text*").marks(MarkPolicy::Only(
                ["sparkle".to_string()].into_iter().collect(),
            )))
            .add_node(NodeSpec::new("text"));
        assert!(matches!(
            builder.build(),
            Err(SchemaError::UnknownMark { .. })
        ));
    }

    #[test]
    fn invalid_attr_default_fails_build() {
        let mut builder = Schema::builder();
        builder
            .add_node(NodeSpec::new("doc").content("text*"))
            .add_node(NodeSpec::new("text"))
            .add_mark(MarkSpec::new("link").attr(
                "href",
                AttrSpec::with_default(json!(42)).validated(|v| v.is_string()),
            ));
        assert!(matches!(
            builder.build(),
            Err(SchemaError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn node_type_equality_is_by_name() {
        let a = tiny_schema();
        let b = tiny_schema();
        assert_eq!(a.node_type("paragraph"), b.node_type("paragraph"));
        assert_ne!(a.node_type("paragraph"), b.node_type("heading"));
    }
}
