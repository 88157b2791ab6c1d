//! JSON interchange for documents.
//!
//! The encoding mirrors the tree: `{"type": ..., "attrs": ..., "marks":
//! ..., "content": [...]}` for element nodes and `{"type": "text",
//! "text": ...}` for text runs. Empty attrs, marks and content are
//! omitted. Decoding goes through the schema's validating constructors,
//! so a hand-edited or stale payload that violates the schema is
//! rejected rather than smuggled into a tree.

use serde_json::{Map, Value, json};

use crate::schema::Schema;

use super::{Attrs, Mark, MarkSet, ModelError, Node};

/// Encode a node (usually a document root) as a JSON value.
pub fn node_to_json(node: &Node) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(node.name()));
    if !node.attrs().is_empty() {
        obj.insert("attrs".to_string(), json!(node.attrs()));
    }
    if !node.marks().is_empty() {
        let marks: Vec<Value> = node.marks().iter().map(mark_to_json).collect();
        obj.insert("marks".to_string(), Value::Array(marks));
    }
    if let Some(text) = node.text() {
        obj.insert("text".to_string(), json!(text));
    } else if node.child_count() > 0 {
        let content: Vec<Value> = node.content().children().map(node_to_json).collect();
        obj.insert("content".to_string(), Value::Array(content));
    }
    Value::Object(obj)
}

fn mark_to_json(mark: &Mark) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(mark.kind().name()));
    if !mark.attrs().is_empty() {
        obj.insert("attrs".to_string(), json!(mark.attrs()));
    }
    Value::Object(obj)
}

/// Decode a node from its JSON encoding, re-validating every node and
/// mark against `schema`.
pub fn node_from_json(schema: &Schema, value: &Value) -> Result<Node, ModelError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ModelError::MalformedJson("node must be an object".to_string()))?;
    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::MalformedJson("node is missing a `type` string".to_string()))?;
    let attrs = decode_attrs(obj.get("attrs"))?;
    let marks = decode_marks(schema, obj.get("marks"))?;

    if let Some(text) = obj.get("text") {
        let text = text
            .as_str()
            .ok_or_else(|| ModelError::MalformedJson("`text` must be a string".to_string()))?;
        return schema.text_with_marks(text, marks);
    }

    let mut children = Vec::new();
    if let Some(content) = obj.get("content") {
        let items = content
            .as_array()
            .ok_or_else(|| ModelError::MalformedJson("`content` must be an array".to_string()))?;
        for item in items {
            children.push(node_from_json(schema, item)?);
        }
    }
    schema.node(type_name, &attrs, children, marks)
}

fn decode_attrs(value: Option<&Value>) -> Result<Attrs, ModelError> {
    match value {
        None | Some(Value::Null) => Ok(Attrs::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Some(_) => Err(ModelError::MalformedJson(
            "`attrs` must be an object".to_string(),
        )),
    }
}

fn decode_marks(schema: &Schema, value: Option<&Value>) -> Result<MarkSet, ModelError> {
    let Some(value) = value else {
        return Ok(MarkSet::empty());
    };
    let items = value
        .as_array()
        .ok_or_else(|| ModelError::MalformedJson("`marks` must be an array".to_string()))?;
    let mut set = MarkSet::empty();
    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| ModelError::MalformedJson("mark must be an object".to_string()))?;
        let type_name = obj.get("type").and_then(Value::as_str).ok_or_else(|| {
            ModelError::MalformedJson("mark is missing a `type` string".to_string())
        })?;
        let attrs = decode_attrs(obj.get("attrs"))?;
        set = set.add(schema.mark(type_name, &attrs)?);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attrs, attrs};
    use crate::schema::basic::document_schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_doc(schema: &Schema) -> Node {
        let em = schema.mark("em", &Attrs::new()).unwrap();
        let heading = schema
            .node(
                "heading",
                &attrs([("level", json!(2))]),
                vec![schema.text("Title").unwrap()],
                MarkSet::empty(),
            )
            .unwrap();
        let paragraph = schema
            .node(
                "paragraph",
                &Attrs::new(),
                vec![
                    schema.text("plain ").unwrap(),
                    schema
                        .text_with_marks("emphatic", MarkSet::empty().add(em))
                        .unwrap(),
                ],
                MarkSet::empty(),
            )
            .unwrap();
        schema
            .node("doc", &Attrs::new(), vec![heading, paragraph], MarkSet::empty())
            .unwrap()
    }

    #[test]
    fn encode_shape_omits_empty_fields() {
        let schema = document_schema().unwrap();
        let doc = sample_doc(&schema);
        let value = node_to_json(&doc);
        assert_eq!(
            value,
            json!({
                "type": "doc",
                "content": [
                    {
                        "type": "heading",
                        "attrs": {"level": 2},
                        "content": [{"type": "text", "text": "Title"}],
                    },
                    {
                        "type": "paragraph",
                        "content": [
                            {"type": "text", "text": "plain "},
                            {"type": "text", "text": "emphatic", "marks": [{"type": "em"}]},
                        ],
                    },
                ],
            })
        );
    }

    #[test]
    fn decode_round_trips() {
        let schema = document_schema().unwrap();
        let doc = sample_doc(&schema);
        let decoded = node_from_json(&schema, &node_to_json(&doc)).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn decode_rejects_schema_violations() {
        let schema = document_schema().unwrap();
        // a doc with a bare text child breaks "block+"
        let err = node_from_json(
            &schema,
            &json!({"type": "doc", "content": [{"type": "text", "text": "loose"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ContentMismatch { .. }));

        // attribute validation also runs on decode
        let err = node_from_json(
            &schema,
            &json!({
                "type": "doc",
                "content": [{
                    "type": "heading",
                    "attrs": {"level": 99},
                    "content": [{"type": "text", "text": "t"}],
                }],
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidAttrValue { .. }));
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        let schema = document_schema().unwrap();
        for bad in [
            json!(42),
            json!({"content": []}),
            json!({"type": "doc", "content": {"not": "an array"}}),
            json!({"type": "text", "text": 7}),
        ] {
            let err = node_from_json(&schema, &bad).unwrap_err();
            assert!(matches!(err, ModelError::MalformedJson(_)), "{bad}");
        }
    }
}
