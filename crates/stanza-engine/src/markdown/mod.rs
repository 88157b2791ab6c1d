/*!
 * # Markdown codec
 *
 * The external boundary for document content: [`parse`] builds a
 * schema-validated document from markdown text, [`serialize`] writes one
 * back out. Both sides target the stock schema from
 * [`crate::schema::basic`].
 *
 * Round-trip contract: `parse(serialize(doc))` is structurally equal to
 * `doc` for documents over the supported node and mark types. Textual
 * drift in the markdown (whitespace, delimiter choice) is fine,
 * structural drift is not.
 */

mod parse;
mod serialize;

pub use parse::parse;
pub use serialize::serialize;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attrs, MarkSet, Node};
    use crate::schema::Schema;
    use crate::schema::basic::document_schema;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::paragraphs("One.\n\nTwo!\n")]
    #[case::headings("# Top\n\n## Sub\n\nBody.\n")]
    #[case::marks("plain *em* **strong** `code`\n")]
    #[case::links("see [the docs](https://example.org \"Docs\") here\n")]
    #[case::bullet_list("- first\n- second\n- third\n")]
    #[case::ordered_list("2. second\n3. third\n")]
    #[case::blockquote("> quoted line\n>\n> second paragraph\n")]
    #[case::fenced_code("```rust\nfn main() {}\n```\n")]
    #[case::mixed("# Title\n\nIntro with *emphasis*.\n\n- a\n- b\n\n> aside\n")]
    fn serialize_then_parse_is_structurally_stable(#[case] input: &str) {
        let schema = document_schema().unwrap();
        let doc = parse(&schema, input).unwrap();
        let rendered = serialize(&doc);
        let reparsed = parse(&schema, &rendered).unwrap();
        assert_eq!(reparsed, doc, "markdown:\n{rendered}");
    }

    fn paragraph_of(schema: &Schema, s: &str) -> Node {
        let text = schema.text(s).unwrap();
        schema
            .node("paragraph", &Attrs::new(), vec![text], MarkSet::empty())
            .unwrap()
    }

    // built programmatically so the delimiters are literal text, not markup
    #[rstest]
    #[case::inline_delimiters("*hi* and `tick`")]
    #[case::brackets("[not](a-link)")]
    #[case::backslash(r"a \ b")]
    #[case::leading_hash("# not a heading")]
    #[case::leading_dash("- not a list")]
    #[case::leading_quote("> not a quote")]
    #[case::leading_number("12. not ordered")]
    fn literal_text_survives_a_round_trip(#[case] content: &str) {
        let schema = document_schema().unwrap();
        let doc = schema
            .node(
                "doc",
                &Attrs::new(),
                vec![paragraph_of(&schema, content)],
                MarkSet::empty(),
            )
            .unwrap();
        let rendered = serialize(&doc);
        let reparsed = parse(&schema, &rendered).unwrap();
        assert_eq!(reparsed, doc, "markdown:\n{rendered}");
    }
}
