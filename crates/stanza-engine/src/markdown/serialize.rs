//! Document → markdown text.

use serde_json::Value;

use crate::model::Node;

/// Serialize a document built over the stock schema back to markdown.
///
/// Total over valid documents: node types without a markdown rendering
/// fall back to their inline text.
pub fn serialize(doc: &Node) -> String {
    let blocks: Vec<String> = doc.content().children().map(render_block).collect();
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

fn render_block(node: &Node) -> String {
    match node.name() {
        "paragraph" => render_inline(node),
        "heading" => {
            let level = node.attr("level").and_then(Value::as_u64).unwrap_or(1) as usize;
            format!("{} {}", "#".repeat(level), render_inline(node))
        }
        "blockquote" => {
            let inner: Vec<String> = node.content().children().map(render_block).collect();
            prefix_lines(&inner.join("\n\n"), "> ", "> ")
        }
        "code_block" => {
            let params = node
                .attr("params")
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("```{params}\n{}\n```", node.text_content())
        }
        "bullet_list" => {
            let items: Vec<String> = node
                .content()
                .children()
                .map(|item| render_list_item(item, "- "))
                .collect();
            items.join("\n")
        }
        "ordered_list" => {
            let start = node.attr("order").and_then(Value::as_u64).unwrap_or(1);
            let items: Vec<String> = node
                .content()
                .children()
                .enumerate()
                .map(|(i, item)| render_list_item(item, &format!("{}. ", start + i as u64)))
                .collect();
            items.join("\n")
        }
        _ => render_inline(node),
    }
}

fn render_list_item(item: &Node, marker: &str) -> String {
    let inner: Vec<String> = item.content().children().map(render_block).collect();
    let continuation = " ".repeat(marker.len());
    prefix_lines(&inner.join("\n\n"), marker, &continuation)
}

fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == 0 { first } else { rest };
            if line.is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_inline(parent: &Node) -> String {
    // paragraph content opens the line, so block-opener characters in the
    // first run need escaping too
    let start_of_line = parent.name() == "paragraph";
    parent
        .content()
        .children()
        .enumerate()
        .map(|(i, child)| render_text(child, start_of_line && i == 0))
        .collect()
}

/// One text run, wrapped in the delimiters of its marks: code innermost,
/// then emphasis, strong, and the link syntax outermost.
fn render_text(node: &Node, start_of_line: bool) -> String {
    let marks = node.marks();
    let raw = node.text().unwrap_or_default();
    // code spans are verbatim; everything else gets its markdown
    // metacharacters backslash-escaped so literal text reparses as
    // literal text
    let mut out = if marks.contains_type("code") {
        raw.to_string()
    } else {
        escape_text(raw, start_of_line)
    };
    if marks.contains_type("code") {
        out = format!("`{out}`");
    }
    if marks.contains_type("em") {
        out = format!("*{out}*");
    }
    if marks.contains_type("strong") {
        out = format!("**{out}**");
    }
    if let Some(link) = marks.get("link") {
        let href = link.attr("href").and_then(Value::as_str).unwrap_or_default();
        out = match link.attr("title").and_then(Value::as_str) {
            Some(title) => format!("[{out}]({href} \"{title}\")"),
            None => format!("[{out}]({href})"),
        };
    }
    out
}

/// Backslash-escape the characters that would otherwise reparse as
/// markup: inline delimiters everywhere, block openers (`#`, `-`, `+`,
/// `>`, `1.`) only when the run opens its line.
fn escape_text(text: &str, start_of_line: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    if start_of_line {
        match out.chars().next() {
            Some('#' | '-' | '+' | '>') => out.insert(0, '\\'),
            Some(c) if c.is_ascii_digit() => {
                let digits = out.chars().take_while(char::is_ascii_digit).count();
                if out[digits..].starts_with('.') {
                    out.insert(digits, '\\');
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attrs, MarkSet, attrs};
    use crate::schema::Schema;
    use crate::schema::basic::document_schema;
    use serde_json::json;

    fn text(schema: &Schema, s: &str) -> Node {
        schema.text(s).unwrap()
    }

    fn block(schema: &Schema, name: &str, attrs: &Attrs, children: Vec<Node>) -> Node {
        schema.node(name, attrs, children, MarkSet::empty()).unwrap()
    }

    #[test]
    fn blocks_headings_and_marks() {
        let schema = document_schema().unwrap();
        let em = schema.mark("em", &Attrs::new()).unwrap();
        let doc = block(
            &schema,
            "doc",
            &Attrs::new(),
            vec![
                block(
                    &schema,
                    "heading",
                    &attrs([("level", json!(2))]),
                    vec![text(&schema, "Title")],
                ),
                block(
                    &schema,
                    "paragraph",
                    &Attrs::new(),
                    vec![
                        text(&schema, "plain "),
                        schema
                            .text_with_marks("emphatic", MarkSet::empty().add(em))
                            .unwrap(),
                    ],
                ),
            ],
        );
        insta::assert_snapshot!(serialize(&doc), @r###"
        ## Title

        plain *emphatic*
        "###);
    }

    #[test]
    fn lists_and_quotes_carry_prefixes() {
        let schema = document_schema().unwrap();
        let item = |s: &str| {
            block(
                &schema,
                "list_item",
                &Attrs::new(),
                vec![block(
                    &schema,
                    "paragraph",
                    &Attrs::new(),
                    vec![text(&schema, s)],
                )],
            )
        };
        let doc = block(
            &schema,
            "doc",
            &Attrs::new(),
            vec![
                block(
                    &schema,
                    "bullet_list",
                    &Attrs::new(),
                    vec![item("first"), item("second")],
                ),
                block(
                    &schema,
                    "blockquote",
                    &Attrs::new(),
                    vec![block(
                        &schema,
                        "paragraph",
                        &Attrs::new(),
                        vec![text(&schema, "quoted")],
                    )],
                ),
            ],
        );
        insta::assert_snapshot!(serialize(&doc), @r###"
        - first
        - second

        > quoted
        "###);
    }

    #[test]
    fn fenced_code_keeps_params() {
        let schema = document_schema().unwrap();
        let doc = block(
            &schema,
            "doc",
            &Attrs::new(),
            vec![block(
                &schema,
                "code_block",
                &attrs([("params", json!("rust"))]),
                vec![text(&schema, "let x = 1;")],
            )],
        );
        insta::assert_snapshot!(serialize(&doc), @r###"
        ```rust
        let x = 1;
        ```
        "###);
    }
}
