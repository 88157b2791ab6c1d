//! Markdown → document, via `pulldown-cmark` events.

use anyhow::{Context, Result, anyhow};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde_json::json;

use crate::model::{Attrs, MarkSet, Node, attrs};
use crate::schema::Schema;

/// Parse markdown text into a document over `schema` (expected to be the
/// stock schema from [`crate::schema::basic`], or one using the same
/// type names).
///
/// The document is built bottom-up through the schema's validating
/// constructors, so the output always passes validation. Constructs the
/// schema has no type for (rules, tables, raw HTML blocks) are dropped;
/// their inline text is kept and wrapped into paragraphs where needed.
pub fn parse(schema: &Schema, text: &str) -> Result<Node> {
    let mut builder = Builder {
        schema,
        stack: vec![Frame::new("doc", Attrs::new())],
        marks: MarkSet::empty(),
    };
    for event in Parser::new_ext(text, Options::empty()) {
        builder.event(event)?;
    }
    builder.finish()
}

struct Frame {
    name: &'static str,
    attrs: Attrs,
    children: Vec<Node>,
    /// Verbatim buffer, used only by code blocks.
    code: String,
}

impl Frame {
    fn new(name: &'static str, attrs: Attrs) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
            code: String::new(),
        }
    }
}

struct Builder<'a> {
    schema: &'a Schema,
    stack: Vec<Frame>,
    marks: MarkSet,
}

impl Builder<'_> {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(text) => {
                let code = self.schema.mark("code", &Attrs::new())?;
                let marks = self.marks.add(code);
                self.push_child(self.schema.text_with_marks(&text, marks)?);
                Ok(())
            }
            Event::SoftBreak | Event::HardBreak => self.text(" "),
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            // no counterpart in the schema
            _ => Ok(()),
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) -> Result<()> {
        match tag {
            Tag::Paragraph => self.push_frame("paragraph", Attrs::new()),
            Tag::Heading { level, .. } => {
                self.push_frame("heading", attrs([("level", json!(level as u64))]));
            }
            Tag::BlockQuote(_) => self.push_frame("blockquote", Attrs::new()),
            Tag::CodeBlock(kind) => {
                let params = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.push_frame("code_block", attrs([("params", json!(params))]));
            }
            Tag::List(Some(start)) => {
                self.push_frame("ordered_list", attrs([("order", json!(start))]));
            }
            Tag::List(None) => self.push_frame("bullet_list", Attrs::new()),
            Tag::Item => self.push_frame("list_item", Attrs::new()),
            Tag::Emphasis => self.add_mark("em", Attrs::new())?,
            Tag::Strong => self.add_mark("strong", Attrs::new())?,
            Tag::Link {
                dest_url, title, ..
            } => {
                let title = if title.is_empty() {
                    serde_json::Value::Null
                } else {
                    json!(title.as_ref())
                };
                self.add_mark(
                    "link",
                    attrs([("href", json!(dest_url.as_ref())), ("title", title)]),
                )?;
            }
            // unsupported container; its text still flows into the
            // enclosing frame
            _ => {}
        }
        Ok(())
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<()> {
        match tag {
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::CodeBlock
            | TagEnd::List(_)
            | TagEnd::Item => self.pop_frame(),
            TagEnd::Emphasis => {
                self.marks = self.marks.remove_type("em");
                Ok(())
            }
            TagEnd::Strong => {
                self.marks = self.marks.remove_type("strong");
                Ok(())
            }
            TagEnd::Link => {
                self.marks = self.marks.remove_type("link");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let top = self.top()?;
        if top.name == "code_block" {
            top.code.push_str(text);
            return Ok(());
        }
        let node = self.schema.text_with_marks(text, self.marks.clone())?;
        self.push_child(node)
    }

    fn add_mark(&mut self, name: &str, given: Attrs) -> Result<()> {
        self.marks = self.marks.add(self.schema.mark(name, &given)?);
        Ok(())
    }

    fn push_frame(&mut self, name: &'static str, attrs: Attrs) {
        self.stack.push(Frame::new(name, attrs));
    }

    fn pop_frame(&mut self) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| anyhow!("unbalanced markdown events"))?;
        let node = self.build_frame(frame)?;
        self.push_child(node)
    }

    fn build_frame(&self, frame: Frame) -> Result<Node> {
        let mut children = frame.children;
        if frame.name == "code_block" {
            let code = frame.code.strip_suffix('\n').unwrap_or(&frame.code);
            if !code.is_empty() {
                children.push(self.schema.text(code)?);
            }
        }
        // block containers may have collected loose inline text (tight
        // list items, dropped constructs); wrap those runs in paragraphs
        if matches!(frame.name, "doc" | "blockquote" | "list_item") {
            children = self.wrap_loose_inline(children)?;
        }
        match frame.name {
            "doc" | "blockquote" if children.is_empty() => {
                children.push(self.paragraph_of(vec![])?);
            }
            // list items must open with a paragraph, which an item made
            // of just a nested list does not have
            "list_item"
                if children
                    .first()
                    .is_none_or(|child| child.name() != "paragraph") =>
            {
                children.insert(0, self.paragraph_of(vec![])?);
            }
            _ => {}
        }
        self.schema
            .node(frame.name, &frame.attrs, children, MarkSet::empty())
            .with_context(|| format!("building `{}` from markdown", frame.name))
    }

    fn wrap_loose_inline(&self, children: Vec<Node>) -> Result<Vec<Node>> {
        let mut wrapped = Vec::with_capacity(children.len());
        let mut run: Vec<Node> = Vec::new();
        for child in children {
            if child.is_text() {
                run.push(child);
            } else {
                if !run.is_empty() {
                    wrapped.push(self.paragraph_of(std::mem::take(&mut run))?);
                }
                wrapped.push(child);
            }
        }
        if !run.is_empty() {
            wrapped.push(self.paragraph_of(run)?);
        }
        Ok(wrapped)
    }

    fn paragraph_of(&self, children: Vec<Node>) -> Result<Node> {
        Ok(self
            .schema
            .node("paragraph", &Attrs::new(), children, MarkSet::empty())?)
    }

    fn push_child(&mut self, node: Node) -> Result<()> {
        let children = &mut self.top()?.children;
        // keep documents canonical: adjacent text runs with the same
        // markup become one run, even when the source split them (escape
        // sequences, entity references)
        if node.is_text()
            && let Some(last) = children.last_mut()
            && last.is_text()
            && last.same_markup(&node)
        {
            *last = last.with_text(format!(
                "{}{}",
                last.text().unwrap_or_default(),
                node.text().unwrap_or_default()
            ));
            return Ok(());
        }
        children.push(node);
        Ok(())
    }

    fn top(&mut self) -> Result<&mut Frame> {
        self.stack
            .last_mut()
            .ok_or_else(|| anyhow!("unbalanced markdown events"))
    }

    fn finish(mut self) -> Result<Node> {
        let root = self
            .stack
            .pop()
            .filter(|frame| frame.name == "doc" && self.stack.is_empty())
            .ok_or_else(|| anyhow!("unbalanced markdown events"))?;
        self.build_frame(root)
    }
}
