/*!
 * # Decoration Overlay Engine
 *
 * Decorations are transient visual annotations layered over a document
 * without touching it: widgets anchored at a position, inline styling
 * over a range, node styling over a node's extent. They are recomputed
 * from registered sources after every committed change rather than
 * patched incrementally.
 *
 * [`DecorationSet::build`] is total: stale positions are clamped into
 * the document and inverted ranges are normalized, so a source holding
 * positions from a previous document degrades gracefully instead of
 * failing. Overlapping inline decorations are composed into disjoint
 * styled segments, later decorations winning on property clashes.
 */

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::model::Node;
use crate::transform::Mapping;

/// Ordered CSS-property map attached to an inline or node decoration.
pub type Style = std::collections::BTreeMap<String, String>;

/// One visual annotation over the document. Serializable so the
/// rendering layer can take the overlay across a process or FFI
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoration {
    /// Content anchored at a position, described by an opaque payload
    /// the rendering layer interprets.
    Widget { pos: usize, spec: Value },
    /// Styling applied to the inline content in a range.
    Inline { from: usize, to: usize, style: Style },
    /// Styling applied to the nodes covered by a range.
    Node { from: usize, to: usize, style: Style },
}

impl Decoration {
    pub fn widget(pos: usize, spec: Value) -> Self {
        Decoration::Widget { pos, spec }
    }

    pub fn inline(from: usize, to: usize, style: Style) -> Self {
        Decoration::Inline { from, to, style }
    }

    pub fn node(from: usize, to: usize, style: Style) -> Self {
        Decoration::Node { from, to, style }
    }
}

/// What a decoration source sees when it is invoked: the document the
/// decorations will be laid over and, when the recomputation follows a
/// committed transaction, that transaction's position mapping so stored
/// ranges can be carried across the change.
pub struct DecorationContext<'a> {
    pub doc: &'a Node,
    pub mapping: Option<&'a Mapping>,
}

/// A registered decoration provider. Sources run in registration order
/// and their outputs are concatenated before composition.
pub type DecorationSource = Box<dyn Fn(&DecorationContext<'_>) -> Vec<Decoration>>;

/// An inline segment of the composed overlay. Segments are disjoint,
/// sorted, and carry the merged style of every decoration covering them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineSegment {
    pub from: usize,
    pub to: usize,
    pub style: Style,
}

/// The composed, document-ready overlay. Building it never fails; equal
/// inputs always produce equal sets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DecorationSet {
    widgets: Vec<(usize, Value)>,
    inline: Vec<InlineSegment>,
    nodes: Vec<(usize, usize, Style)>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compose raw decorations over a document.
    ///
    /// Every position is clamped into `0..=content_size`; a range whose
    /// ends arrive inverted is normalized by swapping them. Inline
    /// decorations are flattened into disjoint segments: where several
    /// overlap, their styles merge with later decorations overriding
    /// earlier ones property by property.
    pub fn build(doc: &Node, decorations: Vec<Decoration>) -> Self {
        let max = doc.content_size();
        let mut widgets = Vec::new();
        let mut inline_ranges = Vec::new();
        let mut nodes = Vec::new();
        for decoration in decorations {
            match decoration {
                Decoration::Widget { pos, spec } => widgets.push((pos.min(max), spec)),
                Decoration::Inline { from, to, style } => {
                    let (from, to) = normalize(from, to, max);
                    if from < to {
                        inline_ranges.push((from, to, style));
                    }
                }
                Decoration::Node { from, to, style } => {
                    let (from, to) = normalize(from, to, max);
                    nodes.push((from, to, style));
                }
            }
        }
        widgets.sort_by_key(|&(pos, _)| pos);
        nodes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        Self {
            widgets,
            inline: compose_inline(inline_ranges),
            nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty() && self.inline.is_empty() && self.nodes.is_empty()
    }

    pub fn widgets(&self) -> &[(usize, Value)] {
        &self.widgets
    }

    pub fn inline_segments(&self) -> &[InlineSegment] {
        &self.inline
    }

    pub fn node_ranges(&self) -> &[(usize, usize, Style)] {
        &self.nodes
    }
}

fn normalize(from: usize, to: usize, max: usize) -> (usize, usize) {
    let from = from.min(max);
    let to = to.min(max);
    if from <= to { (from, to) } else { (to, from) }
}

/// Flatten overlapping ranges into disjoint segments. A boundary sweep:
/// every range edge starts a new segment, each segment takes the merged
/// style of the ranges covering it (input order decides clashes), and
/// adjacent segments with identical style are fused back together.
fn compose_inline(ranges: Vec<(usize, usize, Style)>) -> Vec<InlineSegment> {
    let boundaries: BTreeSet<usize> = ranges
        .iter()
        .flat_map(|&(from, to, _)| [from, to])
        .collect();
    let mut segments: Vec<InlineSegment> = Vec::new();
    for (&from, &to) in boundaries.iter().zip(boundaries.iter().skip(1)) {
        let mut style = Style::new();
        let mut covered = false;
        for (rfrom, rto, rstyle) in &ranges {
            if *rfrom <= from && to <= *rto {
                covered = true;
                for (key, value) in rstyle {
                    style.insert(key.clone(), value.clone());
                }
            }
        }
        if !covered {
            continue;
        }
        if let Some(last) = segments.last_mut()
            && last.to == from
            && last.style == style
        {
            last.to = to;
            continue;
        }
        segments.push(InlineSegment { from, to, style });
    }
    segments
}
