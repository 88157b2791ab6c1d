//! Slicing and the atomic `replace` primitive.
//!
//! A [`Slice`] is a fragment whose first and last nodes may be "open":
//! cut through at `open_start`/`open_end` levels, so a range spanning
//! node boundaries carries the partial nodes on either side. `replace`
//! rebuilds only the nodes along the path from the shared ancestor of the
//! edited range to the root; unaffected siblings are shared with the old
//! tree. Every rebuilt node is validated against the schema, and any
//! failure returns before a new root exists, which is what makes the
//! operation atomic.

use super::node::check_content;
use super::{Fragment, ModelError, Node, ResolvedPos};

/// A piece of a document: content plus the number of levels the first
/// and last child are cut open on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    pub fn empty() -> Self {
        Self {
            content: Fragment::empty(),
            open_start: 0,
            open_end: 0,
        }
    }

    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn open_start(&self) -> usize {
        self.open_start
    }

    pub fn open_end(&self) -> usize {
        self.open_end
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of position tokens inserting this slice adds: open-side
    /// boundary tokens do not exist once the slice is joined in.
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }
}

impl Node {
    /// Cut out the slice between two positions of this node's content.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from > to {
            return Err(ModelError::InvalidPosition { pos: from, max: to });
        }
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(from - start, to - start);
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }

    /// Replace the range `from..to` with a slice, producing a new
    /// validated tree. The original is untouched; on any error the
    /// caller keeps exactly the tree it had.
    ///
    /// Positions are offsets into this node's content space
    /// (`0..=content_size`). A non-empty slice must open to the same
    /// depths as the range ends it is joined to.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        if from > to {
            return Err(ModelError::InvalidPosition { pos: from, max: to });
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        replace_resolved(&rfrom, &rto, slice)
    }
}

pub(crate) fn replace_resolved(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ModelError> {
    if slice.open_start() > rfrom.depth() {
        return Err(ModelError::InvalidSlice(
            "inserted content opens deeper than the insertion position".to_string(),
        ));
    }
    if !slice.is_empty()
        && rfrom.depth() - slice.open_start() != rto.depth() - slice.open_end()
    {
        return Err(ModelError::InvalidSlice(
            "inconsistent open depths".to_string(),
        ));
    }
    replace_outer(rfrom, rto, slice, 0)
}

fn replace_outer(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ModelError> {
    let index = rfrom.index(depth);
    let node = rfrom.node(depth);
    if index == rto.index(depth) && depth < rfrom.depth() - slice.open_start() {
        // Both ends and the slice reach deeper through the same child:
        // rebuild that child, share every sibling.
        let inner = replace_outer(rfrom, rto, slice, depth + 1)?;
        Ok(node.copy(node.content().replace_child(index, inner)))
    } else if slice.is_empty() {
        close(node, delete_range(rfrom, rto, depth)?)
    } else if slice.open_start() == 0
        && slice.open_end() == 0
        && rfrom.depth() == depth
        && rto.depth() == depth
    {
        // Flat replacement within a single parent.
        let content = node.content();
        let merged = content
            .cut(0, rfrom.parent_offset())
            .append(slice.content())
            .append(&content.cut(rto.parent_offset(), content.size()));
        close(node, merged)
    } else {
        let (start, end) = prepare_slice_for_replace(slice, rfrom)?;
        let content = replace_three_way(rfrom, &start, &end, rto, depth)?;
        close(node, content)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ModelError> {
    if sub.kind().compatible_content(main.kind()) {
        Ok(())
    } else {
        Err(ModelError::CannotJoin {
            left: sub.name().to_string(),
            right: main.name().to_string(),
        })
    }
}

fn joinable(
    rbefore: &ResolvedPos,
    rafter: &ResolvedPos,
    depth: usize,
) -> Result<Node, ModelError> {
    let node = rbefore.node(depth);
    check_join(node, rafter.node(depth))?;
    Ok(node.clone())
}

/// Push a node, merging a text node into a preceding text node with the
/// same markup.
fn add_node(child: Node, target: &mut Vec<Node>) {
    if let Some(last) = target.last()
        && last.is_text()
        && child.is_text()
        && child.same_markup(last)
    {
        let merged = last.with_text(format!(
            "{}{}",
            last.text().unwrap_or_default(),
            child.text().unwrap_or_default()
        ));
        *target.last_mut().expect("non-empty") = merged;
    } else {
        target.push(child);
    }
}

/// Add the children of the node at `depth` between the two bounds. A
/// `None` bound means the start (resp. end) of that node's content. A
/// bound splitting a text node contributes the partial text run.
fn add_range(
    rstart: Option<&ResolvedPos>,
    rend: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let node = rend.or(rstart).expect("at least one bound").node(depth);
    let mut start_index = 0;
    if let Some(rs) = rstart {
        start_index = rs.index(depth);
        if rs.depth() > depth {
            start_index += 1;
        } else if rs.text_offset() > 0 {
            if let Some(after) = rs.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    let end_index = rend.map(|re| re.index(depth)).unwrap_or(node.child_count());
    for i in start_index..end_index {
        if let Some(child) = node.child(i) {
            add_node(child.clone(), target);
        }
    }
    if let Some(re) = rend
        && re.depth() == depth
        && re.text_offset() > 0
        && let Some(before) = re.node_before()
    {
        add_node(before, target);
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ModelError> {
    check_content(node.kind(), &content)?;
    Ok(node.copy(content))
}

/// Content of the node at `depth` that lies before `rfrom`, with the
/// partial child on the right edge closed recursively.
fn keep_before(rfrom: &ResolvedPos, depth: usize) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    if rfrom.depth() > depth {
        let child = rfrom.node(depth + 1).clone();
        let inner = keep_before(rfrom, depth + 1)?;
        add_node(close(&child, inner)?, &mut content);
    }
    Ok(Fragment::from_nodes(content))
}

/// Content of the node at `depth` that lies after `rto`, with the
/// partial child on the left edge closed recursively.
fn keep_after(rto: &ResolvedPos, depth: usize) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    if rto.depth() > depth {
        let child = rto.node(depth + 1).clone();
        let inner = keep_after(rto, depth + 1)?;
        add_node(close(&child, inner)?, &mut content);
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

/// Rebuild the content of the node at `depth` with the range between the
/// bounds deleted. When both bounds reach deeper, the partial nodes on
/// either side are joined (types permitting); when only one side is
/// open, its remainder is closed back into its own node.
fn delete_range(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    if rfrom.depth() > depth && rto.depth() > depth {
        let node = joinable(rfrom, rto, depth + 1)?;
        let inner = delete_range(rfrom, rto, depth + 1)?;
        add_node(close(&node, inner)?, &mut content);
    } else if rto.depth() > depth {
        let child = rto.node(depth + 1).clone();
        let inner = keep_after(rto, depth + 1)?;
        add_node(close(&child, inner)?, &mut content);
    } else if rfrom.depth() > depth {
        let child = rfrom.node(depth + 1).clone();
        let inner = keep_before(rfrom, depth + 1)?;
        add_node(close(&child, inner)?, &mut content);
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

fn replace_three_way(
    rfrom: &ResolvedPos,
    rstart: &ResolvedPos,
    rend: &ResolvedPos,
    rto: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let open_start = if rfrom.depth() > depth {
        Some(joinable(rfrom, rstart, depth + 1)?)
    } else {
        None
    };
    let open_end = if rto.depth() > depth {
        Some(joinable(rend, rto, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(start_node), Some(end_node)) if rstart.index(depth) == rend.index(depth) => {
            check_join(start_node, end_node)?;
            let inner = replace_three_way(rfrom, rstart, rend, rto, depth + 1)?;
            add_node(close(start_node, inner)?, &mut content);
        }
        _ => {
            if let Some(start_node) = &open_start {
                let inner = replace_two_way(rfrom, rstart, depth + 1)?;
                add_node(close(start_node, inner)?, &mut content);
            }
            add_range(Some(rstart), Some(rend), depth, &mut content);
            if let Some(end_node) = &open_end {
                let inner = replace_two_way(rend, rto, depth + 1)?;
                add_node(close(end_node, inner)?, &mut content);
            }
        }
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

/// Join the content between two bounds that reach equally deep.
fn replace_two_way(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    if rfrom.depth() > depth {
        let node = joinable(rfrom, rto, depth + 1)?;
        let inner = replace_two_way(rfrom, rto, depth + 1)?;
        add_node(close(&node, inner)?, &mut content);
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

/// Wrap the slice content in the ancestors of the insertion position so
/// its open edges can be resolved like ordinary positions.
fn prepare_slice_for_replace(
    slice: &Slice,
    ralong: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ModelError> {
    let extra = ralong.depth() - slice.open_start();
    let parent = ralong.node(extra);
    let mut node = parent.copy(slice.content().clone());
    for i in (0..extra).rev() {
        node = ralong.node(i).copy(Fragment::from_nodes(vec![node]));
    }
    let start = node.resolve(slice.open_start() + extra)?;
    let end_pos = node
        .content_size()
        .checked_sub(slice.open_end() + extra)
        .ok_or_else(|| ModelError::InvalidSlice("slice opens past its own content".to_string()))?;
    let end = node.resolve(end_pos)?;
    Ok((start, end))
}
