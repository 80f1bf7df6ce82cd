//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

// Tree-sitter types for node helpers
use tree_sitter::Node;

/// Pure offset helpers shared by every text rewriter
pub struct OffsetUtils;

impl OffsetUtils
{
    /// Return `text[..start] + replacement + text[end..]`,
    /// None if the range is inverted, out of bounds, or not on
    /// char boundaries
    pub fn replace(
        text: &str,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> Option<String>
    {
        // Checked slicing enforces boundary safety
        let head = text.get(..start)?;
        let tail = text.get(end..)?;

        if start > end
        {
            return None;
        }

        // Pre-size to the exact output length
        let mut out = String::with_capacity(head.len() + replacement.len() + tail.len());
        out.push_str(head);
        out.push_str(replacement);
        out.push_str(tail);

        Some(out)
    }

    /// Signed length change of replacing `old_len` bytes by
    /// `new_len` bytes
    pub fn delta(
        old_len: usize,
        new_len: usize,
    ) -> isize
    {
        new_len as isize - old_len as isize
    }

    /// Move an offset by a signed delta
    pub fn shift(
        offset: usize,
        delta: isize,
    ) -> usize
    {
        offset.saturating_add_signed(delta)
    }
}

/// UTF-8 safe slicing helpers
pub struct Utf8Utils;

impl Utf8Utils
{
    /// Convert a tree-sitter byte range to a &str slice,
    /// returns None if boundaries are not valid char
    /// boundaries
    pub fn slice_node_text<'a>(
        full: &'a str,
        node: Node<'_>,
    ) -> Option<&'a str>
    {
        full.get(node.start_byte()..node.end_byte())
    }

    /// Leading run of spaces and tabs of a line
    pub fn leading_whitespace(line: &str) -> &str
    {
        let end = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());

        &line[..end]
    }
}

/// Common Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// Named children of a node, collected eagerly
    pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>>
    {
        let mut cursor = node.walk();

        node.named_children(&mut cursor)
            .collect()
    }

    /// Leftmost identifier of an attribute chain (`a` in `a.b.c`)
    pub fn attribute_root(mut node: Node<'_>) -> Option<Node<'_>>
    {
        while node.kind() == "attribute"
        {
            node = node.child_by_field_name("object")?;
        }

        (node.kind() == "identifier").then_some(node)
    }

    /// Earliest ERROR or MISSING node in the tree, if any
    pub fn first_error(root: Node<'_>) -> Option<Node<'_>>
    {
        // Fast path: the flag propagates to the root
        if !root.has_error()
        {
            return None;
        }

        let mut best: Option<Node> = None;
        let mut stack = vec![root];

        while let Some(node) = stack.pop()
        {
            if node.is_error() || node.is_missing()
            {
                if best.is_none_or(|b| node.start_byte() < b.start_byte())
                {
                    best = Some(node);
                }
                continue;
            }

            // Only descend into subtrees that contain errors
            if node.has_error()
            {
                let mut cursor = node.walk();
                stack.extend(node.children(&mut cursor));
            }
        }

        best
    }
}
