//! Snippet formatter: placeholder tokens, parametrized bodies and
//! the serialized placeholder list.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::core::placeholder::{Placeholder, PlaceholderSet};

/// `{index:name}` or `{index:name:datatype}`, optionally `$`-prefixed
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\{(\d+):([A-Za-z_][A-Za-z0-9_]*)(?::([^{}]*))?\}").expect("valid token regex")
});

/// Separator of the serialized placeholder list
pub const LIST_SEPARATOR: &str = ", ";

/// One entry of a parsed placeholder list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderToken
{
    pub index: usize,
    pub name: String,
    pub datatype: Option<String>,
}

/// A selection rewritten with placeholder tokens
#[derive(Debug, Clone)]
pub struct FormattedSnippet
{
    pub body: String,
    /// Spans relative to `body`
    pub placeholders: PlaceholderSet,
}

/// Token text of one placeholder
pub fn token(p: &Placeholder) -> String
{
    match &p.datatype
    {
        Some(t) => format!("{{{}:{}:{}}}", p.index, p.name, t),
        None => format!("{{{}:{}}}", p.index, p.name),
    }
}

/// Rewrite the selected text with tokens.
///
/// Spans of `placeholders` are document offsets; they are rebased to
/// the selection before the ascending rewrite, so on return
/// `body[p.span] == token(p)` for every placeholder.
pub fn format_snippet(
    document: &str,
    selection: Range<usize>,
    placeholders: &PlaceholderSet,
) -> Result<FormattedSnippet, EngineError>
{
    let text = document
        .get(selection.clone())
        .ok_or_else(|| {
            EngineError::InvalidSelection(format!("{}..{}", selection.start, selection.end))
        })?;

    let mut set = placeholders.clone();
    set.rebase(selection.start);

    let body = set.rewrite(text, token)?;
    Ok(FormattedSnippet { body, placeholders: set })
}

/// Serialize placeholders as `", "`-joined tokens in canonical order
pub fn render_list(set: &PlaceholderSet) -> String
{
    set.iter()
        .map(token)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Parse a serialized placeholder list back into tokens.
///
/// Text between tokens is ignored, so lists joined with `,` or
/// `", "` both parse.
pub fn parse_placeholder_list(list: &str) -> Vec<PlaceholderToken>
{
    TOKEN_RE
        .captures_iter(list)
        .filter_map(|caps| {
            let index = caps[1]
                .parse()
                .ok()?;
            Some(PlaceholderToken {
                index,
                name: caps[2].to_string(),
                datatype: caps
                    .get(3)
                    .map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::extract::{PlaceholderExtractor, Selection};

    fn formatted(
        doc: &str,
        first: usize,
        last: usize,
    ) -> FormattedSnippet
    {
        let sel = Selection::lines(first, last);
        let mut set = PlaceholderExtractor::new()
            .extract(doc, &sel)
            .unwrap();
        for id in set
            .ids()
            .cloned()
            .collect::<Vec<_>>()
        {
            if let Some(p) = set.get_mut(&id)
                && p.name == "x"
            {
                p.datatype = Some("<class 'int'>".to_string());
            }
        }
        format_snippet(doc, sel.byte_range(doc).unwrap(), &set).unwrap()
    }

    #[test]
    fn call_snippet_gets_tokens()
    {
        let out = formatted("def f(x):\n    x + 1\nx = 0\n\nf(x)\n", 5, 5);

        assert_eq!(out.body, "{0:f}({1:x:<class 'int'>})");
        assert_eq!(render_list(&out.placeholders), "{0:f}, {1:x:<class 'int'>}");
    }

    #[test]
    fn body_spans_point_at_tokens()
    {
        let doc = "import os\nwith open(path) as fh:\n    handle(fh, mode, x)\n    report(x, path)\n";
        let out = formatted(doc, 2, 4);

        assert!(!out.placeholders.is_empty());
        for p in &out.placeholders
        {
            assert_eq!(&out.body[p.span.start..p.span.end], token(p));
        }
    }

    #[test]
    fn list_round_trips()
    {
        let doc = "show(a, b)\nshow(x)\n";
        let out = formatted(doc, 1, 2);

        let parsed = parse_placeholder_list(&render_list(&out.placeholders));
        let expected: Vec<_> = out
            .placeholders
            .iter()
            .map(|p| PlaceholderToken {
                index: p.index,
                name: p.name.clone(),
                datatype: p.datatype.clone(),
            })
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parse_accepts_snippet_style_markers()
    {
        let parsed = parse_placeholder_list("${0:num},{1:count:<class 'int'>}");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "num");
        assert_eq!(parsed[1].datatype.as_deref(), Some("<class 'int'>"));
    }
}
