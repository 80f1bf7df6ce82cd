//! Instrumented script builder.
//!
//! Wraps every placeholder occurrence of the selection in a call to a
//! probe function that prints the runtime type of its argument as one
//! JSON line and returns the argument unchanged.

use std::ops::Range;

use tracing::{debug, instrument};

use crate::core::error::EngineError;
use crate::core::placeholder::{Placeholder, PlaceholderSet};

/// Name of the injected probe function
pub const PROBE_FN: &str = "__fragforge_probe__";

/// Probe definition prepended to the program. `json` is imported
/// under a private alias inside the function so user code cannot
/// shadow it.
pub const PROBE_DEFINITION: &str = "\
def __fragforge_probe__(pid, value):
    import json as __fragforge_json__
    print(__fragforge_json__.dumps({\"id\": pid, \"type\": str(type(value))}), flush=True)
    return value

";

/// An executable program plus the placeholder spans inside it.
#[derive(Debug, Clone)]
pub struct ProbeScript
{
    pub text: String,
    pub placeholders: PlaceholderSet,
}

/// Probe call text replacing one occurrence
pub fn probe_call(p: &Placeholder) -> String
{
    format!("{PROBE_FN}(\"{}\", {})", p.id, p.name)
}

/// Build `probe_definition + prefix + rewritten_selection + suffix`.
///
/// `placeholders` carries document offsets; the caller's set is left
/// untouched and the returned set holds spans into the script.
#[instrument(skip_all, fields(placeholders = placeholders.len()))]
pub fn build_script(
    document: &str,
    selection: Range<usize>,
    placeholders: &PlaceholderSet,
) -> Result<ProbeScript, EngineError>
{
    if document
        .get(selection.clone())
        .is_none()
    {
        return Err(EngineError::InvalidSelection(format!(
            "{}..{}",
            selection.start, selection.end
        )));
    }

    let mut set = placeholders.clone();

    // Rewrite occurrences in ascending order over the whole document
    // so the prefix and suffix stay byte-identical.
    let rewritten = set.rewrite(document, probe_call)?;

    // `from __future__` imports must stay first in the module
    let at = future_imports_end(document).min(selection.start);
    let mut text = String::with_capacity(rewritten.len() + PROBE_DEFINITION.len());
    text.push_str(&rewritten[..at]);
    text.push_str(PROBE_DEFINITION);
    text.push_str(&rewritten[at..]);

    set.shift_from(at, PROBE_DEFINITION.len() as isize);

    debug!(bytes = text.len(), insert_at = at, "probe script built");
    Ok(ProbeScript { text, placeholders: set })
}

/// Byte offset just past the last `from __future__` import of the
/// module header, or 0 when the module has none. The header may hold
/// blank lines, comments and one docstring ahead of the imports.
fn future_imports_end(document: &str) -> usize
{
    let mut offset = 0;
    let mut end = 0;
    let mut docstring_allowed = true;

    while offset < document.len()
    {
        let rest = &document[offset..];
        let line = &rest[..line_len(rest)];
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#')
        {
            offset += line.len();
        }
        else if trimmed.starts_with("from __future__ import")
        {
            offset += future_import_len(rest);
            end = offset;
            docstring_allowed = false;
        }
        else if docstring_allowed
            && let Some(len) = docstring_len(rest)
        {
            offset += len;
            docstring_allowed = false;
        }
        else
        {
            break;
        }
    }

    end
}

/// Length of the first line of `text`, terminator included
fn line_len(text: &str) -> usize
{
    text.find('\n')
        .map_or(text.len(), |i| i + 1)
}

/// `from __future__ import (a,\n b)` spans up to the closing paren
fn future_import_len(rest: &str) -> usize
{
    let first = line_len(rest);
    let head = &rest[..first];

    if head.contains('(')
        && !head.contains(')')
        && let Some(close) = rest.find(')')
    {
        return close + line_len(&rest[close..]);
    }

    first
}

/// Length through the line that closes a string literal opening
/// `rest`, or None when `rest` does not start with one.
fn docstring_len(rest: &str) -> Option<usize>
{
    let body = rest.strip_prefix(['r', 'R', 'u', 'U']).unwrap_or(rest);
    let opened = rest.len() - body.len();
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| body.starts_with(q))?;

    let inner = &body[quote.len()..];
    let mut chars = inner.char_indices();
    while let Some((i, c)) = chars.next()
    {
        if c == '\\'
        {
            chars.next();
            continue;
        }
        if c == '\n' && quote.len() == 1
        {
            return None;
        }
        if inner[i..].starts_with(quote)
        {
            let close = opened + quote.len() + i + quote.len();
            return Some(close + line_len(&rest[close..]));
        }
    }

    None
}
