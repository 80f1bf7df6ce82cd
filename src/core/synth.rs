//! Fragment synthesis (FOEF): rebuild text line by line from the
//! stored fragment whose keywords best overlap each line.
//!
//! Scoring per line:
//!   - +1 per line token whose keyword query hits the fragment,
//!   - -1 per fragment keyword missing from the line's tokens.
//!
//! Tokens present in the line but unknown to the fragment cost
//! nothing, so a fragment may cover part of a line.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use owo_colors::OwoColorize;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument, trace};

use crate::cli::{AppContext, SynthesizeArgs};
use crate::cli_ext::store_cmd::open_store;
use crate::core::extract::SelectionTarget;
use crate::infra::io::read_source;
use crate::infra::line_index::NewlineIndex;
use crate::infra::utils::Utf8Utils;
use crate::store::{Fragment, FragmentFilter, FragmentStore};

/// Characters replaced by spaces before a line is split into tokens
pub const DENY_SET: &[char] = &[
    '(', ')', '{', '}', '[', ']', ';', ':', '/', '-', '+', '<', '>', '&', '|', '?', '0', '1',
    '2', '3', '4', '5', '6', '7', '8', '9', '=', '%', '!', '\r',
];

/// Placeholder markers: `{3}`, `{3:name}`, `{3:name:type}` and the
/// `${...}` forms. A name must follow the colon, so dict literals such
/// as `{0: 'zero'}` are not markers.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?\{)(\d+)(:[A-Za-z_]\w*[^{}]*)?\}").expect("valid marker regex")
});

/// Winning fragment of one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMatch
{
    /// 1-based line in the input
    pub line: usize,
    pub label: String,
    pub score: i64,
}

/// Result of a synthesis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Synthesis
{
    pub body: String,
    /// Comma-joined keywords of contributing fragments
    pub keywords: String,
    /// Renumbered placeholder lists of contributing fragments
    pub placeholders: String,
    pub matches: Vec<LineMatch>,
}

/// Keyword tokens of one line
pub fn keyword_tokens(line: &str) -> Vec<&str>
{
    line.split(|c: char| c.is_whitespace() || DENY_SET.contains(&c))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Candidate fragments of a line with their final scores, in tally
/// order (token order, then store order).
pub fn score_line<S>(
    store: &S,
    line: &str,
) -> Vec<(Fragment, i64)>
where
    S: FragmentStore + ?Sized,
{
    let tokens = keyword_tokens(line);
    let mut tally: IndexMap<String, (Fragment, i64)> = IndexMap::new();

    for token in &tokens
    {
        for f in store.filter(&FragmentFilter::keyword(token))
        {
            tally
                .entry(f.label.clone())
                .or_insert_with(|| (f, 0))
                .1 += 1;
        }
    }

    tally
        .into_values()
        .map(|(f, hits)| {
            let missing = f
                .keyword_list()
                .into_iter()
                .filter(|kw| !tokens.contains(kw))
                .count() as i64;
            (f, hits - missing)
        })
        .collect()
}

/// Renumber the markers of `text` in order, drawing indices from
/// `next` and advancing it past the last one used.
pub fn renumber_markers(
    text: &str,
    next: &mut usize,
) -> String
{
    MARKER_RE
        .replace_all(text, |caps: &Captures| {
            let rest = caps
                .get(3)
                .map_or("", |m| m.as_str());
            let out = format!("{}{}{}}}", &caps[1], *next, rest);
            *next += 1;
            out
        })
        .into_owned()
}

/// Line-by-line synthesizer over a fragment store.
pub struct Synthesizer<'s, S: FragmentStore + ?Sized>
{
    store: &'s S,
    index_base: usize,
}

impl<'s, S: FragmentStore + ?Sized> Synthesizer<'s, S>
{
    pub fn new(store: &'s S) -> Self
    {
        Self { store, index_base: 0 }
    }

    pub fn with_index_base(
        mut self,
        base: usize,
    ) -> Self
    {
        self.index_base = base;
        self
    }

    /// Replace each line won by a fragment with the fragment body,
    /// keeping the line's indentation and separator.
    #[instrument(skip_all, fields(bytes = text.len()))]
    pub fn synthesize(
        &self,
        text: &str,
    ) -> Synthesis
    {
        let mut body = String::with_capacity(text.len());
        let mut contributors: Vec<Fragment> = Vec::new();
        let mut matches = Vec::new();
        let mut next_marker = self.index_base;

        for (i, segment) in text
            .split_inclusive('\n')
            .enumerate()
        {
            let (line, sep) = split_separator(segment);

            let winner = score_line(self.store, line)
                .into_iter()
                .fold(None::<(Fragment, i64)>, |best, (f, score)| match best
                {
                    Some((_, top)) if score <= top => best,
                    _ if score > 0 => Some((f, score)),
                    _ => best,
                });

            match winner
            {
                Some((f, score)) =>
                {
                    trace!(line = i + 1, label = %f.label, score, "line replaced");
                    body.push_str(Utf8Utils::leading_whitespace(line));
                    // Only fragment text is renumbered; user lines stay as written
                    body.push_str(&renumber_markers(&f.body, &mut next_marker));
                    matches.push(LineMatch { line: i + 1, label: f.label.clone(), score });
                    contributors.push(f);
                }
                None => body.push_str(line),
            }
            body.push_str(sep);
        }

        let keywords = contributors
            .iter()
            .map(|f| f.keywords.trim())
            .filter(|k| !k.is_empty())
            .join(",");
        let mut next_listed = self.index_base;
        let placeholders = contributors
            .iter()
            .map(|f| f.placeholders.trim())
            .filter(|p| !p.is_empty())
            .map(|p| renumber_markers(p, &mut next_listed))
            .join(", ");

        debug!(replaced = matches.len(), "synthesis finished");
        Synthesis { body, keywords, placeholders, matches }
    }
}

/// Split a line from its `\n` / `\r\n` terminator
fn split_separator(segment: &str) -> (&str, &str)
{
    if let Some(stripped) = segment.strip_suffix("\r\n")
    {
        (stripped, "\r\n")
    }
    else if let Some(stripped) = segment.strip_suffix('\n')
    {
        (stripped, "\n")
    }
    else
    {
        (segment, "")
    }
}

pub fn run(
    args: SynthesizeArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let target = SelectionTarget::parse(&args.target)?;
    let document = read_source(&target.file)?;

    let text = match target.lines
    {
        Some(_) =>
        {
            let lines = NewlineIndex::build(document.as_bytes()).line_count();
            let range = target
                .selection(lines)
                .byte_range(&document)
                .with_context(|| format!("Invalid selection in {}", target.file.display()))?;
            document[range].to_string()
        }
        None => document,
    };

    let store = open_store(ctx)?;
    let result = Synthesizer::new(&store)
        .with_index_base(ctx.config.markers.index_base)
        .synthesize(&text);

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&json!(result))?);
        return Ok(());
    }

    print!("{}", result.body);
    if !result.body.ends_with('\n')
    {
        println!();
    }

    if !ctx.quiet
    {
        for m in &result.matches
        {
            let label = if ctx.no_color { m.label.clone() } else { m.label.green().to_string() };
            eprintln!("line {}: {} (score {})", m.line, label, m.score);
        }
        if !result.placeholders.is_empty()
        {
            eprintln!("{} {}", ctx.heading("placeholders:"), result.placeholders);
        }
        if !result.keywords.is_empty()
        {
            eprintln!("{} {}", ctx.heading("keywords:"), result.keywords);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::store::MemoryStore;

    fn frag(
        label: &str,
        keywords: &str,
        body: &str,
    ) -> Fragment
    {
        Fragment {
            keywords: keywords.to_string(),
            body: body.to_string(),
            ..Fragment::new(label)
        }
    }

    fn store_with(fragments: Vec<Fragment>) -> MemoryStore
    {
        let mut s = MemoryStore::new();
        for f in fragments
        {
            assert!(s.add_fragment(f));
        }
        s
    }

    #[test]
    fn tokens_drop_punctuation_and_digits()
    {
        assert_eq!(keyword_tokens("for i in range(10):\r"), vec!["for", "i", "in", "range"]);
        assert_eq!(keyword_tokens("x[0] = a+b"), vec!["x", "a", "b"]);
    }

    #[test]
    fn range_loop_fragment_replaces_the_line()
    {
        let store = store_with(vec![frag("loop", "for,range", "for i in range(n):")]);

        let out = Synthesizer::new(&store).synthesize("for i in range(10):");

        assert_eq!(out.body, "for i in range(n):");
        assert_eq!(out.keywords, "for,range");
        assert_eq!(out.matches, vec![LineMatch { line: 1, label: "loop".into(), score: 2 }]);
    }

    #[test]
    fn indentation_and_separators_survive()
    {
        let store = store_with(vec![frag("print", "print", "print({0:msg})")]);

        let out = Synthesizer::new(&store).synthesize("if ok:\r\n    print(x)\r\nend\n");

        assert_eq!(out.body, "if ok:\r\n    print({0:msg})\r\nend\n");
    }

    #[test]
    fn missing_keywords_are_penalized()
    {
        // `with` and `open` are absent from the line
        let store = store_with(vec![frag("file", "for,with,open", "with open(p) as f:")]);

        let out = Synthesizer::new(&store).synthesize("for x in y:");

        assert!(out.matches.is_empty());
        assert_eq!(out.body, "for x in y:");
    }

    #[test]
    fn ties_keep_the_first_tallied_fragment()
    {
        let store = store_with(vec![
            frag("first", "while", "while {0:cond}:"),
            frag("second", "while", "while True:"),
        ]);

        let out = Synthesizer::new(&store).synthesize("while busy:");

        assert_eq!(out.matches[0].label, "first");
    }

    #[test]
    fn markers_are_renumbered_across_lines()
    {
        let store = store_with(vec![
            Fragment { placeholders: "{0:n}".into(), ..frag("loop", "for,range", "for i in range({0:n}):") },
            Fragment {
                placeholders: "{0:a}, {1:b}".into(),
                ..frag("call", "print", "print(${0:a}, {1:b})")
            },
        ]);

        let out = Synthesizer::new(&store)
            .with_index_base(1)
            .synthesize("for i in range(3):\n    print(i, j)\n");

        assert_eq!(out.body, "for i in range({1:n}):\n    print(${2:a}, {3:b})\n");
        assert_eq!(out.placeholders, "{1:n}, {2:a}, {3:b}");
        assert_eq!(out.keywords, "for,range,print");
    }

    #[test]
    fn unmatched_lines_keep_their_braces()
    {
        let store = store_with(vec![frag("loop", "for,range", "for i in range({0:n}):")]);
        let text = "for i in range(10):\n    msg = '{0} of {1}'.format(a, b)\n    d = {0: 'zero'}\n";

        let out = Synthesizer::new(&store)
            .with_index_base(1)
            .synthesize(text);

        assert_eq!(
            out.body,
            "for i in range({1:n}):\n    msg = '{0} of {1}'.format(a, b)\n    d = {0: 'zero'}\n"
        );
        assert_eq!(out.matches.len(), 1);
    }

    #[test]
    fn dict_literals_are_not_markers()
    {
        let mut next = 5;

        let out = renumber_markers("d = {0: 'zero'}; f({0:x:<class 'int'>}, ${1:y}, {2})", &mut next);

        assert_eq!(out, "d = {0: 'zero'}; f({5:x:<class 'int'>}, ${6:y}, {7})");
        assert_eq!(next, 8);
    }

    #[test]
    fn superset_fragment_never_scores_lower()
    {
        let line = "for item in sorted(items, key=rank):";
        let base = frag("base", "for,in", "for {0:x} in {1:xs}:");
        let wider = frag("wider", "for,in,sorted,key", "for {0:x} in sorted({1:xs}, key={2:k}):");

        let store = store_with(vec![base, wider]);
        let scores: IndexMap<String, i64> = score_line(&store, line)
            .into_iter()
            .map(|(f, s)| (f.label, s))
            .collect();

        assert!(scores["wider"] >= scores["base"]);
    }
}
