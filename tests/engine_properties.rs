// Engine-level properties: offset bookkeeping, determinism, FOEF
// scoring. Documents are generated from a small statement grammar so
// every case parses.

use fragforge::core::extract::{PlaceholderExtractor, Selection};
use fragforge::core::format::{format_snippet, parse_placeholder_list, render_list, token};
use fragforge::core::instrument::{build_script, probe_call};
use fragforge::core::synth::{Synthesizer, score_line};
use fragforge::core::{CancelToken, EngineError, ExecutionDriver, Parametrizer, ProbeOptions};
use fragforge::store::{Fragment, FragmentStore, MemoryStore};
use proptest::prelude::*;

const HEADER: &str = "def f(x):\n    return x\n";

/// One top-level statement over a tiny name pool
fn statement() -> impl Strategy<Value = String>
{
    let name = prop::sample::select(vec!["a", "b", "c", "f", "total"]);
    (0u8..4, name.clone(), name.clone(), name).prop_map(|(shape, n, m, k)| match shape
    {
        0 => format!("{n} = {m}"),
        1 => format!("{n}({m}, {k})"),
        2 => format!("{n} + {m} * {k}"),
        _ => format!("print({m})"),
    })
}

/// Document plus a 1-based line selection inside its body
fn document_and_selection() -> impl Strategy<Value = (String, usize, usize)>
{
    prop::collection::vec(statement(), 1..8).prop_flat_map(|stmts| {
        let doc = format!("{HEADER}{}\n", stmts.join("\n"));
        let first = 3usize;
        let last = 2 + stmts.len();
        (Just(doc), first..=last, first..=last)
            .prop_map(|(doc, a, b)| (doc, a.min(b), a.max(b)))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn formatted_spans_point_at_their_tokens((doc, a, b) in document_and_selection())
    {
        let sel = Selection::lines(a, b);
        let set = PlaceholderExtractor::new().extract(&doc, &sel).unwrap();
        let range = sel.byte_range(&doc).unwrap();

        let out = format_snippet(&doc, range, &set).unwrap();

        for p in &out.placeholders
        {
            let expected = token(p);
            prop_assert_eq!(&out.body[p.span.start..p.span.end], expected.as_str());
        }
    }

    #[test]
    fn probe_script_spans_point_at_probe_calls((doc, a, b) in document_and_selection())
    {
        let sel = Selection::lines(a, b);
        let set = PlaceholderExtractor::new().extract(&doc, &sel).unwrap();
        let range = sel.byte_range(&doc).unwrap();

        let script = build_script(&doc, range, &set).unwrap();

        prop_assert_eq!(script.placeholders.len(), set.len());
        for p in &script.placeholders
        {
            let expected = probe_call(p);
            prop_assert_eq!(&script.text[p.span.start..p.span.end], expected.as_str());
        }
    }

    #[test]
    fn extraction_is_deterministic_and_ordered((doc, a, b) in document_and_selection())
    {
        let sel = Selection::lines(a, b);
        let extractor = PlaceholderExtractor::new();

        let first = extractor.extract(&doc, &sel).unwrap();
        let second = extractor.extract(&doc, &sel).unwrap();
        prop_assert_eq!(&first, &second);

        let positions: Vec<(usize, usize)> = first.iter().map(|p| (p.line, p.column)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(positions, sorted);

        for (i, p) in first.iter().enumerate()
        {
            prop_assert_eq!(p.index, i);
            prop_assert!(p.line >= a && p.line <= b);
        }
    }

    #[test]
    fn serialized_list_parses_back((doc, a, b) in document_and_selection())
    {
        let set = PlaceholderExtractor::new().extract(&doc, &Selection::lines(a, b)).unwrap();

        let parsed = parse_placeholder_list(&render_list(&set));

        let expected: Vec<(usize, String)> = set.iter().map(|p| (p.index, p.name.clone())).collect();
        let actual: Vec<(usize, String)> = parsed.into_iter().map(|t| (t.index, t.name)).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn keyword_superset_never_scores_lower(
        line_words in prop::sample::subsequence(vec!["alpha", "bravo", "charlie", "delta", "echo", "golf"], 1..=6),
        split in 0usize..6,
    )
    {
        // base keywords ⊆ wider keywords ⊆ line tokens
        let cut = split % line_words.len() + 1;
        let base = line_words[..cut].join(",");
        let wider = line_words.join(",");

        let mut store = MemoryStore::new();
        let added_base = store.add_fragment(Fragment { keywords: base, body: "B".into(), ..Fragment::new("base") });
        prop_assert!(added_base);
        let added_wider = store.add_fragment(Fragment { keywords: wider, body: "W".into(), ..Fragment::new("wider") });
        prop_assert!(added_wider);

        let line = line_words.join(" ");
        let scores = score_line(&store, &line);
        let score_of = |label: &str| scores.iter().find(|(f, _)| f.label == label).map_or(0, |(_, s)| *s);

        prop_assert!(score_of("wider") >= score_of("base"));
    }
}

#[test]
fn free_call_names_survive_earlier_declarations()
{
    let doc = "def f(x):\n    x + 1\nx = 0\n\nf(x)\n";

    let set = PlaceholderExtractor::new()
        .extract(doc, &Selection::lines(5, 5))
        .unwrap();

    let names: Vec<&str> = set.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["f", "x"]);
}

#[test]
fn cancelled_token_stops_before_spawning()
{
    let token = CancelToken::new();
    token.cancel();

    let engine = Parametrizer::new(PlaceholderExtractor::new(), ExecutionDriver::new(ProbeOptions::default()));
    let err = engine
        .parametrize("def f(x):\n    pass\nf(v)\n", &Selection::lines(3, 3), &token)
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
}

#[test]
fn fragment_scenario_wins_the_loop_line()
{
    let mut store = MemoryStore::new();
    assert!(store.add_fragment(Fragment {
        keywords: "for,range".into(),
        body: "for i in range(n):".into(),
        ..Fragment::new("loop")
    }));

    let out = Synthesizer::new(&store).synthesize("for i in range(10):");

    assert_eq!(out.body, "for i in range(n):");
    assert!(out.matches[0].score >= 1);
}
