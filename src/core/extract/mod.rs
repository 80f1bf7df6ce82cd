//! Free-variable detection for a selected snippet.
//!
//! Declarations and references are computed over the whole
//! document; the selection only filters which references may
//! become placeholders.

pub mod selection;
pub mod target;

pub use selection::{Position, Selection};
pub use target::SelectionTarget;

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, instrument, trace};

use crate::core::error::EngineError;
use crate::core::placeholder::PlaceholderSet;
use crate::parsers::python_parser::{Declaration, PythonAst, Reference};

/// Builtin names of Python 3 that are never free variables.
pub const PYTHON_BUILTINS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset", "getattr",
    "globals", "hasattr", "hash", "help", "hex", "id", "input", "int", "isinstance",
    "issubclass", "iter", "len", "list", "locals", "map", "max", "memoryview", "min", "next",
    "object", "oct", "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super",
    "tuple", "type", "vars", "zip", "__import__", "__name__", "__file__", "__doc__",
    "BaseException", "Exception", "ArithmeticError", "AssertionError", "AttributeError",
    "EOFError", "ImportError", "IndexError", "KeyError", "KeyboardInterrupt",
    "ModuleNotFoundError", "NameError", "NotImplementedError", "OSError", "RuntimeError",
    "StopIteration", "SyntaxError", "SystemExit", "TypeError", "ValueError",
    "ZeroDivisionError", "NotImplemented", "Ellipsis", "self", "cls",
];

/// Locates the placeholders of a selection.
#[derive(Clone, Default)]
pub struct PlaceholderExtractor
{
    ast: PythonAst,
    ignore: HashSet<String>,
    index_base: usize,
}

impl PlaceholderExtractor
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Extra names to skip on top of the builtins
    pub fn with_ignored<I, S>(
        mut self,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// First index handed out to placeholders
    pub fn with_index_base(
        mut self,
        base: usize,
    ) -> Self
    {
        self.index_base = base;
        self
    }

    /// Placeholders of `selection` within `document`, in canonical
    /// order with indices assigned. Spans are document offsets.
    ///
    /// Deterministic: the same input always yields the same ids in
    /// the same order.
    #[instrument(skip(self, document), fields(selection = %selection))]
    pub fn extract(
        &self,
        document: &str,
        selection: &Selection,
    ) -> Result<PlaceholderSet, EngineError>
    {
        let bytes = selection.byte_range(document)?;
        let lines = selection.line_range();

        let parsed = self
            .ast
            .parse(document)?;
        let declarations = parsed.declarations();
        let references = parsed.references();

        debug!(
            declarations = declarations.len(),
            references = references.len(),
            "document scanned"
        );

        let free: Vec<Reference> = references
            .into_iter()
            .filter(|r| in_selection(r, lines, &bytes))
            .filter(|r| !self.is_ignored(&r.name))
            .filter(|r| {
                let bound = is_bound(r, &declarations, lines);
                if bound
                {
                    trace!(name = %r.name, line = r.line, "bound reference skipped");
                }
                !bound
            })
            .collect();

        let set = PlaceholderSet::from_references(free, self.index_base);
        debug!(placeholders = set.len(), "placeholders extracted");

        Ok(set)
    }

    fn is_ignored(
        &self,
        name: &str,
    ) -> bool
    {
        PYTHON_BUILTINS.contains(&name) || self.ignore.contains(name)
    }
}

/// Both the line and the byte span of the reference lie inside the
/// selection.
fn in_selection(
    r: &Reference,
    (first, last): (usize, usize),
    bytes: &Range<usize>,
) -> bool
{
    (first..=last).contains(&r.line) && bytes.start <= r.start && r.end <= bytes.end
}

/// A same-named declaration at or before the reference binds it.
///
/// Expression and comparison operands are bound by any such
/// declaration; call and return positions only by one inside the
/// selected lines.
fn is_bound(
    r: &Reference,
    declarations: &[Declaration],
    (first, last): (usize, usize),
) -> bool
{
    declarations
        .iter()
        .filter(|d| d.name == r.name && d.line <= r.line)
        .any(|d| !r.kind.is_input_position() || (first..=last).contains(&d.line))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn extract(
        doc: &str,
        first: usize,
        last: usize,
    ) -> Vec<(String, String)>
    {
        PlaceholderExtractor::new()
            .extract(doc, &Selection::lines(first, last))
            .unwrap()
            .iter()
            .map(|p| (p.id.to_string(), p.name.clone()))
            .collect()
    }

    #[test]
    fn arithmetic_only_snippet_has_no_placeholders()
    {
        assert!(extract("x = 10\ny = 10\n\nx + y\n", 4, 4).is_empty());
    }

    #[test]
    fn call_inputs_declared_outside_are_placeholders()
    {
        let doc = "def f(x):\n    x + 1\nx = 0\n\nf(x)\n";

        assert_eq!(
            extract(doc, 5, 5),
            vec![("5:0".to_string(), "f".to_string()), ("5:2".to_string(), "x".to_string())]
        );
    }

    #[test]
    fn declarations_inside_selection_bind_call_inputs()
    {
        let doc = "x = 0\ny = x\nprint(y)\n";

        assert!(extract(doc, 2, 3).is_empty());
    }

    #[test]
    fn expression_bound_by_later_declaration_stays_free()
    {
        // `limit` is only assigned after the comparison
        let doc = "if n < limit:\n    pass\nlimit = 3\n";

        let got = extract(doc, 1, 2);
        assert_eq!(
            got.iter()
                .map(|(_, n)| n.as_str())
                .collect::<Vec<_>>(),
            vec!["n", "limit"]
        );
    }

    #[test]
    fn each_occurrence_gets_its_own_id()
    {
        let doc = "def show(a, b):\n    pass\nshow(num, num)\n";

        let got = extract(doc, 3, 3);
        let ids: Vec<_> = got
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["3:0", "3:5", "3:10"]);
    }

    #[test]
    fn builtins_and_ignored_names_are_skipped()
    {
        let doc = "print(len(items), cfg)\n";
        let ex = PlaceholderExtractor::new().with_ignored(["cfg"]);

        let names: Vec<_> = ex
            .extract(doc, &Selection::lines(1, 1))
            .unwrap()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["items"]);
    }

    #[test]
    fn extraction_is_idempotent()
    {
        let doc = "import os\n\ndef run(p):\n    return os.path.join(p, base)\n\nrun(root)\n";
        let ex = PlaceholderExtractor::new().with_index_base(1);
        let sel = Selection::lines(1, 6);

        let a = ex.extract(doc, &sel).unwrap();
        let b = ex.extract(doc, &sel).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            a.iter()
                .map(|p| p.index)
                .collect::<Vec<_>>(),
            (1..=a.len()).collect::<Vec<_>>()
        );
    }
}
