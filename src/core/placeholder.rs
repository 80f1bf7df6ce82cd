//! Placeholder model: one free-variable occurrence per entry, kept in
//! a call-scoped arena keyed by a stable id.
//!
//! Spans always describe the *current* buffer. The only way to move
//! them is `PlaceholderSet::rewrite`, which replaces occurrences in
//! ascending order and shifts every later span by the length delta.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::infra::utils::OffsetUtils;
use crate::parsers::python_parser::{Reference, ReferenceKind};

/// Stable key of one occurrence: its original `line:column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn new(line: usize, column: usize) -> Self {
        Self(format!("{line}:{column}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaceholderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Byte range in the active buffer (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn shifted(self, delta: isize) -> Self {
        Self {
            start: OffsetUtils::shift(self.start, delta),
            end: OffsetUtils::shift(self.end, delta),
        }
    }
}

/// One free-variable occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: PlaceholderId,
    pub name: String,
    /// Document line of the original occurrence (1-based).
    pub line: usize,
    /// Document byte column of the original occurrence.
    pub column: usize,
    /// Current location in the active buffer.
    pub span: Span,
    pub kind: ReferenceKind,
    /// Display ordinal in canonical order.
    pub index: usize,
    /// Runtime type name sampled by the probe.
    pub datatype: Option<String>,
}

/// Ordered arena of the placeholders of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderSet {
    items: IndexMap<PlaceholderId, Placeholder>,
}

impl PlaceholderSet {
    /// Build the canonical set: dedupe by id, order by
    /// `(line, column)`, then number from `index_base`.
    pub fn from_references<I>(refs: I, index_base: usize) -> Self
    where
        I: IntoIterator<Item = Reference>,
    {
        let mut refs: Vec<Reference> = refs.into_iter().collect();
        refs.sort_by_key(|r| (r.line, r.column));

        let mut items = IndexMap::with_capacity(refs.len());
        for r in refs {
            let id = PlaceholderId::new(r.line, r.column);
            if items.contains_key(&id) {
                continue;
            }

            let index = index_base + items.len();
            items.insert(
                id.clone(),
                Placeholder {
                    id,
                    name: r.name,
                    line: r.line,
                    column: r.column,
                    span: Span { start: r.start, end: r.end },
                    kind: r.kind,
                    index,
                    datatype: None,
                },
            );
        }

        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &PlaceholderId) -> Option<&Placeholder> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &PlaceholderId) -> Option<&mut Placeholder> {
        self.items.get_mut(id)
    }

    /// Placeholders in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Placeholder> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlaceholderId> {
        self.items.keys()
    }

    /// Move every span by `-origin`, e.g. from document to
    /// selection coordinates.
    pub fn rebase(&mut self, origin: usize) {
        for p in self.items.values_mut() {
            p.span = p.span.shifted(-(origin as isize));
        }
    }

    /// Move every span at or after `from` by `delta`.
    pub fn shift_from(&mut self, from: usize, delta: isize) {
        for p in self.items.values_mut() {
            if p.span.start >= from {
                p.span = p.span.shifted(delta);
            }
        }
    }

    /// Replace each occurrence in `buffer` by `render(p)`, ascending.
    ///
    /// After each replacement the rewritten placeholder's span covers
    /// the inserted text and every not-yet-processed span behind it
    /// moves by the length delta, so
    /// `out[p.span.start..p.span.end] == render(p)` holds for all
    /// placeholders on return.
    pub fn rewrite<F>(&mut self, buffer: &str, mut render: F) -> Result<String, EngineError>
    where
        F: FnMut(&Placeholder) -> String,
    {
        let mut text = buffer.to_string();

        for i in 0..self.items.len() {
            let (old, replacement) = {
                let (_, p) = self
                    .items
                    .get_index(i)
                    .ok_or(EngineError::Rewrite { start: 0, end: 0 })?;
                (p.span, render(p))
            };

            // The stored span must still hold the identifier.
            text = OffsetUtils::replace(&text, old.start, old.end, &replacement)
                .ok_or(EngineError::Rewrite { start: old.start, end: old.end })?;

            let delta = OffsetUtils::delta(old.len(), replacement.len());

            // Later occurrences sit at or past the old end.
            self.shift_from(old.end, delta);

            if let Some((_, p)) = self.items.get_index_mut(i) {
                p.span = Span { start: old.start, end: old.start + replacement.len() };
            }
        }

        Ok(text)
    }
}

impl<'a> IntoIterator for &'a PlaceholderSet {
    type Item = &'a Placeholder;
    type IntoIter = indexmap::map::Values<'a, PlaceholderId, Placeholder>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}
