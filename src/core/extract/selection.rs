//! Editor-style positions and selections over a document.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::infra::line_index::NewlineIndex;

/// A caret position: 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position
{
    pub line: usize,
    pub column: usize,
}

impl Position
{
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self
    {
        Self { line, column }
    }
}

/// Half-open selection `start..end` within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection
{
    pub start: Position,
    pub end: Position,
}

impl Selection
{
    pub fn new(
        start: Position,
        end: Position,
    ) -> Self
    {
        Self { start, end }
    }

    /// Whole lines `first..=last`; the end column is clamped to the
    /// end of `last` when resolved.
    pub fn lines(
        first: usize,
        last: usize,
    ) -> Self
    {
        Self {
            start: Position::new(first, 0),
            end: Position::new(last, usize::MAX),
        }
    }

    /// Inclusive line span covered by the selection
    pub fn line_range(&self) -> (usize, usize)
    {
        (self.start.line, self.end.line)
    }

    /// Resolve to a byte range of `text`.
    ///
    /// Columns past the end of their line clamp to the line end, so
    /// `Selection::lines` never splits a `\r\n` pair.
    pub fn byte_range(
        &self,
        text: &str,
    ) -> Result<Range<usize>, EngineError>
    {
        let bytes = text.as_bytes();
        let idx = NewlineIndex::build(bytes);

        let resolve = |pos: Position| -> Option<usize> {
            let width = idx.end_of_line(pos.line, bytes)? - idx.start_of_line(pos.line)?;
            idx.offset_of(pos.line, pos.column.min(width), bytes)
        };

        let start = resolve(self.start);
        let end = resolve(self.end);

        match (start, end)
        {
            (Some(s), Some(e)) if s <= e => Ok(s..e),
            _ => Err(EngineError::InvalidSelection(self.to_string())),
        }
    }
}

impl fmt::Display for Selection
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        if self.end.column == usize::MAX && self.start.column == 0
        {
            return write!(f, "{}-{}", self.start.line, self.end.line);
        }

        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}
