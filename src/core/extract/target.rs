//! Robust parsing for "<path>[:<lines>]" with Windows support.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use super::selection::Selection;

/// A file plus an optional inclusive 1-based line range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTarget
{
    /// File path as provided (`-` is stdin).
    pub file: PathBuf,
    /// Inclusive line range; `None` means the whole file.
    pub lines: Option<(usize, usize)>,
}

impl SelectionTarget
{
    /// Parse a target string like
    /// "snippets/demo.py:3-4", "demo.py:7" or "C:\\src\\demo.py:2-9".
    ///
    /// Ranges separated by commas are merged into the one span
    /// covering them, since a selection is contiguous.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or a range is invalid.
    pub fn parse(input: &str) -> Result<Self>
    {
        // Normalize and trim surrounding whitespace
        let s = input.trim();
        if s.is_empty()
        {
            bail!("empty target");
        }

        // Split from the right once to avoid breaking "C:\..."
        let Some((path_str, ranges_str)) = s.rsplit_once(':')
        else
        {
            return Ok(Self { file: PathBuf::from(s), lines: None });
        };

        // A drive letter or a colon inside the name is not a range
        let looks_like_range = !ranges_str.trim().is_empty()
            && ranges_str
                .chars()
                .all(|c| c.is_ascii_digit() || c == '-' || c == ',' || c == ' ');
        if !looks_like_range
        {
            return Ok(Self { file: PathBuf::from(s), lines: None });
        }

        let path_str = path_str.trim();
        if path_str.is_empty()
        {
            bail!("missing file path before ':'");
        }

        // Parse the comma-separated ranges
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for seg in ranges_str.split(',')
        {
            let seg = seg.trim();
            if seg.is_empty()
            {
                continue;
            }
            // Support "N" and "A-B" patterns
            let (a, b) = match seg.split_once('-')
            {
                Some((a, b)) => (
                    a.trim()
                        .parse::<usize>()
                        .with_context(|| format!("invalid start: {seg}"))?,
                    b.trim()
                        .parse::<usize>()
                        .with_context(|| format!("invalid end: {seg}"))?,
                ),
                None =>
                {
                    let n = seg
                        .parse::<usize>()
                        .with_context(|| format!("invalid line: {seg}"))?;
                    (n, n)
                }
            };

            if a == 0 || b == 0
            {
                bail!("line numbers must be >= 1: {seg}");
            }
            if a > b
            {
                bail!("start > end in range: {seg}");
            }
            ranges.push((a, b));
        }

        // Require at least one range
        let first = ranges
            .iter()
            .map(|r| r.0)
            .min()
            .with_context(|| format!("no valid ranges in: {input}"))?;
        let last = ranges
            .iter()
            .map(|r| r.1)
            .max()
            .unwrap_or(first);

        Ok(Self { file: PathBuf::from(path_str), lines: Some((first, last)) })
    }

    /// Selection for a document with `line_count` lines
    pub fn selection(
        &self,
        line_count: usize,
    ) -> Selection
    {
        match self.lines
        {
            Some((a, b)) => Selection::lines(a, b),
            None => Selection::lines(1, line_count.max(1)),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn parses_single_and_merged_ranges()
    {
        let t = SelectionTarget::parse("demo.py:3-4").unwrap();
        assert_eq!(t.file, PathBuf::from("demo.py"));
        assert_eq!(t.lines, Some((3, 4)));

        let t = SelectionTarget::parse("demo.py:7, 2-3").unwrap();
        assert_eq!(t.lines, Some((2, 7)));
    }

    #[test]
    fn bare_paths_select_the_whole_file()
    {
        assert_eq!(SelectionTarget::parse("demo.py").unwrap().lines, None);

        let t = SelectionTarget::parse(r"C:\src\demo.py").unwrap();
        assert_eq!(t.file, PathBuf::from(r"C:\src\demo.py"));
        assert_eq!(t.lines, None);

        let t = SelectionTarget::parse(r"C:\src\demo.py:2-9").unwrap();
        assert_eq!(t.file, PathBuf::from(r"C:\src\demo.py"));
        assert_eq!(t.lines, Some((2, 9)));
    }

    #[test]
    fn rejects_bad_ranges()
    {
        assert!(SelectionTarget::parse("demo.py:0-2").is_err());
        assert!(SelectionTarget::parse("demo.py:5-2").is_err());
        assert!(SelectionTarget::parse(":3").is_err());
        assert!(SelectionTarget::parse("demo.py:-").is_err());
    }
}
