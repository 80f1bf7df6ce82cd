//! Newline index with LF/CRLF-robust (line, column) → byte mapping.
//!
//! Goals
//! - Single pass over bytes to record '\n' positions.
//! - 1-based line numbers, 0-based byte columns (the convention
//!   Tree-sitter reports as `row + 1`, `column`).
//! - O(1) line→byte start via the index.
//! - Line end excludes a trailing '\r' for CRLF lines.
//!
//! Notes
//! - An empty buffer has 0 lines.
//! - A buffer ending in '\n' has an empty last line.

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self {
        let mut nl_positions = Vec::with_capacity(bytes.len() / 48);
        let mut i = 0usize;

        // Single pass; record every '\n' offset.
        while let Some(pos) = memchr::memchr(b'\n', &bytes[i..]) {
            let abs = i + pos;
            nl_positions.push(abs);
            i = abs + 1;
        }

        Self {
            nl_positions,
            len: bytes.len(),
        }
    }

    /// Total number of logical lines.
    /// Empty buffer => 0 lines; else (#'\n' + 1).
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.nl_positions.len() + 1
        }
    }

    /// Start byte (inclusive) of a 1-based line.
    pub fn start_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count().max(1) {
            return None;
        }
        if line1 == 1 {
            return Some(0);
        }
        // For line L>1, start is one past the previous '\n'.
        self.nl_positions.get(line1 - 2).map(|&prev_nl| prev_nl + 1)
    }

    /// End byte (exclusive) of a 1-based line, excluding '\r\n' / '\n'.
    pub fn end_of_line(&self, line1: usize, bytes: &[u8]) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count().max(1) {
            return None;
        }

        // Lines terminated by '\n' (everything but the last line)
        if let Some(&nl) = self.nl_positions.get(line1 - 1) {
            if nl > 0 && bytes.get(nl - 1) == Some(&b'\r') {
                return Some(nl - 1);
            }
            return Some(nl);
        }

        // Last line ends at EOF.
        Some(self.len)
    }

    /// Absolute byte offset of a (1-based line, 0-based column) pair.
    /// The column must not run past the end of its line.
    pub fn offset_of(&self, line1: usize, column: usize, bytes: &[u8]) -> Option<usize> {
        let start = self.start_of_line(line1)?;
        let end = self.end_of_line(line1, bytes)?;
        let offset = start.checked_add(column)?;
        (offset <= end).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_lines_to_byte_ranges() {
        let text = "x = 10\ny = 10\n\nx + y\n";
        let idx = NewlineIndex::build(text.as_bytes());

        assert_eq!(idx.line_count(), 5);
        assert_eq!(idx.start_of_line(4), Some(15));
        assert_eq!(idx.end_of_line(4, text.as_bytes()), Some(20));
        assert_eq!(&text[15..20], "x + y");
        assert_eq!(idx.offset_of(4, 4, text.as_bytes()), Some(19));
        assert_eq!(idx.offset_of(1, 99, text.as_bytes()), None);
        assert_eq!(idx.start_of_line(6), None);
    }

    #[test]
    fn crlf_line_end_excludes_carriage_return() {
        let text = "a = 1\r\nb = 2\r\n";
        let idx = NewlineIndex::build(text.as_bytes());

        assert_eq!(idx.end_of_line(1, text.as_bytes()), Some(5));
        assert_eq!(idx.start_of_line(2), Some(7));
    }
}
