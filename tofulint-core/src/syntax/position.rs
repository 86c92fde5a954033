//! Source positions and ranges.
//!
//! Every range carries a line/column/byte triple for both ends so that
//! issues can be reported to humans and fixes can be spliced by byte offset.

use serde::Serialize;
use std::fmt;
use std::ops;
use std::sync::Arc;

/// A position in a source file. Lines and columns are 1-indexed, bytes are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

/// A half-open source range within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    /// Byte offsets of this range.
    pub fn bytes(&self) -> ops::Range<usize> {
        self.start.byte..self.end.byte
    }

    pub fn is_empty(&self) -> bool {
        self.start.byte >= self.end.byte
    }

    /// Two ranges overlap when they share at least one byte of the same file.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.filename == other.filename
            && self.start.byte < other.end.byte
            && other.start.byte < self.end.byte
    }

    /// Ordering key used for deterministic reporting.
    pub fn sort_key(&self) -> (&str, usize, usize) {
        (self.filename.as_str(), self.start.byte, self.end.byte)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.filename, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// Maps byte offsets of one file to line/column positions.
#[derive(Debug)]
pub struct SourceMap {
    filename: String,
    source: String,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut line_starts = Vec::with_capacity(source.len() / 32 + 1);
        line_starts.push(0);
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );

        Self {
            filename: filename.into(),
            source,
            line_starts,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position of a byte offset. Offsets past the end clamp to the end of the file.
    pub fn pos(&self, byte: usize) -> Pos {
        let mut byte = byte.min(self.source.len());
        while !self.source.is_char_boundary(byte) {
            byte -= 1;
        }

        let line_index = self.line_starts.partition_point(|&start| start <= byte) - 1;
        let line_start = self.line_starts[line_index];
        let column = self.source[line_start..byte].chars().count() + 1;

        Pos {
            line: line_index + 1,
            column,
            byte,
        }
    }

    /// Range of a byte span.
    pub fn range(&self, span: ops::Range<usize>) -> Range {
        Range {
            filename: self.filename.clone(),
            start: self.pos(span.start),
            end: self.pos(span.end.max(span.start)),
        }
    }
}

/// Where re-parsed text lies in its file.
///
/// Text cut straight out of the file is off by a fixed amount. Text decoded
/// from a JSON string also needs a table, because escapes are longer in the
/// file than in the decoded text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOrigin {
    start: usize,
    /// Raw offset of every decoded byte, plus the raw length at the end.
    table: Option<Arc<[usize]>>,
}

impl TextOrigin {
    pub fn at(start: usize) -> Self {
        Self { start, table: None }
    }

    /// Origin of the decoded contents of a JSON string. `raw` is the text
    /// between the quotes and `start` is its file offset.
    pub fn json_string(raw: &str, start: usize) -> Self {
        if !raw.contains('\\') {
            return Self::at(start);
        }

        let mut table = Vec::with_capacity(raw.len() + 1);
        let mut chars = raw.char_indices();
        while let Some((i, c)) = chars.next() {
            let decoded_len = if c != '\\' {
                c.len_utf8()
            } else {
                match chars.next() {
                    Some((_, 'u')) => {
                        let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                        let unit = u32::from_str_radix(&hex, 16).unwrap_or(0);
                        if (0xD800..0xDC00).contains(&unit) {
                            // the low half of the pair follows as a second `\uXXXX`
                            chars.by_ref().take(6).for_each(drop);
                            4
                        } else {
                            char::from_u32(unit).map_or(3, char::len_utf8)
                        }
                    }
                    Some(_) => 1,
                    None => 0,
                }
            };
            table.extend(std::iter::repeat(i).take(decoded_len));
        }
        table.push(raw.len());

        Self {
            start,
            table: Some(table.into()),
        }
    }

    /// File offset of a byte offset into the re-parsed text.
    pub fn file_offset(&self, offset: usize) -> usize {
        match &self.table {
            None => self.start + offset,
            Some(table) => self.start + table.get(offset).or(table.last()).copied().unwrap_or(0),
        }
    }

    pub fn file_span(&self, span: ops::Range<usize>) -> ops::Range<usize> {
        self.file_offset(span.start)..self.file_offset(span.end)
    }
}
