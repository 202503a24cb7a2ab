//! Text positioning and edit application over UTF-8 source buffers.
//!
//! Every offset in this crate is a byte offset into UTF-8 text. The Language
//! Server Protocol addresses positions in UTF-16 code units, so [`LineIndex`]
//! carries the conversion in both directions and the server crate converts
//! exactly once at the wire boundary.

use lsp_types::Position;

/// Half-open byte range into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must not exceed end");
        Self { start, end }
    }

    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `offset` falls inside the span. The end offset counts as
    /// inside so that a cursor sitting just after an identifier still hits it.
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// True when the two spans overlap or abut.
    pub fn intersects(&self, other: TextSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Text edit expressed as byte offsets over the original document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEditSpan {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

/// Line-start table over one version of a document's text.
///
/// The index is only valid for the exact text it was built from; rebuilding
/// after every edit is cheap enough that nothing here caches across versions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of the first character of `line`, clamped to the last line.
    pub fn line_start(&self, line: usize) -> usize {
        match self.line_starts.get(line) {
            Some(start) => *start,
            None => self.text_len,
        }
    }

    /// Zero-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.text_len);
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insertion) => insertion - 1,
        }
    }

    /// Convert a byte offset into an LSP position (UTF-16 column).
    pub fn position_of(&self, text: &str, offset: usize) -> Position {
        let offset = clamp_to_char_boundary(text, offset);
        let line = self.line_of(offset);
        let line_start = self.line_start(line);
        let character: usize = text[line_start..offset]
            .chars()
            .map(|ch| ch.len_utf16())
            .sum();
        Position::new(line as u32, character as u32)
    }

    /// Convert an LSP position (UTF-16 column) into a byte offset.
    ///
    /// Out-of-range lines clamp to the end of the text; out-of-range columns
    /// clamp to the end of the line, before its terminator.
    pub fn offset_of(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return text.len();
        }
        let line_start = self.line_starts[line];
        let target = position.character as usize;
        let mut units = 0usize;
        for (idx, ch) in text[line_start..].char_indices() {
            if units >= target {
                return line_start + idx;
            }
            if ch == '\n' {
                return line_start + idx;
            }
            units += ch.len_utf16();
        }
        text.len()
    }
}

fn clamp_to_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Apply byte-span edits to `text`, returning the new buffer.
///
/// Edits must not overlap; they are applied back to front so earlier spans
/// keep their offsets.
pub fn apply_edits(text: &str, edits: &[TextEditSpan]) -> String {
    let mut ordered: Vec<&TextEditSpan> = edits.iter().collect();
    ordered.sort_by_key(|edit| edit.start);
    let mut result = text.to_string();
    for edit in ordered.into_iter().rev() {
        result.replace_range(edit.start..edit.end, &edit.new_text);
    }
    result
}
