//! The file's text hunks as an indexed line sequence.
//!
//! All hunk indices in a UHS file are positions into this sequence. The
//! source also tracks which line was last served and how many physical
//! lines precede index 0 (the four-line header, plus any discarded 88a
//! preamble in a 9x file), so diagnostics can report positions in the
//! physical file even deep inside the recursive descent.

use std::cell::Cell;

use crate::uhs::error::{Result, UhsError};

/// An ordered, 0-indexed sequence of decoded text lines.
#[derive(Debug)]
pub struct LineSource {
    lines: Vec<String>,
    /// Physical lines before index 0.
    base: usize,
    /// Index of the last line served by `get`.
    cursor: Cell<usize>,
}

impl LineSource {
    pub fn new(lines: Vec<String>, base: usize) -> Self {
        LineSource {
            lines,
            base,
            cursor: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns line `n`, recording it as the last-touched line for
    /// diagnostics. An index past the end means a hunk's declared length
    /// overran the file, which is fatal.
    pub fn get(&self, n: usize) -> Result<&str> {
        self.cursor.set(n);
        self.lines.get(n).map(String::as_str).ok_or_else(|| {
            UhsError::MalformedHunk {
                line: self.physical_line(),
                detail: format!("line index {} past end of file", n),
            }
        })
    }

    /// Parses line `n` as an unsigned decimal index.
    pub fn get_number(&self, n: usize) -> Result<usize> {
        let text = self.get(n)?;
        text.trim().parse().map_err(|_| UhsError::MalformedHunk {
            line: self.physical_line(),
            detail: format!("expected a number, found {:?}", text),
        })
    }

    /// Drops the first `n` lines (a discarded 88a preamble), shifting the
    /// physical-line base so later diagnostics stay accurate.
    pub fn drop_preamble(&mut self, n: usize) {
        let n = n.min(self.lines.len());
        self.lines.drain(..n);
        self.base += n;
    }

    /// 1-based line number, in the physical file, of the last line served.
    pub fn physical_line(&self) -> usize {
        self.base + self.cursor.get() + 1
    }
}

/// Splits text on any of the DOS, Mac, and Unix line terminators.
///
/// A terminator at the very end of the text does not produce a trailing
/// empty line.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                out.push(&text[start..i]);
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        out.push(&text[start..]);
    }
    out
}
