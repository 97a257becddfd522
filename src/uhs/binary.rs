//! The raw binary section at the end of 91a-and-newer files.
//!
//! Everything after the single 0x1A control byte is an opaque byte pool
//! holding images, sounds, and encrypted text blocks. Text hunks address
//! into it with (offset, length) pairs where the offset is absolute in the
//! file, so it must be rebased against the section's own start before
//! indexing.

use log::trace;

/// The trailing byte pool plus its absolute offset in the file.
#[derive(Debug, Default)]
pub struct RawSection {
    data: Vec<u8>,
    /// Absolute file offset of `data[0]`; `None` when the file has no
    /// binary section.
    base: Option<u64>,
}

impl RawSection {
    pub fn new(data: Vec<u8>, base: u64) -> Self {
        if data.is_empty() {
            RawSection::default()
        } else {
            RawSection {
                data,
                base: Some(base),
            }
        }
    }

    /// An empty section, for files that end at the control byte.
    pub fn absent() -> Self {
        RawSection::default()
    }

    pub fn is_present(&self) -> bool {
        self.base.is_some()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extracts `length` bytes at the given absolute file offset.
    ///
    /// Returns `None` when the section is absent or the rebased range
    /// falls outside the pool; callers substitute an empty payload and
    /// keep parsing.
    pub fn read(&self, file_offset: i64, length: usize) -> Option<&[u8]> {
        let base = self.base?;
        let start = file_offset.checked_sub(base as i64)?;
        if start < 0 {
            return None;
        }
        let start = start as usize;
        let end = start.checked_add(length)?;
        if end > self.data.len() {
            trace!(
                "binary range {}+{} exceeds {}-byte raw section",
                start,
                length,
                self.data.len()
            );
            return None;
        }
        Some(&self.data[start..end])
    }
}
