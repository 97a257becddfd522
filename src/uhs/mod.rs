//! Core UHS hint file parser module

pub mod error;
pub mod hotspot;
pub mod node;
pub mod report;
pub mod root;

pub mod crypto;
mod binary;
mod escapes;
mod lines;
mod parse88;
mod parse9x;

use std::fs;
use std::path::Path;

use encoding_rs::WINDOWS_1252;
use log::{debug, info};
use memchr::memchr;

use self::binary::RawSection;
use self::lines::LineSource;
pub use self::error::{Result, UhsError};
use self::report::{DiagnosticSink, LogSink, NullSink, Severity};
use self::root::RootNode;

/// The line closing the legacy section of a 9x file. Its absence means
/// the whole file is in the 88a format.
pub const FORMAT_88A_SENTINEL: &str = "** END OF 88A FORMAT **";

/// How the auxiliary nodes trailing the master subject of a 9x file
/// (version, info, incentive) are arranged in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxPolicy {
    /// Keep them as siblings of the master subject (canon).
    #[default]
    Normal,
    /// Omit them.
    Ignore,
    /// Replace the root's children with the master subject's and append
    /// the auxiliary nodes after a separator.
    Nest,
}

/// The main parser for UHS hint files.
///
/// Detects the format variant (88a or 9x) and builds a node tree.
/// Supports UHS versions 88a, 91a, 95a, and 96a.
pub struct UhsParser {
    aux: AuxPolicy,
    sink: Box<dyn DiagnosticSink>,
}

impl Default for UhsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UhsParser {
    pub fn new() -> Self {
        UhsParser {
            aux: AuxPolicy::Normal,
            sink: Box::new(LogSink),
        }
    }

    /// Sets the arrangement of auxiliary nodes.
    pub fn aux_policy(mut self, aux: AuxPolicy) -> Self {
        self.aux = aux;
        self
    }

    /// Replaces the diagnostic sink parse events are reported to.
    pub fn sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Discards diagnostics instead of logging them.
    pub fn silent(self) -> Self {
        self.sink(Box::new(NullSink))
    }

    /// Read a UHS file from the given path and build its node tree.
    ///
    /// # Errors
    /// Returns an error if:
    /// - File cannot be opened
    /// - The magic line is missing
    /// - The header or a hunk is malformed beyond recovery
    ///
    /// The failure is also reported through the diagnostic sink, once.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<RootNode> {
        let path = path.as_ref();
        info!("Opening UHS file: {}", path.display());
        match self.parse_file(path) {
            Ok(root) => Ok(root),
            Err(e) => {
                self.sink.report(
                    Severity::Error,
                    "parser",
                    &e.to_string(),
                    e.line().unwrap_or(0),
                    None,
                );
                Err(e)
            }
        }
    }

    fn parse_file(&self, path: &Path) -> Result<RootNode> {
        let bytes = fs::read(path)?;

        // Since 91a there is a hunk of binary at the end of the file,
        // referenced by absolute offset. It starts after a 0x1a byte.
        let (text_bytes, raw) = match memchr(0x1a, &bytes) {
            Some(pos) => (
                &bytes[..pos],
                RawSection::new(bytes[pos + 1..].to_vec(), (pos + 1) as u64),
            ),
            None => (&bytes[..], RawSection::absent()),
        };
        if raw.is_present() {
            debug!("Raw binary section: {} bytes", raw.len());
        }

        let (decoded, _, _) = WINDOWS_1252.decode(text_bytes);
        let mut all_lines: Vec<String> = lines::split_lines(&decoded)
            .into_iter()
            .map(str::to_string)
            .collect();

        // Four-line header: magic, title, first and last hint positions.
        if all_lines.first().map(String::as_str) != Some("UHS") {
            return Err(UhsError::NotAUhsFile);
        }
        let title = all_lines.get(1).cloned().unwrap_or_default();
        let hint_section_end: usize = all_lines
            .get(3)
            .ok_or_else(|| UhsError::MalformedHeader {
                line: all_lines.len(),
                detail: "missing hint section bounds".to_string(),
            })?
            .trim()
            .parse()
            .map_err(|_| UhsError::MalformedHeader {
                line: 4,
                detail: format!("unparsable last-hint position {:?}", all_lines[3]),
            })?;
        // The first-hint position on line 3 is never needed.

        let hunk_lines = all_lines.split_off(4);
        let mut src = LineSource::new(hunk_lines, 4);

        // In 88a files the region past the hints is credits. Since 91a it
        // holds an "upgrade your reader" notice followed by a sentinel,
        // and hunk numbering restarts at the sentinel.
        let mut format_88a = true;
        let mut i = hint_section_end;
        while i < src.len() {
            if src.get(i)? == FORMAT_88A_SENTINEL {
                format_88a = false;
                src.drop_preamble(i);
                break;
            }
            i += 1;
        }

        let root = if format_88a {
            debug!("Detected 88a format");
            parse88::parse(&src, &title, hint_section_end)?
        } else {
            debug!("Detected 9x format");
            parse9x::parse(&src, &raw, self.aux, self.sink.as_ref())?
        };
        info!(
            "UHS file parsed: {} top-level nodes, {} link targets",
            root.child_count(),
            root.link_count()
        );
        Ok(root)
    }
}

/// Convenience function: parse a file with diagnostics going to the log.
pub fn parse(path: impl AsRef<Path>, aux: AuxPolicy) -> Result<RootNode> {
    UhsParser::new().aux_policy(aux).parse(path)
}
