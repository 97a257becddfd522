//! The 9x grammar (91a and newer).
//!
//! A 9x file is a sequence of hunks. Each hunk opens with a header line,
//! `<count> <type>`, where the count includes the header itself. Hunks
//! nest: a subject's payload is more hunks, a nested hint may embed a
//! hunk mid-hint. Builders return the exact number of lines they
//! consumed so the caller stays aligned with the declared counts even
//! when a payload is abandoned.
//!
//! Versions 91a, 95a, and 96a have been seen in the wild. Every 9x file
//! is prepended with an 88a section holding an "upgrade your reader"
//! notice; line numbering here starts at that section's closing
//! sentinel, which the caller leaves at index 0.

use std::sync::OnceLock;

use encoding_rs::WINDOWS_1252;
use log::{debug, info};
use regex::Regex;

use crate::uhs::binary::RawSection;
use crate::uhs::crypto;
use crate::uhs::error::{Result, UhsError};
use crate::uhs::escapes;
use crate::uhs::hotspot::HotSpotZone;
use crate::uhs::lines::{split_lines, LineSource};
use crate::uhs::node::{Node, NodeKind, SharedNode};
use crate::uhs::report::{DiagnosticSink, Severity};
use crate::uhs::root::RootNode;
use crate::uhs::AuxPolicy;

/// Compiled regex for hunk header lines.
///
/// A header is a decimal line count, a space, and a type word.
static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();

/// Returns the cached hunk header regex.
fn hunk_header() -> &'static Regex {
    HUNK_HEADER.get_or_init(|| {
        Regex::new("^[0-9]+ [A-Za-z]+$").expect("Invalid hunk header regex pattern")
    })
}

const BREAK_MARKER: &str = "^break^";

/// Parses a 9x file into a tree.
///
/// `src` must begin at the 88a sentinel line, so that hunk ids (line
/// indices) match the 1-based numbering used by link targets.
pub fn parse(
    src: &LineSource,
    raw: &RawSection,
    aux: AuxPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<RootNode> {
    // The master subject's title doubles as the decryption passphrase.
    let name = src.get(2)?.to_string();
    info!("Parsing 9x format file: {}", name);

    let parser = Parser9x {
        src,
        raw,
        key: crypto::generate_key(&name),
        sink,
    };

    let mut root = RootNode::new("root");
    let base = root.node();

    let mut index = 1;
    index += parser.build_nodes(&mut root, &base, index)?;
    root.sync_revealed();

    if aux != AuxPolicy::Ignore {
        if aux == AuxPolicy::Nest {
            // Promote the master subject's children to the root and let
            // the root take over its title, then divide the content from
            // the auxiliary nodes that follow.
            if let Some(master) = root.child(0) {
                let grandchildren = master.borrow().children().to_vec();
                root.set_children(grandchildren);
                root.set_title(name.clone());
            }
            root.add_child(Node::text(NodeKind::Blank, "--=File Info=--").shared());
        }
        while index < src.len() {
            index += parser.build_nodes(&mut root, &base, index)?;
        }
        root.sync_revealed();
    }
    debug!(
        "9x parse finished: {} top-level nodes, {} link targets",
        root.child_count(),
        root.link_count()
    );
    Ok(root)
}

struct Parser9x<'a> {
    src: &'a LineSource,
    raw: &'a RawSection,
    key: Vec<i32>,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Parser9x<'a> {
    /// Dispatches one hunk at `start` into children of `current`,
    /// returning the number of lines consumed. A line that is not a
    /// hunk header consumes itself.
    fn build_nodes(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let header = self.src.get(start)?;
        if !hunk_header().is_match(header) {
            return Ok(1);
        }

        match header.split(' ').nth(1).unwrap_or_default() {
            "comment" => self.parse_monolithic(root, current, start, NodeKind::Comment),
            "credit" => self.parse_monolithic(root, current, start, NodeKind::Credit),
            "hint" => self.parse_hint(root, current, start),
            "nesthint" => self.parse_nest_hint(root, current, start),
            "subject" => self.parse_subject(root, current, start),
            "link" => self.parse_link(current, start),
            "text" => self.parse_text(root, current, start),
            "hyperpng" | "gifa" => self.parse_hyper_image(root, current, start),
            "sound" => self.parse_sound(root, current, start),
            "blank" => self.parse_blank(current, start),
            "version" => self.parse_monolithic(root, current, start, NodeKind::Version),
            "info" => self.parse_info(root, current, start),
            "incentive" => self.parse_incentive(root, current, start),
            _ => self.parse_unknown(current, start),
        }
    }

    /// Reads the line count declared by a hunk header.
    fn declared_len(&self, header: &str) -> Result<usize> {
        let digits = header.split(' ').next().unwrap_or_default();
        digits.parse().map_err(|_| UhsError::MalformedHunk {
            line: self.src.physical_line(),
            detail: format!("unparsable hunk length in header {:?}", header),
        })
    }

    fn parse_num<T: std::str::FromStr>(&self, text: &str) -> Result<T> {
        text.trim().parse().map_err(|_| UhsError::MalformedHunk {
            line: self.src.physical_line(),
            detail: format!("expected a number, found {:?}", text),
        })
    }

    fn expand(&self, text: &str) -> String {
        escapes::expand_escapes(text, self.sink, self.src.physical_line())
    }

    /// Fetches `length` raw bytes at an absolute `offset`. A reference
    /// outside the raw section is recoverable and yields no bytes.
    fn read_raw(&self, offset: i64, length: usize) -> Vec<u8> {
        match self.raw.read(offset, length) {
            Some(bytes) => bytes.to_vec(),
            None => {
                self.sink.report(
                    Severity::Error,
                    "parser",
                    "Could not read referenced raw bytes",
                    self.src.physical_line(),
                    None,
                );
                Vec::new()
            }
        }
    }

    /// Splits the last two whitespace-separated fields of a binary
    /// reference line into an absolute offset and a byte length.
    fn offset_and_length(&self, line: &str) -> Result<(i64, usize)> {
        let mut tokens = line.split_whitespace().rev();
        let (last, prev) = (tokens.next(), tokens.next());
        match (prev, last) {
            (Some(offset), Some(length)) => {
                Ok((self.parse_num(offset)?, self.parse_num(length)?))
            }
            _ => Err(UhsError::MalformedHunk {
                line: self.src.physical_line(),
                detail: format!("malformed binary reference {:?}", line),
            }),
        }
    }

    /// ```text
    /// # subject
    /// title
    /// embedded hunk
    /// embedded hunk
    /// ```
    fn parse_subject(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let node = {
            let mut n = Node::text(NodeKind::Subject, self.expand(self.src.get(start + 1)?));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        let inner = total.saturating_sub(2);
        let mut j = 0;
        while j < inner {
            j += self.build_nodes(root, &node, start + 2 + j)?;
        }
        Ok(total.max(2))
    }

    /// ```text
    /// # hint
    /// question
    /// hint (encrypted)
    /// -
    /// hint (encrypted)
    /// ```
    ///
    /// `-` lines divide hints; a lone-space line becomes a blank
    /// paragraph within one.
    fn parse_hint(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let hint_node = {
            let mut n = Node::text(NodeKind::Hint, self.expand(self.src.get(start + 1)?));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(hint_node.clone());
        root.register_link(&hint_node);

        let inner = total.saturating_sub(2);
        let base = start + 2;
        let mut content = String::new();
        for j in 0..inner {
            let line = self.src.get(base + j)?;
            if line == "-" {
                if !content.is_empty() {
                    self.flush_hint(&hint_node, &content);
                    content.clear();
                }
            } else {
                if !content.is_empty() {
                    content.push_str(BREAK_MARKER);
                }
                if line == " " {
                    content.push_str("\n \n");
                } else {
                    content.push_str(&crypto::decrypt_88a(line));
                }
            }
            if j + 1 == inner && !content.is_empty() {
                self.flush_hint(&hint_node, &content);
            }
        }
        Ok(total.max(2))
    }

    /// ```text
    /// # nesthint
    /// question
    /// partial hint (encrypted)
    /// =
    /// embedded hunk
    /// rest of hint (encrypted)
    /// -
    /// hint (encrypted)
    /// ```
    fn parse_nest_hint(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let hint_node = {
            let mut n = Node::text(NodeKind::NestHint, self.expand(self.src.get(start + 1)?));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(hint_node.clone());
        root.register_link(&hint_node);

        let inner = total.saturating_sub(2);
        let base = start + 2;
        let mut content = String::new();
        let mut j = 0;
        while j < inner {
            let line = self.src.get(base + j)?;
            if line == "-" {
                if !content.is_empty() {
                    self.flush_hint(&hint_node, &content);
                    content.clear();
                }
            } else if line == "=" {
                // The embedded hunk splits the surrounding hint text.
                if !content.is_empty() {
                    self.flush_hint(&hint_node, &content);
                }
                j += self.build_nodes(root, &hint_node, base + j + 1)?;
                content.clear();
            } else {
                if !content.is_empty() {
                    content.push_str(BREAK_MARKER);
                }
                content.push_str(&crypto::decrypt_nest(line, &self.key));
            }
            if j + 1 == inner && !content.is_empty() {
                self.flush_hint(&hint_node, &content);
            }
            j += 1;
        }
        Ok(total.max(2))
    }

    fn flush_hint(&self, parent: &SharedNode, content: &str) {
        let child = Node::text(NodeKind::Hint, self.expand(content)).shared();
        parent.borrow_mut().add_child(child);
    }

    /// Comment, credit, and version hunks share one shape: a title line
    /// and a run of sentence lines joined with spaces into a single
    /// data child.
    ///
    /// ```text
    /// # version
    /// title
    /// sentence
    /// sentence
    /// ```
    fn parse_monolithic(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
        kind: NodeKind,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let (title_prefix, data_kind) = match kind {
            NodeKind::Version => ("Version: ", NodeKind::VersionData),
            NodeKind::Credit => ("", NodeKind::CreditData),
            _ => ("", NodeKind::CommentData),
        };
        let title = format!("{}{}", title_prefix, self.src.get(start + 1)?);
        let node = {
            let mut n = Node::text(kind, self.expand(&title));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        let inner = total.saturating_sub(2);
        let base = start + 2;
        let mut content = String::new();
        for j in 0..inner {
            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(self.src.get(base + j)?);
        }
        let data = Node::text(data_kind, self.expand(&content)).shared();
        node.borrow_mut().add_child(data);

        Ok(total.max(2))
    }

    /// ```text
    /// # text
    /// title
    /// 000000 0 offset length
    /// ```
    ///
    /// The payload lives in the raw section, encrypted line by line
    /// with the text-hunk cipher.
    fn parse_text(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let node = {
            let mut n = Node::text(NodeKind::Text, self.expand(self.src.get(start + 1)?));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        let (offset, length) = self.offset_and_length(self.src.get(start + 2)?)?;
        let bytes = self.read_raw(offset, length);
        let (decoded, _, _) = WINDOWS_1252.decode(&bytes);

        let mut content = String::new();
        for piece in split_lines(&decoded) {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&crypto::decrypt_text(piece, &self.key));
        }
        let data = Node::text(NodeKind::TextData, self.expand(&content)).shared();
        node.borrow_mut().add_child(data);

        Ok(3)
    }

    /// ```text
    /// # link
    /// title
    /// index
    /// ```
    ///
    /// The target is not parsed into a child here; files link in both
    /// directions, so targets are resolved through the registry on
    /// demand instead.
    fn parse_link(&self, current: &SharedNode, start: usize) -> Result<usize> {
        let node = Node::text(NodeKind::Link, self.expand(self.src.get(start + 1)?)).shared();
        current.borrow_mut().add_child(node.clone());

        let target = self.src.get_number(start + 2)?;
        node.borrow_mut().set_link_target(target);
        Ok(3)
    }

    /// ```text
    /// # hyperpng (or gifa)
    /// title
    /// 000000 offset length
    /// x1 y1 x2 y2
    /// # link
    /// title
    /// index
    /// x1 y1 x2 y2
    /// # overlay
    /// title
    /// 000000 offset length x y
    /// ```
    ///
    /// The main image becomes the first child of a hot spot node; each
    /// region line pairs with the link or overlay hunk after it. A
    /// malformed reference or region line abandons the rest of the
    /// payload but still consumes the declared count.
    fn parse_hyper_image(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let header = self.src.get(start)?;
        let total = self.declared_len(header)?;
        let consumed = total.max(3);
        let kind = if header.contains("hyperpng") {
            NodeKind::Hyperpng
        } else {
            NodeKind::Hypergif
        };

        let title = self.src.get(start + 1)?.to_string();

        let main_line = self.src.get(start + 2)?;
        let tokens: Vec<&str> = main_line.split(' ').collect();
        if tokens.len() != 3 {
            self.report_malformed("Malformed image reference line", main_line);
            return Ok(consumed);
        }
        let offset: i64 = self.parse_num(tokens[1])?;
        let length: usize = self.parse_num(tokens[2])?;
        let image = Node::image(kind, self.read_raw(offset, length)).shared();

        let hotspot = {
            let mut n = Node::hotspot(NodeKind::HotSpot, title);
            n.set_id(start);
            n.shared()
        };
        hotspot.borrow_mut().add_child(image);
        current.borrow_mut().add_child(hotspot.clone());
        root.register_link(&hotspot);

        let inner = total.saturating_sub(3);
        let base = start + 3;
        let mut j = 0;
        while j < inner {
            let zone_line = self.src.get(base + j)?;
            j += 1;
            let zone_tokens: Vec<&str> = zone_line.split(' ').collect();
            if zone_tokens.len() != 4 {
                self.report_malformed("Malformed region line", zone_line);
                return Ok(consumed);
            }
            let zone_x: i32 = self.parse_num::<i32>(zone_tokens[0])? - 1;
            let zone_y: i32 = self.parse_num::<i32>(zone_tokens[1])? - 1;
            let zone_x2: i32 = self.parse_num::<i32>(zone_tokens[2])? - 1;
            let zone_y2: i32 = self.parse_num::<i32>(zone_tokens[3])? - 1;

            let sub_header = self.src.get(base + j)?;
            j += 1;
            if !hunk_header().is_match(sub_header) {
                j += 1;
                continue;
            }
            let sub_total = self.declared_len(sub_header)?;
            match sub_header.split(' ').nth(1).unwrap_or_default() {
                "overlay" => {
                    // The overlay's title line is unused.
                    self.src.get(base + j)?;
                    j += 1;
                    let overlay_line = self.src.get(base + j)?;
                    j += 1;
                    let overlay_tokens: Vec<&str> = overlay_line.split(' ').collect();
                    if overlay_tokens.len() != 5 {
                        self.report_malformed("Malformed overlay line", overlay_line);
                        return Ok(consumed);
                    }
                    let offset: i64 = self.parse_num(overlay_tokens[1])?;
                    let length: usize = self.parse_num(overlay_tokens[2])?;
                    let pos_x: i32 = self.parse_num::<i32>(overlay_tokens[3])? - 1;
                    let pos_y: i32 = self.parse_num::<i32>(overlay_tokens[4])? - 1;

                    let overlay =
                        Node::image(NodeKind::Overlay, self.read_raw(offset, length)).shared();
                    hotspot.borrow_mut().add_child_with_zone(
                        overlay,
                        HotSpotZone {
                            zone_x,
                            zone_y,
                            zone_w: zone_x2 - zone_x,
                            zone_h: zone_y2 - zone_y,
                            pos_x,
                            pos_y,
                        },
                    );
                }
                "link" => {
                    let link =
                        Node::text(NodeKind::Link, self.expand(self.src.get(base + j)?)).shared();
                    j += 1;
                    hotspot.borrow_mut().add_child_with_zone(
                        link.clone(),
                        HotSpotZone {
                            zone_x,
                            zone_y,
                            zone_w: zone_x2 - zone_x,
                            zone_h: zone_y2 - zone_y,
                            pos_x: -1,
                            pos_y: -1,
                        },
                    );
                    let target = self.src.get_number(base + j)?;
                    j += 1;
                    link.borrow_mut().set_link_target(target);
                }
                _ => {
                    j += sub_total.saturating_sub(2);
                }
            }
        }
        Ok(consumed)
    }

    /// ```text
    /// # sound
    /// title
    /// 000000 offset length
    /// ```
    fn parse_sound(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let node = {
            let mut n = Node::text(NodeKind::Sound, self.expand(self.src.get(start + 1)?));
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        let (offset, length) = self.offset_and_length(self.src.get(start + 2)?)?;
        let data = Node::audio(NodeKind::SoundData, self.read_raw(offset, length)).shared();
        node.borrow_mut().add_child(data);

        Ok(3)
    }

    fn parse_blank(&self, current: &SharedNode, start: usize) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;
        current
            .borrow_mut()
            .add_child(Node::text(NodeKind::Blank, "^^^").shared());
        Ok(total.max(1))
    }

    /// ```text
    /// # info
    /// -
    /// length=#######
    /// date=DD-Mon-YY
    /// author=name
    /// copyright=sentence
    /// >sentence
    /// ```
    ///
    /// Lines are sorted into per-field buffers, then reassembled in a
    /// fixed field order regardless of their order in the file.
    fn parse_info(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let node = {
            let mut n = Node::text(
                NodeKind::Info,
                format!("Info: {}", self.src.get(start + 1)?),
            );
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        let inner = total.saturating_sub(2);
        if inner > 0 {
            // Buffer order: length, date, time, author, publisher,
            // copyright, author-note, game-note, notice, unknown.
            let mut buffers: [String; 10] = Default::default();
            let base = start + 2;
            for j in 0..inner {
                let raw_line = self.src.get(base + j)?;
                let mut sep = if raw_line.starts_with("copyright")
                    || raw_line.starts_with("notice")
                    || raw_line.starts_with("author-note")
                    || raw_line.starts_with("game-note")
                    || raw_line.starts_with('>')
                {
                    " "
                } else {
                    "\n"
                };

                let (slot, text, seed) = if raw_line.starts_with("length=") {
                    (0, raw_line, None)
                } else if raw_line.starts_with("date=") {
                    (1, raw_line, None)
                } else if raw_line.starts_with("time=") {
                    (2, raw_line, None)
                } else if raw_line.starts_with("author=") {
                    (3, raw_line, None)
                } else if raw_line.starts_with("publisher=") {
                    (4, raw_line, None)
                } else if let Some(rest) = raw_line.strip_prefix("copyright=") {
                    (5, rest, Some("copyright="))
                } else if let Some(rest) = raw_line.strip_prefix("author-note=") {
                    (6, rest, Some("author-note="))
                } else if let Some(rest) = raw_line.strip_prefix("game-note=") {
                    (7, rest, Some("game-note="))
                } else if let Some(rest) = raw_line.strip_prefix('>') {
                    (8, rest, None)
                } else {
                    self.sink.report(
                        Severity::Error,
                        "parser",
                        &format!("Unknown Info hunk line: {}", raw_line),
                        self.src.physical_line(),
                        None,
                    );
                    (9, raw_line, None)
                };

                let buffer = &mut buffers[slot];
                if let Some(label) = seed {
                    if buffer.is_empty() {
                        buffer.push_str(label);
                        sep = "";
                    }
                }
                if !buffer.is_empty() {
                    buffer.push_str(sep);
                }
                buffer.push_str(text);
            }

            let mut content = String::new();
            for (i, buffer) in buffers.iter().enumerate() {
                if buffer.is_empty() {
                    continue;
                }
                if !content.is_empty() {
                    content.push('\n');
                    // Prose fields get a blank line before them.
                    if (5..=8).contains(&i) {
                        content.push('\n');
                    }
                }
                content.push_str(buffer);
            }
            let data = Node::text(NodeKind::InfoData, content).shared();
            node.borrow_mut().add_child(data);
        }

        Ok(total.max(2))
    }

    /// ```text
    /// # incentive
    /// -
    /// ID list (encrypted)
    /// ```
    ///
    /// The list is a space-separated string of hunk ids, each with 'Z'
    /// (shown only to unregistered readers) or 'A' (denied to them)
    /// appended. Some files omit the list line entirely.
    fn parse_incentive(
        &self,
        root: &mut RootNode,
        current: &SharedNode,
        start: usize,
    ) -> Result<usize> {
        let total = self.declared_len(self.src.get(start)?)?;

        let node = {
            let mut n = Node::text(
                NodeKind::Incentive,
                format!("Incentive: {}", self.src.get(start + 1)?),
            );
            n.set_id(start);
            n.shared()
        };
        current.borrow_mut().add_child(node.clone());
        root.register_link(&node);

        if total > 2 {
            let list = crypto::decrypt_nest(self.src.get(start + 2)?, &self.key);
            node.borrow_mut()
                .add_child(Node::text(NodeKind::IncentiveData, list).shared());
            Ok(3)
        } else {
            Ok(2)
        }
    }

    /// Unrecognized hunks leave a stand-in node and are skipped whole.
    fn parse_unknown(&self, current: &SharedNode, start: usize) -> Result<usize> {
        let header = self.src.get(start)?;
        let total = self.declared_len(header)?;
        self.sink.report(
            Severity::Info,
            "parser",
            &format!("Unknown hunk: {}", header),
            self.src.physical_line(),
            None,
        );
        current
            .borrow_mut()
            .add_child(Node::text(NodeKind::Unknown, "^UNKNOWN HUNK^").shared());
        Ok(total.max(1))
    }

    fn report_malformed(&self, what: &str, line: &str) {
        self.sink.report(
            Severity::Error,
            "parser",
            &format!("{}: {:?}", what, line),
            self.src.physical_line(),
            None,
        );
    }
}
