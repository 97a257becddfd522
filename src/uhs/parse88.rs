//! The legacy 88a grammar.
//!
//! An 88a file is a flat sequence of alternating title/index lines: each
//! subject is followed by the 1-based position of its first question, each
//! question by the position of its first hint, and the hint lines
//! themselves are ciphertext. Subject and question boundaries come from
//! successive index pairs; the final question's hint range is closed by
//! the header's last-hint index, since no following pair exists. A
//! Version and a Credit node are synthesized because 88a does not report
//! that metadata natively.

use log::{debug, info};

use crate::uhs::crypto;
use crate::uhs::error::{Result, UhsError};
use crate::uhs::lines::LineSource;
use crate::uhs::node::{Node, NodeKind};
use crate::uhs::root::RootNode;
use crate::uhs::FORMAT_88A_SENTINEL;

/// Parses an 88a file into a tree.
///
/// `src` begins at the first subject line; `hint_section_end` is the
/// header's 1-based index of the last hint line.
pub fn parse(src: &LineSource, title: &str, hint_section_end: usize) -> Result<RootNode> {
    info!("Parsing 88a format file: {}", title);

    let root = RootNode::new(title);
    let question_section_start = file_index(src, 1)?;

    let mut s = 0;
    while s < question_section_start {
        let subject =
            Node::text(NodeKind::Subject, crypto::decrypt_88a(src.get(s)?)).shared();
        root.add_child(subject.clone());

        let first_question = file_index(src, s + 1)?;
        // On the last subject this reads a question's first hint, which
        // still closes the question range correctly.
        let next_subjects_first_question = file_index(src, s + 3)?;

        let mut q = first_question;
        while q < next_subjects_first_question {
            let question = Node::text(
                NodeKind::Question,
                format!("{}?", crypto::decrypt_88a(src.get(q)?)),
            )
            .shared();
            subject.borrow_mut().add_child(question.clone());

            let first_hint = file_index(src, q + 1)?;
            let last_hint = if s + 2 == question_section_start
                && q + 2 == next_subjects_first_question
            {
                // The final question has no following index pair; the
                // header's last-hint index closes it.
                hint_section_end
            } else {
                file_index(src, q + 3)?
            };

            for h in first_hint..last_hint {
                let hint =
                    Node::text(NodeKind::Hint, crypto::decrypt_88a(src.get(h)?)).shared();
                question.borrow_mut().add_child(hint);
            }
            q += 2;
        }
        s += 2;
    }
    debug!("88a subject section parsed: {} subjects", root.child_count());

    root.add_child(Node::text(NodeKind::Blank, "--=File Info=--").shared());

    let version = Node::text(NodeKind::Version, "Version: 88a").shared();
    version.borrow_mut().add_child(
        Node::text(
            NodeKind::VersionData,
            "This version info was synthesized during parsing because the 88a format does not report it.",
        )
        .shared(),
    );
    root.add_child(version);

    let credit = Node::text(NodeKind::Credit, "Credits").shared();
    let mut credit_content = String::new();
    for i in hint_section_end..src.len() {
        let line = src.get(i)?;
        if line == FORMAT_88A_SENTINEL {
            break;
        }
        credit_content.push_str(line);
    }
    credit
        .borrow_mut()
        .add_child(Node::text(NodeKind::CreditData, credit_content).shared());
    root.add_child(credit);

    Ok(root)
}

/// Reads a 1-based file position from line `n` and converts it to a
/// 0-based line index.
fn file_index(src: &LineSource, n: usize) -> Result<usize> {
    let position = src.get_number(n)?;
    position.checked_sub(1).ok_or_else(|| UhsError::MalformedHunk {
        line: src.physical_line(),
        detail: "file positions are 1-based; found 0".to_string(),
    })
}
