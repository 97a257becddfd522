use std::cell::Cell;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;
use uhs_reader::uhs::crypto::{encrypt_88a, encrypt_nest, encrypt_text, generate_key};
use uhs_reader::{
    AuxPolicy, DiagnosticSink, HotSpotZone, NodeKind, Severity, SharedNode, UhsError, UhsParser,
};

/// Counts reported diagnostics by severity, for asserting on recovery
/// behavior.
#[derive(Clone, Default)]
struct CountingSink {
    errors: Rc<Cell<usize>>,
    infos: Rc<Cell<usize>>,
}

impl DiagnosticSink for CountingSink {
    fn report(
        &self,
        severity: Severity,
        _source: &str,
        _message: &str,
        _line: usize,
        _cause: Option<&dyn Error>,
    ) {
        match severity {
            Severity::Error => self.errors.set(self.errors.get() + 1),
            Severity::Info => self.infos.set(self.infos.get() + 1),
        }
    }
}

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// Joins header and hunk lines with newlines, then appends the raw
/// binary section after a 0x1a divider.
fn assemble(header: &[&str], lines: &[String], raw: &[u8]) -> Vec<u8> {
    let mut text = String::new();
    for line in header {
        text.push_str(line);
        text.push('\n');
    }
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    let mut bytes = text.into_bytes();
    if !raw.is_empty() {
        bytes.push(0x1a);
        bytes.extend_from_slice(raw);
    }
    bytes
}

/// Absolute file offset of the first raw byte, given the text section.
fn raw_base(header: &[&str], lines: &[String]) -> usize {
    let text: usize = header.iter().map(|l| l.len() + 1).sum::<usize>()
        + lines.iter().map(|l| l.len() + 1).sum::<usize>();
    text + 1
}

fn child(node: &SharedNode, n: usize) -> SharedNode {
    node.borrow()
        .child(n)
        .unwrap_or_else(|| panic!("missing child {}", n))
}

fn text_of(node: &SharedNode) -> String {
    node.borrow()
        .content()
        .as_text()
        .expect("text content")
        .to_string()
}

fn kind_of(node: &SharedNode) -> NodeKind {
    node.borrow().kind()
}

const TITLE_9X: &str = "The Test Adventure";

/// A 9x file with a master subject holding a hint, a link, and a nested
/// hint with an embedded text hunk, followed by version, info, and
/// incentive hunks.
fn full_9x_fixture(dir: &TempDir) -> PathBuf {
    let key = generate_key(TITLE_9X);
    let payload = encrypt_text("Hello hinter.", &key);

    let header = ["UHS", "Important Game Hints", "1", "1"];
    let build = |offset: usize| -> Vec<String> {
        vec![
            "Please upgrade your reader".to_string(),
            "** END OF 88A FORMAT **".to_string(),
            "18 subject".to_string(),
            TITLE_9X.to_string(),
            "5 hint".to_string(),
            "How do I start?".to_string(),
            encrypt_88a("Look around."),
            "-".to_string(),
            encrypt_88a("Open the door."),
            "3 link".to_string(),
            "Map ##2".to_string(),
            "3".to_string(),
            "8 nesthint".to_string(),
            "What about the key?".to_string(),
            encrypt_nest("It is hidden.", &key),
            "=".to_string(),
            "3 text".to_string(),
            "A note".to_string(),
            format!("000000 0 {:06} {:03}", offset, payload.len()),
            encrypt_nest("Under the mat.", &key),
            "3 version".to_string(),
            "96a".to_string(),
            "Compiled with UHS Note 1.0".to_string(),
            "4 info".to_string(),
            "-".to_string(),
            "author=Jane Doe".to_string(),
            "date=01-Jan-96".to_string(),
            "3 incentive".to_string(),
            "-".to_string(),
            encrypt_nest("3A", &key),
        ]
    };

    // The reference line is fixed-width, so the offset computed from a
    // draft stays valid in the final render.
    let offset = raw_base(&header, &build(0));
    let lines = build(offset);
    assert_eq!(offset, raw_base(&header, &lines));

    write_fixture(dir, "full9x.uhs", &assemble(&header, &lines, payload.as_bytes()))
}

#[test]
fn parses_a_9x_tree_with_every_major_hunk_type() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = full_9x_fixture(&dir);

    let root = UhsParser::new().parse(&path).expect("parse 9x fixture");
    assert_eq!(root.title(), "root");
    assert_eq!(root.child_count(), 4);

    let subject = root.child(0).expect("master subject");
    assert_eq!(kind_of(&subject), NodeKind::Subject);
    assert_eq!(text_of(&subject), TITLE_9X);
    assert_eq!(subject.borrow().id(), Some(1));
    assert_eq!(subject.borrow().child_count(), 3);

    // Plain hint: two divisions, both decrypted.
    let hint = child(&subject, 0);
    assert_eq!(kind_of(&hint), NodeKind::Hint);
    assert_eq!(text_of(&hint), "How do I start?");
    assert_eq!(hint.borrow().id(), Some(3));
    assert_eq!(hint.borrow().child_count(), 2);
    assert_eq!(text_of(&child(&hint, 0)), "Look around.");
    assert_eq!(text_of(&child(&hint, 1)), "Open the door.");
    // A revealed hint group starts with only its first child visible.
    assert_eq!(hint.borrow().revealed_count(), 1);

    // Link: escape-expanded title, target resolving to the hint group.
    let link = child(&subject, 1);
    assert_eq!(kind_of(&link), NodeKind::Link);
    assert_eq!(text_of(&link), "Map #2");
    assert!(link.borrow().is_link());
    assert_eq!(link.borrow().link_target(), Some(3));
    let resolved = root.resolve_link(3).expect("link target registered");
    assert!(Rc::ptr_eq(&resolved, &hint));

    // Nested hint: text before and after the embedded hunk becomes
    // separate hint children around it.
    let nest = child(&subject, 2);
    assert_eq!(kind_of(&nest), NodeKind::NestHint);
    assert_eq!(nest.borrow().id(), Some(11));
    assert_eq!(nest.borrow().child_count(), 3);
    assert_eq!(text_of(&child(&nest, 0)), "It is hidden.");
    let text_node = child(&nest, 1);
    assert_eq!(kind_of(&text_node), NodeKind::Text);
    assert_eq!(text_of(&text_node), "A note");
    assert_eq!(text_of(&child(&text_node, 0)), "Hello hinter.");
    assert_eq!(text_of(&child(&nest, 2)), "Under the mat.");

    // Auxiliary trailer in canon order.
    let version = root.child(1).expect("version");
    assert_eq!(kind_of(&version), NodeKind::Version);
    assert_eq!(text_of(&version), "Version: 96a");
    assert_eq!(text_of(&child(&version, 0)), "Compiled with UHS Note 1.0");

    let info = root.child(2).expect("info");
    assert_eq!(kind_of(&info), NodeKind::Info);
    assert_eq!(text_of(&info), "Info: -");
    // Fields are reordered into the fixed field order.
    assert_eq!(text_of(&child(&info, 0)), "date=01-Jan-96\nauthor=Jane Doe");

    let incentive = root.child(3).expect("incentive");
    assert_eq!(kind_of(&incentive), NodeKind::Incentive);
    assert_eq!(text_of(&incentive), "Incentive: -");
    assert_eq!(text_of(&child(&incentive, 0)), "3A");

    // Direct root children are forced fully visible.
    assert_eq!(root.node().borrow().revealed_count(), 4);
}

#[test]
fn aux_policies_rearrange_the_trailer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = full_9x_fixture(&dir);

    let ignored = UhsParser::new()
        .aux_policy(AuxPolicy::Ignore)
        .parse(&path)
        .expect("parse with ignore");
    assert_eq!(ignored.child_count(), 1);
    assert_eq!(kind_of(&ignored.child(0).expect("subject")), NodeKind::Subject);

    let nested = UhsParser::new()
        .aux_policy(AuxPolicy::Nest)
        .parse(&path)
        .expect("parse with nest");
    // Master subject's children are promoted, then a separator and the
    // trailer follow: hint, link, nesthint, blank, version, info, incentive.
    assert_eq!(nested.title(), TITLE_9X);
    assert_eq!(nested.child_count(), 7);
    assert_eq!(kind_of(&nested.child(0).expect("hint")), NodeKind::Hint);
    let blank = nested.child(3).expect("separator");
    assert_eq!(kind_of(&blank), NodeKind::Blank);
    assert_eq!(text_of(&blank), "--=File Info=--");
    assert_eq!(kind_of(&nested.child(4).expect("version")), NodeKind::Version);
    assert_eq!(nested.node().borrow().revealed_count(), 7);
}

#[test]
fn parses_hotspot_regions_links_and_overlays() {
    let key_title = "Picture Town";
    let main_image = b"PNGDATA";
    let overlay_image = b"OVERLAYDATA";

    let header = ["UHS", "Pictures", "1", "1"];
    let build = |off1: usize, off2: usize| -> Vec<String> {
        vec![
            "Please upgrade your reader".to_string(),
            "** END OF 88A FORMAT **".to_string(),
            "13 subject".to_string(),
            key_title.to_string(),
            "11 hyperpng".to_string(),
            "The Map".to_string(),
            format!("000000 {:06} {:03}", off1, main_image.len()),
            "10 20 110 220".to_string(),
            "3 link".to_string(),
            "Click here".to_string(),
            "3".to_string(),
            "5 5 50 50".to_string(),
            "3 overlay".to_string(),
            "Detail".to_string(),
            format!("000000 {:06} {:03} 30 40", off2, overlay_image.len()),
        ]
    };

    let off1 = raw_base(&header, &build(0, 0));
    let off2 = off1 + main_image.len();
    let lines = build(off1, off2);
    assert_eq!(off1, raw_base(&header, &lines));

    let mut raw = main_image.to_vec();
    raw.extend_from_slice(overlay_image);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "hotspot.uhs", &assemble(&header, &lines, &raw));

    let root = UhsParser::new().parse(&path).expect("parse hotspot fixture");
    let subject = root.child(0).expect("subject");
    let hotspot = child(&subject, 0);
    assert_eq!(kind_of(&hotspot), NodeKind::HotSpot);
    assert!(hotspot.borrow().is_hotspot());
    assert_eq!(text_of(&hotspot), "The Map");
    assert_eq!(hotspot.borrow().id(), Some(3));
    assert_eq!(hotspot.borrow().child_count(), 3);

    // First child is the base image with a default zone.
    let image = child(&hotspot, 0);
    assert_eq!(kind_of(&image), NodeKind::Hyperpng);
    match image.borrow().content() {
        uhs_reader::NodeContent::Image(bytes) => assert_eq!(bytes, main_image),
        other => panic!("expected image content, got {:?}", other),
    }
    assert_eq!(hotspot.borrow().zone(0), Some(HotSpotZone::default()));

    // Region coordinates shift from 1-based corners to a 0-based origin
    // plus extent.
    let link = child(&hotspot, 1);
    assert_eq!(kind_of(&link), NodeKind::Link);
    assert_eq!(link.borrow().link_target(), Some(3));
    assert_eq!(
        hotspot.borrow().zone(1),
        Some(HotSpotZone {
            zone_x: 9,
            zone_y: 19,
            zone_w: 100,
            zone_h: 200,
            pos_x: -1,
            pos_y: -1,
        })
    );

    let overlay = child(&hotspot, 2);
    assert_eq!(kind_of(&overlay), NodeKind::Overlay);
    match overlay.borrow().content() {
        uhs_reader::NodeContent::Image(bytes) => assert_eq!(bytes, overlay_image),
        other => panic!("expected image content, got {:?}", other),
    }
    assert_eq!(
        hotspot.borrow().zone(2),
        Some(HotSpotZone {
            zone_x: 4,
            zone_y: 4,
            zone_w: 45,
            zone_h: 45,
            pos_x: 29,
            pos_y: 39,
        })
    );

    // The self-referencing link resolves to the hot spot group itself.
    let resolved = root.resolve_link(3).expect("hotspot registered");
    assert!(Rc::ptr_eq(&resolved, &hotspot));
}

#[test]
fn parses_a_legacy_88a_tree() {
    let header = ["UHS", "Tiny Quest", "11", "15"];
    let lines = vec![
        encrypt_88a("Getting Started"),
        "5".to_string(),
        encrypt_88a("Puzzles"),
        "9".to_string(),
        encrypt_88a("How do I begin"),
        "11".to_string(),
        encrypt_88a("Where is the key"),
        "13".to_string(),
        encrypt_88a("How do I open the safe"),
        "14".to_string(),
        encrypt_88a("Try the door."),
        encrypt_88a("It is unlocked."),
        encrypt_88a("Check the drawer."),
        encrypt_88a("Spin the dial."),
        encrypt_88a("The code is 123."),
        "Hints by Example Author".to_string(),
    ];

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "legacy.uhs", &assemble(&header, &lines, &[]));

    let root = UhsParser::new().parse(&path).expect("parse 88a fixture");
    assert_eq!(root.title(), "Tiny Quest");
    // Two subjects plus the synthesized blank, version, and credit nodes.
    assert_eq!(root.child_count(), 5);

    let started = root.child(0).expect("first subject");
    assert_eq!(kind_of(&started), NodeKind::Subject);
    assert_eq!(text_of(&started), "Getting Started");
    assert_eq!(started.borrow().child_count(), 2);

    let begin = child(&started, 0);
    assert_eq!(kind_of(&begin), NodeKind::Question);
    assert_eq!(text_of(&begin), "How do I begin?");
    assert_eq!(begin.borrow().child_count(), 2);
    assert_eq!(text_of(&child(&begin, 0)), "Try the door.");
    assert_eq!(text_of(&child(&begin, 1)), "It is unlocked.");

    let key_question = child(&started, 1);
    assert_eq!(text_of(&key_question), "Where is the key?");
    assert_eq!(key_question.borrow().child_count(), 1);
    assert_eq!(text_of(&child(&key_question, 0)), "Check the drawer.");

    let puzzles = root.child(1).expect("second subject");
    assert_eq!(text_of(&puzzles), "Puzzles");
    let safe = child(&puzzles, 0);
    assert_eq!(text_of(&safe), "How do I open the safe?");
    assert_eq!(safe.borrow().child_count(), 2);
    assert_eq!(text_of(&child(&safe, 0)), "Spin the dial.");
    assert_eq!(text_of(&child(&safe, 1)), "The code is 123.");

    let blank = root.child(2).expect("separator");
    assert_eq!(kind_of(&blank), NodeKind::Blank);
    assert_eq!(text_of(&blank), "--=File Info=--");

    let version = root.child(3).expect("version");
    assert_eq!(text_of(&version), "Version: 88a");
    assert_eq!(version.borrow().child_count(), 1);

    let credit = root.child(4).expect("credit");
    assert_eq!(kind_of(&credit), NodeKind::Credit);
    assert_eq!(text_of(&child(&credit, 0)), "Hints by Example Author");
}

#[test]
fn rejects_files_without_the_magic_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "not.uhs", b"MOO\nTitle\n1\n2\n");

    let err = UhsParser::new().silent().parse(&path).unwrap_err();
    assert!(matches!(err, UhsError::NotAUhsFile));
}

#[test]
fn a_malformed_header_fails_with_one_error_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "badheader.uhs", b"UHS\nTitle\n1\nxyz\n");

    let sink = CountingSink::default();
    let err = UhsParser::new()
        .sink(Box::new(sink.clone()))
        .parse(&path)
        .unwrap_err();
    assert!(matches!(err, UhsError::MalformedHeader { line: 4, .. }));
    assert_eq!(sink.errors.get(), 1);
    assert_eq!(sink.infos.get(), 0);
}

#[test]
fn an_out_of_range_binary_reference_recovers_with_empty_content() {
    let key_title = "Broken References";
    let header = ["UHS", "Broken", "1", "1"];
    let lines = vec![
        "Please upgrade your reader".to_string(),
        "** END OF 88A FORMAT **".to_string(),
        "5 subject".to_string(),
        key_title.to_string(),
        "3 text".to_string(),
        "A note".to_string(),
        "000000 0 999999 100".to_string(),
    ];

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "badref.uhs", &assemble(&header, &lines, b"x"));

    let sink = CountingSink::default();
    let root = UhsParser::new()
        .sink(Box::new(sink.clone()))
        .parse(&path)
        .expect("recoverable parse");
    assert_eq!(sink.errors.get(), 1);

    let text_node = child(&root.child(0).expect("subject"), 0);
    assert_eq!(kind_of(&text_node), NodeKind::Text);
    assert_eq!(text_of(&child(&text_node, 0)), "");
}

#[test]
fn unknown_hunks_leave_a_stand_in_and_keep_alignment() {
    let key_title = "Oddities";
    let header = ["UHS", "Odd", "1", "1"];
    let lines = vec![
        "Please upgrade your reader".to_string(),
        "** END OF 88A FORMAT **".to_string(),
        "8 subject".to_string(),
        key_title.to_string(),
        "3 widget".to_string(),
        "mystery line".to_string(),
        "another mystery".to_string(),
        "3 hint".to_string(),
        "Still here?".to_string(),
        encrypt_88a("Yes."),
    ];

    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "unknown.uhs", &assemble(&header, &lines, &[]));

    let sink = CountingSink::default();
    let root = UhsParser::new()
        .sink(Box::new(sink.clone()))
        .parse(&path)
        .expect("parse with unknown hunk");
    assert_eq!(sink.errors.get(), 0);
    assert_eq!(sink.infos.get(), 1);

    let subject = root.child(0).expect("subject");
    assert_eq!(subject.borrow().child_count(), 2);
    let stand_in = child(&subject, 0);
    assert_eq!(kind_of(&stand_in), NodeKind::Unknown);
    assert_eq!(text_of(&stand_in), "^UNKNOWN HUNK^");
    // The hunk after the unknown one still lands on its header line.
    let hint = child(&subject, 1);
    assert_eq!(kind_of(&hint), NodeKind::Hint);
    assert_eq!(text_of(&hint), "Still here?");
    assert_eq!(text_of(&child(&hint, 0)), "Yes.");
}
