use std::sync::{Arc, Mutex};

use thicket_core::{InputEdit, Language, Point, Range, extent_of};
use thicket_tree::{Node, Tree};

use crate::log::{LogType, Logger};
use crate::parser::Parser;

type Span = (String, u32, u32, Point, Point);

/// Replaces `old_len` bytes at `start` with `insert`.
fn edit(text: &str, start: usize, old_len: usize, insert: &str) -> (String, InputEdit) {
    let new_text = format!("{}{}{}", &text[..start], insert, &text[start + old_len..]);
    let start_position = extent_of(&text.as_bytes()[..start]).extent;
    let old_end = extent_of(&text.as_bytes()[..start + old_len]);
    let new_end = extent_of(&new_text.as_bytes()[..start + insert.len()]);
    let edit = InputEdit {
        start_byte: start as u32,
        old_end_byte: old_end.bytes,
        new_end_byte: new_end.bytes,
        start_position,
        old_end_position: old_end.extent,
        new_end_position: new_end.extent,
    };
    (new_text, edit)
}

fn collect_spans(node: Node<'_>, out: &mut Vec<Span>) {
    out.push((
        node.kind().to_owned(),
        node.start_byte(),
        node.end_byte(),
        node.start_position(),
        node.end_position(),
    ));
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_spans(child, out);
        }
    }
}

fn spans(tree: &Tree) -> Vec<Span> {
    let mut out = Vec::new();
    collect_spans(tree.root_node(), &mut out);
    out
}

/// Parses `text`, applies the edit, reparses against the edited tree and
/// checks the result against a from-scratch parse of the new text.
fn reparse(language: Language, text: &str, start: usize, old_len: usize, insert: &str) -> Tree {
    let mut parser = Parser::new(language);
    let mut old = parser.parse(text, None).unwrap().tree().unwrap();

    let (new_text, input_edit) = edit(text, start, old_len, insert);
    old.edit(&input_edit);
    assert!(old.root_node().has_changes());

    let incremental = parser.parse(&new_text, Some(&old)).unwrap().tree().unwrap();
    let fresh = parser.parse(&new_text, None).unwrap().tree().unwrap();
    assert_eq!(incremental.root_node().to_sexp(), fresh.root_node().to_sexp());
    assert_eq!(spans(&incremental), spans(&fresh));
    assert!(!incremental.root_node().has_changes());
    incremental
}

#[test]
fn edit_inside_a_token() {
    let tree = reparse(thicket_langs::arithmetic(), "1+2+3", 2, 1, "22");
    assert_eq!(tree.root_node().end_byte(), 6);
    assert_eq!(tree.root_node().child(2).unwrap().utf8_text(), Some("22"));
}

#[test]
fn append_at_the_end() {
    let tree = reparse(thicket_langs::arithmetic(), "1+2", 3, 0, "+3");
    assert_eq!(tree.root_node().named_child_count(), 5);
}

#[test]
fn delete_a_suffix() {
    let tree = reparse(thicket_langs::arithmetic(), "1+2+3", 3, 2, "");
    assert_eq!(tree.root_node().to_sexp(), "(expr (num) (plus) (num))");
}

#[test]
fn insert_a_newline() {
    let tree = reparse(thicket_langs::arithmetic(), "1+2+3", 2, 0, "\n");
    let second = tree.root_node().child(2).unwrap();
    assert_eq!(second.start_position(), Point::new(1, 0));
}

#[test]
fn introduce_and_repair_an_error() {
    let mut parser = Parser::new(thicket_langs::arithmetic());
    let mut old = parser.parse("1+2", None).unwrap().tree().unwrap();

    let (broken_text, input_edit) = edit("1+2", 1, 0, "+");
    old.edit(&input_edit);
    let mut broken = parser.parse(&broken_text, Some(&old)).unwrap().tree().unwrap();
    assert!(broken.root_node().has_error());
    assert_eq!(broken.root_node().end_byte(), 4);

    let (text, input_edit) = edit(&broken_text, 1, 1, "");
    broken.edit(&input_edit);
    let repaired = parser.parse(&text, Some(&broken)).unwrap().tree().unwrap();
    assert!(!repaired.root_node().has_error());
    assert_eq!(repaired.root_node().to_sexp(), "(expr (num) (plus) (num))");
}

#[test]
fn unchanged_definitions_are_reused() {
    let messages = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&messages);
    let logger: Logger = Box::new(move |kind: LogType, message: &str| {
        if kind == LogType::Parse {
            sink.lock().unwrap().push(message.to_owned());
        }
    });

    let text = "def a() { f(); }\ndef b() {}\n";
    let mut parser = Parser::new(thicket_langs::toy());
    let mut old = parser.parse(text, None).unwrap().tree().unwrap();
    let (new_text, input_edit) = edit(text, 21, 1, "bb");
    old.edit(&input_edit);

    parser.set_logger(Some(logger));
    let tree = parser.parse(&new_text, Some(&old)).unwrap().tree().unwrap();

    let messages = messages.lock().unwrap();
    assert_eq!(messages[0], "parse_after_edit");
    assert!(messages.iter().any(|m| m.starts_with("reuse_node")));

    let fresh = Parser::new(thicket_langs::toy())
        .parse(&new_text, None)
        .unwrap()
        .tree()
        .unwrap();
    assert_eq!(spans(&tree), spans(&fresh));
    let second = tree.root_node().named_child(1).unwrap();
    assert_eq!(second.child_by_field_name("name").unwrap().utf8_text(), Some("bb"));
}

#[test]
fn edits_after_a_comment() {
    let text = "# note\ndef a() { f(); }\n";
    let tree = reparse(thicket_langs::toy(), text, 17, 1, "ff");
    assert_eq!(tree.root_node().child(0).unwrap().kind(), "comment");
}

#[test]
fn edits_inside_a_comment() {
    let text = "def a() {}\n# note\ndef b() {}\n";
    reparse(thicket_langs::toy(), text, 13, 4, "longer note");
}

#[test]
fn turn_a_comment_into_code() {
    let text = "def a() {\n  # f();\n}\n";
    let tree = reparse(thicket_langs::toy(), text, 12, 2, "");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(program (function_definition name: (identifier) body: (block (call function: (identifier)))))"
    );
}

#[test]
fn narrowing_included_ranges_reparses_the_excluded_tail() {
    let mut parser = Parser::new(thicket_langs::arithmetic());
    let old = parser.parse("1+2+3", None).unwrap().tree().unwrap();

    let range = Range::new(0, 3, Point::new(0, 0), Point::new(0, 3));
    parser.set_included_ranges(&[range]).unwrap();
    let tree = parser.parse("1+2+3", Some(&old)).unwrap().tree().unwrap();

    assert_eq!(tree.root_node().to_sexp(), "(expr (num) (plus) (num))");
    assert_eq!(tree.root_node().end_byte(), 3);
}
