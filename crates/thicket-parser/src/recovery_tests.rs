use thicket_tree::{Node, Tree};

use crate::parser::Parser;

fn parse_arithmetic(text: &str) -> Tree {
    Parser::new(thicket_langs::arithmetic())
        .parse(text, None)
        .unwrap()
        .tree()
        .unwrap()
}

fn find<'t>(node: Node<'t>, predicate: &dyn Fn(Node<'t>) -> bool) -> Option<Node<'t>> {
    if predicate(node) {
        return Some(node);
    }
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .find_map(|child| find(child, predicate))
}

#[test]
fn trailing_operator_is_an_error() {
    let tree = parse_arithmetic("1+");
    let root = tree.root_node();

    assert!(root.has_error());
    assert_eq!((root.start_byte(), root.end_byte()), (0, 2));
    assert!(find(root, &|n| n.kind() == "num").is_some());
    assert!(find(root, &|n| n.is_error()).is_some());
}

#[test]
fn unrecognized_character_is_skipped() {
    let tree = parse_arithmetic("1+?2");
    let root = tree.root_node();

    assert!(root.has_error());
    assert!(root.to_sexp().contains("(UNEXPECTED '?')"));
    assert_eq!(root.end_byte(), 4);
    let two = find(root, &|n| n.kind() == "num" && n.start_byte() == 3).unwrap();
    assert_eq!(two.utf8_text(), Some("2"));
}

#[test]
fn leading_operator_is_wrapped_in_an_error() {
    let tree = parse_arithmetic("+1");
    let root = tree.root_node();

    assert!(root.has_error());
    let error = find(root, &|n| n.is_error()).unwrap();
    assert_eq!(error.start_byte(), 0);
    assert!(find(root, &|n| n.kind() == "num" && n.utf8_text() == Some("1")).is_some());
}

#[test]
fn missing_token_is_inserted() {
    let mut parser = Parser::new(thicket_langs::toy());
    let tree = parser.parse("def f() { g() }", None).unwrap().tree().unwrap();
    let root = tree.root_node();

    assert!(root.has_error());
    assert!(root.to_sexp().contains("(MISSING \";\")"));
    let missing = find(root, &|n| n.is_missing()).unwrap();
    assert_eq!(missing.kind(), ";");
    assert_eq!(missing.start_byte(), missing.end_byte());
    assert_eq!(missing.parent().unwrap().kind(), "call");
}

#[test]
fn every_byte_stays_covered() {
    for text in ["1+", "+1", "++", "1 + + 2", "12 ? 3", "1++++++2", "é+1", "?", "1 2 3"] {
        let tree = parse_arithmetic(text);
        let root = tree.root_node();
        assert!(root.has_error(), "{text:?} should not parse cleanly");
        assert_eq!(root.start_byte(), 0, "{text:?}");
        assert_eq!(root.end_byte() as usize, text.len(), "{text:?}");
    }
}

#[test]
fn errors_do_not_leak_into_clean_siblings() {
    let mut parser = Parser::new(thicket_langs::toy());
    let text = "def a() { f(); }\ndef b() { ) }\ndef c() { h(); }\n";
    let tree = parser.parse(text, None).unwrap().tree().unwrap();
    let root = tree.root_node();

    assert!(root.has_error());
    let first = root.named_child(0).unwrap();
    assert_eq!(first.kind(), "function_definition");
    assert!(!first.has_error());
    let last = root.named_child(root.named_child_count() - 1).unwrap();
    assert_eq!(last.kind(), "function_definition");
    assert!(!last.has_error());
    assert_eq!(last.child_by_field_name("name").unwrap().utf8_text(), Some("c"));
}
