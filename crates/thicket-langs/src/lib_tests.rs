use thicket_core::ExternalScanner;

use super::*;

#[test]
fn lookup_by_name() {
    assert_eq!(from_name("arithmetic").unwrap().name(), "arithmetic");
    assert_eq!(from_name("TOY").unwrap().name(), "toy");
    assert_eq!(from_name("ambiguous").unwrap().name(), "ambiguous");
    assert!(from_name("cobol").is_none());
}

#[test]
fn all_languages() {
    let names: Vec<String> = all().iter().map(|l| l.name().to_owned()).collect();
    assert_eq!(names, ["arithmetic", "ambiguous", "toy"]);
}

#[test]
fn repeated_calls_share_tables() {
    assert!(arithmetic() == arithmetic());
    assert!(arithmetic() != ambiguous());
}

#[test]
fn arithmetic_symbols() {
    let lang = arithmetic();
    assert_eq!(lang.node_kind_for_id(arithmetic::NUM), Some("num"));
    assert_eq!(lang.node_kind_for_id(arithmetic::PLUS), Some("plus"));
    assert_eq!(lang.node_kind_for_id(arithmetic::EXPR), Some("expr"));
    assert!(!lang.node_kind_is_visible(arithmetic::EXPR_REPEAT));
    assert_eq!(lang.token_count(), 3);
}

#[test]
fn toy_symbols_and_fields() {
    let lang = toy();
    assert_eq!(lang.id_for_node_kind("identifier", true), Some(toy::IDENTIFIER));
    assert_eq!(lang.id_for_node_kind("def", false), Some(toy::DEF));
    assert_eq!(lang.id_for_node_kind("function_definition", true), Some(toy::FUNCTION_DEFINITION));
    assert_eq!(lang.node_kind_for_id(toy::COMMENT), Some("comment"));
    assert_eq!(lang.node_kind_for_id(toy::CALL), Some("call"));
    assert!(lang.field_id_for_name("name").is_some());
    assert!(lang.field_id_for_name("arguments").is_some());
    assert_eq!(lang.keyword_capture_token(), Some(toy::IDENTIFIER));
    assert!(lang.has_external_scanner());
    assert_eq!(lang.external_symbol(0), Some(toy::COMMENT));
}

#[test]
fn comment_scanner_state_round_trips() {
    let mut scanner = toy::CommentScanner::default();
    scanner.deserialize(&[3]);
    let mut buffer = Vec::new();
    scanner.serialize(&mut buffer);
    assert_eq!(buffer, [3]);

    scanner.deserialize(&[]);
    buffer.clear();
    scanner.serialize(&mut buffer);
    assert_eq!(buffer, [0]);
}
