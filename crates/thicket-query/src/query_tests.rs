use indoc::indoc;

use crate::{CaptureQuantifier, Query, QueryPredicate, QueryPredicateArg, QueryProperty};

fn query(source: &str) -> Query {
    Query::new(&thicket_langs::toy(), source).unwrap()
}

#[test]
fn patterns_and_captures_are_numbered_in_source_order() {
    let q = query(indoc! {"
        (function_definition
          name: (identifier) @name
          body: (block (call) @call))
        (call function: (identifier) @name)
    "});

    assert_eq!(q.pattern_count(), 2);
    assert_eq!(q.capture_names(), ["name", "call"]);
    assert_eq!(q.capture_index_for_name("call"), Some(1));
    assert_eq!(q.capture_index_for_name("nope"), None);
    assert_eq!(q.language(), &thicket_langs::toy());
}

#[test]
fn pattern_byte_ranges() {
    let source = "(call)\n  (block) @b\n";
    let q = query(source);

    assert_eq!(q.start_byte_for_pattern(0), Some(0));
    assert_eq!(q.end_byte_for_pattern(0), Some(6));
    assert_eq!(q.start_byte_for_pattern(1), Some(9));
    assert_eq!(q.end_byte_for_pattern(1), Some(19));
    assert_eq!(q.start_byte_for_pattern(2), None);
}

#[test]
fn capture_quantifiers() {
    let q = query(indoc! {"
        (block (call) @one)
        (block (call)? @optional)
        (block (call)* @many)
        (block (call)+ @some)
        (block [(call) @one (comment)])
        (block (call) @one (call) @one)
    "});

    use CaptureQuantifier::*;
    assert_eq!(q.capture_quantifiers(0), [One, Zero, Zero, Zero]);
    assert_eq!(q.capture_quantifiers(1), [Zero, ZeroOrOne, Zero, Zero]);
    assert_eq!(q.capture_quantifiers(2), [Zero, Zero, ZeroOrMore, Zero]);
    assert_eq!(q.capture_quantifiers(3), [Zero, Zero, Zero, OneOrMore]);
    assert_eq!(q.capture_quantifiers(4), [ZeroOrOne, Zero, Zero, Zero]);
    assert_eq!(q.capture_quantifiers(5), [OneOrMore, Zero, Zero, Zero]);
    assert!(q.capture_quantifiers(6).is_empty());
}

#[test]
fn nested_quantifiers_widen() {
    let q = query("(program (function_definition body: (block (call)+ @call))*)");
    assert_eq!(q.capture_quantifiers(0), [CaptureQuantifier::ZeroOrMore]);
}

#[test]
fn rooted_and_non_local_patterns() {
    let q = query(indoc! {r#"
        (call)
        ((call) (call))
        (call)?
        (call)*
        [(call) "def"]
        ((call))
    "#});

    let rooted: Vec<bool> = (0..6).map(|i| q.is_pattern_rooted(i)).collect();
    assert_eq!(rooted, [true, false, true, false, true, true]);
    assert!(q.is_pattern_non_local(1));
    assert!(!q.is_pattern_non_local(0));
}

#[test]
fn property_settings_and_assertions() {
    let q = query(indoc! {r#"
        ((identifier) @name
          (#set! @name priority "10")
          (#set! local)
          (#is? @name definition)
          (#is-not? local))
    "#});

    assert_eq!(
        q.property_settings(0),
        [
            QueryProperty {
                key: "priority".into(),
                value: Some("10".into()),
                capture_id: Some(0),
            },
            QueryProperty {
                key: "local".into(),
                value: None,
                capture_id: None,
            },
        ]
    );
    assert_eq!(
        q.property_predicates(0),
        [
            (
                QueryProperty {
                    key: "definition".into(),
                    value: None,
                    capture_id: Some(0),
                },
                true,
            ),
            (
                QueryProperty {
                    key: "local".into(),
                    value: None,
                    capture_id: None,
                },
                false,
            ),
        ]
    );
    assert!(q.general_predicates(0).is_empty());
}

#[test]
fn unknown_predicates_are_kept_for_the_host() {
    let q = query(r#"((identifier) @id (#is-upper? @id "strict"))"#);

    assert_eq!(
        q.general_predicates(0),
        [QueryPredicate {
            operator: "is-upper?".into(),
            args: vec![
                QueryPredicateArg::Capture(0),
                QueryPredicateArg::String("strict".into()),
            ]
            .into(),
        }]
    );
}

#[test]
fn empty_query_has_no_patterns() {
    let q = query("; nothing here\n");
    assert_eq!(q.pattern_count(), 0);
    assert!(q.capture_names().is_empty());
}

#[test]
fn disabling_patterns() {
    let mut q = query("(call) (block)");
    assert!(q.is_pattern_enabled(1));
    q.disable_pattern(1);
    q.disable_pattern(7);
    assert!(q.is_pattern_enabled(0));
    assert!(!q.is_pattern_enabled(1));
    assert!(!q.is_pattern_enabled(7));
}

#[test]
fn queries_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Query>();
}
