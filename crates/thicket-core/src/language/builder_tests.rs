use super::{LanguageBuilder, LexMode, LexState, LexTable, ParseAction};
use crate::{ERROR_STATE, Language, LanguageError, SYMBOL_END, SYMBOL_ERROR, START_STATE};

/// `s -> "a" | "a" "+" s` with a `comment` extra.
pub(super) fn tiny() -> Language {
    let mut b = LanguageBuilder::new("tiny");
    let a = b.token("a", true);
    let plus = b.token("+", false);
    let comment = b.token("comment", true);
    let s = b.nonterminal("s", true);
    let name = b.field("head");
    let prod = b.production(&[(name, 0)], &[]);

    let mode = LexMode::new(0, 0);
    b.set_lex_mode(ERROR_STATE, mode);
    let s1 = b.add_state(mode);
    let s2 = b.add_state(mode);
    let s3 = b.add_state(mode);
    let s4 = b.add_state(mode);
    let s5 = b.add_state(mode);

    b.shift(s1, a, s2);
    b.goto(s1, s, s3);
    b.reduce(s2, SYMBOL_END, s, 1, prod);
    b.shift(s2, plus, s4);
    b.accept(s3, SYMBOL_END);
    b.shift(s4, a, s2);
    b.goto(s4, s, s5);
    b.reduce(s5, SYMBOL_END, s, 3, prod);
    b.extra(comment);

    b.lex_table(LexTable::new(vec![
        LexState::new()
            .skip(&[(' ', ' ')], 0)
            .on(&[('a', 'a')], 1)
            .on(&[('+', '+')], 2)
            .on(&[('#', '#')], 3),
        LexState::new().accept(a),
        LexState::new().accept(plus),
        LexState::new().accept(comment),
    ]));
    b.build().expect("tiny tables are valid")
}

#[test]
fn symbol_lookup() {
    let lang = tiny();

    assert_eq!(lang.name(), "tiny");
    assert_eq!(lang.node_kind_count(), 5);
    assert_eq!(lang.token_count(), 4);
    assert_eq!(lang.id_for_node_kind("a", true), Some(1));
    assert_eq!(lang.id_for_node_kind("+", false), Some(2));
    assert_eq!(lang.id_for_node_kind("+", true), None);
    assert_eq!(lang.id_for_node_kind("end", true), None);
    assert_eq!(lang.id_for_node_kind("ERROR", true), Some(SYMBOL_ERROR));
    assert_eq!(lang.node_kind_for_id(4), Some("s"));
    assert_eq!(lang.node_kind_for_id(SYMBOL_ERROR), Some("ERROR"));
    assert!(lang.node_kind_is_named(1));
    assert!(!lang.node_kind_is_named(2));
    assert!(!lang.node_kind_is_visible(SYMBOL_END));
}

#[test]
fn field_lookup() {
    let lang = tiny();

    assert_eq!(lang.field_count(), 1);
    assert_eq!(lang.field_id_for_name("head"), Some(1));
    assert_eq!(lang.field_name_for_id(1), Some("head"));
    assert_eq!(lang.field_name_for_id(0), None);
    assert_eq!(lang.field_id_for_name("tail"), None);
}

#[test]
fn next_state_follows_shifts_and_gotos() {
    let lang = tiny();

    assert_eq!(lang.next_state(START_STATE, 1), 2);
    assert_eq!(lang.next_state(START_STATE, 4), 3);
    assert_eq!(lang.next_state(START_STATE, 2), 0);
    // extras keep the state
    assert_eq!(lang.next_state(2, 3), 2);
}

#[test]
fn error_state_recovers_on_every_token() {
    let lang = tiny();

    for token in [0, 1, 2] {
        assert_eq!(lang.actions(ERROR_STATE, token), &[ParseAction::Recover]);
        assert!(!lang.table_entry(ERROR_STATE, token).reusable);
    }
    assert!(matches!(
        lang.actions(ERROR_STATE, 3),
        [ParseAction::Shift { extra: true, .. }]
    ));
}

#[test]
fn reduce_detection() {
    let lang = tiny();

    assert!(lang.has_reduce_action(2, SYMBOL_END));
    assert!(!lang.has_reduce_action(2, 2));
    assert!(lang.has_actions(2, 2));
    assert!(lang.actions(2, SYMBOL_ERROR).is_empty());
}

#[test]
fn terminals_after_nonterminals_are_rejected() {
    let mut b = LanguageBuilder::new("bad");
    b.nonterminal("s", true);
    b.token("late", true);
    b.add_state(LexMode::default());
    b.lex_table(LexTable::new(vec![LexState::new()]));

    let err = b.build().unwrap_err();
    assert!(matches!(err, LanguageError::Malformed(_)));
    assert_eq!(
        err.to_string(),
        "malformed tables: terminal `late` declared after a nonterminal"
    );
}

#[test]
fn languages_compare_by_identity() {
    let a = tiny();
    let b = tiny();

    assert_eq!(a, a.clone());
    assert_ne!(a, b);
}
