use super::builder_tests::tiny;
use crate::START_STATE;

#[test]
fn lists_valid_symbols() {
    let lang = tiny();
    let iter = lang.lookahead_iterator(START_STATE).unwrap();

    // "a", the comment extra, then the goto on `s`
    let symbols: Vec<_> = iter.collect();
    assert_eq!(symbols, vec![1, 3, 4]);
}

#[test]
fn names_include_end() {
    let lang = tiny();
    let iter = lang.lookahead_iterator(2).unwrap();

    let names: Vec<_> = iter.iter_names().collect();
    assert_eq!(names, vec!["end", "+", "comment"]);
}

#[test]
fn reset_state_moves_and_rejects_unknown_states() {
    let lang = tiny();
    let mut iter = lang.lookahead_iterator(START_STATE).unwrap();

    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.current_symbol_name(), Some("a"));
    assert!(iter.reset_state(3));
    assert_eq!(iter.state(), 3);
    assert_eq!(iter.next(), Some(0));
    assert!(!iter.reset_state(99));
    assert_eq!(iter.state(), 3);
}

#[test]
fn out_of_range_state_has_no_iterator() {
    assert!(tiny().lookahead_iterator(42).is_none());
}
