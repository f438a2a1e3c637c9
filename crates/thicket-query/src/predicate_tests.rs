use thicket_core::{InputEdit, Point};
use thicket_parser::Parser;
use thicket_tree::Tree;

use crate::{
    NoText, Query, QueryCapture, QueryCursor, QueryPredicate, QueryPredicateArg, TextProvider,
    TreeText,
};

fn parse_toy(text: &str) -> Tree {
    let mut parser = Parser::new(thicket_langs::toy());
    parser.parse(text, None).unwrap().tree().unwrap()
}

/// Text of every capture, one string per match.
fn run<'tree>(
    cursor: &mut QueryCursor,
    source: &str,
    tree: &'tree Tree,
    text: impl TextProvider<'tree>,
) -> Vec<String> {
    let query = Query::new(&thicket_langs::toy(), source).unwrap();
    cursor
        .matches(&query, tree.root_node(), text)
        .map(|m| {
            m.captures
                .iter()
                .map(|c| c.node.utf8_text().unwrap_or("?"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn texts(source: &str, text: &str) -> Vec<String> {
    let tree = parse_toy(text);
    run(&mut QueryCursor::new(), source, &tree, TreeText)
}

const PROGRAM: &str = "def main() { other(); }";

#[test]
fn eq_against_a_string() {
    assert_eq!(
        texts(r#"((identifier) @id (#eq? @id "main"))"#, PROGRAM),
        ["main"]
    );
    assert_eq!(
        texts(r#"((identifier) @id (#not-eq? @id "main"))"#, PROGRAM),
        ["other"]
    );
}

#[test]
fn match_against_a_regex() {
    assert_eq!(
        texts(r#"((identifier) @id (#match? @id "^o"))"#, PROGRAM),
        ["other"]
    );
    assert_eq!(
        texts(r#"((identifier) @id (#not-match? @id "^o"))"#, PROGRAM),
        ["main"]
    );
    assert_eq!(
        texts(r#"((identifier) @id (#match? @id "\\d$"))"#, "def f1() { g(); }"),
        ["f1"]
    );
}

#[test]
fn eq_between_captures() {
    let source = "(call function: (identifier) @f arguments: (identifier) @a (#eq? @f @a))";
    assert_eq!(texts(source, "def m() { x(x); x(y); }"), ["x x"]);
}

#[test]
fn any_of_a_set() {
    let text = "def main() { print(x); exit(); }";
    assert_eq!(
        texts(
            r#"((identifier) @id (#any-of? @id "print" "exit" "missing"))"#,
            text
        ),
        ["print", "exit"]
    );
    assert_eq!(
        texts(r#"((identifier) @id (#not-any-of? @id "print" "exit"))"#, text),
        ["main", "x"]
    );
}

#[test]
fn quantified_captures_need_every_node_or_any_node() {
    let all = r#"(block (call function: (identifier) @f)+ (#eq? @f "a"))"#;
    let any = r#"(block (call function: (identifier) @f)+ (#any-eq? @f "b"))"#;

    assert!(texts(all, "def m() { b(); a(); }").is_empty());
    assert_eq!(texts(all, "def m() { a(); a(); }"), ["a a"]);
    assert_eq!(texts(any, "def m() { a(); b(); }"), ["a b"]);
    assert!(texts(any, "def m() { a(); c(); }").is_empty());
}

#[test]
fn missing_text_drops_the_match() {
    let tree = parse_toy(PROGRAM);
    let mut cursor = QueryCursor::new();

    let checked = r#"((identifier) @id (#eq? @id "main"))"#;
    assert!(run(&mut cursor, checked, &tree, NoText).is_empty());
    assert_eq!(run(&mut cursor, checked, &tree, PROGRAM), ["main"]);
    assert_eq!(
        run(&mut cursor, "(identifier) @id", &tree, NoText),
        ["main", "other"]
    );
}

#[test]
fn edited_trees_need_the_new_text() {
    let mut tree = parse_toy(PROGRAM);
    let end = PROGRAM.len() as u32;
    tree.edit(&InputEdit {
        start_byte: end,
        old_end_byte: end,
        new_end_byte: end + 1,
        start_position: Point::new(0, end),
        old_end_position: Point::new(0, end),
        new_end_position: Point::new(0, end + 1),
    });
    let source = r#"((identifier) @id (#eq? @id "main"))"#;
    let mut cursor = QueryCursor::new();

    assert!(run(&mut cursor, source, &tree, TreeText).is_empty());

    let new_text = format!("{PROGRAM}\n");
    let found = {
        let query = Query::new(&thicket_langs::toy(), source).unwrap();
        cursor
            .matches(&query, tree.root_node(), new_text.as_str())
            .count()
    };
    assert_eq!(found, 1);
}

#[test]
fn unknown_predicates_go_to_the_host() {
    let source = r#"((identifier) @id (#is-upper? @id))"#;
    let text = "def Main() { exit(); }";
    let tree = parse_toy(text);

    let mut cursor = QueryCursor::new();
    assert_eq!(run(&mut cursor, source, &tree, TreeText), ["Main", "exit"]);

    cursor.set_custom_predicate(Some(Box::new(
        |predicate: &QueryPredicate, pattern: usize, captures: &[QueryCapture<'_>]| {
            assert_eq!(&*predicate.operator, "is-upper?");
            assert_eq!(pattern, 0);
            let [QueryPredicateArg::Capture(id)] = &*predicate.args else {
                return false;
            };
            captures
                .iter()
                .filter(|c| c.index == *id)
                .filter_map(|c| c.node.utf8_text())
                .all(|t| t.starts_with(char::is_uppercase))
        },
    )));
    assert_eq!(run(&mut cursor, source, &tree, TreeText), ["Main"]);
}
