use std::fmt::Write;

use indoc::indoc;

use super::ast::{Expr, NodeType, PredicateArg, QuantifierKind};
use super::{SyntaxNode, parse};

fn dump(node: &SyntaxNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    writeln!(out, "{indent}{:?}", node.kind()).unwrap();
    for element in node.children_with_tokens() {
        match element {
            rowan::NodeOrToken::Node(child) => dump(&child, depth + 1, out),
            rowan::NodeOrToken::Token(token) if !token.kind().is_trivia() => {
                writeln!(out, "{indent}  {:?} {:?}", token.kind(), token.text()).unwrap();
            }
            rowan::NodeOrToken::Token(_) => {}
        }
    }
}

fn expect_valid_cst(source: &str) -> String {
    let parse = parse(source);
    assert!(parse.errors().is_empty(), "{:?}", parse.errors());
    let mut out = String::new();
    dump(&parse.syntax(), 0, &mut out);
    out
}

fn first_error(source: &str) -> String {
    let parse = parse(source);
    parse
        .errors()
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_default()
}

fn body(source: &str) -> Expr {
    parse(source)
        .root()
        .and_then(|root| root.patterns().next())
        .and_then(|pattern| pattern.body())
        .unwrap()
}

#[test]
fn field_capture_wraps_the_field() {
    let res = expect_valid_cst("(call function: (identifier) @fn)");

    insta::assert_snapshot!(res, @r#"
    Root
      Pattern
        Tree
          ParenOpen "("
          Id "call"
          Capture
            Field
              Id "function"
              Colon ":"
              Tree
                ParenOpen "("
                Id "identifier"
                ParenClose ")"
            At "@"
            Id "fn"
          ParenClose ")"
    "#);
}

#[test]
fn quantified_alternation_with_capture() {
    let res = expect_valid_cst(r#"["def" (identifier)]* @item"#);

    insta::assert_snapshot!(res, @r#"
    Root
      Pattern
        Capture
          Quantifier
            Alt
              BracketOpen "["
              Str
                DoubleQuote "\""
                StrVal "def"
                DoubleQuote "\""
              Tree
                ParenOpen "("
                Id "identifier"
                ParenClose ")"
              BracketClose "]"
            Star "*"
          At "@"
          Id "item"
    "#);
}

#[test]
fn predicate_inside_a_group() {
    let res = expect_valid_cst(r#"((identifier) @id (#eq? @id "main"))"#);

    insta::assert_snapshot!(res, @r##"
    Root
      Pattern
        Group
          ParenOpen "("
          Capture
            Tree
              ParenOpen "("
              Id "identifier"
              ParenClose ")"
            At "@"
            Id "id"
          Predicate
            ParenOpen "("
            PredicateName "#eq?"
            CaptureRef
              At "@"
              Id "id"
            Str
              DoubleQuote "\""
              StrVal "main"
              DoubleQuote "\""
            ParenClose ")"
          ParenClose ")"
    "##);
}

#[test]
fn patterns_are_split_at_top_level() {
    let source = indoc! {r#"
        ; definitions
        (function_definition)
        (call) @call
        "def"
    "#};
    let parse = parse(source);
    assert!(parse.errors().is_empty());
    assert_eq!(parse.root().unwrap().patterns().count(), 3);
}

#[test]
fn node_types() {
    let Expr::Tree(tree) = body("(identifier)") else {
        panic!("expected a tree");
    };
    assert!(matches!(tree.node_type(), Some(NodeType::Named(t)) if t.text() == "identifier"));

    let Expr::Tree(tree) = body("(_)") else {
        panic!("expected a tree");
    };
    assert_eq!(tree.node_type(), Some(NodeType::Wildcard));

    let Expr::Tree(tree) = body("(ERROR)") else {
        panic!("expected a tree");
    };
    assert_eq!(tree.node_type(), Some(NodeType::Error));

    let Expr::Tree(tree) = body(r#"(MISSING ";")"#) else {
        panic!("expected a tree");
    };
    let Some(NodeType::Missing(Some((name, named, _)))) = tree.node_type() else {
        panic!("expected a missing kind");
    };
    assert_eq!((name.as_str(), named), (";", false));

    let Expr::Tree(tree) = body("(MISSING)") else {
        panic!("expected a tree");
    };
    assert_eq!(tree.node_type(), Some(NodeType::Missing(None)));
}

#[test]
fn bare_wildcard_is_its_own_expression() {
    assert!(matches!(body("_"), Expr::Wildcard(_)));
}

#[test]
fn quantifier_kinds() {
    for (source, kind) in [
        ("(a)?", QuantifierKind::Optional),
        ("(a)*", QuantifierKind::ZeroOrMore),
        ("(a)+", QuantifierKind::OneOrMore),
    ] {
        let Expr::Quantifier(q) = body(source) else {
            panic!("expected a quantifier for {source}");
        };
        assert_eq!(q.kind(), Some(kind));
        assert!(matches!(q.inner(), Some(Expr::Tree(_))));
    }
}

#[test]
fn string_values_are_unescaped() {
    let Expr::Str(s) = body(r#""a\nb\"""#) else {
        panic!("expected a string");
    };
    assert_eq!(s.value(), "a\nb\"");
}

#[test]
fn negated_fields_and_anchors_are_children() {
    let Expr::Tree(tree) = body("(call !arguments . (identifier))") else {
        panic!("expected a tree");
    };
    let children: Vec<Expr> = tree.children().collect();
    assert_eq!(children.len(), 3);
    let Expr::NegatedField(negated) = &children[0] else {
        panic!("expected a negated field");
    };
    assert_eq!(negated.name().unwrap().text(), "arguments");
    assert!(matches!(children[1], Expr::Anchor(_)));
    assert!(matches!(children[2], Expr::Tree(_)));
}

#[test]
fn predicate_arguments() {
    let source = r#"((identifier) @a (#set! @a injection.language "rust"))"#;
    let pattern = parse(source).root().unwrap().patterns().next().unwrap();
    let predicate = pattern.predicates().next().unwrap();

    assert_eq!(predicate.name().unwrap().text(), "#set!");
    let args = predicate.args();
    assert_eq!(args.len(), 3);
    assert!(matches!(&args[0], PredicateArg::Capture(c) if c.name().unwrap().text() == "a"));
    assert!(matches!(&args[1], PredicateArg::Ident(t) if t.text() == "injection.language"));
    assert!(matches!(&args[2], PredicateArg::Str(s) if s.value() == "rust"));
}

#[test]
fn multiple_captures_nest() {
    let Expr::Capture(outer) = body("(identifier) @a @b") else {
        panic!("expected a capture");
    };
    assert_eq!(outer.name().unwrap().text(), "b");
    let Some(Expr::Capture(inner)) = outer.inner() else {
        panic!("expected a nested capture");
    };
    assert_eq!(inner.name().unwrap().text(), "a");
}

#[test]
fn syntax_errors() {
    assert_eq!(first_error("()"), "empty pattern; expected a node type");
    assert_eq!(first_error("[]"), "empty alternation");
    assert_eq!(first_error("(call"), "expected `)`");
    assert_eq!(first_error("(call @x)"), "capture has no pattern before it");
    assert_eq!(
        first_error("(call identifier)"),
        "bare identifier; node types are written `(identifier)`"
    );
    assert_eq!(
        first_error("identifier"),
        "bare identifier; node types are written `(identifier)`"
    );
    assert_eq!(
        first_error(") (a)"),
        "unexpected token; patterns start with `(`, `[`, `_` or a string"
    );
    assert_eq!(
        first_error(". (a)"),
        "anchors and negated fields are only valid inside a node"
    );
    assert_eq!(first_error("(a) @"), "expected a capture name after `@`");
    assert_eq!(first_error("(call !)"), "expected a field name after `!`");
}

#[test]
fn errors_keep_a_full_tree() {
    let source = "(call $ (identifier))";
    let parse = parse(source);
    assert_eq!(parse.errors().len(), 1);
    assert_eq!(parse.syntax().text().to_string(), source);
}

#[test]
fn deep_nesting_is_reported() {
    let source = format!("{}{}", "(a ".repeat(300), ")".repeat(300));
    assert_eq!(first_error(&source), "pattern is nested too deeply");
}
