use super::cst::SyntaxKind;
use super::lexer::{lex, token_text, unescape};

fn kinds(source: &str) -> Vec<(SyntaxKind, &str)> {
    lex(source)
        .iter()
        .filter(|t| !t.kind.is_trivia())
        .map(|t| (t.kind, token_text(source, t)))
        .collect()
}

#[test]
fn node_pattern_with_field_and_capture() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("(call function: (identifier) @fn)"),
        [
            (ParenOpen, "("),
            (Id, "call"),
            (Id, "function"),
            (Colon, ":"),
            (ParenOpen, "("),
            (Id, "identifier"),
            (ParenClose, ")"),
            (At, "@"),
            (Id, "fn"),
            (ParenClose, ")"),
        ]
    );
}

#[test]
fn string_literal_splits_into_quotes_and_value() {
    use SyntaxKind::*;
    assert_eq!(
        kinds(r#""def" """#),
        [
            (DoubleQuote, "\""),
            (StrVal, "def"),
            (DoubleQuote, "\""),
            (DoubleQuote, "\""),
            (DoubleQuote, "\""),
        ]
    );
}

#[test]
fn escaped_quote_stays_inside_the_literal() {
    use SyntaxKind::*;
    assert_eq!(
        kinds(r#""a\"b""#),
        [(DoubleQuote, "\""), (StrVal, r#"a\"b"#), (DoubleQuote, "\"")]
    );
}

#[test]
fn keywords_and_predicates() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("(ERROR) (MISSING) (#not-eq? @a @b) (#set! key)"),
        [
            (ParenOpen, "("),
            (KwError, "ERROR"),
            (ParenClose, ")"),
            (ParenOpen, "("),
            (KwMissing, "MISSING"),
            (ParenClose, ")"),
            (ParenOpen, "("),
            (PredicateName, "#not-eq?"),
            (At, "@"),
            (Id, "a"),
            (At, "@"),
            (Id, "b"),
            (ParenClose, ")"),
            (ParenOpen, "("),
            (PredicateName, "#set!"),
            (Id, "key"),
            (ParenClose, ")"),
        ]
    );
}

#[test]
fn wildcards_and_operators() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("_ (_) !body . * + ?"),
        [
            (Underscore, "_"),
            (ParenOpen, "("),
            (Underscore, "_"),
            (ParenClose, ")"),
            (Negation, "!"),
            (Id, "body"),
            (Dot, "."),
            (Star, "*"),
            (Plus, "+"),
            (Question, "?"),
        ]
    );
}

#[test]
fn underscore_prefixed_identifier_is_one_token() {
    assert_eq!(kinds("_hidden"), [(SyntaxKind::Id, "_hidden")]);
}

#[test]
fn comments_are_trivia() {
    let tokens = lex("; note\n(a)");
    assert_eq!(tokens[0].kind, SyntaxKind::LineComment);
    assert_eq!(tokens[1].kind, SyntaxKind::Newline);
    assert_eq!(kinds("; note\n(a)").len(), 3);
}

#[test]
fn unknown_characters_coalesce_into_garbage() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("(a) $%^ (b)"),
        [
            (ParenOpen, "("),
            (Id, "a"),
            (ParenClose, ")"),
            (Garbage, "$%^"),
            (ParenOpen, "("),
            (Id, "b"),
            (ParenClose, ")"),
        ]
    );
}

#[test]
fn unescape_resolves_known_escapes() {
    assert_eq!(unescape(r"a\nb\tc"), "a\nb\tc");
    assert_eq!(unescape(r#"\"quoted\""#), "\"quoted\"");
    assert_eq!(unescape(r"\\d+"), r"\d+");
    assert_eq!(unescape(r"\."), ".");
}
