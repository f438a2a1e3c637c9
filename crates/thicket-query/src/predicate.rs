//! Predicates and directives attached to patterns.
//!
//! Text predicates (`#eq?`, `#match?`, `#any-of?` and their variants) are
//! checked by the cursor before a match is reported. `#set!` and
//! `#is?`/`#is-not?` become pattern properties. Anything else is kept as a
//! general predicate for the host to interpret.

use std::fmt;

use regex_automata::Input;
use regex_automata::dfa::{Automaton, StartKind, dense};
use rowan::TextRange;

use crate::cursor::QueryCapture;
use crate::error::{QueryError, QueryErrorKind};
use crate::parser::ast::{self, PredicateArg};
use crate::text::TextProvider;

/// Argument of a general predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryPredicateArg {
    Capture(u32),
    String(Box<str>),
}

/// A predicate the query does not interpret itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPredicate {
    /// Name without the leading `#`, e.g. `is-upper?`.
    pub operator: Box<str>,
    pub args: Box<[QueryPredicateArg]>,
}

/// A key/value pair from `#set!`, `#is?` or `#is-not?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryProperty {
    pub key: Box<str>,
    pub value: Option<Box<str>>,
    pub capture_id: Option<u32>,
}

/// Compiled regex for `#match?` and friends.
#[derive(Clone)]
pub(crate) struct Regex {
    pattern: Box<str>,
    dfa: dense::DFA<Vec<u32>>,
}

impl Regex {
    fn new(pattern: &str) -> Result<Self, String> {
        let dfa = dense::DFA::builder()
            .configure(
                dense::DFA::config()
                    .start_kind(StartKind::Unanchored)
                    .minimize(false),
            )
            .build(pattern)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            pattern: pattern.into(),
            dfa,
        })
    }

    /// Unanchored search. A search the DFA gives up on counts as no match.
    pub(crate) fn is_match(&self, text: &[u8]) -> bool {
        let input = Input::new(text).earliest(true);
        matches!(self.dfa.try_search_fwd(&input), Ok(Some(_)))
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Regex").field(&self.pattern).finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TextPredicate {
    EqText {
        capture: u32,
        text: Box<[u8]>,
        positive: bool,
        match_all: bool,
    },
    EqCapture {
        left: u32,
        right: u32,
        positive: bool,
        match_all: bool,
    },
    Match {
        capture: u32,
        regex: Regex,
        positive: bool,
        match_all: bool,
    },
    AnyOf {
        capture: u32,
        values: Box<[Box<[u8]>]>,
        positive: bool,
    },
}

fn nodes_for<'a, 'tree>(
    captures: &'a [QueryCapture<'tree>],
    index: u32,
) -> impl Iterator<Item = &'a QueryCapture<'tree>> {
    captures.iter().filter(move |c| c.index == index)
}

/// Folds per-node outcomes: all must hold, or at least one. No nodes passes.
fn quantify(outcomes: impl Iterator<Item = Option<bool>>, match_all: bool) -> Option<bool> {
    let mut any = false;
    let mut seen = false;
    for outcome in outcomes {
        let outcome = outcome?;
        seen = true;
        if match_all && !outcome {
            return Some(false);
        }
        any |= outcome;
    }
    Some(!seen || match_all || any)
}

impl TextPredicate {
    /// `None` when some node's text is unavailable.
    pub(crate) fn evaluate<'tree>(
        &self,
        captures: &[QueryCapture<'tree>],
        text: &mut dyn TextProvider<'tree>,
    ) -> Option<bool> {
        match self {
            TextPredicate::EqText {
                capture,
                text: expected,
                positive,
                match_all,
            } => {
                let outcomes = nodes_for(captures, *capture)
                    .map(|c| text.node_text(c.node).map(|t| (*t == **expected) == *positive))
                    .collect::<Vec<_>>();
                quantify(outcomes.into_iter(), *match_all)
            }
            TextPredicate::EqCapture {
                left,
                right,
                positive,
                match_all,
            } => {
                let lefts: Vec<_> = nodes_for(captures, *left).collect();
                let rights: Vec<_> = nodes_for(captures, *right).collect();
                let mut outcomes = Vec::with_capacity(lefts.len().min(rights.len()));
                for (l, r) in lefts.iter().zip(&rights) {
                    let l = text.node_text(l.node)?;
                    let r = text.node_text(r.node)?;
                    outcomes.push(Some((l == r) == *positive));
                }
                quantify(outcomes.into_iter(), *match_all)
            }
            TextPredicate::Match {
                capture,
                regex,
                positive,
                match_all,
            } => {
                let outcomes = nodes_for(captures, *capture)
                    .map(|c| text.node_text(c.node).map(|t| regex.is_match(&t) == *positive))
                    .collect::<Vec<_>>();
                quantify(outcomes.into_iter(), *match_all)
            }
            TextPredicate::AnyOf {
                capture,
                values,
                positive,
            } => {
                let outcomes = nodes_for(captures, *capture)
                    .map(|c| {
                        text.node_text(c.node)
                            .map(|t| values.iter().any(|v| **v == *t) == *positive)
                    })
                    .collect::<Vec<_>>();
                quantify(outcomes.into_iter(), true)
            }
        }
    }
}

/// What a predicate call lowers to.
#[derive(Debug, Clone)]
pub(crate) enum Lowered {
    Text(TextPredicate),
    Setting(QueryProperty),
    Assertion(QueryProperty, bool),
    General(QueryPredicate),
}

/// Lowers one `(#name ...)` call, resolving capture names through `capture_id`.
pub(crate) fn lower(
    source: &str,
    predicate: &ast::Predicate,
    capture_id: &dyn Fn(&str) -> Option<u32>,
) -> Result<Lowered, QueryError> {
    let range = predicate.text_range();
    let err = |kind: QueryErrorKind, range: TextRange, message: String| {
        QueryError::new(kind, source, range.into(), message)
    };

    let Some(name_token) = predicate.name() else {
        return Err(err(QueryErrorKind::Syntax, range, "expected a predicate name".into()));
    };
    let operator = name_token.text().trim_start_matches('#');

    let mut args = Vec::new();
    for arg in predicate.args() {
        let lowered = match &arg {
            PredicateArg::Capture(capture) => {
                let Some(name) = capture.name() else {
                    return Err(err(
                        QueryErrorKind::Syntax,
                        arg.text_range(),
                        "expected a capture name after `@`".into(),
                    ));
                };
                let id = capture_id(name.text()).ok_or_else(|| {
                    err(
                        QueryErrorKind::Capture,
                        arg.text_range(),
                        format!("unknown capture `@{}`", name.text()),
                    )
                })?;
                Arg::Capture(id)
            }
            PredicateArg::Str(s) => Arg::Text(s.value()),
            PredicateArg::Ident(token) => Arg::Text(token.text().to_owned()),
        };
        args.push((lowered, arg.text_range()));
    }

    let arity = |expected: &str| {
        err(
            QueryErrorKind::Predicate,
            range,
            format!("`#{operator}` expects {expected}, got {} argument(s)", args.len()),
        )
    };

    match operator {
        "eq?" | "not-eq?" | "any-eq?" | "any-not-eq?" => {
            let [(first, first_range), (second, _)] = args.as_slice() else {
                return Err(arity("a capture and a capture or string"));
            };
            let capture = first.capture(&err, *first_range, operator)?;
            let positive = !operator.contains("not-");
            let match_all = !operator.starts_with("any-");
            Ok(Lowered::Text(match second {
                Arg::Capture(right) => TextPredicate::EqCapture {
                    left: capture,
                    right: *right,
                    positive,
                    match_all,
                },
                Arg::Text(s) => TextPredicate::EqText {
                    capture,
                    text: s.as_bytes().into(),
                    positive,
                    match_all,
                },
            }))
        }
        "match?" | "not-match?" | "any-match?" | "any-not-match?" => {
            let [(first, first_range), (second, second_range)] = args.as_slice() else {
                return Err(arity("a capture and a regex string"));
            };
            let capture = first.capture(&err, *first_range, operator)?;
            let Arg::Text(pattern) = second else {
                return Err(err(
                    QueryErrorKind::Predicate,
                    *second_range,
                    format!("second argument of `#{operator}` must be a string"),
                ));
            };
            let regex = compile_regex(source, pattern, *second_range)?;
            Ok(Lowered::Text(TextPredicate::Match {
                capture,
                regex,
                positive: !operator.contains("not-"),
                match_all: !operator.starts_with("any-"),
            }))
        }
        "any-of?" | "not-any-of?" => {
            let Some(((first, first_range), rest)) = args.split_first().filter(|(_, rest)| !rest.is_empty())
            else {
                return Err(arity("a capture and at least one string"));
            };
            let capture = first.capture(&err, *first_range, operator)?;
            let mut values = Vec::with_capacity(rest.len());
            for (arg, arg_range) in rest {
                let Arg::Text(s) = arg else {
                    return Err(err(
                        QueryErrorKind::Predicate,
                        *arg_range,
                        format!("arguments after the first of `#{operator}` must be strings"),
                    ));
                };
                values.push(s.as_bytes().into());
            }
            Ok(Lowered::Text(TextPredicate::AnyOf {
                capture,
                values: values.into_boxed_slice(),
                positive: operator == "any-of?",
            }))
        }
        "set!" | "is?" | "is-not?" => {
            let property = property(&args).ok_or_else(|| {
                arity("an optional capture, a key and an optional value")
            })?;
            Ok(match operator {
                "set!" => Lowered::Setting(property),
                _ => Lowered::Assertion(property, operator == "is?"),
            })
        }
        _ => Ok(Lowered::General(QueryPredicate {
            operator: operator.into(),
            args: args
                .into_iter()
                .map(|(arg, _)| match arg {
                    Arg::Capture(id) => QueryPredicateArg::Capture(id),
                    Arg::Text(s) => QueryPredicateArg::String(s.into_boxed_str()),
                })
                .collect(),
        })),
    }
}

#[derive(Debug, Clone)]
enum Arg {
    Capture(u32),
    Text(String),
}

impl Arg {
    fn capture(
        &self,
        err: &dyn Fn(QueryErrorKind, TextRange, String) -> QueryError,
        range: TextRange,
        operator: &str,
    ) -> Result<u32, QueryError> {
        match self {
            Arg::Capture(id) => Ok(*id),
            Arg::Text(_) => Err(err(
                QueryErrorKind::Predicate,
                range,
                format!("first argument of `#{operator}` must be a capture"),
            )),
        }
    }
}

/// `[@capture] key [value]`
fn property(args: &[(Arg, TextRange)]) -> Option<QueryProperty> {
    let (capture_id, rest) = match args.split_first() {
        Some(((Arg::Capture(id), _), rest)) => (Some(*id), rest),
        _ => (None, args),
    };
    let text = |arg: &Arg| match arg {
        Arg::Text(s) => Some(s.as_str().into()),
        Arg::Capture(_) => None,
    };
    match rest {
        [(key, _)] => Some(QueryProperty {
            key: text(key)?,
            value: None,
            capture_id,
        }),
        [(key, _), (value, _)] => Some(QueryProperty {
            key: text(key)?,
            value: Some(text(value)?),
            capture_id,
        }),
        _ => None,
    }
}

/// Validates the regex syntax first so errors point into the pattern string.
fn compile_regex(source: &str, pattern: &str, range: TextRange) -> Result<Regex, QueryError> {
    let string_start = usize::from(range.start()) + 1;
    if let Err(e) = regex_syntax::ast::parse::Parser::new().parse(pattern) {
        let span = e.span();
        let start = (string_start + span.start.offset).min(usize::from(range.end()));
        let end = (string_start + span.end.offset).min(usize::from(range.end()));
        return Err(QueryError::new(
            QueryErrorKind::Predicate,
            source,
            start..end,
            format!("invalid regex: {}", e.kind()),
        ));
    }
    Regex::new(pattern).map_err(|message| {
        QueryError::new(
            QueryErrorKind::Predicate,
            source,
            range.into(),
            format!("invalid regex: {message}"),
        )
    })
}
