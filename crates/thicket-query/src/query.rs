use std::collections::HashSet;

use thicket_core::Language;

use crate::compile::{CaptureQuantifier, Compiler, Program, Step};
use crate::error::{QueryError, QueryErrorKind};
use crate::parser;
use crate::predicate::{self, Lowered, QueryPredicate, QueryProperty, TextPredicate};

#[derive(Debug, Clone, Default)]
pub(crate) struct PatternPredicates {
    pub text: Vec<TextPredicate>,
    pub general: Vec<QueryPredicate>,
    pub settings: Vec<QueryProperty>,
    pub assertions: Vec<(QueryProperty, bool)>,
}

/// A compiled set of patterns for one language.
///
/// Patterns are numbered in source order. Capture names are shared across
/// patterns: `@name` has the same index in every pattern that uses it.
#[derive(Debug, Clone)]
pub struct Query {
    language: Language,
    pub(crate) program: Program,
    pub(crate) predicates: Vec<PatternPredicates>,
    capture_names: Vec<String>,
    capture_quantifiers: Vec<Vec<CaptureQuantifier>>,
    pub(crate) disabled_patterns: HashSet<usize>,
}

impl Query {
    /// Compiles `source` against `language`.
    ///
    /// Fails on the first syntax error, then on the first unknown node
    /// type, field or capture, or malformed predicate, in source order.
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let parse = parser::parse(source);
        if let Some(error) = parse.errors().first() {
            return Err(QueryError::new(
                QueryErrorKind::Syntax,
                source,
                error.range.into(),
                error.message.clone(),
            ));
        }
        let Some(root) = parse.root() else {
            return Err(QueryError::new(
                QueryErrorKind::Syntax,
                source,
                0..source.len(),
                "expected a pattern",
            ));
        };

        let program = Compiler::compile(language, source, &root)?;

        let mut predicates = Vec::with_capacity(program.patterns.len());
        for (pattern, compiled) in root.patterns().zip(&program.patterns) {
            let capture_id = |name: &str| {
                if !compiled.quantifiers.contains_key(name) {
                    return None;
                }
                program.captures.get(name).map(|n| n.index() as u32)
            };
            let mut lowered = PatternPredicates::default();
            for call in pattern.predicates() {
                match predicate::lower(source, &call, &capture_id)? {
                    Lowered::Text(p) => lowered.text.push(p),
                    Lowered::Setting(p) => lowered.settings.push(p),
                    Lowered::Assertion(p, positive) => lowered.assertions.push((p, positive)),
                    Lowered::General(p) => lowered.general.push(p),
                }
            }
            predicates.push(lowered);
        }

        let capture_names: Vec<String> = program
            .captures
            .iter()
            .map(|(_, name)| name.to_owned())
            .collect();
        let capture_quantifiers = program
            .patterns
            .iter()
            .map(|pattern| {
                capture_names
                    .iter()
                    .map(|name| {
                        pattern
                            .quantifiers
                            .get(name)
                            .copied()
                            .unwrap_or(CaptureQuantifier::Zero)
                    })
                    .collect()
            })
            .collect();

        tracing::debug!(
            patterns = program.patterns.len(),
            steps = program.steps.len(),
            captures = capture_names.len(),
            "compiled query"
        );

        Ok(Self {
            language: language.clone(),
            program,
            predicates,
            capture_names,
            capture_quantifiers,
            disabled_patterns: HashSet::new(),
        })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn pattern_count(&self) -> usize {
        self.program.patterns.len()
    }

    /// Capture names, indexed by capture id.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    /// One entry per capture name; captures the pattern never uses are `Zero`.
    pub fn capture_quantifiers(&self, pattern_index: usize) -> &[CaptureQuantifier] {
        self.capture_quantifiers
            .get(pattern_index)
            .map_or(&[], Vec::as_slice)
    }

    pub fn start_byte_for_pattern(&self, pattern_index: usize) -> Option<usize> {
        self.program
            .patterns
            .get(pattern_index)
            .map(|p| usize::from(p.range.start()))
    }

    pub fn end_byte_for_pattern(&self, pattern_index: usize) -> Option<usize> {
        self.program
            .patterns
            .get(pattern_index)
            .map(|p| usize::from(p.range.end()))
    }

    /// Whether every match of the pattern starts on a single node.
    pub fn is_pattern_rooted(&self, pattern_index: usize) -> bool {
        self.program
            .patterns
            .get(pattern_index)
            .is_some_and(|p| p.rooted)
    }

    /// Whether the pattern can match a run of siblings rather than one node.
    pub fn is_pattern_non_local(&self, pattern_index: usize) -> bool {
        self.program
            .patterns
            .get(pattern_index)
            .is_some_and(|p| !p.rooted)
    }

    /// Stops reporting `@name`. Patterns still have to match the node.
    pub fn disable_capture(&mut self, name: &str) {
        let Some(id) = self.capture_index_for_name(name) else {
            return;
        };
        for step in &mut self.program.steps {
            if let Step::Match(m) = step {
                m.captures.retain(|&c| c != id);
            }
        }
    }

    pub fn disable_pattern(&mut self, pattern_index: usize) {
        if pattern_index < self.pattern_count() {
            self.disabled_patterns.insert(pattern_index);
        }
    }

    pub fn is_pattern_enabled(&self, pattern_index: usize) -> bool {
        pattern_index < self.pattern_count() && !self.disabled_patterns.contains(&pattern_index)
    }

    /// Predicates the query leaves to the host.
    pub fn general_predicates(&self, pattern_index: usize) -> &[QueryPredicate] {
        self.predicates
            .get(pattern_index)
            .map_or(&[], |p| p.general.as_slice())
    }

    /// Properties from `#set!`.
    pub fn property_settings(&self, pattern_index: usize) -> &[QueryProperty] {
        self.predicates
            .get(pattern_index)
            .map_or(&[], |p| p.settings.as_slice())
    }

    /// Assertions from `#is?` (`true`) and `#is-not?` (`false`).
    pub fn property_predicates(&self, pattern_index: usize) -> &[(QueryProperty, bool)] {
        self.predicates
            .get(pattern_index)
            .map_or(&[], |p| p.assertions.as_slice())
    }
}
