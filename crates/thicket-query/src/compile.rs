//! Thompson-like NFA construction for patterns.
//!
//! Every pattern compiles to a run of steps ending in `Done`. A `Match` step
//! tests one node at a depth relative to the node the pattern started on;
//! `Split` and `Jump` encode alternation and repetition. Epsilon closures are
//! precomputed so the executor only ever waits on `Match` or `Done` steps.

use std::collections::HashMap;
use std::ops::Range;

use rowan::TextRange;
use thicket_core::{FieldId, Interner, Language, SYMBOL_ERROR, Symbol};

use crate::error::{QueryError, QueryErrorKind};
use crate::parser::ast::{self, Expr, NodeType, QuantifierKind};

pub(crate) type StepId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeTest {
    Kind(Symbol),
    /// `(_)`
    NamedWildcard,
    /// `_`
    AnyWildcard,
    Missing(Option<Symbol>),
}

#[derive(Debug, Clone)]
pub(crate) struct MatchStep {
    pub test: NodeTest,
    /// Depth below the node the pattern started on.
    pub depth: u32,
    pub field: Option<FieldId>,
    pub negated_fields: Vec<FieldId>,
    pub captures: Vec<u32>,
    /// Must directly follow the previously matched sibling, or be the first
    /// named child when nothing at this depth matched yet.
    pub immediate: bool,
    /// Must be the last named child.
    pub last_child: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Match(MatchStep),
    Split(Vec<StepId>),
    Jump(StepId),
    Done,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    /// `Match` steps a fresh state may start on.
    pub first: Vec<StepId>,
    pub range: TextRange,
    pub rooted: bool,
    /// Quantifier per capture name this pattern mentions.
    pub quantifiers: HashMap<String, CaptureQuantifier>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Program {
    pub steps: Vec<Step>,
    /// For `Match` steps, the closure of the step after it.
    pub successors: Vec<Vec<StepId>>,
    pub patterns: Vec<CompiledPattern>,
    pub captures: Interner,
    /// Patterns whose first step tests a concrete symbol.
    pub by_symbol: HashMap<Symbol, Vec<(u32, StepId)>>,
    /// Patterns whose first step is a wildcard or `MISSING` test.
    pub unkeyed: Vec<(u32, StepId)>,
}

impl Program {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(id as usize)
    }

    pub fn match_step(&self, id: StepId) -> Option<&MatchStep> {
        match self.step(id) {
            Some(Step::Match(step)) => Some(step),
            _ => None,
        }
    }

    pub fn successors(&self, id: StepId) -> &[StepId] {
        self.successors.get(id as usize).map_or(&[], Vec::as_slice)
    }

    pub fn is_done(&self, id: StepId) -> bool {
        matches!(self.step(id), Some(Step::Done))
    }

    /// Every `Match` and `Done` step reachable from `from` without consuming a node.
    fn closure(&self, from: StepId) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.steps.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(visited) = seen.get_mut(id as usize) else {
                continue;
            };
            if std::mem::replace(visited, true) {
                continue;
            }
            match &self.steps[id as usize] {
                Step::Match(_) | Step::Done => out.push(id),
                Step::Jump(target) => stack.push(*target),
                Step::Split(targets) => stack.extend(targets.iter().rev()),
            }
        }
        out
    }
}

/// How many nodes a capture can bind in one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureQuantifier {
    Zero,
    ZeroOrOne,
    ZeroOrMore,
    One,
    OneOrMore,
}

/// `(min, max)` with `min` saturating at 1 and `max` at 2 (many).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds(u8, u8);

impl Bounds {
    fn add(self, other: Bounds) -> Bounds {
        Bounds((self.0 + other.0).min(1), (self.1 + other.1).min(2))
    }

    fn join(self, other: Bounds) -> Bounds {
        Bounds(self.0.min(other.0), self.1.max(other.1))
    }

    fn repeat(self, kind: QuantifierKind) -> Bounds {
        let many = if self.1 > 0 { 2 } else { 0 };
        match kind {
            QuantifierKind::Optional => Bounds(0, self.1),
            QuantifierKind::ZeroOrMore => Bounds(0, many),
            QuantifierKind::OneOrMore => Bounds(self.0, many),
        }
    }
}

impl From<Bounds> for CaptureQuantifier {
    fn from(bounds: Bounds) -> Self {
        match bounds {
            Bounds(_, 0) => CaptureQuantifier::Zero,
            Bounds(0, 1) => CaptureQuantifier::ZeroOrOne,
            Bounds(0, _) => CaptureQuantifier::ZeroOrMore,
            Bounds(_, 1) => CaptureQuantifier::One,
            Bounds(_, _) => CaptureQuantifier::OneOrMore,
        }
    }
}

type Counts = HashMap<String, Bounds>;

fn sequence_counts(items: impl Iterator<Item = Expr>) -> Counts {
    let mut total = Counts::new();
    for item in items {
        for (name, bounds) in capture_counts(&item) {
            let entry = total.entry(name).or_insert(Bounds(0, 0));
            *entry = entry.add(bounds);
        }
    }
    total
}

fn capture_counts(expr: &Expr) -> Counts {
    match expr {
        Expr::Tree(tree) => sequence_counts(tree.children()),
        Expr::Group(group) => sequence_counts(group.children()),
        Expr::Alt(alt) => {
            let branches: Vec<Counts> = alt.branches().map(|b| capture_counts(&b)).collect();
            let mut joined = Counts::new();
            for branch in &branches {
                for name in branch.keys() {
                    let bounds = branches
                        .iter()
                        .map(|b| b.get(name).copied().unwrap_or(Bounds(0, 0)))
                        .reduce(Bounds::join)
                        .unwrap_or(Bounds(0, 0));
                    joined.insert(name.clone(), bounds);
                }
            }
            joined
        }
        Expr::Capture(capture) => {
            let inner = capture.inner();
            let mut counts = inner.as_ref().map(capture_counts).unwrap_or_default();
            // `(x)* @c` binds one node per repetition.
            let own = match inner.as_ref().and_then(repetition) {
                Some(kind) => Bounds(1, 1).repeat(kind),
                None => Bounds(1, 1),
            };
            if let Some(name) = capture.name() {
                let entry = counts.entry(name.text().to_owned()).or_insert(Bounds(0, 0));
                *entry = entry.add(own);
            }
            counts
        }
        Expr::Quantifier(quantifier) => {
            let (Some(inner), Some(kind)) = (quantifier.inner(), quantifier.kind()) else {
                return Counts::new();
            };
            capture_counts(&inner)
                .into_iter()
                .map(|(name, bounds)| (name, bounds.repeat(kind)))
                .collect()
        }
        Expr::Field(field) => field.value().map(|v| capture_counts(&v)).unwrap_or_default(),
        Expr::Str(_)
        | Expr::Wildcard(_)
        | Expr::NegatedField(_)
        | Expr::Anchor(_)
        | Expr::Predicate(_) => Counts::new(),
    }
}

/// The quantifier a capture applies through, looking past stacked captures.
fn repetition(expr: &Expr) -> Option<QuantifierKind> {
    match expr {
        Expr::Quantifier(quantifier) => quantifier.kind(),
        Expr::Capture(capture) => capture.inner().as_ref().and_then(repetition),
        _ => None,
    }
}

/// A pattern is rooted when every match starts on a single node.
fn is_rooted(expr: &Expr) -> bool {
    match expr {
        Expr::Tree(_) | Expr::Str(_) | Expr::Wildcard(_) => true,
        Expr::Capture(capture) => capture.inner().is_some_and(|e| is_rooted(&e)),
        Expr::Field(field) => field.value().is_some_and(|e| is_rooted(&e)),
        Expr::Alt(alt) => alt.branches().all(|b| is_rooted(&b)),
        Expr::Quantifier(quantifier) => {
            quantifier.kind() == Some(QuantifierKind::Optional)
                && quantifier.inner().is_some_and(|e| is_rooted(&e))
        }
        Expr::Group(group) => {
            let mut matching = group.children().filter(|c| {
                !matches!(c, Expr::Predicate(_) | Expr::Anchor(_) | Expr::NegatedField(_))
            });
            match (matching.next(), matching.next()) {
                (Some(only), None) => is_rooted(&only),
                _ => false,
            }
        }
        Expr::NegatedField(_) | Expr::Anchor(_) | Expr::Predicate(_) => false,
    }
}

pub(crate) struct Compiler<'a> {
    source: &'a str,
    language: &'a Language,
    program: Program,
}

impl<'a> Compiler<'a> {
    pub fn compile(
        language: &'a Language,
        source: &'a str,
        root: &ast::Root,
    ) -> Result<Program, QueryError> {
        let mut compiler = Self {
            source,
            language,
            program: Program::default(),
        };
        for pattern in root.patterns() {
            compiler.compile_pattern(&pattern)?;
        }
        compiler.link();
        Ok(compiler.program)
    }

    fn error(&self, kind: QueryErrorKind, range: TextRange, message: String) -> QueryError {
        QueryError::new(kind, self.source, range.into(), message)
    }

    fn push(&mut self, step: Step) -> StepId {
        self.program.steps.push(step);
        (self.program.steps.len() - 1) as StepId
    }

    fn next_id(&self) -> StepId {
        self.program.steps.len() as StepId
    }

    fn compile_pattern(&mut self, pattern: &ast::Pattern) -> Result<(), QueryError> {
        let Some(body) = pattern.body() else {
            return Err(self.error(
                QueryErrorKind::Syntax,
                pattern.text_range(),
                "expected a pattern".into(),
            ));
        };
        let start = self.next_id();
        self.compile_expr(&body, 0, None)?;
        self.push(Step::Done);

        let quantifiers = capture_counts(&body)
            .into_iter()
            .map(|(name, bounds)| (name, bounds.into()))
            .collect();
        self.program.patterns.push(CompiledPattern {
            first: vec![start],
            range: pattern.text_range(),
            rooted: is_rooted(&body),
            quantifiers,
        });
        Ok(())
    }

    fn compile_expr(
        &mut self,
        expr: &Expr,
        depth: u32,
        field: Option<FieldId>,
    ) -> Result<(), QueryError> {
        match expr {
            Expr::Tree(tree) => self.compile_tree(tree, depth, field),
            Expr::Str(s) => {
                let value = s.value();
                let symbol = self.language.id_for_node_kind(&value, false).ok_or_else(|| {
                    self.error(
                        QueryErrorKind::NodeType,
                        s.text_range(),
                        format!("unknown node type `\"{value}\"`"),
                    )
                })?;
                self.push_match(NodeTest::Kind(symbol), depth, field);
                Ok(())
            }
            Expr::Wildcard(_) => {
                self.push_match(NodeTest::AnyWildcard, depth, field);
                Ok(())
            }
            Expr::Group(group) => {
                if field.is_some() {
                    return Err(self.error(
                        QueryErrorKind::Structure,
                        group.text_range(),
                        "a field cannot apply to a sequence of siblings".into(),
                    ));
                }
                self.compile_sequence(group.children(), depth)
            }
            Expr::Alt(alt) => {
                let split = self.push(Step::Split(Vec::new()));
                let branches: Vec<Expr> = alt.branches().collect();
                let mut targets = Vec::with_capacity(branches.len());
                let mut jumps = Vec::new();
                for (i, branch) in branches.iter().enumerate() {
                    targets.push(self.next_id());
                    self.compile_expr(branch, depth, field)?;
                    if i + 1 < branches.len() {
                        jumps.push(self.push(Step::Jump(0)));
                    }
                }
                let end = self.next_id();
                for jump in jumps {
                    self.program.steps[jump as usize] = Step::Jump(end);
                }
                self.program.steps[split as usize] = Step::Split(targets);
                Ok(())
            }
            Expr::Capture(capture) => {
                let (Some(name), Some(inner)) = (capture.name(), capture.inner()) else {
                    return Err(self.error(
                        QueryErrorKind::Syntax,
                        capture.text_range(),
                        "expected a capture name".into(),
                    ));
                };
                let start = self.next_id();
                self.compile_expr(&inner, depth, field)?;
                let end = self.next_id();
                let id = self.program.captures.intern(name.text()).index() as u32;
                for step in self.first_steps(start..end, depth) {
                    if let Step::Match(m) = &mut self.program.steps[step as usize]
                        && !m.captures.contains(&id)
                    {
                        m.captures.push(id);
                    }
                }
                Ok(())
            }
            Expr::Quantifier(quantifier) => {
                let (Some(inner), Some(kind)) = (quantifier.inner(), quantifier.kind()) else {
                    return Err(self.error(
                        QueryErrorKind::Syntax,
                        quantifier.text_range(),
                        "expected a quantified pattern".into(),
                    ));
                };
                self.compile_quantifier(&inner, kind, depth, field)
            }
            Expr::Field(f) => {
                let (Some(name), Some(value)) = (f.name(), f.value()) else {
                    return Err(self.error(
                        QueryErrorKind::Syntax,
                        f.text_range(),
                        "expected a field value".into(),
                    ));
                };
                if field.is_some() {
                    return Err(self.error(
                        QueryErrorKind::Structure,
                        f.text_range(),
                        "a pattern cannot have two fields".into(),
                    ));
                }
                let id = self.field_id(&name)?;
                self.compile_expr(&value, depth, Some(id))
            }
            Expr::NegatedField(n) => Err(self.error(
                QueryErrorKind::Structure,
                n.text_range(),
                "negated fields are only valid among a node's children".into(),
            )),
            Expr::Anchor(a) => Err(self.error(
                QueryErrorKind::Structure,
                a.text_range(),
                "anchors are only valid between sibling patterns".into(),
            )),
            Expr::Predicate(p) => Err(self.error(
                QueryErrorKind::Structure,
                p.text_range(),
                "a predicate must sit inside the pattern it tests".into(),
            )),
        }
    }

    fn compile_tree(
        &mut self,
        tree: &ast::Tree,
        depth: u32,
        field: Option<FieldId>,
    ) -> Result<(), QueryError> {
        let test = match tree.node_type() {
            Some(NodeType::Named(token)) => {
                let name = token.text();
                let symbol = self.language.id_for_node_kind(name, true).ok_or_else(|| {
                    self.error(
                        QueryErrorKind::NodeType,
                        token.text_range(),
                        format!("unknown node type `{name}`"),
                    )
                })?;
                NodeTest::Kind(symbol)
            }
            Some(NodeType::Wildcard) => NodeTest::NamedWildcard,
            Some(NodeType::Error) => NodeTest::Kind(SYMBOL_ERROR),
            Some(NodeType::Missing(None)) => NodeTest::Missing(None),
            Some(NodeType::Missing(Some((name, named, range)))) => {
                let symbol = self.language.id_for_node_kind(&name, named).ok_or_else(|| {
                    self.error(
                        QueryErrorKind::NodeType,
                        range,
                        format!("unknown node type `{name}`"),
                    )
                })?;
                NodeTest::Missing(Some(symbol))
            }
            None => {
                return Err(self.error(
                    QueryErrorKind::Syntax,
                    tree.node_type_range(),
                    "expected a node type".into(),
                ));
            }
        };
        let step = self.push_match(test, depth, field);

        let mut negated = Vec::new();
        for child in tree.children() {
            if let Expr::NegatedField(n) = &child {
                let Some(name) = n.name() else {
                    continue;
                };
                negated.push(self.field_id(&name)?);
            }
        }
        if let Step::Match(m) = &mut self.program.steps[step as usize] {
            m.negated_fields = negated;
        }

        self.compile_sequence(
            tree.children().filter(|c| !matches!(c, Expr::NegatedField(_))),
            depth + 1,
        )
    }

    /// Sibling patterns, honoring `.` anchors between them.
    fn compile_sequence(
        &mut self,
        items: impl Iterator<Item = Expr>,
        depth: u32,
    ) -> Result<(), QueryError> {
        let mut anchor_pending = false;
        let mut previous: Option<Range<StepId>> = None;
        for item in items {
            match item {
                Expr::Anchor(_) => anchor_pending = true,
                Expr::Predicate(_) => {}
                item => {
                    let start = self.next_id();
                    self.compile_expr(&item, depth, None)?;
                    let end = self.next_id();
                    if anchor_pending {
                        for step in self.first_steps(start..end, depth) {
                            if let Step::Match(m) = &mut self.program.steps[step as usize] {
                                m.immediate = true;
                            }
                        }
                    }
                    anchor_pending = false;
                    previous = Some(start..end);
                }
            }
        }
        if anchor_pending && let Some(previous) = previous {
            for step in &mut self.program.steps[previous.start as usize..previous.end as usize] {
                if let Step::Match(m) = step
                    && m.depth == depth
                {
                    m.last_child = true;
                }
            }
        }
        Ok(())
    }

    fn compile_quantifier(
        &mut self,
        inner: &Expr,
        kind: QuantifierKind,
        depth: u32,
        field: Option<FieldId>,
    ) -> Result<(), QueryError> {
        match kind {
            QuantifierKind::Optional => {
                let split = self.push(Step::Split(Vec::new()));
                self.compile_expr(inner, depth, field)?;
                let end = self.next_id();
                self.program.steps[split as usize] = Step::Split(vec![split + 1, end]);
            }
            QuantifierKind::ZeroOrMore => {
                let split = self.push(Step::Split(Vec::new()));
                self.compile_expr(inner, depth, field)?;
                self.push(Step::Jump(split));
                let end = self.next_id();
                self.program.steps[split as usize] = Step::Split(vec![split + 1, end]);
            }
            QuantifierKind::OneOrMore => {
                let start = self.next_id();
                self.compile_expr(inner, depth, field)?;
                let split = self.next_id();
                self.push(Step::Split(vec![start, split + 1]));
            }
        }
        Ok(())
    }

    fn push_match(&mut self, test: NodeTest, depth: u32, field: Option<FieldId>) -> StepId {
        self.push(Step::Match(MatchStep {
            test,
            depth,
            field,
            negated_fields: Vec::new(),
            captures: Vec::new(),
            immediate: false,
            last_child: false,
        }))
    }

    fn field_id(&self, name: &crate::parser::SyntaxToken) -> Result<FieldId, QueryError> {
        self.language.field_id_for_name(name.text()).ok_or_else(|| {
            self.error(
                QueryErrorKind::Field,
                name.text_range(),
                format!("unknown field `{}`", name.text()),
            )
        })
    }

    /// `Match` steps at `depth` that can be the first node matched by the
    /// steps in `range`.
    fn first_steps(&self, range: Range<StepId>, depth: u32) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.program.steps.len()];
        let mut stack = vec![range.start];
        while let Some(id) = stack.pop() {
            if !range.contains(&id) || std::mem::replace(&mut seen[id as usize], true) {
                continue;
            }
            match &self.program.steps[id as usize] {
                Step::Match(m) if m.depth == depth => out.push(id),
                Step::Match(_) | Step::Done => {}
                Step::Jump(target) => stack.push(*target),
                Step::Split(targets) => stack.extend(targets.iter().copied()),
            }
        }
        out
    }

    /// Precomputes closures and the start index.
    fn link(&mut self) {
        let program = &mut self.program;
        program.successors = (0..program.steps.len() as StepId)
            .map(|id| match program.steps[id as usize] {
                Step::Match(_) => program.closure(id + 1),
                _ => Vec::new(),
            })
            .collect();

        for index in 0..program.patterns.len() {
            let Some(&start) = program.patterns[index].first.first() else {
                continue;
            };
            let first: Vec<StepId> = program
                .closure(start)
                .into_iter()
                .filter(|&id| !program.is_done(id))
                .collect();
            for &step in &first {
                match program.match_step(step).map(|m| m.test) {
                    Some(NodeTest::Kind(symbol)) => program
                        .by_symbol
                        .entry(symbol)
                        .or_default()
                        .push((index as u32, step)),
                    Some(_) => program.unkeyed.push((index as u32, step)),
                    None => {}
                }
            }
            program.patterns[index].first = first;
        }
    }
}
