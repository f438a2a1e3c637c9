//! Multi-pattern execution over a syntax tree.
//!
//! One pre-order walk drives every pattern at once. Each in-progress match
//! is a [`State`] waiting on a `Match` step at some absolute depth; entering a
//! node at that depth tests it and forks the state onto the step's
//! successors. Leaving a node drops the states that were waiting for more of
//! its children. Finished matches of one start node are held back until no
//! state with the same start is alive, so a match that is a strict subset of
//! a fuller one is never reported.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

use thicket_core::{FieldId, Point, SYMBOL_ERROR};
use thicket_tree::{Node, TreeCursor};

use crate::compile::{MatchStep, NodeTest, StepId};
use crate::predicate::QueryPredicate;
use crate::query::Query;
use crate::text::TextProvider;

/// Walk steps between two deadline checks.
const STEPS_PER_DEADLINE_CHECK: u32 = 64;

/// Host callback for predicates the query does not know: receives the
/// predicate, the pattern index and the match's captures.
pub type CustomPredicate =
    Box<dyn FnMut(&QueryPredicate, usize, &[QueryCapture<'_>]) -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryCapture<'tree> {
    pub node: Node<'tree>,
    pub index: u32,
}

/// One whole-pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch<'tree> {
    pub pattern_index: usize,
    pub captures: Vec<QueryCapture<'tree>>,
    id: u32,
    /// Pre-order index of each capture's node, parallel to `captures`.
    preorders: Vec<usize>,
}

impl<'tree> QueryMatch<'tree> {
    /// Position of this match in completion order.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
        self.captures
            .iter()
            .filter(move |c| c.index == index)
            .map(|c| c.node)
    }
}

/// Reusable execution settings for running queries.
pub struct QueryCursor {
    byte_range: Range<usize>,
    point_range: Range<Point>,
    match_limit: u32,
    max_start_depth: u32,
    exceeded_match_limit: bool,
    timeout: Option<Duration>,
    timed_out: bool,
    custom_predicate: Option<CustomPredicate>,
}

impl Default for QueryCursor {
    fn default() -> Self {
        Self {
            byte_range: 0..usize::MAX,
            point_range: Point::ZERO..Point::MAX,
            match_limit: u32::MAX,
            max_start_depth: u32::MAX,
            exceeded_match_limit: false,
            timeout: None,
            timed_out: false,
            custom_predicate: None,
        }
    }
}

impl fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCursor")
            .field("byte_range", &self.byte_range)
            .field("point_range", &self.point_range)
            .field("match_limit", &self.match_limit)
            .field("max_start_depth", &self.max_start_depth)
            .field("exceeded_match_limit", &self.exceeded_match_limit)
            .field("timeout", &self.timeout)
            .field("timed_out", &self.timed_out)
            .field("custom_predicate", &self.custom_predicate.is_some())
            .finish()
    }
}

impl QueryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only matches that start on a node intersecting `range` are reported.
    pub fn set_byte_range(&mut self, range: Range<usize>) -> &mut Self {
        self.byte_range = range;
        self
    }

    pub fn set_point_range(&mut self, range: Range<Point>) -> &mut Self {
        self.point_range = range;
        self
    }

    /// Caps the number of in-progress matches. When the cap is hit the
    /// oldest one is abandoned.
    pub fn set_match_limit(&mut self, limit: u32) -> &mut Self {
        self.match_limit = limit.max(1);
        self
    }

    pub fn match_limit(&self) -> u32 {
        self.match_limit
    }

    /// Whether the last run abandoned any in-progress match.
    pub fn did_exceed_match_limit(&self) -> bool {
        self.exceeded_match_limit
    }

    /// Matches may only start on nodes at most `depth` levels below the
    /// node the query runs on.
    pub fn set_max_start_depth(&mut self, depth: Option<u32>) -> &mut Self {
        self.max_start_depth = depth.unwrap_or(u32::MAX);
        self
    }

    /// Bounds the wall-clock time of each run. A run that runs out stops
    /// early: matches already reported stay valid and iteration ends.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the last run stopped because its time ran out.
    pub fn did_time_out(&self) -> bool {
        self.timed_out
    }

    pub fn set_custom_predicate(&mut self, predicate: Option<CustomPredicate>) -> &mut Self {
        self.custom_predicate = predicate;
        self
    }

    /// Whole-pattern matches below `node`, lazily, in completion order.
    pub fn matches<'a, 'tree, T: TextProvider<'tree>>(
        &'a mut self,
        query: &'a Query,
        node: Node<'tree>,
        text: T,
    ) -> QueryMatches<'a, 'tree, T> {
        self.exceeded_match_limit = false;
        self.timed_out = false;
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        QueryMatches {
            query,
            cursor: self,
            text,
            walk: TreeCursor::new(node),
            descending: true,
            walk_done: false,
            states: Vec::new(),
            pending: Vec::new(),
            ready: VecDeque::new(),
            next_seq: 0,
            next_match_id: 0,
            deadline,
            steps: 0,
        }
    }

    /// Individual captures below `node`, ordered by node position, then by
    /// match completion order.
    pub fn captures<'tree, T: TextProvider<'tree>>(
        &mut self,
        query: &Query,
        node: Node<'tree>,
        text: T,
    ) -> QueryCaptures<'tree> {
        let matches: Vec<QueryMatch<'tree>> = self.matches(query, node, text).collect();
        let mut order = Vec::new();
        for (m, found) in matches.iter().enumerate() {
            for (i, preorder) in found.preorders.iter().enumerate() {
                order.push((*preorder, m, i));
            }
        }
        order.sort_unstable();
        let items: Vec<_> = order
            .into_iter()
            .map(|(_, m, i)| (matches[m].clone(), i))
            .collect();
        QueryCaptures {
            items: items.into_iter(),
        }
    }

    fn intersects(&self, node: Node<'_>) -> bool {
        let (start, end) = (node.start_byte() as usize, node.end_byte() as usize);
        let bytes = (end > self.byte_range.start && start < self.byte_range.end)
            || (start == end && self.byte_range.contains(&start));
        let (start, end) = (node.start_position(), node.end_position());
        let points = (end > self.point_range.start && start < self.point_range.end)
            || (start == end && self.point_range.contains(&start));
        bytes && points
    }
}

/// Iterator over `(match, capture position)` pairs.
pub struct QueryCaptures<'tree> {
    items: std::vec::IntoIter<(QueryMatch<'tree>, usize)>,
}

impl<'tree> Iterator for QueryCaptures<'tree> {
    type Item = (QueryMatch<'tree>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

#[derive(Debug, Clone, Copy)]
struct Captured<'tree> {
    node: Node<'tree>,
    index: u32,
    preorder: usize,
}

#[derive(Debug, Clone)]
struct State<'tree> {
    pattern: u32,
    step: StepId,
    start_depth: u32,
    start_preorder: usize,
    captures: Vec<Captured<'tree>>,
    /// Last node matched at each relative depth.
    path: Vec<Node<'tree>>,
    seq: u64,
}

impl State<'_> {
    fn key(&self) -> (u32, usize) {
        (self.pattern, self.start_preorder)
    }
}

#[derive(Debug)]
struct Finished<'tree> {
    key: (u32, usize),
    captures: Vec<Captured<'tree>>,
}

/// `small` ⊆ `large`, comparing capture index and node.
fn is_subset(small: &[Captured<'_>], large: &[Captured<'_>]) -> bool {
    small.iter().all(|a| {
        large
            .iter()
            .any(|b| a.index == b.index && a.preorder == b.preorder)
    })
}

fn prev_significant<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let step = |n: Node<'tree>| {
        if node.is_named() {
            n.prev_named_sibling()
        } else {
            n.prev_sibling()
        }
    };
    let mut current = step(node);
    while let Some(n) = current
        && n.is_extra()
    {
        current = step(n);
    }
    current
}

fn next_significant<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let mut current = node.next_named_sibling();
    while let Some(n) = current
        && n.is_extra()
    {
        current = n.next_named_sibling();
    }
    current
}

fn node_matches(
    step: &MatchStep,
    node: Node<'_>,
    field: Option<FieldId>,
    path: &[Node<'_>],
) -> bool {
    let kind = match step.test {
        NodeTest::Kind(SYMBOL_ERROR) => node.is_error(),
        NodeTest::Kind(symbol) => node.kind_id() == symbol && !node.is_error(),
        NodeTest::NamedWildcard => node.is_named(),
        NodeTest::AnyWildcard => true,
        NodeTest::Missing(None) => node.is_missing(),
        NodeTest::Missing(Some(symbol)) => node.is_missing() && node.kind_id() == symbol,
    };
    if !kind {
        return false;
    }
    if let Some(expected) = step.field
        && field != Some(expected)
    {
        return false;
    }
    if step
        .negated_fields
        .iter()
        .any(|&f| node.child_by_field_id(f).is_some())
    {
        return false;
    }
    if step.immediate && prev_significant(node) != path.get(step.depth as usize).copied() {
        return false;
    }
    if step.last_child && next_significant(node).is_some() {
        return false;
    }
    true
}

/// Lazy iterator over the matches of one query run.
pub struct QueryMatches<'a, 'tree, T> {
    query: &'a Query,
    cursor: &'a mut QueryCursor,
    text: T,
    walk: TreeCursor<'tree>,
    descending: bool,
    walk_done: bool,
    states: Vec<State<'tree>>,
    pending: Vec<Finished<'tree>>,
    ready: VecDeque<QueryMatch<'tree>>,
    next_seq: u64,
    next_match_id: u32,
    deadline: Option<Instant>,
    steps: u32,
}

impl<'tree, T: TextProvider<'tree>> Iterator for QueryMatches<'_, 'tree, T> {
    type Item = QueryMatch<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.ready.pop_front() {
                return Some(found);
            }
            if self.walk_done {
                return None;
            }
            if self.out_of_time() {
                self.stop_early();
                return None;
            }
            self.advance();
        }
    }
}

impl<'tree, T: TextProvider<'tree>> QueryMatches<'_, 'tree, T> {
    fn out_of_time(&mut self) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        let check = self.steps % STEPS_PER_DEADLINE_CHECK == 0;
        self.steps = self.steps.wrapping_add(1);
        check && Instant::now() >= deadline
    }

    /// Abandons the walk; in-progress and held-back matches are dropped.
    fn stop_early(&mut self) {
        tracing::debug!(
            abandoned = self.states.len() + self.pending.len(),
            "query timed out"
        );
        self.states.clear();
        self.pending.clear();
        self.walk_done = true;
        self.cursor.timed_out = true;
    }

    /// Moves the walk by one node, entering or leaving.
    fn advance(&mut self) {
        if self.descending {
            let node = self.walk.node();
            let depth = self.walk.depth();
            let in_range = self.cursor.intersects(node);
            self.enter(node, depth, in_range);
            if (in_range || !self.states.is_empty()) && self.walk.goto_first_child() {
                return;
            }
            self.leave(depth);
        }
        if self.walk.goto_next_sibling() {
            self.descending = true;
            return;
        }
        if self.walk.goto_parent() {
            self.descending = false;
            self.leave(self.walk.depth());
            return;
        }
        self.states.clear();
        self.flush(true);
        self.walk_done = true;
    }

    fn enter(&mut self, node: Node<'tree>, depth: u32, in_range: bool) {
        let query = self.query;
        let program = &query.program;
        let preorder = self.walk.descendant_index();
        let field = self.walk.current_field_id();

        let mut forked = Vec::new();
        let states = std::mem::take(&mut self.states);
        let mut kept = Vec::with_capacity(states.len());
        for state in states {
            let Some(step) = program.match_step(state.step) else {
                continue;
            };
            if state.start_depth + step.depth != depth {
                kept.push(state);
                continue;
            }
            if node_matches(step, node, field, &state.path) {
                self.fork(&state, step, node, preorder, &mut forked);
            }
            let exhausted = step.immediate && node.is_named() && !node.is_extra();
            if !exhausted {
                kept.push(state);
            }
        }
        self.states = kept;

        if in_range && depth <= self.cursor.max_start_depth {
            let mut starts: Vec<(u32, StepId)> = program
                .by_symbol
                .get(&node.kind_id())
                .into_iter()
                .flatten()
                .copied()
                .collect();
            if node.is_error()
                && node.kind_id() != SYMBOL_ERROR
                && let Some(error_starts) = program.by_symbol.get(&SYMBOL_ERROR)
            {
                starts.extend(error_starts.iter().copied());
            }
            starts.extend(program.unkeyed.iter().copied());
            starts.sort_unstable();
            starts.dedup();

            for (pattern, step_id) in starts {
                if query.disabled_patterns.contains(&(pattern as usize)) {
                    continue;
                }
                let Some(step) = program.match_step(step_id) else {
                    continue;
                };
                if !node_matches(step, node, field, &[]) {
                    continue;
                }
                tracing::trace!(pattern, start = preorder, "starting pattern");
                let state = State {
                    pattern,
                    step: step_id,
                    start_depth: depth,
                    start_preorder: preorder,
                    captures: Vec::new(),
                    path: Vec::new(),
                    seq: 0,
                };
                self.fork(&state, step, node, preorder, &mut forked);
            }
        }

        self.states.extend(forked);
        self.dedup_states();
        self.enforce_match_limit();
    }

    /// Advances `state` past `node`, which matched `step`.
    fn fork(
        &mut self,
        state: &State<'tree>,
        step: &MatchStep,
        node: Node<'tree>,
        preorder: usize,
        out: &mut Vec<State<'tree>>,
    ) {
        let query = self.query;
        let mut captures = state.captures.clone();
        captures.extend(step.captures.iter().map(|&index| Captured {
            node,
            index,
            preorder,
        }));
        let mut path = state.path.clone();
        path.truncate(step.depth as usize);
        path.push(node);

        for &next in query.program.successors(state.step) {
            if query.program.is_done(next) {
                self.finish(state.key(), captures.clone());
                continue;
            }
            self.next_seq += 1;
            out.push(State {
                pattern: state.pattern,
                step: next,
                start_depth: state.start_depth,
                start_preorder: state.start_preorder,
                captures: captures.clone(),
                path: path.clone(),
                seq: self.next_seq,
            });
        }
    }

    /// Checks predicates and queues the match until its start node settles.
    fn finish(&mut self, key: (u32, usize), captures: Vec<Captured<'tree>>) {
        let query = self.query;
        let pattern = key.0 as usize;
        let public: Vec<QueryCapture<'tree>> = captures
            .iter()
            .map(|c| QueryCapture {
                node: c.node,
                index: c.index,
            })
            .collect();

        if let Some(predicates) = query.predicates.get(pattern) {
            for predicate in &predicates.text {
                if predicate.evaluate(&public, &mut self.text) != Some(true) {
                    return;
                }
            }
            if let Some(callback) = self.cursor.custom_predicate.as_mut() {
                for predicate in &predicates.general {
                    if !callback(predicate, pattern, &public) {
                        return;
                    }
                }
            }
        }
        self.pending.push(Finished { key, captures });
    }

    fn leave(&mut self, depth: u32) {
        let query = self.query;
        self.states.retain(|state| {
            query
                .program
                .match_step(state.step)
                .is_some_and(|step| state.start_depth + step.depth <= depth)
        });
        self.flush(false);
    }

    /// Releases finished matches whose start has no live state left.
    fn flush(&mut self, all: bool) {
        if self.pending.is_empty() {
            return;
        }
        let live: HashSet<(u32, usize)> = self.states.iter().map(State::key).collect();
        let (settled, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|f| all || !live.contains(&f.key));
        self.pending = waiting;

        for (i, found) in settled.iter().enumerate() {
            let dominated = settled.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.key == found.key
                    && is_subset(&found.captures, &other.captures)
                    && (j < i || !is_subset(&other.captures, &found.captures))
            });
            if dominated {
                continue;
            }
            tracing::trace!(pattern = found.key.0, id = self.next_match_id, "match");
            self.ready.push_back(QueryMatch {
                pattern_index: found.key.0 as usize,
                captures: found
                    .captures
                    .iter()
                    .map(|c| QueryCapture {
                        node: c.node,
                        index: c.index,
                    })
                    .collect(),
                id: self.next_match_id,
                preorders: found.captures.iter().map(|c| c.preorder).collect(),
            });
            self.next_match_id += 1;
        }
    }

    /// Drops states whose captures another state at the same step and start
    /// already covers.
    fn dedup_states(&mut self) {
        if self.states.len() < 2 {
            return;
        }
        let mut i = 0;
        while i < self.states.len() {
            let state = &self.states[i];
            let dominated = self.states.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.step == state.step
                    && other.key() == state.key()
                    && is_subset(&state.captures, &other.captures)
                    && (j < i || !is_subset(&other.captures, &state.captures))
            });
            if dominated {
                self.states.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn enforce_match_limit(&mut self) {
        let limit = self.cursor.match_limit as usize;
        while self.states.len() > limit {
            let Some(oldest) = self
                .states
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.seq)
                .map(|(i, _)| i)
            else {
                break;
            };
            let dropped = self.states.remove(oldest);
            tracing::debug!(pattern = dropped.pattern, limit, "match limit exceeded");
            self.cursor.exceeded_match_limit = true;
        }
    }
}
