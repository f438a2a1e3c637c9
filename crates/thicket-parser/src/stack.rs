//! The graph-structured parse stack.
//!
//! Each stack version is a head pointing into a shared graph of nodes.
//! Forking a version is O(1); versions that reach the same state at the
//! same position are merged by linking their predecessors into one node,
//! so later pops may return several paths.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use thicket_core::{ERROR_STATE, Language, Length, SYMBOL_ERROR_REPEAT, StateId};
use thicket_tree::subtree::{ERROR_COST_PER_RECOVERY, external_scanner_state_eq};
use thicket_tree::{Subtree, escape_dot};

const MAX_LINK_COUNT: usize = 8;
const MAX_ITERATOR_COUNT: usize = 64;

pub(crate) type Version = usize;

#[derive(Clone)]
struct Link {
    node: Rc<StackNode>,
    /// `None` marks a discontinuity pushed when entering recovery.
    subtree: Option<Subtree>,
    is_pending: bool,
}

struct StackNode {
    state: StateId,
    position: Length,
    links: RefCell<Vec<Link>>,
    error_cost: u32,
    node_count: Cell<u32>,
    dynamic_precedence: Cell<i32>,
}

impl Drop for StackNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.links.get_mut());
        while let Some(link) = pending.pop() {
            if let Ok(node) = Rc::try_unwrap(link.node) {
                pending.append(&mut node.links.take());
            }
        }
    }
}

fn subtree_node_count(subtree: &Subtree) -> u32 {
    let mut count = subtree.visible_descendant_count;
    if subtree.visible {
        count += 1;
    }
    // Hidden error accumulators still count as progress.
    if subtree.symbol == SYMBOL_ERROR_REPEAT {
        count += 1;
    }
    count
}

impl StackNode {
    fn new(previous: Option<&Rc<StackNode>>, subtree: Option<Subtree>, is_pending: bool, state: StateId) -> Rc<StackNode> {
        let Some(previous) = previous else {
            return Rc::new(StackNode {
                state,
                position: Length::ZERO,
                links: RefCell::new(Vec::new()),
                error_cost: 0,
                node_count: Cell::new(0),
                dynamic_precedence: Cell::new(0),
            });
        };

        let mut position = previous.position;
        let mut error_cost = previous.error_cost;
        let mut node_count = previous.node_count.get();
        let mut dynamic_precedence = previous.dynamic_precedence.get();
        if let Some(tree) = &subtree {
            error_cost += tree.error_cost();
            position = position.add(tree.total_size());
            node_count += subtree_node_count(tree);
            dynamic_precedence += tree.dynamic_precedence;
        }

        Rc::new(StackNode {
            state,
            position,
            links: RefCell::new(vec![Link {
                node: Rc::clone(previous),
                subtree,
                is_pending,
            }]),
            error_cost,
            node_count: Cell::new(node_count),
            dynamic_precedence: Cell::new(dynamic_precedence),
        })
    }

    fn add_link(self: &Rc<Self>, link: Link) {
        if Rc::ptr_eq(self, &link.node) {
            return;
        }

        let existing_count = self.links.borrow().len();
        for i in 0..existing_count {
            let existing = self.links.borrow()[i].clone();
            if !subtree_is_equivalent(existing.subtree.as_ref(), link.subtree.as_ref()) {
                continue;
            }

            // Two links joining the same pair of nodes: keep the preferred one.
            if Rc::ptr_eq(&existing.node, &link.node) {
                let new_prec = link.subtree.as_ref().map_or(0, |t| t.dynamic_precedence);
                let old_prec = existing.subtree.as_ref().map_or(0, |t| t.dynamic_precedence);
                if new_prec > old_prec {
                    self.links.borrow_mut()[i].subtree = link.subtree.clone();
                    self.dynamic_precedence
                        .set(link.node.dynamic_precedence.get() + new_prec);
                }
                return;
            }

            // Equivalent predecessors merge recursively.
            if existing.node.state == link.node.state
                && existing.node.position.bytes == link.node.position.bytes
                && existing.node.error_cost == link.node.error_cost
            {
                let next_links: Vec<Link> = link.node.links.borrow().clone();
                for next in next_links {
                    existing.node.add_link(next);
                }
                let mut dynamic_precedence = link.node.dynamic_precedence.get();
                if let Some(tree) = &link.subtree {
                    dynamic_precedence += tree.dynamic_precedence;
                }
                if dynamic_precedence > self.dynamic_precedence.get() {
                    self.dynamic_precedence.set(dynamic_precedence);
                }
                return;
            }
        }

        if existing_count == MAX_LINK_COUNT {
            return;
        }

        let mut node_count = link.node.node_count.get();
        let mut dynamic_precedence = link.node.dynamic_precedence.get();
        if let Some(tree) = &link.subtree {
            node_count += subtree_node_count(tree);
            dynamic_precedence += tree.dynamic_precedence;
        }
        self.links.borrow_mut().push(link);

        if node_count > self.node_count.get() {
            self.node_count.set(node_count);
        }
        if dynamic_precedence > self.dynamic_precedence.get() {
            self.dynamic_precedence.set(dynamic_precedence);
        }
    }
}

fn subtree_is_equivalent(left: Option<&Subtree>, right: Option<&Subtree>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            if l.ptr_eq(r) {
                return true;
            }
            if l.symbol != r.symbol {
                return false;
            }
            if l.error_cost() > 0 && r.error_cost() > 0 {
                return true;
            }
            l.padding.bytes == r.padding.bytes
                && l.size.bytes == r.size.bytes
                && l.child_count() == r.child_count()
                && l.extra == r.extra
                && external_scanner_state_eq(Some(l), Some(r))
        }
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    Active,
    Paused,
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SummaryEntry {
    pub position: Length,
    pub depth: u32,
    pub state: StateId,
}

#[derive(Clone)]
struct Head {
    node: Rc<StackNode>,
    summary: Option<Rc<Vec<SummaryEntry>>>,
    node_count_at_last_error: u32,
    last_external_token: Option<Subtree>,
    lookahead_when_paused: Option<Subtree>,
    status: Status,
}

/// Subtrees popped along one path, in left-to-right order.
pub(crate) struct Slice {
    pub subtrees: Vec<Subtree>,
    pub version: Version,
}

struct StackIterator {
    node: Rc<StackNode>,
    subtrees: Vec<Subtree>,
    subtree_count: u32,
    is_pending: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Pop,
    Stop,
    PopAndStop,
}

impl Action {
    fn pops(self) -> bool {
        matches!(self, Action::Pop | Action::PopAndStop)
    }

    fn stops(self) -> bool {
        matches!(self, Action::Stop | Action::PopAndStop)
    }
}

pub(crate) struct Stack {
    heads: Vec<Head>,
    base_node: Rc<StackNode>,
}

impl Stack {
    pub fn new() -> Self {
        let base_node = StackNode::new(None, None, false, 1);
        let mut stack = Self {
            heads: Vec::new(),
            base_node,
        };
        stack.clear();
        stack
    }

    pub fn clear(&mut self) {
        self.heads.clear();
        self.heads.push(Head {
            node: Rc::clone(&self.base_node),
            summary: None,
            node_count_at_last_error: 0,
            last_external_token: None,
            lookahead_when_paused: None,
            status: Status::Active,
        });
    }

    pub fn version_count(&self) -> usize {
        self.heads.len()
    }

    pub fn halted_version_count(&self) -> usize {
        self.heads
            .iter()
            .filter(|h| h.status == Status::Halted)
            .count()
    }

    pub fn state(&self, version: Version) -> StateId {
        self.heads[version].node.state
    }

    pub fn position(&self, version: Version) -> Length {
        self.heads[version].node.position
    }

    pub fn last_external_token(&self, version: Version) -> Option<&Subtree> {
        self.heads[version].last_external_token.as_ref()
    }

    pub fn set_last_external_token(&mut self, version: Version, token: Option<Subtree>) {
        self.heads[version].last_external_token = token;
    }

    pub fn error_cost(&self, version: Version) -> u32 {
        let head = &self.heads[version];
        let mut cost = head.node.error_cost;
        let at_discontinuity = head.node.state == ERROR_STATE
            && head
                .node
                .links
                .borrow()
                .first()
                .is_some_and(|l| l.subtree.is_none());
        if head.status == Status::Paused || at_discontinuity {
            cost += ERROR_COST_PER_RECOVERY;
        }
        cost
    }

    pub fn node_count_since_error(&mut self, version: Version) -> u32 {
        let head = &mut self.heads[version];
        let count = head.node.node_count.get();
        if count < head.node_count_at_last_error {
            head.node_count_at_last_error = count;
        }
        count - head.node_count_at_last_error
    }

    pub fn dynamic_precedence(&self, version: Version) -> i32 {
        self.heads[version].node.dynamic_precedence.get()
    }

    pub fn push(&mut self, version: Version, subtree: Option<Subtree>, pending: bool, state: StateId) {
        let head = &mut self.heads[version];
        let is_discontinuity = subtree.is_none();
        let node = StackNode::new(Some(&head.node), subtree, pending, state);
        if is_discontinuity {
            head.node_count_at_last_error = node.node_count.get();
        }
        head.node = node;
    }

    pub fn has_advanced_since_error(&self, version: Version) -> bool {
        let head = &self.heads[version];
        let mut node = Rc::clone(&head.node);
        if node.error_cost == 0 {
            return true;
        }
        loop {
            let next = {
                let links = node.links.borrow();
                let Some(link) = links.first() else { break };
                let Some(subtree) = &link.subtree else { break };
                if subtree.total_bytes() > 0 {
                    return true;
                }
                if node.node_count.get() > head.node_count_at_last_error && subtree.error_cost() == 0 {
                    Rc::clone(&link.node)
                } else {
                    break;
                }
            };
            node = next;
        }
        false
    }

    pub fn is_active(&self, version: Version) -> bool {
        self.heads[version].status == Status::Active
    }

    pub fn is_paused(&self, version: Version) -> bool {
        self.heads[version].status == Status::Paused
    }

    pub fn is_halted(&self, version: Version) -> bool {
        self.heads[version].status == Status::Halted
    }

    pub fn halt(&mut self, version: Version) {
        self.heads[version].status = Status::Halted;
    }

    pub fn pause(&mut self, version: Version, lookahead: Subtree) {
        let head = &mut self.heads[version];
        head.status = Status::Paused;
        head.lookahead_when_paused = Some(lookahead);
        head.node_count_at_last_error = head.node.node_count.get();
    }

    pub fn resume(&mut self, version: Version) -> Option<Subtree> {
        let head = &mut self.heads[version];
        head.status = Status::Active;
        head.lookahead_when_paused.take()
    }

    pub fn summary(&self, version: Version) -> Option<Rc<Vec<SummaryEntry>>> {
        self.heads[version].summary.clone()
    }

    pub fn remove_version(&mut self, version: Version) {
        self.heads.remove(version);
    }

    /// Moves version `v1` into slot `v2 < v1`, replacing it.
    pub fn renumber_version(&mut self, v1: Version, v2: Version) {
        if v1 == v2 {
            return;
        }
        debug_assert!(v2 < v1);
        let mut source = self.heads.remove(v1);
        if source.summary.is_none() {
            source.summary = self.heads[v2].summary.take();
        }
        self.heads[v2] = source;
    }

    pub fn swap_versions(&mut self, v1: Version, v2: Version) {
        self.heads.swap(v1, v2);
    }

    pub fn copy_version(&mut self, version: Version) -> Version {
        let mut head = self.heads[version].clone();
        head.summary = None;
        self.heads.push(head);
        self.heads.len() - 1
    }

    pub fn can_merge(&self, v1: Version, v2: Version) -> bool {
        let h1 = &self.heads[v1];
        let h2 = &self.heads[v2];
        h1.status == Status::Active
            && h2.status == Status::Active
            && h1.node.state == h2.node.state
            && h1.node.position.bytes == h2.node.position.bytes
            && h1.node.error_cost == h2.node.error_cost
            && external_scanner_state_eq(
                h1.last_external_token.as_ref(),
                h2.last_external_token.as_ref(),
            )
    }

    pub fn merge(&mut self, v1: Version, v2: Version) -> bool {
        if !self.can_merge(v1, v2) {
            return false;
        }
        let links: Vec<Link> = self.heads[v2].node.links.borrow().clone();
        let target = Rc::clone(&self.heads[v1].node);
        for link in links {
            target.add_link(link);
        }
        if target.state == ERROR_STATE {
            self.heads[v1].node_count_at_last_error = target.node_count.get();
        }
        self.remove_version(v2);
        true
    }

    fn add_version(&mut self, original: Version, node: Rc<StackNode>) -> Version {
        let original = &self.heads[original];
        let head = Head {
            node,
            summary: None,
            node_count_at_last_error: original.node_count_at_last_error,
            last_external_token: original.last_external_token.clone(),
            lookahead_when_paused: None,
            status: Status::Active,
        };
        self.heads.push(head);
        self.heads.len() - 1
    }

    fn add_slice(&mut self, slices: &mut Vec<Slice>, original: Version, node: &Rc<StackNode>, subtrees: Vec<Subtree>) {
        for i in (0..slices.len()).rev() {
            let version = slices[i].version;
            if Rc::ptr_eq(&self.heads[version].node, node) {
                slices.insert(i + 1, Slice { subtrees, version });
                return;
            }
        }
        let version = self.add_version(original, Rc::clone(node));
        slices.push(Slice { subtrees, version });
    }

    /// Walks every path down from a head, letting `callback` decide where
    /// each path pops or stops.
    fn iterate(
        &mut self,
        version: Version,
        include_subtrees: bool,
        mut callback: impl FnMut(&StackIterator) -> Action,
    ) -> Vec<Slice> {
        let mut slices = Vec::new();
        let mut iterators = vec![StackIterator {
            node: Rc::clone(&self.heads[version].node),
            subtrees: Vec::new(),
            subtree_count: 0,
            is_pending: true,
        }];

        while !iterators.is_empty() {
            let mut i = 0;
            let mut size = iterators.len();
            while i < size {
                let action = callback(&iterators[i]);
                let node = Rc::clone(&iterators[i].node);
                let link_count = node.links.borrow().len();
                let should_stop = action.stops() || link_count == 0;

                if action.pops() {
                    let mut subtrees = if should_stop {
                        std::mem::take(&mut iterators[i].subtrees)
                    } else {
                        iterators[i].subtrees.clone()
                    };
                    subtrees.reverse();
                    self.add_slice(&mut slices, version, &node, subtrees);
                }

                if should_stop {
                    iterators.remove(i);
                    size -= 1;
                    continue;
                }

                let links = node.links.borrow();
                for j in 1..=link_count {
                    let (link, target) = if j == link_count {
                        (&links[0], i)
                    } else {
                        if iterators.len() >= MAX_ITERATOR_COUNT {
                            continue;
                        }
                        let copy = StackIterator {
                            node: Rc::clone(&iterators[i].node),
                            subtrees: iterators[i].subtrees.clone(),
                            subtree_count: iterators[i].subtree_count,
                            is_pending: iterators[i].is_pending,
                        };
                        iterators.push(copy);
                        (&links[j], iterators.len() - 1)
                    };

                    let next = &mut iterators[target];
                    next.node = Rc::clone(&link.node);
                    match &link.subtree {
                        Some(subtree) => {
                            if include_subtrees {
                                next.subtrees.push(subtree.clone());
                            }
                            if !subtree.extra {
                                next.subtree_count += 1;
                                if !link.is_pending {
                                    next.is_pending = false;
                                }
                            }
                        }
                        None => {
                            next.subtree_count += 1;
                            next.is_pending = false;
                        }
                    }
                }
                i += 1;
            }
        }

        slices
    }

    /// Pops `count` non-extra subtrees along every path.
    pub fn pop_count(&mut self, version: Version, count: u32) -> Vec<Slice> {
        self.iterate(version, true, |it| {
            if it.subtree_count == count {
                Action::PopAndStop
            } else {
                Action::None
            }
        })
    }

    /// Pops the top subtree if it was pushed as pending (reused, not yet
    /// validated against the new input).
    pub fn pop_pending(&mut self, version: Version) -> Vec<Slice> {
        let mut pop = self.iterate(version, true, |it| {
            if it.subtree_count >= 1 {
                if it.is_pending {
                    Action::PopAndStop
                } else {
                    Action::Stop
                }
            } else {
                Action::None
            }
        });
        if let Some(first) = pop.first_mut() {
            self.renumber_version(first.version, version);
            first.version = version;
        }
        pop
    }

    /// Pops an ERROR node sitting directly on top of the stack.
    pub fn pop_error(&mut self, version: Version) -> Vec<Subtree> {
        let has_error_link = self.heads[version]
            .node
            .links
            .borrow()
            .iter()
            .any(|l| l.subtree.as_ref().is_some_and(|t| t.is_error()));
        if !has_error_link {
            return Vec::new();
        }

        let mut found_error = false;
        let mut pop = self.iterate(version, true, |it| {
            if it.subtrees.is_empty() {
                Action::None
            } else if !found_error && it.subtrees[0].is_error() {
                found_error = true;
                Action::PopAndStop
            } else {
                Action::Stop
            }
        });
        match pop.first_mut() {
            Some(first) => {
                let slice_version = first.version;
                let subtrees = std::mem::take(&mut first.subtrees);
                self.renumber_version(slice_version, version);
                subtrees
            }
            None => Vec::new(),
        }
    }

    /// Pops everything down to the base of the stack.
    pub fn pop_all(&mut self, version: Version) -> Vec<Slice> {
        self.iterate(version, true, |it| {
            if it.node.links.borrow().is_empty() {
                Action::Pop
            } else {
                Action::None
            }
        })
    }

    /// Records the states reachable within `max_depth` subtrees of the head,
    /// for recovery to jump back to.
    pub fn record_summary(&mut self, version: Version, max_depth: u32) {
        let mut summary: Vec<SummaryEntry> = Vec::new();
        self.iterate(version, false, |it| {
            let state = it.node.state;
            let depth = it.subtree_count;
            if depth > max_depth {
                return Action::Stop;
            }
            for entry in summary.iter().rev() {
                if entry.depth < depth {
                    break;
                }
                if entry.depth == depth && entry.state == state {
                    return Action::None;
                }
            }
            summary.push(SummaryEntry {
                position: it.node.position,
                depth,
                state,
            });
            Action::None
        });
        self.heads[version].summary = Some(Rc::new(summary));
    }

    /// Renders every version and the shared node graph in DOT syntax.
    pub fn print_dot_graph(&self, language: &Language, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "digraph stack {{")?;
        writeln!(out, "rankdir=\"RL\";")?;
        writeln!(out, "edge [arrowhead=none]")?;

        let mut ids: HashMap<*const StackNode, usize> = HashMap::new();
        let mut queue: Vec<Rc<StackNode>> = Vec::new();
        fn id_of(
            node: &Rc<StackNode>,
            ids: &mut HashMap<*const StackNode, usize>,
            queue: &mut Vec<Rc<StackNode>>,
        ) -> usize {
            let next = ids.len();
            *ids.entry(Rc::as_ptr(node)).or_insert_with(|| {
                queue.push(Rc::clone(node));
                next
            })
        }

        for (i, head) in self.heads.iter().enumerate() {
            let color = match head.status {
                Status::Active => "",
                Status::Paused => ", color=red",
                Status::Halted => ", color=gray",
            };
            let id = id_of(&head.node, &mut ids, &mut queue);
            writeln!(out, "node_head_{i} [shape=none, label=\"\"]")?;
            writeln!(
                out,
                "node_head_{i} -> node_{id} [label={i}, fontcolor=blue, weight=10000, labeltooltip=\"node_count: {}\\nerror_cost: {}\"{color}]",
                head.node.node_count.get(),
                self.error_cost(i),
            )?;
        }

        let mut index = 0;
        while index < queue.len() {
            let node = Rc::clone(&queue[index]);
            index += 1;
            let id = ids[&Rc::as_ptr(&node)];
            let state = if node.state == ERROR_STATE {
                "?".to_owned()
            } else {
                node.state.to_string()
            };
            writeln!(
                out,
                "node_{id} [label=\"{state}\", tooltip=\"position: {},{}\\nnode_count: {}\\nerror_cost: {}\\ndynamic_precedence: {}\"];",
                node.position.extent.row,
                node.position.extent.column,
                node.node_count.get(),
                node.error_cost,
                node.dynamic_precedence.get(),
            )?;
            for link in node.links.borrow().iter() {
                let target = id_of(&link.node, &mut ids, &mut queue);
                write!(out, "node_{id} -> node_{target} [")?;
                if link.is_pending {
                    write!(out, "style=dashed ")?;
                }
                match &link.subtree {
                    Some(subtree) => {
                        let name = language.symbol_name_or_end(subtree.symbol);
                        write!(out, "label=\"{}\"", escape_dot(name))?;
                        if subtree.extra {
                            write!(out, " fontcolor=gray")?;
                        }
                    }
                    None => write!(out, "color=red")?,
                }
                writeln!(out, "];")?;
            }
        }

        writeln!(out, "}}")
    }
}
