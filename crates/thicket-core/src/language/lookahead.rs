use super::Language;
use crate::{StateId, Symbol};

/// Iterates the symbols that have an action or goto in one parse state.
///
/// Terminals come first in id order, then nonterminals.
#[derive(Clone, Debug)]
pub struct LookaheadIterator {
    language: Language,
    state: StateId,
    symbols: Vec<Symbol>,
    position: usize,
}

impl LookaheadIterator {
    pub(super) fn new(language: Language, state: StateId) -> Option<Self> {
        let symbols = collect(&language, state)?;
        Some(Self {
            language,
            state,
            symbols,
            position: 0,
        })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    /// The symbol most recently yielded.
    pub fn current_symbol(&self) -> Option<Symbol> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.symbols.get(i).copied())
    }

    pub fn current_symbol_name(&self) -> Option<&str> {
        self.current_symbol()
            .and_then(|s| self.language.node_kind_for_id(s))
    }

    /// Restarts at another state of the same language.
    pub fn reset_state(&mut self, state: StateId) -> bool {
        let Some(symbols) = collect(&self.language, state) else {
            return false;
        };
        self.state = state;
        self.symbols = symbols;
        self.position = 0;
        true
    }

    /// Restarts at a state of a different language.
    pub fn reset(&mut self, language: Language, state: StateId) -> bool {
        let Some(symbols) = collect(&language, state) else {
            return false;
        };
        self.language = language;
        self.state = state;
        self.symbols = symbols;
        self.position = 0;
        true
    }

    /// Consumes the remaining symbols as names.
    pub fn iter_names(self) -> impl Iterator<Item = String> {
        let language = self.language.clone();
        self.map(move |s| language.symbol_name_or_end(s).to_owned())
    }
}

impl Iterator for LookaheadIterator {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        let symbol = self.symbols.get(self.position).copied()?;
        self.position += 1;
        Some(symbol)
    }
}

fn collect(language: &Language, state: StateId) -> Option<Vec<Symbol>> {
    let data = language.data().states.get(state as usize)?;
    let mut terminals: Vec<Symbol> = data
        .actions
        .iter()
        .filter(|(_, entry)| !entry.actions.is_empty())
        .map(|(&s, _)| s)
        .collect();
    terminals.sort_unstable();
    let mut nonterminals: Vec<Symbol> = data.gotos.keys().copied().collect();
    nonterminals.sort_unstable();
    terminals.extend(nonterminals);
    Some(terminals)
}
