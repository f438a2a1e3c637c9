//! The grammar table consumed by the parser.
//!
//! A [`Language`] is an immutable, reference-counted view over
//! [`LanguageData`]. Cloning is cheap, and the same table can back any
//! number of parsers on any number of threads.

mod artifact;
mod builder;
mod lookahead;
mod table;

#[cfg(test)]
mod artifact_tests;
#[cfg(test)]
mod builder_tests;
#[cfg(test)]
mod lookahead_tests;

use std::fmt;
use std::sync::Arc;

pub use builder::LanguageBuilder;
pub use lookahead::LookaheadIterator;
pub use table::{
    FieldMapEntry, LanguageData, LexMode, LexState, LexTable, LexTransition, ParseAction,
    ParseStateData, Production, SymbolInfo, TableEntry,
};

use crate::scanner::{ExternalScanner, ExternalScannerFactory};
use crate::{
    FieldId, LANGUAGE_VERSION, LanguageError, SYMBOL_END, SYMBOL_ERROR, SYMBOL_ERROR_REPEAT,
    StateId, Symbol,
};

static EMPTY_ENTRY: TableEntry = TableEntry {
    actions: Vec::new(),
    reusable: false,
};

#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

struct LanguageInner {
    data: LanguageData,
    version: u32,
    /// Canonical id per symbol: the first visible symbol sharing its name and namedness.
    public_symbols: Vec<Symbol>,
    scanner: Option<ExternalScannerFactory>,
}

impl Language {
    /// Wraps already validated tables.
    pub fn new(data: LanguageData) -> Result<Self, LanguageError> {
        Self::with_version(data, LANGUAGE_VERSION)
    }

    pub(crate) fn with_version(data: LanguageData, version: u32) -> Result<Self, LanguageError> {
        data.validate().map_err(LanguageError::Malformed)?;
        let public_symbols = compute_public_symbols(&data.symbols);
        Ok(Self(Arc::new(LanguageInner {
            data,
            version,
            public_symbols,
            scanner: None,
        })))
    }

    /// Returns a new language sharing these tables but using `factory` for
    /// external tokens. The result is a distinct language.
    pub fn with_external_scanner(&self, factory: ExternalScannerFactory) -> Self {
        Self(Arc::new(LanguageInner {
            data: self.0.data.clone(),
            version: self.0.version,
            public_symbols: self.0.public_symbols.clone(),
            scanner: Some(factory),
        }))
    }

    pub fn data(&self) -> &LanguageData {
        &self.0.data
    }

    pub fn name(&self) -> &str {
        &self.0.data.name
    }

    /// ABI version of the artifact the tables came from.
    pub fn version(&self) -> u32 {
        self.0.version
    }

    pub fn node_kind_count(&self) -> usize {
        self.0.data.symbols.len()
    }

    pub fn parse_state_count(&self) -> usize {
        self.0.data.states.len()
    }

    pub fn field_count(&self) -> usize {
        self.0.data.fields.len().saturating_sub(1)
    }

    pub fn token_count(&self) -> u16 {
        self.0.data.token_count
    }

    pub fn external_token_count(&self) -> u16 {
        self.0.data.external_token_count
    }

    pub fn node_kind_for_id(&self, id: Symbol) -> Option<&str> {
        match id {
            SYMBOL_ERROR => Some("ERROR"),
            SYMBOL_ERROR_REPEAT => Some("_ERROR"),
            _ => self.0.data.symbols.get(id as usize).map(|s| s.name.as_str()),
        }
    }

    /// Finds the public symbol with this name. Hidden symbols never match.
    pub fn id_for_node_kind(&self, name: &str, named: bool) -> Option<Symbol> {
        if name == "ERROR" && named {
            return Some(SYMBOL_ERROR);
        }
        self.0
            .data
            .symbols
            .iter()
            .position(|s| s.visible && s.named == named && s.name == name)
            .map(|i| self.0.public_symbols[i])
    }

    pub fn node_kind_is_named(&self, id: Symbol) -> bool {
        match id {
            SYMBOL_ERROR => true,
            SYMBOL_ERROR_REPEAT => false,
            _ => self.0.data.symbols.get(id as usize).is_some_and(|s| s.named),
        }
    }

    pub fn node_kind_is_visible(&self, id: Symbol) -> bool {
        match id {
            SYMBOL_ERROR => true,
            SYMBOL_ERROR_REPEAT => false,
            _ => self.0.data.symbols.get(id as usize).is_some_and(|s| s.visible),
        }
    }

    pub fn node_kind_is_supertype(&self, id: Symbol) -> bool {
        self.0
            .data
            .symbols
            .get(id as usize)
            .is_some_and(|s| s.supertype)
    }

    /// Maps a symbol to the id queries and nodes report for it.
    pub fn public_symbol(&self, id: Symbol) -> Symbol {
        match id {
            SYMBOL_ERROR | SYMBOL_ERROR_REPEAT => id,
            _ => self.0.public_symbols.get(id as usize).copied().unwrap_or(id),
        }
    }

    pub fn field_name_for_id(&self, id: FieldId) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.0.data.fields.get(id as usize).map(String::as_str)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.0
            .data
            .fields
            .iter()
            .skip(1)
            .position(|f| f == name)
            .map(|i| (i + 1) as FieldId)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol < self.0.data.token_count
    }

    pub fn table_entry(&self, state: StateId, symbol: Symbol) -> &TableEntry {
        if symbol == SYMBOL_ERROR || symbol == SYMBOL_ERROR_REPEAT {
            return &EMPTY_ENTRY;
        }
        self.0
            .data
            .states
            .get(state as usize)
            .and_then(|s| s.actions.get(&symbol))
            .unwrap_or(&EMPTY_ENTRY)
    }

    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        &self.table_entry(state, symbol).actions
    }

    pub fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        !self.actions(state, symbol).is_empty()
    }

    pub fn has_reduce_action(&self, state: StateId, symbol: Symbol) -> bool {
        matches!(
            self.actions(state, symbol).first(),
            Some(ParseAction::Reduce { .. })
        )
    }

    /// The state reached from `state` by consuming `symbol`, or `0` when
    /// there is none.
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> StateId {
        if symbol == SYMBOL_ERROR || symbol == SYMBOL_ERROR_REPEAT {
            return 0;
        }
        if self.is_terminal(symbol) {
            match self.actions(state, symbol).last() {
                Some(ParseAction::Shift { extra: true, .. }) => state,
                Some(ParseAction::Shift { state: next, .. }) => *next,
                _ => 0,
            }
        } else {
            self.0
                .data
                .states
                .get(state as usize)
                .and_then(|s| s.gotos.get(&symbol).copied())
                .unwrap_or(0)
        }
    }

    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.0
            .data
            .states
            .get(state as usize)
            .map(|s| s.lex_mode)
            .unwrap_or_default()
    }

    pub fn alias_sequence(&self, production_id: u16) -> &[Symbol] {
        self.0
            .data
            .productions
            .get(production_id as usize)
            .map(|p| p.alias_sequence.as_slice())
            .unwrap_or(&[])
    }

    /// Alias for the child at `child_index`, or `0` when not aliased.
    pub fn alias_at(&self, production_id: u16, child_index: usize) -> Symbol {
        self.alias_sequence(production_id)
            .get(child_index)
            .copied()
            .unwrap_or(0)
    }

    pub fn field_map(&self, production_id: u16) -> &[FieldMapEntry] {
        self.0
            .data
            .productions
            .get(production_id as usize)
            .map(|p| p.fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn lex_table(&self) -> &LexTable {
        &self.0.data.lex_table
    }

    pub fn keyword_lex_table(&self) -> Option<&LexTable> {
        self.0.data.keyword_lex_table.as_ref()
    }

    pub fn keyword_capture_token(&self) -> Option<Symbol> {
        self.0.data.keyword_capture_token
    }

    pub fn external_symbol(&self, external_index: u16) -> Option<Symbol> {
        self.0
            .data
            .external_symbols
            .get(external_index as usize)
            .copied()
    }

    /// The valid-token mask for an external lex state.
    pub fn enabled_external_tokens(&self, external_lex_state: u16) -> Option<&[bool]> {
        if external_lex_state == 0 {
            return None;
        }
        self.0
            .data
            .external_lex_states
            .get(external_lex_state as usize)
            .map(Vec::as_slice)
    }

    pub fn has_external_scanner(&self) -> bool {
        self.0.scanner.is_some()
    }

    pub fn create_external_scanner(&self) -> Option<Box<dyn ExternalScanner>> {
        self.0.scanner.as_ref().map(|factory| factory())
    }

    /// Iterates the symbols valid in `state`, or `None` if the state does not exist.
    pub fn lookahead_iterator(&self, state: StateId) -> Option<LookaheadIterator> {
        LookaheadIterator::new(self.clone(), state)
    }

    pub fn symbol_name_or_end(&self, symbol: Symbol) -> &str {
        if symbol == SYMBOL_END {
            return "end";
        }
        self.node_kind_for_id(symbol).unwrap_or("?")
    }
}

fn compute_public_symbols(symbols: &[SymbolInfo]) -> Vec<Symbol> {
    symbols
        .iter()
        .enumerate()
        .map(|(i, info)| {
            symbols
                .iter()
                .position(|other| {
                    other.visible && other.named == info.named && other.name == info.name
                })
                .filter(|_| info.visible)
                .map_or(i as Symbol, |p| p as Symbol)
        })
        .collect()
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("symbols", &self.node_kind_count())
            .field("states", &self.parse_state_count())
            .finish()
    }
}
