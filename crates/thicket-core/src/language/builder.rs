//! Assembles precomputed parse tables into a [`Language`].
//!
//! The builder does no grammar analysis: every state, action and lexer
//! edge is supplied by the caller. It only fills in the parts every table
//! shares: the recovery actions of the error state and the shift actions
//! for extras.

use indexmap::IndexMap;

use super::table::{
    FieldMapEntry, LanguageData, LexMode, LexTable, ParseAction, ParseStateData, Production,
    SymbolInfo, TableEntry,
};
use super::Language;
use crate::scanner::ExternalScannerFactory;
use crate::{ERROR_STATE, FieldId, LanguageError, StateId, Symbol};

pub struct LanguageBuilder {
    data: LanguageData,
    extras: Vec<Symbol>,
    saw_nonterminal: bool,
    out_of_order: Option<String>,
    scanner: Option<ExternalScannerFactory>,
}

impl LanguageBuilder {
    /// Starts a table with the `end` token, the reserved field slot, the
    /// empty production and the error state.
    pub fn new(name: impl Into<String>) -> Self {
        let data = LanguageData {
            name: name.into(),
            symbols: vec![SymbolInfo {
                name: "end".into(),
                visible: false,
                named: true,
                supertype: false,
            }],
            fields: vec![String::new()],
            token_count: 1,
            states: vec![ParseStateData::default()],
            productions: vec![Production::default()],
            external_lex_states: vec![Vec::new()],
            ..LanguageData::default()
        };
        Self {
            data,
            extras: Vec::new(),
            saw_nonterminal: false,
            out_of_order: None,
            scanner: None,
        }
    }

    fn push_symbol(&mut self, name: &str, visible: bool, named: bool) -> Symbol {
        let id = self.data.symbols.len() as Symbol;
        self.data.symbols.push(SymbolInfo {
            name: name.to_owned(),
            visible,
            named,
            supertype: false,
        });
        id
    }

    fn push_terminal(&mut self, name: &str, visible: bool, named: bool) -> Symbol {
        if self.saw_nonterminal && self.out_of_order.is_none() {
            self.out_of_order = Some(format!("terminal `{name}` declared after a nonterminal"));
        }
        let id = self.push_symbol(name, visible, named);
        self.data.token_count += 1;
        id
    }

    /// Declares a visible terminal. Named tokens show up as `(name)` in
    /// trees; anonymous ones are matched by their literal text.
    pub fn token(&mut self, name: &str, named: bool) -> Symbol {
        self.push_terminal(name, true, named)
    }

    pub fn hidden_token(&mut self, name: &str) -> Symbol {
        self.push_terminal(name, false, true)
    }

    /// Declares a terminal recognized by the external scanner. Its external
    /// index is its position among external tokens.
    pub fn external_token(&mut self, name: &str, named: bool) -> Symbol {
        let id = self.push_terminal(name, true, named);
        self.data.external_symbols.push(id);
        self.data.external_token_count += 1;
        id
    }

    pub fn nonterminal(&mut self, name: &str, visible: bool) -> Symbol {
        self.saw_nonterminal = true;
        self.push_symbol(name, visible, true)
    }

    /// Declares an alias-only symbol, used solely in alias sequences.
    pub fn alias(&mut self, name: &str, named: bool) -> Symbol {
        self.saw_nonterminal = true;
        self.push_symbol(name, true, named)
    }

    pub fn supertype(&mut self, name: &str) -> Symbol {
        let id = self.nonterminal(name, false);
        self.data.symbols[id as usize].supertype = true;
        id
    }

    pub fn field(&mut self, name: &str) -> FieldId {
        if let Some(i) = self.data.fields.iter().skip(1).position(|f| f == name) {
            return (i + 1) as FieldId;
        }
        self.data.fields.push(name.to_owned());
        (self.data.fields.len() - 1) as FieldId
    }

    /// Marks a terminal as allowed anywhere.
    pub fn extra(&mut self, symbol: Symbol) {
        if !self.extras.contains(&symbol) {
            self.extras.push(symbol);
        }
    }

    /// Adds a production with `(field, child_index)` pairs and
    /// `(child_index, alias)` pairs, returning its id.
    pub fn production(&mut self, fields: &[(FieldId, u16)], aliases: &[(u16, Symbol)]) -> u16 {
        let mut production = Production {
            alias_sequence: Vec::new(),
            fields: fields
                .iter()
                .map(|&(field_id, child_index)| FieldMapEntry {
                    field_id,
                    child_index,
                    inherited: false,
                })
                .collect(),
        };
        for &(index, alias) in aliases {
            let index = index as usize;
            if production.alias_sequence.len() <= index {
                production.alias_sequence.resize(index + 1, 0);
            }
            production.alias_sequence[index] = alias;
        }
        self.data.productions.push(production);
        (self.data.productions.len() - 1) as u16
    }

    /// Adds a field that surfaces from inside a hidden child.
    pub fn inherited_field(&mut self, production_id: u16, field_id: FieldId, child_index: u16) {
        if let Some(p) = self.data.productions.get_mut(production_id as usize) {
            p.fields.push(FieldMapEntry {
                field_id,
                child_index,
                inherited: true,
            });
        }
    }

    pub fn add_state(&mut self, lex_mode: LexMode) -> StateId {
        self.data.states.push(ParseStateData {
            lex_mode,
            ..ParseStateData::default()
        });
        (self.data.states.len() - 1) as StateId
    }

    /// Adds `count` states sharing a lex mode; returns the first id.
    pub fn add_states(&mut self, count: usize, lex_mode: LexMode) -> StateId {
        let first = self.data.states.len() as StateId;
        for _ in 0..count {
            self.add_state(lex_mode);
        }
        first
    }

    pub fn set_lex_mode(&mut self, state: StateId, lex_mode: LexMode) {
        if let Some(s) = self.data.states.get_mut(state as usize) {
            s.lex_mode = lex_mode;
        }
    }

    pub fn action(&mut self, state: StateId, lookahead: Symbol, action: ParseAction) {
        let Some(s) = self.data.states.get_mut(state as usize) else {
            self.out_of_order
                .get_or_insert_with(|| format!("action for missing state {state}"));
            return;
        };
        s.actions
            .entry(lookahead)
            .or_insert_with(|| TableEntry {
                actions: Vec::new(),
                reusable: true,
            })
            .actions
            .push(action);
    }

    pub fn shift(&mut self, state: StateId, lookahead: Symbol, next: StateId) {
        self.action(
            state,
            lookahead,
            ParseAction::Shift {
                state: next,
                extra: false,
                repetition: false,
            },
        );
    }

    pub fn shift_repetition(&mut self, state: StateId, lookahead: Symbol, next: StateId) {
        self.action(
            state,
            lookahead,
            ParseAction::Shift {
                state: next,
                extra: false,
                repetition: true,
            },
        );
    }

    pub fn reduce(
        &mut self,
        state: StateId,
        lookahead: Symbol,
        symbol: Symbol,
        child_count: u16,
        production_id: u16,
    ) {
        self.reduce_with_precedence(state, lookahead, symbol, child_count, production_id, 0);
    }

    pub fn reduce_with_precedence(
        &mut self,
        state: StateId,
        lookahead: Symbol,
        symbol: Symbol,
        child_count: u16,
        production_id: u16,
        dynamic_precedence: i16,
    ) {
        self.action(
            state,
            lookahead,
            ParseAction::Reduce {
                symbol,
                child_count,
                dynamic_precedence,
                production_id,
            },
        );
    }

    pub fn accept(&mut self, state: StateId, lookahead: Symbol) {
        self.action(state, lookahead, ParseAction::Accept);
    }

    /// Forbids reusing old subtrees in `state` when `lookahead` follows.
    pub fn non_reusable(&mut self, state: StateId, lookahead: Symbol) {
        if let Some(entry) = self
            .data
            .states
            .get_mut(state as usize)
            .and_then(|s| s.actions.get_mut(&lookahead))
        {
            entry.reusable = false;
        }
    }

    pub fn goto(&mut self, state: StateId, symbol: Symbol, next: StateId) {
        if let Some(s) = self.data.states.get_mut(state as usize) {
            s.gotos.insert(symbol, next);
        }
    }

    pub fn lex_table(&mut self, table: LexTable) {
        self.data.lex_table = table;
    }

    /// Installs the keyword lexer and the word token it refines.
    pub fn keywords(&mut self, table: LexTable, word_token: Symbol) {
        self.data.keyword_lex_table = Some(table);
        self.data.keyword_capture_token = Some(word_token);
    }

    /// Adds an external lex state enabling the given external tokens (by
    /// external index) and returns its id.
    pub fn external_lex_state(&mut self, valid: Vec<bool>) -> u16 {
        self.data.external_lex_states.push(valid);
        (self.data.external_lex_states.len() - 1) as u16
    }

    pub fn external_scanner(&mut self, factory: ExternalScannerFactory) {
        self.scanner = Some(factory);
    }

    /// Finishes the table without building a [`Language`].
    pub fn finish(mut self) -> Result<(LanguageData, Option<ExternalScannerFactory>), LanguageError> {
        if let Some(message) = self.out_of_order.take() {
            return Err(LanguageError::Malformed(message));
        }
        self.fill_error_state();
        self.fill_extras();
        Ok((self.data, self.scanner))
    }

    pub fn build(self) -> Result<Language, LanguageError> {
        let (data, scanner) = self.finish()?;
        let language = Language::new(data)?;
        Ok(match scanner {
            Some(factory) => language.with_external_scanner(factory),
            None => language,
        })
    }

    fn fill_error_state(&mut self) {
        let token_count = self.data.token_count;
        let error_state = &mut self.data.states[ERROR_STATE as usize];
        let mut actions = IndexMap::new();
        for symbol in 0..token_count {
            actions.insert(
                symbol,
                TableEntry {
                    actions: vec![ParseAction::Recover],
                    reusable: false,
                },
            );
        }
        error_state.actions = actions;
    }

    fn fill_extras(&mut self) {
        for (index, state) in self.data.states.iter_mut().enumerate() {
            for &extra in &self.extras {
                let shift = ParseAction::Shift {
                    state: index as StateId,
                    extra: true,
                    repetition: false,
                };
                let entry = state.actions.entry(extra).or_insert_with(|| TableEntry {
                    actions: Vec::new(),
                    reusable: true,
                });
                if index as StateId == ERROR_STATE {
                    entry.actions = vec![shift];
                } else if entry.actions.is_empty() {
                    entry.actions.push(shift);
                }
            }
        }
    }
}
