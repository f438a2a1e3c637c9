//! Serializable grammar tables.
//!
//! These are produced ahead of time by grammar tooling and only read by the
//! engine. Symbols are laid out as: end (`0`), terminals, external tokens,
//! nonterminals. The builtin error symbols live at the top of the id space
//! and have no entry in [`LanguageData::symbols`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{FieldId, StateId, Symbol};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub visible: bool,
    pub named: bool,
    pub supertype: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseAction {
    Shift {
        state: StateId,
        /// The token is an extra; the parser stays in its current state.
        extra: bool,
        /// The shift belongs to a repetition and may be ambiguous.
        repetition: bool,
    },
    Reduce {
        symbol: Symbol,
        child_count: u16,
        dynamic_precedence: i16,
        production_id: u16,
    },
    Accept,
    Recover,
}

/// All actions for one (state, lookahead) pair. More than one action is a
/// conflict the parser resolves by forking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub actions: Vec<ParseAction>,
    /// Whether a previously parsed subtree may be reused with this lookahead.
    pub reusable: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LexMode {
    pub lex_state: u16,
    /// Index into [`LanguageData::external_lex_states`]; `0` disables the external scanner.
    pub external_lex_state: u16,
}

impl LexMode {
    pub const fn new(lex_state: u16, external_lex_state: u16) -> Self {
        Self {
            lex_state,
            external_lex_state,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStateData {
    pub lex_mode: LexMode,
    /// Terminal lookahead to actions.
    pub actions: IndexMap<Symbol, TableEntry>,
    /// Nonterminal to successor state.
    pub gotos: IndexMap<Symbol, StateId>,
}

/// An edge of the lexer DFA. Ranges are inclusive character codes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexTransition {
    pub ranges: Vec<(u32, u32)>,
    pub next: u16,
    /// The consumed character is whitespace-like padding.
    pub skip: bool,
}

impl LexTransition {
    pub fn matches(&self, c: char) -> bool {
        let c = c as u32;
        self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexState {
    pub accept: Option<Symbol>,
    pub transitions: Vec<LexTransition>,
}

impl LexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, symbol: Symbol) -> Self {
        self.accept = Some(symbol);
        self
    }

    /// Adds an edge consuming any character in `ranges`.
    pub fn on(mut self, ranges: &[(char, char)], next: u16) -> Self {
        self.transitions.push(LexTransition {
            ranges: to_codes(ranges),
            next,
            skip: false,
        });
        self
    }

    /// Adds an edge that consumes padding.
    pub fn skip(mut self, ranges: &[(char, char)], next: u16) -> Self {
        self.transitions.push(LexTransition {
            ranges: to_codes(ranges),
            next,
            skip: true,
        });
        self
    }

    pub fn transition_for(&self, c: char) -> Option<&LexTransition> {
        self.transitions.iter().find(|t| t.matches(c))
    }
}

fn to_codes(ranges: &[(char, char)]) -> Vec<(u32, u32)> {
    ranges.iter().map(|&(lo, hi)| (lo as u32, hi as u32)).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexTable {
    pub states: Vec<LexState>,
}

impl LexTable {
    pub fn new(states: Vec<LexState>) -> Self {
        Self { states }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapEntry {
    pub field_id: FieldId,
    pub child_index: u16,
    /// The field is declared on a hidden child and surfaces through it.
    pub inherited: bool,
}

/// Per-production metadata shared by every node reduced with it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// Alias per structural child; `0` means "not aliased".
    pub alias_sequence: Vec<Symbol>,
    pub fields: Vec<FieldMapEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageData {
    pub name: String,
    pub symbols: Vec<SymbolInfo>,
    /// Field names; index `0` is reserved.
    pub fields: Vec<String>,
    /// Number of terminals, including external tokens and `end`.
    pub token_count: u16,
    pub external_token_count: u16,
    pub states: Vec<ParseStateData>,
    pub productions: Vec<Production>,
    pub lex_table: LexTable,
    pub keyword_lex_table: Option<LexTable>,
    /// The word token keywords are extracted from.
    pub keyword_capture_token: Option<Symbol>,
    /// External token index to symbol.
    pub external_symbols: Vec<Symbol>,
    /// Valid-token masks handed to the external scanner; entry `0` is unused.
    pub external_lex_states: Vec<Vec<bool>>,
}

impl LanguageData {
    /// Checks that every id the tables mention is in range.
    pub fn validate(&self) -> Result<(), String> {
        let symbol_count = self.symbols.len();
        let state_count = self.states.len();
        let token_count = self.token_count as usize;

        if symbol_count == 0 || self.symbols[0].visible {
            return Err("symbol 0 must be the hidden end token".into());
        }
        if token_count > symbol_count {
            return Err(format!(
                "token count {token_count} exceeds symbol count {symbol_count}"
            ));
        }
        if (self.external_token_count as usize) != self.external_symbols.len() {
            return Err("external token count does not match external symbol map".into());
        }
        if state_count < 2 {
            return Err("tables need an error state and a start state".into());
        }
        if self.fields.is_empty() {
            return Err("field 0 must be reserved".into());
        }

        let check_symbol = |s: Symbol| -> Result<(), String> {
            if (s as usize) < symbol_count {
                Ok(())
            } else {
                Err(format!("symbol {s} out of range"))
            }
        };
        let check_state = |s: StateId| -> Result<(), String> {
            if (s as usize) < state_count {
                Ok(())
            } else {
                Err(format!("state {s} out of range"))
            }
        };

        for &s in &self.external_symbols {
            check_symbol(s)?;
            if s as usize >= token_count {
                return Err(format!("external symbol {s} is not a terminal"));
            }
        }

        for (index, state) in self.states.iter().enumerate() {
            if state.lex_mode.lex_state as usize >= self.lex_table.states.len() {
                return Err(format!("state {index} uses a missing lex state"));
            }
            if state.lex_mode.external_lex_state != 0
                && state.lex_mode.external_lex_state as usize >= self.external_lex_states.len()
            {
                return Err(format!("state {index} uses a missing external lex state"));
            }
            for (&symbol, entry) in &state.actions {
                check_symbol(symbol)?;
                if symbol as usize >= token_count {
                    return Err(format!("state {index} has actions on nonterminal {symbol}"));
                }
                for action in &entry.actions {
                    match *action {
                        ParseAction::Shift { state, .. } => check_state(state)?,
                        ParseAction::Reduce {
                            symbol,
                            production_id,
                            ..
                        } => {
                            check_symbol(symbol)?;
                            if production_id as usize >= self.productions.len() {
                                return Err(format!("production {production_id} out of range"));
                            }
                        }
                        ParseAction::Accept | ParseAction::Recover => {}
                    }
                }
            }
            for (&symbol, &next) in &state.gotos {
                check_symbol(symbol)?;
                check_state(next)?;
            }
        }

        for production in &self.productions {
            for entry in &production.fields {
                if entry.field_id == 0 || entry.field_id as usize >= self.fields.len() {
                    return Err(format!("field {} out of range", entry.field_id));
                }
            }
        }

        let tables = std::iter::once(&self.lex_table).chain(self.keyword_lex_table.as_ref());
        for table in tables {
            for state in &table.states {
                if let Some(accept) = state.accept {
                    check_symbol(accept)?;
                }
                for t in &state.transitions {
                    if t.next as usize >= table.states.len() {
                        return Err(format!("lex transition to missing state {}", t.next));
                    }
                }
            }
        }

        if let Some(word) = self.keyword_capture_token {
            check_symbol(word)?;
            if self.keyword_lex_table.is_none() {
                return Err("word token declared without a keyword lexer".into());
            }
        }

        Ok(())
    }
}
