//! Deduplicated string table for capture names.
//!
//! A [`Name`] is the string's insertion index, so names compare and hash as
//! plain integers and index straight into per-capture arrays.

use indexmap::IndexSet;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Name(index as u32)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interner {
    table: IndexSet<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing name for `text`, or appends it.
    pub fn intern(&mut self, text: &str) -> Name {
        match self.table.get_index_of(text) {
            Some(index) => Name::from_index(index),
            None => Name::from_index(self.table.insert_full(text.into()).0),
        }
    }

    pub fn get(&self, text: &str) -> Option<Name> {
        self.table.get_index_of(text).map(Name::from_index)
    }

    /// # Panics
    /// If `name` came from another interner and is out of range.
    pub fn resolve(&self, name: Name) -> &str {
        &self.table[name.index()]
    }

    pub fn try_resolve(&self, name: Name) -> Option<&str> {
        self.table.get_index(name.index()).map(|text| &**text)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, &str)> {
        self.table
            .iter()
            .enumerate()
            .map(|(index, text)| (Name::from_index(index), &**text))
    }
}
