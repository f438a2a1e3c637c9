//! Flat, pre-order index of the visible nodes of a tree.
//!
//! Built once per [`Tree`](crate::Tree) on first navigation. Each entry
//! records its parent, its visible children, its absolute start and the
//! field that attaches it to its parent, so node navigation never walks
//! the subtree structure again.

use std::ops::Range;

use thicket_core::{FieldId, Language, Length, Symbol};

use crate::subtree::Subtree;

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub subtree: Subtree,
    /// Symbol after aliasing, before public-symbol mapping.
    pub symbol: Symbol,
    pub named: bool,
    /// Absolute position of the first byte, after padding.
    pub start: Length,
    pub parent: Option<u32>,
    pub children: Range<u32>,
    /// Position among the parent's visible children.
    pub child_index: u32,
    pub field_id: FieldId,
    pub depth: u32,
    /// Pre-order index one past the last descendant.
    pub descendant_end: u32,
}

impl Entry {
    #[inline]
    pub fn end(&self) -> Length {
        self.start.add(self.subtree.size)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    pub entries: Vec<Entry>,
    pub children: Vec<u32>,
}

struct Frame {
    subtree: Subtree,
    position: Length,
    alias: Symbol,
    /// Arena index of the closest emitted ancestor.
    parent: Option<u32>,
    field_id: FieldId,
    depth: u32,
}

impl Arena {
    pub fn build(root: &Subtree, language: &Language) -> Arena {
        let mut entries: Vec<Entry> = Vec::with_capacity(root.visible_descendant_count as usize + 1);
        let mut stack = vec![Frame {
            subtree: root.clone(),
            position: Length::ZERO,
            alias: 0,
            parent: None,
            field_id: 0,
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            let subtree = frame.subtree;
            let start = frame.position.add(subtree.padding);
            let emitted = frame.parent.is_none() || frame.alias != 0 || subtree.visible;

            let (parent, depth) = if emitted {
                let symbol = if frame.alias != 0 { frame.alias } else { subtree.symbol };
                let named = if frame.alias != 0 {
                    language.node_kind_is_named(frame.alias)
                } else {
                    subtree.named
                };
                let index = entries.len() as u32;
                entries.push(Entry {
                    subtree: subtree.clone(),
                    symbol,
                    named,
                    start,
                    parent: frame.parent,
                    children: 0..0,
                    child_index: 0,
                    field_id: frame.field_id,
                    depth: frame.depth,
                    descendant_end: 0,
                });
                (Some(index), frame.depth + 1)
            } else {
                (frame.parent, frame.depth)
            };

            // Hidden nodes pass their field down to descendants that have none.
            let inherited_field = if emitted { 0 } else { frame.field_id };

            let mut position = frame.position;
            let mut structural_index = 0usize;
            let mut pending = Vec::with_capacity(subtree.children.len());
            for child in &subtree.children {
                let (alias, field_id) = if child.extra {
                    (0, 0)
                } else {
                    let alias = language.alias_at(subtree.production_id, structural_index);
                    let own = language
                        .field_map(subtree.production_id)
                        .iter()
                        .find(|e| !e.inherited && e.child_index as usize == structural_index)
                        .map_or(0, |e| e.field_id);
                    structural_index += 1;
                    (alias, if own != 0 { own } else { inherited_field })
                };
                pending.push(Frame {
                    subtree: child.clone(),
                    position,
                    alias,
                    parent,
                    field_id,
                    depth,
                });
                position = position.add(child.total_size());
            }
            stack.extend(pending.into_iter().rev());
        }

        link(entries)
    }

    #[inline]
    pub fn entry(&self, index: u32) -> &Entry {
        &self.entries[index as usize]
    }

    #[inline]
    pub fn children_of(&self, index: u32) -> &[u32] {
        let range = &self.entry(index).children;
        &self.children[range.start as usize..range.end as usize]
    }
}

/// Fills child ranges, sibling indices and descendant extents.
fn link(mut entries: Vec<Entry>) -> Arena {
    let n = entries.len();
    let mut counts = vec![0u32; n];
    for entry in &entries {
        if let Some(p) = entry.parent {
            counts[p as usize] += 1;
        }
    }

    let mut offset = 0u32;
    let mut cursor = vec![0u32; n];
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.children = offset..offset + counts[i];
        cursor[i] = offset;
        offset += counts[i];
    }

    let mut children = vec![0u32; offset as usize];
    for i in 0..n {
        if let Some(p) = entries[i].parent {
            let p = p as usize;
            let slot = cursor[p];
            let first = entries[p].children.start;
            children[slot as usize] = i as u32;
            entries[i].child_index = slot - first;
            cursor[p] += 1;
        }
    }

    // Children always follow their parent in pre-order.
    for i in (0..n).rev() {
        let end = entries[i]
            .children
            .clone()
            .map(|c| entries[children[c as usize] as usize].descendant_end)
            .max()
            .unwrap_or(i as u32 + 1);
        entries[i].descendant_end = end;
    }

    Arena { entries, children }
}
