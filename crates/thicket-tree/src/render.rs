//! Textual renderings of trees: S-expressions and graphviz DOT.

use std::fmt::Write as _;
use std::io;

use thicket_core::{Language, Length};

use crate::node::Node;
use crate::subtree::Subtree;
use crate::tree::Tree;

pub(crate) fn to_sexp(node: Node<'_>) -> String {
    let mut out = String::new();
    write_sexp(&mut out, node, None, true);
    out
}

fn write_sexp(out: &mut String, node: Node<'_>, field: Option<&str>, is_root: bool) {
    let subtree = &node.entry().subtree;
    let printed = is_root || node.is_named() || node.is_missing();

    if printed {
        if !is_root {
            out.push(' ');
            if let Some(field) = field {
                out.push_str(field);
                out.push_str(": ");
            }
        }
        if subtree.is_error() && subtree.children.is_empty() && subtree.size.bytes > 0 {
            match subtree.lookahead_char {
                Some(c) => {
                    let _ = write!(out, "(UNEXPECTED '{}'", c.escape_default());
                }
                None => out.push_str("(UNEXPECTED EOF"),
            }
        } else if node.is_missing() {
            if node.is_named() {
                let _ = write!(out, "(MISSING {}", node.kind());
            } else {
                let _ = write!(out, "(MISSING \"{}\"", node.kind().escape_default());
            }
        } else {
            out.push('(');
            out.push_str(node.kind());
        }
    }

    let language = node.tree().language();
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { break };
        let field = language.field_name_for_id(child.entry().field_id);
        write_sexp(out, child, field, false);
    }

    if printed {
        out.push(')');
    }
}

pub(crate) fn write_dot_graph(tree: &Tree, out: &mut dyn io::Write) -> io::Result<()> {
    write_subtree_dot_graph(tree.root_subtree(), tree.language(), out)
}

/// Renders a bare subtree, including hidden nodes, as a DOT digraph.
pub fn write_subtree_dot_graph(
    subtree: &Subtree,
    language: &Language,
    out: &mut dyn io::Write,
) -> io::Result<()> {
    writeln!(out, "digraph tree {{")?;
    writeln!(out, "edge [arrowhead=none]")?;
    let mut next_id = 0usize;
    write_dot_subtree(out, subtree, language, Length::ZERO, 0, None, &mut next_id)?;
    writeln!(out, "}}")
}

/// Escapes a label for use inside a double-quoted DOT string.
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_dot_subtree(
    out: &mut dyn io::Write,
    subtree: &Subtree,
    language: &Language,
    position: Length,
    alias: u16,
    parent: Option<usize>,
    next_id: &mut usize,
) -> io::Result<()> {
    let id = *next_id;
    *next_id += 1;

    let symbol = if alias != 0 { alias } else { subtree.symbol };
    let name = language.symbol_name_or_end(symbol);
    let start = position.add(subtree.padding);
    let end = start.add(subtree.size);

    write!(out, "tree_{id} [label=\"{}\"", escape_dot(name))?;
    if subtree.children.is_empty() {
        write!(out, ", shape=plaintext")?;
    }
    if subtree.extra {
        write!(out, ", fontcolor=gray")?;
    }
    if !subtree.visible && alias == 0 {
        write!(out, ", style=dashed")?;
    }
    writeln!(
        out,
        ", tooltip=\"range: {} - {}\\nstate: {}\\nerror-cost: {}\\nhas-changes: {}\\ndescendant-count: {}\\nrepeat-depth: {}\\nlookahead-bytes: {}\"]",
        start.bytes,
        end.bytes,
        subtree.parse_state,
        subtree.error_cost(),
        subtree.has_changes,
        subtree.visible_descendant_count,
        subtree.repeat_depth,
        subtree.lookahead_bytes,
    )?;
    if let Some(parent) = parent {
        writeln!(out, "tree_{parent} -> tree_{id}")?;
    }

    let mut child_position = position;
    let mut structural_index = 0usize;
    for child in &subtree.children {
        let child_alias = if child.extra {
            0
        } else {
            let a = language.alias_at(subtree.production_id, structural_index);
            structural_index += 1;
            a
        };
        write_dot_subtree(
            out,
            child,
            language,
            child_position,
            child_alias,
            Some(id),
            next_id,
        )?;
        child_position = child_position.add(child.total_size());
    }
    Ok(())
}
