use std::io;

/// Which stage of the parser produced a log message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogType {
    Parse,
    Lex,
}

/// Host sink for the parser's step-by-step trace.
pub type Logger = Box<dyn FnMut(LogType, &str) + Send>;

/// Writes a parse message as a one-node graph so it shows up between the
/// stack graphs in a DOT viewer.
pub(crate) fn write_dot_label(out: &mut dyn io::Write, message: &str) -> io::Result<()> {
    write!(out, "graph {{\nlabel=\"")?;
    for c in message.chars() {
        if c == '"' || c == '\\' {
            write!(out, "\\")?;
        }
        write!(out, "{c}")?;
    }
    write!(out, "\"\n}}\n\n")
}
