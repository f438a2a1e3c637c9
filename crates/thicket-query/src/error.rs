use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet};

/// What made a query source invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    Syntax,
    /// A node type the language does not define.
    NodeType,
    /// A field name the language does not define.
    Field,
    /// A predicate refers to a capture its pattern never defines.
    Capture,
    /// Wrong predicate arity or argument types, or an invalid regex.
    Predicate,
    /// A construct used where it cannot match anything.
    Structure,
}

impl QueryErrorKind {
    fn title(self) -> &'static str {
        match self {
            QueryErrorKind::Syntax => "invalid syntax",
            QueryErrorKind::NodeType => "invalid node type",
            QueryErrorKind::Field => "invalid field",
            QueryErrorKind::Capture => "invalid capture",
            QueryErrorKind::Predicate => "invalid predicate",
            QueryErrorKind::Structure => "impossible pattern",
        }
    }
}

/// A query compilation failure, located in the query source.
///
/// `row` and `column` are zero-based; `column` counts bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} at {}:{}: {message}", .kind.title(), .row + 1, .column + 1)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub offset: usize,
    pub row: usize,
    pub column: usize,
    pub message: String,
    end: usize,
}

impl QueryError {
    pub(crate) fn new(
        kind: QueryErrorKind,
        source: &str,
        range: std::ops::Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        let offset = range.start.min(source.len());
        let before = &source[..offset];
        let row = before.matches('\n').count();
        let column = offset - before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            kind,
            offset,
            row,
            column,
            message: message.into(),
            end: range.end.max(offset),
        }
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end
    }

    /// Renders the error as an annotated snippet of `source`.
    pub fn render(&self, source: &str) -> String {
        let range = adjust_range(self.range(), source.len());
        let snippet = Snippet::source(source)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(range).label(&self.message));
        let report = vec![Level::ERROR.primary_title(self.kind.title()).element(snippet)];
        Renderer::plain().render(&report).to_string()
    }
}

/// Widens empty ranges to one character so the caret has something to point at.
fn adjust_range(range: std::ops::Range<usize>, limit: usize) -> std::ops::Range<usize> {
    if range.start == range.end {
        return range.start..(range.start + 1).min(limit);
    }
    range
}
