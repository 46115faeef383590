use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic as Report, Label, Severity};

use crate::position::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A directive comment whose body could not be decoded.
    MalformedDirective,
    /// A `@codeblock` directive not followed by a fenced code block.
    DanglingAnnotation,
    /// An annotated block with no file name of its own and none to inherit.
    UnresolvedFileName,
    /// A config directive after the first one.
    DuplicateConfig,
    /// A generated file whose path an earlier file already took.
    DuplicateOutput,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::MalformedDirective => "MalformedDirective",
            DiagnosticKind::DanglingAnnotation => "DanglingAnnotation",
            DiagnosticKind::UnresolvedFileName => "UnresolvedFileName",
            DiagnosticKind::DuplicateConfig => "DuplicateConfig",
            DiagnosticKind::DuplicateOutput => "DuplicateOutput",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found while parsing or generating, with its source location.
///
/// Diagnostics are collected, never raised; callers decide what is fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Range<usize>,
    pub range: SourceRange,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(
        kind: DiagnosticKind,
        message: impl Into<String>,
        span: Range<usize>,
        range: SourceRange,
    ) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span,
            range,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        message: impl Into<String>,
        span: Range<usize>,
        range: SourceRange,
    ) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(kind, message, span, range)
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Bug)
    }

    /// Convert to a codespan-reporting diagnostic for display.
    pub fn to_diagnostic<FileId: Copy>(&self, file_id: FileId) -> Report<FileId> {
        Report::new(self.severity)
            .with_code(self.kind.as_str())
            .with_message(&self.message)
            .with_labels(vec![Label::primary(file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.range.start, self.message, self.kind)
    }
}
