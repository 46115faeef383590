pub mod annotation;
pub mod document;
pub mod parser;
pub mod position;

pub use annotation::{AdditionalFile, Annotation, Config, DecodeError, ReplaceRule};
pub use document::{CodeBlockNode, ConfigNode, Document, DocumentNode, TextNode};
pub use parser::{Diagnostic, DiagnosticKind, ParseOutput, Parser};
pub use position::{LineIndex, Position, SourceRange};

/// Parse Markdown `text` read from `source_path`.
pub fn parse(text: &str, source_path: &str) -> ParseOutput {
    Parser::new(text, source_path).parse()
}
