mod builder;
pub mod error;
mod scanner;

pub use error::{Diagnostic, DiagnosticKind};

use crate::document::Document;

/// A parsed document together with everything found wrong while parsing it.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Parser entry point.
pub struct Parser {
    source: String,
    source_path: String,
}

impl Parser {
    pub fn new(source: impl Into<String>, source_path: impl Into<String>) -> Self {
        Parser {
            source: source.into(),
            source_path: source_path.into(),
        }
    }

    /// Parse the source Markdown into a document.
    ///
    /// Never fails: malformed directives degrade to text and are reported.
    pub fn parse(&self) -> ParseOutput {
        let items = scanner::scan(&self.source);
        let (document, diagnostics) = builder::build(&self.source, &self.source_path, items);
        tracing::debug!(
            path = %self.source_path,
            nodes = document.nodes.len(),
            diagnostics = diagnostics.len(),
            "parsed document"
        );
        ParseOutput {
            document,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentNode;
    use crate::position::Position;

    fn parse(source: &str) -> ParseOutput {
        Parser::new(source, "doc.md").parse()
    }

    fn kinds(output: &ParseOutput) -> Vec<DiagnosticKind> {
        output.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn annotated_block_ranges() {
        let source = "# Intro\n\n<!-- @codeblock math.ts -->\n```ts\nlet a = 1;\nlet b = 2;\n```\n\nAfter.\n";
        let output = parse(source);
        assert!(output.diagnostics.is_empty());

        let block = output.document.code_blocks().next().unwrap();
        assert_eq!(block.language, "ts");
        assert_eq!(block.code, "let a = 1;\nlet b = 2;");
        assert_eq!(block.annotation.as_ref().unwrap().file.as_deref(), Some("math.ts"));
        assert_eq!(block.range.start, Position::new(3, 1));
        assert_eq!(block.range.end, Position::new(7, 4));
        assert_eq!(block.code_range.start, Position::new(5, 1));
        assert_eq!(block.code_range.end, Position::new(6, 11));
        let annotation_range = block.annotation_range.unwrap();
        assert_eq!(annotation_range.start, Position::new(3, 1));
        assert_eq!(annotation_range.end, Position::new(3, 28));
    }

    #[test]
    fn nodes_cover_the_source_in_order() {
        let source = "intro\n\n<!-- @codeblock-config\noutDir: out\n-->\n\n```\nplain\n```\n\n<!-- @codeblock a.ts -->\n```\nx\n```\ntail";
        let output = parse(source);
        let mut cursor = 0;
        for node in &output.document.nodes {
            assert_eq!(node.span().start, cursor);
            cursor = node.span().end;
        }
        assert_eq!(cursor, source.len());

        let shapes: Vec<&str> = output
            .document
            .nodes
            .iter()
            .map(|n| match n {
                DocumentNode::Text(_) => "text",
                DocumentNode::Config(_) => "config",
                DocumentNode::CodeBlock(b) if b.annotation.is_some() => "annotated",
                DocumentNode::CodeBlock(_) => "plain",
            })
            .collect();
        assert_eq!(
            shapes,
            vec!["text", "config", "text", "plain", "text", "annotated", "text"]
        );
    }

    #[test]
    fn blank_lines_between_directive_and_fence_are_allowed() {
        let output = parse("<!-- @codeblock a.ts -->\n\n\n```\nx\n```\n");
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.document.annotated_blocks().count(), 1);
    }

    #[test]
    fn dangling_directive_degrades_to_text() {
        let output = parse("<!-- @codeblock a.ts -->\n\nSome prose.\n\n```\nx\n```\n");
        assert_eq!(kinds(&output), vec![DiagnosticKind::DanglingAnnotation]);
        assert_eq!(output.document.annotated_blocks().count(), 0);
        assert_eq!(output.document.code_blocks().count(), 1);
        assert_eq!(output.diagnostics[0].range.start, Position::new(1, 1));
    }

    #[test]
    fn directive_at_end_of_document_is_dangling() {
        let output = parse("text\n\n<!-- @codeblock a.ts -->\n");
        assert_eq!(kinds(&output), vec![DiagnosticKind::DanglingAnnotation]);
    }

    #[test]
    fn malformed_directive_leaves_fence_unannotated() {
        let output = parse("<!-- @codeblock\nfile: a.ts\nunknown: 1\n-->\n```\nx\n```\n");
        assert_eq!(kinds(&output), vec![DiagnosticKind::MalformedDirective]);
        assert!(output.has_errors());
        let block = output.document.code_blocks().next().unwrap();
        assert!(block.annotation.is_none());
        assert!(matches!(output.document.nodes[0], DocumentNode::Text(_)));
    }

    #[test]
    fn unterminated_directive_is_malformed() {
        let output = parse("<!-- @codeblock a.ts\n\n```\nx\n```\n");
        assert_eq!(kinds(&output), vec![DiagnosticKind::MalformedDirective]);
    }

    #[test]
    fn first_config_wins() {
        let source = "<!-- @codeblock-config\noutDir: first\n-->\n\n<!-- @codeblock-config\noutDir: second\n-->\n\n<!-- @codeblock-config\noutDir: third\n-->\n";
        let output = parse(source);
        assert_eq!(
            kinds(&output),
            vec![DiagnosticKind::DuplicateConfig, DiagnosticKind::DuplicateConfig]
        );
        assert!(!output.has_errors());
        assert_eq!(
            output.document.config().unwrap().out_dir.as_deref(),
            Some("first")
        );
        let configs = output
            .document
            .nodes
            .iter()
            .filter(|n| matches!(n, DocumentNode::Config(_)))
            .count();
        assert_eq!(configs, 3);
    }

    #[test]
    fn block_at_finds_code_lines_only() {
        let source = "<!-- @codeblock a.ts -->\n```\none\ntwo\n```\n";
        let document = parse(source).document;
        assert!(document.block_at(Position::new(1, 1)).is_none());
        assert!(document.block_at(Position::new(2, 1)).is_none());
        assert!(document.block_at(Position::new(3, 2)).is_some());
        assert!(document.block_at(Position::new(4, 1)).is_some());
        assert!(document.block_at(Position::new(5, 1)).is_none());
    }

    #[test]
    fn printing_preserves_meaning() {
        let source = "# Doc\n\n<!-- @codeblock-config\nprefix: |\n  // generated\n-->\n\n<!-- @codeblock\nfile: a.ts\nreplace:\n  - [X, '1']\n-->\n\n```ts\nconst x = X;\n```\n\n<!-- @codeblock -->\n```ts\nconst y = 2;\n```\n\n```\nuntouched\n```\n";
        let first = parse(source).document;
        let printed = first.to_string();
        let second = parse(&printed).document;

        assert_eq!(first.config(), second.config());
        let strip = |d: &crate::document::Document| {
            d.code_blocks()
                .map(|b| (b.language.clone(), b.code.clone(), b.annotation.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first), strip(&second));
    }
}
