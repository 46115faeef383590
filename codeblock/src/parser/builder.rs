use std::ops::Range;

use crate::annotation::{self, Annotation};
use crate::document::{CodeBlockNode, ConfigNode, Document, DocumentNode, TextNode, line_count};
use crate::parser::error::{Diagnostic, DiagnosticKind};
use crate::parser::scanner::{DirectiveKind, RawDirective, RawFence, RawItem};
use crate::position::{LineIndex, Position, SourceRange};

/// Assemble scanned items into a document, filling the gaps with text nodes.
pub(crate) fn build(
    source: &str,
    source_path: &str,
    items: Vec<RawItem<'_>>,
) -> (Document, Vec<Diagnostic>) {
    let mut state = BuildState::new(source);
    let mut items = items.into_iter().peekable();

    while let Some(item) = items.next() {
        match item {
            RawItem::Fence(fence) => state.push_code_block(fence, None),
            RawItem::Directive(directive) => match directive.kind {
                DirectiveKind::Config => state.push_config(directive),
                DirectiveKind::Block => {
                    let Some(annotation) = state.decode_block(&directive) else {
                        continue;
                    };
                    let next = items.next_if(|item| match item {
                        RawItem::Fence(fence) => {
                            source[directive.span.end..fence.span.start].trim().is_empty()
                        }
                        RawItem::Directive(_) => false,
                    });
                    match next {
                        Some(RawItem::Fence(fence)) => {
                            state.push_code_block(fence, Some((directive.span, annotation)));
                        }
                        _ => state.report_dangling(&directive),
                    }
                }
            },
        }
    }

    state.finish(source_path)
}

struct BuildState<'a> {
    source: &'a str,
    index: LineIndex<'a>,
    nodes: Vec<DocumentNode>,
    diagnostics: Vec<Diagnostic>,
    /// End of the last node pushed; text before this is already covered.
    cursor: usize,
    seen_config: bool,
}

impl<'a> BuildState<'a> {
    fn new(source: &'a str) -> Self {
        BuildState {
            source,
            index: LineIndex::new(source),
            nodes: Vec::new(),
            diagnostics: Vec::new(),
            cursor: 0,
            seen_config: false,
        }
    }

    fn flush_text(&mut self, upto: usize) {
        if self.cursor < upto {
            let span = self.cursor..upto;
            self.nodes.push(DocumentNode::Text(TextNode {
                text: self.source[span.clone()].to_string(),
                range: self.index.range(&span),
                span,
            }));
        }
        self.cursor = self.cursor.max(upto);
    }

    fn push_node(&mut self, node: DocumentNode) {
        let span = node.span().clone();
        self.flush_text(span.start);
        self.cursor = span.end;
        self.nodes.push(node);
    }

    fn push_config(&mut self, directive: RawDirective<'_>) {
        let Some(body) = self.body_or_report(&directive) else {
            return;
        };
        let config = match annotation::decode_config(body) {
            Ok(config) => config,
            Err(err) => {
                self.report_malformed(&directive, err.to_string());
                return;
            }
        };

        let range = self.index.range(&directive.span);
        if self.seen_config {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::DuplicateConfig,
                    "only the first @codeblock-config directive takes effect",
                    directive.span.clone(),
                    range,
                )
                .with_note("this configuration is ignored"),
            );
        }
        self.seen_config = true;
        self.push_node(DocumentNode::Config(ConfigNode {
            config,
            span: directive.span,
            range,
        }));
    }

    fn decode_block(&mut self, directive: &RawDirective<'_>) -> Option<Annotation> {
        let body = self.body_or_report(directive)?;
        match annotation::decode_annotation(body) {
            Ok(annotation) => Some(annotation),
            Err(err) => {
                self.report_malformed(directive, err.to_string());
                None
            }
        }
    }

    fn push_code_block(&mut self, fence: RawFence, annotation: Option<(Range<usize>, Annotation)>) {
        let fence_line = self.index.line_of(fence.span.start);
        let code_range = code_range(fence_line + 1, &fence.code);

        let (start, annotation_range, annotation) = match annotation {
            Some((span, annotation)) => {
                (span.start, Some(self.index.range(&span)), Some(annotation))
            }
            None => (fence.span.start, None, None),
        };
        let span = start..fence.span.end;

        self.push_node(DocumentNode::CodeBlock(CodeBlockNode {
            language: fence.language,
            code: fence.code,
            indents: fence.indents,
            range: self.index.range(&span),
            span,
            code_range,
            annotation_range,
            annotation,
        }));
    }

    fn body_or_report<'d>(&mut self, directive: &RawDirective<'d>) -> Option<&'d str> {
        if directive.body.is_none() {
            self.report_malformed(directive, "directive comment is never closed with `-->`".into());
        }
        directive.body
    }

    fn report_malformed(&mut self, directive: &RawDirective<'_>, reason: String) {
        let what = match directive.kind {
            DirectiveKind::Config => "@codeblock-config",
            DirectiveKind::Block => "@codeblock",
        };
        self.diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::MalformedDirective,
                format!("malformed {} directive: {}", what, reason),
                directive.span.clone(),
                self.index.range(&directive.span),
            )
            .with_note("the directive is treated as plain text"),
        );
    }

    fn report_dangling(&mut self, directive: &RawDirective<'_>) {
        self.diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::DanglingAnnotation,
                "@codeblock directive is not followed by a fenced code block",
                directive.span.clone(),
                self.index.range(&directive.span),
            )
            .with_note("only blank lines may separate the directive from its fence"),
        );
    }

    fn finish(mut self, source_path: &str) -> (Document, Vec<Diagnostic>) {
        self.flush_text(self.source.len());
        self.diagnostics.sort_by_key(|d| d.span.start);
        let document = Document {
            source_path: source_path.to_string(),
            nodes: self.nodes,
        };
        (document, self.diagnostics)
    }
}

/// Range of the fence content, derived from the content itself so that it
/// agrees with the line accounting used for generated files.
fn code_range(first_line: usize, code: &str) -> SourceRange {
    let start = Position::new(first_line, 1);
    let lines = line_count(code);
    if lines == 0 {
        return SourceRange::new(start, start);
    }
    let last = code.rsplit('\n').next().unwrap_or("");
    let end = Position::new(first_line + lines - 1, last.chars().count() + 1);
    SourceRange::new(start, end)
}
