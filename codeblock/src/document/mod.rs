use std::fmt;
use std::ops::Range;

use crate::annotation::{Annotation, BLOCK_KEYWORD, CONFIG_KEYWORD, Config};
use crate::position::{Position, SourceRange};

/// A parsed Markdown source: an ordered, non-overlapping sequence of nodes.
///
/// Documents are never edited in place. Any change to the text means a fresh
/// parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source_path: String,
    pub nodes: Vec<DocumentNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Text(TextNode),
    Config(ConfigNode),
    CodeBlock(CodeBlockNode),
}

/// A run of source text with no meaning to the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub span: Range<usize>,
    pub range: SourceRange,
}

/// A `@codeblock-config` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    pub config: Config,
    pub span: Range<usize>,
    pub range: SourceRange,
}

/// A fenced code block, annotated or not.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlockNode {
    pub language: String,
    /// Fence content without its final line break.
    pub code: String,
    /// Directive comment (if any) through the closing fence.
    pub span: Range<usize>,
    pub range: SourceRange,
    /// Content lines only. Starts on the line after the opening fence.
    pub code_range: SourceRange,
    /// Per content line, the source columns ahead of the text in `code`
    /// (fence indentation, list or quote markers).
    pub indents: Vec<usize>,
    pub annotation_range: Option<SourceRange>,
    pub annotation: Option<Annotation>,
}

impl Document {
    /// The effective configuration: the first config directive, if any.
    pub fn config(&self) -> Option<&Config> {
        self.nodes.iter().find_map(|node| match node {
            DocumentNode::Config(config) => Some(&config.config),
            _ => None,
        })
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlockNode> {
        self.nodes.iter().filter_map(|node| match node {
            DocumentNode::CodeBlock(block) => Some(block),
            _ => None,
        })
    }

    /// Code blocks carrying an annotation, in document order.
    pub fn annotated_blocks(&self) -> impl Iterator<Item = &CodeBlockNode> {
        self.code_blocks().filter(|block| block.annotation.is_some())
    }

    /// The code block whose content lines include `position`.
    pub fn block_at(&self, position: Position) -> Option<&CodeBlockNode> {
        self.code_blocks()
            .find(|block| block.code_contains_line(position.line))
    }
}

impl DocumentNode {
    pub fn span(&self) -> &Range<usize> {
        match self {
            DocumentNode::Text(node) => &node.span,
            DocumentNode::Config(node) => &node.span,
            DocumentNode::CodeBlock(node) => &node.span,
        }
    }

    pub fn range(&self) -> &SourceRange {
        match self {
            DocumentNode::Text(node) => &node.range,
            DocumentNode::Config(node) => &node.range,
            DocumentNode::CodeBlock(node) => &node.range,
        }
    }
}

impl CodeBlockNode {
    /// Number of lines in `code`; an empty block has none.
    pub fn code_line_count(&self) -> usize {
        line_count(&self.code)
    }

    pub fn code_contains_line(&self, line: usize) -> bool {
        let start = self.code_range.start.line;
        line >= start && line < start + self.code_line_count()
    }

    /// Columns stripped before source `line` of the content.
    pub fn indent_at(&self, line: usize) -> usize {
        line.checked_sub(self.code_range.start.line)
            .and_then(|offset| self.indents.get(offset))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_skipped(&self) -> bool {
        self.annotation.as_ref().is_some_and(|a| a.skip)
    }
}

/// Lines in `text` when split on `\n`; the empty string has zero lines.
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.matches('\n').count() + 1
    }
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for DocumentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentNode::Text(node) => write!(f, "{}", node.text),
            DocumentNode::Config(node) => {
                let body = node.config.encode().map_err(|_| fmt::Error)?;
                write_directive(f, CONFIG_KEYWORD, &body)
            }
            DocumentNode::CodeBlock(node) => {
                if let Some(annotation) = &node.annotation {
                    let body = annotation.encode().map_err(|_| fmt::Error)?;
                    write_directive(f, BLOCK_KEYWORD, &body)?;
                    writeln!(f)?;
                }
                let fence = "`".repeat(longest_backtick_run(&node.code).max(2) + 1);
                writeln!(f, "{}{}", fence, node.language)?;
                if !node.code.is_empty() {
                    writeln!(f, "{}", node.code)?;
                }
                write!(f, "{}", fence)
            }
        }
    }
}

fn write_directive(f: &mut fmt::Formatter<'_>, keyword: &str, body: &str) -> fmt::Result {
    if body.contains('\n') {
        write!(f, "<!-- {}{}-->", keyword, body)
    } else {
        write!(f, "<!-- {}{} -->", keyword, body)
    }
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}
