use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::annotation::{BLOCK_KEYWORD, CONFIG_KEYWORD};
use crate::position::LineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectiveKind {
    Config,
    Block,
}

/// A comment carrying one of the directive keywords.
#[derive(Debug, Clone)]
pub(crate) struct RawDirective<'a> {
    pub kind: DirectiveKind,
    /// Text after the keyword, up to the comment close. `None` when the
    /// comment is never closed.
    pub body: Option<&'a str>,
    pub span: Range<usize>,
}

/// A fenced code block as it appears in the source.
#[derive(Debug, Clone)]
pub(crate) struct RawFence {
    pub language: String,
    pub code: String,
    /// Source columns before each content line; the indentation and
    /// container markers the Markdown parser stripped from `code`.
    pub indents: Vec<usize>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub(crate) enum RawItem<'a> {
    Directive(RawDirective<'a>),
    Fence(RawFence),
}

impl RawItem<'_> {
    pub fn span(&self) -> &Range<usize> {
        match self {
            RawItem::Directive(directive) => &directive.span,
            RawItem::Fence(fence) => &fence.span,
        }
    }
}

/// Locate directive comments and fenced code blocks, in source order.
///
/// Spans never include the trailing line break of the element.
pub(crate) fn scan(source: &str) -> Vec<RawItem<'_>> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let mut events = CmarkParser::new_ext(source, options).into_offset_iter();
    let index = LineIndex::new(source);
    let mut items = Vec::new();

    while let Some((event, range)) = events.next() {
        match event {
            Event::Start(Tag::HtmlBlock) => {
                let span = trim_line_break(source, range);
                if let Some(directive) = classify_comment(&source[span.clone()], span) {
                    items.push(RawItem::Directive(directive));
                }
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let language = info.split_whitespace().next().unwrap_or("").to_string();
                let mut code = String::new();
                let mut indents = Vec::new();
                let mut at_line_start = true;
                for (inner, inner_range) in events.by_ref() {
                    match inner {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => {
                            // Synthesized text (expanded tabs) has no exact
                            // source offsets; its lines take the event start.
                            let verbatim = source.get(inner_range.clone()) == Some(&*text);
                            let mut offset = 0;
                            for segment in text.split_inclusive('\n') {
                                if at_line_start {
                                    let at = inner_range.start + if verbatim { offset } else { 0 };
                                    indents.push(index.position(at).column - 1);
                                }
                                at_line_start = segment.ends_with('\n');
                                offset += segment.len();
                            }
                            code.push_str(&text);
                        }
                        _ => {}
                    }
                }
                if code.ends_with('\n') {
                    code.pop();
                    if code.ends_with('\r') {
                        code.pop();
                    }
                }
                items.push(RawItem::Fence(RawFence {
                    language,
                    code,
                    indents,
                    span: trim_line_break(source, range),
                }));
            }
            _ => {}
        }
    }

    tracing::trace!(items = items.len(), "scanned source");
    items
}

fn trim_line_break(source: &str, span: Range<usize>) -> Range<usize> {
    let trimmed = source[span.clone()].trim_end_matches(['\n', '\r']);
    span.start..span.start + trimmed.len()
}

/// Recognize `<!-- @codeblock ... -->` and `<!-- @codeblock-config ... -->`.
fn classify_comment(text: &str, span: Range<usize>) -> Option<RawDirective<'_>> {
    let inner = text.trim().strip_prefix("<!--")?;
    let (inner, closed) = match inner.strip_suffix("-->") {
        Some(inner) => (inner, true),
        None => (inner, false),
    };
    let inner = inner.trim_start();

    let (kind, body) = if let Some(body) = keyword_body(inner, CONFIG_KEYWORD) {
        (DirectiveKind::Config, body)
    } else if let Some(body) = keyword_body(inner, BLOCK_KEYWORD) {
        (DirectiveKind::Block, body)
    } else {
        return None;
    };

    Some(RawDirective {
        kind,
        body: closed.then_some(body),
        span,
    })
}

fn keyword_body<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}
