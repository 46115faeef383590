use codeblock::Config;
use codeblock::annotation::replace;
use codeblock::document::{CodeBlockNode, line_count};

/// Separator placed between consecutive blocks of one file.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// One block after replace rules and its own prefix/postfix were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub text: String,
    /// Lines taken by the block prefix ahead of the code.
    pub prefix_lines: usize,
    /// Lines of transformed code.
    pub code_lines: usize,
}

/// Where a block's code landed in a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// 1-based generated line of the first code line.
    pub code_start: usize,
    pub code_lines: usize,
}

/// Lines a prefix occupies once written. Trailing blank lines do not count.
pub fn prefix_line_count(prefix: &str) -> usize {
    let trimmed = prefix.trim_end();
    if trimmed.is_empty() {
        0
    } else {
        trimmed.split('\n').count()
    }
}

/// A prefix as whole lines: trailing whitespace trimmed, one line break kept.
fn leading_lines(prefix: Option<&str>) -> String {
    match prefix.map(str::trim_end) {
        Some(prefix) if !prefix.is_empty() => format!("{}\n", prefix),
        _ => String::new(),
    }
}

/// A block postfix as whole lines following the code.
fn trailing_lines(postfix: Option<&str>) -> String {
    match postfix.map(str::trim_end) {
        Some(postfix) if !postfix.is_empty() => format!("\n{}", postfix),
        _ => String::new(),
    }
}

pub fn render_block(block: &CodeBlockNode) -> RenderedBlock {
    let annotation = block.annotation.clone().unwrap_or_default();
    let code = replace::apply_all(&annotation.replace, &block.code);
    let prefix = leading_lines(annotation.prefix.as_deref());

    RenderedBlock {
        prefix_lines: prefix_line_count(&prefix),
        code_lines: line_count(&code),
        text: format!("{}{}{}", prefix, code, trailing_lines(annotation.postfix.as_deref())),
    }
}

/// Full content of one generated file.
///
/// Blocks are joined by a single blank line and the whole file is wrapped
/// once by the config prefix and postfix. A postfix of only whitespace is
/// appended as is, so `"\n"` just ends the file with a newline.
pub fn render_file(config: Option<&Config>, blocks: &[RenderedBlock]) -> String {
    let prefix = leading_lines(config.and_then(|c| c.prefix.as_deref()));
    let postfix = match config.and_then(|c| c.postfix.as_deref()) {
        Some(postfix) if postfix.trim().is_empty() => postfix.to_string(),
        Some(postfix) => format!("\n{}", postfix),
        None => String::new(),
    };
    let body = blocks
        .iter()
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR);
    format!("{}{}{}", prefix, body, postfix)
}

/// Line placement of every block's code within the file `render_file` builds.
pub fn layout(config: Option<&Config>, blocks: &[RenderedBlock]) -> Vec<BlockLayout> {
    let config_prefix = config.and_then(|c| c.prefix.as_deref()).unwrap_or("");
    let mut cursor = 1 + prefix_line_count(config_prefix);

    blocks
        .iter()
        .map(|block| {
            let placed = BlockLayout {
                code_start: cursor + block.prefix_lines,
                code_lines: block.code_lines,
            };
            cursor += block.text.matches('\n').count() + 2;
            placed
        })
        .collect()
}
