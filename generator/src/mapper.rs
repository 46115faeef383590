use codeblock::{CodeBlockNode, Document, Position};

use crate::generation::GeneratedFile;
use crate::pipeline::{self, BlockLayout};

/// A position inside a generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPosition {
    pub path: String,
    pub position: Position,
}

/// Map a position in the source document to the generated file holding it.
///
/// Only positions on a code line of a generated block map; directive and
/// fence lines, plain fences and skipped blocks give `None`. Prefixes and
/// postfixes are whole lines, so columns only lose the indentation the fence
/// content had in the source.
pub fn to_generated(
    document: &Document,
    files: &[GeneratedFile],
    position: Position,
) -> Option<GeneratedPosition> {
    let block = document.block_at(position)?;
    let (file, index) = files.iter().find_map(|file| {
        file.source_blocks
            .iter()
            .position(|candidate| candidate.span == block.span)
            .map(|index| (file, index))
    })?;

    let placed = file_layout(document, file)[index];
    // Replace rules may have removed lines; stay inside the block's code.
    let last = placed.code_lines.checked_sub(1)?;
    let offset = (position.line - block.code_range.start.line).min(last);
    let column = position
        .column
        .saturating_sub(block.indent_at(position.line))
        .max(1);
    Some(GeneratedPosition {
        path: file.path.clone(),
        position: Position::new(placed.code_start + offset, column),
    })
}

/// Map a position in a generated file back to the source document.
///
/// Lines produced by prefixes, postfixes, separators or additional files
/// have no origin and give `None`. When replace rules changed a block's
/// line count the result is clamped to the block's last source line.
pub fn to_source(
    document: &Document,
    files: &[GeneratedFile],
    path: &str,
    position: Position,
) -> Option<Position> {
    let file = files
        .iter()
        .find(|file| file.path == path && !file.source_blocks.is_empty())?;

    file_layout(document, file)
        .into_iter()
        .zip(&file.source_blocks)
        .find(|(placed, _)| {
            position.line >= placed.code_start
                && position.line < placed.code_start + placed.code_lines
        })
        .map(|(placed, block)| source_position(block, placed, position))
}

fn source_position(block: &CodeBlockNode, placed: BlockLayout, position: Position) -> Position {
    let offset = position.line - placed.code_start;
    let last = block.code_line_count().saturating_sub(1);
    let line = block.code_range.start.line + offset.min(last);
    Position::new(line, position.column + block.indent_at(line))
}

fn file_layout(document: &Document, file: &GeneratedFile) -> Vec<BlockLayout> {
    let rendered: Vec<_> = file
        .source_blocks
        .iter()
        .map(pipeline::render_block)
        .collect();
    pipeline::layout(document.config(), &rendered)
}
