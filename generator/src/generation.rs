use std::collections::HashSet;
use std::path::{Path, PathBuf};

use codeblock::{CodeBlockNode, Diagnostic, DiagnosticKind, Document};

use crate::emitter;
use crate::pipeline;
use crate::resolver;

/// Output directory used when neither the caller nor the document names one.
pub const DEFAULT_OUT_DIR: &str = ".examples";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Overrides the document's `outDir`.
    pub out_dir: Option<String>,
}

/// One output file derived from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    /// Path relative to the output directory.
    pub path: String,
    pub content: String,
    /// The blocks the content was built from, in document order. Empty for
    /// additional files.
    pub source_blocks: Vec<CodeBlockNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub files: Vec<GeneratedFile>,
    pub out_dir: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Generation {
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|file| file.path == path)
    }

    /// `out_dir` joined with `file.path`.
    pub fn output_path(&self, file: &GeneratedFile) -> PathBuf {
        Path::new(&self.out_dir).join(&file.path)
    }
}

/// Build every output file of `document`.
///
/// Pure: the same document and options always give byte-identical files.
/// Blocks that cannot be placed are reported and left out; the rest of the
/// document is still generated. Every output path is emitted once. A later
/// file claiming a path already taken is dropped with a `DuplicateOutput`
/// error.
pub fn generate(document: &Document, options: &GenerateOptions) -> Generation {
    let config = document.config();
    let out_dir = options
        .out_dir
        .clone()
        .or_else(|| config.and_then(|c| c.out_dir.clone()))
        .unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());

    let (groups, mut diagnostics) = resolver::resolve_groups(document);
    let mut files = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();

    for group in groups {
        let rendered: Vec<_> = group
            .blocks
            .iter()
            .map(|block| pipeline::render_block(block))
            .collect();
        let file = GeneratedFile {
            path: group.path.clone(),
            content: pipeline::render_file(config, &rendered),
            source_blocks: group.blocks.iter().map(|block| (*block).clone()).collect(),
        };
        if emitted.insert(file.path.clone()) {
            files.push(file);
        } else if let Some(first) = group.blocks.first() {
            diagnostics.push(duplicate_output(first, &group.path));
        }

        for block in &group.blocks {
            let extras = block
                .annotation
                .iter()
                .flat_map(|annotation| annotation.additional_files.iter());
            for extra in extras {
                let file = emitter::emit_additional(&group.path, extra);
                if emitted.insert(file.path.clone()) {
                    files.push(file);
                } else {
                    diagnostics.push(duplicate_output(block, &file.path));
                }
            }
        }
    }

    tracing::debug!(
        path = %document.source_path,
        files = files.len(),
        out_dir = %out_dir,
        "generated files"
    );

    Generation {
        files,
        out_dir,
        diagnostics,
    }
}

fn duplicate_output(block: &CodeBlockNode, path: &str) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::DuplicateOutput,
        format!("`{}` is already generated by an earlier block", path),
        block.span.clone(),
        block.annotation_range.unwrap_or(block.range),
    )
    .with_note("the first file with this path is kept")
}
