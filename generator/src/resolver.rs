use std::collections::HashMap;

use codeblock::{CodeBlockNode, Diagnostic, DiagnosticKind, Document};

/// Blocks sharing one resolved output path, in document order.
#[derive(Debug, Clone)]
pub struct FileGroup<'a> {
    pub path: String,
    pub blocks: Vec<&'a CodeBlockNode>,
}

/// Assign every annotated, non-skipped block to an output path.
///
/// A block without `file` continues the path of the nearest earlier block
/// that was not skipped. Skipped blocks neither join a group nor break the
/// chain. Groups come out in order of first appearance.
pub fn resolve_groups(document: &Document) -> (Vec<FileGroup<'_>>, Vec<Diagnostic>) {
    let mut groups: Vec<FileGroup<'_>> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut diagnostics = Vec::new();
    let mut current: Option<String> = None;

    for block in document.annotated_blocks() {
        let Some(annotation) = &block.annotation else {
            continue;
        };
        if annotation.skip {
            continue;
        }

        let Some(path) = annotation.file.clone().or_else(|| current.clone()) else {
            diagnostics.push(unresolved(block));
            continue;
        };

        let slot = *by_path.entry(path.clone()).or_insert_with(|| {
            groups.push(FileGroup {
                path: path.clone(),
                blocks: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].blocks.push(block);
        current = Some(path);
    }

    (groups, diagnostics)
}

fn unresolved(block: &CodeBlockNode) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::UnresolvedFileName,
        "code block has no `file` and no earlier block to continue",
        block.span.clone(),
        block.annotation_range.unwrap_or(block.range),
    )
    .with_note("name the output with `<!-- @codeblock name.ext -->`")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(source: &str) -> (Vec<(String, Vec<String>)>, Vec<DiagnosticKind>) {
        let document = codeblock::parse(source, "doc.md").document;
        let (groups, diagnostics) = resolve_groups(&document);
        (
            groups
                .into_iter()
                .map(|g| (g.path, g.blocks.iter().map(|b| b.code.clone()).collect()))
                .collect(),
            diagnostics.iter().map(|d| d.kind).collect(),
        )
    }

    #[test]
    fn unnamed_blocks_continue_previous_file() {
        let source = "<!-- @codeblock a.ts -->\n```\n1\n```\n\n<!-- @codeblock -->\n```\n2\n```\n\n<!-- @codeblock b.ts -->\n```\n3\n```\n\n<!-- @codeblock -->\n```\n4\n```\n";
        let (groups, diagnostics) = groups(source);
        assert!(diagnostics.is_empty());
        assert_eq!(
            groups,
            vec![
                ("a.ts".to_string(), vec!["1".to_string(), "2".to_string()]),
                ("b.ts".to_string(), vec!["3".to_string(), "4".to_string()]),
            ]
        );
    }

    #[test]
    fn returning_to_a_path_appends_to_its_group() {
        let source = "<!-- @codeblock a.ts -->\n```\n1\n```\n\n<!-- @codeblock b.ts -->\n```\n2\n```\n\n<!-- @codeblock a.ts -->\n```\n3\n```\n";
        let (groups, _) = groups(source);
        assert_eq!(groups[0], ("a.ts".to_string(), vec!["1".to_string(), "3".to_string()]));
        assert_eq!(groups[1].0, "b.ts");
    }

    #[test]
    fn skipped_block_does_not_break_inheritance() {
        let source = "<!-- @codeblock a.ts -->\n```\n1\n```\n\n<!-- @codeblock\nfile: other.ts\nskip: true\n-->\n```\nskipped\n```\n\n<!-- @codeblock -->\n```\n2\n```\n";
        let (groups, diagnostics) = groups(source);
        assert!(diagnostics.is_empty());
        assert_eq!(
            groups,
            vec![("a.ts".to_string(), vec!["1".to_string(), "2".to_string()])]
        );
    }

    #[test]
    fn unannotated_fences_are_ignored() {
        let source = "<!-- @codeblock a.ts -->\n```\n1\n```\n\n```\nplain\n```\n\n<!-- @codeblock -->\n```\n2\n```\n";
        let (groups, _) = groups(source);
        assert_eq!(groups[0].1, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn block_without_any_path_is_reported() {
        let source = "<!-- @codeblock -->\n```\norphan\n```\n\n<!-- @codeblock a.ts -->\n```\n1\n```\n";
        let (groups, diagnostics) = groups(source);
        assert_eq!(diagnostics, vec![DiagnosticKind::UnresolvedFileName]);
        assert_eq!(groups, vec![("a.ts".to_string(), vec!["1".to_string()])]);
    }

    #[test]
    fn skipped_first_block_leaves_no_path_to_inherit() {
        let source = "<!-- @codeblock\nfile: a.ts\nskip: true\n-->\n```\nx\n```\n\n<!-- @codeblock -->\n```\ny\n```\n";
        let (groups, diagnostics) = groups(source);
        assert!(groups.is_empty());
        assert_eq!(diagnostics, vec![DiagnosticKind::UnresolvedFileName]);
    }
}
