use codeblock::AdditionalFile;

use crate::generation::GeneratedFile;

/// Path of an additional file: the group's path with `suffix` appended as is.
///
/// `suffix` may contain separators (`.d/types.ts`); it never replaces an
/// extension.
pub fn additional_path(group_path: &str, suffix: &str) -> String {
    format!("{}{}", group_path, suffix)
}

/// Emit an additional file. Its content is written untouched and carries no
/// position mapping.
pub fn emit_additional(group_path: &str, extra: &AdditionalFile) -> GeneratedFile {
    GeneratedFile {
        path: additional_path(group_path, &extra.suffix),
        content: extra.content.clone(),
        source_blocks: Vec::new(),
    }
}
