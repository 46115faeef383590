use std::path::{Path, PathBuf};

use codeblock::{Diagnostic, Document, Position};

use crate::generation::{GenerateOptions, GeneratedFile, Generation, generate};
use crate::mapper;

/// Deepest chain of Markdown-in-Markdown extraction that is followed.
pub const MAX_NESTING_DEPTH: usize = 8;

/// One extraction stage and every stage derived from its Markdown outputs.
///
/// A generated file ending in `.md` or `.markdown` may carry annotations of
/// its own; it becomes the source of a nested stage whose outputs land in
/// that file's own output directory.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub source_path: String,
    pub text: String,
    /// Path, within the parent stage, of the file this stage was read from.
    pub origin: Option<String>,
    pub document: Document,
    pub parse_diagnostics: Vec<Diagnostic>,
    pub generation: Generation,
    pub nested: Vec<Extraction>,
}

impl Extraction {
    /// Parse, generate and follow nested Markdown outputs of `text`.
    ///
    /// `options` only applies to the top stage. Nested stages use their own
    /// configuration.
    pub fn build(text: &str, source_path: &str, options: &GenerateOptions) -> Self {
        Self::build_limited(text, source_path, options, MAX_NESTING_DEPTH)
    }

    /// Like [`Extraction::build`], following at most `max_depth` levels of
    /// nesting. A depth of zero extracts `text` alone.
    pub fn build_limited(
        text: &str,
        source_path: &str,
        options: &GenerateOptions,
        max_depth: usize,
    ) -> Self {
        Self::build_stage(text, source_path, None, options, 0, max_depth)
    }

    fn build_stage(
        text: &str,
        source_path: &str,
        origin: Option<String>,
        options: &GenerateOptions,
        depth: usize,
        max_depth: usize,
    ) -> Self {
        let parsed = codeblock::parse(text, source_path);
        let generation = generate(&parsed.document, options);

        let mut stage = Extraction {
            source_path: source_path.to_string(),
            text: text.to_string(),
            origin,
            document: parsed.document,
            parse_diagnostics: parsed.diagnostics,
            generation,
            nested: Vec::new(),
        };

        if depth >= max_depth {
            let dropped = stage
                .generation
                .files
                .iter()
                .any(|file| is_markdown(&file.path));
            if dropped && max_depth > 0 {
                tracing::warn!(path = %source_path, "nested extraction depth limit reached");
            }
            return stage;
        }

        let nested = stage
            .generation
            .files
            .iter()
            .filter(|file| is_markdown(&file.path))
            .map(|file| {
                let child_path = stage.output_path(file).display().to_string();
                tracing::debug!(path = %child_path, depth = depth + 1, "extracting nested document");
                Self::build_stage(
                    &file.content,
                    &child_path,
                    Some(file.path.clone()),
                    &GenerateOptions::default(),
                    depth + 1,
                    max_depth,
                )
            })
            .collect();
        stage.nested = nested;
        stage
    }

    /// Output directory of this stage, relative to the source's directory.
    pub fn output_dir(&self) -> PathBuf {
        let base = Path::new(&self.source_path)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        base.join(&self.generation.out_dir)
    }

    pub fn output_path(&self, file: &GeneratedFile) -> PathBuf {
        self.output_dir().join(&file.path)
    }

    /// Every file of this stage and of nested stages, parents first.
    pub fn all_outputs(&self) -> Vec<(PathBuf, &str)> {
        let mut outputs: Vec<(PathBuf, &str)> = self
            .generation
            .files
            .iter()
            .map(|file| (self.output_path(file), file.content.as_str()))
            .collect();
        for child in &self.nested {
            outputs.extend(child.all_outputs());
        }
        outputs
    }

    /// Every stage, parents first.
    pub fn stages(&self) -> Vec<&Extraction> {
        let mut stages = vec![self];
        for child in &self.nested {
            stages.extend(child.stages());
        }
        stages
    }

    /// Parse and generation diagnostics of this stage.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.parse_diagnostics
            .iter()
            .chain(self.generation.diagnostics.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.stages()
            .iter()
            .any(|stage| stage.diagnostics().any(Diagnostic::is_error))
    }

    /// Map a position in any output file, at any depth, back to this stage's
    /// source text.
    pub fn to_root_source(&self, output_path: &Path, position: Position) -> Option<Position> {
        if let Some(file) = self
            .generation
            .files
            .iter()
            .find(|file| self.output_path(file) == output_path)
        {
            return mapper::to_source(&self.document, &self.generation.files, &file.path, position);
        }

        self.nested.iter().find_map(|child| {
            let inner = child.to_root_source(output_path, position)?;
            let origin = child.origin.as_deref()?;
            mapper::to_source(&self.document, &self.generation.files, origin, inner)
        })
    }

    /// Map a source position forward through as many stages as it stays
    /// inside extracted code.
    pub fn to_leaf_generated(&self, position: Position) -> Option<(PathBuf, Position)> {
        let hit = mapper::to_generated(&self.document, &self.generation.files, position)?;
        let deeper = self
            .nested
            .iter()
            .filter(|child| child.origin.as_deref() == Some(hit.path.as_str()))
            .find_map(|child| child.to_leaf_generated(hit.position));
        deeper.or_else(|| {
            Some((
                self.output_dir().join(&hit.path),
                hit.position,
            ))
        })
    }
}

fn is_markdown(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
# Guide

<!-- @codeblock inner/README.md -->
````md
Intro for the nested guide.

<!-- @codeblock-config
outDir: gen
-->

<!-- @codeblock lib.ts -->
```ts
export const x = 1;
export const y = 2;
```
````

<!-- @codeblock top.ts -->
```ts
top();
```
";

    fn build() -> Extraction {
        Extraction::build(SOURCE, "docs/guide.md", &GenerateOptions::default())
    }

    #[test]
    fn markdown_outputs_become_nested_stages() {
        let extraction = build();
        assert_eq!(extraction.nested.len(), 1);

        let child = &extraction.nested[0];
        assert_eq!(child.origin.as_deref(), Some("inner/README.md"));
        assert_eq!(
            Path::new(&child.source_path),
            Path::new("docs/.examples/inner/README.md")
        );
        assert_eq!(
            child.output_dir(),
            Path::new("docs/.examples/inner").join("gen")
        );
        assert_eq!(
            child.generation.file("lib.ts").unwrap().content,
            "export const x = 1;\nexport const y = 2;"
        );
    }

    #[test]
    fn all_outputs_lists_every_stage() {
        let extraction = build();
        let paths: Vec<PathBuf> = extraction.all_outputs().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("docs/.examples").join("inner/README.md"),
                Path::new("docs/.examples").join("top.ts"),
                Path::new("docs/.examples/inner/gen").join("lib.ts"),
            ]
        );
    }

    #[test]
    fn positions_map_through_every_stage() {
        let extraction = build();
        // `export const y = 2;` sits on line 14 of the outer document.
        let source = Position::new(14, 8);
        let (path, generated) = extraction.to_leaf_generated(source).unwrap();
        assert_eq!(path, Path::new("docs/.examples/inner/gen").join("lib.ts"));
        assert_eq!(generated, Position::new(2, 8));
        assert_eq!(extraction.to_root_source(&path, generated), Some(source));
    }

    #[test]
    fn positions_outside_nested_code_stop_at_first_stage() {
        let extraction = build();
        let (path, generated) = extraction.to_leaf_generated(Position::new(5, 1)).unwrap();
        assert_eq!(path, Path::new("docs/.examples").join("inner/README.md"));
        assert_eq!(generated, Position::new(1, 1));
    }

    #[test]
    fn zero_depth_extracts_only_the_source() {
        let extraction =
            Extraction::build_limited(SOURCE, "docs/guide.md", &GenerateOptions::default(), 0);
        assert!(extraction.nested.is_empty());
        assert_eq!(extraction.all_outputs().len(), 2);
    }

    #[test]
    fn recursion_stops_at_depth_limit() {
        let mut text = String::from("leaf\n");
        for level in 0..12 {
            let fence = "`".repeat(3 + level);
            text = format!("<!-- @codeblock l{level}.md -->\n{fence}md\n{text}{fence}\n");
        }
        let extraction = Extraction::build(&text, "root.md", &GenerateOptions::default());
        assert_eq!(extraction.stages().len(), MAX_NESTING_DEPTH + 1);
    }
}
