use codeblock::{Annotation, Position};
use generator::{GenerateOptions, generate, to_generated, to_source};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct BlockShape {
    file: Option<&'static str>,
    skip: bool,
    prefix: Option<&'static str>,
    postfix: Option<&'static str>,
    lines: Vec<String>,
}

fn block_shape() -> impl Strategy<Value = BlockShape> {
    (
        prop::option::of(prop::sample::select(vec!["a.ts", "b.ts", "c/d.ts"])),
        prop::bool::weighted(0.2),
        prop::option::of(prop::sample::select(vec!["// p", "// p1\n// p2\n", "open {\n\n"])),
        prop::option::of(prop::sample::select(vec!["}", "// q1\n// q2"])),
        prop::collection::vec("[a-z][a-z ;=()]{0,12}", 1..4),
    )
        .prop_map(|(file, skip, prefix, postfix, lines)| BlockShape {
            file,
            skip,
            prefix,
            postfix,
            lines,
        })
}

fn render(config_prefix: bool, blocks: &[BlockShape]) -> String {
    let mut text = String::from("# Generated document\n\n");
    if config_prefix {
        text.push_str("<!-- @codeblock-config\nprefix: |\n  // top\n  // of file\n-->\n\n");
    }
    for (i, block) in blocks.iter().enumerate() {
        let annotation = Annotation {
            file: block.file.map(str::to_string),
            skip: block.skip,
            prefix: block.prefix.map(str::to_string),
            postfix: block.postfix.map(str::to_string),
            ..Annotation::default()
        };
        let body = annotation.encode().unwrap();
        if body.contains('\n') {
            text.push_str(&format!("<!-- @codeblock{}-->\n", body));
        } else {
            text.push_str(&format!("<!-- @codeblock{} -->\n", body));
        }
        text.push_str(&format!("```ts\n{}\n```\n\nParagraph {}.\n\n", block.lines.join("\n"), i));
    }
    text
}

/// Which blocks should be generated, following inheritance through skips.
fn expected_placement(blocks: &[BlockShape]) -> Vec<Option<&'static str>> {
    let mut current = None;
    blocks
        .iter()
        .map(|block| {
            if block.skip {
                return None;
            }
            let path = block.file.or(current);
            if path.is_some() {
                current = path;
            }
            path
        })
        .collect()
}

proptest! {
    #[test]
    fn positions_round_trip(
        config_prefix in any::<bool>(),
        blocks in prop::collection::vec(block_shape(), 1..6),
    ) {
        let source = render(config_prefix, &blocks);
        let parsed = codeblock::parse(&source, "doc.md");
        prop_assert!(parsed.diagnostics.is_empty());

        let generation = generate(&parsed.document, &GenerateOptions::default());
        let placement = expected_placement(&blocks);
        let annotated: Vec<_> = parsed.document.annotated_blocks().collect();
        prop_assert_eq!(annotated.len(), blocks.len());

        for ((node, shape), path) in annotated.iter().zip(&blocks).zip(&placement) {
            for (offset, line_text) in shape.lines.iter().enumerate() {
                let position = Position::new(node.code_range.start.line + offset, 2);
                let hit = to_generated(&parsed.document, &generation.files, position);
                match path {
                    None => prop_assert!(hit.is_none()),
                    Some(path) => {
                        let hit = hit.expect("generated block maps forward");
                        prop_assert_eq!(&hit.path, path);

                        let content = &generation.file(path).unwrap().content;
                        let generated_line = content.split('\n').nth(hit.position.line - 1);
                        prop_assert_eq!(generated_line, Some(line_text.as_str()));

                        let back = to_source(&parsed.document, &generation.files, &hit.path, hit.position);
                        prop_assert_eq!(back, Some(position));
                    }
                }
            }
        }
    }

    #[test]
    fn printing_does_not_change_generation(
        config_prefix in any::<bool>(),
        blocks in prop::collection::vec(block_shape(), 1..6),
    ) {
        let source = render(config_prefix, &blocks);
        let first = codeblock::parse(&source, "doc.md").document;
        let second = codeblock::parse(&first.to_string(), "doc.md").document;

        let options = GenerateOptions::default();
        let expected = generate(&first, &options);
        let actual = generate(&second, &options);
        let files = |g: &generator::Generation| {
            g.files.iter().map(|f| (f.path.clone(), f.content.clone())).collect::<Vec<_>>()
        };
        prop_assert_eq!(files(&expected), files(&actual));
        prop_assert_eq!(expected.diagnostics.len(), actual.diagnostics.len());
    }

    #[test]
    fn generated_lines_map_back_into_code(
        config_prefix in any::<bool>(),
        blocks in prop::collection::vec(block_shape(), 1..6),
    ) {
        let source = render(config_prefix, &blocks);
        let parsed = codeblock::parse(&source, "doc.md");
        let generation = generate(&parsed.document, &GenerateOptions::default());

        for file in &generation.files {
            let line_count = file.content.split('\n').count();
            for line in 1..=line_count {
                let position = Position::new(line, 1);
                if let Some(origin) = to_source(&parsed.document, &generation.files, &file.path, position) {
                    let again = to_generated(&parsed.document, &generation.files, origin)
                        .expect("a mapped source line is inside code");
                    prop_assert_eq!(&again.path, &file.path);
                    prop_assert_eq!(again.position, position);
                }
            }
        }
    }
}
