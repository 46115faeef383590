use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use codeblock::{Diagnostic, Position};
use generator::{Extraction, GenerateOptions};

/// Name the fixture body is parsed under; output paths are relative to it.
const FIXTURE_SOURCE: &str = "README.md";

#[derive(Debug, Deserialize)]
pub struct ExpectedFile {
    /// Path relative to the document's output directory.
    pub path: String,

    /// Exact expected content. Omit to only check that the file exists.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedDiagnostic {
    /// Diagnostic kind, e.g. `"DanglingAnnotation"`.
    pub kind: String,

    /// If set, the diagnostic must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedPosition {
    /// `[line, column]` in the fixture body.
    pub source: [usize; 2],

    /// Expected output file, relative to the output directory.
    pub file: String,

    /// `[line, column]` in that file.
    pub generated: [usize; 2],
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Output directory override, as `--outdir` would give.
    #[serde(default)]
    pub out_dir: Option<String>,

    /// Expected generated files. Each listed file must exist; when
    /// `exact_files` is set no other file may be generated.
    #[serde(default)]
    pub expect_file: Vec<ExpectedFile>,

    #[serde(default)]
    pub exact_files: bool,

    /// Expected diagnostics, across every stage, in order. If present (even
    /// empty), count, kind and line are checked.
    #[serde(default)]
    pub expect_diagnostics: Option<Vec<ExpectedDiagnostic>>,

    /// Source positions that must map to the given generated positions and back.
    #[serde(default)]
    pub expect_position: Vec<ExpectedPosition>,
}

/// Split a `.test.md` file into its TOML config and Markdown body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, body))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, body) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let outcome = match check_fixture(&config, body) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Extract `body` and check it against `config`. Returns `Some(reason)` on
/// the first mismatch.
fn check_fixture(config: &TestConfig, body: &str) -> Option<String> {
    let options = GenerateOptions {
        out_dir: config.out_dir.clone(),
    };
    let extraction = Extraction::build(body, FIXTURE_SOURCE, &options);
    let root = extraction.output_dir();

    let outputs: BTreeMap<String, &str> = extraction
        .all_outputs()
        .into_iter()
        .map(|(path, content)| {
            let relative = path.strip_prefix(&root).unwrap_or(path.as_path());
            (relative.to_string_lossy().replace('\\', "/"), content)
        })
        .collect();

    if let Some(reason) = check_files(&outputs, &config.expect_file, config.exact_files) {
        return Some(reason);
    }

    if let Some(expected) = &config.expect_diagnostics {
        let actual: Vec<&Diagnostic> = extraction
            .stages()
            .into_iter()
            .flat_map(|stage| stage.diagnostics())
            .collect();
        if let Some(reason) = check_diagnostics(&actual, expected) {
            return Some(reason);
        }
    }

    for (i, expected) in config.expect_position.iter().enumerate() {
        let source = Position::new(expected.source[0], expected.source[1]);
        let generated = Position::new(expected.generated[0], expected.generated[1]);
        let path = root.join(&expected.file);

        match extraction.to_leaf_generated(source) {
            Some((actual_path, actual)) if actual_path == path && actual == generated => {}
            Some((actual_path, actual)) => {
                return Some(format!(
                    "position[{}]: {} maps to {}:{}, expected {}:{}",
                    i,
                    source,
                    actual_path.display(),
                    actual,
                    expected.file,
                    generated
                ));
            }
            None => {
                return Some(format!(
                    "position[{}]: {} is not inside extracted code",
                    i, source
                ));
            }
        }

        let back = extraction.to_root_source(&path, generated);
        if back != Some(source) {
            return Some(format!(
                "position[{}]: {}:{} maps back to {:?}, expected {}",
                i, expected.file, generated, back, source
            ));
        }
    }

    None
}

fn check_files(
    outputs: &BTreeMap<String, &str>,
    expected: &[ExpectedFile],
    exact: bool,
) -> Option<String> {
    for file in expected {
        let Some(actual) = outputs.get(&file.path) else {
            return Some(format!(
                "expected file {} was not generated\n  generated: {}",
                file.path,
                list_or_none(outputs.keys())
            ));
        };
        if let Some(content) = &file.content {
            if *actual != content.as_str() {
                return Some(format!(
                    "content mismatch in {}\n  expected: {:?}\n  actual:   {:?}",
                    file.path, content, actual
                ));
            }
        }
    }

    if exact {
        let unexpected: Vec<&String> = outputs
            .keys()
            .filter(|path| !expected.iter().any(|file| &file.path == *path))
            .collect();
        if !unexpected.is_empty() {
            return Some(format!(
                "unexpected generated file(s): {}",
                list_or_none(unexpected.into_iter())
            ));
        }
    }

    None
}

/// Check that actual diagnostics match expectations. Returns `Some(reason)` on mismatch.
fn check_diagnostics(actual: &[&Diagnostic], expected: &[ExpectedDiagnostic]) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual.iter().map(|d| format!("  - {}", d)).collect();
        return Some(format!(
            "expected {} diagnostic(s), got {}\n  actual diagnostics:\n{}",
            expected.len(),
            actual.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected).enumerate() {
        if actual.kind.as_str() != expected.kind {
            return Some(format!(
                "diagnostic[{}]: expected kind {}, got: {}",
                i, expected.kind, actual
            ));
        }
        if let Some(line) = expected.line {
            if actual.range.start.line != line {
                return Some(format!(
                    "diagnostic[{}]: expected on line {}, but it starts on line {}",
                    i, line, actual.range.start.line
                ));
            }
        }
    }

    None
}

fn list_or_none<'a>(paths: impl Iterator<Item = &'a String>) -> String {
    let paths: Vec<&str> = paths.map(String::as_str).collect();
    if paths.is_empty() {
        "(none)".to_string()
    } else {
        paths.join(", ")
    }
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

fn label_of(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    })
}

/// Resolve requested category names against what exists. A request also
/// selects every sub-category below it.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let nested = format!("{}/", request);
        let mut found = false;
        for (cat, files) in all {
            if cat == request || cat.starts_with(&nested) {
                selected.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Run all `.test.md` files under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &groups {
        if path.is_dir() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", style.bold(header));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), label_of(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), label_of(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        let failed = failures.len();
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
