pub mod replace;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use replace::ReplaceRule;

/// Keyword introducing a per-block annotation.
pub const BLOCK_KEYWORD: &str = "@codeblock";
/// Keyword introducing document-level configuration.
pub const CONFIG_KEYWORD: &str = "@codeblock-config";

/// Why a directive body could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("replace rule must be a string or a [find, with] pair")]
    ReplaceShape,

    #[error("replace rule has an empty search string")]
    EmptyFind,

    #[error("additionalFiles[{index}] has an empty suffix")]
    EmptySuffix { index: usize },
}

/// Document-level settings from a `@codeblock-config` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    /// Text placed once at the start of every generated file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Text placed once at the end of every generated file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
}

/// Per-block settings from a `@codeblock` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Annotation {
    /// Output file. When absent the block continues the previous block's file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub skip: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<ReplaceRule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_files: Vec<AdditionalFile>,
}

/// A sibling output file written verbatim next to the block's resolved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdditionalFile {
    pub suffix: String,
    pub content: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Annotation {
    /// The shorthand `@codeblock name.ts` form.
    pub fn for_file(file: impl Into<String>) -> Self {
        Annotation {
            file: Some(file.into()),
            ..Annotation::default()
        }
    }

    /// Encode back into a body that [`decode_annotation`] reads as an equal value.
    pub fn encode(&self) -> Result<String, serde_yaml::Error> {
        if *self == Annotation::default() {
            return Ok(String::new());
        }
        if let Some(file) = &self.file {
            if *self == Annotation::for_file(file.clone()) && is_bare_token(file) {
                return Ok(format!(" {}", file));
            }
        }
        serde_yaml::to_string(self).map(|yaml| format!("\n{}", yaml))
    }
}

impl Config {
    pub fn encode(&self) -> Result<String, serde_yaml::Error> {
        if *self == Config::default() {
            return Ok(String::new());
        }
        serde_yaml::to_string(self).map(|yaml| format!("\n{}", yaml))
    }
}

/// Decode the body of a `@codeblock` directive (everything after the keyword).
///
/// A lone token without mapping syntax is shorthand for `file: <token>`.
pub fn decode_annotation(body: &str) -> Result<Annotation, DecodeError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Annotation::default());
    }
    if is_bare_token(trimmed) {
        return Ok(Annotation::for_file(trimmed));
    }

    let annotation: Annotation = serde_yaml::from_str(&normalize_body(body))?;
    if let Some(index) = annotation
        .additional_files
        .iter()
        .position(|extra| extra.suffix.is_empty())
    {
        return Err(DecodeError::EmptySuffix { index });
    }
    Ok(annotation)
}

/// Decode the body of a `@codeblock-config` directive.
pub fn decode_config(body: &str) -> Result<Config, DecodeError> {
    if body.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(&normalize_body(body))?)
}

fn is_bare_token(text: &str) -> bool {
    !text.is_empty()
        && !text.contains(char::is_whitespace)
        && !text.contains(':')
        && !text.starts_with(['{', '[', '-', '#', '"', '\'', '|', '>', '&', '*', '!'])
}

/// Prepare a body for YAML decoding.
///
/// A body that starts on the keyword's line is used as written. A body that
/// starts on the following line has its common indentation removed, so an
/// indented comment still decodes as a top-level mapping; block scalars keep
/// their indentation relative to their key.
fn normalize_body(body: &str) -> String {
    let body = body.trim_start_matches([' ', '\t']);
    let rest = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'));
    match rest {
        Some(rest) => dedent(rest),
        None => body.to_string(),
    }
}

fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.trim().is_empty() {
            out.push_str(&line[indent..]);
        }
        out.push('\n');
    }
    out
}
