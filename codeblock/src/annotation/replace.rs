use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::annotation::DecodeError;

/// A literal text substitution applied to a block's code before it is written.
///
/// Every occurrence of the search string is replaced. Matching is a plain
/// substring match, never a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum ReplaceRule {
    /// `[find, with]`
    Pair(String, String),
    /// A bare string: delete every occurrence.
    Remove(String),
}

impl ReplaceRule {
    pub fn find(&self) -> &str {
        match self {
            ReplaceRule::Pair(find, _) => find,
            ReplaceRule::Remove(find) => find,
        }
    }

    pub fn with(&self) -> &str {
        match self {
            ReplaceRule::Pair(_, with) => with,
            ReplaceRule::Remove(_) => "",
        }
    }

    pub fn apply(&self, code: &str) -> String {
        code.replace(self.find(), self.with())
    }
}

/// Apply `rules` to `code` one after another, in declared order.
pub fn apply_all(rules: &[ReplaceRule], code: &str) -> String {
    rules
        .iter()
        .fold(code.to_string(), |acc, rule| rule.apply(&acc))
}

/// Wire shape of a rule as it appears in a directive body.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawRule {
    Pair(Vec<Value>),
    Single(Value),
}

impl TryFrom<RawRule> for ReplaceRule {
    type Error = DecodeError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let rule = match raw {
            RawRule::Pair(items) => match items.as_slice() {
                [find] => ReplaceRule::Remove(scalar_text(find)?),
                [find, with] => ReplaceRule::Pair(scalar_text(find)?, scalar_text(with)?),
                _ => return Err(DecodeError::ReplaceShape),
            },
            RawRule::Single(value) => ReplaceRule::Remove(scalar_text(&value)?),
        };
        if rule.find().is_empty() {
            return Err(DecodeError::EmptyFind);
        }
        Ok(rule)
    }
}

impl From<ReplaceRule> for RawRule {
    fn from(rule: ReplaceRule) -> Self {
        match rule {
            ReplaceRule::Pair(find, with) => {
                RawRule::Pair(vec![Value::String(find), Value::String(with)])
            }
            ReplaceRule::Remove(find) => RawRule::Single(Value::String(find)),
        }
    }
}

/// Unquoted YAML scalars (`42`, `true`) are taken as their literal text.
fn scalar_text(value: &Value) -> Result<String, DecodeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(DecodeError::ReplaceShape),
    }
}
