//! models.rs
//! Core data shapes: Proposal in, Verdict out, CheckResult in between.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Final decision for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "ALLOW")]
    Allow,
    #[serde(rename = "CHALLENGE")]
    Challenge,
    #[serde(rename = "CONTAIN")]
    Contain,
    #[serde(rename = "BLOCK")]
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Challenge => "CHALLENGE",
            Decision::Contain => "CONTAIN",
            Decision::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Command,
    FileOp,
    Network,
    Financial,
    Communication,
    System,
    Query,
    #[default]
    Unknown,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Command => "command",
            ActionType::FileOp => "file_op",
            ActionType::Network => "network",
            ActionType::Financial => "financial",
            ActionType::Communication => "communication",
            ActionType::System => "system",
            ActionType::Query => "query",
            ActionType::Unknown => "unknown",
        }
    }

    pub fn from_tag(tag: &str) -> ActionType {
        match tag {
            "command" => ActionType::Command,
            "file_op" => ActionType::FileOp,
            "network" => ActionType::Network,
            "financial" => ActionType::Financial,
            "communication" => ActionType::Communication,
            "system" => ActionType::System,
            "query" => ActionType::Query,
            _ => ActionType::Unknown,
        }
    }

    /// Outbound action types amplify PII leakage scoring.
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            ActionType::Network | ActionType::Communication | ActionType::FileOp
        )
    }
}

/// Provenance of the raw input attached to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Agent,
    External,
    User,
    ToolResult,
}

/// Deserialize helper: an explicit JSON `null` coerces to the field default
/// instead of failing, so half-filled bridge payloads stay parseable.
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A proposed action submitted for evaluation.
///
/// Missing or null fields coerce to safe defaults (empty string, empty
/// collection). Proposals are treated as immutable once the pipeline has
/// normalized them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, deserialize_with = "null_to_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub action_type: ActionType,
    #[serde(default, deserialize_with = "null_to_default")]
    pub target_path: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub network_target: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub grants: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub session_intent: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub context: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub tool_name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub source: Source,
    #[serde(default, deserialize_with = "null_to_default")]
    pub raw_input: String,
}

impl Proposal {
    pub fn new(text: impl Into<String>) -> Self {
        Proposal {
            text: text.into(),
            ..Proposal::default()
        }
    }

    /// Truthiness of a context flag, JSON-style: `false`, `0`, `""`, `null`,
    /// and empty collections are falsy.
    pub fn flag(&self, key: &str) -> bool {
        match self.context.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    /// Numeric context value, defaulting to 0.
    pub fn amount(&self, key: &str) -> f64 {
        self.context
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// Output of one dimension check. Score 0 with no hard block is clean.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub dimension: &'static str,
    pub article: &'static str,
    pub score: f64,
    pub reasons: Vec<String>,
    pub hard_block: bool,
}

impl CheckResult {
    pub fn clean(dimension: &'static str, article: &'static str) -> Self {
        CheckResult {
            dimension,
            article,
            score: 0.0,
            reasons: Vec::new(),
            hard_block: false,
        }
    }

    pub fn scored(
        dimension: &'static str,
        article: &'static str,
        score: f64,
        reasons: Vec<String>,
    ) -> Self {
        CheckResult {
            dimension,
            article,
            score,
            reasons,
            hard_block: false,
        }
    }
}

/// The engine's answer: decision plus rationale and an audit reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub score: f64,
    #[serde(default)]
    pub risk_profile: BTreeMap<String, f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub article_violations: Vec<String>,
    #[serde(default)]
    pub log_id: String,
}

impl Verdict {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
