//! services/interceptor.rs
//! Framework-level enforcement for tool calls.
//!
//! Instead of asking agents to call `evaluate` before every action, the
//! interceptor wraps tool callables so evaluation happens automatically:
//! build a [`Proposal`] from the call's arguments, run the pipeline, then
//! route on the decision. This is the only layer that raises: BLOCK and
//! CHALLENGE surface as typed errors carrying the full verdict.
//!
//! Three shapes:
//! - [`guard`] wraps a single callable,
//! - [`guard_registry`] wraps a whole tool map,
//! - [`Enforcer`] is a scoped object with counters and verdict history.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{ActionType, Proposal, Source, Verdict};
use crate::services::pipeline::Engine;

/// Captured raw input is capped so a huge payload cannot stall the matchers.
const RAW_INPUT_CAP: usize = 2000;

static URL_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://([^\s/]+)").expect("url regex"));

/// Positional and keyword arguments of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl ToolCall {
    pub fn new() -> Self {
        ToolCall::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(
        "CORD BLOCK — {tool_name}({args_summary}) [score={}, violations={:?}] {}",
        .verdict.score,
        .verdict.article_violations,
        head_reasons(.verdict)
    )]
    Blocked {
        verdict: Verdict,
        tool_name: String,
        args_summary: String,
    },

    #[error(
        "CORD CHALLENGE — {tool_name}({args_summary}) [score={}] Requires principal confirmation.",
        .verdict.score
    )]
    Challenged {
        verdict: Verdict,
        tool_name: String,
        args_summary: String,
    },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

fn head_reasons(verdict: &Verdict) -> String {
    let head: Vec<String> = verdict.reasons.iter().take(3).cloned().collect();
    head.join("; ")
}

/// Map a tool name to an action type.
fn tool_action_type(tool_name: &str) -> ActionType {
    match tool_name {
        "exec" | "shell" | "command" | "bash" | "subprocess" => ActionType::Command,
        "write" | "edit" | "create" | "delete" | "move" | "copy" => ActionType::FileOp,
        "read" | "query" | "search" | "list" | "get" => ActionType::Query,
        "network" | "browser" | "fetch" | "request" | "http" => ActionType::Network,
        "message" | "send" | "email" | "post" | "publish" => ActionType::Communication,
        _ => ActionType::Unknown,
    }
}

/// Does this string look like a filesystem path? URLs contain slashes but
/// are not paths.
fn looks_like_path(s: &str) -> bool {
    if s.starts_with("http://") || s.starts_with("https://") || s.starts_with("ftp://")
        || s.starts_with("s3://")
    {
        return false;
    }
    s.starts_with('/') || s.starts_with("~/") || s.starts_with("./") || s.starts_with("../")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capped(text: &str) -> String {
    text.chars().take(RAW_INPUT_CAP).collect()
}

/// Build a proposal from a tool call's arguments.
///
/// Field extraction depends on the tool family: exec tools contribute the
/// command text and a `shell` grant, file tools a target path and the
/// written content, network tools the destination host, message tools the
/// outbound body. Any of the common untrusted-input kwargs is captured for
/// injection scanning when nothing more specific already was.
pub fn build_proposal(
    tool_name: &str,
    call: &ToolCall,
    source: Source,
    session_intent: &str,
) -> Proposal {
    let all_values: Vec<&Value> = call
        .args
        .iter()
        .chain(call.kwargs.values())
        .filter(|v| !v.is_null())
        .collect();

    let text_parts: Vec<String> = all_values.iter().map(|v| value_text(v)).collect();
    let mut text = if text_parts.is_empty() {
        tool_name.to_string()
    } else {
        text_parts.join(" ")
    };

    let action_type = tool_action_type(tool_name);
    let mut target_path = String::new();
    let mut network_target = String::new();
    let mut grants: Vec<String> = Vec::new();
    let mut raw_input = String::new();

    let kwarg_text = |key: &str| {
        call.kwargs
            .get(key)
            .filter(|v| !v.is_null())
            .map(value_text)
            .filter(|s| !s.is_empty())
    };

    match tool_name {
        "exec" | "shell" | "command" | "bash" | "subprocess" => {
            grants.push("shell".to_string());
            if let Some(first) = call.args.first() {
                text = value_text(first);
            } else if let Some(cmd) = kwarg_text("cmd").or_else(|| kwarg_text("command")) {
                text = cmd;
            }
        }
        "write" | "edit" | "create" | "delete" | "move" | "copy" => {
            for value in &all_values {
                let s = value_text(value);
                if looks_like_path(&s) {
                    target_path = s;
                    break;
                }
            }
            for key in ["content", "data", "body", "text"] {
                if let Some(content) = kwarg_text(key) {
                    raw_input = capped(&content);
                    break;
                }
            }
        }
        "network" | "browser" | "fetch" | "request" | "http" => {
            for value in &all_values {
                if let Some(caps) = URL_HOST.captures(&value_text(value)) {
                    network_target = caps[1].to_string();
                    break;
                }
            }
            if let Some(url) = kwarg_text("url") {
                if let Some(caps) = URL_HOST.captures(&url) {
                    network_target = caps[1].to_string();
                }
            }
        }
        "read" | "query" | "search" | "list" | "get" => {
            for value in &all_values {
                let s = value_text(value);
                if looks_like_path(&s) {
                    target_path = s;
                    break;
                }
            }
        }
        "message" | "send" | "email" | "post" | "publish" => {
            for key in ["body", "content", "message", "text"] {
                if let Some(body) = kwarg_text(key) {
                    raw_input = capped(&body);
                    break;
                }
            }
        }
        _ => {}
    }

    if raw_input.is_empty() {
        for key in ["raw_input", "input", "body", "content", "data", "payload"] {
            if let Some(captured) = kwarg_text(key) {
                raw_input = capped(&captured);
                break;
            }
        }
    }

    Proposal {
        text,
        action_type,
        target_path,
        network_target,
        grants,
        session_intent: session_intent.to_string(),
        tool_name: tool_name.to_string(),
        source,
        raw_input,
        ..Proposal::default()
    }
}

/// Short argument summary for error messages.
fn summarize_args(call: &ToolCall) -> String {
    let mut parts: Vec<String> = call.args.iter().take(3).map(|v| v.to_string()).collect();
    parts.extend(
        call.kwargs
            .iter()
            .take(3)
            .map(|(k, v)| format!("{k}={v}")),
    );
    let summary = parts.join(", ");
    if summary.chars().count() > 80 {
        let head: String = summary.chars().take(77).collect();
        format!("{head}...")
    } else {
        summary
    }
}

fn route<T>(
    verdict: Verdict,
    tool_name: &str,
    call: &ToolCall,
    approve: Option<&dyn Fn(&Verdict, &str, &ToolCall) -> bool>,
    run: impl FnOnce() -> T,
) -> Result<T, ToolError> {
    match verdict.decision {
        crate::models::Decision::Block => Err(ToolError::Blocked {
            tool_name: tool_name.to_string(),
            args_summary: summarize_args(call),
            verdict,
        }),
        crate::models::Decision::Challenge => {
            let approved = approve
                .map(|handler| handler(&verdict, tool_name, call))
                .unwrap_or(false);
            if approved {
                Ok(run())
            } else {
                Err(ToolError::Challenged {
                    tool_name: tool_name.to_string(),
                    args_summary: summarize_args(call),
                    verdict,
                })
            }
        }
        _ => Ok(run()),
    }
}

/// Wrap a single callable with enforcement. The returned closure evaluates
/// every call and only invokes the tool on ALLOW/CONTAIN (or an approved
/// CHALLENGE, which without a handler is always refused).
pub fn guard<'e, T>(
    engine: &'e Engine,
    tool_name: impl Into<String>,
    source: Source,
    session_intent: impl Into<String>,
    tool: impl Fn(&ToolCall) -> T + 'e,
) -> impl Fn(ToolCall) -> Result<T, ToolError> + 'e {
    let tool_name = tool_name.into();
    let session_intent = session_intent.into();
    move |call: ToolCall| {
        let proposal = build_proposal(&tool_name, &call, source, &session_intent);
        let verdict = engine.evaluate(proposal);
        route(verdict, &tool_name, &call, None, || tool(&call))
    }
}

pub type ToolFn = Box<dyn Fn(&ToolCall) -> Value>;

/// A tool registry where every entry is evaluated before it runs.
pub struct GuardedRegistry<'e> {
    engine: &'e Engine,
    source: Source,
    session_intent: String,
    name_map: BTreeMap<String, String>,
    tools: BTreeMap<String, ToolFn>,
}

impl<'e> GuardedRegistry<'e> {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Invoke a registered tool through the pipeline.
    pub fn invoke(&self, key: &str, call: ToolCall) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(key)
            .ok_or_else(|| ToolError::UnknownTool(key.to_string()))?;
        let cord_name = self.name_map.get(key).map(String::as_str).unwrap_or(key);
        let proposal = build_proposal(cord_name, &call, self.source, &self.session_intent);
        let verdict = self.engine.evaluate(proposal);
        route(verdict, cord_name, &call, None, || tool(&call))
    }
}

/// Wrap a whole registry. `name_map` optionally remaps registry keys to
/// policy tool names (e.g. `run_cmd` -> `exec`).
pub fn guard_registry<'e>(
    engine: &'e Engine,
    tools: BTreeMap<String, ToolFn>,
    source: Source,
    session_intent: impl Into<String>,
    name_map: BTreeMap<String, String>,
) -> GuardedRegistry<'e> {
    GuardedRegistry {
        engine,
        source,
        session_intent: session_intent.into(),
        name_map,
        tools,
    }
}

/// Scoped enforcement with counters and verdict history.
pub struct Enforcer<'e> {
    engine: &'e Engine,
    pub tool_name: String,
    pub source: Source,
    pub session_intent: String,
    on_challenge: Option<Box<dyn Fn(&Verdict, &str, &ToolCall) -> bool + 'e>>,
    pub verdicts: Vec<Verdict>,
    pub blocked_count: usize,
    pub allowed_count: usize,
    pub challenged_count: usize,
}

impl<'e> Enforcer<'e> {
    pub fn new(engine: &'e Engine, tool_name: impl Into<String>) -> Self {
        Enforcer {
            engine,
            tool_name: tool_name.into(),
            source: Source::Agent,
            session_intent: String::new(),
            on_challenge: None,
            verdicts: Vec::new(),
            blocked_count: 0,
            allowed_count: 0,
            challenged_count: 0,
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_session_intent(mut self, intent: impl Into<String>) -> Self {
        self.session_intent = intent.into();
        self
    }

    /// Install a CHALLENGE handler. Returning true lets the call proceed.
    pub fn with_challenge_handler(
        mut self,
        handler: impl Fn(&Verdict, &str, &ToolCall) -> bool + 'e,
    ) -> Self {
        self.on_challenge = Some(Box::new(handler));
        self
    }

    /// Execute a tool through evaluation.
    pub fn call<T>(
        &mut self,
        tool: impl FnOnce(&ToolCall) -> T,
        call: ToolCall,
    ) -> Result<T, ToolError> {
        let proposal = build_proposal(&self.tool_name, &call, self.source, &self.session_intent);
        let verdict = self.engine.evaluate(proposal);
        self.verdicts.push(verdict.clone());

        match verdict.decision {
            crate::models::Decision::Block => self.blocked_count += 1,
            crate::models::Decision::Challenge => self.challenged_count += 1,
            _ => {}
        }

        let handler = self.on_challenge.as_deref();
        let result = route(verdict, &self.tool_name, &call, handler, || tool(&call));
        if result.is_ok() {
            self.allowed_count += 1;
        }
        result
    }

    /// Evaluate a proposal without executing anything. Pre-flight checks.
    pub fn evaluate_only(&mut self, text: &str) -> Verdict {
        let proposal = Proposal {
            text: text.to_string(),
            tool_name: self.tool_name.clone(),
            source: self.source,
            session_intent: self.session_intent.clone(),
            ..Proposal::default()
        };
        let verdict = self.engine.evaluate(proposal);
        self.verdicts.push(verdict.clone());
        verdict
    }

    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.verdicts.last()
    }

    pub fn total_evaluations(&self) -> usize {
        self.verdicts.len()
    }
}
