use std::collections::BTreeMap;
use std::path::Path;

use cord_core::services::intent_lock::{set_intent_lock, Scope};
use cord_core::services::interceptor::{
    build_proposal, guard, guard_registry, Enforcer, ToolCall, ToolError, ToolFn,
};
use cord_core::{ActionType, Config, Engine, Proposal, Source};
use serde_json::{json, Value};
use tempfile::tempdir;

const INTENT: &str = "Update API static site and publish to GitHub Pages";

fn engine_with_lock(root: &Path) -> Engine {
    let config = Config::default_at(root);
    set_intent_lock(
        "test-user",
        "test-pass",
        INTENT,
        Scope {
            allow_paths: vec![root.display().to_string()],
            allow_commands: vec![r"^git\s+(push|status|commit|add|diff)".to_string()],
            allow_network_targets: vec!["github.com".to_string()],
        },
        &config.lock_path,
    )
    .expect("set lock");
    Engine::new(config)
}

// ----------------------- Proposal building -----------------------

#[test]
fn exec_tool_takes_first_arg_as_command_with_shell_grant() {
    let call = ToolCall::new().arg("ls -la");
    let proposal = build_proposal("exec", &call, Source::Agent, "");
    assert_eq!(proposal.text, "ls -la");
    assert_eq!(proposal.grants, vec!["shell".to_string()]);
    assert_eq!(proposal.action_type, ActionType::Command);
    assert_eq!(proposal.tool_name, "exec");
}

#[test]
fn exec_tool_accepts_cmd_kwarg() {
    let call = ToolCall::new().kwarg("cmd", "git status");
    let proposal = build_proposal("exec", &call, Source::Agent, "");
    assert_eq!(proposal.text, "git status");
}

#[test]
fn write_tool_extracts_path_and_content() {
    let call = ToolCall::new()
        .arg("/workspace/site/index.html")
        .kwarg("content", "<html>hello</html>");
    let proposal = build_proposal("write", &call, Source::Agent, "");
    assert_eq!(proposal.target_path, "/workspace/site/index.html");
    assert_eq!(proposal.raw_input, "<html>hello</html>");
    assert_eq!(proposal.action_type, ActionType::FileOp);
}

#[test]
fn urls_are_not_mistaken_for_paths() {
    let call = ToolCall::new().arg("https://example.com/a/b");
    let proposal = build_proposal("write", &call, Source::Agent, "");
    assert_eq!(proposal.target_path, "");
}

#[test]
fn network_tool_extracts_host() {
    let call = ToolCall::new().kwarg("url", "https://api.github.com/repos/x/y");
    let proposal = build_proposal("browser", &call, Source::Agent, "");
    assert_eq!(proposal.network_target, "api.github.com");
    assert_eq!(proposal.action_type, ActionType::Network);
}

#[test]
fn message_tool_captures_body_as_raw_input() {
    let call = ToolCall::new().arg("ops@example.com").kwarg("body", "weekly report attached");
    let proposal = build_proposal("send", &call, Source::Agent, "");
    assert_eq!(proposal.raw_input, "weekly report attached");
    assert_eq!(proposal.action_type, ActionType::Communication);
}

#[test]
fn generic_payload_kwarg_captured_when_nothing_specific() {
    let call = ToolCall::new().kwarg("payload", "untrusted text");
    let proposal = build_proposal("custom_tool", &call, Source::External, "");
    assert_eq!(proposal.raw_input, "untrusted text");
    assert_eq!(proposal.source, Source::External);
}

#[test]
fn raw_input_is_capped() {
    let huge = "x".repeat(5000);
    let call = ToolCall::new().kwarg("content", huge);
    let proposal = build_proposal("write", &call, Source::Agent, "");
    assert_eq!(proposal.raw_input.len(), 2000);
}

#[test]
fn empty_call_falls_back_to_tool_name() {
    let proposal = build_proposal("read", &ToolCall::new(), Source::Agent, "");
    assert_eq!(proposal.text, "read");
}

// ----------------------- guard -----------------------

#[test]
fn guard_allows_benign_read() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());

    let safe_read = guard(&engine, "read", Source::Agent, INTENT, |call: &ToolCall| {
        format!("contents of {}", call.args[0].as_str().unwrap_or(""))
    });

    let result = safe_read(ToolCall::new().arg("site notes")).expect("read allowed");
    assert_eq!(result, "contents of site notes");
}

#[test]
fn guard_blocks_destructive_exec() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());

    let executed = std::cell::Cell::new(false);
    let safe_exec = guard(&engine, "exec", Source::Agent, INTENT, |_call: &ToolCall| {
        executed.set(true);
    });

    let err = safe_exec(ToolCall::new().arg("rm -rf /")).expect_err("must block");
    match err {
        ToolError::Blocked { verdict, tool_name, .. } => {
            assert_eq!(tool_name, "exec");
            assert!(!verdict.reasons.is_empty());
        }
        other => panic!("expected Blocked, got: {other}"),
    }
    assert!(!executed.get(), "blocked tool must not run");
}

// ----------------------- guard_registry -----------------------

#[test]
fn registry_routes_through_the_pipeline() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());

    let mut tools: BTreeMap<String, ToolFn> = BTreeMap::new();
    tools.insert(
        "read".to_string(),
        Box::new(|call: &ToolCall| json!(format!("read {} args", call.args.len()))),
    );
    tools.insert("run_cmd".to_string(), Box::new(|_call: &ToolCall| json!("ran")));

    let mut name_map = BTreeMap::new();
    name_map.insert("run_cmd".to_string(), "exec".to_string());

    let registry = guard_registry(&engine, tools, Source::Agent, INTENT, name_map);

    let ok = registry
        .invoke("read", ToolCall::new().arg("the notes"))
        .expect("read allowed");
    assert_eq!(ok, json!("read 1 args"));

    let err = registry
        .invoke("run_cmd", ToolCall::new().arg("rm -rf /"))
        .expect_err("exec rm must block");
    assert!(matches!(err, ToolError::Blocked { .. }));

    let missing = registry.invoke("nope", ToolCall::new()).expect_err("unknown tool");
    assert!(matches!(missing, ToolError::UnknownTool(_)));
}

// ----------------------- Enforcer -----------------------

#[test]
fn enforcer_counts_outcomes_and_keeps_history() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());
    let mut enforcer = Enforcer::new(&engine, "read").with_session_intent(INTENT);

    let value: Value = enforcer
        .call(|_call| json!("ok"), ToolCall::new().arg("site notes"))
        .expect("allowed");
    assert_eq!(value, json!("ok"));
    assert_eq!(enforcer.allowed_count, 1);
    assert_eq!(enforcer.blocked_count, 0);

    enforcer.tool_name = "exec".to_string();
    let err = enforcer.call(|_call| json!("never"), ToolCall::new().arg("rm -rf /"));
    assert!(matches!(err, Err(ToolError::Blocked { .. })));
    assert_eq!(enforcer.blocked_count, 1);
    assert_eq!(enforcer.allowed_count, 1);
    assert_eq!(enforcer.total_evaluations(), 2);
    assert!(enforcer.last_verdict().is_some());
}

#[test]
fn evaluate_only_records_without_executing() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());
    let mut enforcer = Enforcer::new(&engine, "read").with_session_intent(INTENT);

    let verdict = enforcer.evaluate_only("git status");
    assert_eq!(verdict.decision, cord_core::Decision::Allow);
    assert_eq!(enforcer.total_evaluations(), 1);
}

#[test]
fn blocked_error_message_carries_context() {
    let dir = tempdir().expect("tempdir");
    let engine = engine_with_lock(dir.path());

    let safe_exec = guard(&engine, "exec", Source::Agent, INTENT, |_call: &ToolCall| ());
    let err = safe_exec(ToolCall::new().arg("rm -rf /")).expect_err("must block");
    let message = err.to_string();
    assert!(message.contains("CORD BLOCK"));
    assert!(message.contains("exec"));
}

// ----------------------- Evaluate-only proposals keep context -----------------------

#[test]
fn build_proposal_stringifies_mixed_args() {
    let call = ToolCall::new().arg("alpha").arg(7).kwarg("flag", true);
    let proposal: Proposal = build_proposal("custom", &call, Source::Agent, "");
    assert!(proposal.text.contains("alpha"));
    assert!(proposal.text.contains('7'));
    assert!(proposal.text.contains("true"));
}
