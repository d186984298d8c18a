//! The CORD command mediator.
//!
//! Route commands through the engine instead of running them directly:
//!
//!     cord git push origin main
//!     cord status
//!     cord verify
//!
//! The default invocation evaluates the command and, on ALLOW/CONTAIN (or a
//! confirmed CHALLENGE), executes it and propagates the child's exit code.
//! BLOCK and a declined CHALLENGE exit with 1.

use std::env;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::Command as Proc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cord_core::services::audit;
use cord_core::services::intent_lock::{load_intent_lock, set_intent_lock, Scope};
use cord_core::{ActionType, Config, Decision, Engine, Proposal, Verdict};

#[derive(Parser)]
#[command(
    name = "cord",
    about = "CORD — evaluate agent actions before they run",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Cmd>,

    /// Command to evaluate and run (default mode)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show current intent lock status
    Status,
    /// Set a new intent lock
    Lock {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        passphrase: Option<String>,
        #[arg(long)]
        intent: Option<String>,
        /// Allowed paths, comma-separated (defaults to the working directory)
        #[arg(long)]
        paths: Option<String>,
        /// Allowed network host substrings, comma-separated
        #[arg(long)]
        network: Option<String>,
        /// Allowed command regex patterns, comma-separated
        #[arg(long)]
        commands: Option<String>,
    },
    /// Show recent audit log entries
    Log {
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
    /// Verify audit chain integrity
    Verify,
    /// Read a JSON proposal on stdin, write the verdict JSON on stdout
    Bridge,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = env::current_dir().context("resolving working directory")?;
    let config = Config::load(&root)?;

    match cli.cmd {
        Some(Cmd::Status) => cmd_status(&config),
        Some(Cmd::Lock {
            user,
            passphrase,
            intent,
            paths,
            network,
            commands,
        }) => cmd_lock(&config, user, passphrase, intent, paths, network, commands),
        Some(Cmd::Log { tail }) => cmd_log(&config, tail),
        Some(Cmd::Verify) => cmd_verify(&config),
        Some(Cmd::Bridge) => cmd_bridge(config),
        None => cmd_evaluate_and_run(config, &cli.command),
    }
}

fn banner() {
    println!("CORD — Counter-Operations & Risk Detection");
    println!("{}", "-".repeat(50));
}

fn print_verdict(verdict: &Verdict) {
    println!();
    println!("  Decision: {}", verdict.decision);
    println!("  Score:    {}", verdict.score);
    if !verdict.article_violations.is_empty() {
        println!("  Violations: {}", verdict.article_violations.join(", "));
    }
    if !verdict.reasons.is_empty() {
        println!("  Reasons:");
        for reason in &verdict.reasons {
            println!("    - {reason}");
        }
    }
    if !verdict.alternatives.is_empty() && verdict.decision != Decision::Allow {
        println!("  Alternatives:");
        for alternative in &verdict.alternatives {
            println!("    > {alternative}");
        }
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    banner();
    let lock = match load_intent_lock(&config.lock_path) {
        Some(lock) => lock,
        None => {
            println!("  No intent lock set.");
            println!("  Run `cord lock` to set one.");
            return Ok(());
        }
    };

    println!("  Intent lock active");
    println!("  User:    {}", lock.user_id);
    println!("  Intent:  {}", lock.intent_text);
    println!("  Created: {}", lock.created_at);
    if !lock.scope.allow_paths.is_empty() {
        println!("  Paths:   {}", lock.scope.allow_paths.join(", "));
    }
    if !lock.scope.allow_network_targets.is_empty() {
        println!("  Network: {}", lock.scope.allow_network_targets.join(", "));
    }
    if !lock.scope.allow_commands.is_empty() {
        println!("  Commands: {} patterns", lock.scope.allow_commands.len());
    }
    Ok(())
}

fn cmd_lock(
    config: &Config,
    user: Option<String>,
    passphrase: Option<String>,
    intent: Option<String>,
    paths: Option<String>,
    network: Option<String>,
    commands: Option<String>,
) -> Result<()> {
    banner();
    println!("  Set Intent Lock");
    println!();

    let user = prompt_or(user, "  User ID: ")?;
    let passphrase = prompt_or(passphrase, "  Passphrase: ")?;
    let intent = prompt_or(intent, "  Intent (what are you doing this session?): ")?;

    let allow_paths = match split_list(paths) {
        list if list.is_empty() => vec![config.repo_root.display().to_string()],
        list => list,
    };
    let scope = Scope {
        allow_paths,
        allow_commands: split_list(commands),
        allow_network_targets: split_list(network),
    };

    let lock = set_intent_lock(&user, &passphrase, &intent, scope, &config.lock_path)?;
    println!();
    println!("  Intent lock set.");
    println!("  Intent: {}", lock.intent_text);
    Ok(())
}

fn cmd_log(config: &Config, tail: usize) -> Result<()> {
    banner();
    let entries = audit::read_log(&config.log_path);
    if entries.is_empty() {
        println!("  No audit log entries.");
        return Ok(());
    }

    let start = entries.len().saturating_sub(tail);
    let recent = &entries[start..];
    println!("  Last {} of {} entries:", recent.len(), entries.len());
    println!();

    for entry in recent {
        let get = |key: &str| entry.get(key).and_then(|v| v.as_str()).unwrap_or("?");
        let decision = get("decision");
        let timestamp: String = get("timestamp").chars().take(19).collect();
        let score = entry.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let proposal: String = get("proposal").chars().take(60).collect();
        println!("  {timestamp}  {decision:9}  {score:5.1}  {proposal}");
    }
    Ok(())
}

fn cmd_verify(config: &Config) -> Result<()> {
    banner();
    let (valid, count) = audit::verify_chain(&config.log_path);
    if valid {
        println!("  Chain VALID — {count} entries, integrity confirmed");
    } else {
        println!("  Chain CORRUPTED — tampering detected at entry {count}");
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_bridge(config: Config) -> Result<()> {
    let mut raw = String::new();
    if io::stdin().read_to_string(&mut raw).is_err() || raw.trim().is_empty() {
        bridge_error("Empty input — expected JSON proposal on stdin");
    }

    let data: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => bridge_error(&format!("Invalid JSON: {e}")),
    };
    if !data.is_object() {
        bridge_error("Input must be a JSON object");
    }
    let has_text = data
        .get("text")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if !has_text {
        bridge_error("Missing required field: 'text'");
    }

    let proposal: Proposal = match serde_json::from_value(data.clone()) {
        Ok(proposal) => proposal,
        Err(e) => bridge_error(&format!("Invalid proposal: {e}")),
    };

    let mut config = config;
    if let Some(root) = data.get("repo_root").and_then(|v| v.as_str()) {
        config.repo_root = PathBuf::from(root);
    }
    if let Some(path) = data.get("lock_path").and_then(|v| v.as_str()) {
        config.lock_path = PathBuf::from(path);
    }
    if let Some(path) = data.get("log_path").and_then(|v| v.as_str()) {
        config.log_path = PathBuf::from(path);
    }

    let verdict = Engine::new(config).evaluate(proposal);
    println!("{}", verdict.to_json());
    Ok(())
}

fn bridge_error(message: &str) -> ! {
    let error = serde_json::json!({ "error": true, "message": message });
    println!("{error}");
    std::process::exit(1);
}

fn cmd_evaluate_and_run(config: Config, args: &[String]) -> Result<()> {
    if args.is_empty() {
        banner();
        println!("  No command provided.");
        println!("  Usage: cord <command> [args...]");
        std::process::exit(1);
    }

    let command_text = args.join(" ");
    banner();
    println!("  Command: {command_text}");

    let mut proposal = Proposal::new(command_text);
    proposal.action_type = ActionType::Command;

    if let Some(host) = extract_host(&proposal.text) {
        proposal.network_target = host;
    }
    for arg in &args[1..] {
        if arg.starts_with('/') || arg.starts_with('~') || arg.starts_with("./") {
            proposal.target_path = arg.clone();
            break;
        }
    }
    if let Some(lock) = load_intent_lock(&config.lock_path) {
        proposal.session_intent = lock.intent_text;
    }

    let engine = Engine::new(config);
    let verdict = engine.evaluate(proposal);
    print_verdict(&verdict);

    match verdict.decision {
        Decision::Allow => {
            println!();
            println!("  Executing...");
            run_child(args)
        }
        Decision::Contain => {
            println!();
            println!("  Executing with monitoring...");
            run_child(args)
        }
        Decision::Challenge => {
            if confirm_challenge()? {
                println!();
                println!("  Principal confirmed. Executing...");
                run_child(args)
            } else {
                println!();
                println!("  Action cancelled by Principal.");
                std::process::exit(1);
            }
        }
        Decision::Block => {
            println!();
            println!("  BLOCKED — this action violates CORD policy.");
            println!("  The command was not executed.");
            std::process::exit(1);
        }
    }
}

fn run_child(args: &[String]) -> Result<()> {
    let status = Proc::new(&args[0])
        .args(&args[1..])
        .status()
        .with_context(|| format!("executing {}", args[0]))?;
    std::process::exit(status.code().unwrap_or(1));
}

fn confirm_challenge() -> Result<bool> {
    print!("\n  CHALLENGE: Proceed anyway? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return Ok(false);
    }
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn extract_host(text: &str) -> Option<String> {
    let start = text.find("http://").or_else(|| text.find("https://"))?;
    let after_scheme = text[start..].split("//").nth(1)?;
    let host: String = after_scheme
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/')
        .collect();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    if let Some(v) = value {
        if !v.is_empty() {
            return Ok(v);
        }
    }
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
