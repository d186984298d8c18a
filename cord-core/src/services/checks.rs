//! services/checks.rs
//! The dimension check catalogue: fourteen predicates, each turning a
//! proposal into a [`CheckResult`]. They run unconditionally, in the order
//! declared in [`ALL_CHECKS`], and that order is part of the contract.
//!
//! Inputs arrive here already normalized by the pipeline, so every pattern
//! sees both the original and the canonical form of the text.

use crate::models::{CheckResult, Proposal};
use policies::tables;

const ART_I: &str = "Article I — Prime Directive";
const ART_II: &str = "Article II — Moral Constraints";
const ART_III: &str = "Article III — Truth & Intellectual Integrity";
const ART_IV: &str = "Article IV — Proactive Reasoning";
const ART_V: &str = "Article V — Human Optimization Mandate";
const ART_VI: &str = "Article VI — Financial Stewardship Protocol";
const ART_VII: &str = "Article VII — Security & Privacy Doctrine";
const ART_VIII: &str = "Article VIII — Learning & Adaptation";
const ART_IX: &str = "Article IX — Command Evaluation Framework";
const ART_X: &str = "Article X — Temperament";
const ART_XI: &str = "Article XI — Identity";

pub type Check = fn(&Proposal) -> CheckResult;

/// Execution order is fixed; verdicts preserve it.
pub const ALL_CHECKS: [Check; 14] = [
    check_long_term_alignment,
    check_moral_constraints,
    check_truth_integrity,
    check_consequence_analysis,
    check_sustainability,
    check_financial_risk,
    check_security,
    check_drift,
    check_evaluation_framework,
    check_temperament,
    check_identity,
    check_prompt_injection,
    check_pii_leakage,
    check_tool_risk,
];

pub fn run_all_checks(proposal: &Proposal) -> Vec<CheckResult> {
    ALL_CHECKS.iter().map(|check| check(proposal)).collect()
}

/// Short-term phrasing and review bypass flags work against the session's
/// long-term interests.
fn check_long_term_alignment(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    for signal in tables::SHORT_TERM_SIGNALS {
        if text.contains(signal) {
            score += 1.0;
            reasons.push(format!("Short-term signal detected: '{signal}'"));
        }
    }
    if proposal.flag("bypasses_review") {
        score += 1.5;
        reasons.push("Action bypasses the review process".to_string());
    }

    CheckResult::scored("long_term_alignment", ART_I, score.min(3.0), reasons)
}

/// Hard prohibitions. A pattern hit blocks outright; accumulated deception
/// signals block once they reach the same severity.
fn check_moral_constraints(proposal: &Proposal) -> CheckResult {
    if tables::MORAL_BLOCK.is_match(&proposal.text) {
        return CheckResult {
            dimension: "moral_check",
            article: ART_II,
            score: 5.0,
            reasons: vec!["Moral violation detected — Article II prohibits this action".to_string()],
            hard_block: true,
        };
    }

    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();
    for signal in tables::DECEPTION_SIGNALS {
        if text.contains(signal) {
            score += 2.0;
            reasons.push(format!("Deception signal: '{signal}'"));
        }
    }

    CheckResult {
        dimension: "moral_check",
        article: ART_II,
        score: score.min(5.0),
        reasons,
        hard_block: score >= 4.0,
    }
}

fn check_truth_integrity(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    for signal in tables::FABRICATION_SIGNALS {
        if text.contains(signal) {
            score += 2.0;
            reasons.push(format!("Truth violation: '{signal}'"));
        }
    }
    if proposal.flag("unverified_data") {
        score += 1.0;
        reasons.push("Action relies on unverified data".to_string());
    }

    CheckResult::scored("truth_check", ART_III, score.min(3.0), reasons)
}

fn check_consequence_analysis(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    let high_impact = tables::HIGH_IMPACT_VERB.is_match(&text);
    if high_impact && !proposal.flag("consequence_analysis_done") {
        score += 2.0;
        reasons.push("High-impact action without documented consequence analysis".to_string());
    }
    if high_impact && proposal.flag("no_rollback_plan") {
        score += 1.0;
        reasons.push("No rollback plan for irreversible action".to_string());
    }

    CheckResult::scored("consequence_analysis", ART_IV, score.min(3.0), reasons)
}

fn check_sustainability(proposal: &Proposal) -> CheckResult {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if proposal.flag("exceeds_capacity") {
        score += 2.0;
        reasons.push("Action exceeds stated capacity limits".to_string());
    }
    if proposal.flag("burnout_risk") {
        score += 1.5;
        reasons.push("Burnout risk flagged".to_string());
    }

    CheckResult::scored("sustainability_check", ART_V, score.min(3.0), reasons)
}

fn check_financial_risk(proposal: &Proposal) -> CheckResult {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if tables::FINANCIAL_RISK.is_match(&proposal.text) {
        score += 2.0;
        reasons.push("Financial risk pattern detected".to_string());
    }
    let amount = proposal.amount("financial_amount");
    if amount > 0.0 {
        if !proposal.flag("roi_evaluated") {
            score += 1.5;
            reasons.push(format!("Financial action (${amount}) without ROI evaluation"));
        }
        if proposal.flag("impulsive") {
            score += 2.0;
            reasons.push("Impulsive financial behavior detected".to_string());
        }
    }

    CheckResult::scored("financial_risk", ART_VI, score.min(4.0), reasons)
}

/// Injection, exfiltration, secrets exposure, privilege escalation, and
/// irreversibility. Crossing 4.0 here is a hard block on its own.
fn check_security(proposal: &Proposal) -> CheckResult {
    let text = &proposal.text;
    let lowered = text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if tables::INJECTION.is_match(text) {
        score += 2.0;
        reasons.push("Injection risk — hostile pattern detected".to_string());
    }
    if tables::EXFIL.is_match(text) {
        score += 2.0;
        reasons.push("Data exfiltration risk — outbound transfer pattern detected".to_string());
    }
    if tables::SECRETS.is_match(text) {
        score += 1.5;
        reasons.push("Secrets exposure risk — credential pattern detected".to_string());
    }

    // Privilege escalation only counts for genuinely elevated grants, not
    // ordinary write scopes.
    let dangerous = tables::HIGH_IMPACT_VERB.is_match(&lowered);
    let elevated = proposal.grants.iter().any(|grant| {
        let g = grant.to_lowercase();
        ["admin", "sudo", "root", "write:system"]
            .iter()
            .any(|marker| g.contains(marker))
    });
    if dangerous && elevated {
        score += 2.0;
        reasons.push("Privilege escalation risk — high-impact verb with elevated grants".to_string());
    } else if dangerous {
        score += 1.0;
        reasons.push("High-impact verb detected — requires caution".to_string());
    }

    let reversible_hint = tables::ALLOWLIST_KEYWORD.is_match(&lowered);
    if dangerous && !reversible_hint {
        score += 2.0;
        reasons.push("Irreversible action without safety indicators (dry-run, preview)".to_string());
    }

    let hard_block = score >= 4.0;
    if hard_block {
        reasons.push("Security threat level critical — BLOCK enforced".to_string());
    }

    CheckResult {
        dimension: "security_check",
        article: ART_VII,
        score: score.min(5.0),
        reasons,
        hard_block,
    }
}

/// Attempts to turn the policy layer itself off. One hit blocks.
fn check_drift(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    for signal in tables::DRIFT_SIGNALS {
        if text.contains(signal) {
            return CheckResult {
                dimension: "drift_check",
                article: ART_VIII,
                score: 3.0,
                reasons: vec![format!("Policy drift attempt: '{signal}'")],
                hard_block: true,
            };
        }
    }
    CheckResult::clean("drift_check", ART_VIII)
}

/// Significant actions need a structured assessment. A completed ROI
/// evaluation counts as the full assessment: alternatives were compared and
/// consequences weighed, which is what ROI means.
fn check_evaluation_framework(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let significant = tables::HIGH_IMPACT_VERB.is_match(&text)
        || proposal.flag("significant_impact")
        || proposal.amount("financial_amount") >= 100.0;

    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();
    if significant {
        let roi_done = proposal.flag("roi_evaluated");
        if !(proposal.flag("risk_assessment_done") || roi_done) {
            score += 1.0;
            reasons.push("Significant action without structured risk assessment".to_string());
        }
        if !(proposal.flag("alternative_considered") || roi_done) {
            score += 0.5;
            reasons.push("No alternative solution presented".to_string());
        }
        if !(proposal.flag("consequences_stated") || roi_done) {
            score += 0.5;
            reasons.push("Long-term consequences not documented".to_string());
        }
    }

    CheckResult::scored("evaluation_framework", ART_IX, score.min(3.0), reasons)
}

fn check_temperament(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    for signal in tables::ESCALATION_SIGNALS {
        if text.contains(signal) {
            score += 1.0;
            reasons.push(format!("Emotional escalation detected: '{signal}'"));
        }
    }

    CheckResult::scored("temperament_check", ART_X, score.min(2.0), reasons)
}

fn check_identity(proposal: &Proposal) -> CheckResult {
    let text = proposal.text.to_lowercase();
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if let Some(found) = tables::IDENTITY_VIOLATION.find(&text) {
        score += 3.0;
        reasons.push(format!("Identity violation: '{}'", found.as_str()));
    }

    CheckResult::scored("identity_check", ART_XI, score.min(3.0), reasons)
}

/// Hostile instructions hidden inside data the agent is asked to process.
/// Scans both the proposal description and the raw untrusted input; for
/// external sources, a cluster of imperative override tokens is a softer
/// signal even without a pattern hit.
fn check_prompt_injection(proposal: &Proposal) -> CheckResult {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    let targets = [proposal.text.as_str(), proposal.raw_input.as_str()];
    for target in targets.iter().filter(|t| !t.is_empty()) {
        if let Some(found) = tables::PROMPT_INJECTION.find(target) {
            let snippet: String = found.as_str().chars().take(60).collect();
            score += 4.0;
            reasons.push(format!(
                "Prompt injection attempt detected: '{snippet}' — external data is trying to hijack agent behavior"
            ));
            break; // one hit is enough for a hard block
        }
    }

    if proposal.source == crate::models::Source::External && score == 0.0 {
        let text = proposal.text.to_lowercase();
        let hits = tables::IMPERATIVE_OVERRIDES
            .iter()
            .filter(|token| text.contains(*token))
            .count();
        if hits >= 2 {
            score += 1.5;
            reasons.push(
                "External input contains multiple imperative override signals".to_string(),
            );
        }
    }

    let hard_block = score >= 4.0;
    CheckResult {
        dimension: "prompt_injection",
        article: ART_VII,
        score: score.min(5.0),
        reasons,
        hard_block,
    }
}

/// PII should not leave the system without consent. Outbound action types
/// amplify the score, giving the agent a chance to redact before it moves.
fn check_pii_leakage(proposal: &Proposal) -> CheckResult {
    let mut scan_target = proposal.text.clone();
    if !proposal.raw_input.is_empty() {
        scan_target.push(' ');
        scan_target.push_str(&proposal.raw_input);
    }

    let mut score: f64 = 0.0;
    let mut found: Vec<&str> = Vec::new();
    let mut reasons = Vec::new();

    for (class, pattern) in policies::tables::pii_classes() {
        if pattern.is_match(&scan_target) {
            // Outbound email is often intentional; weigh it lower.
            score += if class == "email" { 1.0 } else { 2.0 };
            found.push(class);
        }
    }
    if tables::PII_FIELD_NAMES.is_match(&scan_target) {
        score += 1.5;
        found.push("pii_field_names");
        reasons.push("PII field names detected in payload — data schema exposure risk".to_string());
    }

    let classes: Vec<&str> = found
        .iter()
        .copied()
        .filter(|f| *f != "pii_field_names")
        .collect();
    if !classes.is_empty() {
        reasons.push(format!(
            "PII detected in proposal: {} — verify consent before transmitting",
            classes.join(", ")
        ));
    }

    if score > 0.0 && proposal.action_type.is_outbound() {
        score *= 1.5;
        reasons.push("PII detected in outbound action — transmission without redaction".to_string());
    }

    CheckResult::scored("pii_leakage", ART_VII, score.min(5.0), reasons)
}

/// Baseline risk by tool surface, with an extra bump for exec + shell grant.
fn check_tool_risk(proposal: &Proposal) -> CheckResult {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    if !proposal.tool_name.is_empty() {
        let tool = proposal.tool_name.to_lowercase();
        let tier = tables::tool_risk_tier(&tool);
        if tier > 0.0 {
            score = tier;
            reasons.push(format!(
                "Tool '{}' has elevated baseline risk (tier score: {tier})",
                proposal.tool_name
            ));
        }
        if tool == "exec" && proposal.grants.iter().any(|g| g == "shell") {
            score += 1.0;
            reasons.push("exec with shell grant — highest risk combination".to_string());
        }
    }

    CheckResult::scored("tool_risk", ART_IX, score.min(4.0), reasons)
}
