//! services/pipeline.rs
//! The evaluation pipeline:
//!   1. normalize: trim, classify, strip obfuscation
//!   2. authenticate: is an intent lock present?
//!   3. scope check: path / network / command allowlists
//!   4. intent match: semantic overlap with the declared intent
//!   5. rate limit: proposal burst detection against the audit log
//!   6. dimension checks: the full catalogue, fixed order
//!   7. risk score: weighted composite plus anomaly amplification
//!   8. decision: thresholds with hard-block precedence
//!   9. audit + verdict: append the chained entry, return the result
//!
//! The pipeline never raises for policy reasons; it always returns a
//! verdict. Internal I/O failures degrade (absent lock, empty log id) and
//! the evaluation proceeds.

use serde_json::json;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::{ActionType, CheckResult, Proposal, Verdict};
use crate::services::audit;
use crate::services::checks::run_all_checks;
use crate::services::intent_lock::{load_intent_lock, IntentLock};
use crate::services::scoring;
use policies::normalize::normalize_pair;
use policies::tables::action_type_hint;

const ART_LOCK: &str = "CORD — Intent Lock";
const ART_SCOPE: &str = "CORD — Scope Enforcement";
const ART_INTENT: &str = "CORD — Intent Alignment";
const ART_VII: &str = "Article VII — Security & Privacy Doctrine";

pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline on a proposal.
    pub fn evaluate(&self, proposal: Proposal) -> Verdict {
        let mut proposal = proposal;

        // Step 1: trim, classify, normalize.
        proposal.text = proposal.text.trim().to_string();
        if proposal.action_type == ActionType::Unknown {
            if let Some(tag) = action_type_hint(&proposal.text) {
                proposal.action_type = ActionType::from_tag(tag);
            }
        }
        let (text, raw_input) = normalize_pair(&proposal.text, &proposal.raw_input);
        proposal.text = text;
        proposal.raw_input = raw_input;

        // Steps 2-5 produce optional extra results; the catalogue runs on
        // every proposal regardless.
        let lock = load_intent_lock(&self.config.lock_path);
        let auth_result = self.authenticate(lock.as_ref());
        let scope_result = self.scope_check(&proposal, lock.as_ref());
        let intent_result = self.intent_match(&proposal, lock.as_ref());
        let rate_result = self.rate_check();

        // Step 6: the catalogue, fixed order.
        let mut results = run_all_checks(&proposal);
        results.extend(auth_result);
        results.extend(scope_result);
        results.extend(intent_result);
        results.extend(rate_result);

        // Steps 7-8: score and decide.
        let anomaly = scoring::anomaly_amplification(&results);
        let total = scoring::composite_score(&results) + anomaly;
        let score = round2(total);
        let decision = scoring::decide(total, &results);

        let reasons = scoring::collect_reasons(&results);
        let violations = scoring::collect_violations(&results);
        let alternatives = suggest_alternatives(&proposal, &reasons);

        let mut risk_profile: BTreeMap<String, f64> = BTreeMap::new();
        for result in &results {
            if result.score > 0.0 {
                risk_profile.insert(result.dimension.to_string(), result.score);
            }
        }
        if anomaly > 0.0 {
            risk_profile.insert("anomaly_amplification".to_string(), anomaly);
        }

        // Step 9: audit, then verdict. A failed append degrades to an empty
        // log id rather than aborting the evaluation.
        let payload = json!({
            "decision": decision.as_str(),
            "score": score,
            "risk_profile": &risk_profile,
            "reasons": &reasons,
            "violations": &violations,
            "proposal": &proposal.text,
            "action_type": proposal.action_type.as_str(),
            "target_path": &proposal.target_path,
            "network_target": &proposal.network_target,
        });
        let log_id = match audit::append_log(payload, &self.config.log_path, self.config.redaction)
        {
            Ok(hash) => hash,
            Err(error) => {
                tracing::warn!(%error, "audit append failed; verdict carries no log id");
                String::new()
            }
        };

        Verdict {
            decision,
            score,
            risk_profile,
            reasons,
            alternatives,
            article_violations: violations,
            log_id,
        }
    }

    /// Step 2: an absent lock elevates the score but never blocks by itself.
    fn authenticate(&self, lock: Option<&IntentLock>) -> Option<CheckResult> {
        if lock.is_some() {
            return None;
        }
        Some(CheckResult::scored(
            "authentication",
            ART_LOCK,
            2.0,
            vec![
                "No intent lock set — session purpose undefined, operating in restricted mode"
                    .to_string(),
            ],
        ))
    }

    /// Step 3: every out-of-scope target accumulates; the combined result
    /// hard-blocks at 4.
    fn scope_check(&self, proposal: &Proposal, lock: Option<&IntentLock>) -> Option<CheckResult> {
        let lock = lock?;
        let scope = &lock.scope;
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if !proposal.target_path.is_empty()
            && !scope.is_path_allowed(&proposal.target_path, &self.config.repo_root)
        {
            score += 2.0;
            reasons.push(format!(
                "Path '{}' is outside allowed scope",
                proposal.target_path
            ));
        }
        if !proposal.network_target.is_empty()
            && !scope.is_network_allowed(&proposal.network_target)
        {
            score += 2.0;
            reasons.push(format!(
                "Network target '{}' is not in allowlist",
                proposal.network_target
            ));
        }
        // Command scope only applies to proposals that look like CLI commands.
        if !proposal.text.is_empty()
            && matches!(
                proposal.action_type,
                ActionType::Command | ActionType::System
            )
            && !scope.is_command_allowed(&proposal.text)
        {
            score += 1.0;
            reasons.push("Command not in allowed command patterns".to_string());
        }

        if score > 0.0 {
            Some(CheckResult {
                dimension: "scope_check",
                article: ART_SCOPE,
                score,
                reasons,
                hard_block: score >= 4.0,
            })
        } else {
            None
        }
    }

    /// Step 4: flag drift when the proposal shares no expanded vocabulary
    /// with the declared intent.
    fn intent_match(&self, proposal: &Proposal, lock: Option<&IntentLock>) -> Option<CheckResult> {
        let lock = lock?;
        if lock.matches_intent(proposal) {
            return None;
        }
        Some(CheckResult::scored(
            "intent_drift",
            ART_INTENT,
            1.5,
            vec![
                format!("Proposal may drift from declared intent: '{}'", lock.intent_text),
                "No meaningful overlap between proposal and session intent".to_string(),
            ],
        ))
    }

    /// Step 5: thresholds are intentionally generous; active sessions run
    /// 10-20/min. Flag above 30/min, hard block past 60/min with the window
    /// exceeded.
    fn rate_check(&self) -> Option<CheckResult> {
        let (exceeded, count, rate_per_min) = audit::check_rate_limit(
            self.config.rate_window_secs,
            self.config.rate_max_count,
            &self.config.log_path,
        );
        if rate_per_min <= 30.0 && !exceeded {
            return None;
        }
        let score = if rate_per_min > 30.0 {
            (2.0 + rate_per_min / 30.0).min(5.0)
        } else {
            2.0
        };
        Some(CheckResult {
            dimension: "rate_anomaly",
            article: ART_VII,
            score,
            reasons: vec![format!(
                "Rate anomaly: {count} proposals in last {}s ({rate_per_min}/min) — possible abuse loop or runaway agent",
                self.config.rate_window_secs
            )],
            hard_block: exceeded && rate_per_min > 60.0,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Heuristic safer alternatives derived from what was flagged. A BLOCK
/// always carries at least one entry.
fn suggest_alternatives(proposal: &Proposal, reasons: &[String]) -> Vec<String> {
    let lowered: Vec<String> = reasons.iter().map(|r| r.to_lowercase()).collect();
    let any = |needle: &str| lowered.iter().any(|r| r.contains(needle));
    let text = proposal.text.to_lowercase();

    let mut alternatives = Vec::new();
    if any("irreversi") {
        alternatives.push("Run with --dry-run or --preview first to assess impact".to_string());
    }
    if any("exfil") {
        alternatives.push("Review data before sending and minimize what leaves the system".to_string());
    }
    if any("financial") {
        alternatives.push("Perform a structured ROI analysis before committing funds".to_string());
    }
    if any("scope") {
        alternatives.push("Update the intent lock to expand scope if this action is intentional".to_string());
    }
    if ["rm -rf", "delete", "wipe", "purge"].iter().any(|v| text.contains(v)) {
        alternatives.push("Use a staging or trash approach instead of permanent deletion".to_string());
    }
    if alternatives.is_empty() {
        alternatives.push("No specific alternative needed; action appears within bounds".to_string());
    }
    alternatives
}
