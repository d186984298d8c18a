//! services/scoring.rs
//! Weighted composite scoring, anomaly amplification, and the decision map.

use crate::models::{CheckResult, Decision};
use policies::tables::{weight, THRESHOLDS};

/// Weighted sum over all check results. Dimensions without a configured
/// weight count at 1.
pub fn composite_score(results: &[CheckResult]) -> f64 {
    results
        .iter()
        .map(|result| result.score * weight(result.dimension))
        .sum()
}

/// Additive term when several dimensions flag high risk at once: 1.0 for
/// two signals at score >= 2, 2.0 for three, 3.0 for four or more.
pub fn anomaly_amplification(results: &[CheckResult]) -> f64 {
    let high_signals = results.iter().filter(|r| r.score >= 2.0).count();
    match high_signals {
        0 | 1 => 0.0,
        2 => 1.0,
        3 => 2.0,
        _ => 3.0,
    }
}

pub fn has_hard_block(results: &[CheckResult]) -> bool {
    results.iter().any(|r| r.hard_block)
}

/// Map a composite score to a decision. Any hard block wins outright.
/// BLOCK is tested before CHALLENGE, so with the default shared threshold
/// the CHALLENGE band is empty; it opens up only when a deployment sets
/// `block > challenge`.
pub fn decide(score: f64, results: &[CheckResult]) -> Decision {
    if has_hard_block(results) {
        return Decision::Block;
    }
    if score >= THRESHOLDS.block {
        return Decision::Block;
    }
    if score >= THRESHOLDS.challenge {
        return Decision::Challenge;
    }
    if score >= THRESHOLDS.contain {
        return Decision::Contain;
    }
    Decision::Allow
}

/// Reasons from every flagged check, in execution order.
pub fn collect_reasons(results: &[CheckResult]) -> Vec<String> {
    let mut reasons = Vec::new();
    for result in results {
        if result.score > 0.0 || result.hard_block {
            reasons.extend(result.reasons.iter().cloned());
        }
    }
    reasons
}

/// Article labels from flagged checks, deduplicated, insertion order kept.
pub fn collect_violations(results: &[CheckResult]) -> Vec<String> {
    let mut violations: Vec<String> = Vec::new();
    for result in results {
        if (result.score > 0.0 || result.hard_block)
            && !violations.iter().any(|v| v == result.article)
        {
            violations.push(result.article.to_string());
        }
    }
    violations
}
