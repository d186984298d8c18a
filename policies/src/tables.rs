//! tables.rs
//! Weights, thresholds, pattern tables, and risk classifications.
//!
//! Every keyword list whose false-positive cost matters (high-impact verbs,
//! allowlist keywords, PII field names, identity signals) is compiled as a
//! word-boundary alternation. `lock` must never fire inside `block`, and `rm`
//! must never fire inside `performance`.

use once_cell::sync::Lazy;
use regex::Regex;

fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("policy table regex must compile")
}

// -------------------------------------------------------------------------
// Dimension weights
// -------------------------------------------------------------------------

/// Weight applied to a dimension's raw score in the composite.
/// Unknown dimensions weigh 1.
pub fn weight(dimension: &str) -> f64 {
    match dimension {
        "moral_check" | "prompt_injection" => 5.0,
        "security_check" | "pii_leakage" => 4.0,
        "injection" | "exfil" | "privilege" | "irreversibility" => 4.0,
        "long_term_alignment" | "consequence_analysis" | "financial_risk" => 3.0,
        "evaluation_framework" | "intent_drift" | "rate_anomaly" => 3.0,
        "truth_check" | "sustainability_check" | "drift_check" | "anomaly" => 2.0,
        "tool_risk" | "temperament_check" | "identity_check" => 1.0,
        _ => 1.0,
    }
}

// -------------------------------------------------------------------------
// Decision thresholds
// -------------------------------------------------------------------------

/// Composite score boundaries for the decision mapping.
///
/// `block` and `challenge` share a boundary by default, and the decision
/// mapping tests `block` first, so CHALLENGE is only reachable in a
/// deployment that reconfigures `block > challenge`.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub allow: f64,
    pub contain: f64,
    pub challenge: f64,
    pub block: f64,
}

pub const THRESHOLDS: Thresholds = Thresholds {
    allow: 3.0,
    contain: 5.0,
    challenge: 7.0,
    block: 7.0,
};

// -------------------------------------------------------------------------
// Security patterns
// -------------------------------------------------------------------------

/// Hostile command / code injection shapes.
pub static INJECTION: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(<<|\{\{|\}\}\s*--|;\s*--|\bunion\b|\bdrop\b|\binsert\b|\bexec\b|\bshutdown\b|\brm\s+-rf\b|curl\s+https?:|\beval\b|\bimport\s+os\b|\bsubprocess\b|__import__|os\.system|os\.popen)",
    )
});

/// Outbound data transfer shapes.
pub static EXFIL: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(upload|exfil|curl\s+https?:|wget\s+https?:|scp\s|nc\s|requests\.post|urllib|httpx\.post|send.*to.*server|transmit|beacon)",
    )
});

/// Credential and secret-material references.
pub static SECRETS: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(api[_\- ]?keys?|tokens?|passwords?|secrets?\b|aws_secret|authorization|credentials?|private[_\- ]?keys?|ssh[_\- ]?keys?|\.env\b|keychain|passphrase|system\s+prompts?)",
    )
});

// -------------------------------------------------------------------------
// High-impact verbs and allowlist keywords
// -------------------------------------------------------------------------

pub const HIGH_IMPACT_VERBS: &[&str] = &[
    "delete", "drop", "shutdown", "format", "wipe", "disable", "lock", "kill", "terminate",
    "overwrite", "purge", "destroy", "truncate", "revoke", "erase", "rm", "remove", "uninstall",
];

/// Word-bounded alternation over [`HIGH_IMPACT_VERBS`].
pub static HIGH_IMPACT_VERB: Lazy<Regex> =
    Lazy::new(|| compiled(&format!(r"(?i)\b({})\b", HIGH_IMPACT_VERBS.join("|"))));

/// Signals that an action is non-destructive (preview, dry-run, read paths).
pub const ALLOWLIST_KEYWORDS: &[&str] = &[
    "read-only", "preview", "dry-run", "simulate", "list", "status", "check", "verify",
    "inspect", "view", "describe", "explain", "show", "query", "search",
];

pub static ALLOWLIST_KEYWORD: Lazy<Regex> =
    Lazy::new(|| compiled(&format!(r"(?i)\b({})\b", ALLOWLIST_KEYWORDS.join("|"))));

// -------------------------------------------------------------------------
// Moral / identity / financial patterns
// -------------------------------------------------------------------------

/// Hard prohibitions: fraud, coercion, impersonation, behavioral extortion.
/// A match is an instant BLOCK with no scoring bypass.
pub static MORAL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(steal|fraud|blackmail|extort|coerce|impersonate|forge|counterfeit|phish|exploit\s+vuln|hack\s+into|breach\s+security|harm\s+\w+|threaten|deceive\s+\w+|manipulate\s+\w+|pretend\s+to\s+be\s+(a\s+)?human|as\s+if\s+i\s+am\b|as\s+if\s+you\s+are\b|pose\s+as|masquerade\s+as|the\s+human\s+owner|acting\s+as\s+the\s+human|unless\s+they\s+(pay|comply|agree))",
    )
});

/// Identity-violation shapes, including the non-contiguous ones.
pub static IDENTITY_VIOLATION: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(pretend\s+to\s+be\s+(a\s+)?human|as\s+if\s+i\s+am\b|as\s+if\s+you\s+are\b|\bimpersonate\b|claim\s+to\s+be|pose\s+as|masquerade\s+as|the\s+human\s+owner|acting\s+as\s+the\s+human|respond.*as.*human|present.*as.*human)",
    )
});

pub static FINANCIAL_RISK: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(transfer\s+funds|wire\s+money|invest\s+all|leverage|margin\s+call|high[_-]?risk|gamble|bet\s+on|speculate|all[_-]?in|borrow|loan|credit\s+card|overdraft)",
    )
});

// -------------------------------------------------------------------------
// Prompt injection
// -------------------------------------------------------------------------

/// Hostile instructions hidden inside data the agent processes. `\s*` gaps
/// keep the collapsed word-split forms (`ignorepreviousinstructions`)
/// matchable after normalization.
pub static PROMPT_INJECTION: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)(ignore\s*(previous|prior|all|above)\s*instructions|disregard\s*(all|your|previous)?\s*(instructions|rules|safety)|forget\s*(everything|your\s*instructions|all\s*instructions)|new\s+instructions?\s*:|system\s+override|you\s*are\s*now\b|from\s*now\s*on\b|act\s+as\s+if\s+you\s+are|your\s+new\s+role|pretend\s+you\s+have\s+no|jailbreak|\bdan\s+mode|developer\s+mode|god\s+mode|<\|im_start\|>|\[inst\]|\[system\]|#+\s*system\s+instruction|following\s+text\s+contains\s+your\s+instructions|translate\s+this\s+and\s+(also\s+)?(execute|run|do)|after\s+reading\s+this\s+(do|execute|send))",
    )
});

/// Imperative override tokens for the soft-injection heuristic on external
/// input. Substring counting is intentional; two or more hits is the signal.
pub const IMPERATIVE_OVERRIDES: &[&str] =
    &["ignore", "forget", "disregard", "override", "instead", "now do"];

// -------------------------------------------------------------------------
// PII
// -------------------------------------------------------------------------

pub static PII_SSN: Lazy<Regex> = Lazy::new(|| compiled(r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b"));

pub static PII_CREDIT_CARD: Lazy<Regex> = Lazy::new(|| {
    compiled(r"\b(?:4\d{15}|4\d{12}|5[1-5]\d{14}|3[47]\d{13}|6(?:011|5\d{2})\d{12})\b")
});

pub static PII_EMAIL: Lazy<Regex> =
    Lazy::new(|| compiled(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"));

pub static PII_PHONE: Lazy<Regex> =
    Lazy::new(|| compiled(r"\(\d{3}\)\s*\d{3}[-.\s]?\d{4}|\b\d{3}[-.]\d{3}[-.]\d{4}\b"));

pub static PII_IP_ADDRESS: Lazy<Regex> = Lazy::new(|| compiled(r"\b(?:\d{1,3}\.){3}\d{1,3}\b"));

/// Detection classes in scan order. Email is often intentional in outbound
/// text, so the leakage check weighs it lower than the other classes.
pub fn pii_classes() -> [(&'static str, &'static Regex); 5] {
    [
        ("ssn", Lazy::force(&PII_SSN)),
        ("credit_card", Lazy::force(&PII_CREDIT_CARD)),
        ("email", Lazy::force(&PII_EMAIL)),
        ("phone", Lazy::force(&PII_PHONE)),
        ("ip_address", Lazy::force(&PII_IP_ADDRESS)),
    ]
}

/// Field names that expose a PII-bearing schema even without values.
pub static PII_FIELD_NAMES: Lazy<Regex> = Lazy::new(|| {
    compiled(
        r"(?i)\b(ssn|social[_\s-]?security|credit[_\s-]?card|card[_\s-]?number|date[_\s-]?of[_\s-]?birth|dob|passport|driver[_\s-]?s?[_\s-]?licen[cs]e|bank[_\s-]?account|routing[_\s-]?number|medical[_\s-]?record)\b",
    )
});

// -------------------------------------------------------------------------
// Tool risk tiers
// -------------------------------------------------------------------------

/// Baseline risk by tool surface: exec > network > browser > write/message
/// > edit-family > read-family. Unknown tools get a small nonzero baseline.
pub fn tool_risk_tier(tool_name: &str) -> f64 {
    match tool_name {
        "exec" | "shell" | "command" | "bash" | "subprocess" => 3.0,
        "network" | "fetch" | "request" | "http" => 2.5,
        "browser" => 2.0,
        "write" | "message" | "send" | "email" | "post" | "publish" => 1.5,
        "edit" | "create" | "delete" | "move" | "copy" => 1.0,
        "read" | "query" | "search" | "list" | "get" => 0.0,
        _ => 0.5,
    }
}

// -------------------------------------------------------------------------
// Action type hints
// -------------------------------------------------------------------------

static ACTION_COMMAND: Lazy<Regex> =
    Lazy::new(|| compiled(r"(?i)^(git|npm|pip|docker|kubectl|sudo|apt|brew|make)\s"));
static ACTION_FILE_OP: Lazy<Regex> = Lazy::new(|| {
    compiled(r"(?i)(write|read|edit|create|delete|move|copy|rename)\s+(file|dir|folder|path)")
});
static ACTION_NETWORK: Lazy<Regex> =
    Lazy::new(|| compiled(r"(?i)(curl|wget|fetch|request|api\s+call|http|upload|download)"));
static ACTION_FINANCIAL: Lazy<Regex> =
    Lazy::new(|| compiled(r"(?i)(buy|sell|pay|transfer|invest|trade|purchase|invoice)"));
static ACTION_COMMUNICATION: Lazy<Regex> =
    Lazy::new(|| compiled(r"(?i)(send|email|message|post|publish|tweet|reply|comment)"));
static ACTION_SYSTEM: Lazy<Regex> = Lazy::new(|| {
    compiled(r"(?i)(install|uninstall|configure|chmod|chown|mount|systemctl|service)")
});

/// Classify free text into an action-type tag. First hint wins; the order is
/// part of the policy.
pub fn action_type_hint(text: &str) -> Option<&'static str> {
    let hints: [(&str, &Regex); 6] = [
        ("command", &ACTION_COMMAND),
        ("file_op", &ACTION_FILE_OP),
        ("network", &ACTION_NETWORK),
        ("financial", &ACTION_FINANCIAL),
        ("communication", &ACTION_COMMUNICATION),
        ("system", &ACTION_SYSTEM),
    ];
    hints
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(name, _)| *name)
}

// -------------------------------------------------------------------------
// Phrase lists consumed by the dimension checks
// -------------------------------------------------------------------------

/// Short-term-over-long-term phrasing.
pub const SHORT_TERM_SIGNALS: &[&str] = &[
    "quick fix", "hack around", "skip test", "ignore warning", "temporary workaround",
    "just ship it", "no time to", "deal with later", "tech debt", "shortcut",
];

/// Soft deception phrasing scored below the moral hard-block line.
pub const DECEPTION_SIGNALS: &[&str] = &["hide from", "cover up", "mislead", "fake", "fabricate"];

/// Fabricated-certainty phrasing.
pub const FABRICATION_SIGNALS: &[&str] = &[
    "make up", "invent data", "fake results", "fabricate", "hallucinate", "pretend",
    "assume without",
];

/// Attempts to turn the policy layer itself off.
pub const DRIFT_SIGNALS: &[&str] = &[
    "override constitution", "override protocols", "ignore rules", "bypass policy",
    "disable safety", "turn off checks", "skip validation", "modify core values",
    "change the rules",
];

/// Escalation / ultimatum phrasing.
pub const ESCALATION_SIGNALS: &[&str] = &[
    "threaten", "ultimatum", "demand immediate", "or else", "final warning", "last chance",
];

// -------------------------------------------------------------------------
// Intent matching vocabulary
// -------------------------------------------------------------------------

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "to", "and", "or", "in", "on", "at", "for", "of", "is", "it", "do",
];

/// Small static synonym table for intent alignment. Each row is a canonical
/// token plus the tokens treated as equivalent to it.
pub const INTENT_SYNONYMS: &[(&str, &[&str])] = &[
    ("update", &["edit", "modify", "change", "tweak", "revise", "fix", "patch", "write"]),
    ("publish", &["push", "deploy", "release", "ship", "upload"]),
    ("site", &["html", "page", "website", "web", "contact", "index", "manifesto", "architecture"]),
    ("api", &["api", "artificial", "persistent", "intelligence"]),
    ("build", &["compile", "make", "create", "construct"]),
    ("delete", &["remove", "drop", "purge", "clean", "wipe", "rm"]),
];
