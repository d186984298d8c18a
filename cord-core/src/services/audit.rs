//! services/audit.rs
//! Append-only JSONL audit log with SHA-256 hash chaining.
//!
//! Every entry records its predecessor's hash (`GENESIS` for the first), and
//! its own hash over `prev_hash || canonical-json(entry-without-entry_hash)`.
//! The chain is valid iff both links hold for every entry.
//!
//! Appends are serialized through a process-wide mutex: each writer must
//! observe the current tail before computing `prev_hash`, or the chain forks.
//! Readers tolerate a partially written last line by discarding any segment
//! not terminated with a newline.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::config::RedactionLevel;
use crate::utils::hash::sha256_hex;
use policies::tables::{PII_CREDIT_CARD, PII_EMAIL, PII_PHONE, PII_SSN};

pub const GENESIS: &str = "GENESIS";

static APPEND_LOCK: Mutex<()> = Mutex::new(());

/// Payload fields that may carry free text and therefore get redacted.
const REDACTED_FIELDS: &[&str] = &["proposal", "text", "path"];

/// Append one payload to the chained log. Returns the new entry's hash,
/// which doubles as the verdict's log id.
pub fn append_log(
    payload: Value,
    log_path: &Path,
    redaction: RedactionLevel,
) -> anyhow::Result<String> {
    let _guard = APPEND_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let timestamp = Utc::now().to_rfc3339();
    let prev_hash = tail_hash(log_path);

    let mut base = Map::new();
    base.insert("timestamp".into(), Value::String(timestamp));
    base.insert("prev_hash".into(), Value::String(prev_hash.clone()));
    if let Value::Object(fields) = payload {
        for (key, value) in fields {
            let value = match value {
                Value::String(text) if REDACTED_FIELDS.contains(&key.as_str()) => {
                    Value::String(redact_field(&text, redaction))
                }
                other => other,
            };
            base.insert(key, value);
        }
    }

    let base = Value::Object(base);
    let entry_hash = sha256_hex(&format!("{prev_hash}{}", canonical_json(&base)));

    let mut entry = base;
    entry["entry_hash"] = Value::String(entry_hash.clone());

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}", canonical_json(&entry))?;

    Ok(entry_hash)
}

/// Walk the chain from GENESIS. Returns `(true, entry_count)` on success or
/// `(false, index)` at the first unparseable, unlinked, or rehash-mismatched
/// entry.
pub fn verify_chain(log_path: &Path) -> (bool, usize) {
    let content = match fs::read_to_string(log_path) {
        Ok(content) => content,
        Err(_) => return (true, 0),
    };

    let mut expected_prev = GENESIS.to_string();
    let mut count = 0usize;
    for (i, line) in complete_lines(&content).enumerate() {
        let mut entry: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => return (false, i),
        };
        if entry.get("prev_hash").and_then(Value::as_str) != Some(expected_prev.as_str()) {
            return (false, i);
        }
        let stored = entry
            .as_object_mut()
            .and_then(|map| map.remove("entry_hash"))
            .and_then(|v| v.as_str().map(String::from));
        let stored = match stored {
            Some(hash) => hash,
            None => return (false, i),
        };
        let prev = entry
            .get("prev_hash")
            .and_then(Value::as_str)
            .unwrap_or(GENESIS)
            .to_string();
        let recomputed = sha256_hex(&format!("{prev}{}", canonical_json(&entry)));
        if stored != recomputed {
            return (false, i);
        }
        expected_prev = stored;
        count += 1;
    }
    (true, count)
}

/// All parseable entries, oldest first. Corrupt lines are skipped; chain
/// validity is [`verify_chain`]'s job, not this reader's.
pub fn read_log(log_path: &Path) -> Vec<Value> {
    let content = match fs::read_to_string(log_path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };
    complete_lines(&content)
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// Count entries inside the trailing window. Returns
/// `(exceeded, count_in_window, rate_per_minute)`.
///
/// A burst of proposals is a signal: jailbreak loops, gradual escalation,
/// or a runaway agent.
pub fn check_rate_limit(
    window_seconds: i64,
    max_count: usize,
    log_path: &Path,
) -> (bool, usize, f64) {
    let entries = read_log(log_path);
    if entries.is_empty() {
        return (false, 0, 0.0);
    }

    let cutoff = Utc::now() - Duration::seconds(window_seconds);
    let count = entries
        .iter()
        .filter_map(|entry| entry.get("timestamp").and_then(Value::as_str))
        .filter_map(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .filter(|ts| ts.with_timezone(&Utc) >= cutoff)
        .count();

    let rate = (count as f64 / window_seconds as f64) * 60.0;
    (count >= max_count, count, (rate * 10.0).round() / 10.0)
}

/// Canonical JSON: object keys sorted, no extra whitespace. The entry hash
/// is always computed over this form, whatever the on-disk line looks like.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Redact one payload field according to the configured level.
pub fn redact_field(text: &str, level: RedactionLevel) -> String {
    match level {
        RedactionLevel::None => text.to_string(),
        RedactionLevel::Pii => redact_pii(text),
        RedactionLevel::Full => format!("{}...[redacted]", &sha256_hex(text)[..16]),
    }
}

/// Substitute PII matches with typed markers, using the same patterns the
/// leakage check scans with.
pub fn redact_pii(text: &str) -> String {
    let step = PII_SSN.replace_all(text, "[SSN-REDACTED]");
    let step = PII_CREDIT_CARD.replace_all(&step, "[CC-REDACTED]");
    let step = PII_EMAIL.replace_all(&step, "[EMAIL-REDACTED]");
    PII_PHONE.replace_all(&step, "[PHONE-REDACTED]").into_owned()
}

/// Hash of the last complete entry, or GENESIS for an empty/missing log.
fn tail_hash(log_path: &Path) -> String {
    let content = match fs::read_to_string(log_path) {
        Ok(content) => content,
        Err(_) => return GENESIS.to_string(),
    };
    let last = match complete_lines(&content).last() {
        Some(line) => line,
        None => return GENESIS.to_string(),
    };
    serde_json::from_str::<Value>(last)
        .ok()
        .and_then(|entry| {
            entry
                .get("entry_hash")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| GENESIS.to_string())
}

/// Non-empty complete lines. When the content does not end with a newline,
/// the trailing segment is an in-flight write and is discarded.
fn complete_lines(content: &str) -> impl Iterator<Item = &str> {
    let terminated = match content.rfind('\n') {
        Some(pos) => &content[..=pos],
        None => "",
    };
    terminated
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}
