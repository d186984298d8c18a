//! services/intent_lock.rs
//! Session binding: declared intent + scope allowlists + passphrase hash,
//! persisted as a single JSON file.
//!
//! A lock is either present and valid or absent. Malformed or truncated lock
//! files load as absent; only lock *creation* can fail loudly.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::Proposal;
use crate::utils::hash::sha256_hex;
use crate::utils::paths::lexical_resolve;
use policies::tables::{INTENT_SYNONYMS, STOP_WORDS};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("user_id, passphrase, and intent_text are required")]
    InvalidArgument,
    #[error("writing lock file: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding lock file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Allowed boundaries for a session: filesystem prefixes, command regex
/// patterns, and network host substrings. Empty lists deny all non-empty
/// targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, alias = "allowPaths")]
    pub allow_paths: Vec<String>,
    #[serde(default, alias = "allowCommands")]
    pub allow_commands: Vec<String>,
    #[serde(default, alias = "allowNetworkTargets")]
    pub allow_network_targets: Vec<String>,
}

impl Scope {
    /// An empty target is trivially allowed. Otherwise the resolved path
    /// must sit under the repo root and under at least one allowlist entry.
    pub fn is_path_allowed(&self, target_path: &str, repo_root: &Path) -> bool {
        if target_path.is_empty() {
            return true;
        }
        let root = lexical_resolve(".", repo_root);
        let resolved = lexical_resolve(target_path, repo_root);
        if !resolved.starts_with(&root) {
            return false;
        }
        if self.allow_paths.is_empty() {
            return false;
        }
        self.allow_paths
            .iter()
            .any(|p| resolved.starts_with(lexical_resolve(p, repo_root)))
    }

    /// Substring match against the allowlist. Accepting `notgithub.com` for
    /// an allowlisted `github.com` is a known looseness of this semantics;
    /// tightening it to a host-suffix match is a policy decision, not a
    /// porting detail.
    pub fn is_network_allowed(&self, target: &str) -> bool {
        if target.is_empty() || self.allow_network_targets.is_empty() {
            return false;
        }
        self.allow_network_targets
            .iter()
            .any(|host| target.contains(host.as_str()))
    }

    /// Case-insensitive regex search over the allowlist patterns. Patterns
    /// that fail to compile are skipped.
    pub fn is_command_allowed(&self, proposal_text: &str) -> bool {
        if proposal_text.is_empty() {
            return true;
        }
        if self.allow_commands.is_empty() {
            return false;
        }
        self.allow_commands.iter().any(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(proposal_text))
                .unwrap_or(false)
        })
    }
}

/// An active intent lock binding a session to a declared purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentLock {
    pub user_id: String,
    pub intent_text: String,
    pub scope: Scope,
    pub passphrase_hash: String,
    #[serde(default)]
    pub created_at: String,
}

impl IntentLock {
    /// Semantic intent alignment: tokenize both sides, drop stop words,
    /// expand the intent tokens through the synonym table, and look for any
    /// overlap. A session intent equal to the lock's intent (case
    /// insensitive) is trivially aligned.
    pub fn matches_intent(&self, proposal: &Proposal) -> bool {
        let intent = self.intent_text.to_lowercase();
        let session_intent = proposal.session_intent.to_lowercase();
        if !session_intent.is_empty() && session_intent == intent {
            return true;
        }

        let stop = |w: &str| STOP_WORDS.contains(&w);
        let intent_words: Vec<&str> = intent.split_whitespace().filter(|w| !stop(w)).collect();
        let text = proposal.text.to_lowercase();
        let text_words: Vec<&str> = text.split_whitespace().filter(|w| !stop(w)).collect();

        let mut expanded: Vec<&str> = intent_words.clone();
        for word in &intent_words {
            for &(key, synonyms) in INTENT_SYNONYMS {
                if *word == key || synonyms.contains(word) {
                    expanded.push(key);
                    expanded.extend_from_slice(synonyms);
                }
            }
        }

        text_words.iter().any(|w| expanded.contains(w))
    }
}

/// Create and persist an intent lock. All three identity strings must be
/// non-empty. The file is written atomically (temp + rename) so concurrent
/// readers never observe a torn lock.
pub fn set_intent_lock(
    user_id: &str,
    passphrase: &str,
    intent_text: &str,
    scope: Scope,
    lock_path: &Path,
) -> Result<IntentLock, LockError> {
    if user_id.is_empty() || passphrase.is_empty() || intent_text.is_empty() {
        return Err(LockError::InvalidArgument);
    }

    let lock = IntentLock {
        user_id: user_id.to_string(),
        intent_text: intent_text.to_string(),
        scope,
        passphrase_hash: sha256_hex(passphrase),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = lock_path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(&lock)?)?;
    fs::rename(&tmp, lock_path)?;
    Ok(lock)
}

/// Load the active lock, or `None` when the file is missing, unreadable, or
/// structurally invalid. Corruption is treated as absence, never as an error.
pub fn load_intent_lock(lock_path: &Path) -> Option<IntentLock> {
    let text = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Verify a passphrase attempt against the active lock. No lock means no
/// passphrase is correct.
pub fn verify_passphrase(attempt: &str, lock_path: &Path) -> bool {
    match load_intent_lock(lock_path) {
        Some(lock) => sha256_hex(attempt) == lock.passphrase_hash,
        None => false,
    }
}
