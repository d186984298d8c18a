//! config.rs
//! Engine configuration: paths, redaction level, and rate-limit tuning.
//!
//! Resolution order: explicit field overrides by the caller, then the
//! `CORD_*` environment variables, then an optional `cord.toml` at the repo
//! root, then fixed defaults under `.cord/`. The environment is read here and
//! nowhere else; an [`crate::Engine`] only ever sees the finished struct.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// How much of the `proposal` / `text` / `path` payload fields survives into
/// the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionLevel {
    None,
    #[default]
    Pii,
    Full,
}

impl RedactionLevel {
    fn parse(value: &str) -> Option<RedactionLevel> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(RedactionLevel::None),
            "pii" => Some(RedactionLevel::Pii),
            "full" => Some(RedactionLevel::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for filesystem scope checks.
    pub repo_root: PathBuf,
    /// Intent lock file location.
    pub lock_path: PathBuf,
    /// Audit log (JSONL) location.
    pub log_path: PathBuf,
    pub redaction: RedactionLevel,
    /// Rate-limit window consulted against the audit log.
    pub rate_window_secs: i64,
    /// Proposal count at which the window counts as exceeded.
    pub rate_max_count: usize,
}

impl Config {
    /// Configuration rooted at `root` with fixed defaults and no environment
    /// or file input. Tests and embedders start here and override fields.
    pub fn default_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Config {
            lock_path: root.join(".cord/intent.lock.json"),
            log_path: root.join(".cord/audit.jsonl"),
            repo_root: root,
            redaction: RedactionLevel::Pii,
            rate_window_secs: 60,
            rate_max_count: 40,
        }
    }

    /// Load configuration for `root`: start from `cord.toml` when present,
    /// then apply environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let mut cfg = Config::default_at(root);

        let file = root.join("cord.toml");
        if file.exists() {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("reading config file {}", file.display()))?;
            let parsed: FileConfig = toml::from_str(&text)
                .with_context(|| format!("parsing config file {}", file.display()))?;
            cfg.apply_file(root, parsed);
        } else {
            tracing::debug!("no cord.toml at {}; using defaults", file.display());
        }

        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_file(&mut self, root: &Path, file: FileConfig) {
        if let Some(p) = file.lock_path {
            self.lock_path = absolutize(root, &p);
        }
        if let Some(p) = file.log_path {
            self.log_path = absolutize(root, &p);
        }
        if let Some(r) = file.redaction {
            self.redaction = r;
        }
        if let Some(rate) = file.rate {
            if let Some(w) = rate.window_secs {
                self.rate_window_secs = w;
            }
            if let Some(m) = rate.max_count {
                self.rate_max_count = m;
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(p) = env::var("CORD_LOCK_PATH") {
            if !p.is_empty() {
                self.lock_path = PathBuf::from(p);
            }
        }
        if let Ok(p) = env::var("CORD_LOG_PATH") {
            if !p.is_empty() {
                self.log_path = PathBuf::from(p);
            }
        }
        if let Ok(level) = env::var("CORD_LOG_REDACTION") {
            match RedactionLevel::parse(&level) {
                Some(parsed) => self.redaction = parsed,
                None => tracing::warn!(value = %level, "unrecognized CORD_LOG_REDACTION; keeping {:?}", self.redaction),
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut cfg = Config::default_at(root);
        cfg.apply_env();
        cfg
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    lock_path: Option<PathBuf>,
    #[serde(default)]
    log_path: Option<PathBuf>,
    #[serde(default)]
    redaction: Option<RedactionLevel>,
    #[serde(default)]
    rate: Option<RateConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RateConfig {
    #[serde(default)]
    window_secs: Option<i64>,
    #[serde(default)]
    max_count: Option<usize>,
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
