//! normalize.rs
//! Anti-obfuscation normalization applied before any pattern matching.
//!
//! Attackers evade detection by encoding, splitting, or substituting
//! characters. This module folds text back to a canonical form:
//! fullwidth/homoglyph variants (NFKC), zero-width noise, HTML entities,
//! base64 blobs, split words (`i g n o r e`), and leetspeak (`1gn0r3`).
//!
//! Keep this logic single-sourced: every matcher in the engine sees input
//! through [`normalize`], so a gap here is a gap everywhere.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Invisible code points stripped after NFKC.
const INVISIBLE: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}', '\u{FEFF}', '\u{00AD}',
    '\u{2028}', '\u{2029}', '\u{180E}', '\u{2060}',
];

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&(lt|gt|amp|quot);").expect("entity regex"));
static HEX_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#x([0-9a-fA-F]+);").expect("entity regex"));
static DEC_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(\d+);").expect("entity regex"));

static B64_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/]{20,}={0,2}").expect("base64 regex"));

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("space regex"));

/// Normalize text to its canonical form for safe pattern matching.
///
/// Applies, in order: NFKC, invisible-character stripping, HTML entity
/// decoding, base64 expansion (keeps the original blob alongside the decoded
/// text), word-split collapse, leetspeak folding, whitespace collapse.
///
/// If the canonical form differs from the input, the result is
/// `"{original} {canonical}"` so downstream patterns can match either form.
/// Empty input returns empty output; no byte sequence makes this fail.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result: String = text.nfkc().collect();
    result.retain(|c| !INVISIBLE.contains(&c));
    result = decode_entities(&result);
    result = expand_base64(&result);
    result = collapse_word_splits(&result);
    result = fold_leet(&result);
    result = MULTI_SPACE.replace_all(&result, " ").into_owned();

    if result != text {
        format!("{text} {result}")
    } else {
        result
    }
}

/// Normalize a proposal's description and raw untrusted input together.
pub fn normalize_pair(text: &str, raw_input: &str) -> (String, String) {
    let raw = if raw_input.is_empty() {
        String::new()
    } else {
        normalize(raw_input)
    };
    (normalize(text), raw)
}

fn decode_entities(text: &str) -> String {
    let step = NAMED_ENTITY.replace_all(text, |caps: &Captures| {
        match caps[1].to_ascii_lowercase().as_str() {
            "lt" => "<",
            "gt" => ">",
            "amp" => "&",
            "quot" => "\"",
            _ => "",
        }
        .to_string()
    });
    let step = HEX_ENTITY.replace_all(&step, |caps: &Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    DEC_ENTITY
        .replace_all(&step, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Expand base64-looking runs in place: `blob` becomes `blob decoded` when
/// the decoded bytes are printable UTF-8 of useful length. Decode failures
/// leave the run untouched. The decoded text is appended in a single pass
/// and never rescanned, so expansion cannot cascade into fresh blobs.
fn expand_base64(text: &str) -> String {
    B64_CANDIDATE
        .replace_all(text, |caps: &Captures| {
            let candidate = &caps[0];
            match try_decode_b64(candidate) {
                Some(decoded) => format!("{candidate} {decoded}"),
                None => candidate.to_string(),
            }
        })
        .into_owned()
}

fn try_decode_b64(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim_end_matches('=');
    let mut padded = trimmed.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = BASE64.decode(padded.as_bytes()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    if decoded.len() > 4 && decoded.chars().all(|c| !c.is_control()) {
        Some(decoded)
    } else {
        None
    }
}

/// Collapse runs of single alphanumerics separated by space/dot/dash/underscore
/// back into words: `i g n o r e` becomes `ignore`. A run needs at least three
/// characters and must not touch a longer word on either side.
///
/// Hand-rolled scan: the equivalent regex needs lookbehind, which the `regex`
/// crate does not support.
fn collapse_word_splits(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let is_sep = |c: char| c.is_whitespace() || matches!(c, '.' | '-' | '_');

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let starts_run = chars[i].is_ascii_alphanumeric() && (i == 0 || !is_word(chars[i - 1]));
        if starts_run {
            // Walk alternating (separator, alphanumeric) pairs.
            let mut end = i;
            let mut count = 1;
            while end + 2 < chars.len()
                && is_sep(chars[end + 1])
                && chars[end + 2].is_ascii_alphanumeric()
            {
                end += 2;
                count += 1;
            }
            // The run must end on a word boundary; retreat past any tail that
            // touches a longer word (an `_` separator is itself a word char).
            while count >= 3 && end + 1 < chars.len() && is_word(chars[end + 1]) {
                end -= 2;
                count -= 1;
            }
            if count >= 3 {
                for j in (i..=end).step_by(2) {
                    out.push(chars[j]);
                }
                i = end + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Leetspeak folding. Structural delimiters (`<`, `(`, `[`) are deliberately
/// not substituted: they carry meaning for template-delimiter detection.
fn fold_leet(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '6' => 'g',
            '7' => 't',
            '8' => 'b',
            '@' => 'a',
            '$' => 's',
            '!' => 'i',
            '|' => 'i',
            '+' => 't',
            other => other,
        })
        .collect()
}
