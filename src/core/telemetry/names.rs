//! Marketing-name normalization for CPU/GPU hardware names.
//!
//! Vendor-specific pattern rules, applied to whatever the enumeration
//! library reports: AMD loses its "... with Radeon Graphics" suffix, Intel
//! loses generation qualifiers and trademark marks, NVIDIA is reduced to the
//! canonical `GeForce RTX|GTX NNNN [Ti|SUPER]` token. Anything unmatched or
//! empty becomes the literal `"UNKNOWN"`.

use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN_NAME: &str = "UNKNOWN";

static NVIDIA_MODEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)GeForce\s+(RTX|GTX)\s+\d{3,4}(\s+(Ti|SUPER))?").unwrap());

static AMD_RADEON_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+with\s+Radeon\s+Graphics\s*$").unwrap());

static AMD_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^AMD\s+").unwrap());

static INTEL_GENERATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b\d+th\s+Gen\s+").unwrap());

static TRADEMARK_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((?:R|TM|C)\)").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), " ").to_string()
}

/// Clean a CPU/GPU marketing name into its canonical display form.
pub fn strip_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_NAME.to_string();
    }

    let lower = trimmed.to_lowercase();

    if lower.contains("geforce") || lower.contains("nvidia") {
        return match NVIDIA_MODEL.find(trimmed) {
            Some(m) => collapse(m.as_str()),
            None => UNKNOWN_NAME.to_string(),
        };
    }

    let mut name = trimmed.to_string();

    if lower.contains("amd") || lower.contains("ryzen") || lower.contains("radeon") {
        name = AMD_RADEON_SUFFIX.replace(&name, "").to_string();
        name = AMD_PREFIX.replace(&name, "").to_string();
    }

    if lower.contains("intel") {
        name = TRADEMARK_MARKS.replace_all(&name, "").to_string();
        name = INTEL_GENERATION.replace(&name, "").to_string();
    }

    let collapsed = collapse(&name);
    if collapsed.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        collapsed
    }
}
