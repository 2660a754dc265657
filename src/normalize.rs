//! Lessee name normalization.
//!
//! Extraction hands us names like `"ACME Corp."`, `"Acme Corporation"` or
//! `"acme,  corp"`. They all refer to the same obligor and must share one
//! cache entry and one registry lookup.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::LesseeIdentity;

/// Trailing legal-form tokens dropped from a normalized name.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "llc",
    "ltd",
    "limited",
    "lp",
    "llp",
    "plc",
];

fn elided_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "L.L.C." -> "LLC", "O'Brien" -> "OBrien"
    RE.get_or_init(|| Regex::new(r"[.'’]").expect("static regex"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}&]+").expect("static regex"))
}

/// Normalize a raw lessee name into its lookup identity.
///
/// Case-folds, drops punctuation, collapses whitespace and strips trailing
/// legal suffixes. A name made only of a suffix keeps that last token.
/// Returns `None` for blank input.
pub fn normalize_lessee_name(raw: &str) -> Option<LesseeIdentity> {
    let lowered = raw.to_lowercase();
    let elided = elided_chars().replace_all(&lowered, "");
    let spaced = separators().replace_all(&elided, " ");

    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(t)) {
        tokens.pop();
    }

    if tokens.is_empty() {
        return None;
    }
    Some(LesseeIdentity::new(tokens.join(" ")))
}
