//! Argv normalization and the flag-occurrence index.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// `-t2` style tokens: one short flag with an attached numeric value.
fn attached_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-[A-Za-z][0-9_.]+$").expect("valid regex literal"))
}

/// `-abc` style tokens: bundled short flags.
fn bundle_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-[A-Za-z]{2,}$").expect("valid regex literal"))
}

/// Rewrite raw argv into its canonical form:
///
/// - `-abc` expands to `-a -b -c`
/// - `-t2` splits into `-t 2`
/// - `--` passes through and shields exactly the next token
///
/// The pass is idempotent on already-normalized input.
pub fn normalize(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut escape_next = false;
    for token in args {
        if escape_next {
            escape_next = false;
            out.push(token.clone());
            continue;
        }
        if token == "--" {
            escape_next = true;
            out.push(token.clone());
            continue;
        }
        if attached_value_re().is_match(token) {
            out.push(token[..2].to_string());
            out.push(token[2..].to_string());
        } else if bundle_re().is_match(token) {
            for c in token[1..].chars() {
                out.push(format!("-{c}"));
            }
        } else {
            out.push(token.clone());
        }
    }
    out
}

/// Maps each flag token in normalized argv to the value-slot indices
/// following its occurrences. Tokens shielded by `--` are not indexed.
#[derive(Debug)]
pub struct FlagIndex {
    slots: HashMap<String, Vec<usize>>,
}

impl FlagIndex {
    pub fn build(args: &[String]) -> Self {
        let mut slots: HashMap<String, Vec<usize>> = HashMap::new();
        let mut escape_next = false;
        for (i, token) in args.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            if token == "--" {
                escape_next = true;
                continue;
            }
            if token.len() > 1 && token.starts_with('-') {
                slots.entry(token.clone()).or_default().push(i + 1);
            }
        }
        Self { slots }
    }

    /// Value-slot indices recorded for one flag form.
    pub fn occurrences(&self, flag: &str) -> &[usize] {
        self.slots.get(flag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.slots.contains_key(flag)
    }

    /// Argv-ordered union of the slots recorded for several flag forms
    /// (the short and long spelling of one declaration).
    pub fn merged(&self, flags: &[String]) -> Vec<usize> {
        let mut all: Vec<usize> = flags
            .iter()
            .flat_map(|f| self.occurrences(f).iter().copied())
            .collect();
        all.sort_unstable();
        all
    }
}
