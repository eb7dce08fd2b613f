//! Shell completion suggestions computed from the declaration list.
//!
//! The same suggestion stream backs two adapters: a plain TSV form and a
//! JSON form shaped for nushell-style completers.

use serde::Serialize;

use crate::dsl::Schema;
use crate::model::{Declaration, Kind};

/// Reserved first argument selecting the TSV adapter.
pub const TSV_TRIGGER: &str = "@tsvcomp";
/// Reserved first argument selecting the nucomp JSON adapter.
pub const NU_TRIGGER: &str = "@nucomp";

const COLOR_SUBCOMMAND: u8 = 0;
const COLOR_OPTIONAL: u8 = 1;
const COLOR_REQUIRED: u8 = 2;
const COLOR_CHOICE: u8 = 3;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub value: String,
    pub color: u8,
    pub description: String,
}

impl Suggestion {
    fn new(value: impl Into<String>, color: u8, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            color,
            description: description.into(),
        }
    }
}

/// Compute suggestions for the user's in-progress argv. The last word is
/// the token being completed; everything before it is settled.
pub fn suggest(schema: &Schema, words: &[String]) -> Vec<Suggestion> {
    let current = words.last().map(String::as_str).unwrap_or("");
    let prior = &words[..words.len().saturating_sub(1)];

    // A lone first word completes subcommand names.
    if !schema.subcommands.is_empty() && words.len() <= 1 {
        let mut out: Vec<Suggestion> = schema
            .subcommands
            .iter()
            .filter(|s| s.name.starts_with(current))
            .map(|s| {
                Suggestion::new(
                    s.name.clone(),
                    COLOR_SUBCOMMAND,
                    s.description.clone().unwrap_or_default(),
                )
            })
            .collect();
        if schema.settings.subcommand_required && current.starts_with('-') {
            out.extend(help_suggestions(current));
        }
        return out;
    }

    // A value position after an enum flag completes that enum's choices.
    let scope = prior
        .first()
        .and_then(|w| schema.subcommand(w))
        .map(|s| s.name.clone());
    let in_scope = schema.declarations_in_scope(scope.as_deref());

    if let Some(previous) = prior.last() {
        for decl in &in_scope {
            if let Kind::Enum { choices } = &decl.kind {
                if decl.flag_tokens().iter().any(|t| t == previous) {
                    return choices
                        .iter()
                        .filter(|c| c.starts_with(current))
                        .map(|c| {
                            Suggestion::new(
                                c.clone(),
                                COLOR_CHOICE,
                                decl.description.clone().unwrap_or_default(),
                            )
                        })
                        .collect();
                }
            }
        }
    }

    let mut out = Vec::new();
    for decl in &in_scope {
        if decl.flag_tokens().iter().any(|t| prior.contains(t)) {
            continue;
        }
        match &decl.kind {
            Kind::Switch { arms, .. } => {
                let color = flag_color(decl);
                for arm in arms {
                    let help = arm
                        .help
                        .clone()
                        .or_else(|| decl.description.clone())
                        .unwrap_or_default();
                    push_flag_forms(&mut out, current, arm.short, Some(arm.long.as_str()), color, &help);
                }
            }
            _ => {
                let pattern = decl.pattern.as_ref().expect("non-switch pattern");
                push_flag_forms(
                    &mut out,
                    current,
                    pattern.short(),
                    pattern.long(),
                    flag_color(decl),
                    decl.description.as_deref().unwrap_or(""),
                );
            }
        }
    }
    out
}

fn flag_color(decl: &Declaration) -> u8 {
    if decl.required {
        COLOR_REQUIRED
    } else {
        COLOR_OPTIONAL
    }
}

/// Emit the short and long spellings that prefix-match the current
/// token. A `--` prefix asks for long forms only; a bare `-` prefix asks
/// for short forms only.
fn push_flag_forms(
    out: &mut Vec<Suggestion>,
    current: &str,
    short: Option<char>,
    long: Option<&str>,
    color: u8,
    description: &str,
) {
    let wants_long_only = current.starts_with("--");
    let wants_short_only = current.starts_with('-') && !wants_long_only;
    if !wants_long_only {
        if let Some(c) = short {
            let form = format!("-{c}");
            if form.starts_with(current) {
                out.push(Suggestion::new(form, color, description));
            }
        }
    }
    if !wants_short_only {
        if let Some(l) = long {
            let form = format!("--{l}");
            if form.starts_with(current) {
                out.push(Suggestion::new(form, color, description));
            }
        }
    }
}

fn help_suggestions(current: &str) -> Vec<Suggestion> {
    ["-h", "--help"]
        .iter()
        .filter(|f| f.starts_with(current))
        .map(|f| Suggestion::new(*f, COLOR_OPTIONAL, "Show this help message and exit"))
        .collect()
}

/// The raw stream: one `value\tcolor\tdescription` line per suggestion.
pub fn render_tsv(suggestions: &[Suggestion]) -> String {
    let mut out = String::new();
    for s in suggestions {
        out.push_str(&s.value);
        out.push('\t');
        out.push_str(&s.color.to_string());
        out.push('\t');
        out.push_str(&s.description);
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct NuItem<'a> {
    value: &'a str,
    display: &'a str,
    description: &'a str,
    style: NuStyle,
}

#[derive(Serialize)]
struct NuStyle {
    fg: &'static str,
}

fn fg_name(color: u8) -> &'static str {
    match color {
        COLOR_SUBCOMMAND => "cyan",
        COLOR_REQUIRED => "red",
        COLOR_CHOICE => "green",
        _ => "default",
    }
}

/// The nucomp adapter: the same stream reshaped as a JSON array.
pub fn render_nucomp(suggestions: &[Suggestion]) -> String {
    let items: Vec<NuItem> = suggestions
        .iter()
        .map(|s| NuItem {
            value: &s.value,
            display: &s.value,
            description: &s.description,
            style: NuStyle { fg: fg_name(s.color) },
        })
        .collect();
    serde_json::to_string(&items).expect("suggestion serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggest_for(dsl: &str, words: &[&str]) -> Vec<Suggestion> {
        let schema = Schema::parse(dsl).unwrap();
        let words: Vec<String> = words.iter().map(|s| s.to_string()).collect();
        suggest(&schema, &words)
    }

    fn values(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.value.as_str()).collect()
    }

    const SUBS: &str = r#"commands { install: "Install a package" *remove: "Remove a package" }
        @install u/update :flag => U "Refresh the index first"
        v/verbose :flag => V "Print more detail""#;

    #[test]
    fn test_subcommand_prefix_match() {
        let got = suggest_for(SUBS, &["in"]);
        assert_eq!(values(&got), vec!["install"]);
        assert_eq!(got[0].color, 0);
        assert_eq!(got[0].description, "Install a package");
    }

    #[test]
    fn test_all_subcommands_on_empty_token() {
        let got = suggest_for(SUBS, &[""]);
        assert_eq!(values(&got), vec!["install", "remove"]);
    }

    #[test]
    fn test_flags_within_subcommand_scope() {
        let got = suggest_for(SUBS, &["install", "--"]);
        assert_eq!(values(&got), vec!["--update", "--verbose"]);
    }

    #[test]
    fn test_used_flag_suppressed() {
        let got = suggest_for(SUBS, &["install", "-u", "--"]);
        assert_eq!(values(&got), vec!["--verbose"]);
    }

    #[test]
    fn test_short_prefix_suppresses_long() {
        let got = suggest_for("v/verbose :flag => V", &["x", "-"]);
        assert_eq!(values(&got), vec!["-v"]);
    }

    #[test]
    fn test_long_prefix_suppresses_short() {
        let got = suggest_for("v/verbose :flag => V", &["x", "--v"]);
        assert_eq!(values(&got), vec!["--verbose"]);
    }

    #[test]
    fn test_both_forms_on_empty_token() {
        let got = suggest_for("v/verbose :flag => V", &["x", ""]);
        assert_eq!(values(&got), vec!["-v", "--verbose"]);
    }

    #[test]
    fn test_required_flag_color() {
        let got = suggest_for("! o/out :str => O", &["x", "--o"]);
        assert_eq!(got[0].color, 2);
    }

    #[test]
    fn test_enum_choices_after_flag() {
        let dsl = r#"l/level ["debug" "info" "warn"] => L "Log level""#;
        let got = suggest_for(dsl, &["--level", ""]);
        assert_eq!(values(&got), vec!["debug", "info", "warn"]);
        assert!(got.iter().all(|s| s.color == 3));
        let got = suggest_for(dsl, &["--level", "wa"]);
        assert_eq!(values(&got), vec!["warn"]);
    }

    #[test]
    fn test_switch_arms_suggested() {
        let dsl = r#"! { l/list:"list" h "List packages" g/get:"download" } => MODE"#;
        let got = suggest_for(dsl, &["x", "--"]);
        assert_eq!(values(&got), vec!["--list", "--get"]);
        assert!(got.iter().all(|s| s.color == 2));
        assert_eq!(got[0].description, "List packages");
    }

    #[test]
    fn test_switch_suppressed_when_any_arm_used() {
        let dsl = r#"{ l/list:"list" g/get:"download" } => MODE"#;
        let got = suggest_for(dsl, &["-l", "--"]);
        assert!(got.is_empty());
    }

    #[test]
    fn test_help_flags_when_subcommand_required() {
        let dsl = r#"meta { subcommand_required: true }
            commands { install: "Install" }"#;
        let got = suggest_for(dsl, &["-"]);
        assert_eq!(values(&got), vec!["-h", "--help"]);
    }

    #[test]
    fn test_render_tsv() {
        let suggestions = vec![
            Suggestion::new("install", 0, "Install a package"),
            Suggestion::new("--verbose", 1, ""),
        ];
        let tsv = render_tsv(&suggestions);
        assert_eq!(tsv, "install\t0\tInstall a package\n--verbose\t1\t\n");
    }

    #[test]
    fn test_render_nucomp() {
        let suggestions = vec![Suggestion::new("install", 0, "Install a package")];
        let json = render_nucomp(&suggestions);
        assert_eq!(
            json,
            r#"[{"value":"install","display":"install","description":"Install a package","style":{"fg":"cyan"}}]"#
        );
    }

    #[test]
    fn test_nucomp_color_names() {
        assert_eq!(fg_name(0), "cyan");
        assert_eq!(fg_name(1), "default");
        assert_eq!(fg_name(2), "red");
        assert_eq!(fg_name(3), "green");
    }
}
