//! Help text generation from the declaration list.
//!
//! Produces the three-region layout: a bold title, a usage line, the
//! subcommand table at top level, and the aligned options table. The
//! same declaration order as the DSL is preserved.

use crate::dsl::Schema;
use crate::model::{Declaration, Kind, Literal};
use crate::palette::{Palette, Role};

const DESCRIPTION_LIMIT: usize = 45;

/// One rendered row of the options table, pre-colorization.
struct Row {
    flags: String,
    kind: String,
    description: String,
    required: bool,
    default: Option<(String, bool)>,
}

/// Render the help text for the given subcommand selection.
///
/// `epilog` is the caller-supplied string array named by the
/// `epilog_source` meta key; it is appended verbatim at top level, with
/// `{acc}` expanded to the accent color.
pub fn render_help(
    schema: &Schema,
    subcommand: Option<&str>,
    palette: &Palette,
    epilog: Option<&[String]>,
) -> String {
    let settings = &schema.settings;
    let program = settings.effective_program_name();
    let mut out = String::new();

    // Title.
    let title = match subcommand {
        Some(name) => match schema.subcommand(name).and_then(|s| s.description.clone()) {
            Some(desc) => format!("{program} {name}: {desc}"),
            None => format!("{program} {name}"),
        },
        None => match &settings.summary {
            Some(summary) => format!("{program}: {summary}"),
            None => program.clone(),
        },
    };
    out.push_str(&palette.bold(&title));
    out.push('\n');

    // Usage line.
    let spare_needed = match subcommand {
        Some(name) => schema.subcommand(name).map(|s| s.needs_spare).unwrap_or(false),
        None => settings.spare_args_required,
    };
    out.push_str("Usage: ");
    out.push_str(&program);
    match subcommand {
        Some(name) => {
            out.push(' ');
            out.push_str(&palette.paint(Role::Command, name));
        }
        None if !schema.subcommands.is_empty() => {
            out.push(' ');
            out.push_str(&palette.paint(Role::Command, "COMMAND"));
        }
        None => {}
    }
    out.push_str(" [OPTIONS]");
    if spare_needed {
        out.push_str(" [...]");
    }
    out.push('\n');

    // Subcommand table, top level only.
    if subcommand.is_none() && !schema.subcommands.is_empty() {
        out.push('\n');
        out.push_str("Available subcommands:\n");
        let width = schema
            .subcommands
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0);
        for sub in &schema.subcommands {
            let padding = " ".repeat(width - sub.name.len());
            out.push_str("  ");
            out.push_str(&palette.paint(Role::Command, &sub.name));
            out.push_str(&padding);
            if let Some(ref desc) = sub.description {
                out.push_str("  ");
                out.push_str(&truncate(desc));
            }
            out.push('\n');
        }
    }

    // Options table.
    let mut rows: Vec<Row> = Vec::new();
    for decl in schema.declarations_in_scope(subcommand) {
        rows.extend(declaration_rows(decl, schema));
    }
    if settings.help_enabled {
        rows.push(Row {
            flags: "-h, --help".to_string(),
            kind: "flag".to_string(),
            description: "Show this help message and exit".to_string(),
            required: false,
            default: None,
        });
    }
    if !rows.is_empty() {
        out.push('\n');
        out.push_str("Options:\n");
        let flag_width = rows.iter().map(|r| r.flags.len()).max().unwrap_or(0);
        let kind_width = rows.iter().map(|r| r.kind.len()).max().unwrap_or(0);
        for row in &rows {
            out.push_str("  ");
            out.push_str(&palette.paint(Role::Accent, &row.flags));
            out.push_str(&" ".repeat(flag_width - row.flags.len() + 2));
            if row.required {
                out.push_str(&palette.paint(Role::Required, &row.kind));
            } else {
                out.push_str(&row.kind);
            }
            out.push_str(&" ".repeat(kind_width - row.kind.len() + 2));
            out.push_str(&truncate(&row.description));
            if let Some((ref text, is_string)) = row.default {
                let role = if is_string { Role::StringDefault } else { Role::OtherDefault };
                out.push_str(" (def: ");
                out.push_str(&palette.paint(role, text));
                out.push(')');
            }
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push('\n');
        }
    }

    // Epilog, top level only.
    if subcommand.is_none() {
        if let Some(lines) = epilog {
            if !lines.is_empty() {
                out.push('\n');
                let accent = palette.prefix(Role::Accent);
                for line in lines {
                    out.push_str(&line.replace("{acc}", &accent));
                    out.push('\n');
                }
            }
        }
    }

    out
}

fn declaration_rows(decl: &Declaration, schema: &Schema) -> Vec<Row> {
    let show_defaults = schema.settings.show_defaults;
    match &decl.kind {
        Kind::Switch { name, arms } => {
            let kind = name.clone().unwrap_or_else(|| "switch".to_string());
            arms.iter()
                .map(|arm| Row {
                    flags: flags_cell(arm.short, Some(&arm.long)),
                    kind: kind.clone(),
                    description: arm.help.clone().unwrap_or_default(),
                    required: decl.required,
                    default: None,
                })
                .collect()
        }
        kind => {
            let annotation = match kind {
                Kind::Flag => "flag".to_string(),
                Kind::Scalar(ty) if decl.required => format!("<{}>", ty.name()),
                Kind::Scalar(ty) => ty.name().to_string(),
                Kind::Vector(ty) => format!("[{}]", ty.name()),
                Kind::Enum { .. } => "enum".to_string(),
                Kind::Switch { .. } => unreachable!(),
            };
            let default = if show_defaults {
                decl.default.as_ref().map(|literal| {
                    (literal.to_string(), matches!(literal, Literal::Str(_)))
                })
            } else {
                None
            };
            let pattern = decl.pattern.as_ref().expect("non-switch pattern");
            vec![Row {
                flags: flags_cell(pattern.short(), pattern.long()),
                kind: annotation,
                description: decl.description.clone().unwrap_or_default(),
                required: decl.required,
                default,
            }]
        }
    }
}

/// `-s, --long` with the long column aligned when the short form is
/// missing.
fn flags_cell(short: Option<char>, long: Option<&str>) -> String {
    match (short, long) {
        (Some(c), Some(l)) => format!("-{c}, --{l}"),
        (None, Some(l)) => format!("    --{l}"),
        (Some(c), None) => format!("-{c}"),
        (None, None) => String::new(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text.to_string();
    }
    let kept: String = text.chars().take(DESCRIPTION_LIMIT - 1).collect();
    format!("{kept}…")
}
