//! Shell materialization of parse results.
//!
//! The host binary writes these snippets to a temporary file and prints
//! its path; the calling script sources the file to receive its
//! bindings. Errors and help become eval-files too, so the caller's
//! control flow stays a single `source "$(barg parse …)"`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::NamedTempFile;

use crate::bind::ParseOutput;
use crate::config::Settings;
use crate::model::Value;

/// Heredoc delimiter for help output.
const HELP_DELIMITER: &str = "BARG_HELP";

/// Escape a string for safe use in a shell double-quoted context.
fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '!' => escaped.push_str("\\!"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn export_line(name: &str, value: &str) -> String {
    format!("export {}=\"{}\"\n", name, escape_shell_value(value))
}

fn array_line(name: &str, items: &[String]) -> String {
    let body: Vec<String> = items
        .iter()
        .map(|item| format!("\"{}\"", escape_shell_value(item)))
        .collect();
    format!("declare -a {}=({})\n", name, body.join(" "))
}

/// Render the full binding snippet for a parse result.
pub fn render_bindings(output: &ParseOutput, settings: &Settings) -> String {
    let mut text = String::new();

    for (name, value) in &output.bindings {
        match value {
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                text.push_str(&array_line(name, &rendered));
            }
            other => text.push_str(&export_line(name, &other.to_string())),
        }
    }

    text.push_str(&export_line(
        "BARG_SUBCOMMAND",
        output.subcommand.as_deref().unwrap_or(""),
    ));

    text.push_str(&array_line(&settings.spare_args_binding, &output.spare_args));
    text.push_str(&export_line(
        &format!("{}_COUNT", settings.spare_args_binding),
        &output.spare_args.len().to_string(),
    ));

    // Deterministic order for the was-set table.
    let set: BTreeMap<&str, &str> = output.set_bindings().map(|name| (name, "!")).collect();
    let entries: Vec<String> = set
        .iter()
        .map(|(name, marker)| format!("[{name}]=\"{marker}\""))
        .collect();
    text.push_str(&format!("declare -A BARG_ARGV_TABLE=({})\n", entries.join(" ")));

    text
}

/// Render an error eval-file body: report and exit 1. With `quiet_exit`
/// only the exit remains.
pub fn render_error(message: &str, settings: &Settings) -> String {
    if settings.quiet_exit {
        return "exit 1\n".to_string();
    }
    let program = settings.effective_program_name();
    let redirect = if settings.use_stderr { " >&2" } else { "" };
    format!(
        "echo \"{}: {}\"{}\nexit 1\n",
        escape_shell_value(&program),
        escape_shell_value(message),
        redirect
    )
}

/// Render a help eval-file body: print the text and exit 0.
pub fn render_help_file(help_text: &str, settings: &Settings) -> String {
    let redirect = if settings.use_stderr { " >&2" } else { "" };
    format!(
        "cat{redirect} <<'{delimiter}'\n{text}{delimiter}\nexit 0\n",
        delimiter = HELP_DELIMITER,
        text = help_text
    )
}

/// Render the empty-argv eval-file body: a bare failure exit the caller
/// can branch on.
pub fn render_no_args() -> String {
    "exit 1\n".to_string()
}

/// Persist a snippet to a temporary file and return its path.
pub fn write_eval_file(content: &str) -> Result<PathBuf> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    let path = file.into_temp_path().keep()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::normalize;
    use crate::bind::bind;
    use crate::dsl::Schema;

    fn parse(dsl: &str, raw: &[&str]) -> (ParseOutput, Settings) {
        let schema = Schema::parse(dsl).unwrap();
        let argv: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        let output = bind(&schema, &normalize(&argv)).unwrap();
        (output, schema.settings.clone())
    }

    #[test]
    fn test_scalar_and_flag_exports() {
        let (output, settings) = parse("v/verbose :flag => V\no/out :str => OUT", &["-v", "-o", "x.txt"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("export V=\"true\"\n"));
        assert!(text.contains("export OUT=\"x.txt\"\n"));
        assert!(text.contains("export BARG_SUBCOMMAND=\"\"\n"));
    }

    #[test]
    fn test_vector_exports_as_array() {
        let (output, settings) = parse("i/include :strs => I", &["-i", "a", "-i", "b c"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("declare -a I=(\"a\" \"b c\")\n"));
    }

    #[test]
    fn test_spare_args_and_count() {
        let (output, settings) = parse("v/verbose :flag => V", &["one", "two"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("declare -a BARG_SPARE_ARGS=(\"one\" \"two\")\n"));
        assert!(text.contains("export BARG_SPARE_ARGS_COUNT=\"2\"\n"));
    }

    #[test]
    fn test_custom_spare_binding() {
        let dsl = "meta { spare_args_binding: \"FILES\" }\nv/verbose :flag => V";
        let (output, settings) = parse(dsl, &["a"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("declare -a FILES=(\"a\")\n"));
        assert!(text.contains("export FILES_COUNT=\"1\"\n"));
    }

    #[test]
    fn test_argv_table_markers() {
        let (output, settings) = parse("v/verbose :flag => V\no/out :str => OUT", &["-v"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("declare -A BARG_ARGV_TABLE=([V]=\"!\")\n"));
    }

    #[test]
    fn test_subcommand_export() {
        let dsl = r#"commands { install: "Install" }"#;
        let (output, settings) = parse(dsl, &["install"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("export BARG_SUBCOMMAND=\"install\"\n"));
    }

    #[test]
    fn test_value_escaping() {
        let (output, settings) = parse("m/msg :str => MSG", &["-m", "say \"hi\" to $USER!"]);
        let text = render_bindings(&output, &settings);
        assert!(text.contains("export MSG=\"say \\\"hi\\\" to \\$USER\\!\"\n"));
    }

    #[test]
    fn test_error_file_default() {
        let mut settings = Settings::default();
        settings.program_name = Some("pkgtool".to_string());
        let text = render_error("unknown option: --wat", &settings);
        assert!(text.contains("echo \"pkgtool: unknown option: --wat\" >&2"));
        assert!(text.ends_with("exit 1\n"));
    }

    #[test]
    fn test_error_file_stdout() {
        let mut settings = Settings::default();
        settings.program_name = Some("pkgtool".to_string());
        settings.use_stderr = false;
        let text = render_error("boom", &settings);
        assert!(text.contains("echo \"pkgtool: boom\"\n"));
        assert!(!text.contains(">&2"));
    }

    #[test]
    fn test_quiet_exit_suppresses_message() {
        let mut settings = Settings::default();
        settings.quiet_exit = true;
        let text = render_error("boom", &settings);
        assert_eq!(text, "exit 1\n");
    }

    #[test]
    fn test_help_file() {
        let settings = Settings::default();
        let text = render_help_file("title\nUsage: x\n", &settings);
        assert!(text.starts_with("cat >&2 <<'BARG_HELP'\n"));
        assert!(text.contains("title\nUsage: x\n"));
        assert!(text.ends_with("BARG_HELP\nexit 0\n"));
    }

    #[test]
    fn test_write_eval_file_roundtrip() {
        let path = write_eval_file("export X=\"1\"\n").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "export X=\"1\"\n");
        std::fs::remove_file(path).unwrap();
    }
}
