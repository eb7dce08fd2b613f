//! The configuration record filled from the DSL's `meta { … }` block.

use std::path::Path;

use thiserror::Error;

use crate::model::Literal;

/// Default binding name for residual positional arguments.
pub const DEFAULT_SPARE_BINDING: &str = "BARG_SPARE_ARGS";

/// Errors raised while applying a `meta` entry.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("unrecognized meta key: {0}")]
    UnknownKey(String),

    #[error("meta key '{key}' expects a {expected} value")]
    BadValue { key: String, expected: &'static str },
}

/// Recognized `meta` keys and their resolved values.
///
/// Every field has a default so an empty `meta` block (or none at all) is
/// a valid configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Program name for help and completion; defaults to the basename of
    /// the invoking process when unset.
    pub program_name: Option<String>,
    /// One-line summary shown in the help title.
    pub summary: Option<String>,
    /// Colon-separated SGR codes for the six palette roles.
    pub color_palette: String,
    /// Name of a caller-supplied error handler.
    pub on_error_hook: Option<String>,
    /// Name of a caller-supplied string array appended to help output.
    pub epilog_source: Option<String>,
    /// Binding name for residual positional arguments.
    pub spare_args_binding: String,
    pub spare_args_required: bool,
    pub subcommand_required: bool,
    pub allow_empty_values: bool,
    pub show_defaults: bool,
    pub help_enabled: bool,
    pub completion_enabled: bool,
    pub quiet_exit: bool,
    pub use_stderr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            program_name: None,
            summary: None,
            color_palette: String::new(),
            on_error_hook: None,
            epilog_source: None,
            spare_args_binding: DEFAULT_SPARE_BINDING.to_string(),
            spare_args_required: false,
            subcommand_required: false,
            allow_empty_values: false,
            show_defaults: false,
            help_enabled: false,
            completion_enabled: true,
            quiet_exit: false,
            use_stderr: true,
        }
    }
}

impl Settings {
    /// Apply one `key: value` entry from the `meta` block.
    pub fn apply(&mut self, key: &str, value: &Literal) -> Result<(), MetaError> {
        match key {
            "program_name" => self.program_name = Some(expect_str(key, value)?),
            "summary" => self.summary = Some(expect_str(key, value)?),
            "color_palette" => self.color_palette = expect_str(key, value)?,
            "on_error_hook" => self.on_error_hook = Some(expect_str(key, value)?),
            "epilog_source" => self.epilog_source = Some(expect_str(key, value)?),
            "spare_args_binding" => self.spare_args_binding = expect_str(key, value)?,
            "spare_args_required" => self.spare_args_required = expect_bool(key, value)?,
            "subcommand_required" => self.subcommand_required = expect_bool(key, value)?,
            "allow_empty_values" => self.allow_empty_values = expect_bool(key, value)?,
            "show_defaults" => self.show_defaults = expect_bool(key, value)?,
            "help_enabled" => self.help_enabled = expect_bool(key, value)?,
            "completion_enabled" => self.completion_enabled = expect_bool(key, value)?,
            "quiet_exit" => self.quiet_exit = expect_bool(key, value)?,
            "use_stderr" => self.use_stderr = expect_bool(key, value)?,
            other => return Err(MetaError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// The program name to display, falling back to the basename of the
    /// invoking process.
    pub fn effective_program_name(&self) -> String {
        if let Some(ref name) = self.program_name {
            return name.clone();
        }
        std::env::args()
            .next()
            .as_deref()
            .map(basename)
            .unwrap_or_else(|| "barg".to_string())
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn expect_str(key: &str, value: &Literal) -> Result<String, MetaError> {
    match value {
        Literal::Str(s) => Ok(s.clone()),
        _ => Err(MetaError::BadValue {
            key: key.to_string(),
            expected: "string",
        }),
    }
}

fn expect_bool(key: &str, value: &Literal) -> Result<bool, MetaError> {
    match value {
        Literal::Bool(b) => Ok(*b),
        _ => Err(MetaError::BadValue {
            key: key.to_string(),
            expected: "boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.spare_args_binding, "BARG_SPARE_ARGS");
        assert!(settings.completion_enabled);
        assert!(settings.use_stderr);
        assert!(!settings.help_enabled);
        assert!(!settings.spare_args_required);
        assert!(settings.color_palette.is_empty());
    }

    #[test]
    fn test_apply_string_key() {
        let mut settings = Settings::default();
        settings
            .apply("program_name", &Literal::Str("pkgtool".to_string()))
            .unwrap();
        assert_eq!(settings.program_name.as_deref(), Some("pkgtool"));
    }

    #[test]
    fn test_apply_bool_key() {
        let mut settings = Settings::default();
        settings.apply("help_enabled", &Literal::Bool(true)).unwrap();
        assert!(settings.help_enabled);
    }

    #[test]
    fn test_unknown_key() {
        let mut settings = Settings::default();
        let result = settings.apply("colour", &Literal::Str("x".to_string()));
        assert!(matches!(result, Err(MetaError::UnknownKey(key)) if key == "colour"));
    }

    #[test]
    fn test_bad_value_type() {
        let mut settings = Settings::default();
        let result = settings.apply("quiet_exit", &Literal::Str("yes".to_string()));
        assert!(matches!(result, Err(MetaError::BadValue { key, .. }) if key == "quiet_exit"));
    }

    #[test]
    fn test_explicit_program_name_wins() {
        let mut settings = Settings::default();
        settings.program_name = Some("pkgtool".to_string());
        assert_eq!(settings.effective_program_name(), "pkgtool");
    }
}
