//! barg - declarative argument parsing driven by an embedded DSL.
//!
//! Callers describe their options, subcommands, and metadata in a small
//! definition language, then hand the raw argv to [`Barg::parse`]. The
//! result is an explicit record of typed bindings, the subcommand
//! selection, the residual positionals, and a was-set map, or one of
//! the alternate outcomes (help text, a completion stream, or the
//! empty-argv signal).
//!
//! ```no_run
//! use barg::{Barg, Outcome};
//!
//! let parser = Barg::from_dsl(
//!     r#"
//!     meta { program_name: "pkgtool" help_enabled: true }
//!     v/verbose :flag => VERBOSE "Print more detail"
//!     ! o/out :str => OUT "Output file"
//!     "#,
//! )?;
//! let argv: Vec<String> = std::env::args().skip(1).collect();
//! match parser.parse(&argv)? {
//!     Outcome::Parsed(result) => { /* read result.bindings */ }
//!     Outcome::Help(text) => print!("{text}"),
//!     Outcome::Completion(stream) => print!("{stream}"),
//!     Outcome::NoArgs => std::process::exit(1),
//! }
//! # Ok::<(), barg::Error>(())
//! ```

pub mod argv;
pub mod bind;
pub mod complete;
pub mod config;
pub mod dsl;
pub mod help;
pub mod model;
pub mod output;
pub mod palette;

use std::collections::HashMap;

use thiserror::Error;

pub use bind::{bind, BindError, ParseOutput};
pub use config::Settings;
pub use dsl::{DslError, Schema};
pub use model::{Declaration, Kind, Literal, Pattern, Scope, Subcommand, SwitchArm, Value, ValueType};
pub use palette::{Palette, Role};

/// Any failure of the pipeline, definition-time or parse-time.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DslError),

    #[error(transparent)]
    Parse(#[from] BindError),
}

impl Error {
    /// The user-visible error-kind label, as handed to the error hook.
    pub fn label(&self) -> &'static str {
        match self {
            Error::Definition(e) => e.label(),
            Error::Parse(e) => e.label(),
        }
    }
}

/// A caller-supplied error handler: receives the error-kind label and
/// the rendered description; returns the exit code (0 suppresses the
/// error).
pub type ErrorHook = Box<dyn Fn(&str, &str) -> i32>;

/// The result of one [`Barg::parse`] invocation.
#[derive(Debug)]
pub enum Outcome {
    /// Bindings were produced; argv parsed cleanly.
    Parsed(ParseOutput),
    /// A help flag was seen; the rendered help text.
    Help(String),
    /// A completion trigger was seen; the rendered suggestion stream.
    Completion(String),
    /// Argv was empty and the `#[always]` directive is absent. The
    /// conventional exit code is 1 so wrapper scripts can branch.
    NoArgs,
}

/// A compiled definition plus its caller-supplied collaborators.
pub struct Barg {
    schema: Schema,
    epilogs: HashMap<String, Vec<String>>,
    error_hooks: HashMap<String, ErrorHook>,
}

impl Barg {
    /// Compile a DSL text. Definition errors (syntax, duplicate
    /// patterns, illegal bindings, unknown meta keys) surface here.
    pub fn from_dsl(text: &str) -> Result<Self, DslError> {
        Ok(Self {
            schema: Schema::parse(text)?,
            epilogs: HashMap::new(),
            error_hooks: HashMap::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.schema.settings
    }

    /// Register a string array that the `epilog_source` meta key can
    /// name.
    pub fn with_epilog(mut self, name: impl Into<String>, lines: Vec<String>) -> Self {
        self.epilogs.insert(name.into(), lines);
        self
    }

    /// Register an error handler that the `on_error_hook` meta key can
    /// name.
    pub fn with_error_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&str, &str) -> i32 + 'static,
    {
        self.error_hooks.insert(name.into(), Box::new(hook));
        self
    }

    /// Run the pipeline over raw argv.
    pub fn parse(&self, argv: &[String]) -> Result<Outcome, BindError> {
        let settings = &self.schema.settings;

        if settings.completion_enabled {
            if let Some(first) = argv.first().map(String::as_str) {
                if first == complete::NU_TRIGGER || first == complete::TSV_TRIGGER {
                    // The trigger is followed by the program name, then
                    // the user's in-progress argv.
                    let words = argv.get(2..).unwrap_or(&[]);
                    let suggestions = complete::suggest(&self.schema, words);
                    let stream = if first == complete::NU_TRIGGER {
                        complete::render_nucomp(&suggestions)
                    } else {
                        complete::render_tsv(&suggestions)
                    };
                    return Ok(Outcome::Completion(stream));
                }
            }
        }

        if argv.is_empty() && !self.schema.always {
            return Ok(Outcome::NoArgs);
        }

        let argv = argv::normalize(argv);

        if settings.help_enabled && wants_help(&argv) {
            let subcommand = argv
                .first()
                .and_then(|t| self.schema.subcommand(t))
                .map(|s| s.name.clone());
            return Ok(Outcome::Help(self.render_help(subcommand.as_deref())));
        }

        bind::bind(&self.schema, &argv).map(Outcome::Parsed)
    }

    /// Render help for a scope without running the bind engine.
    pub fn render_help(&self, subcommand: Option<&str>) -> String {
        let settings = &self.schema.settings;
        let palette = Palette::resolve(settings);
        let epilog = settings
            .epilog_source
            .as_ref()
            .and_then(|name| self.epilogs.get(name))
            .map(Vec::as_slice);
        help::render_help(&self.schema, subcommand, &palette, epilog)
    }

    /// Route an error to the configured hook, or render it to the
    /// terminal. Returns the exit code the host should use; 0 means the
    /// hook suppressed the error.
    pub fn handle_error(&self, error: &Error) -> i32 {
        let settings = &self.schema.settings;
        let message = error.to_string();

        if let Some(code) = self.run_hook(error.label(), &message) {
            return code;
        }

        if !settings.quiet_exit {
            let palette = Palette::resolve(settings);
            let line = format!(
                "{}: {}",
                settings.effective_program_name(),
                palette.paint(Role::Error, &message)
            );
            if settings.use_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
        1
    }

    fn run_hook(&self, label: &str, message: &str) -> Option<i32> {
        let name = self.schema.settings.on_error_hook.as_ref()?;
        let hook = self.error_hooks.get(name)?;
        Some(hook(label, message))
    }
}

/// Help flags count anywhere in argv, except for the one token shielded
/// by `--`.
fn wants_help(argv: &[String]) -> bool {
    let mut escaped = false;
    for token in argv {
        if escaped {
            escaped = false;
            continue;
        }
        if token == "--" {
            escaped = true;
            continue;
        }
        if token == "-h" || token == "--help" {
            return true;
        }
    }
    false
}
