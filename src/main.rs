//! barg - declarative argument parsing for shell scripts.
//!
//! The host contract is a single eval-file: `source "$(barg parse …)"`.
//! Parse results become export statements, errors become a reported
//! `exit 1`, and help becomes a heredoc that prints and exits cleanly.
//! Completion streams are written straight to stdout for the completing
//! shell.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use barg::output::{
    render_bindings, render_error, render_help_file, render_no_args, write_eval_file,
};
use barg::{Barg, Error, Outcome, Settings};

/// Declarative argument parsing for shell scripts.
#[derive(Parser, Debug)]
#[command(name = "barg", version, about, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse script arguments and emit an eval-file of bindings
    Parse {
        /// Definition text for the target script
        #[arg(long, conflicts_with = "dsl_file")]
        dsl: Option<String>,

        /// Read the definition text from a file
        #[arg(long)]
        dsl_file: Option<PathBuf>,

        /// Arguments to parse for the target script
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print help text for the target script
    Help {
        /// Definition text for the target script
        #[arg(long, conflicts_with = "dsl_file")]
        dsl: Option<String>,

        /// Read the definition text from a file
        #[arg(long)]
        dsl_file: Option<PathBuf>,

        /// Render help for one subcommand's scope
        #[arg(long)]
        scope: Option<String>,
    },

    /// Validate a definition without parsing any arguments
    Check {
        /// Definition text for the target script
        #[arg(long, conflicts_with = "dsl_file")]
        dsl: Option<String>,

        /// Read the definition text from a file
        #[arg(long)]
        dsl_file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { dsl, dsl_file, args } => {
            let text = load_dsl(dsl, dsl_file)?;
            let parser = match Barg::from_dsl(&text) {
                Ok(parser) => parser,
                Err(e) => {
                    // The definition never compiled, so no settings are
                    // available; render with defaults.
                    return emit_error(&e.to_string(), &Settings::default());
                }
            };
            match parser.parse(&args) {
                Ok(Outcome::Parsed(output)) => {
                    let content = render_bindings(&output, parser.settings());
                    emit_file(&content)?;
                }
                Ok(Outcome::Help(help_text)) => {
                    let content = render_help_file(&help_text, parser.settings());
                    emit_file(&content)?;
                }
                Ok(Outcome::Completion(stream)) => {
                    print!("{stream}");
                }
                Ok(Outcome::NoArgs) => {
                    emit_file(&render_no_args())?;
                }
                Err(e) => {
                    let error = Error::Parse(e);
                    let code = parser.handle_error(&error);
                    if code != 0 {
                        return emit_error(&error.to_string(), parser.settings());
                    }
                    // Hook suppressed the error: hand the caller a
                    // harmless no-op file.
                    emit_file("")?;
                }
            }
        }
        Commands::Help { dsl, dsl_file, scope } => {
            let text = load_dsl(dsl, dsl_file)?;
            let parser = Barg::from_dsl(&text).context("failed to compile definition")?;
            let help = parser.render_help(scope.as_deref());
            if parser.settings().use_stderr {
                eprint!("{help}");
            } else {
                print!("{help}");
            }
        }
        Commands::Check { dsl, dsl_file } => {
            let text = load_dsl(dsl, dsl_file)?;
            Barg::from_dsl(&text).context("definition is invalid")?;
        }
    }

    Ok(())
}

fn load_dsl(dsl: Option<String>, dsl_file: Option<PathBuf>) -> Result<String> {
    match (dsl, dsl_file) {
        (Some(text), None) => Ok(text),
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read definition file {}", path.display())),
        _ => anyhow::bail!("provide the definition with --dsl or --dsl-file"),
    }
}

fn emit_file(content: &str) -> Result<()> {
    let path = write_eval_file(content).context("failed to write eval file")?;
    println!("{}", path.display());
    Ok(())
}

/// Write an error eval-file and print its path. Falls back to stderr +
/// exit 1 if even that fails.
fn emit_error(message: &str, settings: &Settings) -> Result<()> {
    let content = render_error(message, settings);
    match write_eval_file(&content) {
        Ok(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("barg: {message}");
            eprintln!("barg: also failed to create error output file: {e}");
            std::process::exit(1);
        }
    }
}
