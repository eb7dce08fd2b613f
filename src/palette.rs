//! Terminal palette for help and error rendering.
//!
//! Codes are opaque ANSI SGR parameter strings supplied by the DSL or the
//! `BARG_COLOR_PALETTE` environment variable, assigned in fixed order to
//! the six rendering roles.

use crate::config::Settings;

/// Environment variable consulted when the `color_palette` meta key is empty.
pub const PALETTE_ENV: &str = "BARG_COLOR_PALETTE";

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// The six palette roles, in the order their codes appear in the
/// colon-separated palette string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Accent,
    Command,
    Required,
    Error,
    StringDefault,
    OtherDefault,
}

/// A resolved palette. Painting is a no-op when disabled.
#[derive(Debug, Clone)]
pub struct Palette {
    codes: [String; 6],
    enabled: bool,
}

impl Palette {
    /// Resolve the palette from the configuration, falling back to the
    /// process environment. A literal `":"` (all codes empty) disables
    /// color entirely.
    pub fn resolve(settings: &Settings) -> Self {
        let raw = if settings.color_palette.is_empty() {
            std::env::var(PALETTE_ENV).unwrap_or_default()
        } else {
            settings.color_palette.clone()
        };
        Self::from_str(&raw)
    }

    /// Build a palette from a colon-separated SGR code list.
    pub fn from_str(raw: &str) -> Self {
        let mut codes: [String; 6] = Default::default();
        if !raw.is_empty() {
            for (slot, part) in codes.iter_mut().zip(raw.split(':')) {
                *slot = part.to_string();
            }
        }
        let enabled = codes.iter().any(|c| !c.is_empty());
        Self { codes, enabled }
    }

    /// A palette with color disabled, for tests and quiet contexts.
    pub fn disabled() -> Self {
        Self::from_str("")
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn code(&self, role: Role) -> &str {
        let index = match role {
            Role::Accent => 0,
            Role::Command => 1,
            Role::Required => 2,
            Role::Error => 3,
            Role::StringDefault => 4,
            Role::OtherDefault => 5,
        };
        &self.codes[index]
    }

    /// Wrap text in the role's SGR code, if any.
    pub fn paint(&self, role: Role, text: &str) -> String {
        let code = self.code(role);
        if !self.enabled || code.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}{RESET}")
    }

    /// Bold wrapper for the help title line.
    pub fn bold(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        format!("{BOLD}{text}{RESET}")
    }

    /// The raw escape prefix for a role, used by `{acc}` expansion in
    /// epilog text. Empty when color is off.
    pub fn prefix(&self, role: Role) -> String {
        let code = self.code(role);
        if !self.enabled || code.is_empty() {
            return String::new();
        }
        format!("\x1b[{code}m")
    }
}
