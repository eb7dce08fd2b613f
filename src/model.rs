//! Data model for option declarations, subcommands, and parsed values.

use std::fmt;

/// Binding names that would collide with the embedding shell's namespace.
///
/// Kept as a portability courtesy for callers that source the output into
/// a shell-like environment.
pub const RESERVED_BINDINGS: &[&str] = &[
    "PATH", "HOME", "IFS", "PWD", "OLDPWD", "SHELL", "TERM", "USER", "UID", "EUID", "HOSTNAME",
    "LANG", "RANDOM", "LINENO", "SECONDS", "OPTARG", "OPTIND", "REPLY",
];

/// Check whether a binding name collides with the reserved set.
pub fn is_reserved_binding(name: &str) -> bool {
    RESERVED_BINDINGS.contains(&name)
}

/// Check binding-name syntax: `[A-Za-z][A-Za-z0-9_]*`.
pub fn is_valid_binding(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The scope in which a declaration participates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Applies only when no subcommand is selected (DSL prefix `@`).
    GlobalOnly,
    /// Applies whether or not a subcommand is selected (no DSL prefix).
    GlobalAlways,
    /// Applies only under the named subcommand (DSL prefix `@name`).
    Subcommand(String),
}

impl Scope {
    /// Whether a declaration with this scope is consulted for the given
    /// subcommand selection.
    pub fn active_in(&self, subcommand: Option<&str>) -> bool {
        match self {
            Scope::GlobalAlways => true,
            Scope::GlobalOnly => subcommand.is_none(),
            Scope::Subcommand(name) => subcommand == Some(name.as_str()),
        }
    }

    /// Whether two scopes can both be active in a single invocation.
    /// Used by definition-time uniqueness checks.
    pub fn overlaps(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::GlobalAlways, _) | (_, Scope::GlobalAlways) => true,
            (Scope::GlobalOnly, Scope::GlobalOnly) => true,
            (Scope::Subcommand(a), Scope::Subcommand(b)) => a == b,
            _ => false,
        }
    }
}

/// Element type of a scalar or vector declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    /// Either an integer or a float; the stricter grammar wins.
    Num,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Str => "str",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Num => "num",
        }
    }
}

/// The flag forms under which a non-switch declaration is recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Short(char),
    Long(String),
    Both(char, String),
}

impl Pattern {
    pub fn short(&self) -> Option<char> {
        match self {
            Pattern::Short(c) | Pattern::Both(c, _) => Some(*c),
            Pattern::Long(_) => None,
        }
    }

    pub fn long(&self) -> Option<&str> {
        match self {
            Pattern::Long(l) | Pattern::Both(_, l) => Some(l),
            Pattern::Short(_) => None,
        }
    }

    /// All argv token forms this pattern answers to (`-s`, `--long`).
    pub fn tokens(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2);
        if let Some(c) = self.short() {
            out.push(format!("-{c}"));
        }
        if let Some(l) = self.long() {
            out.push(format!("--{l}"));
        }
        out
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Short(c) => write!(f, "-{c}"),
            Pattern::Long(l) => write!(f, "--{l}"),
            Pattern::Both(c, l) => write!(f, "-{c}, --{l}"),
        }
    }
}

/// One arm of a switch declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchArm {
    pub short: Option<char>,
    pub long: String,
    /// The string assigned to the binding when this arm wins.
    pub value: String,
    pub help: Option<String>,
}

impl SwitchArm {
    pub fn pattern(&self) -> Pattern {
        match self.short {
            Some(c) => Pattern::Both(c, self.long.clone()),
            None => Pattern::Long(self.long.clone()),
        }
    }
}

/// The kind of a declaration, tagged with its kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Flag,
    Scalar(ValueType),
    Vector(ValueType),
    Enum { choices: Vec<String> },
    Switch { name: Option<String>, arms: Vec<SwitchArm> },
}

/// A literal from the DSL: a default value or a description payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(s),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A typed output binding produced by the bind engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// The normalized form of one option declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub scope: Scope,
    pub required: bool,
    pub kind: Kind,
    /// `None` only for switch kinds, whose patterns live inside the arms.
    pub pattern: Option<Pattern>,
    pub default: Option<Literal>,
    pub binding: String,
    pub description: Option<String>,
}

impl Declaration {
    /// The resting value of a flag declaration; presence on argv yields
    /// its logical not.
    pub fn flag_default(&self) -> bool {
        self.default.as_ref().and_then(Literal::as_bool).unwrap_or(false)
    }

    /// All argv token forms this declaration answers to, arms included.
    pub fn flag_tokens(&self) -> Vec<String> {
        match &self.kind {
            Kind::Switch { arms, .. } => arms.iter().flat_map(|a| a.pattern().tokens()).collect(),
            _ => self.pattern.as_ref().map(Pattern::tokens).unwrap_or_default(),
        }
    }
}

/// A subcommand declared in the `commands { … }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subcommand {
    pub name: String,
    pub description: Option<String>,
    /// DSL prefix `*`: the subcommand requires at least one spare argument.
    pub needs_spare: bool,
}
