//! The definition parser: DSL text in, a validated [`Schema`] out.
//!
//! The DSL is line-friendly but not line-bound: `meta`, `commands`, and
//! switch blocks may span lines. Parsing is a hand-written tokenizer plus
//! a recursive-descent pass, so syntax errors can name the last
//! declaration that parsed cleanly.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::{MetaError, Settings};
use crate::model::{
    is_reserved_binding, is_valid_binding, Declaration, Kind, Literal, Pattern, Scope, Subcommand,
    SwitchArm, ValueType,
};

/// The directive that makes an empty argv a successful parse.
const ALWAYS_DIRECTIVE: &str = "#[always]";

/// Characters allowed as a short option.
fn is_short_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '!' | '?' | '@' | '#' | '_' | '.' | ':' | '<' | '>')
}

/// Characters allowed in a long option name.
fn is_long_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '!' | '?' | '@' | '#' | '_' | '.' | ':' | '<' | '>' | '-')
        })
}

/// Errors raised while parsing or validating the DSL.
#[derive(Debug, Error)]
pub enum DslError {
    #[error("unrecognized meta key: {0}")]
    InvalidMetaKey(String),

    #[error("meta key '{key}' expects a {expected} value")]
    MetaValue { key: String, expected: &'static str },

    #[error("illegal binding name: {0}")]
    IllegalBinding(String),

    #[error("cannot parse definition text after {context}: {detail}")]
    Syntax { context: String, detail: String },

    #[error("duplicate {what} '{name}' in scope")]
    Duplicate { what: &'static str, name: String },
}

impl DslError {
    /// The user-visible error-kind label, as handed to the error hook.
    pub fn label(&self) -> &'static str {
        match self {
            DslError::InvalidMetaKey(_) => "InvalidOption",
            DslError::MetaValue { .. } => "DSLSyntax",
            DslError::IllegalBinding(_) => "IllegalBinding",
            DslError::Syntax { .. } => "DSLSyntax",
            DslError::Duplicate { .. } => "DuplicatePattern",
        }
    }
}

impl From<MetaError> for DslError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::UnknownKey(key) => DslError::InvalidMetaKey(key),
            MetaError::BadValue { key, expected } => DslError::MetaValue { key, expected },
        }
    }
}

/// The parsed and validated form of one DSL text.
#[derive(Debug, Clone)]
pub struct Schema {
    /// `#[always]` directive: an empty argv still parses successfully.
    pub always: bool,
    pub settings: Settings,
    pub subcommands: Vec<Subcommand>,
    pub declarations: Vec<Declaration>,
}

impl Schema {
    /// Parse a DSL text into a schema, validating all definition-time
    /// invariants.
    pub fn parse(text: &str) -> Result<Schema, DslError> {
        let (always, body) = strip_directive(text);
        let tokens = tokenize(&body)?;
        let mut parser = Parser::new(tokens);
        parser.parse_file()?;
        let schema = Schema {
            always,
            settings: parser.settings,
            subcommands: parser.subcommands,
            declarations: parser.declarations,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn subcommand(&self, name: &str) -> Option<&Subcommand> {
        self.subcommands.iter().find(|s| s.name == name)
    }

    /// Declarations consulted for the given subcommand selection, in
    /// declaration order.
    pub fn declarations_in_scope(&self, subcommand: Option<&str>) -> Vec<&Declaration> {
        self.declarations
            .iter()
            .filter(|d| d.scope.active_in(subcommand))
            .collect()
    }

    fn validate(&self) -> Result<(), DslError> {
        // Subcommand scopes must name a declared subcommand.
        for decl in &self.declarations {
            if let Scope::Subcommand(ref name) = decl.scope {
                if self.subcommand(name).is_none() {
                    return Err(DslError::Syntax {
                        context: format!("'{}'", decl.binding),
                        detail: format!("unknown subcommand scope '@{name}'"),
                    });
                }
            }
        }

        // Binding names and flag tokens must be unique among declarations
        // that can be active together.
        for (i, a) in self.declarations.iter().enumerate() {
            if let Kind::Switch { ref arms, .. } = a.kind {
                let mut shorts = HashSet::new();
                let mut longs = HashSet::new();
                for arm in arms {
                    if let Some(c) = arm.short {
                        if !shorts.insert(c) {
                            return Err(DslError::Duplicate {
                                what: "switch arm",
                                name: format!("-{c}"),
                            });
                        }
                    }
                    if !longs.insert(arm.long.clone()) {
                        return Err(DslError::Duplicate {
                            what: "switch arm",
                            name: format!("--{}", arm.long),
                        });
                    }
                }
            }

            for b in &self.declarations[i + 1..] {
                if !a.scope.overlaps(&b.scope) {
                    continue;
                }
                if a.binding == b.binding {
                    return Err(DslError::Duplicate {
                        what: "binding",
                        name: a.binding.clone(),
                    });
                }
                let taken: HashSet<String> = a.flag_tokens().into_iter().collect();
                if let Some(tok) = b.flag_tokens().iter().find(|t| taken.contains(*t)) {
                    return Err(DslError::Duplicate {
                        what: "pattern",
                        name: tok.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Detach the `#[always]` directive from the first non-blank line, if
/// present, and return the remaining text.
fn strip_directive(text: &str) -> (bool, String) {
    let mut lines = text.lines();
    let mut prefix_blanks = 0usize;
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            prefix_blanks += 1;
            continue;
        }
        if line.trim() == ALWAYS_DIRECTIVE {
            let rest: Vec<&str> = text.lines().skip(prefix_blanks + 1).collect();
            return (true, rest.join("\n"));
        }
        break;
    }
    (false, text.to_string())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{w}'"),
            Token::Str(s) => format!("\"{s}\""),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
        }
    }
}

/// Tokenize the directive-stripped DSL body. Comment lines (first
/// non-whitespace character `#`) are dropped wholesale first.
fn tokenize(body: &str) -> Result<Vec<Token>, DslError> {
    let code: String = body
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut tokens = Vec::new();
    let mut chars = code.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == quote {
                        closed = true;
                        break;
                    }
                    if quote == '"' && ch == '\\' {
                        match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => value.push(other),
                            None => break,
                        }
                        continue;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(DslError::Syntax {
                        context: "the definition text".to_string(),
                        detail: "unterminated string literal".to_string(),
                    });
                }
                tokens.push(Token::Str(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '"' | '\'' | '{' | '}' | '[' | ']') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    settings: Settings,
    subcommands: Vec<Subcommand>,
    declarations: Vec<Declaration>,
    /// Binding of the last declaration that parsed cleanly, for error
    /// context.
    context: String,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            settings: Settings::default(),
            subcommands: Vec::new(),
            declarations: Vec::new(),
            context: "the start of the definition".to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn syntax(&self, detail: impl Into<String>) -> DslError {
        DslError::Syntax {
            context: self.context.clone(),
            detail: detail.into(),
        }
    }

    fn parse_file(&mut self) -> Result<(), DslError> {
        while self.peek().is_some() {
            match (self.peek(), self.peek_ahead(1)) {
                (Some(Token::Word(w)), Some(Token::LBrace)) if w == "meta" => {
                    self.pos += 2;
                    self.parse_meta()?;
                }
                (Some(Token::Word(w)), Some(Token::LBrace)) if w == "commands" => {
                    self.pos += 2;
                    self.parse_commands()?;
                }
                _ => {
                    let decl = self.parse_declaration()?;
                    self.context = format!("'{}'", decl.binding);
                    self.declarations.push(decl);
                }
            }
        }
        Ok(())
    }

    /// `key ":" value` pairs until the closing brace. The colon may be
    /// fused to the key or stand alone.
    fn parse_meta(&mut self) -> Result<(), DslError> {
        loop {
            match self.next() {
                Some(Token::RBrace) => return Ok(()),
                Some(Token::Word(raw)) => {
                    let key = self.take_key(raw)?;
                    let value = self.parse_literal("meta value")?;
                    self.settings.apply(&key, &value)?;
                }
                Some(other) => {
                    return Err(self.syntax(format!("unexpected {} in meta block", other.describe())))
                }
                None => return Err(self.syntax("unterminated meta block")),
            }
        }
    }

    /// `"*"? name ":" string` entries until the closing brace.
    fn parse_commands(&mut self) -> Result<(), DslError> {
        loop {
            match self.next() {
                Some(Token::RBrace) => return Ok(()),
                Some(Token::Word(raw)) => {
                    let (needs_spare, raw) = match raw.strip_prefix('*') {
                        Some(rest) => (true, rest.to_string()),
                        None => (false, raw),
                    };
                    let name = self.take_key(raw)?;
                    if name.is_empty() {
                        return Err(self.syntax("empty subcommand name"));
                    }
                    let description = match self.next() {
                        Some(Token::Str(s)) => s,
                        other => {
                            return Err(self.syntax(format!(
                                "subcommand '{name}' needs a description string, found {}",
                                describe_opt(other.as_ref())
                            )))
                        }
                    };
                    if self.subcommands.iter().any(|s| s.name == name) {
                        return Err(DslError::Duplicate {
                            what: "subcommand",
                            name,
                        });
                    }
                    self.subcommands.push(Subcommand {
                        name,
                        description: Some(description),
                        needs_spare,
                    });
                }
                Some(other) => {
                    return Err(
                        self.syntax(format!("unexpected {} in commands block", other.describe()))
                    )
                }
                None => return Err(self.syntax("unterminated commands block")),
            }
        }
    }

    /// Strip a trailing colon from a key word, or consume a standalone
    /// `:` word following it.
    fn take_key(&mut self, raw: String) -> Result<String, DslError> {
        if let Some(stripped) = raw.strip_suffix(':') {
            return Ok(stripped.to_string());
        }
        match self.next() {
            Some(Token::Word(w)) if w == ":" => Ok(raw),
            other => Err(self.syntax(format!(
                "expected ':' after '{raw}', found {}",
                describe_opt(other.as_ref())
            ))),
        }
    }

    fn parse_literal(&mut self, what: &str) -> Result<Literal, DslError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Word(w)) => {
                word_literal(&w).ok_or_else(|| self.syntax(format!("invalid {what} '{w}'")))
            }
            other => Err(self.syntax(format!(
                "expected {what}, found {}",
                describe_opt(other.as_ref())
            ))),
        }
    }

    fn parse_declaration(&mut self) -> Result<Declaration, DslError> {
        let scope = self.parse_scope()?;
        let mut required = false;
        if let Some(Token::Word(w)) = self.peek() {
            if w == "!" {
                required = true;
                self.pos += 1;
            }
        }

        let (kind_seed, pattern) = self.parse_option(&mut required)?;
        let kind = self.parse_type(kind_seed)?;
        let default = self.parse_default()?;
        self.expect_arrow()?;
        let binding = self.parse_binding()?;
        let description = match self.peek() {
            Some(Token::Str(_)) => match self.next() {
                Some(Token::Str(s)) => Some(s),
                _ => unreachable!(),
            },
            _ => None,
        };

        Ok(Declaration {
            scope,
            required,
            kind,
            pattern,
            default,
            binding,
            description,
        })
    }

    fn parse_scope(&mut self) -> Result<Scope, DslError> {
        if let Some(Token::Word(w)) = self.peek() {
            if w == "@" {
                self.pos += 1;
                return Ok(Scope::GlobalOnly);
            }
            if let Some(name) = w.strip_prefix('@') {
                let name = name.to_string();
                self.pos += 1;
                return Ok(Scope::Subcommand(name));
            }
        }
        Ok(Scope::GlobalAlways)
    }

    /// Parse the option position: a switch block, an enum list, or a
    /// short/long pattern. A `!` fused onto the pattern word marks the
    /// declaration required.
    fn parse_option(&mut self, required: &mut bool) -> Result<(KindSeed, Option<Pattern>), DslError> {
        // Switch block, optionally preceded by its display name.
        match (self.peek(), self.peek_ahead(1)) {
            (Some(Token::LBrace), _) => {
                self.pos += 1;
                let arms = self.parse_switch_arms()?;
                return Ok((KindSeed::Switch { name: None, arms }, None));
            }
            (Some(Token::Str(_)), Some(Token::LBrace)) => {
                let name = match self.next() {
                    Some(Token::Str(s)) => s,
                    _ => unreachable!(),
                };
                self.pos += 1; // consume the brace
                let arms = self.parse_switch_arms()?;
                return Ok((KindSeed::Switch { name: Some(name), arms }, None));
            }
            _ => {}
        }

        let word = match self.next() {
            Some(Token::Word(w)) => w,
            other => {
                return Err(self.syntax(format!(
                    "expected an option pattern, found {}",
                    describe_opt(other.as_ref())
                )))
            }
        };
        let word = match word.strip_prefix('!') {
            Some(rest) if !rest.is_empty() => {
                *required = true;
                rest.to_string()
            }
            _ => word,
        };
        let pattern = self.parse_pattern(&word)?;

        // A bracketed value list turns the pattern into an enum.
        if matches!(self.peek(), Some(Token::LBracket)) {
            self.pos += 1;
            let mut choices = Vec::new();
            loop {
                match self.peek() {
                    Some(Token::RBracket) => {
                        self.pos += 1;
                        break;
                    }
                    Some(_) => {
                        let literal = self.parse_literal("enum choice")?;
                        choices.push(literal.to_string());
                    }
                    None => return Err(self.syntax("unterminated enum choice list")),
                }
            }
            if choices.is_empty() {
                return Err(self.syntax("enum declarations need at least one choice"));
            }
            return Ok((KindSeed::Enum { choices }, Some(pattern)));
        }

        Ok((KindSeed::Plain, Some(pattern)))
    }

    fn parse_pattern(&self, word: &str) -> Result<Pattern, DslError> {
        if let Some((short, long)) = word.split_once('/') {
            let mut short_chars = short.chars();
            let c = match (short_chars.next(), short_chars.next()) {
                (Some(c), None) if is_short_char(c) => c,
                _ => {
                    return Err(self.syntax(format!("invalid short option '{short}' in '{word}'")))
                }
            };
            if !is_long_name(long) {
                return Err(self.syntax(format!("invalid long option '{long}' in '{word}'")));
            }
            return Ok(Pattern::Both(c, long.to_string()));
        }
        let mut chars = word.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if is_short_char(c) => Ok(Pattern::Short(c)),
            _ if is_long_name(word) => Ok(Pattern::Long(word.to_string())),
            _ => Err(self.syntax(format!("invalid option pattern '{word}'"))),
        }
    }

    /// `(short "/")? long ":" string ("h" string)?` arms until the
    /// closing brace.
    fn parse_switch_arms(&mut self) -> Result<Vec<SwitchArm>, DslError> {
        let mut arms: Vec<SwitchArm> = Vec::new();
        loop {
            match self.next() {
                Some(Token::RBrace) => break,
                Some(Token::Word(raw)) => {
                    let Some(pattern_text) = raw.strip_suffix(':') else {
                        return Err(
                            self.syntax(format!("switch arm '{raw}' must end in ':\"value\"'"))
                        );
                    };
                    let pattern = self.parse_pattern(pattern_text)?;
                    let (short, long) = match pattern {
                        Pattern::Both(c, l) => (Some(c), l),
                        Pattern::Long(l) => (None, l),
                        Pattern::Short(c) => {
                            return Err(self.syntax(format!(
                                "switch arm '-{c}' needs a long form"
                            )))
                        }
                    };
                    let value = match self.next() {
                        Some(Token::Str(s)) => s,
                        other => {
                            return Err(self.syntax(format!(
                                "switch arm '--{long}' needs a value string, found {}",
                                describe_opt(other.as_ref())
                            )))
                        }
                    };
                    let help = match (self.peek(), self.peek_ahead(1)) {
                        (Some(Token::Word(h)), Some(Token::Str(_))) if h == "h" => {
                            self.pos += 1;
                            match self.next() {
                                Some(Token::Str(s)) => Some(s),
                                _ => unreachable!(),
                            }
                        }
                        _ => None,
                    };
                    arms.push(SwitchArm {
                        short,
                        long,
                        value,
                        help,
                    });
                }
                Some(other) => {
                    return Err(
                        self.syntax(format!("unexpected {} in switch block", other.describe()))
                    )
                }
                None => return Err(self.syntax("unterminated switch block")),
            }
        }
        if arms.is_empty() {
            return Err(self.syntax("switch declarations need at least one arm"));
        }
        Ok(arms)
    }

    fn parse_type(&mut self, seed: KindSeed) -> Result<Kind, DslError> {
        let annotation = match self.peek() {
            Some(Token::Word(w)) if w.starts_with(':') => {
                let w = w.clone();
                self.pos += 1;
                Some(w)
            }
            _ => None,
        };

        match seed {
            KindSeed::Switch { name, arms } => {
                if let Some(t) = annotation {
                    return Err(self.syntax(format!("switch declarations take no type, found '{t}'")));
                }
                Ok(Kind::Switch { name, arms })
            }
            KindSeed::Enum { choices } => {
                if let Some(t) = annotation {
                    return Err(self.syntax(format!("enum declarations take no type, found '{t}'")));
                }
                Ok(Kind::Enum { choices })
            }
            KindSeed::Plain => match annotation.as_deref() {
                None => Ok(Kind::Scalar(ValueType::Str)),
                Some(":flag") => Ok(Kind::Flag),
                Some(":str") => Ok(Kind::Scalar(ValueType::Str)),
                Some(":int") => Ok(Kind::Scalar(ValueType::Int)),
                Some(":float") => Ok(Kind::Scalar(ValueType::Float)),
                Some(":num") => Ok(Kind::Scalar(ValueType::Num)),
                Some(":strs") => Ok(Kind::Vector(ValueType::Str)),
                Some(":ints") => Ok(Kind::Vector(ValueType::Int)),
                Some(":floats") => Ok(Kind::Vector(ValueType::Float)),
                Some(":nums") => Ok(Kind::Vector(ValueType::Num)),
                Some(other) => Err(self.syntax(format!("unknown type annotation '{other}'"))),
            },
        }
    }

    fn parse_default(&mut self) -> Result<Option<Literal>, DslError> {
        match self.peek() {
            Some(Token::Str(_)) => match self.next() {
                Some(Token::Str(s)) => Ok(Some(Literal::Str(s))),
                _ => unreachable!(),
            },
            Some(Token::Word(w)) if w != "=>" => {
                let w = w.clone();
                match word_literal(&w) {
                    Some(literal) => {
                        self.pos += 1;
                        Ok(Some(literal))
                    }
                    None => Err(self.syntax(format!("expected a default value or '=>', found '{w}'"))),
                }
            }
            _ => Ok(None),
        }
    }

    fn expect_arrow(&mut self) -> Result<(), DslError> {
        match self.next() {
            Some(Token::Word(w)) if w == "=>" => Ok(()),
            other => Err(self.syntax(format!(
                "expected '=>', found {}",
                describe_opt(other.as_ref())
            ))),
        }
    }

    fn parse_binding(&mut self) -> Result<String, DslError> {
        let name = match self.next() {
            Some(Token::Word(w)) => w,
            other => {
                return Err(self.syntax(format!(
                    "expected a binding name after '=>', found {}",
                    describe_opt(other.as_ref())
                )))
            }
        };
        if !is_valid_binding(&name) || is_reserved_binding(&name) {
            return Err(DslError::IllegalBinding(name));
        }
        Ok(name)
    }
}

/// Intermediate option classification before the type annotation is seen.
enum KindSeed {
    Plain,
    Enum { choices: Vec<String> },
    Switch { name: Option<String>, arms: Vec<SwitchArm> },
}

fn describe_opt(token: Option<&Token>) -> String {
    match token {
        Some(t) => t.describe(),
        None => "end of definition".to_string(),
    }
}

/// Interpret a bare word as a literal: signed integer, float, or boolean.
fn word_literal(word: &str) -> Option<Literal> {
    match word {
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        _ => {}
    }
    let digits = word.replace('_', "");
    if let Ok(i) = digits.parse::<i64>() {
        return Some(Literal::Int(i));
    }
    if let Ok(x) = digits.parse::<f64>() {
        return Some(Literal::Float(x));
    }
    None
}
