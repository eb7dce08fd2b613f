//! The bind & validate engine: normalized argv against the schema's
//! declarations, producing typed output bindings and the residual
//! positional arguments.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::dsl::Schema;
use crate::argv::FlagIndex;
use crate::model::{Declaration, Kind, Literal, Value, ValueType};

/// Exact integer grammar: plain digits, or thousands groups separated by
/// underscores.
fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d{1,3}(_\d{3})*|\d+)$").expect("valid regex literal"))
}

/// Exact float grammar: an integer part (grouped or plain) with a dotted
/// fraction.
fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d{1,3}(_\d{3})+|\d+)\.\d+$").expect("valid regex literal"))
}

/// Tokens made only of numeric-looking characters; used to distinguish
/// `UnknownFormat` from `TypeMismatch`.
fn numeric_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9_.\-]+$").expect("valid regex literal"))
}

/// Errors raised while binding argv against the declarations.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("a subcommand is required (available: {})", .available.join(", "))]
    MissingSubcommand { available: Vec<String> },

    #[error("missing required option: {0}")]
    MissingRequired(String),

    #[error("missing value for option: {0}")]
    MissingValue(String),

    #[error("value for {option} looks like another option: '{value}' (escape it with --)")]
    ParamLikeValue { option: String, value: String },

    #[error("value for {option} is not a number: '{value}'")]
    TypeMismatch { option: String, value: String },

    #[error("numeric value for {option} is malformed: '{value}'")]
    UnknownFormat { option: String, value: String },

    #[error("invalid choice '{value}' for {option} (expected one of: {})", .choices.join(", "))]
    InvalidChoice {
        option: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("unknown option: {0}")]
    UnknownFlag(String),

    #[error("expected at least one positional argument for {0}")]
    MissingSpare(String),
}

impl BindError {
    /// The user-visible error-kind label, as handed to the error hook.
    pub fn label(&self) -> &'static str {
        match self {
            BindError::MissingSubcommand { .. } => "MissingSubcommand",
            BindError::MissingRequired(_) => "MissingRequired",
            BindError::MissingValue(_) => "MissingValue",
            BindError::ParamLikeValue { .. } => "ParamLikeValue",
            BindError::TypeMismatch { .. } => "TypeMismatch",
            BindError::UnknownFormat { .. } => "UnknownFormat",
            BindError::InvalidChoice { .. } => "InvalidChoice",
            BindError::UnknownFlag(_) => "UnknownFlag",
            BindError::MissingSpare(_) => "MissingSpare",
        }
    }
}

/// The result of a successful parse: typed bindings (active-scope
/// declarations first, then out-of-scope defaults), the subcommand
/// selection, the residual positionals, and the was-set record.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub bindings: Vec<(String, Value)>,
    pub subcommand: Option<String>,
    pub spare_args: Vec<String>,
    set_from_argv: HashSet<String>,
}

impl ParseOutput {
    pub fn get(&self, binding: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(name, _)| name == binding)
            .map(|(_, value)| value)
    }

    /// Whether the binding was populated from argv rather than left at
    /// its default.
    pub fn was_set(&self, binding: &str) -> bool {
        self.set_from_argv.contains(binding)
    }

    /// Bindings that were populated from argv, for the was-set table.
    pub fn set_bindings(&self) -> impl Iterator<Item = &str> {
        self.set_from_argv.iter().map(String::as_str)
    }
}

/// Bind normalized argv against the schema. `argv` must already be in
/// the form produced by [`crate::argv::normalize`].
pub fn bind(schema: &Schema, argv: &[String]) -> Result<ParseOutput, BindError> {
    Binder::new(schema, argv).run()
}

struct Binder<'a> {
    schema: &'a Schema,
    argv: &'a [String],
    index: FlagIndex,
    taken: HashSet<usize>,
    output: ParseOutput,
}

impl<'a> Binder<'a> {
    fn new(schema: &'a Schema, argv: &'a [String]) -> Self {
        Self {
            schema,
            argv,
            index: FlagIndex::build(argv),
            taken: HashSet::new(),
            output: ParseOutput::default(),
        }
    }

    fn run(mut self) -> Result<ParseOutput, BindError> {
        self.select_subcommand()?;
        let schema = self.schema;
        let selected = self.output.subcommand.clone();

        for decl in schema.declarations_in_scope(selected.as_deref()) {
            self.bind_declaration(decl)?;
        }
        // Out-of-scope declarations still surface their defaults, so the
        // embedder can reference every binding unconditionally. In-scope
        // results win on name collisions across disjoint scopes.
        for decl in &schema.declarations {
            if self.output.get(&decl.binding).is_none() {
                let value = default_value(decl);
                self.output.bindings.push((decl.binding.clone(), value));
            }
        }

        self.collect_residuals()?;
        Ok(self.output)
    }

    fn select_subcommand(&mut self) -> Result<(), BindError> {
        if self.schema.subcommands.is_empty() {
            return Ok(());
        }
        if let Some(first) = self.argv.first() {
            if let Some(sub) = self.schema.subcommand(first) {
                self.output.subcommand = Some(sub.name.clone());
                self.taken.insert(0);
                return Ok(());
            }
        }
        if self.schema.settings.subcommand_required {
            return Err(BindError::MissingSubcommand {
                available: self.schema.subcommands.iter().map(|s| s.name.clone()).collect(),
            });
        }
        Ok(())
    }

    fn bind_declaration(&mut self, decl: &Declaration) -> Result<(), BindError> {
        let option = display_name(decl);
        match &decl.kind {
            Kind::Flag => self.bind_flag(decl),
            Kind::Scalar(ty) => self.bind_scalar(decl, &option, *ty),
            Kind::Vector(ty) => self.bind_vector(decl, &option, *ty),
            Kind::Enum { choices } => self.bind_enum(decl, &option, choices),
            Kind::Switch { arms, .. } => self.bind_switch(decl, &option, arms),
        }
    }

    fn bind_flag(&mut self, decl: &Declaration) -> Result<(), BindError> {
        let slots = self.index.merged(&decl.flag_tokens());
        let resting = decl.flag_default();
        if slots.is_empty() {
            self.emit(decl, Value::Bool(resting), false);
        } else {
            for slot in &slots {
                self.taken.insert(slot - 1);
            }
            self.emit(decl, Value::Bool(!resting), true);
        }
        Ok(())
    }

    fn bind_scalar(
        &mut self,
        decl: &Declaration,
        option: &str,
        ty: ValueType,
    ) -> Result<(), BindError> {
        let slots = self.index.merged(&decl.flag_tokens());
        if slots.is_empty() {
            if decl.required {
                return Err(BindError::MissingRequired(option.to_string()));
            }
            self.emit(decl, default_value(decl), false);
            return Ok(());
        }

        // Earlier occurrences lose to the last one but are still consumed.
        let (winner, rest) = slots.split_last().expect("non-empty occurrence list");
        for slot in rest {
            self.taken.insert(slot - 1);
            self.consume_value_lenient(*slot);
        }
        self.taken.insert(winner - 1);
        let raw = self.fetch_value(option, *winner)?;
        self.check_empty(decl, option, &raw)?;
        let value = coerce(option, &raw, ty)?;
        self.emit(decl, value, true);
        Ok(())
    }

    fn bind_vector(
        &mut self,
        decl: &Declaration,
        option: &str,
        ty: ValueType,
    ) -> Result<(), BindError> {
        let slots = self.index.merged(&decl.flag_tokens());
        if slots.is_empty() {
            if decl.required {
                return Err(BindError::MissingRequired(option.to_string()));
            }
            self.emit(decl, Value::List(Vec::new()), false);
            return Ok(());
        }
        let mut items = Vec::with_capacity(slots.len());
        for slot in &slots {
            self.taken.insert(slot - 1);
            let raw = self.fetch_value(option, *slot)?;
            items.push(coerce(option, &raw, ty)?);
        }
        self.emit(decl, Value::List(items), true);
        Ok(())
    }

    fn bind_enum(
        &mut self,
        decl: &Declaration,
        option: &str,
        choices: &[String],
    ) -> Result<(), BindError> {
        let slots = self.index.merged(&decl.flag_tokens());
        if slots.is_empty() {
            if decl.required {
                return Err(BindError::MissingRequired(option.to_string()));
            }
            self.emit(decl, default_value(decl), false);
            return Ok(());
        }
        let (winner, rest) = slots.split_last().expect("non-empty occurrence list");
        for slot in rest {
            self.taken.insert(slot - 1);
            self.consume_value_lenient(*slot);
        }
        self.taken.insert(winner - 1);
        let raw = self.fetch_value(option, *winner)?;
        self.check_empty(decl, option, &raw)?;
        if !choices.iter().any(|c| c == &raw) {
            return Err(BindError::InvalidChoice {
                option: option.to_string(),
                value: raw,
                choices: choices.to_vec(),
            });
        }
        self.emit(decl, Value::Str(raw), true);
        Ok(())
    }

    fn bind_switch(
        &mut self,
        decl: &Declaration,
        option: &str,
        arms: &[crate::model::SwitchArm],
    ) -> Result<(), BindError> {
        let mut winner: Option<&crate::model::SwitchArm> = None;
        for arm in arms {
            let slots = self.index.merged(&arm.pattern().tokens());
            if slots.is_empty() {
                continue;
            }
            for slot in &slots {
                self.taken.insert(slot - 1);
            }
            // First present arm in declaration order wins; the rest are
            // consumed so they do not surface as unknown flags.
            if winner.is_none() {
                winner = Some(arm);
            }
        }
        match winner {
            Some(arm) => {
                let value = arm.value.clone();
                self.check_empty(decl, option, &value)?;
                self.emit(decl, Value::Str(value), true);
            }
            None => {
                if decl.required {
                    return Err(BindError::MissingRequired(option.to_string()));
                }
                self.emit(decl, default_value(decl), false);
            }
        }
        Ok(())
    }

    /// Fetch the value at a slot, honoring the `--` escape. Consumes the
    /// slots it reads.
    fn fetch_value(&mut self, option: &str, slot: usize) -> Result<String, BindError> {
        match self.argv.get(slot) {
            None => Err(BindError::MissingValue(option.to_string())),
            Some(token) if token == "--" => match self.argv.get(slot + 1) {
                Some(next) => {
                    self.taken.insert(slot);
                    self.taken.insert(slot + 1);
                    Ok(next.clone())
                }
                None => Err(BindError::MissingValue(option.to_string())),
            },
            Some(token) if token.starts_with('-') => Err(BindError::ParamLikeValue {
                option: option.to_string(),
                value: token.clone(),
            }),
            Some(token) => {
                self.taken.insert(slot);
                Ok(token.clone())
            }
        }
    }

    /// Consume a losing occurrence's value slot without validating it.
    /// Losing occurrences are never shape-checked, so the slot is taken
    /// whatever it holds.
    fn consume_value_lenient(&mut self, slot: usize) {
        match self.argv.get(slot) {
            Some(token) if token == "--" => {
                self.taken.insert(slot);
                if slot + 1 < self.argv.len() {
                    self.taken.insert(slot + 1);
                }
            }
            Some(_) => {
                self.taken.insert(slot);
            }
            None => {}
        }
    }

    fn check_empty(
        &self,
        decl: &Declaration,
        option: &str,
        value: &str,
    ) -> Result<(), BindError> {
        if decl.required && value.is_empty() && !self.schema.settings.allow_empty_values {
            return Err(BindError::MissingRequired(option.to_string()));
        }
        Ok(())
    }

    fn emit(&mut self, decl: &Declaration, value: Value, from_argv: bool) {
        if from_argv {
            self.output.set_from_argv.insert(decl.binding.clone());
        }
        self.output.bindings.push((decl.binding.clone(), value));
    }

    fn collect_residuals(&mut self) -> Result<(), BindError> {
        let mut escaped = false;
        for (i, token) in self.argv.iter().enumerate() {
            if self.taken.contains(&i) {
                escaped = false;
                continue;
            }
            if escaped {
                self.output.spare_args.push(token.clone());
                escaped = false;
                continue;
            }
            if token == "--" {
                escaped = true;
                continue;
            }
            if token.starts_with('-') {
                return Err(BindError::UnknownFlag(token.clone()));
            }
            self.output.spare_args.push(token.clone());
        }

        if self.output.spare_args.is_empty() {
            match self.output.subcommand.as_deref() {
                Some(name) => {
                    let needs = self
                        .schema
                        .subcommand(name)
                        .map(|s| s.needs_spare)
                        .unwrap_or(false);
                    if needs {
                        return Err(BindError::MissingSpare(name.to_string()));
                    }
                }
                None => {
                    if self.schema.settings.spare_args_required {
                        return Err(BindError::MissingSpare(
                            self.schema.settings.spare_args_binding.clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// The user-visible name of a declaration for error messages.
fn display_name(decl: &Declaration) -> String {
    match (&decl.pattern, &decl.kind) {
        (Some(pattern), _) => pattern.to_string(),
        (None, Kind::Switch { name: Some(name), .. }) => name.clone(),
        (None, Kind::Switch { arms, .. }) => arms
            .first()
            .map(|a| format!("--{}", a.long))
            .unwrap_or_else(|| decl.binding.clone()),
        (None, _) => decl.binding.clone(),
    }
}

/// The value a declaration carries when argv never mentions it.
fn default_value(decl: &Declaration) -> Value {
    match &decl.kind {
        Kind::Flag => Value::Bool(decl.flag_default()),
        Kind::Vector(_) => Value::List(Vec::new()),
        Kind::Enum { choices } => match &decl.default {
            Some(literal) => Value::Str(literal.to_string()),
            None => Value::Str(choices.first().cloned().unwrap_or_default()),
        },
        Kind::Switch { .. } => match &decl.default {
            Some(literal) => Value::Str(literal.to_string()),
            None => Value::Str("0".to_string()),
        },
        Kind::Scalar(_) => match &decl.default {
            Some(Literal::Int(i)) => Value::Int(*i),
            Some(Literal::Float(x)) => Value::Float(*x),
            Some(Literal::Bool(b)) => Value::Bool(*b),
            Some(Literal::Str(s)) => Value::Str(s.clone()),
            None => Value::Str(String::new()),
        },
    }
}

/// Validate and convert one raw argv value according to the declared
/// element type.
fn coerce(option: &str, raw: &str, ty: ValueType) -> Result<Value, BindError> {
    match ty {
        ValueType::Str => Ok(Value::Str(raw.to_string())),
        ValueType::Int => {
            if !int_re().is_match(raw) {
                return Err(numeric_error(option, raw));
            }
            parse_int(option, raw)
        }
        ValueType::Float => {
            if !float_re().is_match(raw) {
                return Err(numeric_error(option, raw));
            }
            parse_float(option, raw)
        }
        ValueType::Num => {
            if int_re().is_match(raw) {
                parse_int(option, raw)
            } else if float_re().is_match(raw) {
                parse_float(option, raw)
            } else {
                Err(numeric_error(option, raw))
            }
        }
    }
}

fn parse_int(option: &str, raw: &str) -> Result<Value, BindError> {
    raw.replace('_', "")
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| BindError::UnknownFormat {
            option: option.to_string(),
            value: raw.to_string(),
        })
}

fn parse_float(option: &str, raw: &str) -> Result<Value, BindError> {
    raw.replace('_', "")
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| BindError::UnknownFormat {
            option: option.to_string(),
            value: raw.to_string(),
        })
}

/// Numeric-looking but malformed is `UnknownFormat`; anything else is
/// `TypeMismatch`.
fn numeric_error(option: &str, raw: &str) -> BindError {
    if !raw.is_empty() && numeric_chars_re().is_match(raw) {
        BindError::UnknownFormat {
            option: option.to_string(),
            value: raw.to_string(),
        }
    } else {
        BindError::TypeMismatch {
            option: option.to_string(),
            value: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::normalize;

    fn run(dsl: &str, raw: &[&str]) -> Result<ParseOutput, BindError> {
        let schema = Schema::parse(dsl).unwrap();
        let argv: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        bind(&schema, &normalize(&argv))
    }

    fn output(dsl: &str, raw: &[&str]) -> ParseOutput {
        run(dsl, raw).unwrap()
    }

    #[test]
    fn test_bundled_flags_with_value() {
        let out = output(
            "a/alpha :flag => A\nb/beta :flag => B\nc/cat :str => C",
            &["-abc", "value"],
        );
        assert_eq!(out.get("A"), Some(&Value::Bool(true)));
        assert_eq!(out.get("B"), Some(&Value::Bool(true)));
        assert_eq!(out.get("C"), Some(&Value::Str("value".to_string())));
        assert!(out.spare_args.is_empty());
    }

    #[test]
    fn test_attached_numeric_value() {
        let out = output("t/times :int => T", &["-t2"]);
        assert_eq!(out.get("T"), Some(&Value::Int(2)));
        assert!(out.was_set("T"));
    }

    #[test]
    fn test_flag_defaults_and_inversion() {
        let out = output("v/verbose :flag => V\nc/color :flag true => C", &[]);
        assert_eq!(out.get("V"), Some(&Value::Bool(false)));
        assert_eq!(out.get("C"), Some(&Value::Bool(true)));
        let out = output("v/verbose :flag => V\nc/color :flag true => C", &["-v", "-c"]);
        assert_eq!(out.get("V"), Some(&Value::Bool(true)));
        assert_eq!(out.get("C"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_scalar_last_occurrence_wins() {
        let out = output("t/times :int => T", &["-t", "1", "--times", "7"]);
        assert_eq!(out.get("T"), Some(&Value::Int(7)));
        assert!(out.spare_args.is_empty());
    }

    #[test]
    fn test_losing_occurrence_with_dash_value_consumed() {
        // The losing value never gets validated, but its slot must still
        // be taken or it would resurface as an unknown flag.
        let out = output("t/times :int => T", &["-t", "-5", "-t", "10"]);
        assert_eq!(out.get("T"), Some(&Value::Int(10)));
        assert!(out.spare_args.is_empty());
    }

    #[test]
    fn test_vector_preserves_argv_order() {
        let out = output("i/include :strs => I", &["-i", "a", "-i", "b", "--include", "c"]);
        assert_eq!(
            out.get("I"),
            Some(&Value::List(vec![
                Value::Str("a".to_string()),
                Value::Str("b".to_string()),
                Value::Str("c".to_string()),
            ]))
        );
    }

    #[test]
    fn test_vector_absent_is_empty() {
        let out = output("i/include :strs => I", &[]);
        assert_eq!(out.get("I"), Some(&Value::List(Vec::new())));
        assert!(!out.was_set("I"));
    }

    #[test]
    fn test_enum_accepts_declared_choice() {
        let dsl = r#"l/level ["debug" "info" "warn" "error"] => L"#;
        let out = output(dsl, &["--level", "warn"]);
        assert_eq!(out.get("L"), Some(&Value::Str("warn".to_string())));
    }

    #[test]
    fn test_enum_rejects_unknown_choice() {
        let dsl = r#"l/level ["debug" "info" "warn" "error"] => L"#;
        let result = run(dsl, &["--level", "nope"]);
        assert!(matches!(result, Err(BindError::InvalidChoice { value, .. }) if value == "nope"));
    }

    #[test]
    fn test_enum_defaults_to_first_choice() {
        let dsl = r#"l/level ["debug" "info"] => L"#;
        let out = output(dsl, &["spare"]);
        assert_eq!(out.get("L"), Some(&Value::Str("debug".to_string())));
        assert!(!out.was_set("L"));
    }

    #[test]
    fn test_switch_first_arm_wins() {
        let dsl = r#"! { l/list:"list" g/get:"download" r/remove:"remove" } => MODE"#;
        let out = output(dsl, &["-g"]);
        assert_eq!(out.get("MODE"), Some(&Value::Str("download".to_string())));
        // Declaration order beats argv order.
        let out = output(dsl, &["-r", "-l"]);
        assert_eq!(out.get("MODE"), Some(&Value::Str("list".to_string())));
    }

    #[test]
    fn test_switch_required_absent() {
        let dsl = r#"! { l/list:"list" g/get:"download" } => MODE"#;
        let result = run(dsl, &[]);
        assert!(matches!(result, Err(BindError::MissingRequired(_))));
    }

    #[test]
    fn test_switch_optional_default() {
        let dsl = r#"{ l/list:"list" g/get:"download" } => MODE"#;
        let out = output(dsl, &[]);
        assert_eq!(out.get("MODE"), Some(&Value::Str("0".to_string())));
        let dsl = r#"{ l/list:"list" } "none" => MODE"#;
        let out = output(dsl, &[]);
        assert_eq!(out.get("MODE"), Some(&Value::Str("none".to_string())));
    }

    #[test]
    fn test_subcommand_routing_and_missing_spare() {
        let dsl = r#"commands { install: "Install" *remove: "Remove" }
            @install u/update :flag => U
            @remove k/keep :flag => K"#;
        let result = run(dsl, &["remove", "-k"]);
        assert!(matches!(result, Err(BindError::MissingSpare(name)) if name == "remove"));

        let out = output(dsl, &["remove", "-k", "pkg"]);
        assert_eq!(out.subcommand.as_deref(), Some("remove"));
        assert_eq!(out.get("K"), Some(&Value::Bool(true)));
        // Out-of-scope declarations still surface their defaults.
        assert_eq!(out.get("U"), Some(&Value::Bool(false)));
        assert!(!out.was_set("U"));
        assert_eq!(out.spare_args, vec!["pkg"]);
    }

    #[test]
    fn test_escape_binds_flag_like_value() {
        let out = output("o/out :str => O", &["-o", "--", "--weird"]);
        assert_eq!(out.get("O"), Some(&Value::Str("--weird".to_string())));
        assert!(out.spare_args.is_empty());
    }

    #[test]
    fn test_param_like_value_rejected() {
        let result = run("o/out :str => O", &["-o", "--weird"]);
        assert!(matches!(
            result,
            Err(BindError::ParamLikeValue { value, .. }) if value == "--weird"
        ));
    }

    #[test]
    fn test_escape_at_end_is_missing_value() {
        let result = run("o/out :str => O", &["-o", "--"]);
        assert!(matches!(result, Err(BindError::MissingValue(_))));
    }

    #[test]
    fn test_value_at_end_is_missing_value() {
        let result = run("o/out :str => O", &["-o"]);
        assert!(matches!(result, Err(BindError::MissingValue(_))));
    }

    #[test]
    fn test_required_scalar_missing() {
        let result = run("! o/out :str => O", &[]);
        assert!(matches!(result, Err(BindError::MissingRequired(_))));
    }

    #[test]
    fn test_required_with_default_still_required() {
        let result = run(r#"! o/out :str "a.txt" => O"#, &[]);
        assert!(matches!(result, Err(BindError::MissingRequired(_))));
    }

    #[test]
    fn test_optional_default_applies() {
        let out = output(r#"o/out :str "a.txt" => O"#, &[]);
        assert_eq!(out.get("O"), Some(&Value::Str("a.txt".to_string())));
        assert!(!out.was_set("O"));
    }

    #[test]
    fn test_required_empty_string_rejected() {
        let result = run("! o/out :str => O", &["-o", ""]);
        assert!(matches!(result, Err(BindError::MissingRequired(_))));
    }

    #[test]
    fn test_allow_empty_values() {
        let dsl = "meta { allow_empty_values: true }\n! o/out :str => O";
        let out = output(dsl, &["-o", ""]);
        assert_eq!(out.get("O"), Some(&Value::Str(String::new())));
    }

    #[test]
    fn test_int_underscore_groups() {
        let out = output("t/times :int => T", &["-t", "1_000"]);
        assert_eq!(out.get("T"), Some(&Value::Int(1000)));
    }

    #[test]
    fn test_int_bad_grouping_is_unknown_format() {
        let result = run("t/times :int => T", &["-t", "1_23"]);
        assert!(matches!(result, Err(BindError::UnknownFormat { .. })));
    }

    #[test]
    fn test_int_garbage_is_type_mismatch() {
        let result = run("t/times :int => T", &["-t", "seven"]);
        assert!(matches!(result, Err(BindError::TypeMismatch { .. })));
    }

    #[test]
    fn test_float_values() {
        let out = output("r/ratio :float => R", &["-r", "2.5"]);
        assert_eq!(out.get("R"), Some(&Value::Float(2.5)));
        let out = output("r/ratio :float => R", &["-r", "1_000.25"]);
        assert_eq!(out.get("R"), Some(&Value::Float(1000.25)));
    }

    #[test]
    fn test_float_requires_fraction() {
        let result = run("r/ratio :float => R", &["-r", "5"]);
        assert!(matches!(result, Err(BindError::UnknownFormat { .. })));
    }

    #[test]
    fn test_num_prefers_int() {
        let out = output("n/nr :num => N", &["-n", "5"]);
        assert_eq!(out.get("N"), Some(&Value::Int(5)));
        let out = output("n/nr :num => N", &["-n", "5.5"]);
        assert_eq!(out.get("N"), Some(&Value::Float(5.5)));
    }

    #[test]
    fn test_negative_numbers() {
        let out = output("t/temp :int => T", &["--temp", "--", "-12"]);
        assert_eq!(out.get("T"), Some(&Value::Int(-12)));
    }

    #[test]
    fn test_unknown_flag_in_residuals() {
        let result = run("v/verbose :flag => V", &["-v", "--wat"]);
        assert!(matches!(result, Err(BindError::UnknownFlag(flag)) if flag == "--wat"));
    }

    #[test]
    fn test_spare_args_collected_in_order() {
        let out = output("v/verbose :flag => V", &["one", "-v", "two", "--", "-three"]);
        assert_eq!(out.spare_args, vec!["one", "two", "-three"]);
    }

    #[test]
    fn test_spare_args_required() {
        let dsl = "meta { spare_args_required: true }\nv/verbose :flag => V";
        let result = run(dsl, &["-v"]);
        assert!(matches!(result, Err(BindError::MissingSpare(_))));
        let out = output(dsl, &["-v", "file"]);
        assert_eq!(out.spare_args, vec!["file"]);
    }

    #[test]
    fn test_missing_subcommand_lists_available() {
        let dsl = r#"meta { subcommand_required: true }
            commands { install: "Install" remove: "Remove" }"#;
        let result = run(dsl, &["what"]);
        match result {
            Err(BindError::MissingSubcommand { available }) => {
                assert_eq!(available, vec!["install", "remove"]);
            }
            other => panic!("expected MissingSubcommand, got {other:?}"),
        }
    }

    #[test]
    fn test_was_set_tracking() {
        let out = output("t/times :int 3 => T\nv/verbose :flag => V", &["-v"]);
        assert!(out.was_set("V"));
        assert!(!out.was_set("T"));
        assert_eq!(out.get("T"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_residual_disjointness() {
        let out = output(
            "o/out :str => O\nv/verbose :flag => V",
            &["in.txt", "-o", "out.txt", "-v", "more.txt"],
        );
        assert_eq!(out.spare_args, vec!["in.txt", "more.txt"]);
        assert_eq!(out.get("O"), Some(&Value::Str("out.txt".to_string())));
    }

    #[test]
    fn test_bundle_equivalence() {
        let dsl = "a/alpha :flag => A\nb/beta :flag => B\nc/cat :str => C";
        let bundled = output(dsl, &["-abc", "value"]);
        let plain = output(dsl, &["-a", "-b", "-c", "value"]);
        assert_eq!(bundled.get("A"), plain.get("A"));
        assert_eq!(bundled.get("B"), plain.get("B"));
        assert_eq!(bundled.get("C"), plain.get("C"));
    }
}
