//! Constraint directives (`+kubebuilder:...` markers).
//!
//! A static catalog maps `(name, target)` to the kind of rule a directive
//! produces. Parsing turns a raw directive line into a typed [`ParsedRule`];
//! [`apply`] mutates a schema node with it.
//!
//! - Every plain `validation:` rule is registered twice, once per target,
//!   since it can decorate a field or the type that field points at.
//! - `validation:items:<Rule>` is the element-scoped spelling of a
//!   `validation:` rule and lands on the array's `items` schema.
pub mod apply;
pub mod args;

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::error::MarkerError;
use crate::schema::Schema;
use args::Cursor;

const VALIDATION: &str = "kubebuilder:validation:";
const ITEMS: &str = "items:";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// What a directive decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Type,
    Field,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Type => f.write_str("type"),
            Target::Field => f.write_str("field"),
        }
    }
}

/// Opaque replacement requested by `validation:Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOverride {
    Object,
    Value,
}

/// Payload of `validation:XValidation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XValidation {
    pub rule: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_expression: String,
}

/// One rule family per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Maximum(f64),
    Minimum(f64),
    ExclusiveMaximum(bool),
    ExclusiveMinimum(bool),
    MultipleOf(f64),
    MaxProperties(u64),
    MinProperties(u64),
    MaxLength(u64),
    MinLength(u64),
    Pattern(String),
    MaxItems(u64),
    MinItems(u64),
    UniqueItems(bool),
    Enum(Vec<Value>),
    Format(String),
    Type(TypeOverride),
    PreserveUnknownFields,
    EmbeddedResource,
    IntOrString,
    XValidation(XValidation),
    Required,
    Nullable,
    Default(Value),
    Example(Value),
    Schemaless,
}

/// Where a parsed rule lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Node,
    Items,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub rule: Rule,
    pub scope: Scope,
}

/// Rule kind a definition produces; fixes the argument grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Maximum,
    Minimum,
    ExclusiveMaximum,
    ExclusiveMinimum,
    MultipleOf,
    MaxProperties,
    MinProperties,
    MaxLength,
    MinLength,
    Pattern,
    MaxItems,
    MinItems,
    UniqueItems,
    Enum,
    Format,
    Type,
    PreserveUnknownFields,
    EmbeddedResource,
    IntOrString,
    XValidation,
    Required,
    Nullable,
    Default,
    Example,
    Schemaless,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub target: Target,
    pub kind: RuleKind,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: Vec<Definition>,
}

// ————————————————————————————————————————————————————————————————————————————
// CATALOG
// ————————————————————————————————————————————————————————————————————————————

/// `validation:` rules valid on both fields and types.
const VALIDATION_MARKERS: [(&str, RuleKind); 20] = [
    ("Maximum", RuleKind::Maximum),
    ("Minimum", RuleKind::Minimum),
    ("ExclusiveMaximum", RuleKind::ExclusiveMaximum),
    ("ExclusiveMinimum", RuleKind::ExclusiveMinimum),
    ("MultipleOf", RuleKind::MultipleOf),
    ("MinProperties", RuleKind::MinProperties),
    ("MaxProperties", RuleKind::MaxProperties),
    ("MaxLength", RuleKind::MaxLength),
    ("MinLength", RuleKind::MinLength),
    ("Pattern", RuleKind::Pattern),
    ("MaxItems", RuleKind::MaxItems),
    ("MinItems", RuleKind::MinItems),
    ("UniqueItems", RuleKind::UniqueItems),
    ("Enum", RuleKind::Enum),
    ("Format", RuleKind::Format),
    ("Type", RuleKind::Type),
    ("XPreserveUnknownFields", RuleKind::PreserveUnknownFields),
    ("XEmbeddedResource", RuleKind::EmbeddedResource),
    ("XIntOrString", RuleKind::IntOrString),
    ("XValidation", RuleKind::XValidation),
];

/// Rules that only make sense on a field.
const FIELD_ONLY_MARKERS: [(&str, RuleKind); 7] = [
    ("kubebuilder:validation:Required", RuleKind::Required),
    ("kubebuilder:validation:Nullable", RuleKind::Nullable),
    ("kubebuilder:default", RuleKind::Default),
    ("kubebuilder:example", RuleKind::Example),
    ("kubebuilder:validation:EmbeddedResource", RuleKind::EmbeddedResource),
    ("kubebuilder:validation:Schemaless", RuleKind::Schemaless),
    ("kubebuilder:pruning:PreserveUnknownFields", RuleKind::PreserveUnknownFields),
];

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::builtin);

impl Registry {
    /// The process-wide catalog; built on first use.
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    pub fn builtin() -> Self {
        let mut reg = Registry::default();
        for (name, kind) in VALIDATION_MARKERS {
            reg.register(format!("{VALIDATION}{name}"), Target::Field, kind);
        }
        for (name, kind) in VALIDATION_MARKERS {
            reg.register(format!("{VALIDATION}{name}"), Target::Type, kind);
        }
        for (name, kind) in FIELD_ONLY_MARKERS {
            reg.register(name, Target::Field, kind);
        }
        reg.register("kubebuilder:pruning:PreserveUnknownFields", Target::Type, RuleKind::PreserveUnknownFields);
        reg
    }

    /// Add a directive. Re-registering the same `(name, target)` replaces it.
    pub fn register(&mut self, name: impl Into<String>, target: Target, kind: RuleKind) {
        let name = name.into();
        match self.definitions.iter_mut().find(|d| d.name == name && d.target == target) {
            Some(existing) => existing.kind = kind,
            None => self.definitions.push(Definition { name, target, kind }),
        }
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Longest registered name that `marker` starts with, followed by the
    /// end of input, `=` or `:`.
    pub fn lookup(&self, marker: &str, target: Target) -> Option<&Definition> {
        self.definitions
            .iter()
            .filter(|d| d.target == target && names_marker(marker, &d.name))
            .max_by_key(|d| d.name.len())
    }

    pub fn parse(&self, raw: &str, target: Target) -> Result<ParsedRule, MarkerError> {
        let marker = raw.trim().strip_prefix('+').unwrap_or(raw.trim());
        let no_definition = || MarkerError::NoDefinition { rule: raw.to_string(), target };

        let (marker, scope) = match marker.strip_prefix(VALIDATION).and_then(|r| r.strip_prefix(ITEMS)) {
            Some(inner) => (format!("{VALIDATION}{inner}"), Scope::Items),
            None => (marker.to_string(), Scope::Node),
        };
        let def = self.lookup(&marker, target).ok_or_else(no_definition)?;
        if scope == Scope::Items && !is_validation_marker(&def.name) {
            return Err(no_definition());
        }

        let args = &marker[def.name.len()..];
        let rule = def.kind.parse_args(args).map_err(|reason| MarkerError::Malformed {
            rule: raw.to_string(),
            reason,
        })?;
        Ok(ParsedRule { rule, scope })
    }

    /// Parse every raw rule for `target` and apply it to `schema` in order.
    pub fn apply_rules(&self, rules: &[String], schema: &mut Schema, target: Target) -> Result<(), MarkerError> {
        for raw in rules {
            let parsed = self.parse(raw, target)?;
            apply::apply(&parsed, schema)?;
        }
        Ok(())
    }

    /// Whether a field's rules contain `validation:Required`.
    pub fn is_required(&self, rules: &[String]) -> Result<bool, MarkerError> {
        for raw in rules {
            let parsed = self.parse(raw, Target::Field)?;
            if parsed.scope == Scope::Node && parsed.rule == Rule::Required {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// First `validation:Type` override among the rules, if any.
    pub fn type_override(&self, rules: &[String], target: Target) -> Result<Option<TypeOverride>, MarkerError> {
        for raw in rules {
            if let ParsedRule { rule: Rule::Type(t), scope: Scope::Node } = self.parse(raw, target)? {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ARGUMENT GRAMMARS
// ————————————————————————————————————————————————————————————————————————————

impl RuleKind {
    /// `args` is whatever follows the registered name: empty, `=value`, or
    /// `:key=value,...`.
    fn parse_args(self, args: &str) -> Result<Rule, String> {
        use RuleKind as K;
        match self {
            K::Required => flag(args, Rule::Required),
            K::Nullable => flag(args, Rule::Nullable),
            K::PreserveUnknownFields => flag(args, Rule::PreserveUnknownFields),
            K::EmbeddedResource => flag(args, Rule::EmbeddedResource),
            K::IntOrString => flag(args, Rule::IntOrString),
            K::Schemaless => flag(args, Rule::Schemaless),

            K::ExclusiveMaximum => boolean(args).map(Rule::ExclusiveMaximum),
            K::ExclusiveMinimum => boolean(args).map(Rule::ExclusiveMinimum),
            K::UniqueItems => boolean(args).map(Rule::UniqueItems),

            K::Maximum => float(args).map(Rule::Maximum),
            K::Minimum => float(args).map(Rule::Minimum),
            K::MultipleOf => float(args).map(Rule::MultipleOf),

            K::MaxProperties => count(args).map(Rule::MaxProperties),
            K::MinProperties => count(args).map(Rule::MinProperties),
            K::MaxLength => count(args).map(Rule::MaxLength),
            K::MinLength => count(args).map(Rule::MinLength),
            K::MaxItems => count(args).map(Rule::MaxItems),
            K::MinItems => count(args).map(Rule::MinItems),

            K::Pattern => string(args).map(Rule::Pattern),
            K::Format => string(args).map(Rule::Format),
            K::Type => match string(args)?.as_str() {
                "object" => Ok(Rule::Type(TypeOverride::Object)),
                "value" => Ok(Rule::Type(TypeOverride::Value)),
                other => Err(format!("unsupported type `{other}`, expected `object` or `value`")),
            },

            K::Enum => {
                let mut cur = Cursor::new(value_of(args)?);
                let values = cur.list()?;
                end(&mut cur)?;
                Ok(Rule::Enum(values))
            }
            K::Default => any(args).map(Rule::Default),
            K::Example => any(args).map(Rule::Example),
            K::XValidation => x_validation(args).map(Rule::XValidation),
        }
    }
}

fn value_of(args: &str) -> Result<&str, String> {
    args.strip_prefix('=').ok_or_else(|| "expected `=<value>`".to_string())
}

fn end(cur: &mut Cursor<'_>) -> Result<(), String> {
    if cur.at_end() {
        Ok(())
    } else {
        Err("unexpected trailing input".to_string())
    }
}

fn flag(args: &str, rule: Rule) -> Result<Rule, String> {
    if args.is_empty() {
        Ok(rule)
    } else {
        Err(format!("takes no arguments, got `{args}`"))
    }
}

fn boolean(args: &str) -> Result<bool, String> {
    if args.is_empty() {
        return Ok(true);
    }
    match value_of(args)?.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected a boolean, got `{other}`")),
    }
}

fn float(args: &str) -> Result<f64, String> {
    let raw = value_of(args)?.trim();
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| format!("expected a number, got `{raw}`"))
}

fn count(args: &str) -> Result<u64, String> {
    let raw = value_of(args)?.trim();
    raw.parse::<u64>().map_err(|_| format!("expected a non-negative integer, got `{raw}`"))
}

fn string(args: &str) -> Result<String, String> {
    let s = Cursor::new(value_of(args)?).remainder_string()?;
    if s.is_empty() {
        Err("expected a string".to_string())
    } else {
        Ok(s)
    }
}

fn any(args: &str) -> Result<Value, String> {
    let mut cur = Cursor::new(value_of(args)?);
    let v = cur.value(&[])?;
    end(&mut cur)?;
    Ok(v)
}

fn x_validation(args: &str) -> Result<XValidation, String> {
    let body = args.strip_prefix(':').ok_or_else(|| "expected `:rule=...`".to_string())?;
    let mut cur = Cursor::new(body);
    let mut out = XValidation { rule: String::new(), message: String::new(), message_expression: String::new() };
    loop {
        let key = cur.ident()?;
        cur.expect('=')?;
        let value = cur.string(&[','])?;
        match key {
            "rule" => out.rule = value,
            "message" => out.message = value,
            "messageExpression" => out.message_expression = value,
            other => return Err(format!("unknown argument `{other}`")),
        }
        if !cur.eat(',') {
            break;
        }
    }
    end(&mut cur)?;
    if out.rule.is_empty() {
        return Err("missing required argument `rule`".to_string());
    }
    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn names_marker(marker: &str, name: &str) -> bool {
    match marker.strip_prefix(name) {
        Some(rest) => rest.is_empty() || rest.starts_with('=') || rest.starts_with(':'),
        None => false,
    }
}

fn is_validation_marker(name: &str) -> bool {
    name.strip_prefix(VALIDATION)
        .is_some_and(|n| VALIDATION_MARKERS.iter().any(|(m, _)| *m == n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: &str, target: Target) -> Result<ParsedRule, MarkerError> {
        Registry::global().parse(raw, target)
    }

    fn rule(raw: &str) -> Rule {
        parse(raw, Target::Field).unwrap().rule
    }

    #[test]
    fn numeric_and_string_rules() {
        assert_eq!(rule("+kubebuilder:validation:Maximum=10"), Rule::Maximum(10.0));
        assert_eq!(rule("+kubebuilder:validation:Minimum=-2.5"), Rule::Minimum(-2.5));
        assert_eq!(rule("+kubebuilder:validation:MaxLength=64"), Rule::MaxLength(64));
        assert_eq!(rule("+kubebuilder:validation:Pattern=`^[a-z]+$`"), Rule::Pattern("^[a-z]+$".into()));
        assert_eq!(rule("+kubebuilder:validation:Pattern=^v\\d$"), Rule::Pattern("^v\\d$".into()));
        assert_eq!(rule("+kubebuilder:validation:UniqueItems"), Rule::UniqueItems(true));
        assert_eq!(rule("+kubebuilder:validation:ExclusiveMinimum=false"), Rule::ExclusiveMinimum(false));
    }

    #[test]
    fn any_valued_rules() {
        assert_eq!(rule("+kubebuilder:validation:Enum=a;b;c"), Rule::Enum(vec![json!("a"), json!("b"), json!("c")]));
        assert_eq!(rule("+kubebuilder:default=5"), Rule::Default(json!(5)));
        assert_eq!(rule("+kubebuilder:default={policy: \"delete\"}"), Rule::Default(json!({"policy": "delete"})));
        assert_eq!(rule("+kubebuilder:example={1,2}"), Rule::Example(json!([1, 2])));
    }

    #[test]
    fn x_validation_named_args() {
        let r = rule(r#"+kubebuilder:validation:XValidation:rule="self.a > 0",message="a must be positive""#);
        assert_eq!(
            r,
            Rule::XValidation(XValidation {
                rule: "self.a > 0".into(),
                message: "a must be positive".into(),
                message_expression: String::new(),
            })
        );
        assert!(matches!(
            parse("+kubebuilder:validation:XValidation:message=\"x\"", Target::Field),
            Err(MarkerError::Malformed { .. })
        ));
    }

    #[test]
    fn validation_rules_are_registered_for_both_targets() {
        assert!(parse("+kubebuilder:validation:MinItems=1", Target::Type).is_ok());
        assert!(parse("+kubebuilder:validation:MinItems=1", Target::Field).is_ok());
    }

    #[test]
    fn field_only_rules_reject_type_target() {
        let err = parse("+kubebuilder:validation:Required", Target::Type).unwrap_err();
        assert!(matches!(err, MarkerError::NoDefinition { target: Target::Type, .. }));
        assert!(parse("+kubebuilder:pruning:PreserveUnknownFields", Target::Type).is_ok());
    }

    #[test]
    fn unknown_and_malformed() {
        assert!(matches!(parse("+kubebuilder:validation:Bogus=1", Target::Field), Err(MarkerError::NoDefinition { .. })));
        assert!(matches!(parse("+kubebuilder:validation:MaxLength=abc", Target::Field), Err(MarkerError::Malformed { .. })));
        assert!(matches!(parse("+kubebuilder:validation:MaxLength=-1", Target::Field), Err(MarkerError::Malformed { .. })));
        assert!(matches!(parse("+kubebuilder:validation:Required=yes", Target::Field), Err(MarkerError::Malformed { .. })));
        assert!(matches!(parse("+kubebuilder:validation:Type=string", Target::Field), Err(MarkerError::Malformed { .. })));
    }

    #[test]
    fn longest_name_wins() {
        // `MinLength` must not be swallowed by a shorter `Min...` name.
        assert_eq!(rule("+kubebuilder:validation:MinLength=3"), Rule::MinLength(3));
        assert!(parse("+kubebuilder:validation:MaximumX=3", Target::Field).is_err());
    }

    #[test]
    fn item_scoped_variant() {
        let p = parse("+kubebuilder:validation:items:MaxLength=8", Target::Field).unwrap();
        assert_eq!(p, ParsedRule { rule: Rule::MaxLength(8), scope: Scope::Items });
        assert!(parse("+kubebuilder:validation:items:Required", Target::Field).is_err());
    }

    #[test]
    fn required_and_type_scans() {
        let reg = Registry::global();
        let rules = vec!["+kubebuilder:validation:MinLength=1".to_string(), "+kubebuilder:validation:Required".to_string()];
        assert!(reg.is_required(&rules).unwrap());
        assert!(!reg.is_required(&rules[..1]).unwrap());
        assert!(reg.is_required(&["+kubebuilder:nope".to_string()]).is_err());

        let rules = vec!["+kubebuilder:validation:Type=value".to_string()];
        assert_eq!(reg.type_override(&rules, Target::Field).unwrap(), Some(TypeOverride::Value));
    }

    #[test]
    fn global_registry_is_built_once() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
        let n = Registry::global().definitions().len();
        assert_eq!(n, VALIDATION_MARKERS.len() * 2 + FIELD_ONLY_MARKERS.len() + 1);
    }

    #[test]
    fn register_replaces_same_name_and_target() {
        let mut reg = Registry::default();
        reg.register("kubebuilder:custom", Target::Field, RuleKind::Nullable);
        reg.register("kubebuilder:custom", Target::Field, RuleKind::Schemaless);
        assert_eq!(reg.definitions().len(), 1);
        assert_eq!(reg.parse("+kubebuilder:custom", Target::Field).unwrap().rule, Rule::Schemaless);
    }
}
