//! Rule application: mutate one schema node, rejecting kind mismatches.
use serde_json::Value;

use super::{ParsedRule, Rule, Scope};
use crate::error::MarkerError;
use crate::schema::{self, Kind, Schema};

pub fn apply(parsed: &ParsedRule, schema: &mut Schema) -> Result<(), MarkerError> {
    match parsed.scope {
        Scope::Node => parsed.rule.apply_to_schema(schema),
        Scope::Items => {
            let found = schema.kind_name();
            let items = match (schema.kind, schema.items.as_deref_mut()) {
                (Some(Kind::Array), Some(items)) => items.as_inline_mut(),
                _ => None,
            };
            match items {
                Some(items) => parsed.rule.apply_to_schema(items),
                None => Err(MarkerError::KindMismatch {
                    marker: "items rule",
                    expected: "an array with an inline item schema",
                    found,
                }),
            }
        }
    }
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Maximum(_) => "Maximum",
            Rule::Minimum(_) => "Minimum",
            Rule::ExclusiveMaximum(_) => "ExclusiveMaximum",
            Rule::ExclusiveMinimum(_) => "ExclusiveMinimum",
            Rule::MultipleOf(_) => "MultipleOf",
            Rule::MaxProperties(_) => "MaxProperties",
            Rule::MinProperties(_) => "MinProperties",
            Rule::MaxLength(_) => "MaxLength",
            Rule::MinLength(_) => "MinLength",
            Rule::Pattern(_) => "Pattern",
            Rule::MaxItems(_) => "MaxItems",
            Rule::MinItems(_) => "MinItems",
            Rule::UniqueItems(_) => "UniqueItems",
            Rule::Enum(_) => "Enum",
            Rule::Format(_) => "Format",
            Rule::Type(_) => "Type",
            Rule::PreserveUnknownFields => "PreserveUnknownFields",
            Rule::EmbeddedResource => "EmbeddedResource",
            Rule::IntOrString => "IntOrString",
            Rule::XValidation(_) => "XValidation",
            Rule::Required => "Required",
            Rule::Nullable => "Nullable",
            Rule::Default(_) => "Default",
            Rule::Example(_) => "Example",
            Rule::Schemaless => "Schemaless",
        }
    }

    pub fn apply_to_schema(&self, o: &mut Schema) -> Result<(), MarkerError> {
        match self {
            Rule::Maximum(v) => {
                self.require_numeric(o)?;
                o.maximum = Some(*v);
            }
            Rule::Minimum(v) => {
                self.require_numeric(o)?;
                o.minimum = Some(*v);
            }
            Rule::ExclusiveMaximum(b) => {
                self.require_numeric(o)?;
                o.exclusive_maximum = *b;
            }
            Rule::ExclusiveMinimum(b) => {
                self.require_numeric(o)?;
                o.exclusive_minimum = *b;
            }
            Rule::MultipleOf(v) => {
                self.require_numeric(o)?;
                if o.kind == Some(Kind::Integer) && v.fract() != 0.0 {
                    return Err(MarkerError::NonIntegralMultipleOf(*v));
                }
                o.multiple_of = Some(*v);
            }

            Rule::MaxProperties(n) => {
                self.require(o, Kind::Object)?;
                o.max_properties = Some(*n);
            }
            Rule::MinProperties(n) => {
                self.require(o, Kind::Object)?;
                o.min_properties = Some(*n);
            }

            Rule::MaxLength(n) => {
                self.require(o, Kind::String)?;
                o.max_length = Some(*n);
            }
            Rule::MinLength(n) => {
                self.require(o, Kind::String)?;
                o.min_length = Some(*n);
            }
            Rule::Pattern(p) => {
                self.require(o, Kind::String)?;
                o.pattern = Some(p.clone());
            }

            Rule::MaxItems(n) => {
                self.require(o, Kind::Array)?;
                o.max_items = Some(*n);
            }
            Rule::MinItems(n) => {
                self.require(o, Kind::Array)?;
                o.min_items = Some(*n);
            }
            Rule::UniqueItems(b) => {
                self.require(o, Kind::Array)?;
                o.unique_items = *b;
            }

            Rule::Enum(values) => o.enum_values = values.clone(),
            Rule::Format(f) => o.format = Some(f.clone()),
            // opaque overrides are resolved by the synthesizer before this runs
            Rule::Type(_) => {}
            Rule::PreserveUnknownFields => {
                o.extensions.insert(schema::PRESERVE_UNKNOWN_FIELDS.to_string(), Value::Bool(true));
            }
            Rule::EmbeddedResource => {
                o.extensions.insert(schema::EMBEDDED_RESOURCE.to_string(), Value::Bool(true));
            }
            Rule::IntOrString => {
                o.extensions.insert(schema::INT_OR_STRING.to_string(), Value::Bool(true));
            }
            Rule::XValidation(x) => {
                let entry = serde_json::to_value(x).unwrap_or(Value::Null);
                match o.extensions.entry(schema::VALIDATIONS.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
                    Value::Array(list) => list.push(entry),
                    other => *other = Value::Array(vec![entry]),
                }
            }
            // lifted to the parent's `required` list
            Rule::Required => {}
            Rule::Nullable => o.nullable = true,
            Rule::Default(v) => o.default = Some(v.clone()),
            Rule::Example(v) => o.example = Some(v.clone()),
            Rule::Schemaless => {
                let description = std::mem::take(&mut o.description);
                *o = Schema { description, ..Schema::default() };
            }
        }
        Ok(())
    }

    fn require(&self, o: &Schema, kind: Kind) -> Result<(), MarkerError> {
        if o.kind == Some(kind) {
            return Ok(());
        }
        Err(MarkerError::KindMismatch {
            marker: self.name(),
            expected: match kind {
                Kind::Object => "an object",
                Kind::Array => "an array",
                Kind::String => "a string",
                Kind::Number | Kind::Integer => "a numeric type",
                Kind::Boolean => "a boolean",
            },
            found: o.kind_name(),
        })
    }

    fn require_numeric(&self, o: &Schema) -> Result<(), MarkerError> {
        if o.is_numeric() {
            return Ok(());
        }
        Err(MarkerError::KindMismatch {
            marker: self.name(),
            expected: "a numeric type",
            found: o.kind_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{Registry, Target, XValidation};
    use serde_json::json;

    fn node(rule: Rule) -> ParsedRule {
        ParsedRule { rule, scope: Scope::Node }
    }

    #[test]
    fn string_rule_on_integer_is_rejected() {
        let mut s = Schema::int32();
        let err = apply(&node(Rule::MaxLength(3)), &mut s).unwrap_err();
        assert_eq!(
            err,
            MarkerError::KindMismatch { marker: "MaxLength", expected: "a string", found: "integer".into() }
        );
    }

    #[test]
    fn numeric_rule_on_string_is_rejected() {
        let mut s = Schema::string();
        assert!(matches!(apply(&node(Rule::Minimum(1.0)), &mut s), Err(MarkerError::KindMismatch { .. })));
    }

    #[test]
    fn object_rule_on_array_is_rejected() {
        let mut s = Schema::array_of(Schema::string());
        assert!(apply(&node(Rule::MaxProperties(1)), &mut s).is_err());
    }

    #[test]
    fn multiple_of_must_be_integral_on_integers() {
        let mut s = Schema::int64();
        assert_eq!(apply(&node(Rule::MultipleOf(0.5)), &mut s), Err(MarkerError::NonIntegralMultipleOf(0.5)));
        apply(&node(Rule::MultipleOf(2.0)), &mut s).unwrap();
        assert_eq!(s.multiple_of, Some(2.0));

        let mut f = Schema::float64();
        apply(&node(Rule::MultipleOf(0.5)), &mut f).unwrap();
    }

    #[test]
    fn validations_accumulate() {
        let mut s = Schema::object();
        for rule in ["self.a > 0", "self.b > 0"] {
            let x = XValidation { rule: rule.into(), message: String::new(), message_expression: String::new() };
            apply(&node(Rule::XValidation(x)), &mut s).unwrap();
        }
        assert_eq!(
            s.to_value(),
            json!({
                "type": "object",
                "x-kubernetes-validations": [{ "rule": "self.a > 0" }, { "rule": "self.b > 0" }]
            })
        );
    }

    #[test]
    fn schemaless_keeps_only_description() {
        let mut s = Schema::object().with_extension(schema::INT_OR_STRING, true);
        s.description = "opaque blob".into();
        s.required.push("x".into());
        apply(&node(Rule::Schemaless), &mut s).unwrap();
        assert_eq!(s.to_value(), json!({ "description": "opaque blob" }));
    }

    #[test]
    fn items_scope_targets_array_element() {
        let reg = Registry::global();
        let mut s = Schema::array_of(Schema::string());
        let rules = vec![
            "+kubebuilder:validation:MinItems=1".to_string(),
            "+kubebuilder:validation:items:MaxLength=5".to_string(),
        ];
        reg.apply_rules(&rules, &mut s, Target::Field).unwrap();
        assert_eq!(s.to_value(), json!({ "type": "array", "items": { "type": "string", "maxLength": 5 }, "minItems": 1 }));

        let mut scalar = Schema::string();
        assert!(reg.apply_rules(&rules[1..], &mut scalar, Target::Field).is_err());
    }

    #[test]
    fn untyped_value_schema_accepts_general_rules() {
        let mut s = Schema::default();
        for rule in [Rule::Nullable, Rule::Default(json!({"a": 1})), Rule::Format("date-time".into())] {
            apply(&node(rule), &mut s).unwrap();
        }
        assert!(s.nullable);
        assert!(apply(&node(Rule::MinLength(1)), &mut s).is_err());
    }
}
