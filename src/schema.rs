//! OpenAPI v3 schema object model.
//!
//! Nodes are plain owned values, mutated in place while a message is being
//! synthesized and then handed to the packaging stage for serialization.
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

pub const PRESERVE_UNKNOWN_FIELDS: &str = "x-kubernetes-preserve-unknown-fields";
pub const EMBEDDED_RESOURCE: &str = "x-kubernetes-embedded-resource";
pub const INT_OR_STRING: &str = "x-kubernetes-int-or-string";
pub const VALIDATIONS: &str = "x-kubernetes-validations";

/// Path prefix of every `$ref` this generator emits.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Integer => "integer",
            Kind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "is_false")]
    pub nullable: bool,

    // ---- numbers ----
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "number_pref_i64")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "number_pref_i64")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "is_false")]
    pub exclusive_minimum: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub exclusive_maximum: bool,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "number_pref_i64")]
    pub multiple_of: Option<f64>,

    // ---- strings ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // ---- arrays ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    pub unique_items: bool,

    // ---- objects ----
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    // ---- combinators ----
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SchemaRef>>,

    /// Vendor `x-` keys, emitted inline next to the standard keywords.
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// A schema position that holds either a body or a pointer to one.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    Ref(String),
    Inline(Schema),
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn of_kind(kind: Kind) -> Self {
        Schema { kind: Some(kind), ..Schema::default() }
    }
    pub fn object() -> Self {
        Self::of_kind(Kind::Object)
    }
    pub fn string() -> Self {
        Self::of_kind(Kind::String)
    }
    pub fn boolean() -> Self {
        Self::of_kind(Kind::Boolean)
    }
    pub fn integer() -> Self {
        Self::of_kind(Kind::Integer)
    }

    pub fn float64() -> Self {
        Self::of_kind(Kind::Number).with_format("double")
    }
    pub fn int32() -> Self {
        Self::integer().with_format("int32")
    }
    pub fn int64() -> Self {
        Self::integer().with_format("int64")
    }
    pub fn bytes() -> Self {
        Self::string().with_format("byte")
    }

    pub fn array_of(items: impl Into<SchemaRef>) -> Self {
        Schema {
            kind: Some(Kind::Array),
            items: Some(Box::new(items.into())),
            ..Schema::default()
        }
    }

    pub fn map_of(values: impl Into<SchemaRef>) -> Self {
        Schema {
            kind: Some(Kind::Object),
            additional_properties: Some(Box::new(values.into())),
            ..Schema::default()
        }
    }

    /// Object that accepts and keeps any field.
    pub fn open_object() -> Self {
        Self::object().with_extension(PRESERVE_UNKNOWN_FIELDS, true)
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }
    pub fn with_min(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }
    pub fn with_max(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }
    pub fn with_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.to_string(), value.into());
        self
    }

    /// Schema that only demands `field` be present.
    pub fn requiring(field: &str) -> Self {
        Schema { required: vec![field.to_string()], ..Schema::default() }
    }

    pub fn kind_name(&self) -> String {
        self.kind.map(|k| k.as_str().to_string()).unwrap_or_else(|| "untyped".to_string())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, Some(Kind::Integer | Kind::Number))
    }

    pub fn to_value(&self) -> Value {
        // Serializing an in-memory tree with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl SchemaRef {
    pub fn component(absolute_name: &str) -> Self {
        SchemaRef::Ref(format!("{COMPONENTS_PREFIX}{absolute_name}"))
    }
    pub fn as_inline(&self) -> Option<&Schema> {
        match self {
            SchemaRef::Inline(s) => Some(s),
            SchemaRef::Ref(_) => None,
        }
    }
    pub fn as_inline_mut(&mut self) -> Option<&mut Schema> {
        match self {
            SchemaRef::Inline(s) => Some(s),
            SchemaRef::Ref(_) => None,
        }
    }
    pub fn reference(&self) -> Option<&str> {
        match self {
            SchemaRef::Ref(r) => Some(r),
            SchemaRef::Inline(_) => None,
        }
    }
}

impl From<Schema> for SchemaRef {
    fn from(s: Schema) -> Self {
        SchemaRef::Inline(s)
    }
}

impl Serialize for SchemaRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            SchemaRef::Inline(schema) => schema.serialize(serializer),
            SchemaRef::Ref(path) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", path)?;
                map.end()
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn is_false(b: &bool) -> bool {
    !*b
}

// prefer emitting integers when exact
fn number_pref_i64<S: Serializer>(n: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match *n {
        // `i64::MAX as f64` rounds up to 2^63
        Some(n) if n == i64::MAX as f64 => serializer.serialize_i64(i64::MAX),
        Some(n) if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 => {
            serializer.serialize_i64(n as i64)
        }
        Some(n) if n.is_finite() && n.fract() == 0.0 && n >= 0.0 && n <= u64::MAX as f64 => {
            serializer.serialize_u64(n as u64)
        }
        Some(n) => serializer.serialize_f64(n),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_fields_are_omitted() {
        let v = Schema::object().to_value();
        assert_eq!(v, json!({ "type": "object" }));
    }

    #[test]
    fn integral_bounds_print_as_integers() {
        let s = Schema::integer().with_min(0.0).with_max(4294967295.0);
        assert_eq!(s.to_value(), json!({ "type": "integer", "minimum": 0, "maximum": 4294967295u64 }));
        let s = Schema::float64().with_min(0.5);
        assert_eq!(s.to_value()["minimum"], json!(0.5));
    }

    #[test]
    fn extensions_flatten_and_refs_serialize_as_pointer() {
        let mut s = Schema::open_object();
        s.properties.insert("child".into(), SchemaRef::component("pkg.Child"));
        assert_eq!(
            s.to_value(),
            json!({
                "type": "object",
                "properties": { "child": { "$ref": "#/components/schemas/pkg.Child" } },
                "x-kubernetes-preserve-unknown-fields": true
            })
        );
    }

    #[test]
    fn property_order_is_insertion_order() {
        let mut s = Schema::object();
        s.properties.insert("zeta".into(), Schema::string().into());
        s.properties.insert("alpha".into(), Schema::string().into());
        let text = serde_json::to_string(&s).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }
}
