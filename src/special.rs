//! Hand-written schemas for well-known types.
//!
//! Used in place of synthesis for types that are recursive (`Struct`,
//! `Value`, `ListValue`) or whose JSON mapping differs from their message
//! shape (wrappers, `Duration`, `Timestamp`).
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::schema::{INT_OR_STRING, PRESERVE_UNKNOWN_FIELDS, Schema};

static WELL_KNOWN: Lazy<IndexMap<&'static str, Schema>> = Lazy::new(|| {
    let mut m = IndexMap::new();
    m.insert("google.protobuf.ListValue", Schema::array_of(Schema::object()));
    m.insert("google.protobuf.Struct", Schema::open_object());
    m.insert("google.protobuf.Any", Schema::open_object());
    m.insert("google.protobuf.Value", opaque_value());
    m.insert("google.protobuf.BoolValue", Schema::boolean().with_nullable());
    m.insert("google.protobuf.StringValue", Schema::string().with_nullable());
    m.insert("google.protobuf.DoubleValue", Schema::float64().with_nullable());
    m.insert("google.protobuf.FloatValue", Schema::float64().with_nullable());
    m.insert(
        "google.protobuf.Int32Value",
        Schema::integer().with_nullable().with_min(i32::MIN as f64).with_max(i32::MAX as f64),
    );
    m.insert(
        "google.protobuf.Int64Value",
        Schema::integer().with_nullable().with_min(i64::MIN as f64).with_max(i64::MAX as f64),
    );
    m.insert(
        "google.protobuf.UInt32Value",
        Schema::integer().with_nullable().with_min(0.0).with_max(u32::MAX as f64),
    );
    m.insert(
        "google.protobuf.UInt64Value",
        Schema::integer().with_nullable().with_min(0.0).with_max(u64::MAX as f64),
    );
    m.insert("google.protobuf.Duration", Schema::string());
    m.insert("google.protobuf.Empty", Schema { max_properties: Some(0), ..Schema::object() });
    m.insert("google.protobuf.Timestamp", Schema::string().with_format("date-time"));
    m
});

/// Value of any JSON shape; unknown fields kept.
pub fn opaque_value() -> Schema {
    Schema::default().with_extension(PRESERVE_UNKNOWN_FIELDS, true)
}

/// Object of any shape; unknown fields kept.
pub fn opaque_object() -> Schema {
    Schema::open_object()
}

/// 64-bit integer that consumers may also write as a string.
pub fn int_or_string_int64() -> Schema {
    Schema::int64().with_extension(INT_OR_STRING, true)
}

/// Per-pass lookup: well-known types plus the configured empty-schema names.
#[derive(Debug, Clone)]
pub struct Catalog {
    schemas: IndexMap<String, Schema>,
}

impl Catalog {
    pub fn new<I, S>(messages_with_empty_schema: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schemas: IndexMap<String, Schema> =
            WELL_KNOWN.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        for name in messages_with_empty_schema {
            schemas.insert(name.into(), Schema::open_object());
        }
        Self { schemas }
    }

    pub fn get(&self, absolute_name: &str) -> Option<&Schema> {
        self.schemas.get(absolute_name)
    }

    pub fn contains(&self, absolute_name: &str) -> bool {
        self.schemas.contains_key(absolute_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_known_shapes() {
        let c = Catalog::new(Vec::<String>::new());
        assert_eq!(
            c.get("google.protobuf.Timestamp").unwrap().to_value(),
            json!({ "type": "string", "format": "date-time" })
        );
        assert_eq!(
            c.get("google.protobuf.Value").unwrap().to_value(),
            json!({ "x-kubernetes-preserve-unknown-fields": true })
        );
        assert_eq!(
            c.get("google.protobuf.UInt32Value").unwrap().to_value(),
            json!({ "type": "integer", "nullable": true, "minimum": 0, "maximum": 4294967295u64 })
        );
        assert!(!c.contains("google.protobuf.FieldMask"));
    }

    #[test]
    fn int64_wrapper_bounds_stay_in_range() {
        let v = Catalog::new(Vec::<String>::new()).get("google.protobuf.Int64Value").unwrap().to_value();
        assert_eq!(v["maximum"], json!(i64::MAX));
        assert_eq!(v["minimum"], json!(i64::MIN));
    }

    #[test]
    fn configured_names_get_open_objects() {
        let c = Catalog::new(["acme.v1.Blob"]);
        assert_eq!(
            c.get("acme.v1.Blob").unwrap().to_value(),
            json!({ "type": "object", "x-kubernetes-preserve-unknown-fields": true })
        );
    }
}
