//! Protobuf `oneof` emulation.
//!
//! For fields `x` and `y` in one group the emitted `oneOf` arms are
//!
//! ```text
//! { "not": { "anyOf": [ { "required": ["x"] }, { "required": ["y"] } ] } }
//! { "required": ["x"] }
//! { "required": ["y"] }
//! ```
//!
//! Exactly one arm holds when none or one field is set; two set fields
//! satisfy two arms and fail `oneOf`.
use crate::schema::{Schema, SchemaRef};

pub fn proto_oneof_arms<S: AsRef<str>>(fields: &[S]) -> Vec<SchemaRef> {
    let each: Vec<SchemaRef> = fields.iter().map(|f| Schema::requiring(f.as_ref()).into()).collect();
    let none = Schema {
        not: Some(Box::new(Schema { any_of: each.clone(), ..Schema::default() }.into())),
        ..Schema::default()
    };
    let mut arms = Vec::with_capacity(each.len() + 1);
    arms.push(none.into());
    arms.extend(each);
    arms
}

/// Attach one group directly as `oneOf`, several groups as `allOf` of `oneOf`s
/// (a schema has room for a single `oneOf`).
pub fn attach_groups(o: &mut Schema, groups: Vec<Vec<String>>) {
    match groups.len() {
        0 => {}
        1 => {
            o.one_of = groups.into_iter().flat_map(|g| proto_oneof_arms(&g)).collect();
        }
        _ => {
            for g in groups {
                o.all_of.push(Schema { one_of: proto_oneof_arms(&g), ..Schema::default() }.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    // Minimal evaluator for the keywords the emulation uses.
    fn holds(schema: &Value, doc: &Value) -> bool {
        let obj = doc.as_object().unwrap();
        if let Some(req) = schema.get("required").and_then(Value::as_array) {
            if !req.iter().all(|k| obj.contains_key(k.as_str().unwrap())) {
                return false;
            }
        }
        if let Some(not) = schema.get("not") {
            if holds(not, doc) {
                return false;
            }
        }
        if let Some(any) = schema.get("anyOf").and_then(Value::as_array) {
            if !any.iter().any(|s| holds(s, doc)) {
                return false;
            }
        }
        if let Some(one) = schema.get("oneOf").and_then(Value::as_array) {
            if one.iter().filter(|s| holds(s, doc)).count() != 1 {
                return false;
            }
        }
        if let Some(all) = schema.get("allOf").and_then(Value::as_array) {
            if !all.iter().all(|s| holds(s, doc)) {
                return false;
            }
        }
        true
    }

    fn group_schema(groups: Vec<Vec<&str>>) -> Value {
        let mut o = Schema::object();
        attach_groups(&mut o, groups.into_iter().map(|g| g.into_iter().map(String::from).collect()).collect());
        o.to_value()
    }

    #[test]
    fn arms_shape() {
        let arms = proto_oneof_arms(&["x", "y"]);
        let v = serde_json::to_value(&arms).unwrap();
        assert_eq!(
            v,
            json!([
                { "not": { "anyOf": [{ "required": ["x"] }, { "required": ["y"] }] } },
                { "required": ["x"] },
                { "required": ["y"] }
            ])
        );
    }

    #[test]
    fn at_most_one_field() {
        let s = group_schema(vec![vec!["x", "y"]]);
        assert!(holds(&s, &json!({})));
        assert!(holds(&s, &json!({ "x": 1 })));
        assert!(holds(&s, &json!({ "y": 1, "other": true })));
        assert!(!holds(&s, &json!({ "x": 1, "y": 2 })));
    }

    #[test]
    fn several_groups_go_through_all_of() {
        let s = group_schema(vec![vec!["a", "b"], vec!["c", "d"]]);
        assert!(s.get("oneOf").is_none());
        assert_eq!(s["allOf"].as_array().unwrap().len(), 2);
        assert!(holds(&s, &json!({ "a": 1, "c": 1 })));
        assert!(!holds(&s, &json!({ "a": 1, "b": 1, "c": 1 })));
        assert!(!holds(&s, &json!({ "c": 1, "d": 1 })));
    }

    #[test]
    fn no_groups_leave_schema_alone() {
        assert_eq!(group_schema(vec![]), json!({ "type": "object" }));
    }
}
