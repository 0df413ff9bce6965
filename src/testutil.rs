//! Builders for descriptor requests in unit tests.
//!
//! Declarations are plain protojson values. A `_comment` key on a message,
//! field or enum becomes its leading comment in `sourceCodeInfo`.
use serde_json::{Value, json};

use crate::descriptor::{CodeGeneratorRequest, Model};

const COMMENT: &str = "_comment";

pub fn request(v: Value) -> CodeGeneratorRequest {
    serde_json::from_value(v).expect("test request must decode")
}

pub fn field(name: &str, ty: &str) -> Value {
    if ty.starts_with("TYPE_") {
        json!({ "name": name, "type": ty, "label": "LABEL_OPTIONAL" })
    } else {
        json!({ "name": name, "type": "TYPE_MESSAGE", "typeName": ty, "label": "LABEL_OPTIONAL" })
    }
}

pub fn enum_field(name: &str, type_name: &str) -> Value {
    json!({ "name": name, "type": "TYPE_ENUM", "typeName": type_name, "label": "LABEL_OPTIONAL" })
}

pub fn msg(name: &str, fields: Vec<Value>) -> Value {
    json!({ "name": name, "field": fields })
}

pub trait ProtoJson {
    fn comment(self, text: &str) -> Value;
    fn repeated(self) -> Value;
    fn oneof(self, index: i32) -> Value;
    fn proto3_optional(self, index: i32) -> Value;
}

impl ProtoJson for Value {
    fn comment(mut self, text: &str) -> Value {
        self[COMMENT] = Value::from(text);
        self
    }
    fn repeated(mut self) -> Value {
        self["label"] = json!("LABEL_REPEATED");
        self
    }
    fn oneof(mut self, index: i32) -> Value {
        self["oneofIndex"] = json!(index);
        self
    }
    fn proto3_optional(mut self, index: i32) -> Value {
        self["oneofIndex"] = json!(index);
        self["proto3Optional"] = json!(true);
        self
    }
}

/// A `FileDescriptorProto` with field numbers filled in and `_comment`
/// keys moved into `sourceCodeInfo`.
pub fn proto_file(name: &str, package: &str, mut messages: Vec<Value>, mut enums: Vec<Value>) -> Value {
    let mut locations = Vec::new();
    for (i, m) in messages.iter_mut().enumerate() {
        prepare_message(m, vec![4, i as i32], &mut locations);
    }
    for (i, e) in enums.iter_mut().enumerate() {
        take_comment(e, vec![5, i as i32], &mut locations);
    }
    json!({
        "name": name,
        "package": package,
        "messageType": messages,
        "enumType": enums,
        "sourceCodeInfo": { "location": locations }
    })
}

pub fn model_of(files: Vec<Value>) -> Model {
    let names: Vec<Value> = files.iter().map(|f| f["name"].clone()).collect();
    let req = request(json!({ "fileToGenerate": names, "protoFile": files }));
    Model::from_request(&req).expect("test model must link")
}

pub fn model(messages: Vec<Value>) -> Model {
    model_with_enums(messages, Vec::new())
}

pub fn model_with_enums(messages: Vec<Value>, enums: Vec<Value>) -> Model {
    model_of(vec![proto_file("test.proto", "pkg", messages, enums)])
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn prepare_message(m: &mut Value, path: Vec<i32>, locations: &mut Vec<Value>) {
    take_comment(m, path.clone(), locations);
    if let Some(fields) = m.get_mut("field").and_then(Value::as_array_mut) {
        for (j, f) in fields.iter_mut().enumerate() {
            if f.get("number").is_none() {
                f["number"] = json!(j + 1);
            }
            let mut p = path.clone();
            p.extend([2, j as i32]);
            take_comment(f, p, locations);
        }
    }
    if let Some(nested) = m.get_mut("nestedType").and_then(Value::as_array_mut) {
        for (k, n) in nested.iter_mut().enumerate() {
            let mut p = path.clone();
            p.extend([3, k as i32]);
            prepare_message(n, p, locations);
        }
    }
    if let Some(enums) = m.get_mut("enumType").and_then(Value::as_array_mut) {
        for (k, e) in enums.iter_mut().enumerate() {
            let mut p = path.clone();
            p.extend([4, k as i32]);
            take_comment(e, p, locations);
        }
    }
}

fn take_comment(decl: &mut Value, path: Vec<i32>, locations: &mut Vec<Value>) {
    if let Some(text) = decl.as_object_mut().and_then(|o| o.remove(COMMENT)) {
        locations.push(json!({ "path": path, "leadingComments": text }));
    }
}
