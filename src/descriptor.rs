//! Linked, read-only declaration model built from a `CodeGeneratorRequest`.
//!
//! Messages and enums live in flat arenas and refer to each other by id, so
//! self-referential graphs need no `Rc` cycles.
pub mod raw;

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
pub use raw::{CodeGeneratorRequest, FieldType, Label};

// FileDescriptorProto / DescriptorProto / EnumDescriptorProto field numbers,
// as they appear in `SourceCodeInfo.Location.path`.
const FILE_PACKAGE: i32 = 2;
const FILE_MESSAGE_TYPE: i32 = 4;
const FILE_ENUM_TYPE: i32 = 5;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;
const MESSAGE_ENUM_TYPE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Message(MessageId),
    Enum(EnumId),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub json_name: String,
    pub kind: FieldType,
    pub repeated: bool,
    pub proto3_optional: bool,
    pub oneof_index: Option<i32>,
    pub type_ref: Option<TypeRef>,
    pub comments: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub dotted_name: String,
    pub package: String,
    pub file: FileId,
    pub parent: Option<MessageId>,
    pub map_entry: bool,
    pub fields: Vec<Field>,
    pub comments: String,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub dotted_name: String,
    pub package: String,
    pub file: FileId,
    pub parent: Option<MessageId>,
    pub values: Vec<EnumValue>,
    pub comments: String,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub package: String,
}

#[derive(Debug, Clone)]
pub struct File {
    pub name: String,
    pub package: String,
    /// Leading comment of the `package` statement.
    pub package_comments: String,
    /// Every message declared in the file, nested ones included.
    pub messages: Vec<MessageId>,
    pub enums: Vec<EnumId>,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub files: Vec<File>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    by_file_name: HashMap<String, FileId>,
}

/// Anything with a package and a dotted name.
pub trait Declaration {
    fn package(&self) -> &str;
    fn dotted_name(&self) -> &str;
    fn comments(&self) -> &str;

    /// `package.Outer.Inner`
    fn absolute_name(&self) -> String {
        qualify(self.package(), self.dotted_name())
    }
}

impl Declaration for Message {
    fn package(&self) -> &str {
        &self.package
    }
    fn dotted_name(&self) -> &str {
        &self.dotted_name
    }
    fn comments(&self) -> &str {
        &self.comments
    }
}

impl Declaration for Enum {
    fn package(&self) -> &str {
        &self.package
    }
    fn dotted_name(&self) -> &str {
        &self.dotted_name
    }
    fn comments(&self) -> &str {
        &self.comments
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LINKING
// ————————————————————————————————————————————————————————————————————————————

struct PendingField {
    message: MessageId,
    index: usize,
    type_name: String,
}

impl Model {
    pub fn from_request(request: &CodeGeneratorRequest) -> Result<Model> {
        let mut model = Model::default();
        let mut by_type_name = HashMap::<String, TypeRef>::new();
        let mut pending = Vec::<PendingField>::new();

        for file in &request.proto_file {
            let file_id = FileId(model.files.len());
            if model.by_file_name.insert(file.name.clone(), file_id).is_some() {
                return Err(Error::Descriptor(format!("duplicate file `{}`", file.name)));
            }
            let comments = file
                .source_code_info
                .as_ref()
                .map(|info| {
                    info.location
                        .iter()
                        .filter_map(|l| Some((l.path.clone(), l.leading_comments.clone()?)))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default();

            let mut linker = Linker {
                model: &mut model,
                file: file_id,
                package: &file.package,
                comments: &comments,
                by_type_name: &mut by_type_name,
                pending: &mut pending,
                messages: Vec::new(),
                enums: Vec::new(),
            };
            for (i, m) in file.message_type.iter().enumerate() {
                linker.message(m, None, "", vec![FILE_MESSAGE_TYPE, i as i32]);
            }
            for (i, e) in file.enum_type.iter().enumerate() {
                linker.enumeration(e, None, "", vec![FILE_ENUM_TYPE, i as i32]);
            }
            let (messages, enums) = (linker.messages, linker.enums);

            let services = file
                .service
                .iter()
                .enumerate()
                .map(|(i, s)| Service {
                    name: s.name.clone(),
                    package: file.package.clone(),
                })
                .collect();

            model.files.push(File {
                name: file.name.clone(),
                package: file.package.clone(),
                package_comments: comment_at(&comments, &[FILE_PACKAGE]),
                messages,
                enums,
                services,
            });
        }

        for p in pending {
            let target = by_type_name.get(p.type_name.trim_start_matches('.')).copied();
            let msg = &mut model.messages[p.message.0];
            let field = &mut msg.fields[p.index];
            match target {
                Some(t) => field.type_ref = Some(t),
                None => {
                    return Err(Error::UnresolvedType {
                        field: format!("{}.{}", qualify(&msg.package, &msg.dotted_name), field.name),
                        type_name: p.type_name,
                    });
                }
            }
        }

        debug!(
            files = model.files.len(),
            messages = model.messages.len(),
            enums = model.enums.len(),
            "linked descriptor model"
        );
        Ok(model)
    }

    pub fn file_by_name(&self, name: &str) -> Option<FileId> {
        self.by_file_name.get(name).copied()
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0]
    }
    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }
    pub fn enumeration(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }
}

struct Linker<'a> {
    model: &'a mut Model,
    file: FileId,
    package: &'a str,
    comments: &'a HashMap<Vec<i32>, String>,
    by_type_name: &'a mut HashMap<String, TypeRef>,
    pending: &'a mut Vec<PendingField>,
    messages: Vec<MessageId>,
    enums: Vec<EnumId>,
}

impl Linker<'_> {
    fn message(&mut self, m: &raw::DescriptorProto, parent: Option<MessageId>, scope: &str, path: Vec<i32>) {
        let id = MessageId(self.model.messages.len());
        let dotted_name = join_name(scope, &m.name);
        self.by_type_name.insert(qualify(self.package, &dotted_name), TypeRef::Message(id));
        self.messages.push(id);

        let mut fields = Vec::with_capacity(m.field.len());
        for (i, f) in m.field.iter().enumerate() {
            let mut field_path = path.clone();
            field_path.extend([MESSAGE_FIELD, i as i32]);
            if let Some(type_name) = f.type_name.as_ref().filter(|_| needs_type(f.type_)) {
                self.pending.push(PendingField { message: id, index: i, type_name: type_name.clone() });
            }
            fields.push(Field {
                name: f.name.clone(),
                json_name: f.json_name.clone().unwrap_or_else(|| to_json_name(&f.name)),
                kind: f.type_,
                repeated: f.label == Label::Repeated,
                proto3_optional: f.proto3_optional,
                oneof_index: f.oneof_index,
                type_ref: None,
                comments: comment_at(self.comments, &field_path),
            });
        }

        self.model.messages.push(Message {
            name: m.name.clone(),
            dotted_name: dotted_name.clone(),
            package: self.package.to_string(),
            file: self.file,
            parent,
            map_entry: m.options.as_ref().is_some_and(|o| o.map_entry),
            fields,
            comments: comment_at(self.comments, &path),
        });

        for (i, nested) in m.nested_type.iter().enumerate() {
            let mut p = path.clone();
            p.extend([MESSAGE_NESTED_TYPE, i as i32]);
            self.message(nested, Some(id), &dotted_name, p);
        }
        for (i, e) in m.enum_type.iter().enumerate() {
            let mut p = path.clone();
            p.extend([MESSAGE_ENUM_TYPE, i as i32]);
            self.enumeration(e, Some(id), &dotted_name, p);
        }
    }

    fn enumeration(&mut self, e: &raw::EnumDescriptorProto, parent: Option<MessageId>, scope: &str, path: Vec<i32>) {
        let id = EnumId(self.model.enums.len());
        let dotted_name = join_name(scope, &e.name);
        self.by_type_name.insert(qualify(self.package, &dotted_name), TypeRef::Enum(id));
        self.enums.push(id);

        let values = e.value.iter().map(|v| EnumValue { name: v.name.clone() }).collect();

        self.model.enums.push(Enum {
            name: e.name.clone(),
            dotted_name,
            package: self.package.to_string(),
            file: self.file,
            parent,
            values,
            comments: comment_at(self.comments, &path),
        });
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn needs_type(t: FieldType) -> bool {
    matches!(t, FieldType::TypeMessage | FieldType::TypeGroup | FieldType::TypeEnum)
}

fn comment_at(comments: &HashMap<Vec<i32>, String>, path: &[i32]) -> String {
    comments.get(path).cloned().unwrap_or_default()
}

fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

pub fn qualify(package: &str, dotted_name: &str) -> String {
    join_name(package, dotted_name)
}

/// protoc's default `json_name`: drop underscores, upper-case the next letter.
pub fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
