//! Recursive schema synthesis for one output unit.
//!
//! One [`Synthesizer`] lives for exactly one pass. Every message body is
//! built at most once; later uses clone the finished body, point at it with
//! `$ref`, or, when reached again while still under construction, get a
//! reference or an open object so self-referential graphs terminate.
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::annotation::{Annotation, AnnotationParser};
use crate::descriptor::{Declaration, EnumId, Field, FieldType, Message, MessageId, Model, TypeRef};
use crate::error::{Error, Result};
use crate::markers::{Registry, Target, TypeOverride};
use crate::oneof;
use crate::options::GenerationOptions;
use crate::schema::{INT_OR_STRING, Schema, SchemaRef};
use crate::special::{self, Catalog};

pub struct Synthesizer<'a> {
    model: &'a Model,
    options: &'a GenerationOptions,
    annotations: AnnotationParser,
    registry: &'static Registry,
    catalog: Catalog,
    /// Top-level messages emitted in this unit; the only valid `$ref` targets.
    referable: HashSet<MessageId>,
    built: HashMap<MessageId, Schema>,
    in_progress: HashSet<MessageId>,
}

impl<'a> Synthesizer<'a> {
    pub fn new<I>(model: &'a Model, options: &'a GenerationOptions, unit_messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = MessageId>,
    {
        let annotations = AnnotationParser::new(
            options.include_description,
            options.multiline_description,
            &options.ignored_kube_markers,
        )?;
        let referable = unit_messages
            .into_iter()
            .filter(|id| model.message(*id).parent.is_none())
            .collect();
        Ok(Self {
            model,
            options,
            annotations,
            registry: Registry::global(),
            catalog: Catalog::new(options.messages_with_empty_schema.iter().cloned()),
            referable,
            built: HashMap::new(),
            in_progress: HashSet::new(),
        })
    }

    /// Object schema for a message; `None` for map entries, which are
    /// rendered at the owning field.
    pub fn message_schema(&mut self, id: MessageId) -> Result<Option<Schema>> {
        let model = self.model;
        let msg = model.message(id);
        if msg.map_entry {
            return Ok(None);
        }
        if let Some(done) = self.built.get(&id) {
            return Ok(Some(done.clone()));
        }

        let name = msg.absolute_name();
        let annotation = self.annotations.parse(msg.comments());
        let mut o = Schema::object();
        o.description = annotation.description;
        self.registry
            .apply_rules(self.rules(&annotation.directives), &mut o, Target::Type)
            .map_err(Error::marker(name.as_str()))?;

        self.in_progress.insert(id);
        let fields = self.message_fields(msg, &name, &mut o);
        self.in_progress.remove(&id);
        fields?;

        debug!(message = %name, properties = o.properties.len(), "synthesized message");
        self.built.insert(id, o.clone());
        Ok(Some(o))
    }

    pub fn enum_schema(&self, id: EnumId) -> Schema {
        let e = self.model.enumeration(id);
        let mut o = Schema::string();
        o.description = self.annotations.parse(e.comments()).description;

        if self.options.enum_as_int_or_string {
            o.extensions.insert(INT_OR_STRING.to_string(), Value::Bool(true));
            return o;
        }
        o.enum_values = e.values.iter().map(|v| Value::from(v.name.as_str())).collect();
        o
    }

    fn message_fields(&mut self, msg: &Message, name: &str, o: &mut Schema) -> Result<()> {
        let mut groups = BTreeMap::<i32, Vec<String>>::new();

        for field in &msg.fields {
            let decl = format!("{name}.{}", field.name);
            let wire_name = field.json_name.clone();
            let annotation = self.annotations.parse(&field.comments);
            let rules = self.rules(&annotation.directives);

            // proto3 `optional` lives in a synthetic oneof of its own
            if let Some(idx) = field.oneof_index.filter(|_| !field.proto3_optional) {
                groups.entry(idx).or_default().push(wire_name.clone());
            }

            // an explicit directive wins over proto3 `optional`
            if self.registry.is_required(rules).map_err(Error::marker(decl.as_str()))? {
                o.required.push(wire_name.clone());
            }

            let overridden = self
                .registry
                .type_override(rules, Target::Field)
                .map_err(Error::marker(decl.as_str()))?;

            let mut schema = match overridden {
                Some(t) => {
                    let base = match t {
                        TypeOverride::Object => special::opaque_object(),
                        TypeOverride::Value => special::opaque_value(),
                    };
                    let mut s = if field.repeated { Schema::array_of(base) } else { base };
                    s.description = annotation.description.clone();
                    SchemaRef::Inline(s)
                }
                None => self.field_schema(field, &decl, &annotation, rules.is_empty())?,
            };

            if let Some(s) = schema.as_inline_mut() {
                self.registry
                    .apply_rules(rules, s, Target::Field)
                    .map_err(Error::marker(decl.as_str()))?;
            }
            o.properties.insert(wire_name, schema);
        }

        if self.options.proto_oneof {
            oneof::attach_groups(o, groups.into_values().collect());
        }
        Ok(())
    }

    /// Schema for a field's declared type, wrapped in an array when repeated.
    /// A bare `$ref` is only produced when `allow_ref` is set.
    fn field_schema(&mut self, field: &Field, decl: &str, annotation: &Annotation, allow_ref: bool) -> Result<SchemaRef> {
        let mut is_map = false;

        let mut schema: SchemaRef = match field.kind {
            FieldType::TypeDouble | FieldType::TypeFloat => Schema::float64().into(),
            FieldType::TypeInt32 | FieldType::TypeSint32 | FieldType::TypeSfixed32 | FieldType::TypeFixed32 => {
                Schema::int32().into()
            }
            FieldType::TypeInt64 | FieldType::TypeSint64 | FieldType::TypeSfixed64 | FieldType::TypeFixed64 => {
                if self.options.int_native {
                    Schema::int64()
                } else {
                    special::int_or_string_int64()
                }
                .into()
            }
            FieldType::TypeUint32 => {
                Schema::integer().with_min(0.0).with_max(u32::MAX as f64).into()
            }
            // no maximum: u64::MAX has no plain YAML spelling
            FieldType::TypeUint64 => {
                if self.options.int_native {
                    Schema::integer().with_min(0.0).with_format("uint64")
                } else {
                    special::int_or_string_int64()
                }
                .into()
            }
            FieldType::TypeBool => Schema::boolean().into(),
            FieldType::TypeString => Schema::string().into(),
            FieldType::TypeBytes => Schema::bytes().into(),
            FieldType::TypeEnum => match field.type_ref {
                Some(TypeRef::Enum(id)) => self.enum_schema(id).into(),
                _ => return Err(unresolved(decl, "enum")),
            },
            FieldType::TypeMessage | FieldType::TypeGroup => match field.type_ref {
                Some(TypeRef::Message(id)) => {
                    let model = self.model;
                    let msg = model.message(id);
                    if let Some(custom) = self.catalog.get(&msg.absolute_name()) {
                        custom.clone().into()
                    } else if msg.map_entry {
                        is_map = true;
                        self.map_schema(msg, decl)?.into()
                    } else {
                        self.message_ref(id, allow_ref)?
                    }
                }
                _ => return Err(unresolved(decl, "message")),
            },
        };

        if field.repeated && !is_map {
            schema = Schema::array_of(schema).into();
        }
        if let Some(s) = schema.as_inline_mut() {
            s.description = annotation.description.clone();
        }
        Ok(schema)
    }

    /// `map<K, V>`: an object whose additional properties follow `V`.
    fn map_schema(&mut self, entry: &Message, decl: &str) -> Result<Schema> {
        let value = entry
            .fields
            .get(1)
            .ok_or_else(|| Error::Descriptor(format!("map entry for `{decl}` has no value field")))?;
        let annotation = self.annotations.parse(&value.comments);
        let value_decl = format!("{decl}.{}", value.name);
        let value_schema = self.field_schema(value, &value_decl, &annotation, true)?;
        Ok(Schema::map_of(value_schema))
    }

    fn message_ref(&mut self, id: MessageId, allow_ref: bool) -> Result<SchemaRef> {
        let name = self.model.message(id).absolute_name();
        let referable = self.referable.contains(&id);

        if allow_ref && referable && self.options.use_ref {
            return Ok(SchemaRef::component(&name));
        }
        if self.in_progress.contains(&id) {
            if referable {
                warn!(message = %name, "recursive message, emitting $ref");
                if allow_ref {
                    return Ok(SchemaRef::component(&name));
                }
                // field rules need an inline node to land on
                return Ok(Schema { all_of: vec![SchemaRef::component(&name)], ..Schema::object() }.into());
            }
            warn!(message = %name, "recursive nested message, emitting open object");
            return Ok(special::opaque_object().into());
        }
        Ok(self.message_schema(id)?.unwrap_or_else(Schema::object).into())
    }

    fn rules<'r>(&self, directives: &'r [String]) -> &'r [String] {
        if self.options.disable_kube_markers { &[] } else { directives }
    }
}

fn unresolved(decl: &str, what: &str) -> Error {
    Error::UnresolvedType { field: decl.to_string(), type_name: format!("<unlinked {what}>") }
}
