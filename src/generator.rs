//! Output units: which declarations go into which document, and how each
//! document is enveloped and encoded.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::annotation::AnnotationParser;
use crate::descriptor::{Declaration, EnumId, File, FileId, MessageId, Model, qualify};
use crate::error::{Error, Result};
use crate::options::{GenerationOptions, Grouping};
use crate::schema::Schema;
use crate::synth::Synthesizer;

pub const OPENAPI_VERSION: &str = "3.0.1";
pub const DEFAULT_TITLE: &str = "OpenAPI Spec for Protobuf APIs.";
pub const SINGLE_FILE_NAME: &str = "openapiv3";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub content: String,
}

/// Declarations that end up in one document.
#[derive(Debug, Default)]
struct Unit {
    name: String,
    title: String,
    version: String,
    messages: BTreeMap<String, MessageId>,
    enums: BTreeMap<String, EnumId>,
    services: BTreeSet<String>,
}

#[derive(Serialize)]
struct Document<'a> {
    openapi: &'static str,
    info: Info<'a>,
    components: Components,
}

#[derive(Serialize)]
struct Info<'a> {
    title: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct Components {
    schemas: BTreeMap<String, Schema>,
}

pub struct Generator<'m> {
    model: &'m Model,
    options: GenerationOptions,
    annotations: AnnotationParser,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'m> Generator<'m> {
    pub fn new(model: &'m Model, options: GenerationOptions) -> Result<Self> {
        let annotations = AnnotationParser::new(
            options.include_description,
            options.multiline_description,
            &options.ignored_kube_markers,
        )?;
        Ok(Self { model, options, annotations })
    }

    /// One document per output unit, in a stable order.
    pub fn generate(&self, files_to_generate: &[String]) -> Result<Vec<OutputFile>> {
        let files = files_to_generate
            .iter()
            .map(|name| self.model.file_by_name(name).ok_or_else(|| Error::UnknownFile(name.clone())))
            .collect::<Result<Vec<_>>>()?;

        self.units(&files).iter().map(|unit| self.render(unit)).collect()
    }

    fn units(&self, files: &[FileId]) -> Vec<Unit> {
        match self.options.grouping {
            Grouping::SingleFile => {
                let mut unit = Unit {
                    name: SINGLE_FILE_NAME.to_string(),
                    title: DEFAULT_TITLE.to_string(),
                    ..Unit::default()
                };
                for id in files {
                    unit.add_file(self.model, self.model.file(*id));
                }
                vec![unit]
            }
            Grouping::PerFile => files
                .iter()
                .map(|id| {
                    let file = self.model.file(*id);
                    let stem = Path::new(&file.name)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.name.clone());
                    let mut unit = self.unit_for(stem, file);
                    unit.add_file(self.model, file);
                    unit
                })
                .collect(),
            Grouping::PerPackage => {
                let mut by_package = BTreeMap::<&str, Unit>::new();
                for id in files {
                    let file = self.model.file(*id);
                    by_package
                        .entry(file.package.as_str())
                        .or_insert_with(|| self.unit_for(file.package.clone(), file))
                        .add_file(self.model, file);
                }
                by_package.into_values().collect()
            }
        }
    }

    fn unit_for(&self, name: String, file: &File) -> Unit {
        let title = self.annotations.parse(&file.package_comments).description;
        Unit {
            name,
            title: if title.is_empty() { DEFAULT_TITLE.to_string() } else { title },
            version: file.package.rsplit('.').next().unwrap_or_default().to_string(),
            ..Unit::default()
        }
    }

    fn render(&self, unit: &Unit) -> Result<OutputFile> {
        let mut synth = Synthesizer::new(self.model, &self.options, unit.messages.values().copied())?;
        let mut schemas = BTreeMap::new();

        // nested declarations are rendered inside their parents
        for (name, id) in &unit.messages {
            if self.model.message(*id).parent.is_some() {
                continue;
            }
            if let Some(schema) = synth.message_schema(*id)? {
                schemas.insert(name.clone(), schema);
            }
        }
        for (name, id) in &unit.enums {
            if self.model.enumeration(*id).parent.is_none() {
                schemas.insert(name.clone(), synth.enum_schema(*id));
            }
        }

        let count = schemas.len();
        let doc = Document {
            openapi: OPENAPI_VERSION,
            info: Info { title: &unit.title, version: &unit.version },
            components: Components { schemas },
        };
        let name = format!("{}.{}", unit.name, self.options.extension());
        let content = if self.options.yaml {
            serde_yaml::to_string(&doc).map_err(|source| Error::Yaml { name: name.clone(), source })?
        } else {
            serde_json::to_string_pretty(&doc).map_err(|source| Error::Json { name: name.clone(), source })?
        };

        if !unit.services.is_empty() {
            debug!(file = %name, services = unit.services.len(), "services carry no schemas");
        }
        info!(file = %name, schemas = count, "generated document");
        Ok(OutputFile { name, content })
    }
}

impl Unit {
    fn add_file(&mut self, model: &Model, file: &File) {
        for id in &file.messages {
            self.messages.insert(model.message(*id).absolute_name(), *id);
        }
        for id in &file.enums {
            self.enums.insert(model.enumeration(*id).absolute_name(), *id);
        }
        for s in &file.services {
            self.services.insert(qualify(&s.package, &s.name));
        }
    }
}
