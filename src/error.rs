//! Error taxonomy for a generation pass.
//!
//! Nothing here is recoverable per-record: any of these aborts the pass.
use thiserror::Error;

use crate::markers::Target;

/// Bad or conflicting generator parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown argument '{0}' specified")]
    UnknownArgument(String),
    #[error("unknown value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("output is already to be generated per file, cannot output to a single file")]
    PerFileAndSingleFile,
    #[error("invalid ignored marker pattern: {0}")]
    IgnorePattern(String),
}

/// A constraint directive that could not be looked up, parsed or applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarkerError {
    #[error("no definition found for rule `{rule}` ({target})")]
    NoDefinition { rule: String, target: Target },
    #[error("malformed rule `{rule}`: {reason}")]
    Malformed { rule: String, reason: String },
    #[error("must apply {marker} to {expected}, got {found}")]
    KindMismatch {
        marker: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("cannot apply non-integral MultipleOf validation ({0}) to integer value")]
    NonIntegralMultipleOf(f64),
}

/// Everything a generation pass can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("error applying rules to `{declaration}`: {source}")]
    Marker {
        declaration: String,
        #[source]
        source: MarkerError,
    },

    #[error("unable to find {0}")]
    UnknownFile(String),

    #[error("field `{field}` refers to unknown type `{type_name}`")]
    UnresolvedType { field: String, type_name: String },

    #[error("invalid descriptor request: {0}")]
    Descriptor(String),

    #[error("unable to encode `{name}` as json: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to encode `{name}` as yaml: {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub(crate) fn marker(declaration: impl Into<String>) -> impl FnOnce(MarkerError) -> Self {
        let declaration = declaration.into();
        move |source| Error::Marker { declaration, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
