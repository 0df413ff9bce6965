//! Compile linked protobuf declarations into OpenAPI v3 component schemas,
//! honouring `+kubebuilder:` constraint directives found in comments.
pub mod annotation;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod markers;
pub mod oneof;
pub mod options;
pub mod path_de;
pub mod schema;
pub mod special;
pub mod synth;

#[cfg(test)]
mod testutil;

pub use descriptor::{CodeGeneratorRequest, Model};
pub use error::{ConfigError, Error, MarkerError, Result};
pub use generator::{Generator, OutputFile};
pub use options::{GenerationOptions, Grouping};
pub use schema::{Schema, SchemaRef};
