//! Generator parameters, parsed from protoc's `k=v,k=v` parameter string.
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    #[default]
    PerPackage,
    PerFile,
    SingleFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub grouping: Grouping,
    pub yaml: bool,
    /// Emit `$ref` to top-level messages instead of inlining them.
    pub use_ref: bool,
    pub include_description: bool,
    pub multiline_description: bool,
    pub enum_as_int_or_string: bool,
    /// Fully-qualified names that get an open object schema.
    pub messages_with_empty_schema: Vec<String>,
    /// Emulate protobuf oneof groups with `oneOf`/`not`/`anyOf`.
    pub proto_oneof: bool,
    /// Plain `integer` schemas for 64-bit fields instead of int-or-string.
    pub int_native: bool,
    pub disable_kube_markers: bool,
    pub ignored_kube_markers: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            grouping: Grouping::default(),
            yaml: false,
            use_ref: false,
            include_description: true,
            multiline_description: false,
            enum_as_int_or_string: false,
            messages_with_empty_schema: Vec::new(),
            proto_oneof: false,
            int_native: false,
            disable_kube_markers: false,
            ignored_kube_markers: Vec::new(),
        }
    }
}

impl GenerationOptions {
    pub fn parse_parameters(parameter: &str) -> Result<Self, ConfigError> {
        let mut o = Self::default();
        let mut per_file = false;
        let mut single_file = false;

        for (key, value) in extract_params(parameter) {
            match key {
                "per_file" => per_file = parse_bool(key, value)?,
                "single_file" => single_file = parse_bool(key, value)?,
                "yaml" => o.yaml = parse_bool(key, value)?,
                "use_ref" => o.use_ref = parse_bool(key, value)?,
                "include_description" => o.include_description = parse_bool(key, value)?,
                "multiline_description" => o.multiline_description = parse_bool(key, value)?,
                "enum_as_int_or_string" => o.enum_as_int_or_string = parse_bool(key, value)?,
                "proto_oneof" => o.proto_oneof = parse_bool(key, value)?,
                "int_native" => o.int_native = parse_bool(key, value)?,
                "disable_kube_markers" | "disable_validation" => o.disable_kube_markers = parse_bool(key, value)?,
                "additional_empty_schema" => o.messages_with_empty_schema = split_list(value, '+'),
                "ignored_kube_markers" => o.ignored_kube_markers = split_list(value, '|'),
                _ => return Err(ConfigError::UnknownArgument(key.to_string())),
            }
        }

        o.grouping = match (per_file, single_file) {
            (true, true) => return Err(ConfigError::PerFileAndSingleFile),
            (true, false) => Grouping::PerFile,
            (false, true) => Grouping::SingleFile,
            (false, false) => Grouping::PerPackage,
        };
        Ok(o)
    }

    pub fn extension(&self) -> &'static str {
        if self.yaml { "yaml" } else { "json" }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `a=1,b,c=x` → `[(a, 1), (b, ""), (c, x)]`, empty entries skipped.
fn extract_params(parameter: &str) -> impl Iterator<Item = (&str, &str)> {
    parameter
        .split(',')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value.split(sep).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = GenerationOptions::parse_parameters("").unwrap();
        assert_eq!(o, GenerationOptions::default());
        assert!(o.include_description);
        assert_eq!(o.grouping, Grouping::PerPackage);
    }

    #[test]
    fn parses_flags_and_lists() {
        let o = GenerationOptions::parse_parameters(
            "yaml,single_file=true,use_ref=TRUE,int_native=true,proto_oneof=true,additional_empty_schema=a.B+c.D,ignored_kube_markers=XValidation|default",
        )
        .unwrap();
        assert!(o.yaml && o.use_ref && o.int_native && o.proto_oneof);
        assert_eq!(o.grouping, Grouping::SingleFile);
        assert_eq!(o.messages_with_empty_schema, vec!["a.B", "c.D"]);
        assert_eq!(o.ignored_kube_markers, vec!["XValidation", "default"]);
        assert_eq!(o.extension(), "yaml");
    }

    #[test]
    fn disable_validation_is_an_alias() {
        let o = GenerationOptions::parse_parameters("disable_validation=true").unwrap();
        assert!(o.disable_kube_markers);
    }

    #[test]
    fn config_errors() {
        assert_eq!(
            GenerationOptions::parse_parameters("bogus=1"),
            Err(ConfigError::UnknownArgument("bogus".into()))
        );
        assert_eq!(
            GenerationOptions::parse_parameters("use_ref=maybe"),
            Err(ConfigError::InvalidValue { key: "use_ref".into(), value: "maybe".into() })
        );
        assert_eq!(
            GenerationOptions::parse_parameters("per_file=true,single_file=true"),
            Err(ConfigError::PerFileAndSingleFile)
        );
    }
}
