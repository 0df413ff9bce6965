//! JSON decoding with the path of the offending element in error messages.
use serde::de::DeserializeOwned;

use crate::descriptor::CodeGeneratorRequest;
use crate::error::{Error, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

/// A JSON-encoded `CodeGeneratorRequest`.
pub fn request_from_slice(bytes: &[u8]) -> Result<CodeGeneratorRequest> {
    from_slice_with_path(bytes).map_err(Error::Descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_json_path_of_bad_field() {
        let src = br#"{"protoFile":[{"name":"a.proto","messageType":[{"name":"M","field":[{"name":"x","type":"TYPE_NOPE"}]}]}]}"#;
        let err = request_from_slice(src).unwrap_err();
        let Error::Descriptor(msg) = err else { panic!("unexpected {err:?}") };
        assert!(msg.contains("protoFile[0].messageType[0].field[0].type"), "{msg}");
    }

    #[test]
    fn decodes_minimal_request() {
        let req = request_from_slice(br#"{"fileToGenerate":["a.proto"],"parameter":"yaml"}"#).unwrap();
        assert_eq!(req.file_to_generate, vec!["a.proto"]);
        assert_eq!(req.parameter.as_deref(), Some("yaml"));
        assert!(req.proto_file.is_empty());
    }
}
