use serde::de::DeserializeOwned;

use crate::error::Error;

fn definition_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    Error::Definition { path, message: err.into_inner().to_string() }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, Error> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(definition_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(definition_error)
}

/// For documents already split out of a larger stream.
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, Error> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(definition_error)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Entry {
        name: String,
        tags: Vec<u8>,
    }

    #[test]
    fn errors_carry_the_json_path() {
        let err = from_str_with_path::<Entry>(r#"{"name": "a", "tags": [1, "x"]}"#).unwrap_err();
        assert!(matches!(err, Error::Definition { ref path, .. } if path == "tags[1]"));

        let err = from_value_with_path::<Entry>(json!({"name": 3, "tags": []})).unwrap_err();
        assert!(matches!(err, Error::Definition { ref path, .. } if path == "name"));

        assert!(from_slice_with_path::<Entry>(br#"{"name": "a", "tags": []}"#).is_ok());
    }
}
