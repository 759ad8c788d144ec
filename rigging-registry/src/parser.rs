use std::path::Path;

use rigging_common::error::Error;
use rigging_common::value::ConfigValue;

/// Parses a YAML document into the generic configuration tree.
pub fn parse_document(yaml_str: &str) -> Result<ConfigValue, Error> {
    let doc: ConfigValue = serde_yaml::from_str(yaml_str).map_err(|e| {
        let err = if let Some(loc) = e.location() {
            ParseError::InvalidYaml {
                line: loc.line(),
                column: loc.column(),
                message: e.to_string(),
            }
        } else {
            ParseError::InvalidYamlNoLocation {
                message: e.to_string(),
            }
        };
        Error::Parse(err.to_string())
    })?;

    Ok(doc)
}

pub fn load_document(path: &Path) -> Result<ConfigValue, Error> {
    let contents = std::fs::read_to_string(path)?;
    parse_document(&contents)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid YAML document at line {line}, column {column}: {message}")]
    InvalidYaml {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid YAML document: {message}")]
    InvalidYamlNoLocation { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let doc = parse_document("name: demo\nplugins:\n  - scan\n").unwrap();
        assert!(doc.get("plugins").is_some());
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = parse_document("name: demo\n  bad indent: [").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line"), "unexpected error: {message}");
    }
}
