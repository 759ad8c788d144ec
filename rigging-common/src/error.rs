use std::fmt::Debug;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Dependency Error: {0}")]
    Dependency(String),

    #[error("Provider Error: {0}")]
    Provider(String),
}
