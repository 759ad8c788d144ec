pub mod error;
pub mod field;
pub mod instance;
pub mod resolved;
pub mod settings;
pub mod value;
