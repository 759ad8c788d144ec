pub mod parser;
pub mod sequence;
pub mod settings_store;
pub mod templates;
