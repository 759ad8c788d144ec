mod dependency;
mod spec;

pub use dependency::*;
pub use spec::*;
