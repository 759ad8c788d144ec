pub mod fields;
pub mod graph;
pub mod group;
pub mod providers;
pub mod resolver;
pub mod retry;
pub mod widget;
