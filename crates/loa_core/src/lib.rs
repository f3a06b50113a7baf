pub mod artifacts;
pub mod chunker;
pub mod config;
pub mod domain;
pub mod error;
pub mod sources;
pub mod validate;
