//! Built-in extractor sources.

pub mod fixture;
pub mod json_api;
