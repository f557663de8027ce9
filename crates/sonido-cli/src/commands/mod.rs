//! CLI command implementations.

pub mod devices;
pub mod info;
pub mod stream;
