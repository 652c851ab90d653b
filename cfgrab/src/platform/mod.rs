//! Device model registry.
//!
//! Maps a device model tag to the shell command or REST endpoint that
//! returns its running configuration. The table is static: it is built once
//! from [`vendors`] and never changes at run time.

mod definition;
mod registry;
pub mod vendors;

pub use definition::{ModelDefinition, RestDialect, RestEndpoint};
pub use registry::ModelRegistry;
