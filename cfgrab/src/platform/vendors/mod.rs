//! Built-in model definitions.

pub mod linux;
pub mod network;

use super::ModelDefinition;

/// Every built-in definition, network operating systems first.
pub fn builtin() -> Vec<ModelDefinition> {
    let mut definitions = network::definitions();
    definitions.extend(linux::definitions());
    definitions
}
