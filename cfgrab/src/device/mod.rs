//! Device descriptors.
//!
//! A [`DeviceDescriptor`] is an immutable value naming one device, its
//! credentials, its model tag and the transports to fetch it over.

mod descriptor;
mod model;
mod spec;

pub use descriptor::{
    AuthMethod, DEFAULT_SSH_PORT, DeviceBuilder, DeviceDescriptor, Protocol, Source,
};
pub use model::DeviceModel;
pub use spec::DeviceSpec;
