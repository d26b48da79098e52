pub mod registry;

pub use registry::{RegistryConfig, SignalRegistry};
