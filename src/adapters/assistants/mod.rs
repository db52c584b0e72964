//! Assistant adapters and their registry.

pub mod mock;
pub mod registry;

pub use mock::{MockAssistant, MockResponse};
pub use registry::AdapterRegistry;
