//! Compose file model: parsed descriptors, the config store, and the watched image set.

pub mod config;
pub mod images;
pub mod store;

pub use config::{ComposeConfig, ServiceDescriptor};
pub use images::{unique_images, ImageReference, ImageSet, UpdateSet};
pub use store::ConfigStore;
