//! Document store adapters.

use std::sync::Arc;

use crate::application::repos::DocumentStore;
use crate::config::{StoreBackend, StoreSettings};

use super::error::InfraError;

pub mod memory;
pub mod rest;

pub use memory::InMemoryDocumentStore;
pub use rest::RestDocumentStore;

/// Build the adapter selected by `[store].backend`.
pub fn connect(settings: &StoreSettings) -> Result<Arc<dyn DocumentStore>, InfraError> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
        StoreBackend::Rest => {
            let base = settings.base_url.clone().ok_or_else(|| {
                InfraError::configuration("store.base_url is required for the rest backend")
            })?;
            Ok(Arc::new(RestDocumentStore::new(base, settings.timeout)?))
        }
    }
}
