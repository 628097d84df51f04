//! Resource store seam: where the pruner lists and deletes objects.

mod kube_store;

use async_trait::async_trait;
use kube::api::DynamicObject;

use crate::error::StoreError;
use crate::types::TypeIdentifier;

pub use kube_store::KubeStore;

/// Scope of a single list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub type_id: TypeIdentifier,
    /// Rendered equality selector, e.g. `app=worker,tier=batch`
    pub label_selector: Option<String>,
    /// `None` lists across all namespaces
    pub namespace: Option<String>,
}

/// Listing and deletion of cluster objects.
///
/// Implementations must make both calls cancel-safe: the pruner may drop an
/// in-flight future when its cancellation token fires.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List every object matching the request.
    async fn list(&self, request: &ListRequest) -> Result<Vec<DynamicObject>, StoreError>;

    /// Delete one object of the given type.
    async fn delete(&self, type_id: &TypeIdentifier, obj: &DynamicObject)
        -> Result<(), StoreError>;
}
