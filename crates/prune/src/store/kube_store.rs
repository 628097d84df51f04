//! [`ResourceStore`] backed by a live cluster through `kube`.

use std::collections::HashMap;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams};
use kube::discovery::{self, ApiCapabilities, ApiResource, Scope};
use kube::core::GroupVersionKind;
use kube::{Client, Error as KubeError};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ListRequest, ResourceStore};
use crate::error::StoreError;
use crate::types::{ResourceKey, TypeIdentifier};

/// Page size for list calls
const LIST_PAGE_SIZE: u32 = 500;

/// Cluster-backed store.
///
/// API resources are discovered once per type and cached for the lifetime of
/// the store.
pub struct KubeStore {
    client: Client,
    resources: RwLock<HashMap<TypeIdentifier, (ApiResource, ApiCapabilities)>>,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    async fn resolve(
        &self,
        type_id: &TypeIdentifier,
    ) -> Result<(ApiResource, ApiCapabilities), StoreError> {
        if let Some(found) = self.resources.read().await.get(type_id) {
            return Ok(found.clone());
        }

        let resolved = discovery::pinned_kind(&self.client, &GroupVersionKind::from(type_id))
            .await
            .map_err(|source| StoreError::Discovery {
                type_id: type_id.clone(),
                source,
            })?;
        debug!(
            type_id = %type_id,
            plural = %resolved.0.plural,
            "Discovered API resource"
        );

        self.resources
            .write()
            .await
            .insert(type_id.clone(), resolved.clone());
        Ok(resolved)
    }

    fn api(
        &self,
        resource: &ApiResource,
        caps: &ApiCapabilities,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        match (&caps.scope, namespace) {
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, resource)
            }
            _ => Api::all_with(self.client.clone(), resource),
        }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list(&self, request: &ListRequest) -> Result<Vec<DynamicObject>, StoreError> {
        let (resource, caps) = self.resolve(&request.type_id).await?;
        let api = self.api(&resource, &caps, request.namespace.as_deref());

        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        if let Some(selector) = &request.label_selector {
            params = params.labels(selector);
        }

        let mut items = Vec::new();
        loop {
            let page = api.list(&params).await?;
            items.extend(page.items);
            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    params = params.continue_token(&token);
                }
                _ => break,
            }
        }

        debug!(
            type_id = %request.type_id,
            count = items.len(),
            "Listed resources"
        );
        Ok(items)
    }

    async fn delete(
        &self,
        type_id: &TypeIdentifier,
        obj: &DynamicObject,
    ) -> Result<(), StoreError> {
        let (resource, caps) = self.resolve(type_id).await?;
        let key = ResourceKey::of(obj);
        let api = self.api(&resource, &caps, key.namespace.as_deref());

        match api.delete(&key.name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(KubeError::Api(err)) if err.code == 404 => {
                debug!(resource = %key, "Resource already gone");
                Ok(())
            }
            Err(e) => Err(StoreError::Kube(e)),
        }
    }
}
