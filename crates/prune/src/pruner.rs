//! # Pruner
//!
//! Runs one pruning pass:
//!
//! 1. Validate the configuration (no store call happens before this succeeds)
//! 2. List objects of the configured type, namespace and labels
//! 3. Fill in missing type metadata so typed predicates can decode objects
//! 4. Drop objects vetoed by the registry (and, when enabled, the preserve
//!    annotation)
//! 5. Ask the strategy which of the remaining candidates to remove
//! 6. Delete the selection one at a time, unless in dry-run
//!
//! Deletion is not transactional: if the third of five deletions fails, the
//! first two stay deleted and are reported on the returned error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::annotations::is_preserved;
use crate::error::{ConfigError, PredicateError, PruneError, PruneResult};
use crate::labels;
use crate::registry::{default_registry, Registry};
use crate::store::{ListRequest, ResourceStore};
use crate::strategy::Strategy;
use crate::types::{ResourceKey, TypeIdentifier};

/// Hook invoked right before each real deletion.
pub type PreDeleteHook = dyn Fn(&DynamicObject) -> anyhow::Result<()> + Send + Sync;

type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// A configured pruning pass over one resource type.
///
/// Holds no state between calls, so [`Pruner::prune`] may be invoked
/// repeatedly, e.g. from each reconcile.
#[derive(Clone)]
pub struct Pruner {
    store: Arc<dyn ResourceStore>,
    type_id: TypeIdentifier,
    strategy: Strategy,
    registry: Arc<Registry>,
    labels: BTreeMap<String, String>,
    namespace: Option<String>,
    dry_run: bool,
    respect_preserve_annotation: bool,
    pre_delete_hook: Option<Arc<PreDeleteHook>>,
    clock: Arc<Clock>,
}

/// Builder for [`Pruner`]
pub struct PrunerBuilder {
    inner: Pruner,
}

impl PrunerBuilder {
    /// Resource type to prune (default: core `v1/Pod`).
    pub fn type_identifier(mut self, type_id: TypeIdentifier) -> Self {
        self.inner.type_id = type_id;
        self
    }

    /// Replace the selection policy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.inner.strategy = strategy;
        self
    }

    /// Attach a selection function, switching to [`Strategy::Custom`].
    pub fn custom_strategy<F>(self, f: F) -> Self
    where
        F: Fn(&[DynamicObject]) -> anyhow::Result<Vec<DynamicObject>> + Send + Sync + 'static,
    {
        self.strategy(Strategy::custom(f))
    }

    /// Prunability registry (default: [`default_registry`]).
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.inner.registry = registry;
        self
    }

    /// Replace the label filter.
    pub fn labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.inner.labels = labels;
        self
    }

    /// Add one `key=value` requirement to the label filter.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.labels.insert(key.into(), value.into());
        self
    }

    /// Restrict the pass to one namespace (default: all namespaces).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.inner.namespace = Some(namespace.into());
        self
    }

    /// Select without deleting.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.inner.dry_run = dry_run;
        self
    }

    /// Skip objects carrying [`ANNOTATION_PRESERVE`](crate::ANNOTATION_PRESERVE)
    /// before the registry is consulted (default: false).
    pub fn respect_preserve_annotation(mut self, respect: bool) -> Self {
        self.inner.respect_preserve_annotation = respect;
        self
    }

    pub fn pre_delete_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DynamicObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.pre_delete_hook = Some(Arc::new(hook));
        self
    }

    /// Time source for age-based strategies (default: `Utc::now`).
    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.inner.clock = Arc::new(clock);
        self
    }

    /// Validate and finish the pruner.
    pub fn build(self) -> Result<Pruner, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

impl Pruner {
    pub fn builder(store: Arc<dyn ResourceStore>, strategy: Strategy) -> PrunerBuilder {
        PrunerBuilder {
            inner: Pruner {
                store,
                type_id: TypeIdentifier::default(),
                strategy,
                registry: default_registry(),
                labels: BTreeMap::new(),
                namespace: None,
                dry_run: false,
                respect_preserve_annotation: false,
                pre_delete_hook: None,
                clock: Arc::new(Utc::now),
            },
        }
    }

    pub fn type_identifier(&self) -> &TypeIdentifier {
        &self.type_id
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Check every setting the pass depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_target(&self.type_id, self.namespace.as_deref(), &self.labels)?;
        self.strategy.validate()
    }

    /// Run one pass and return the objects selected for removal.
    ///
    /// In dry-run nothing is deleted but the selection is the same.
    pub async fn prune(&self) -> PruneResult<Vec<DynamicObject>> {
        self.prune_with_cancellation(&CancellationToken::new()).await
    }

    /// Like [`Pruner::prune`], aborting with [`PruneError::Cancelled`] as soon
    /// as `cancel` fires. Objects deleted before that point stay deleted.
    pub async fn prune_with_cancellation(
        &self,
        cancel: &CancellationToken,
    ) -> PruneResult<Vec<DynamicObject>> {
        self.validate()?;

        let request = ListRequest {
            type_id: self.type_id.clone(),
            label_selector: labels::to_selector(&self.labels),
            namespace: self.namespace.clone(),
        };
        info!(
            type_id = %self.type_id,
            namespace = request.namespace.as_deref().unwrap_or("<all>"),
            selector = request.label_selector.as_deref().unwrap_or(""),
            strategy = self.strategy.mode(),
            dry_run = self.dry_run,
            "Starting prune pass"
        );

        let listed = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.store.list(&request) => Some(result),
        };
        let listed = match listed {
            None => {
                warn!(type_id = %self.type_id, "Prune pass cancelled while listing");
                return Err(PruneError::Cancelled { deleted: Vec::new() });
            }
            Some(Ok(items)) => items,
            Some(Err(source)) => {
                error!(type_id = %self.type_id, error = %source, "Failed to list resources");
                return Err(PruneError::List {
                    type_id: self.type_id.clone(),
                    source,
                });
            }
        };

        let listed_count = listed.len();
        let candidates = self.filter_prunable(listed)?;

        let selected = self.strategy.select(&candidates, (self.clock)()).map_err(|e| {
            error!(type_id = %self.type_id, error = %e, "Strategy failed");
            PruneError::Strategy(e)
        })?;
        debug!(
            type_id = %self.type_id,
            listed = listed_count,
            candidates = candidates.len(),
            selected = selected.len(),
            "Strategy selected resources"
        );

        if self.dry_run {
            for obj in &selected {
                debug!(resource = %ResourceKey::of(obj), "Would delete (dry run)");
            }
            info!(
                type_id = %self.type_id,
                selected = selected.len(),
                "Dry run complete, nothing deleted"
            );
            return Ok(selected);
        }

        self.delete_all(&selected, cancel).await?;
        info!(
            type_id = %self.type_id,
            deleted = selected.len(),
            "Prune pass complete"
        );
        Ok(selected)
    }

    /// Coerce listed objects and keep the ones eligible for removal.
    fn filter_prunable(&self, listed: Vec<DynamicObject>) -> PruneResult<Vec<DynamicObject>> {
        let mut candidates = Vec::with_capacity(listed.len());
        for obj in listed {
            let obj = self.coerce(obj)?;

            if self.respect_preserve_annotation && is_preserved(&obj.metadata) {
                debug!(resource = %ResourceKey::of(&obj), "Skipping preserved resource");
                continue;
            }

            // `coerce` guarantees the object's own type matches `self.type_id`.
            match self.registry.is_prunable(&obj) {
                Ok(()) => candidates.push(obj),
                Err(PredicateError::Unprunable(veto)) => {
                    debug!(
                        resource = %veto.resource,
                        reason = %veto.reason,
                        "Skipping unprunable resource"
                    );
                }
                Err(source) => {
                    let resource = ResourceKey::of(&obj);
                    error!(resource = %resource, error = %source, "Prunability check failed");
                    return Err(PruneError::Predicate { resource, source });
                }
            }
        }
        Ok(candidates)
    }

    /// Make sure the object carries the configured apiVersion and kind.
    fn coerce(&self, mut obj: DynamicObject) -> PruneResult<DynamicObject> {
        let api_version = self.type_id.api_version();
        match &obj.types {
            Some(types) if !types.api_version.is_empty() || !types.kind.is_empty() => {
                if types.api_version != api_version || types.kind != self.type_id.kind {
                    return Err(PruneError::Convert {
                        resource: ResourceKey::of(&obj),
                        type_id: self.type_id.clone(),
                        reason: format!(
                            "object reports apiVersion '{}' and kind '{}'",
                            types.api_version, types.kind
                        ),
                    });
                }
            }
            _ => {
                obj.types = Some(TypeMeta {
                    api_version,
                    kind: self.type_id.kind.clone(),
                });
            }
        }
        if obj.data.is_null() {
            obj.data = Value::Object(serde_json::Map::new());
        }
        Ok(obj)
    }

    async fn delete_all(
        &self,
        selected: &[DynamicObject],
        cancel: &CancellationToken,
    ) -> PruneResult<()> {
        let mut deleted: Vec<ResourceKey> = Vec::with_capacity(selected.len());
        for obj in selected {
            let resource = ResourceKey::of(obj);

            if cancel.is_cancelled() {
                warn!(deleted = deleted.len(), "Prune pass cancelled before deletion");
                return Err(PruneError::Cancelled { deleted });
            }

            if let Some(hook) = &self.pre_delete_hook {
                if let Err(source) = hook(obj) {
                    error!(resource = %resource, error = %source, "Pre-delete hook failed");
                    return Err(PruneError::PreDelete {
                        resource,
                        deleted,
                        source,
                    });
                }
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.store.delete(&self.type_id, obj) => Some(result),
            };
            match outcome {
                None => {
                    warn!(
                        resource = %resource,
                        deleted = deleted.len(),
                        "Prune pass cancelled during deletion"
                    );
                    return Err(PruneError::Cancelled { deleted });
                }
                Some(Err(source)) => {
                    error!(resource = %resource, error = %source, "Failed to delete resource");
                    return Err(PruneError::Delete {
                        resource,
                        deleted,
                        source,
                    });
                }
                Some(Ok(())) => {
                    debug!(resource = %resource, "Deleted resource");
                    deleted.push(resource);
                }
            }
        }
        Ok(())
    }
}

/// Checks on what a pass lists, shared with [`PrunerConfig`](crate::PrunerConfig).
pub(crate) fn validate_target(
    type_id: &TypeIdentifier,
    namespace: Option<&str>,
    labels: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    if type_id.version.is_empty() {
        return Err(ConfigError::EmptyTypeField { field: "version" });
    }
    if type_id.kind.is_empty() {
        return Err(ConfigError::EmptyTypeField { field: "kind" });
    }
    if namespace.is_some_and(str::is_empty) {
        return Err(ConfigError::EmptyNamespace);
    }
    labels::validate(labels)
}

impl fmt::Debug for Pruner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pruner")
            .field("type_id", &self.type_id)
            .field("strategy", &self.strategy)
            .field("registry", &self.registry)
            .field("labels", &self.labels)
            .field("namespace", &self.namespace)
            .field("dry_run", &self.dry_run)
            .field("respect_preserve_annotation", &self.respect_preserve_annotation)
            .field("pre_delete_hook", &self.pre_delete_hook.is_some())
            .finish_non_exhaustive()
    }
}
