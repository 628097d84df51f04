//! # Prunability Registry
//!
//! Maps a [`TypeIdentifier`] to the predicate deciding whether an individual
//! object of that type may be removed at all, regardless of any count or age
//! policy. Types without a registered predicate are always prunable.
//!
//! Predicates are registered either typed, where the object is decoded into a
//! concrete Kubernetes type before the predicate runs, or dynamic, where the
//! predicate inspects the raw [`DynamicObject`]. A typed predicate that is
//! handed an object of the wrong shape yields [`PredicateError::Conversion`]
//! instead of panicking.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::PredicateError;
use crate::predicates::{job_is_prunable, pod_is_prunable};
use crate::types::{ResourceKey, TypeIdentifier};

type DynPredicate = dyn Fn(&DynamicObject) -> Result<(), PredicateError> + Send + Sync;

/// Registry of prunability predicates keyed by resource type.
///
/// Registration takes `&mut self`; share a finished registry behind an `Arc`.
#[derive(Default, Clone)]
pub struct Registry {
    predicates: HashMap<TypeIdentifier, Arc<DynPredicate>>,
}

impl Registry {
    /// An empty registry: every object is prunable.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in Pod and Job predicates.
    pub fn with_default_predicates() -> Self {
        let mut registry = Self::new();
        registry.register(TypeIdentifier::pod(), pod_is_prunable);
        registry.register(TypeIdentifier::job(), job_is_prunable);
        registry
    }

    /// Register a predicate over a concrete type `K`.
    ///
    /// The object is decoded into `K` before `predicate` runs. Any earlier
    /// predicate for `type_id` is replaced.
    pub fn register<K, F>(&mut self, type_id: TypeIdentifier, predicate: F)
    where
        K: DeserializeOwned + 'static,
        F: Fn(&K) -> Result<(), PredicateError> + Send + Sync + 'static,
    {
        self.register_dynamic(type_id, move |obj: &DynamicObject| {
            let typed = convert::<K>(obj)?;
            predicate(&typed)
        });
    }

    /// Register a predicate over the raw dynamic object.
    pub fn register_dynamic<F>(&mut self, type_id: TypeIdentifier, predicate: F)
    where
        F: Fn(&DynamicObject) -> Result<(), PredicateError> + Send + Sync + 'static,
    {
        debug!(type_id = %type_id, "Registering prunability predicate");
        self.predicates.insert(type_id, Arc::new(predicate));
    }

    /// Check whether `obj` may be pruned.
    ///
    /// The predicate is looked up by the object's own `apiVersion` and `kind`.
    /// Returns `Ok(())` when no predicate is registered for that type,
    /// otherwise the predicate's verdict unchanged.
    pub fn is_prunable(&self, obj: &DynamicObject) -> Result<(), PredicateError> {
        let type_id = TypeIdentifier::of(obj).ok_or_else(|| PredicateError::MissingTypeMeta {
            resource: ResourceKey::of(obj),
        })?;
        match self.predicates.get(&type_id) {
            Some(predicate) => predicate(obj),
            None => Ok(()),
        }
    }

    pub fn contains(&self, type_id: &TypeIdentifier) -> bool {
        self.predicates.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.predicates.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("Registry").field("types", &types).finish()
    }
}

/// Shared registry pre-populated with the default predicates.
///
/// Built on first use and never mutated afterwards. Callers needing extra
/// predicates should start from [`Registry::with_default_predicates`] instead.
pub fn default_registry() -> Arc<Registry> {
    static DEFAULT: OnceLock<Arc<Registry>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(Registry::with_default_predicates()))
        .clone()
}

fn convert<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K, PredicateError> {
    let conversion_error = |source| PredicateError::Conversion {
        resource: ResourceKey::of(obj),
        target: type_name::<K>(),
        source,
    };
    let value = serde_json::to_value(obj).map_err(conversion_error)?;
    serde_json::from_value(value).map_err(conversion_error)
}
