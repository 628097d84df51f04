//! Error types for the prune crate.

use thiserror::Error;

use crate::types::{ResourceKey, TypeIdentifier};

/// Invalid pruner configuration. Always fatal, detected before any store call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Type identifier must have a non-empty {field}")]
    EmptyTypeField { field: &'static str },

    #[error("Namespace must not be empty when set")]
    EmptyNamespace,

    #[error("Invalid label key '{key}': {reason}")]
    InvalidLabelKey { key: String, reason: String },

    #[error("Invalid value '{value}' for label '{key}': {reason}")]
    InvalidLabelValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Max count must be >= 0, got {count}")]
    NegativeMaxCount { count: i64 },

    #[error("Invalid max age '{value}': {reason}")]
    InvalidMaxAge { value: String, reason: String },

    #[error("Custom strategy selected but no strategy function was supplied")]
    MissingCustomStrategy,

    #[error("Failed to read pruner configuration '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse pruner configuration: {reason}")]
    Parse { reason: String },
}

/// A predicate's verdict that one object must not be pruned.
///
/// This is a per-object veto, not a failure: the pruner skips the object and
/// keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unable to prune {resource}: {reason}")]
pub struct Unprunable {
    pub resource: ResourceKey,
    pub reason: String,
}

impl Unprunable {
    pub fn new(resource: ResourceKey, reason: impl Into<String>) -> Self {
        Self {
            resource,
            reason: reason.into(),
        }
    }
}

/// Result of a prunability check other than "prunable".
#[derive(Error, Debug)]
pub enum PredicateError {
    #[error(transparent)]
    Unprunable(#[from] Unprunable),

    #[error("Failed to convert {resource} into {target}: {source}")]
    Conversion {
        resource: ResourceKey,
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource} carries no apiVersion and kind")]
    MissingTypeMeta { resource: ResourceKey },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PredicateError {
    pub fn is_unprunable(&self) -> bool {
        matches!(self, PredicateError::Unprunable(_))
    }
}

/// Failures raised while a strategy selects objects.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("Custom strategy failed: {0}")]
    Custom(#[source] anyhow::Error),
}

/// Failures of the underlying resource store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to discover API resource for {type_id}: {source}")]
    Discovery {
        type_id: TypeIdentifier,
        #[source]
        source: kube::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors that abort a pruning pass.
///
/// Variants raised during deletion carry the keys already deleted in the
/// same pass; deletion is not rolled back.
#[derive(Error, Debug)]
pub enum PruneError {
    #[error("Invalid pruner configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to list {type_id}: {source}")]
    List {
        type_id: TypeIdentifier,
        #[source]
        source: StoreError,
    },

    #[error("Failed to convert {resource} into {type_id}: {reason}")]
    Convert {
        resource: ResourceKey,
        type_id: TypeIdentifier,
        reason: String,
    },

    #[error("Prunability check failed for {resource}: {source}")]
    Predicate {
        resource: ResourceKey,
        #[source]
        source: PredicateError,
    },

    #[error("Strategy failed: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Pre-delete hook failed for {resource}: {source}")]
    PreDelete {
        resource: ResourceKey,
        deleted: Vec<ResourceKey>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete {resource}: {source}")]
    Delete {
        resource: ResourceKey,
        deleted: Vec<ResourceKey>,
        #[source]
        source: StoreError,
    },

    #[error("Pruning was cancelled")]
    Cancelled { deleted: Vec<ResourceKey> },
}

impl PruneError {
    /// Objects deleted before the pass aborted.
    pub fn deleted(&self) -> &[ResourceKey] {
        match self {
            PruneError::PreDelete { deleted, .. }
            | PruneError::Delete { deleted, .. }
            | PruneError::Cancelled { deleted } => deleted,
            _ => &[],
        }
    }

    /// Configuration errors are never worth retrying.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PruneError::Config(_) | PruneError::Strategy(StrategyError::InvalidConfig(_))
        )
    }
}

/// Type alias for prune results
pub type PruneResult<T> = Result<T, PruneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprunable_display() {
        let err = Unprunable::new(ResourceKey::new(Some("default"), "j1"), "Job has not completed");
        assert_eq!(
            err.to_string(),
            "unable to prune default/j1: Job has not completed"
        );
    }

    #[test]
    fn test_predicate_error_classification() {
        let veto: PredicateError = Unprunable::new(ResourceKey::new(None, "x"), "no").into();
        assert!(veto.is_unprunable());

        let other: PredicateError = anyhow::anyhow!("boom").into();
        assert!(!other.is_unprunable());
    }

    #[test]
    fn test_deleted_keys_exposed() {
        let err = PruneError::Cancelled {
            deleted: vec![ResourceKey::new(Some("ns"), "a")],
        };
        assert_eq!(err.deleted().len(), 1);

        let err = PruneError::Config(ConfigError::EmptyNamespace);
        assert!(err.deleted().is_empty());
        assert!(err.is_config_error());
    }
}
