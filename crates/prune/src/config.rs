//! Serializable pruner configuration.
//!
//! Lets an operator keep its pruning policy in a mounted YAML file or a CRD
//! field instead of code:
//!
//! ```yaml
//! typeIdentifier:
//!   group: batch
//!   version: v1
//!   kind: Job
//! strategy:
//!   mode: maxAge
//!   maxAge: 3h
//! labels:
//!   app: report-generator
//! namespace: workers
//! dryRun: false
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::pruner::{validate_target, Pruner, PrunerBuilder};
use crate::store::ResourceStore;
use crate::strategy::Strategy;
use crate::types::TypeIdentifier;

/// Strategy settings, tagged by `mode`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum StrategyConfig {
    #[serde(rename_all = "camelCase")]
    MaxCount { max_count: i64 },

    #[serde(rename_all = "camelCase")]
    MaxAge { max_age: String },

    #[serde(rename_all = "camelCase")]
    OlderThan { cutoff: DateTime<Utc> },

    /// The function is attached in code with [`PrunerBuilder::custom_strategy`]
    Custom,
}

impl From<&StrategyConfig> for Strategy {
    fn from(config: &StrategyConfig) -> Self {
        match config {
            StrategyConfig::MaxCount { max_count } => Strategy::MaxCount(*max_count),
            StrategyConfig::MaxAge { max_age } => Strategy::MaxAge(max_age.clone()),
            StrategyConfig::OlderThan { cutoff } => Strategy::OlderThan(*cutoff),
            StrategyConfig::Custom => Strategy::Custom(None),
        }
    }
}

/// Pruner settings as stored in YAML or JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrunerConfig {
    #[serde(default)]
    pub type_identifier: TypeIdentifier,

    pub strategy: StrategyConfig,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub respect_preserve_annotation: bool,
}

impl PrunerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Load configuration from a mounted file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded pruner configuration");
        Self::from_yaml_str(&contents)
    }

    /// Validate everything that can be checked without code.
    ///
    /// `mode: custom` passes here; the function itself is checked when the
    /// pruner is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_target(
            &self.type_identifier,
            self.namespace.as_deref(),
            &self.labels,
        )?;
        match &self.strategy {
            StrategyConfig::Custom => Ok(()),
            other => Strategy::from(other).validate(),
        }
    }

    /// Turn the configuration into a builder over `store`.
    pub fn into_builder(self, store: Arc<dyn ResourceStore>) -> PrunerBuilder {
        let mut builder = Pruner::builder(store, Strategy::from(&self.strategy))
            .type_identifier(self.type_identifier)
            .labels(self.labels)
            .dry_run(self.dry_run)
            .respect_preserve_annotation(self.respect_preserve_annotation);
        if let Some(namespace) = self.namespace {
            builder = builder.namespace(namespace);
        }
        builder
    }
}
