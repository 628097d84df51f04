#![warn(clippy::pedantic)]
// Allow common pedantic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

//! # Prune
//!
//! Garbage collection for resources managed by a Kubernetes operator.
//!
//! A pruning pass lists every object of one kind (optionally narrowed by
//! namespace and labels), drops the ones a registered predicate says are not
//! safe to remove, asks a [`Strategy`] which of the remaining candidates to
//! reclaim and then deletes them one by one.
//!
//! This crate provides:
//! - A [`Registry`] of per-kind prunability predicates, with built-in ones for
//!   completed Jobs and succeeded Pods
//! - Max-count, max-age, by-date and custom selection strategies
//! - A [`Pruner`] that runs a single synchronous pass with dry-run support
//! - A [`ResourceStore`] seam, with [`KubeStore`] backed by a `kube::Client`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prune::{KubeStore, Pruner, Strategy, TypeIdentifier};
//!
//! let client = kube::Client::try_default().await?;
//! let pruner = Pruner::builder(Arc::new(KubeStore::new(client)), Strategy::MaxCount(5))
//!     .type_identifier(TypeIdentifier::job())
//!     .namespace("workers")
//!     .label("app", "report-generator")
//!     .build()?;
//!
//! let removed = pruner.prune().await?;
//! ```

pub mod annotations;
pub mod config;
pub mod duration;
pub mod error;
pub mod labels;
pub mod predicates;
pub mod pruner;
pub mod registry;
pub mod store;
pub mod strategy;
pub mod types;

// Re-export key types for convenience
pub use annotations::ANNOTATION_PRESERVE;
pub use config::{PrunerConfig, StrategyConfig};
pub use error::{
    ConfigError, PredicateError, PruneError, PruneResult, StoreError, StrategyError, Unprunable,
};
pub use predicates::{job_is_prunable, pod_is_prunable};
pub use pruner::{PreDeleteHook, Pruner, PrunerBuilder};
pub use registry::{default_registry, Registry};
pub use store::{KubeStore, ListRequest, ResourceStore};
pub use strategy::{Strategy, StrategyFn};
pub use types::{ResourceKey, TypeIdentifier};
