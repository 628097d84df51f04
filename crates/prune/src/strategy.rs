//! # Selection Strategies
//!
//! A strategy receives the candidates that survived the prunability filter and
//! returns the subset to remove. Built-in strategies are pure: the same
//! candidates (and, for age-based ones, the same clock reading) always yield
//! the same selection.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kube::api::DynamicObject;

use crate::duration::parse_duration;
use crate::error::{ConfigError, StrategyError};
use crate::types::{age_timestamp, ResourceKey};

/// Signature of a caller-supplied selection function.
pub type StrategyFn =
    dyn Fn(&[DynamicObject]) -> anyhow::Result<Vec<DynamicObject>> + Send + Sync;

/// Policy deciding which candidates to remove.
#[derive(Clone)]
pub enum Strategy {
    /// Keep at most this many objects, removing the oldest beyond it.
    MaxCount(i64),
    /// Remove objects created more than this long ago (`"3h"`, `"1h30m"`, ...).
    MaxAge(String),
    /// Remove objects created before an absolute point in time.
    OlderThan(DateTime<Utc>),
    /// Delegate selection entirely to a caller-supplied function.
    ///
    /// `None` is a configuration error reported by [`Strategy::validate`].
    Custom(Option<Arc<StrategyFn>>),
}

impl Strategy {
    /// Build a custom strategy from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[DynamicObject]) -> anyhow::Result<Vec<DynamicObject>> + Send + Sync + 'static,
    {
        Strategy::Custom(Some(Arc::new(f)))
    }

    /// Short name used in logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Strategy::MaxCount(_) => "maxCount",
            Strategy::MaxAge(_) => "maxAge",
            Strategy::OlderThan(_) => "olderThan",
            Strategy::Custom(_) => "custom",
        }
    }

    /// Check the strategy settings without touching any candidates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Strategy::MaxCount(count) if *count < 0 => {
                Err(ConfigError::NegativeMaxCount { count: *count })
            }
            Strategy::MaxAge(value) => parse_max_age(value).map(|_| ()),
            Strategy::Custom(None) => Err(ConfigError::MissingCustomStrategy),
            _ => Ok(()),
        }
    }

    /// Select the candidates to remove.
    ///
    /// `now` is only consulted by [`Strategy::MaxAge`].
    pub fn select(
        &self,
        candidates: &[DynamicObject],
        now: DateTime<Utc>,
    ) -> Result<Vec<DynamicObject>, StrategyError> {
        match self {
            Strategy::MaxCount(count) => select_by_max_count(candidates, *count),
            Strategy::MaxAge(value) => select_by_max_age(candidates, value, now),
            Strategy::OlderThan(cutoff) => Ok(select_older_than(candidates, *cutoff)),
            Strategy::Custom(Some(f)) => f(candidates).map_err(StrategyError::Custom),
            Strategy::Custom(None) => Err(ConfigError::MissingCustomStrategy.into()),
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::MaxCount(count) => f.debug_tuple("MaxCount").field(count).finish(),
            Strategy::MaxAge(value) => f.debug_tuple("MaxAge").field(value).finish(),
            Strategy::OlderThan(cutoff) => f.debug_tuple("OlderThan").field(cutoff).finish(),
            Strategy::Custom(func) => f
                .debug_tuple("Custom")
                .field(&func.as_ref().map(|_| "<fn>"))
                .finish(),
        }
    }
}

fn parse_max_age(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidMaxAge {
        value: value.to_string(),
        reason,
    };
    let age = parse_duration(value).map_err(|e| invalid(e.to_string()))?;
    if age < Duration::zero() {
        return Err(invalid("duration must not be negative".to_string()));
    }
    Ok(age)
}

/// Keep the `max_count` newest candidates and select the rest, oldest first.
///
/// Candidates without a creation timestamp count as newest. Equal timestamps
/// are ordered by namespace and name.
pub fn select_by_max_count(
    candidates: &[DynamicObject],
    max_count: i64,
) -> Result<Vec<DynamicObject>, StrategyError> {
    if max_count < 0 {
        return Err(ConfigError::NegativeMaxCount { count: max_count }.into());
    }
    let keep = usize::try_from(max_count).unwrap_or(usize::MAX);
    if candidates.len() <= keep {
        return Ok(Vec::new());
    }

    let mut ordered: Vec<&DynamicObject> = candidates.iter().collect();
    ordered.sort_by_cached_key(|obj| {
        let ts = age_timestamp(obj);
        (ts.is_none(), ts, ResourceKey::of(obj))
    });

    let excess = candidates.len() - keep;
    Ok(ordered.into_iter().take(excess).cloned().collect())
}

/// Select candidates created strictly before `now - max_age`.
pub fn select_by_max_age(
    candidates: &[DynamicObject],
    max_age: &str,
    now: DateTime<Utc>,
) -> Result<Vec<DynamicObject>, StrategyError> {
    let age = parse_max_age(max_age)?;
    Ok(select_older_than(candidates, now - age))
}

/// Select candidates created strictly before `cutoff`, in input order.
pub fn select_older_than(
    candidates: &[DynamicObject],
    cutoff: DateTime<Utc>,
) -> Vec<DynamicObject> {
    candidates
        .iter()
        .filter(|obj| age_timestamp(obj).is_some_and(|ts| ts < cutoff))
        .cloned()
        .collect()
}
