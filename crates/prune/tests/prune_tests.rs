//! End-to-end pruning passes against an in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use kube::core::{ApiResource, GroupVersionKind};
use prune::{
    ConfigError, ListRequest, PredicateError, PruneError, Pruner, PrunerConfig, Registry,
    ResourceKey, ResourceStore, StoreError, Strategy, TypeIdentifier, Unprunable,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Store holding a fixed object list and recording every call
#[derive(Default)]
struct FakeStore {
    objects: Vec<DynamicObject>,
    list_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    fail_delete_on: Option<String>,
    cancel_after_first_delete: Option<CancellationToken>,
}

impl FakeStore {
    fn with(objects: Vec<DynamicObject>) -> Arc<Self> {
        Arc::new(Self {
            objects,
            ..Default::default()
        })
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn list(&self, request: &ListRequest) -> Result<Vec<DynamicObject>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .iter()
            .filter(|o| {
                request
                    .namespace
                    .as_deref()
                    .map_or(true, |ns| o.metadata.namespace.as_deref() == Some(ns))
            })
            .cloned()
            .collect())
    }

    async fn delete(
        &self,
        _type_id: &TypeIdentifier,
        obj: &DynamicObject,
    ) -> Result<(), StoreError> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        if self.fail_delete_on.as_deref() == Some(name.as_str()) {
            return Err(anyhow::anyhow!("delete of {name} rejected").into());
        }
        let mut deleted = self.deleted.lock().unwrap();
        deleted.push(name);
        if let Some(token) = &self.cancel_after_first_delete {
            token.cancel();
        }
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn new_object(type_id: &TypeIdentifier, name: &str, created: DateTime<Utc>) -> DynamicObject {
    let resource = ApiResource::from_gvk(&GroupVersionKind::from(type_id));
    let mut obj = DynamicObject::new(name, &resource).within("default");
    // List responses omit per-item type metadata
    obj.types = None;
    obj.metadata.creation_timestamp = Some(Time(created));
    obj
}

fn completed_job(name: &str, age: Duration) -> DynamicObject {
    let finished = now() - age;
    let mut obj = new_object(&TypeIdentifier::job(), name, finished);
    obj.data = json!({
        "status": {
            "succeeded": 1,
            "completionTime": finished.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    });
    obj
}

fn pod(name: &str, phase: &str, age: Duration) -> DynamicObject {
    let mut obj = new_object(&TypeIdentifier::pod(), name, now() - age);
    obj.data = json!({"status": {"phase": phase}});
    obj
}

fn scenario_jobs() -> Vec<DynamicObject> {
    vec![
        completed_job("j0", Duration::zero()),
        completed_job("j1", Duration::hours(2)),
        completed_job("j2", Duration::hours(4)),
    ]
}

fn names(objs: &[DynamicObject]) -> Vec<String> {
    let mut names: Vec<String> = objs
        .iter()
        .filter_map(|o| o.metadata.name.clone())
        .collect();
    names.sort();
    names
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn job_pruner(store: Arc<FakeStore>, strategy: Strategy) -> prune::PrunerBuilder {
    init_tracing();
    Pruner::builder(store, strategy)
        .type_identifier(TypeIdentifier::job())
        .clock(now)
}

#[tokio::test]
async fn test_scenario_a_max_count_keeps_newest() {
    let store = FakeStore::with(scenario_jobs());
    let pruner = job_pruner(store.clone(), Strategy::MaxCount(1))
        .build()
        .unwrap();

    let removed = pruner.prune().await.unwrap();

    assert_eq!(names(&removed), vec!["j1", "j2"]);
    assert_eq!(store.deleted(), vec!["j2", "j1"]);
}

#[tokio::test]
async fn test_scenario_b_max_age() {
    let store = FakeStore::with(scenario_jobs());
    let pruner = job_pruner(store.clone(), Strategy::MaxAge("3h".to_string()))
        .build()
        .unwrap();

    let removed = pruner.prune().await.unwrap();

    assert_eq!(names(&removed), vec!["j2"]);
    assert_eq!(store.deleted(), vec!["j2"]);
}

#[tokio::test]
async fn test_scenario_c_running_pod_is_never_selected() {
    let store = FakeStore::with(vec![
        pod("runner", "Running", Duration::hours(48)),
        pod("done", "Succeeded", Duration::hours(1)),
    ]);

    for strategy in [
        Strategy::MaxCount(0),
        Strategy::MaxAge("0s".to_string()),
        Strategy::custom(|candidates| Ok(candidates.to_vec())),
    ] {
        let pruner = Pruner::builder(store.clone(), strategy)
            .clock(now)
            .dry_run(true)
            .build()
            .unwrap();
        let removed = pruner.prune().await.unwrap();
        assert_eq!(names(&removed), vec!["done"]);
    }
}

#[tokio::test]
async fn test_scenario_c_strategy_never_sees_vetoed_pod() {
    let store = FakeStore::with(vec![
        pod("runner", "Running", Duration::hours(48)),
        pod("done", "Succeeded", Duration::hours(1)),
    ]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let pruner = Pruner::builder(store.clone(), Strategy::MaxCount(0))
        .custom_strategy(move |candidates| {
            recorder.lock().unwrap().extend(names(candidates));
            Ok(Vec::new())
        })
        .build()
        .unwrap();

    assert!(pruner.prune().await.unwrap().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec!["done"]);
}

#[tokio::test]
async fn test_scenario_d_custom_without_function() {
    let store = FakeStore::with(scenario_jobs());

    let err = job_pruner(store.clone(), Strategy::Custom(None))
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::MissingCustomStrategy);

    let config = PrunerConfig::from_yaml_str(
        "typeIdentifier: {group: batch, version: v1, kind: Job}\nstrategy:\n  mode: custom\n",
    )
    .unwrap();
    let err = config.into_builder(store.clone()).build().unwrap_err();
    assert_eq!(err, ConfigError::MissingCustomStrategy);

    assert_eq!(store.list_calls(), 0);
    assert!(store.deleted().is_empty());
}

#[tokio::test]
async fn test_p1_count_invariant() {
    let objects: Vec<_> = (0..7)
        .map(|i| completed_job(&format!("job-{i}"), Duration::minutes(10 * i)))
        .collect();

    for max_count in 0..=8_i64 {
        let store = FakeStore::with(objects.clone());
        let pruner = job_pruner(store, Strategy::MaxCount(max_count))
            .dry_run(true)
            .build()
            .unwrap();
        let removed = pruner.prune().await.unwrap();

        let keep = usize::try_from(max_count).unwrap();
        let expected = objects.len().saturating_sub(keep);
        assert_eq!(removed.len(), expected, "max_count={max_count}");

        // Oldest are job-6, job-5, ... in that order
        let oldest: Vec<String> = (0..7)
            .rev()
            .take(expected)
            .map(|i| format!("job-{i}"))
            .collect();
        let removed_names: Vec<String> = removed
            .iter()
            .filter_map(|o| o.metadata.name.clone())
            .collect();
        assert_eq!(removed_names, oldest, "max_count={max_count}");
    }
}

#[tokio::test]
async fn test_p2_age_boundary_is_open() {
    let store = FakeStore::with(vec![
        completed_job("exact", Duration::hours(1)),
        completed_job("older", Duration::hours(1) + Duration::milliseconds(1)),
        completed_job("newer", Duration::minutes(59)),
    ]);
    let pruner = job_pruner(store, Strategy::MaxAge("1h".to_string()))
        .dry_run(true)
        .build()
        .unwrap();

    let removed = pruner.prune().await.unwrap();
    assert_eq!(names(&removed), vec!["older"]);
}

#[tokio::test]
async fn test_p3_unregistered_type_is_always_prunable() {
    let widget = TypeIdentifier::new("example.com", "v1alpha1", "Widget");
    let mut obj = new_object(&widget, "w", now() - Duration::hours(1));
    obj.data = json!({"status": {"phase": "Running"}});
    let store = FakeStore::with(vec![obj]);

    let pruner = Pruner::builder(store.clone(), Strategy::MaxCount(0))
        .type_identifier(widget)
        .build()
        .unwrap();

    let removed = pruner.prune().await.unwrap();
    assert_eq!(names(&removed), vec!["w"]);
    assert_eq!(store.deleted(), vec!["w"]);
}

#[tokio::test]
async fn test_p4_vetoed_resource_is_skipped() {
    let mut unfinished =
        new_object(&TypeIdentifier::job(), "unfinished", now() - Duration::hours(9));
    unfinished.data = json!({"status": {"active": 1}});

    let mut objects = scenario_jobs();
    objects.push(unfinished);
    let store = FakeStore::with(objects);

    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .build()
        .unwrap();
    let removed = pruner.prune().await.unwrap();

    assert_eq!(names(&removed), vec!["j0", "j1", "j2"]);
    assert!(!store.deleted().contains(&"unfinished".to_string()));
}

#[tokio::test]
async fn test_p5_dry_run_matches_real_run_without_deleting() {
    let dry_store = FakeStore::with(scenario_jobs());
    let dry = job_pruner(dry_store.clone(), Strategy::MaxCount(1))
        .dry_run(true)
        .build()
        .unwrap();
    assert!(dry.is_dry_run());
    let selected = dry.prune().await.unwrap();

    let real_store = FakeStore::with(scenario_jobs());
    let real = job_pruner(real_store.clone(), Strategy::MaxCount(1))
        .build()
        .unwrap();
    let removed = real.prune().await.unwrap();

    assert_eq!(names(&selected), names(&removed));
    assert!(dry_store.deleted().is_empty());
    assert_eq!(real_store.deleted().len(), 2);
}

#[tokio::test]
async fn test_p6_predicate_error_aborts_without_deleting() {
    let store = FakeStore::with(scenario_jobs());
    let mut registry = Registry::new();
    registry.register_dynamic(TypeIdentifier::job(), |obj| {
        if obj.metadata.name.as_deref() == Some("j1") {
            Err(anyhow::anyhow!("owner lookup failed").into())
        } else {
            Ok(())
        }
    });

    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .registry(Arc::new(registry))
        .build()
        .unwrap();
    let err = pruner.prune().await.unwrap_err();

    match err {
        PruneError::Predicate { resource, source } => {
            assert_eq!(resource, ResourceKey::new(Some("default"), "j1"));
            assert!(matches!(source, PredicateError::Other(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.deleted().is_empty());
}

#[tokio::test]
async fn test_p6_strategy_error_aborts_without_deleting() {
    let store = FakeStore::with(scenario_jobs());
    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .custom_strategy(|_| Err(anyhow::anyhow!("quota service unavailable")))
        .build()
        .unwrap();

    let err = pruner.prune().await.unwrap_err();
    assert!(matches!(err, PruneError::Strategy(_)));
    assert!(err.deleted().is_empty());
    assert!(store.deleted().is_empty());
}

#[tokio::test]
async fn test_unprunable_from_typed_registration() {
    let store = FakeStore::with(vec![
        pod("a", "Succeeded", Duration::hours(3)),
        pod("b", "Succeeded", Duration::hours(2)),
    ]);
    let mut registry = Registry::with_default_predicates();
    registry.register(TypeIdentifier::pod(), |p: &k8s_openapi::api::core::v1::Pod| {
        if p.metadata.name.as_deref() == Some("a") {
            return Err(PredicateError::from(Unprunable::new(
                ResourceKey::new(p.metadata.namespace.as_deref(), "a"),
                "still referenced",
            )));
        }
        Ok(())
    });

    let pruner = Pruner::builder(store.clone(), Strategy::MaxCount(0))
        .registry(Arc::new(registry))
        .build()
        .unwrap();

    let removed = pruner.prune().await.unwrap();
    assert_eq!(names(&removed), vec!["b"]);
}

#[tokio::test]
async fn test_partial_deletion_is_not_rolled_back() {
    let store = Arc::new(FakeStore {
        objects: scenario_jobs(),
        fail_delete_on: Some("j1".to_string()),
        ..Default::default()
    });
    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .build()
        .unwrap();

    let err = pruner.prune().await.unwrap_err();
    assert!(matches!(err, PruneError::Delete { .. }));
    assert_eq!(err.deleted(), &[ResourceKey::new(Some("default"), "j2")]);
    assert_eq!(store.deleted(), vec!["j2"]);
}

#[tokio::test]
async fn test_cancellation_stops_remaining_deletions() {
    let token = CancellationToken::new();
    let store = Arc::new(FakeStore {
        objects: scenario_jobs(),
        cancel_after_first_delete: Some(token.clone()),
        ..Default::default()
    });
    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .build()
        .unwrap();

    let err = pruner.prune_with_cancellation(&token).await.unwrap_err();
    assert!(matches!(err, PruneError::Cancelled { .. }));
    assert_eq!(err.deleted().len(), 1);
    assert_eq!(store.deleted(), vec!["j2"]);
}

#[tokio::test]
async fn test_namespace_scope_and_repeat_calls() {
    let mut other = completed_job("elsewhere", Duration::hours(10));
    other.metadata.namespace = Some("other".to_string());
    let mut objects = scenario_jobs();
    objects.push(other);
    let store = FakeStore::with(objects);

    let pruner = job_pruner(store.clone(), Strategy::MaxCount(0))
        .namespace("default")
        .dry_run(true)
        .build()
        .unwrap();

    let first = pruner.prune().await.unwrap();
    let second = pruner.prune().await.unwrap();
    assert_eq!(names(&first), vec!["j0", "j1", "j2"]);
    assert_eq!(names(&first), names(&second));
    assert_eq!(store.list_calls(), 2);
}

#[tokio::test]
async fn test_config_driven_pass() {
    let store = FakeStore::with(scenario_jobs());
    let config = PrunerConfig::from_yaml_str(
        r"
typeIdentifier:
  group: batch
  version: v1
  kind: Job
strategy:
  mode: maxAge
  maxAge: 1h30m
namespace: default
",
    )
    .unwrap();
    config.validate().unwrap();

    let pruner = config.into_builder(store.clone()).clock(now).build().unwrap();
    let removed = pruner.prune().await.unwrap();

    assert_eq!(names(&removed), vec!["j1", "j2"]);
    assert_eq!(store.deleted().len(), 2);
}
