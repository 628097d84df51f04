//! Built-in prunability predicates for Pods and Jobs.

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;

use crate::error::{PredicateError, Unprunable};
use crate::types::ResourceKey;

/// Pod phase that marks a pod as safe to remove
pub const POD_PHASE_SUCCEEDED: &str = "Succeeded";

fn key(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> ResourceKey {
    ResourceKey::new(meta.namespace.as_deref(), meta.name.clone().unwrap_or_default())
}

/// A Pod is prunable only once its phase is `Succeeded`.
pub fn pod_is_prunable(pod: &Pod) -> Result<(), PredicateError> {
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    if phase == Some(POD_PHASE_SUCCEEDED) {
        Ok(())
    } else {
        Err(Unprunable::new(key(&pod.metadata), "Pod has not succeeded").into())
    }
}

/// A Job is prunable only once it records a completion time.
pub fn job_is_prunable(job: &Job) -> Result<(), PredicateError> {
    let completed = job
        .status
        .as_ref()
        .is_some_and(|s| s.completion_time.is_some());
    if completed {
        Ok(())
    } else {
        Err(Unprunable::new(key(&job.metadata), "Job has not completed").into())
    }
}
