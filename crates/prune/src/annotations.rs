//! Annotations the pruner honours on individual objects.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Annotation to preserve a resource from pruning
pub const ANNOTATION_PRESERVE: &str = "prune.operator-patterns.dev/preserve";

/// Returns true if pruning should skip the object because it is marked as preserved.
#[must_use]
pub fn is_preserved(meta: &ObjectMeta) -> bool {
    meta.annotations
        .as_ref()
        .and_then(|annotations| annotations.get(ANNOTATION_PRESERVE))
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}
