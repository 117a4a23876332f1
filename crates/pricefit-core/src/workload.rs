//! Accessors over pods and nodes that tolerate missing metadata.

use crate::DEFAULT_NAMESPACE;
use k8s_openapi::api::core::v1::{Node, ObjectReference, Pod};

/// Pod name, or `<unknown>` when the pod has none
pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or("<unknown>")
}

/// Pod namespace, falling back to `default`
pub fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE)
}

/// Stable identity used to recognise a pod across list calls
///
/// Prefers the uid; falls back to `namespace/name` when the uid is absent.
pub fn pod_key(pod: &Pod) -> String {
    match pod.metadata.uid.as_deref() {
        Some(uid) if !uid.is_empty() => uid.to_string(),
        _ => format!("{}/{}", pod_namespace(pod), pod_name(pod)),
    }
}

/// Node the pod is bound to, if any
pub fn assigned_node(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// Node name, or `<unknown>` when the node has none
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or("<unknown>")
}

/// Reference to a pod suitable for an event's involved object
pub fn pod_reference(pod: &Pod) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Pod".to_string()),
        name: pod.metadata.name.clone(),
        namespace: Some(pod_namespace(pod).to_string()),
        uid: pod.metadata.uid.clone(),
        ..Default::default()
    }
}
