use crate::error::Result;
use crate::reporter::EventReporter;
use crate::traits::ControlPlane;
use k8s_openapi::api::core::v1::{Binding, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pricefit_core::{pod_name, pod_namespace, AuditEvent};
use std::sync::Arc;
use tracing::info;

/// Build the binding record assigning a pod to a node
pub fn build_binding(pod: &Pod, node_name: &str) -> Binding {
    Binding {
        metadata: ObjectMeta {
            name: pod.metadata.name.clone(),
            namespace: Some(pod_namespace(pod).to_string()),
            ..Default::default()
        },
        target: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(node_name.to_string()),
            ..Default::default()
        },
    }
}

/// Commits a scheduling decision to the control plane
///
/// The write is a single create with no check of the pod's current
/// assignment beforehand; another scheduler racing on the same pod is only
/// stopped by whatever the control plane itself enforces.
pub struct Binder {
    control_plane: Arc<dyn ControlPlane>,
    reporter: Arc<EventReporter>,
}

impl Binder {
    pub fn new(control_plane: Arc<dyn ControlPlane>, reporter: Arc<EventReporter>) -> Self {
        Self {
            control_plane,
            reporter,
        }
    }

    /// Bind the pod to the node, then record a Scheduled event.
    ///
    /// Any outcome other than "created" is returned as an error and not retried.
    pub async fn bind(&self, pod: &Pod, node_name: &str) -> Result<()> {
        let namespace = pod_namespace(pod);
        info!("Binding pod {}/{} to node {}", namespace, pod_name(pod), node_name);

        let binding = build_binding(pod, node_name);
        self.control_plane.create_binding(namespace, &binding).await?;

        self.reporter
            .report(&AuditEvent::scheduled(
                pod,
                node_name,
                self.reporter.component(),
            ))
            .await;

        Ok(())
    }
}
