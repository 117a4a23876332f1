use crate::workload::assigned_node;
use crate::SCHEDULER_NAME_ANNOTATION;
use k8s_openapi::api::core::v1::Pod;

/// Selects the pending pods a named scheduler is responsible for
#[derive(Debug, Clone)]
pub struct Admission {
    scheduler_name: String,
}

impl Admission {
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }

    /// Whether the pod names this scheduler, by annotation or `spec.schedulerName`
    pub fn is_responsible_for(&self, pod: &Pod) -> bool {
        let by_annotation = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(SCHEDULER_NAME_ANNOTATION))
            .is_some_and(|name| *name == self.scheduler_name);

        let by_spec = pod
            .spec
            .as_ref()
            .and_then(|s| s.scheduler_name.as_deref())
            .is_some_and(|name| name == self.scheduler_name);

        by_annotation || by_spec
    }

    /// Whether the pod names this scheduler and is not yet bound
    pub fn admits(&self, pod: &Pod) -> bool {
        assigned_node(pod).is_none() && self.is_responsible_for(pod)
    }
}
