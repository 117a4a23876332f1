use crate::workload::{pod_name, pod_reference};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

/// Reason recorded when a pod is bound
pub const REASON_SCHEDULED: &str = "Scheduled";

/// Reason recorded when no node can host a pod
pub const REASON_FAILED_SCHEDULING: &str = "FailedScheduling";

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

/// An audit record about a scheduling decision for one pod
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Machine-readable reason (Scheduled, FailedScheduling)
    pub reason: String,
    /// Human-readable message
    pub message: String,
    pub event_type: EventType,
    /// Component tag written into the event source
    pub component: String,
    /// The pod the event is about
    pub involved: ObjectReference,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Create a Normal event recording a successful binding
    pub fn scheduled(pod: &Pod, node_name: &str, component: &str) -> Self {
        Self {
            reason: REASON_SCHEDULED.to_string(),
            message: format!("Successfully assigned {} to {}", pod_name(pod), node_name),
            event_type: EventType::Normal,
            component: component.to_string(),
            involved: pod_reference(pod),
            timestamp: Utc::now(),
        }
    }

    /// Create a Warning event listing why every node was rejected
    pub fn failed_scheduling(pod: &Pod, fit_failures: &[String], component: &str) -> Self {
        let mut message = format!("pod ({}) failed to fit on any node", pod_name(pod));
        for failure in fit_failures {
            message.push('\n');
            message.push_str(failure);
        }

        Self {
            reason: REASON_FAILED_SCHEDULING.to_string(),
            message,
            event_type: EventType::Warning,
            component: component.to_string(),
            involved: pod_reference(pod),
            timestamp: Utc::now(),
        }
    }

    /// Namespace the event is recorded in (the involved pod's)
    pub fn namespace(&self) -> &str {
        self.involved
            .namespace
            .as_deref()
            .unwrap_or(crate::DEFAULT_NAMESPACE)
    }

    /// Convert to the control-plane Event object
    pub fn to_event(&self) -> Event {
        let pod_name = self.involved.name.as_deref().unwrap_or("pod");
        let time = Time(self.timestamp);

        Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-", pod_name)),
                namespace: Some(self.namespace().to_string()),
                ..Default::default()
            },
            count: Some(1),
            first_timestamp: Some(time.clone()),
            last_timestamp: Some(time),
            involved_object: self.involved.clone(),
            message: Some(self.message.clone()),
            reason: Some(self.reason.clone()),
            source: Some(EventSource {
                component: Some(self.component.clone()),
                host: None,
            }),
            type_: Some(self.event_type.as_str().to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pod() -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some("nginx".to_string());
        pod.metadata.namespace = Some("web".to_string());
        pod.metadata.uid = Some("uid-1".to_string());
        pod
    }

    #[test]
    fn test_scheduled_event() {
        let event = AuditEvent::scheduled(&test_pod(), "node2", "pricefit-scheduler");
        assert_eq!(event.reason, "Scheduled");
        assert_eq!(event.event_type, EventType::Normal);
        assert_eq!(event.message, "Successfully assigned nginx to node2");
        assert_eq!(event.namespace(), "web");
    }

    #[test]
    fn test_failed_scheduling_lists_rejections() {
        let failures = vec![
            "fit failure on node (node1): Insufficient CPU".to_string(),
            "fit failure on node (node2): Insufficient CPU".to_string(),
        ];
        let event = AuditEvent::failed_scheduling(&test_pod(), &failures, "pricefit-scheduler");
        assert_eq!(event.reason, "FailedScheduling");
        assert_eq!(event.event_type, EventType::Warning);
        assert_eq!(
            event.message,
            "pod (nginx) failed to fit on any node\n\
             fit failure on node (node1): Insufficient CPU\n\
             fit failure on node (node2): Insufficient CPU"
        );
    }

    #[test]
    fn test_to_event() {
        let event = AuditEvent::scheduled(&test_pod(), "node2", "pricefit-scheduler").to_event();
        assert_eq!(event.metadata.generate_name.as_deref(), Some("nginx-"));
        assert_eq!(event.metadata.namespace.as_deref(), Some("web"));
        assert_eq!(event.count, Some(1));
        assert_eq!(event.first_timestamp, event.last_timestamp);
        assert_eq!(event.type_.as_deref(), Some("Normal"));
        assert_eq!(
            event.source.and_then(|s| s.component).as_deref(),
            Some("pricefit-scheduler")
        );
        assert_eq!(event.involved_object.kind.as_deref(), Some("Pod"));
        assert_eq!(event.involved_object.uid.as_deref(), Some("uid-1"));
    }
}
