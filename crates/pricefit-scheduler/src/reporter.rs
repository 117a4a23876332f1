use crate::traits::ControlPlane;
use pricefit_core::AuditEvent;
use std::sync::Arc;
use tracing::{debug, warn};

/// Posts audit events to the control plane on a best-effort basis
pub struct EventReporter {
    control_plane: Arc<dyn ControlPlane>,
    component: String,
}

impl EventReporter {
    pub fn new(control_plane: Arc<dyn ControlPlane>, component: impl Into<String>) -> Self {
        Self {
            control_plane,
            component: component.into(),
        }
    }

    /// Component tag stamped on every event this reporter builds
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Submit one event. Failures are logged and dropped.
    pub async fn report(&self, event: &AuditEvent) {
        let involved = event.involved.name.as_deref().unwrap_or("<unknown>");

        match self
            .control_plane
            .create_event(event.namespace(), &event.to_event())
            .await
        {
            Ok(()) => debug!(
                reason = %event.reason,
                pod = %involved,
                "Recorded event"
            ),
            Err(e) => warn!(
                reason = %event.reason,
                pod = %involved,
                error = %e,
                "Failed to record event, dropping it"
            ),
        }
    }
}
