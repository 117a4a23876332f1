use crate::error::Result;
use crate::traits::ControlPlane;
use crate::types::ClusterSnapshot;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Fetches the node list and running-pod list for one decision
pub struct NodeInventory {
    control_plane: Arc<dyn ControlPlane>,
}

impl NodeInventory {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Take a fresh snapshot. Nothing is reused from earlier calls.
    pub async fn snapshot(&self) -> Result<ClusterSnapshot> {
        let taken_at = Utc::now();
        let nodes = self.control_plane.list_nodes().await?;
        let running_pods = self.control_plane.list_running_pods().await?;

        debug!(
            nodes = nodes.len(),
            running_pods = running_pods.len(),
            "Took cluster snapshot"
        );

        Ok(ClusterSnapshot::new(nodes, running_pods, taken_at))
    }
}
