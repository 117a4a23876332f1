use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use pricefit_core::WatchEvent;

/// Decoded notifications from one watch connection
pub type WatchStream = BoxStream<'static, Result<WatchEvent>>;

/// Trait for the control-plane operations the scheduler consumes
///
/// `ApiClient` talks to a real API server over HTTP. `MockControlPlane`
/// keeps everything in memory for tests.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List every node
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List pods in phase Running
    async fn list_running_pods(&self) -> Result<Vec<Pod>>;

    /// List pods with no node assigned
    async fn list_pending_pods(&self) -> Result<Vec<Pod>>;

    /// Open a watch on pods with no node assigned
    async fn watch_pending_pods(&self) -> Result<WatchStream>;

    /// Create the binding sub-resource of the pod named in `binding.metadata`
    async fn create_binding(&self, namespace: &str, binding: &Binding) -> Result<()>;

    /// Create an event in the given namespace
    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()>;
}
