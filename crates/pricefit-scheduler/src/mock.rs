use crate::error::{Result, SchedulerError};
use crate::traits::{ControlPlane, WatchStream};
use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use pricefit_core::{assigned_node, pod_name, pod_namespace, WatchEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    running_pods: Vec<Pod>,
    pending_pods: Vec<Pod>,
    watch_connections: VecDeque<Vec<Result<WatchEvent>>>,
    watch_opens: usize,
    bindings: Vec<(String, Binding)>,
    events: Vec<Event>,
    binding_status: Option<u16>,
    binding_delay: Option<Duration>,
    binding_attempts: usize,
    event_status: Option<u16>,
    unreachable: bool,
}

/// In-memory control plane for tests and local experiments
///
/// Holds nodes and pods in memory and records every binding and event it
/// receives. A successful binding moves the pod from the pending list to the
/// running list, so later decisions see its CPU usage. Binding a pod that is
/// already bound fails with 409, as a real API server does.
///
/// Each call to `watch_pending_pods` consumes one scripted connection; when
/// none are left the watch stays open without yielding anything.
#[derive(Clone, Default)]
pub struct MockControlPlane {
    state: Arc<RwLock<MockState>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_node(&self, node: Node) {
        self.state.write().await.nodes.push(node);
    }

    pub async fn add_running_pod(&self, pod: Pod) {
        self.state.write().await.running_pods.push(pod);
    }

    pub async fn add_pending_pod(&self, pod: Pod) {
        self.state.write().await.pending_pods.push(pod);
    }

    /// Drop a pending pod, e.g. because it was deleted
    pub async fn remove_pending_pod(&self, name: &str) {
        self.state
            .write()
            .await
            .pending_pods
            .retain(|p| pod_name(p) != name);
    }

    /// Script the notifications delivered by the next watch connection
    pub async fn push_watch_connection(&self, events: Vec<Result<WatchEvent>>) {
        self.state.write().await.watch_connections.push_back(events);
    }

    /// Answer every binding with the given non-success status
    pub async fn fail_bindings_with(&self, status: u16) {
        self.state.write().await.binding_status = Some(status);
    }

    /// Hold every binding request for `delay` before answering it
    pub async fn delay_bindings(&self, delay: Duration) {
        self.state.write().await.binding_delay = Some(delay);
    }

    /// Answer every event creation with the given non-success status
    pub async fn fail_events_with(&self, status: u16) {
        self.state.write().await.event_status = Some(status);
    }

    /// Make every call fail as if the control plane could not be reached
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    /// Bindings accepted so far, with the namespace they were posted to
    pub async fn bindings(&self) -> Vec<(String, Binding)> {
        self.state.read().await.bindings.clone()
    }

    /// Binding requests received so far, including ones still in flight
    pub async fn binding_attempts(&self) -> usize {
        self.state.read().await.binding_attempts
    }

    /// Events accepted so far
    pub async fn events(&self) -> Vec<Event> {
        self.state.read().await.events.clone()
    }

    /// Number of watch connections opened so far
    pub async fn watch_opens(&self) -> usize {
        self.state.read().await.watch_opens
    }

    async fn ensure_reachable(&self, operation: &str) -> Result<()> {
        if self.state.read().await.unreachable {
            return Err(SchedulerError::transport(operation, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.ensure_reachable("list nodes").await?;
        Ok(self.state.read().await.nodes.clone())
    }

    async fn list_running_pods(&self) -> Result<Vec<Pod>> {
        self.ensure_reachable("list running pods").await?;
        Ok(self.state.read().await.running_pods.clone())
    }

    async fn list_pending_pods(&self) -> Result<Vec<Pod>> {
        self.ensure_reachable("list pending pods").await?;
        Ok(self.state.read().await.pending_pods.clone())
    }

    async fn watch_pending_pods(&self) -> Result<WatchStream> {
        self.ensure_reachable("watch pods").await?;

        let mut state = self.state.write().await;
        state.watch_opens += 1;

        match state.watch_connections.pop_front() {
            Some(events) => Ok(stream::iter(events).boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn create_binding(&self, namespace: &str, binding: &Binding) -> Result<()> {
        self.ensure_reachable("create binding").await?;

        let pod = binding
            .metadata
            .name
            .clone()
            .ok_or_else(|| SchedulerError::internal_error("Binding has no pod name"))?;
        let node = binding.target.name.clone().unwrap_or_default();

        let delay = {
            let mut state = self.state.write().await;
            state.binding_attempts += 1;
            state.binding_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;

        if let Some(status) = state.binding_status {
            return Err(SchedulerError::binding_failed(pod, node, status, "injected failure"));
        }

        let same_pod = |p: &Pod| pod_name(p) == pod && pod_namespace(p) == namespace;

        if let Some(bound) = state.running_pods.iter().find(|p| same_pod(*p)) {
            let current = assigned_node(bound).unwrap_or_default().to_string();
            return Err(SchedulerError::binding_failed(
                pod.clone(),
                node,
                409,
                format!("pod {} is already assigned to node {}", pod, current),
            ));
        }

        if let Some(index) = state.pending_pods.iter().position(|p| same_pod(p)) {
            let mut bound = state.pending_pods.remove(index);
            if let Some(spec) = bound.spec.as_mut() {
                spec.node_name = Some(node.clone());
            }
            state.running_pods.push(bound);
        }

        debug!("Mock: bound {}/{} to {}", namespace, pod, node);
        state.bindings.push((namespace.to_string(), binding.clone()));
        Ok(())
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()> {
        self.ensure_reachable("create event").await?;

        let mut state = self.state.write().await;
        if let Some(status) = state.event_status {
            return Err(SchedulerError::unexpected_status(
                "create event",
                status,
                "injected failure",
            ));
        }

        let mut recorded = event.clone();
        recorded.metadata.namespace = Some(namespace.to_string());
        state.events.push(recorded);
        Ok(())
    }
}
