use crate::binder::Binder;
use crate::filter::FitFilter;
use crate::inventory::NodeInventory;
use crate::price::PriceSelector;
use crate::reporter::EventReporter;
use crate::traits::ControlPlane;
use crate::watcher::{IngestStrategy, Watcher, WatcherChannels};
use crate::{Result, SchedulerError};
use k8s_openapi::api::core::v1::Pod;
use pricefit_core::{
    node_name, pod_name, pod_namespace, Admission, DEFAULT_COST_ANNOTATION,
    DEFAULT_SCHEDULER_NAME,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Name pods use to ask for this scheduler
    pub scheduler_name: String,
    /// Node annotation holding the cost tag
    pub cost_annotation: String,
    /// Component stamped on emitted events
    pub component: String,
    /// How pending pods are ingested
    pub ingest: IngestStrategy,
}

impl SchedulerConfig {
    /// Configuration for the given scheduler name with default settings otherwise
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        let scheduler_name = scheduler_name.into();
        Self {
            component: format!("{}-scheduler", scheduler_name),
            scheduler_name,
            cost_annotation: DEFAULT_COST_ANNOTATION.to_string(),
            ingest: IngestStrategy::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEDULER_NAME)
    }
}

/// Pod scheduler
///
/// Decisions are made one pod at a time: a fresh snapshot, the fit filter,
/// the price selector, then the binding. A failed decision is logged and the
/// loop moves on to the next pod.
pub struct Scheduler {
    control_plane: Arc<dyn ControlPlane>,
    config: SchedulerConfig,
    inventory: NodeInventory,
    fit_filter: FitFilter,
    price_selector: PriceSelector,
    binder: Binder,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: SchedulerConfig) -> Self {
        let reporter = Arc::new(EventReporter::new(
            control_plane.clone(),
            config.component.clone(),
        ));

        Self {
            inventory: NodeInventory::new(control_plane.clone()),
            fit_filter: FitFilter::new(reporter.clone()),
            price_selector: PriceSelector::new(config.cost_annotation.clone()),
            binder: Binder::new(control_plane.clone(), reporter),
            control_plane,
            config,
        }
    }

    /// Run the scheduler loop until `token` is cancelled.
    ///
    /// A decision already under way when the token fires is finished before
    /// the loop exits.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting scheduler '{}' ({:?})",
            self.config.scheduler_name, self.config.ingest
        );

        let source = self.config.ingest.build_source(self.control_plane.clone());
        let admission = Admission::new(self.config.scheduler_name.clone());
        let watcher_token = token.child_token();
        let WatcherChannels {
            mut pods,
            mut errors,
            handle,
        } = Watcher::new(source, admission).spawn(watcher_token.clone());

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                Some(err) = errors.recv() => {
                    warn!("Pod ingestion error: {}", err);
                }
                pod = pods.recv() => match pod {
                    Some(pod) => self.process(&pod).await,
                    None => {
                        warn!("Watcher stopped unexpectedly");
                        break;
                    }
                },
            }
        }

        watcher_token.cancel();
        drop(pods);
        handle
            .await
            .map_err(|e| SchedulerError::internal_error(format!("Watcher task failed: {}", e)))?;

        info!("Scheduler stopped");
        Ok(())
    }

    /// Make and commit one placement decision, returning the chosen node
    pub async fn schedule_pod(&self, pod: &Pod) -> Result<String> {
        debug!("Scheduling pod {}/{}", pod_namespace(pod), pod_name(pod));

        let snapshot = self.inventory.snapshot().await?;
        let candidates = self.fit_filter.filter(pod, &snapshot).await?;
        let selected = self.price_selector.select(&candidates)?;
        let node = node_name(selected.node).to_string();

        if selected.annotated {
            debug!("Cheapest candidate is {} at {}", node, selected.cost);
        } else {
            debug!(
                "No candidate carries {}, using first candidate {}",
                self.price_selector.annotation_key(),
                node
            );
        }

        self.binder.bind(pod, &node).await?;
        Ok(node)
    }

    async fn process(&self, pod: &Pod) {
        let namespace = pod_namespace(pod);
        let name = pod_name(pod);

        match self.schedule_pod(pod).await {
            Ok(node) => info!("Scheduled pod {}/{} to node {}", namespace, name, node),
            Err(e) if e.is_fit_failure() => {
                warn!("Pod {}/{} is unschedulable: {}", namespace, name, e)
            }
            Err(e) => error!("Failed to schedule pod {}/{}: {}", namespace, name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockControlPlane;
    use crate::test_support::{create_test_node, create_test_pod};
    use pricefit_core::{WatchEvent, DEFAULT_COST_ANNOTATION};
    use std::time::Duration;

    fn scheduler(mock: &Arc<MockControlPlane>) -> Scheduler {
        let config = SchedulerConfig {
            ingest: IngestStrategy::Watch {
                reconnect_backoff: Duration::from_millis(10),
            },
            ..Default::default()
        };
        Scheduler::new(mock.clone(), config)
    }

    fn event_reasons(events: &[k8s_openapi::api::core::v1::Event]) -> Vec<String> {
        events.iter().filter_map(|e| e.reason.clone()).collect()
    }

    async fn wait_for_bindings(mock: &MockControlPlane, count: usize) {
        for _ in 0..500 {
            if mock.bindings().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} bindings", count);
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.scheduler_name, "pricefit");
        assert_eq!(config.cost_annotation, DEFAULT_COST_ANNOTATION);
        assert_eq!(config.component, "pricefit-scheduler");
        assert!(matches!(config.ingest, IngestStrategy::Watch { .. }));
    }

    #[tokio::test]
    async fn test_cheapest_fitting_node_is_bound() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "2000m", Some("0.10"))).await;
        mock.add_node(create_test_node("node2", "2000m", Some("0.05"))).await;
        let pod = create_test_pod("web", &["500m"], None);
        mock.add_pending_pod(pod.clone()).await;

        let node = scheduler(&mock).schedule_pod(&pod).await.unwrap();
        assert_eq!(node, "node2");

        let bindings = mock.bindings().await;
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, "default");
        assert_eq!(bindings[0].1.target.name.as_deref(), Some("node2"));
        assert_eq!(event_reasons(&mock.events().await), vec!["Scheduled"]);
    }

    #[tokio::test]
    async fn test_no_fit_reports_failed_scheduling() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "400m", Some("0.10"))).await;
        let pod = create_test_pod("web", &["500m"], None);

        let err = scheduler(&mock).schedule_pod(&pod).await.unwrap_err();
        assert!(err.is_fit_failure());
        assert!(mock.bindings().await.is_empty());

        let events = mock.events().await;
        assert_eq!(event_reasons(&events), vec!["FailedScheduling"]);
        let message = events[0].message.clone().unwrap();
        assert!(message.starts_with("pod (web) failed to fit on any node"));
        assert!(message.contains("fit failure on node (node1): Insufficient CPU"));
    }

    #[tokio::test]
    async fn test_unpriced_candidates_fall_back_to_first() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "2000m", None)).await;
        mock.add_node(create_test_node("node2", "2000m", None)).await;
        let pod = create_test_pod("web", &["500m"], None);

        let node = scheduler(&mock).schedule_pod(&pod).await.unwrap();
        assert_eq!(node, "node1");
    }

    #[tokio::test]
    async fn test_whole_core_requests_are_not_counted() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "1", Some("0.10"))).await;
        // Would fill the node if whole cores were counted
        mock.add_running_pod(create_test_pod("batch", &["1"], Some("node1")))
            .await;
        let pod = create_test_pod("web", &["2", "200m"], None);

        let node = scheduler(&mock).schedule_pod(&pod).await.unwrap();
        assert_eq!(node, "node1");
    }

    #[tokio::test]
    async fn test_malformed_cost_aborts_decision() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "2000m", Some("0.10"))).await;
        mock.add_node(create_test_node("node2", "2000m", Some("cheap"))).await;
        let pod = create_test_pod("web", &["500m"], None);

        let err = scheduler(&mock).schedule_pod(&pod).await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCost { .. }));
        assert!(mock.bindings().await.is_empty());
        assert!(mock.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_binding_emits_no_event() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "2000m", Some("0.10"))).await;
        mock.fail_bindings_with(409).await;
        let pod = create_test_pod("web", &["500m"], None);

        let err = scheduler(&mock).schedule_pod(&pod).await.unwrap_err();
        assert!(matches!(err, SchedulerError::BindingFailed { status: 409, .. }));
        assert!(mock.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_control_plane_fails_decision() {
        let mock = Arc::new(MockControlPlane::new());
        mock.set_unreachable(true).await;
        let pod = create_test_pod("web", &["500m"], None);

        let err = scheduler(&mock).schedule_pod(&pod).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_failed_decisions() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "1000m", Some("0.10"))).await;

        let big = create_test_pod("big", &["4000m"], None);
        let small = create_test_pod("small", &["100m"], None);
        mock.add_pending_pod(big.clone()).await;
        mock.add_pending_pod(small.clone()).await;
        mock.push_watch_connection(vec![
            Ok(WatchEvent::added(serde_json::to_value(&big).unwrap())),
            Err(SchedulerError::transport("watch pods", "connection reset")),
        ])
        .await;
        mock.push_watch_connection(vec![Ok(WatchEvent::added(
            serde_json::to_value(&small).unwrap(),
        ))])
        .await;

        let scheduler = Arc::new(scheduler(&mock));
        let token = CancellationToken::new();
        let task = {
            let scheduler = scheduler.clone();
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        wait_for_bindings(&mock, 1).await;
        token.cancel();
        task.await.unwrap().unwrap();

        let bindings = mock.bindings().await;
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].1.metadata.name.as_deref(), Some("small"));
        assert_eq!(
            event_reasons(&mock.events().await),
            vec!["FailedScheduling", "Scheduled"]
        );
    }

    #[tokio::test]
    async fn test_run_finishes_decision_in_flight_at_cancel() {
        let mock = Arc::new(MockControlPlane::new());
        mock.add_node(create_test_node("node1", "1000m", Some("0.10"))).await;
        mock.delay_bindings(Duration::from_millis(200)).await;

        let pod = create_test_pod("web", &["100m"], None);
        mock.add_pending_pod(pod.clone()).await;
        mock.push_watch_connection(vec![Ok(WatchEvent::added(
            serde_json::to_value(&pod).unwrap(),
        ))])
        .await;

        let scheduler = Arc::new(scheduler(&mock));
        let token = CancellationToken::new();
        let task = {
            let scheduler = scheduler.clone();
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        for _ in 0..500 {
            if mock.binding_attempts().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(mock.binding_attempts().await, 1);
        assert!(mock.bindings().await.is_empty());

        token.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(mock.bindings().await.len(), 1);
        assert_eq!(event_reasons(&mock.events().await), vec!["Scheduled"]);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mock = Arc::new(MockControlPlane::new());
        let scheduler = scheduler(&mock);
        let token = CancellationToken::new();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(token))
            .await
            .unwrap()
            .unwrap();
    }
}
