use crate::error::{Result, SchedulerError};
use crate::reporter::EventReporter;
use crate::types::{ClusterSnapshot, FilterResult, FitReport, SchedulingContext, UsageSnapshot};
use k8s_openapi::api::core::v1::{Node, Pod};
use pricefit_core::{
    allocatable_millicores, assigned_node, node_name, pod_name, requested_millicores, AuditEvent,
    CoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Filter predicate trait
pub trait FilterPredicate: Send + Sync {
    /// Filter a node for the given pod
    fn filter(&self, context: &SchedulingContext, node: &Node) -> Result<FilterResult>;

    /// Name of the filter
    fn name(&self) -> &str;
}

/// Filter on free CPU: a node fits only when its free millicores strictly
/// exceed the pod's requirement
pub struct PodFitsCpu;

impl FilterPredicate for PodFitsCpu {
    fn filter(&self, context: &SchedulingContext, node: &Node) -> Result<FilterResult> {
        let node_name = node_name(node).to_string();

        let allocatable = allocatable_millicores(node)?;
        let used = context.usage.used_on(&node_name);
        let free = allocatable - used;

        debug!(
            "Node {} has {} milli allocatable, {} milli used, {} milli free; pod requires {} milli",
            node_name, allocatable, used, free, context.required_millicores
        );

        // Equal is not enough
        if free > context.required_millicores {
            Ok(FilterResult::pass(node_name))
        } else {
            Ok(FilterResult::fail(node_name, "Insufficient CPU".to_string()))
        }
    }

    fn name(&self) -> &str {
        "PodFitsCpu"
    }
}

/// Get default filter predicates
pub fn default_filters() -> Vec<Box<dyn FilterPredicate>> {
    vec![Box::new(PodFitsCpu)]
}

/// Sum the milli-core requests of running pods per node in the snapshot.
///
/// Pods bound to nodes that are not in the snapshot are ignored.
pub fn compute_usage(snapshot: &ClusterSnapshot) -> Result<UsageSnapshot> {
    let mut used: HashMap<String, i64> = snapshot
        .nodes
        .iter()
        .map(|n| (node_name(n).to_string(), 0))
        .collect();

    for pod in &snapshot.running_pods {
        let Some(node) = assigned_node(pod) else {
            continue;
        };

        match used.get_mut(node) {
            Some(total) => {
                let requested = requested_millicores(pod)?;
                *total = total.checked_add(requested).ok_or_else(|| {
                    CoreError::invalid_quantity(
                        format!("CPU usage on node {}", node),
                        "value out of range",
                    )
                })?;
            }
            None => debug!(
                "Ignoring usage of pod {} on unknown node {}",
                pod_name(pod),
                node
            ),
        }
    }

    Ok(UsageSnapshot::new(used))
}

/// Run every filter over every node of the snapshot
pub fn evaluate(
    pod: &Pod,
    snapshot: &ClusterSnapshot,
    filters: &[Box<dyn FilterPredicate>],
) -> Result<FitReport> {
    let usage = compute_usage(snapshot)?;
    let required_millicores = requested_millicores(pod)?;
    let context = SchedulingContext::new(pod.clone(), required_millicores, usage);

    let mut candidates = Vec::new();
    let mut rejections = Vec::new();

    'nodes: for node in &snapshot.nodes {
        for filter in filters {
            let result = filter.filter(&context, node)?;
            if !result.passed {
                debug!(
                    "Node {} filtered out by {}: {}",
                    result.node_name,
                    filter.name(),
                    result.reason.as_deref().unwrap_or_default()
                );
                rejections.push(result);
                continue 'nodes;
            }
        }
        candidates.push(node.clone());
    }

    Ok(FitReport {
        candidates,
        rejections,
        required_millicores,
    })
}

/// Narrows the node list to those able to host a pod, reporting when none can
pub struct FitFilter {
    filters: Vec<Box<dyn FilterPredicate>>,
    reporter: Arc<EventReporter>,
}

impl FitFilter {
    pub fn new(reporter: Arc<EventReporter>) -> Self {
        Self {
            filters: default_filters(),
            reporter,
        }
    }

    /// Candidate nodes for the pod, in snapshot order.
    ///
    /// With no candidates a FailedScheduling event is emitted and
    /// `SchedulerError::NoSuitableNodes` returned.
    pub async fn filter(&self, pod: &Pod, snapshot: &ClusterSnapshot) -> Result<Vec<Node>> {
        let report = evaluate(pod, snapshot, &self.filters)?;

        if !report.candidates.is_empty() {
            debug!(
                "Pod {} has {} candidate nodes",
                pod_name(pod),
                report.candidates.len()
            );
            return Ok(report.candidates);
        }

        let failures = report.fit_failures();
        self.reporter
            .report(&AuditEvent::failed_scheduling(
                pod,
                &failures,
                self.reporter.component(),
            ))
            .await;

        let reason = if failures.is_empty() {
            "No nodes in the cluster".to_string()
        } else {
            failures.join("; ")
        };
        Err(SchedulerError::no_suitable_nodes(pod_name(pod), reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockControlPlane;
    use crate::test_support::{create_test_node, create_test_pod};
    use chrono::Utc;

    fn snapshot(nodes: Vec<Node>, running_pods: Vec<Pod>) -> ClusterSnapshot {
        ClusterSnapshot::new(nodes, running_pods, Utc::now())
    }

    fn candidate_names(report: &FitReport) -> Vec<&str> {
        report.candidates.iter().map(node_name).collect()
    }

    #[test]
    fn test_compute_usage_counts_only_milli_requests() {
        let snap = snapshot(
            vec![create_test_node("node1", "4", None), create_test_node("node2", "4", None)],
            vec![
                create_test_pod("a", &["300m", "200m"], Some("node1")),
                create_test_pod("b", &["2"], Some("node1")),
                create_test_pod("c", &["100m", "1"], Some("node2")),
                create_test_pod("d", &["700m"], Some("gone")),
            ],
        );

        let usage = compute_usage(&snap).unwrap();
        assert_eq!(usage.used_on("node1"), 500);
        assert_eq!(usage.used_on("node2"), 100);
        assert_eq!(usage.used_on("gone"), 0);
    }

    #[test]
    fn test_compute_usage_rejects_malformed_request() {
        let snap = snapshot(
            vec![create_test_node("node1", "4", None)],
            vec![create_test_pod("a", &["lotsm"], Some("node1"))],
        );
        assert!(matches!(
            compute_usage(&snap),
            Err(SchedulerError::Core(_))
        ));
    }

    #[test]
    fn test_compute_usage_overflow_is_an_error() {
        let snap = snapshot(
            vec![create_test_node("node1", "4", None)],
            vec![
                create_test_pod("a", &["9223372036854775807m"], Some("node1")),
                create_test_pod("b", &["1m"], Some("node1")),
            ],
        );
        assert!(matches!(
            compute_usage(&snap),
            Err(SchedulerError::Core(CoreError::InvalidQuantity { .. }))
        ));
    }

    #[test]
    fn test_zero_request_fits_every_node_with_free_capacity() {
        let snap = snapshot(
            vec![
                create_test_node("node1", "1", None),
                create_test_node("node2", "250m", None),
                create_test_node("node3", "8", None),
            ],
            vec![create_test_pod("busy", &["900m"], Some("node1"))],
        );
        let pod = create_test_pod("idle", &[], None);

        let report = evaluate(&pod, &snap, &default_filters()).unwrap();
        assert_eq!(report.required_millicores, 0);
        assert_eq!(candidate_names(&report), vec!["node1", "node2", "node3"]);
    }

    #[test]
    fn test_zero_request_rejects_node_with_no_free_capacity() {
        let snap = snapshot(
            vec![create_test_node("full", "1", None), create_test_node("empty", "1", None)],
            vec![create_test_pod("busy", &["1000m"], Some("full"))],
        );
        let pod = create_test_pod("idle", &[], None);

        let report = evaluate(&pod, &snap, &default_filters()).unwrap();
        assert_eq!(candidate_names(&report), vec!["empty"]);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].node_name, "full");
    }

    #[test]
    fn test_requirement_equal_to_free_is_rejected() {
        let snap = snapshot(
            vec![create_test_node("node1", "2", None)],
            vec![create_test_pod("busy", &["1500m"], Some("node1"))],
        );

        let equal = create_test_pod("equal", &["500m"], None);
        let report = evaluate(&equal, &snap, &default_filters()).unwrap();
        assert!(report.candidates.is_empty());

        let one_less = create_test_pod("one-less", &["499m"], None);
        let report = evaluate(&one_less, &snap, &default_filters()).unwrap();
        assert_eq!(candidate_names(&report), vec!["node1"]);
    }

    #[test]
    fn test_requirement_above_free_is_rejected() {
        let snap = snapshot(vec![create_test_node("node1", "400m", None)], vec![]);
        let pod = create_test_pod("big", &["500m"], None);

        let report = evaluate(&pod, &snap, &default_filters()).unwrap();
        assert!(report.candidates.is_empty());
        assert_eq!(
            report.fit_failures(),
            vec!["fit failure on node (node1): Insufficient CPU".to_string()]
        );
    }

    #[test]
    fn test_whole_core_requests_are_ignored() {
        // 1 core allocatable, a running pod asking for "1" core counts as 0
        let snap = snapshot(
            vec![create_test_node("node1", "1", None)],
            vec![create_test_pod("whole", &["1"], Some("node1"))],
        );

        let usage = compute_usage(&snap).unwrap();
        assert_eq!(usage.used_on("node1"), 0);

        // The pending pod asks for 3 whole cores plus 200m, only 200m counts
        let pod = create_test_pod("mixed", &["3", "200m"], None);
        let report = evaluate(&pod, &snap, &default_filters()).unwrap();
        assert_eq!(report.required_millicores, 200);
        assert_eq!(candidate_names(&report), vec!["node1"]);
    }

    #[test]
    fn test_candidates_keep_node_order() {
        let snap = snapshot(
            vec![
                create_test_node("c", "4", None),
                create_test_node("a", "100m", None),
                create_test_node("b", "4", None),
            ],
            vec![],
        );
        let pod = create_test_pod("p", &["500m"], None);

        let report = evaluate(&pod, &snap, &default_filters()).unwrap();
        assert_eq!(candidate_names(&report), vec!["c", "b"]);
    }

    #[test]
    fn test_malformed_allocatable_aborts() {
        let snap = snapshot(vec![create_test_node("node1", "four", None)], vec![]);
        let pod = create_test_pod("p", &["100m"], None);
        assert!(evaluate(&pod, &snap, &default_filters()).is_err());
    }

    #[tokio::test]
    async fn test_fit_filter_reports_failed_scheduling() {
        let mock = Arc::new(MockControlPlane::new());
        let reporter = Arc::new(EventReporter::new(mock.clone(), "pricefit-scheduler"));
        let fit = FitFilter::new(reporter);

        let snap = snapshot(vec![create_test_node("node1", "400m", None)], vec![]);
        let pod = create_test_pod("big", &["500m"], None);

        let err = fit.filter(&pod, &snap).await.unwrap_err();
        assert!(err.is_fit_failure());

        let events = mock.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason.as_deref(), Some("FailedScheduling"));
        assert_eq!(events[0].type_.as_deref(), Some("Warning"));
        assert!(events[0]
            .message
            .as_deref()
            .unwrap()
            .contains("fit failure on node (node1): Insufficient CPU"));
    }

    #[tokio::test]
    async fn test_fit_filter_is_quiet_on_success() {
        let mock = Arc::new(MockControlPlane::new());
        let reporter = Arc::new(EventReporter::new(mock.clone(), "pricefit-scheduler"));
        let fit = FitFilter::new(reporter);

        let snap = snapshot(vec![create_test_node("node1", "2", None)], vec![]);
        let pod = create_test_pod("small", &["500m"], None);

        let candidates = fit.filter(&pod, &snap).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(mock.events().await.is_empty());
    }
}
