use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::collections::HashMap;

/// Nodes and running pods fetched for a single scheduling decision
///
/// Never cached or shared between decisions.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub running_pods: Vec<Pod>,
    /// When the fetch started
    pub taken_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    pub fn new(nodes: Vec<Node>, running_pods: Vec<Pod>, taken_at: DateTime<Utc>) -> Self {
        Self {
            nodes,
            running_pods,
            taken_at,
        }
    }
}

/// Milli-core CPU consumed per node, derived from one `ClusterSnapshot`
#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    used: HashMap<String, i64>,
}

impl UsageSnapshot {
    pub fn new(used: HashMap<String, i64>) -> Self {
        Self { used }
    }

    /// Millicores used on the node (zero when nothing runs there)
    pub fn used_on(&self, node_name: &str) -> i64 {
        self.used.get(node_name).copied().unwrap_or(0)
    }
}

/// Everything a filter predicate needs to judge a node for one pod
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    /// Pod to be scheduled
    pub pod: Pod,
    /// The pod's milli-core requirement
    pub required_millicores: i64,
    /// Current usage per node
    pub usage: UsageSnapshot,
}

impl SchedulingContext {
    pub fn new(pod: Pod, required_millicores: i64, usage: UsageSnapshot) -> Self {
        Self {
            pod,
            required_millicores,
            usage,
        }
    }
}

/// Result of filtering a node
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Whether the node passed the filter
    pub passed: bool,
    /// Reason for failure (if any)
    pub reason: Option<String>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(node_name: String) -> Self {
        Self {
            node_name,
            passed: true,
            reason: None,
        }
    }

    /// Create a failing filter result
    pub fn fail(node_name: String, reason: String) -> Self {
        Self {
            node_name,
            passed: false,
            reason: Some(reason),
        }
    }
}

/// Outcome of running the fit filter over every node
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Nodes able to host the pod, in node-list order
    pub candidates: Vec<Node>,
    /// Failed results for the nodes that were rejected
    pub rejections: Vec<FilterResult>,
    /// The pod's milli-core requirement
    pub required_millicores: i64,
}

impl FitReport {
    /// One line per rejected node, as written into FailedScheduling events
    pub fn fit_failures(&self) -> Vec<String> {
        self.rejections
            .iter()
            .map(|r| {
                format!(
                    "fit failure on node ({}): {}",
                    r.node_name,
                    r.reason.as_deref().unwrap_or("unknown reason")
                )
            })
            .collect()
    }
}
