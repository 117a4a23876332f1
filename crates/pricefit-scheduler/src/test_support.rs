//! Builders for nodes and pods shared by the unit tests.

use k8s_openapi::api::core::v1::{Container, Node, NodeStatus, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use pricefit_core::{DEFAULT_COST_ANNOTATION, SCHEDULER_NAME_ANNOTATION};
use std::collections::BTreeMap;

/// Node with the given allocatable CPU and, optionally, a cost annotation
pub fn create_test_node(name: &str, cpu: &str, cost: Option<&str>) -> Node {
    let mut node = Node::default();
    node.metadata.name = Some(name.to_string());
    node.status = Some(NodeStatus {
        allocatable: Some(BTreeMap::from([(
            "cpu".to_string(),
            Quantity(cpu.to_string()),
        )])),
        ..Default::default()
    });
    if let Some(cost) = cost {
        node.metadata.annotations = Some(BTreeMap::from([(
            DEFAULT_COST_ANNOTATION.to_string(),
            cost.to_string(),
        )]));
    }
    node
}

/// Pod in `default` with one container per CPU request, addressed to `pricefit`
pub fn create_test_pod(name: &str, cpu_requests: &[&str], node: Option<&str>) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.name = Some(name.to_string());
    pod.metadata.namespace = Some("default".to_string());
    pod.metadata.uid = Some(format!("uid-{}", name));
    pod.metadata.annotations = Some(BTreeMap::from([(
        SCHEDULER_NAME_ANNOTATION.to_string(),
        "pricefit".to_string(),
    )]));

    let containers = cpu_requests
        .iter()
        .enumerate()
        .map(|(i, cpu)| Container {
            name: format!("c{}", i),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "cpu".to_string(),
                    Quantity(cpu.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    pod.spec = Some(PodSpec {
        containers,
        node_name: node.map(str::to_string),
        ..Default::default()
    });
    pod
}
