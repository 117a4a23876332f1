//! Pricefit Core - Shared types for the pricefit scheduler
//!
//! This crate provides:
//! - Re-exports of the control-plane objects the scheduler reads and writes
//! - CPU quantity parsing with milli-core request accounting
//! - Node cost annotation parsing
//! - The scheduler-name admission filter
//! - Audit event construction
//! - Error types with miette diagnostics

pub mod admission;
pub mod cost;
pub mod error;
pub mod events;
pub mod quantities;
pub mod watch;
pub mod workload;

// Re-export commonly used types
pub use admission::Admission;
pub use cost::Cost;
pub use error::{CoreError, Result};
pub use events::{AuditEvent, EventType};
pub use quantities::{allocatable_millicores, milli_cpu_request, parse_cpu, requested_millicores};
pub use watch::{WatchEvent, WatchEventType};
pub use workload::{assigned_node, node_name, pod_key, pod_name, pod_namespace, pod_reference};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Binding, Event, Node, ObjectReference, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Annotation a pod uses to ask for a specific scheduler
pub const SCHEDULER_NAME_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/name";

/// Scheduler name used when none is configured
pub const DEFAULT_SCHEDULER_NAME: &str = "pricefit";

/// Node annotation carrying the cost tag
pub const DEFAULT_COST_ANNOTATION: &str = "pricefit.io/cost";

/// Namespace assumed for pods that do not carry one
pub const DEFAULT_NAMESPACE: &str = "default";
