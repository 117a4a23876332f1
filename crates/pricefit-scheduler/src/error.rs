// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// The request never got a response
    #[error("Control plane request failed ({operation}): {message}")]
    #[diagnostic(
        code(scheduler::transport),
        help("Check that the control plane is reachable at the configured API URL")
    )]
    Transport {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        message: String,
    },

    /// The control plane answered with a status other than the expected one
    #[error("Control plane returned {status} for {operation}: {body}")]
    #[diagnostic(
        code(scheduler::unexpected_status),
        help("Check the scheduler's RBAC permissions and the control plane logs")
    )]
    UnexpectedStatus {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// A response or notification payload could not be decoded
    #[error("Failed to decode {what}: {message}")]
    #[diagnostic(
        code(scheduler::decode),
        help("The control plane sent a payload this scheduler does not understand")
    )]
    Decode {
        #[allow(unused)]
        what: String,
        #[allow(unused)]
        message: String,
    },

    /// The control plane ended a watch with an ERROR notification
    #[error("Watch terminated by control plane: {message}")]
    #[diagnostic(
        code(scheduler::watch_terminated),
        help("The watch will be reopened after the reconnect backoff")
    )]
    WatchTerminated {
        #[allow(unused)]
        message: String,
    },

    /// No suitable nodes found
    #[error("No suitable nodes found for pod {pod_name}")]
    #[diagnostic(
        code(scheduler::no_suitable_nodes),
        help("{reason}")
    )]
    NoSuitableNodes {
        #[allow(unused)]
        pod_name: String,
        #[allow(unused)]
        reason: String,
    },

    /// A candidate node carries a malformed cost annotation
    #[error("Invalid cost annotation '{value}' on node {node_name}")]
    #[diagnostic(
        code(scheduler::invalid_cost),
        help("Fix or remove the annotation, e.g. with `pricefit annotate`")
    )]
    InvalidCost {
        #[allow(unused)]
        node_name: String,
        #[allow(unused)]
        value: String,
        #[source]
        source: pricefit_core::CoreError,
    },

    /// The binding write was not accepted
    #[error("Binding pod {pod_name} to node {node_name} failed with status {status}")]
    #[diagnostic(
        code(scheduler::binding_failed),
        help("The pod may already be bound by another scheduler. Response: {body}")
    )]
    BindingFailed {
        #[allow(unused)]
        pod_name: String,
        #[allow(unused)]
        node_name: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// Core error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] pricefit_core::CoreError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_status(
        operation: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::UnexpectedStatus {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn watch_terminated(message: impl Into<String>) -> Self {
        Self::WatchTerminated {
            message: message.into(),
        }
    }

    pub fn no_suitable_nodes(pod_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoSuitableNodes {
            pod_name: pod_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_cost(
        node_name: impl Into<String>,
        value: impl Into<String>,
        source: pricefit_core::CoreError,
    ) -> Self {
        Self::InvalidCost {
            node_name: node_name.into(),
            value: value.into(),
            source,
        }
    }

    pub fn binding_failed(
        pod_name: impl Into<String>,
        node_name: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::BindingFailed {
            pod_name: pod_name.into(),
            node_name: node_name.into(),
            status,
            body: body.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is the per-pod "nothing fits" outcome rather than a fault
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, Self::NoSuitableNodes { .. })
    }
}
