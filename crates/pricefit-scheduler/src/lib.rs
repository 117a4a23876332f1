//! Pricefit Scheduler - Cost-aware pod placement
//!
//! This crate provides:
//! - Pending pod ingestion by watch or by periodic polling
//! - Per-decision snapshots of nodes and running pods
//! - The milli-core CPU fit filter
//! - Cheapest-node selection by cost annotation
//! - Pod binding and best-effort audit events
//! - An HTTP control-plane client and an in-memory mock

pub mod api_client;
pub mod binder;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod mock;
pub mod price;
pub mod reporter;
pub mod scheduler;
pub mod traits;
pub mod types;
pub mod watcher;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api_client::ApiClient;
pub use binder::Binder;
pub use error::{Result, SchedulerError};
pub use filter::FitFilter;
pub use inventory::NodeInventory;
pub use mock::MockControlPlane;
pub use price::{PricedNode, PriceSelector};
pub use reporter::EventReporter;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use traits::{ControlPlane, WatchStream};
pub use types::{ClusterSnapshot, FilterResult, SchedulingContext};
pub use watcher::{IngestStrategy, PendingSource, PollSource, WatchSource, Watcher};
