//! Ingestion of pending pods.
//!
//! A `PendingSource` yields pending pods one at a time, either from a
//! long-lived watch (`WatchSource`) or from periodic listing (`PollSource`).
//! The `Watcher` drives a source, applies the admission filter and hands
//! admitted pods to the decision loop over a channel of capacity one, so a
//! busy loop holds the producer back.
//!
//! Watches are reopened from the current state, never from a resume point:
//! pods added while the connection is down may not be delivered.

use crate::error::{Result, SchedulerError};
use crate::traits::{ControlPlane, WatchStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use pricefit_core::{pod_key, pod_name, Admission, WatchEventType};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default wait before reopening a failed watch
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Default interval between pending-pod listings
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// A source of pending pods
#[async_trait]
pub trait PendingSource: Send {
    /// Wait for the next pending pod, or the next ingestion error
    async fn next_pending(&mut self) -> Result<Pod>;
}

/// How pending pods are ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStrategy {
    /// Long-lived watch, reopened after `reconnect_backoff` on failure
    Watch { reconnect_backoff: Duration },
    /// List pending pods every `interval`
    Poll { interval: Duration },
}

impl Default for IngestStrategy {
    fn default() -> Self {
        IngestStrategy::Watch {
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

impl IngestStrategy {
    pub fn build_source(&self, control_plane: Arc<dyn ControlPlane>) -> Box<dyn PendingSource> {
        match self {
            IngestStrategy::Watch { reconnect_backoff } => {
                Box::new(WatchSource::new(control_plane, *reconnect_backoff))
            }
            IngestStrategy::Poll { interval } => Box::new(PollSource::new(control_plane, *interval)),
        }
    }
}

/// Pending pods from `ADDED` notifications of a watch stream
pub struct WatchSource {
    control_plane: Arc<dyn ControlPlane>,
    reconnect_backoff: Duration,
    stream: Option<WatchStream>,
    backoff_pending: bool,
}

impl WatchSource {
    pub fn new(control_plane: Arc<dyn ControlPlane>, reconnect_backoff: Duration) -> Self {
        Self {
            control_plane,
            reconnect_backoff,
            stream: None,
            backoff_pending: false,
        }
    }

    /// Drop the connection; the next call waits out the backoff before reopening
    fn fail(&mut self, err: SchedulerError) -> SchedulerError {
        self.stream = None;
        self.backoff_pending = true;
        err
    }
}

#[async_trait]
impl PendingSource for WatchSource {
    async fn next_pending(&mut self) -> Result<Pod> {
        loop {
            if self.stream.is_none() {
                if self.backoff_pending {
                    debug!("Waiting {:?} before reopening watch", self.reconnect_backoff);
                    tokio::time::sleep(self.reconnect_backoff).await;
                    self.backoff_pending = false;
                }

                match self.control_plane.watch_pending_pods().await {
                    Ok(stream) => {
                        info!("Watch on pending pods opened");
                        self.stream = Some(stream);
                    }
                    Err(e) => return Err(self.fail(e)),
                }
            }

            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            match stream.next().await {
                Some(Ok(event)) => match event.event_type {
                    WatchEventType::Added => {
                        return match serde_json::from_value::<Pod>(event.object) {
                            Ok(pod) => Ok(pod),
                            Err(e) => Err(self.fail(SchedulerError::decode(
                                "pod in watch event",
                                e.to_string(),
                            ))),
                        };
                    }
                    WatchEventType::Error => {
                        let message = event
                            .status_message()
                            .unwrap_or("no message")
                            .to_string();
                        return Err(self.fail(SchedulerError::watch_terminated(message)));
                    }
                    other => debug!("Ignoring {:?} watch event", other),
                },
                Some(Err(e)) => return Err(self.fail(e)),
                None => {
                    info!("Watch closed by control plane, reopening");
                    self.stream = None;
                }
            }
        }
    }
}

/// Pending pods from periodic listing, each pod yielded once
///
/// A pod is remembered while it stays pending; once it leaves the pending
/// list it is forgotten.
pub struct PollSource {
    control_plane: Arc<dyn ControlPlane>,
    interval: Duration,
    queue: VecDeque<Pod>,
    seen: HashSet<String>,
    listed_once: bool,
}

impl PollSource {
    pub fn new(control_plane: Arc<dyn ControlPlane>, interval: Duration) -> Self {
        Self {
            control_plane,
            interval,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            listed_once: false,
        }
    }
}

#[async_trait]
impl PendingSource for PollSource {
    async fn next_pending(&mut self) -> Result<Pod> {
        loop {
            if let Some(pod) = self.queue.pop_front() {
                return Ok(pod);
            }

            if self.listed_once {
                tokio::time::sleep(self.interval).await;
            }
            self.listed_once = true;

            let pods = self.control_plane.list_pending_pods().await?;
            let current: HashSet<String> = pods.iter().map(pod_key).collect();
            self.seen.retain(|key| current.contains(key));

            for pod in pods {
                if self.seen.insert(pod_key(&pod)) {
                    self.queue.push_back(pod);
                }
            }

            debug!("Poll found {} new pending pods", self.queue.len());
        }
    }
}

/// Receiving ends of a running watcher
pub struct WatcherChannels {
    /// Admitted pending pods, in delivery order
    pub pods: mpsc::Receiver<Pod>,
    /// Ingestion errors
    pub errors: mpsc::Receiver<SchedulerError>,
    pub handle: JoinHandle<()>,
}

/// Drives a `PendingSource` and forwards admitted pods
pub struct Watcher {
    source: Box<dyn PendingSource>,
    admission: Admission,
}

impl Watcher {
    pub fn new(source: Box<dyn PendingSource>, admission: Admission) -> Self {
        Self { source, admission }
    }

    /// Start the watcher on its own task. It stops when `token` is cancelled
    /// or the pod receiver is dropped.
    pub fn spawn(self, token: CancellationToken) -> WatcherChannels {
        let (pods_tx, pods) = mpsc::channel(1);
        let (errors_tx, errors) = mpsc::channel(8);
        let handle = tokio::spawn(self.run(pods_tx, errors_tx, token));

        WatcherChannels {
            pods,
            errors,
            handle,
        }
    }

    async fn run(
        mut self,
        pods: mpsc::Sender<Pod>,
        errors: mpsc::Sender<SchedulerError>,
        token: CancellationToken,
    ) {
        info!(
            "Watcher started for scheduler '{}'",
            self.admission.scheduler_name()
        );

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = self.source.next_pending() => next,
            };

            match next {
                Ok(pod) => {
                    if !self.admission.admits(&pod) {
                        debug!("Pod {} is not for this scheduler, skipping", pod_name(&pod));
                        continue;
                    }

                    debug!("Queueing pod {}", pod_name(&pod));
                    tokio::select! {
                        _ = token.cancelled() => break,
                        sent = pods.send(pod) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Ingestion error: {}", e);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        sent = errors.send(e) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("Watcher stopped");
    }
}
