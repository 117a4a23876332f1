use crate::error::{Result, SchedulerError};
use crate::traits::{ControlPlane, WatchStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use pricefit_core::WatchEvent;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::debug;

/// Field selector matching pods that have not been assigned a node
const PENDING_FIELD_SELECTOR: &str = "spec.nodeName=";

/// Field selector matching running pods
const RUNNING_FIELD_SELECTOR: &str = "status.phase=Running";

/// Lightweight HTTP client for the scheduler to talk to the API server
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// GET a list endpoint and decode its items.
    ///
    /// The whole list is rejected if the `items` array is missing or any item
    /// fails to decode.
    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SchedulerError::transport(operation, e.to_string()))?;

        let resp = expect_status(resp, operation, |s| s.is_success()).await?;

        let mut body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SchedulerError::decode(operation, e.to_string()))?;

        let Some(serde_json::Value::Array(items)) =
            body.get_mut("items").map(serde_json::Value::take)
        else {
            return Err(SchedulerError::decode(
                operation,
                "response has no items array",
            ));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item).map_err(|e| {
                    SchedulerError::decode(operation, format!("item {}: {}", index, e))
                })
            })
            .collect()
    }

    /// PATCH /api/v1/nodes/{name} with a strategic merge patch of annotations
    pub async fn patch_node_annotations(
        &self,
        name: &str,
        annotations: &BTreeMap<String, String>,
    ) -> Result<()> {
        let url = format!("{}/api/v1/nodes/{}", self.base_url, name);
        debug!("PATCH {}", url);

        let patch = serde_json::json!({ "metadata": { "annotations": annotations } });

        let resp = self
            .client
            .patch(&url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/strategic-merge-patch+json",
            )
            .header(reqwest::header::ACCEPT, "application/json, */*")
            .body(patch.to_string())
            .send()
            .await
            .map_err(|e| SchedulerError::transport("patch node", e.to_string()))?;

        expect_status(resp, "patch node", |s| s == StatusCode::OK).await?;
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for ApiClient {
    /// GET /api/v1/nodes
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list("/api/v1/nodes", &[], "list nodes").await
    }

    /// GET /api/v1/pods?fieldSelector=status.phase=Running
    async fn list_running_pods(&self) -> Result<Vec<Pod>> {
        self.list(
            "/api/v1/pods",
            &[("fieldSelector", RUNNING_FIELD_SELECTOR)],
            "list running pods",
        )
        .await
    }

    /// GET /api/v1/pods?fieldSelector=spec.nodeName=
    async fn list_pending_pods(&self) -> Result<Vec<Pod>> {
        self.list(
            "/api/v1/pods",
            &[("fieldSelector", PENDING_FIELD_SELECTOR)],
            "list pending pods",
        )
        .await
    }

    /// GET /api/v1/pods?watch=true&fieldSelector=spec.nodeName=
    async fn watch_pending_pods(&self) -> Result<WatchStream> {
        let url = format!("{}/api/v1/pods", self.base_url);
        debug!("GET {} (watch)", url);

        let resp = self
            .client
            .get(&url)
            .query(&[("watch", "true"), ("fieldSelector", PENDING_FIELD_SELECTOR)])
            .send()
            .await
            .map_err(|e| SchedulerError::transport("watch pods", e.to_string()))?;

        let resp = expect_status(resp, "watch pods", |s| s == StatusCode::OK).await?;

        Ok(decode_watch_stream(resp.bytes_stream().boxed()))
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{name}/binding
    async fn create_binding(&self, namespace: &str, binding: &Binding) -> Result<()> {
        let pod_name = binding
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| SchedulerError::internal_error("Binding has no pod name"))?;
        let node_name = binding.target.name.as_deref().unwrap_or_default();

        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}/binding",
            self.base_url, namespace, pod_name
        );
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(binding)
            .send()
            .await
            .map_err(|e| SchedulerError::transport("create binding", e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::binding_failed(
                pod_name,
                node_name,
                status.as_u16(),
                body,
            ));
        }

        Ok(())
    }

    /// POST /api/v1/namespaces/{namespace}/events
    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()> {
        let url = format!("{}/api/v1/namespaces/{}/events", self.base_url, namespace);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| SchedulerError::transport("create event", e.to_string()))?;

        expect_status(resp, "create event", |s| s == StatusCode::CREATED).await?;
        Ok(())
    }
}

/// Pass the response through if its status is accepted, otherwise turn it into an error
async fn expect_status(
    resp: Response,
    operation: &str,
    accept: impl Fn(StatusCode) -> bool,
) -> Result<Response> {
    let status = resp.status();
    if accept(status) {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(SchedulerError::unexpected_status(
        operation,
        status.as_u16(),
        body,
    ))
}

/// Split a watch response body into newline-delimited JSON notifications.
///
/// The stream ends after the first transport or decode error.
pub(crate) fn decode_watch_stream<E>(bytes: BoxStream<'static, std::result::Result<Bytes, E>>) -> WatchStream
where
    E: Display + Send + 'static,
{
    stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buf, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = line.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    let item = decode_line(line);
                    let done = item.is_err();
                    return Some((item, (bytes, buf, done)));
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        let err = SchedulerError::transport("watch pods", e.to_string());
                        return Some((Err(err), (bytes, buf, true)));
                    }
                    None => {
                        let rest = buf.trim_ascii();
                        if rest.is_empty() {
                            return None;
                        }
                        let item = decode_line(rest);
                        return Some((item, (bytes, Vec::new(), true)));
                    }
                }
            }
        },
    )
    .boxed()
}

fn decode_line(line: &[u8]) -> Result<WatchEvent> {
    serde_json::from_slice(line).map_err(|e| SchedulerError::decode("watch event", e.to_string()))
}
