use crate::error::{Result, SchedulerError};
use k8s_openapi::api::core::v1::Node;
use pricefit_core::{node_name, Cost};
use tracing::debug;

/// The node picked by the price selector
#[derive(Debug, Clone, Copy)]
pub struct PricedNode<'a> {
    pub node: &'a Node,
    /// Parsed cost, or zero when no candidate carried a cost tag
    pub cost: Cost,
    /// Whether the cost came from the node's annotation
    pub annotated: bool,
}

/// Picks the cheapest candidate by its cost annotation
#[derive(Debug, Clone)]
pub struct PriceSelector {
    annotation_key: String,
}

impl PriceSelector {
    pub fn new(annotation_key: impl Into<String>) -> Self {
        Self {
            annotation_key: annotation_key.into(),
        }
    }

    pub fn annotation_key(&self) -> &str {
        &self.annotation_key
    }

    /// Cost tag of a node. `None` when the annotation is absent; an error when
    /// it is present but malformed.
    pub fn cost_of(&self, node: &Node) -> Result<Option<Cost>> {
        let Some(raw) = node
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(&self.annotation_key))
        else {
            return Ok(None);
        };

        raw.parse::<Cost>()
            .map(Some)
            .map_err(|e| SchedulerError::invalid_cost(node_name(node), raw.as_str(), e))
    }

    /// Select the candidate with the strictly smallest cost, earliest on ties.
    ///
    /// Candidates without a cost tag are skipped. If none has one, the first
    /// candidate wins at cost zero. A malformed tag on any candidate fails the
    /// whole selection.
    pub fn select<'a>(&self, candidates: &'a [Node]) -> Result<PricedNode<'a>> {
        let first = candidates
            .first()
            .ok_or_else(|| SchedulerError::internal_error("Price selection needs at least one candidate"))?;

        let mut best: Option<PricedNode<'a>> = None;

        for node in candidates {
            let Some(cost) = self.cost_of(node)? else {
                debug!("Node {} has no {} annotation", node_name(node), self.annotation_key);
                continue;
            };

            match best {
                Some(current) if cost >= current.cost => {}
                _ => {
                    best = Some(PricedNode {
                        node,
                        cost,
                        annotated: true,
                    })
                }
            }
        }

        let selected = best.unwrap_or(PricedNode {
            node: first,
            cost: Cost::ZERO,
            annotated: false,
        });

        debug!(
            "Selected node {} at cost {} (annotated: {})",
            node_name(selected.node),
            selected.cost,
            selected.annotated
        );

        Ok(selected)
    }
}
