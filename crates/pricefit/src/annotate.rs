use pricefit_core::{node_name, Cost, CoreError, Node};
use pricefit_scheduler::{ApiClient, ControlPlane};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Prices handed out when none are given on the command line
pub const DEFAULT_PRICES: &str = "0.05,0.10,0.20,0.40,0.80,1.60";

/// A price from the command line, written to nodes exactly as it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    text: String,
    cost: Cost,
}

impl Price {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            cost: s.parse()?,
            text: s.to_string(),
        })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Pick a random price for every named node, in node order
pub fn assign_costs<R: Rng + ?Sized>(
    nodes: &[Node],
    prices: &[Price],
    rng: &mut R,
) -> miette::Result<Vec<(String, Price)>> {
    nodes
        .iter()
        .filter(|node| node.metadata.name.is_some())
        .map(|node| {
            let cost = prices
                .choose(&mut *rng)
                .cloned()
                .ok_or_else(|| miette::miette!("The price list is empty"))?;
            Ok((node_name(node).to_string(), cost))
        })
        .collect()
}

/// Current value of the cost annotation, for display
fn current_cost<'a>(node: &'a Node, annotation: &str) -> &'a str {
    node.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotation))
        .map(String::as_str)
        .unwrap_or("-")
}

/// List node costs, or tag every node with a random cost
pub async fn run_annotate(
    api_url: &str,
    annotation: &str,
    list: bool,
    prices: &[Price],
) -> miette::Result<()> {
    let client = ApiClient::new(api_url);
    let nodes = client
        .list_nodes()
        .await
        .map_err(|e| miette::miette!("Failed to list nodes from {}: {}", api_url, e))?;

    if list {
        for node in &nodes {
            println!("{} {}", node_name(node), current_cost(node, annotation));
        }
        return Ok(());
    }

    let assignments = assign_costs(&nodes, prices, &mut rand::thread_rng())?;

    for (name, price) in assignments {
        let annotations = BTreeMap::from([(annotation.to_string(), price.as_str().to_string())]);
        client
            .patch_node_annotations(&name, &annotations)
            .await
            .map_err(|e| miette::miette!("Failed to annotate node {}: {}", name, e))?;

        info!("Annotated node {} with {}={}", name, annotation, price);
        println!("{} {}", name, price);
    }

    Ok(())
}
