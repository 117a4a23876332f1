use crate::error::{CoreError, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Parse a CPU string into millicores (e.g., "2", "1000m", "0.5")
pub fn parse_cpu(s: &str) -> Result<i64> {
    let millicores = if let Some(m) = s.strip_suffix('m') {
        m.parse::<i64>()
            .map_err(|e| CoreError::invalid_quantity(s, format!("invalid millicore value: {}", e)))?
    } else {
        let cores = s
            .parse::<f64>()
            .map_err(|e| CoreError::invalid_quantity(s, format!("invalid core value: {}", e)))?;
        if !cores.is_finite() {
            return Err(CoreError::invalid_quantity(s, "value is not finite"));
        }
        (cores * 1000.0).round() as i64
    };

    if millicores < 0 {
        return Err(CoreError::invalid_quantity(s, "value is negative"));
    }
    Ok(millicores)
}

/// Millicores a single CPU request counts for.
///
/// Only requests written with the `m` suffix are counted. A request given in
/// whole cores ("1", "2") contributes nothing to usage or requirement.
pub fn milli_cpu_request(quantity: &Quantity) -> Result<i64> {
    if quantity.0.ends_with('m') {
        parse_cpu(&quantity.0)
    } else {
        Ok(0)
    }
}

/// Sum of the milli-core CPU requests across every container of a pod
pub fn requested_millicores(pod: &Pod) -> Result<i64> {
    let Some(spec) = &pod.spec else {
        return Ok(0);
    };

    let mut total = 0i64;
    for container in &spec.containers {
        let cpu = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("cpu"));

        if let Some(cpu) = cpu {
            total = total
                .checked_add(milli_cpu_request(cpu)?)
                .ok_or_else(|| CoreError::invalid_quantity(&cpu.0, "value out of range"))?;
        }
    }

    Ok(total)
}

/// Allocatable CPU of a node in millicores. A node that reports none has zero.
pub fn allocatable_millicores(node: &Node) -> Result<i64> {
    match node
        .status
        .as_ref()
        .and_then(|s| s.allocatable.as_ref())
        .and_then(|a| a.get("cpu"))
    {
        Some(quantity) => parse_cpu(&quantity.0),
        None => Ok(0),
    }
}
