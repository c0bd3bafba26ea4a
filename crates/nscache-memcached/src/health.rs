//! Health check for memcached nodes.

use crate::metrics::MemcacheMetrics;
use std::sync::Arc;

/// Health status of the memcached pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every node answered.
    Healthy,
    /// Some nodes answered.
    Degraded { reason: String },
    /// No node answered.
    Unhealthy { reason: String },
}

impl HealthStatus {
    /// Check if the status is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Check if the service is operational (healthy or degraded).
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded { .. })
    }
}

/// Result of pinging a single node.
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub address: String,
    /// Server version when the node answered.
    pub version: Option<String>,
    pub error: Option<String>,
}

impl NodeHealth {
    /// Whether the node answered the ping.
    pub fn is_up(&self) -> bool {
        self.version.is_some()
    }
}

/// Health check result with details.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub nodes: Vec<NodeHealth>,
    pub errors: u64,
    pub disconnects: u64,
}

impl HealthCheck {
    /// Build a health check from node pings and metrics.
    pub fn from_nodes(nodes: Vec<NodeHealth>, metrics: &Arc<MemcacheMetrics>) -> Self {
        let snapshot = metrics.snapshot();
        let up = nodes.iter().filter(|n| n.is_up()).count();

        let status = if nodes.is_empty() || up == 0 {
            HealthStatus::Unhealthy {
                reason: "No memcached node reachable".to_string(),
            }
        } else if up < nodes.len() {
            HealthStatus::Degraded {
                reason: format!("{} of {} nodes unreachable", nodes.len() - up, nodes.len()),
            }
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            nodes,
            errors: snapshot.errors,
            disconnects: snapshot.disconnects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(address: &str, up: bool) -> NodeHealth {
        NodeHealth {
            address: address.to_string(),
            version: up.then(|| "1.6.21".to_string()),
            error: (!up).then(|| "connection refused".to_string()),
        }
    }

    #[test]
    fn test_all_nodes_up() {
        let check = HealthCheck::from_nodes(
            vec![node("a:11211", true), node("b:11211", true)],
            &MemcacheMetrics::new(),
        );
        assert!(check.status.is_healthy());
    }

    #[test]
    fn test_partial_outage_is_degraded() {
        let check = HealthCheck::from_nodes(
            vec![node("a:11211", true), node("b:11211", false)],
            &MemcacheMetrics::new(),
        );
        assert!(!check.status.is_healthy());
        assert!(check.status.is_operational());
    }

    #[test]
    fn test_total_outage_is_unhealthy() {
        let check = HealthCheck::from_nodes(vec![node("a:11211", false)], &MemcacheMetrics::new());
        assert!(!check.status.is_operational());
    }
}
