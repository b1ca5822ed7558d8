use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::point::BlockSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected
    }
}

#[derive(Debug, Clone, Default)]
struct HealthState {
    connection_status: ConnectionStatus,
    most_recent_checkpoint: Option<BlockSlot>,
    most_recent_node_tip: Option<BlockSlot>,
    last_block_received_at: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub connection_status: ConnectionStatus,
    pub most_recent_checkpoint: Option<BlockSlot>,
    pub most_recent_node_tip: Option<BlockSlot>,
    pub seconds_since_last_block: Option<i64>,
    pub network_synchronization: Option<f64>,
}

/// A single atomically-updated cell shared between chain-sync, consumer and
/// the HTTP `/health` endpoint.
#[derive(Clone)]
pub struct Health {
    inner: Arc<ArcSwap<HealthState>>,
}

impl Health {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(HealthState::default())),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.rcu(|state| {
            let mut next = (**state).clone();
            next.connection_status = if connected {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            };
            next
        });
    }

    pub fn set_node_tip(&self, slot: BlockSlot) {
        self.inner.rcu(|state| {
            let mut next = (**state).clone();
            next.most_recent_node_tip = Some(slot);
            next
        });
    }

    pub fn set_checkpoint(&self, slot: BlockSlot) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.inner.rcu(|state| {
            let mut next = (**state).clone();
            next.most_recent_checkpoint = Some(slot);
            next.last_block_received_at = Some(now);
            next
        });
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.inner.load();
        let seconds_since_last_block = state.last_block_received_at.map(|at| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(at);
            now.saturating_sub(at) as i64
        });
        let network_synchronization = match (state.most_recent_checkpoint, state.most_recent_node_tip) {
            (Some(checkpoint), Some(tip)) if tip > 0 => Some(checkpoint as f64 / tip as f64),
            _ => None,
        };
        HealthSnapshot {
            connection_status: state.connection_status,
            most_recent_checkpoint: state.most_recent_checkpoint,
            most_recent_node_tip: state.most_recent_node_tip,
            seconds_since_last_block,
            network_synchronization,
        }
    }

    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let connected = matches!(snapshot.connection_status, ConnectionStatus::Connected) as u8;
        let mut out = String::new();
        out.push_str("# TYPE argus_connection_status gauge\n");
        out.push_str(&format!("argus_connection_status {connected}\n"));
        out.push_str("# TYPE argus_most_recent_checkpoint gauge\n");
        out.push_str(&format!(
            "argus_most_recent_checkpoint {}\n",
            string_or_nan(snapshot.most_recent_checkpoint)
        ));
        out.push_str("# TYPE argus_most_recent_node_tip gauge\n");
        out.push_str(&format!(
            "argus_most_recent_node_tip {}\n",
            string_or_nan(snapshot.most_recent_node_tip)
        ));
        out.push_str("# TYPE argus_network_synchronization gauge\n");
        out.push_str(&format!(
            "argus_network_synchronization {}\n",
            snapshot
                .network_synchronization
                .map(|v| v.to_string())
                .unwrap_or_else(|| "NaN".to_string())
        ));
        out.push_str("# TYPE argus_seconds_since_last_block gauge\n");
        out.push_str(&format!(
            "argus_seconds_since_last_block {}\n",
            string_or_nan(snapshot.seconds_since_last_block)
        ));
        out
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new()
    }
}

fn string_or_nan<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NaN".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_with_no_checkpoint() {
        let health = Health::new();
        let snapshot = health.snapshot();
        assert_eq!(snapshot.connection_status, ConnectionStatus::Disconnected);
        assert!(snapshot.most_recent_checkpoint.is_none());
    }

    #[test]
    fn sync_percentage_uses_checkpoint_over_tip() {
        let health = Health::new();
        health.set_node_tip(100);
        health.set_checkpoint(50);
        let snapshot = health.snapshot();
        assert_eq!(snapshot.network_synchronization, Some(0.5));
    }
}
