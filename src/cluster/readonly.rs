use parking_lot::RwLock;
use serde::Serialize;

/// Operating mode of the local node.
///
/// Reads are served in every role; writes only in `Normal`. The quorum gate
/// flips Normal↔ReadOnly on the active-peer count edge with no hysteresis,
/// and a rebalance temporarily parks the node in `Rebalancing`, restoring
/// the previous role when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Normal,
    ReadOnly,
    Rebalancing,
}

struct RoleState {
    role: NodeRole,
    // Role to restore when a rebalance finishes.
    before_rebalance: NodeRole,
    active_nodes: usize,
}

/// Quorum-driven write gate plus the Normal/ReadOnly/Rebalancing state
/// machine.
pub struct RoleManager {
    quorum_size: usize,
    state: RwLock<RoleState>,
}

impl RoleManager {
    pub fn new(quorum_size: usize) -> Self {
        Self {
            quorum_size,
            state: RwLock::new(RoleState {
                role: NodeRole::Normal,
                before_rebalance: NodeRole::Normal,
                active_nodes: 0,
            }),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.state.read().role
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read().role != NodeRole::Normal
    }

    pub fn can_write(&self) -> bool {
        self.state.read().role == NodeRole::Normal
    }

    pub fn active_nodes(&self) -> usize {
        self.state.read().active_nodes
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    /// Feeds the latest active-peer count into the gate. While rebalancing,
    /// only the restore target changes.
    pub fn update_active(&self, active_nodes: usize) {
        let mut state = self.state.write();
        state.active_nodes = active_nodes;

        let target = if active_nodes < self.quorum_size {
            NodeRole::ReadOnly
        } else {
            NodeRole::Normal
        };

        if state.role == NodeRole::Rebalancing {
            state.before_rebalance = target;
            return;
        }

        if state.role != target {
            tracing::info!(
                "Node role {:?} -> {:?} ({} active, quorum {})",
                state.role,
                target,
                active_nodes,
                self.quorum_size
            );
            state.role = target;
        }
    }

    /// Enters the Rebalancing role; returns false when a rebalance is
    /// already running.
    pub fn begin_rebalance(&self) -> bool {
        let mut state = self.state.write();
        if state.role == NodeRole::Rebalancing {
            return false;
        }

        state.before_rebalance = state.role;
        state.role = NodeRole::Rebalancing;
        true
    }

    pub fn finish_rebalance(&self) {
        let mut state = self.state.write();
        if state.role == NodeRole::Rebalancing {
            state.role = state.before_rebalance;
        }
    }
}
