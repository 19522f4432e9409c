use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::wal::now_nanos;

/// Per-node logical counters establishing causal order between versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(pub HashMap<String, u64>);

/// Causal relation between two clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    Less,
    Equal,
    Greater,
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, node_id: &str) {
        *self.0.entry(node_id.to_string()).or_insert(0) += 1;
    }

    /// Pointwise maximum of both clocks.
    pub fn merge(&mut self, other: &VectorClock) {
        for (node_id, counter) in &other.0 {
            let entry = self.0.entry(node_id.clone()).or_insert(0);
            if *counter > *entry {
                *entry = *counter;
            }
        }
    }

    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        let mut self_greater = false;
        let mut other_greater = false;

        for (node_id, counter) in &self.0 {
            match other.0.get(node_id) {
                Some(other_counter) => {
                    if counter > other_counter {
                        self_greater = true;
                    } else if counter < other_counter {
                        other_greater = true;
                    }
                }
                None if *counter > 0 => self_greater = true,
                None => {}
            }
        }

        for (node_id, counter) in &other.0 {
            if !self.0.contains_key(node_id) && *counter > 0 {
                other_greater = true;
            }
        }

        match (self_greater, other_greater) {
            (true, false) => ClockOrdering::Greater,
            (false, true) => ClockOrdering::Less,
            (true, true) => ClockOrdering::Concurrent,
            (false, false) => ClockOrdering::Equal,
        }
    }
}

/// A value together with its causal history and an LWW tiebreaker timestamp
/// (nanoseconds since epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: String,
    pub vector_clock: VectorClock,
    pub timestamp: i64,
}

/// How divergent versions are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Timestamp only; causal history is ignored.
    Lww,
    /// Causal winner when one exists, timestamp as the tiebreaker.
    VectorClock,
}

/// Merges divergent versions: causal winner when one exists, otherwise
/// last-write-wins on the timestamp. Repeated application converges
/// regardless of argument order.
pub struct ConflictResolver {
    node_id: String,
    mode: ResolutionMode,
}

impl ConflictResolver {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            mode: ResolutionMode::VectorClock,
        }
    }

    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn resolve(&self, current: VersionedValue, incoming: VersionedValue) -> VersionedValue {
        let ordering = match self.mode {
            ResolutionMode::Lww => ClockOrdering::Concurrent,
            ResolutionMode::VectorClock => current.vector_clock.compare(&incoming.vector_clock),
        };

        match ordering {
            ClockOrdering::Greater => current,
            ClockOrdering::Less => incoming,
            ClockOrdering::Equal | ClockOrdering::Concurrent => {
                if current.timestamp >= incoming.timestamp {
                    current
                } else {
                    incoming
                }
            }
        }
    }

    /// Wraps a fresh local write: this node's counter bumped, timestamp now.
    pub fn versioned(&self, value: impl Into<String>) -> VersionedValue {
        let mut clock = VectorClock::new();
        clock.increment(&self.node_id);

        VersionedValue {
            value: value.into(),
            vector_clock: clock,
            timestamp: now_nanos(),
        }
    }
}
