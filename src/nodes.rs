// Node identities learned from NodeInfo traffic.
use dashmap::DashMap;

use crate::decode::{DecodedMessage, PortKind};
use crate::format::format_node_id;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub long_name: String,
    pub short_name: String,
    pub hw_model: Option<i32>,
}

/// Most identities kept at once.
pub const MAX_NODES: usize = 10_000;

pub struct NodeDirectory {
    nodes: DashMap<u32, NodeIdentity>,
    limit: usize,
}

impl Default for NodeDirectory {
    fn default() -> Self {
        Self::with_limit(MAX_NODES)
    }
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { nodes: DashMap::new(), limit: limit.max(1) }
    }

    /// Adds or replaces an identity. A new node arriving when the directory is
    /// full evicts an arbitrary existing one.
    pub fn insert(&self, node_id: u32, identity: NodeIdentity) {
        if self.nodes.len() >= self.limit && !self.nodes.contains_key(&node_id) {
            let victim = self.nodes.iter().next().map(|entry| *entry.key());
            if let Some(victim) = victim {
                self.nodes.remove(&victim);
            }
        }
        self.nodes.insert(node_id, identity);
    }

    /// Records the names a NodeInfo message announces for `sender`. Other kinds are ignored.
    pub fn observe(&self, sender: u32, message: &DecodedMessage) -> bool {
        if message.kind != PortKind::NodeInfo {
            return false;
        }
        let fields = &message.fields;
        let long_name = fields.get("Long Name").unwrap_or_default().to_string();
        let short_name = fields.get("Short Name").unwrap_or_default().to_string();
        if long_name.is_empty() && short_name.is_empty() {
            return false;
        }
        let hw_model = fields.get("Hardware").and_then(|h| h.parse().ok());
        self.insert(sender, NodeIdentity { long_name, short_name, hw_model });
        true
    }

    pub fn get(&self, node_id: u32) -> Option<NodeIdentity> {
        self.nodes.get(&node_id).map(|entry| entry.value().clone())
    }

    /// `!xxxxxxxx (Long Name)` when known, else just the id.
    pub fn display_name(&self, node_id: u32) -> String {
        let id = format_node_id(node_id);
        match self.nodes.get(&node_id) {
            Some(node) if !node.long_name.is_empty() => format!("{} ({})", id, node.long_name),
            Some(node) if !node.short_name.is_empty() => format!("{} ({})", id, node.short_name),
            _ => id,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
