//! Per-peer unread message counts.
//!
//! Two sources feed the tracker: local increments/resets applied as
//! messages arrive and conversations are opened, and the server's
//! `updateUnreadCounts` snapshot, which is authoritative and replaces the
//! whole map.

use std::collections::HashMap;

use banter_proto::UserId;

/// Unread message counts, keyed by peer.
#[derive(Debug, Clone, Default)]
pub struct UnreadTracker {
    counts: HashMap<UserId, u32>,
}

impl UnreadTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unread count for a peer. Zero for unknown peers.
    pub fn count(&self, peer_id: UserId) -> u32 {
        self.counts.get(&peer_id).copied().unwrap_or(0)
    }

    /// All peers with a nonzero count.
    pub fn counts(&self) -> impl Iterator<Item = (UserId, u32)> + '_ {
        self.counts.iter().filter(|&(_, &c)| c > 0).map(|(&p, &c)| (p, c))
    }

    /// A message arrived from a peer whose conversation is not on screen.
    /// Returns the new count.
    pub fn record_inbound(&mut self, peer_id: UserId) -> u32 {
        let count = self.counts.entry(peer_id).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// A peer's conversation came on screen; its backlog is now read.
    pub fn mark_read(&mut self, peer_id: UserId) {
        self.counts.remove(&peer_id);
    }

    /// Apply the server's authoritative snapshot, replacing all local
    /// counts.
    pub fn apply_snapshot(&mut self, snapshot: HashMap<UserId, u32>) {
        self.counts = snapshot;
    }
}
