//! Session health tracking.

use gateway_types::SessionId;
use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::{ChainId, RoutingChainIndex};

/// New health of a chain after a session state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHealth {
    pub chain: ChainId,
    pub healthy: bool,
}

/// Tracks which sessions are active and derives per-chain health.
///
/// A chain is healthy iff at least one of its eligible sessions is active.
/// The tracker keeps a count of active sessions per chain so that health is
/// known without scanning the chain's matchers. It performs no I/O.
#[derive(Debug)]
pub struct HealthTracker {
    index: Arc<RoutingChainIndex>,
    active: HashSet<SessionId>,
    active_per_chain: Vec<usize>,
}

impl HealthTracker {
    pub fn new(index: Arc<RoutingChainIndex>) -> Self {
        let active_per_chain = vec![0; index.len()];
        Self {
            index,
            active: HashSet::new(),
            active_per_chain,
        }
    }

    /// Marks the session active.
    ///
    /// Returns the new health of every chain the session serves. Returns an
    /// empty list if the session was already active.
    pub fn mark_active(&mut self, session: SessionId) -> Vec<ChainHealth> {
        if !self.active.insert(session) {
            return Vec::new();
        }
        self.index
            .chains_for(session)
            .iter()
            .map(|&chain| {
                self.active_per_chain[chain.0] += 1;
                ChainHealth {
                    chain,
                    healthy: true,
                }
            })
            .collect()
    }

    /// Marks the session inactive.
    ///
    /// Returns the new health of every chain the session serves. Returns an
    /// empty list if the session was not active.
    pub fn mark_inactive(&mut self, session: SessionId) -> Vec<ChainHealth> {
        if !self.active.remove(&session) {
            return Vec::new();
        }
        self.index
            .chains_for(session)
            .iter()
            .map(|&chain| {
                let count = &mut self.active_per_chain[chain.0];
                *count = count.saturating_sub(1);
                ChainHealth {
                    chain,
                    healthy: *count > 0,
                }
            })
            .collect()
    }

    pub fn is_active(&self, session: SessionId) -> bool {
        self.active.contains(&session)
    }

    /// Returns the current health of the chain. Unknown chains are unhealthy.
    pub fn is_healthy(&self, chain: ChainId) -> bool {
        self.active_per_chain
            .get(chain.0)
            .is_some_and(|count| *count > 0)
    }

    /// Returns the chain's eligible sessions that are currently active.
    pub fn active_sessions(&self, chain: ChainId) -> Vec<SessionId> {
        self.index
            .sessions_of(chain)
            .iter()
            .copied()
            .filter(|session| self.active.contains(session))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{RoutingChain, TrafficMatcher};
    use pretty_assertions::assert_eq;

    fn tracker() -> HealthTracker {
        let chains = vec![
            RoutingChain::new(
                vec!["10.0.0.0/8".parse().unwrap()],
                vec![
                    TrafficMatcher::new(SessionId::new(1), "true"),
                    TrafficMatcher::new(SessionId::new(2), "true"),
                ],
            ),
            RoutingChain::new(
                vec!["172.16.0.0/12".parse().unwrap()],
                vec![TrafficMatcher::new(SessionId::new(2), "true")],
            ),
        ];
        HealthTracker::new(Arc::new(RoutingChainIndex::new(chains)))
    }

    fn health(chain: usize, healthy: bool) -> ChainHealth {
        ChainHealth {
            chain: ChainId(chain),
            healthy,
        }
    }

    #[test]
    fn test_mark_active_reports_affected_chains() {
        let mut tracker = tracker();

        assert_eq!(
            tracker.mark_active(SessionId::new(2)),
            vec![health(0, true), health(1, true)]
        );
        assert!(tracker.is_active(SessionId::new(2)));
        assert!(tracker.is_healthy(ChainId(0)));
        assert!(tracker.is_healthy(ChainId(1)));
    }

    #[test]
    fn test_mark_active_is_idempotent() {
        let mut tracker = tracker();

        assert_eq!(tracker.mark_active(SessionId::new(1)), vec![health(0, true)]);
        assert!(tracker.mark_active(SessionId::new(1)).is_empty());

        // A single unbind must be enough after a repeated bind.
        assert_eq!(tracker.mark_inactive(SessionId::new(1)), vec![health(0, false)]);
        assert!(!tracker.is_healthy(ChainId(0)));
    }

    #[test]
    fn test_chain_stays_healthy_while_one_session_active() {
        let mut tracker = tracker();
        tracker.mark_active(SessionId::new(1));
        tracker.mark_active(SessionId::new(2));

        assert_eq!(
            tracker.mark_inactive(SessionId::new(1)),
            vec![health(0, true)]
        );
        assert_eq!(tracker.active_sessions(ChainId(0)), vec![SessionId::new(2)]);

        assert_eq!(
            tracker.mark_inactive(SessionId::new(2)),
            vec![health(0, false), health(1, false)]
        );
        assert!(tracker.active_sessions(ChainId(0)).is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let mut tracker = tracker();

        assert!(tracker.mark_inactive(SessionId::new(9)).is_empty());
        // Active, but serves no chain.
        assert!(tracker.mark_active(SessionId::new(9)).is_empty());
        assert!(tracker.is_active(SessionId::new(9)));
        assert!(!tracker.is_healthy(ChainId(0)));
        assert!(!tracker.is_healthy(ChainId(7)));
    }
}
