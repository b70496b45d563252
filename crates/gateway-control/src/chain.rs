//! Routing chains and the session -> chain index.

use gateway_types::{IpPrefix, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Associates a session with a packet classification expression.
///
/// The expression is evaluated by the dataplane only; the control plane
/// tracks the session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficMatcher {
    pub id: SessionId,
    pub matcher: String,
}

impl TrafficMatcher {
    pub fn new(id: SessionId, matcher: impl Into<String>) -> Self {
        Self {
            id,
            matcher: matcher.into(),
        }
    }
}

/// A group of destination prefixes served by a set of eligible sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingChain {
    /// Prefixes published while the chain is healthy, in declared order.
    pub prefixes: Vec<IpPrefix>,
    /// Sessions eligible to carry the chain's traffic.
    pub traffic_matchers: Vec<TrafficMatcher>,
}

impl RoutingChain {
    pub fn new(prefixes: Vec<IpPrefix>, traffic_matchers: Vec<TrafficMatcher>) -> Self {
        Self {
            prefixes,
            traffic_matchers,
        }
    }
}

/// Position of a chain in the [`RoutingChainIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChainId(pub usize);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

/// Immutable set of routing chains with a precomputed reverse index.
///
/// Built once from the routing policy. Looking up the chains of a session is
/// a single map access, so a session event costs O(affected chains).
#[derive(Debug, Clone, Default)]
pub struct RoutingChainIndex {
    chains: Vec<RoutingChain>,
    /// Session -> chains it may serve. Each chain appears once per session.
    by_session: HashMap<SessionId, Vec<ChainId>>,
    /// Chain -> distinct eligible sessions, in matcher order.
    sessions: Vec<Vec<SessionId>>,
}

impl RoutingChainIndex {
    pub fn new(chains: Vec<RoutingChain>) -> Self {
        let mut by_session: HashMap<SessionId, Vec<ChainId>> = HashMap::new();
        let mut sessions = Vec::with_capacity(chains.len());

        for (pos, chain) in chains.iter().enumerate() {
            let id = ChainId(pos);
            let mut distinct: Vec<SessionId> = Vec::new();
            for matcher in &chain.traffic_matchers {
                if distinct.contains(&matcher.id) {
                    continue;
                }
                distinct.push(matcher.id);
                by_session.entry(matcher.id).or_default().push(id);
            }
            sessions.push(distinct);
        }

        Self {
            chains,
            by_session,
            sessions,
        }
    }

    /// Returns the number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Returns the chain with the given id, if it belongs to this index.
    pub fn get(&self, id: ChainId) -> Option<&RoutingChain> {
        self.chains.get(id.0)
    }

    /// Returns the chains the session is an eligible matcher for.
    ///
    /// Unknown sessions yield an empty slice.
    pub fn chains_for(&self, session: SessionId) -> &[ChainId] {
        self.by_session
            .get(&session)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the distinct sessions eligible for the chain.
    pub fn sessions_of(&self, id: ChainId) -> &[SessionId] {
        self.sessions.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over all chains in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (ChainId, &RoutingChain)> {
        self.chains
            .iter()
            .enumerate()
            .map(|(pos, chain)| (ChainId(pos), chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(prefixes: &[&str], sessions: &[u32]) -> RoutingChain {
        RoutingChain::new(
            prefixes.iter().map(|p| p.parse().unwrap()).collect(),
            sessions
                .iter()
                .map(|id| TrafficMatcher::new(SessionId::new(*id), "true"))
                .collect(),
        )
    }

    #[test]
    fn test_reverse_index() {
        let index = RoutingChainIndex::new(vec![
            chain(&["10.0.0.0/8"], &[1, 2]),
            chain(&["172.16.0.0/12"], &[2, 3]),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.chains_for(SessionId::new(1)), &[ChainId(0)]);
        assert_eq!(index.chains_for(SessionId::new(2)), &[ChainId(0), ChainId(1)]);
        assert_eq!(index.chains_for(SessionId::new(3)), &[ChainId(1)]);
        assert!(index.chains_for(SessionId::new(4)).is_empty());
    }

    #[test]
    fn test_duplicate_matcher_session_counted_once() {
        let mut c = chain(&["10.0.0.0/8"], &[1]);
        c.traffic_matchers.push(TrafficMatcher::new(SessionId::new(1), "false"));
        let index = RoutingChainIndex::new(vec![c]);

        assert_eq!(index.chains_for(SessionId::new(1)), &[ChainId(0)]);
        assert_eq!(index.sessions_of(ChainId(0)), &[SessionId::new(1)]);
    }

    #[test]
    fn test_unknown_chain_id() {
        let index = RoutingChainIndex::new(vec![chain(&["10.0.0.0/8"], &[1])]);
        assert!(index.get(ChainId(0)).is_some());
        assert!(index.get(ChainId(1)).is_none());
        assert!(index.sessions_of(ChainId(1)).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = RoutingChainIndex::new(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
    }
}
