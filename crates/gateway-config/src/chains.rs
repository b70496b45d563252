//! Routing chain construction from a loaded configuration.

use gateway_control::{RoutingChain, TrafficMatcher};
use gateway_types::IpPrefix;
use tracing::debug;

use crate::policy::{RoutingPolicy, SessionPolicies};

/// Builds the routing chains for `sessions` under `routing`.
///
/// Each session keeps only the prefixes the routing policy accepts. Sessions
/// left without prefixes are dropped. Sessions announcing the same accepted
/// prefix list share a single chain, with matchers in file order.
pub fn build_routing_chains(sessions: &SessionPolicies, routing: &RoutingPolicy) -> Vec<RoutingChain> {
    let mut chains: Vec<RoutingChain> = Vec::new();

    for policy in sessions.iter() {
        let accepted: Vec<IpPrefix> = policy
            .prefixes
            .iter()
            .filter(|prefix| routing.accepts(prefix))
            .copied()
            .collect();

        if accepted.is_empty() {
            debug!(session = %policy.id, "Session has no accepted prefixes, skipping");
            continue;
        }

        let matcher = TrafficMatcher::new(policy.id, policy.traffic_matcher.clone());
        match chains.iter_mut().find(|chain| chain.prefixes == accepted) {
            Some(chain) => chain.traffic_matchers.push(matcher),
            None => chains.push(RoutingChain::new(accepted, vec![matcher])),
        }
    }

    chains
}
