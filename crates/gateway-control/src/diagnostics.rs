//! Point-in-time view of the publishing routing table.

use gateway_types::{IpPrefix, SessionId};
use serde::Serialize;

use crate::chain::ChainId;

/// State of a single routing chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainDiagnostics {
    pub chain: ChainId,
    pub prefixes: Vec<IpPrefix>,
    /// Eligible sessions, in matcher order.
    pub sessions: Vec<SessionId>,
    pub active_sessions: Vec<SessionId>,
    pub healthy: bool,
    pub published: bool,
}

/// Snapshot of every chain plus the table's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub closed: bool,
    pub chains: Vec<ChainDiagnostics>,
}

impl Diagnostics {
    /// Returns the number of chains whose routes are advertised.
    pub fn published_count(&self) -> usize {
        self.chains.iter().filter(|c| c.published).count()
    }
}
