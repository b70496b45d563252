//! Configuration generations of the gateway.
//!
//! Every published configuration produces a new generation: a fresh
//! [`PublishingRoutingTable`] over its own [`SessionTable`] and
//! [`TracingPublisher`]. The previous table is closed first, which retracts
//! its routes, then its bound sessions are rebound in the new one.

use std::fmt;
use std::sync::Arc;

use gateway_config::{build_routing_chains, ConfigPublisher, RoutingPolicy, SessionPolicies};
use gateway_control::{
    ControlError, ControlResult, Diagnostics, ForwardingTable, PacketWriter, Publisher,
    PublishingConfig, PublishingRoutingTable, Route, RoutingChain,
};
use gateway_types::SessionId;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::forwarding::SessionTable;
use crate::publisher::TracingPublisher;

struct Generation {
    table: PublishingRoutingTable,
    sessions: Arc<SessionTable>,
    publisher: Arc<TracingPublisher>,
}

impl Generation {
    fn new(chains: Vec<RoutingChain>, config: PublishingConfig) -> Self {
        let sessions = Arc::new(SessionTable::new());
        let publisher = Arc::new(TracingPublisher::new());
        let table = PublishingRoutingTable::new(
            chains,
            Arc::clone(&sessions) as Arc<dyn ForwardingTable>,
            Arc::clone(&publisher) as Arc<dyn Publisher>,
            config,
        );
        Self {
            table,
            sessions,
            publisher,
        }
    }
}

/// Owns the routing table in effect and swaps it on every reload.
pub struct Gateway {
    config: PublishingConfig,
    current: Mutex<Option<Generation>>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway with an empty routing table, so sessions can bind
    /// before the first configuration arrives.
    pub fn new(config: PublishingConfig) -> Self {
        Self {
            config,
            current: Mutex::new(Some(Generation::new(Vec::new(), config))),
        }
    }

    /// Installs the configuration and returns the number of routing chains.
    pub fn apply(&self, sessions: &SessionPolicies, routing: &RoutingPolicy) -> usize {
        let chains = build_routing_chains(sessions, routing);
        let next = Generation::new(chains, self.config);
        let chain_count = next.table.chain_count();

        let mut current = self.current.lock();
        let Some(previous) = current.take() else {
            warn!("Configuration ignored, gateway is closed");
            return 0;
        };

        // The previous generation retracts its routes before the next one
        // advertises anything.
        let bound = previous.sessions.sessions();
        if let Err(e) = previous.table.close() {
            warn!(error = %e, "Failed to close previous routing table");
        }
        for (session, writer) in bound {
            if let Err(e) = next.table.bind(session, writer) {
                error!(%session, error = %e, "Failed to rebind session");
            }
        }

        *current = Some(next);
        chain_count
    }

    pub fn bind(&self, session: SessionId, writer: Arc<dyn PacketWriter>) -> ControlResult<()> {
        match self.current.lock().as_ref() {
            Some(generation) => generation.table.bind(session, writer),
            None => Err(ControlError::Closed),
        }
    }

    pub fn unbind(&self, session: SessionId) -> ControlResult<()> {
        match self.current.lock().as_ref() {
            Some(generation) => generation.table.unbind(session),
            None => Err(ControlError::Closed),
        }
    }

    /// Returns the writer bound to `session` in the current table.
    pub fn writer(&self, session: SessionId) -> Option<Arc<dyn PacketWriter>> {
        self.current
            .lock()
            .as_ref()
            .and_then(|generation| generation.sessions.writer(session))
    }

    pub fn diagnostics(&self) -> Option<Diagnostics> {
        self.current
            .lock()
            .as_ref()
            .map(|generation| generation.table.diagnostics())
    }

    /// Returns the routes advertised by the current table.
    pub fn installed_routes(&self) -> Vec<Route> {
        self.current
            .lock()
            .as_ref()
            .map(|generation| generation.publisher.installed())
            .unwrap_or_default()
    }

    /// Closes the current table. Later configurations are ignored.
    pub fn close(&self) -> ControlResult<()> {
        match self.current.lock().take() {
            Some(generation) => generation.table.close(),
            None => Ok(()),
        }
    }
}

impl ConfigPublisher for Gateway {
    fn publish(&self, sessions: SessionPolicies, routing: RoutingPolicy) {
        let chains = self.apply(&sessions, &routing);
        info!(chains, sessions = sessions.len(), "Applied configuration");
        if let Some(diagnostics) = self.diagnostics() {
            debug!(published = diagnostics.published_count(), "Routing table state");
        }
    }
}
