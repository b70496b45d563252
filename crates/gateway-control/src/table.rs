//! PublishingRoutingTable - the orchestrator used by session management.

use gateway_types::SessionId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::chain::{ChainId, RoutingChain, RoutingChainIndex};
use crate::dataplane::{DataplaneAdapter, ForwardingTable, PacketWriter};
use crate::diagnostics::{ChainDiagnostics, Diagnostics};
use crate::error::{ControlError, ControlResult};
use crate::health::HealthTracker;
use crate::publish::{PublishEngine, Publisher, PublishingConfig};

/// Mutable state, guarded by one lock so that a health update and the
/// publisher calls it causes are never split across critical sections.
struct Inner {
    dataplane: DataplaneAdapter,
    health: HealthTracker,
    engine: PublishEngine,
    closed: bool,
}

/// Routing table wrapper that advertises a routing chain's routes while at
/// least one of its sessions is bound.
///
/// All operations are serialized. Session management may call `bind` and
/// `unbind` from any number of threads.
///
/// # Lifecycle
///
/// 1. Construction: every chain starts unpublished
/// 2. `bind`/`unbind`: dataplane update, then health update, then publishing
/// 3. `close`: closes the forwarding table and the publisher exactly once;
///    published routes are not withdrawn
pub struct PublishingRoutingTable {
    index: Arc<RoutingChainIndex>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for PublishingRoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishingRoutingTable")
            .field("chains", &self.index.len())
            .field("closed", &self.inner.try_lock().map(|inner| inner.closed))
            .finish()
    }
}

impl PublishingRoutingTable {
    /// Creates a new table over the given chains and collaborators.
    pub fn new(
        chains: Vec<RoutingChain>,
        forwarding: Arc<dyn ForwardingTable>,
        publisher: Arc<dyn Publisher>,
        config: PublishingConfig,
    ) -> Self {
        let index = Arc::new(RoutingChainIndex::new(chains));
        info!(chains = index.len(), "Created publishing routing table");

        let inner = Inner {
            dataplane: DataplaneAdapter::new(forwarding),
            health: HealthTracker::new(Arc::clone(&index)),
            engine: PublishEngine::new(Arc::clone(&index), publisher, config),
            closed: false,
        };
        Self {
            index,
            inner: Mutex::new(inner),
        }
    }

    /// Returns the number of routing chains.
    pub fn chain_count(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the chain's routes are currently advertised.
    pub fn is_published(&self, chain: ChainId) -> bool {
        self.inner.lock().engine.is_published(chain)
    }

    /// Binds a forwarding path for the session.
    ///
    /// The forwarding table is always updated. If that succeeds, the session
    /// becomes active and chains that turn healthy get their routes
    /// published. A session that serves no chain is still bound.
    #[instrument(level = "debug", skip(self, writer))]
    pub fn bind(&self, session: SessionId, writer: Arc<dyn PacketWriter>) -> ControlResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            warn!(%session, "Bind rejected, table is closed");
            return Err(ControlError::Closed);
        }

        inner.dataplane.bind(session, writer)?;
        let transitions = inner.health.mark_active(session);
        debug!(%session, affected = transitions.len(), "Session active");
        inner.engine.apply(&transitions)
    }

    /// Removes the forwarding path of the session.
    ///
    /// The forwarding table is always updated. If that succeeds, chains that
    /// lost their last active session get their routes withdrawn.
    #[instrument(level = "debug", skip(self))]
    pub fn unbind(&self, session: SessionId) -> ControlResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            warn!(%session, "Unbind rejected, table is closed");
            return Err(ControlError::Closed);
        }

        inner.dataplane.unbind(session)?;
        let transitions = inner.health.mark_inactive(session);
        debug!(%session, affected = transitions.len(), "Session inactive");
        inner.engine.apply(&transitions)
    }

    /// Closes the forwarding table and the publisher.
    ///
    /// Both are closed even if the first close fails; the first error is
    /// returned. Calling `close` again is a no-op.
    #[instrument(level = "debug", skip(self))]
    pub fn close(&self) -> ControlResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        let forwarding = inner.dataplane.close().map_err(|err| {
            error!(error = %err, "Closing forwarding table failed");
            ControlError::CloseForwarding(err)
        });
        let publisher = inner.engine.close().map_err(|err| {
            error!(error = %err, "Closing publisher failed");
            ControlError::ClosePublisher(err)
        });
        info!("Closed publishing routing table");

        forwarding.and(publisher)
    }

    /// Returns a snapshot of every chain's health and publication state.
    pub fn diagnostics(&self) -> Diagnostics {
        let inner = self.inner.lock();
        let chains = self
            .index
            .iter()
            .map(|(id, chain)| ChainDiagnostics {
                chain: id,
                prefixes: chain.prefixes.clone(),
                sessions: self.index.sessions_of(id).to_vec(),
                active_sessions: inner.health.active_sessions(id),
                healthy: inner.health.is_healthy(id),
                published: inner.engine.is_published(id),
            })
            .collect();
        Diagnostics {
            closed: inner.closed,
            chains,
        }
    }
}
