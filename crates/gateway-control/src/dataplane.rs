//! Pass-through to the per-session forwarding table.

use gateway_types::SessionId;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{ControlError, ControlResult, ForwardingError};

/// Writes packets into a session's tunnel.
///
/// The control plane never writes packets itself; it only hands writers to
/// the forwarding table.
pub trait PacketWriter: Send + Sync {
    fn write_packet(&self, packet: &[u8]);
}

/// Per-session forwarding table of the dataplane.
#[cfg_attr(test, mockall::automock)]
pub trait ForwardingTable: Send + Sync {
    /// Installs `writer` as the forwarding path of the session.
    fn bind_session(
        &self,
        session: SessionId,
        writer: Arc<dyn PacketWriter>,
    ) -> Result<(), ForwardingError>;

    /// Removes the forwarding path of the session.
    fn unbind_session(&self, session: SessionId) -> Result<(), ForwardingError>;

    fn close(&self) -> Result<(), ForwardingError>;
}

/// Forwards session events to the [`ForwardingTable`], independent of any
/// route publication decision.
#[derive(Clone)]
pub struct DataplaneAdapter {
    table: Arc<dyn ForwardingTable>,
}

impl fmt::Debug for DataplaneAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataplaneAdapter").finish_non_exhaustive()
    }
}

impl DataplaneAdapter {
    pub fn new(table: Arc<dyn ForwardingTable>) -> Self {
        Self { table }
    }

    pub fn bind(&self, session: SessionId, writer: Arc<dyn PacketWriter>) -> ControlResult<()> {
        debug!(%session, "Binding session in forwarding table");
        self.table
            .bind_session(session, writer)
            .map_err(|source| forwarding_error("bind", session, source))
    }

    pub fn unbind(&self, session: SessionId) -> ControlResult<()> {
        debug!(%session, "Unbinding session from forwarding table");
        self.table
            .unbind_session(session)
            .map_err(|source| forwarding_error("unbind", session, source))
    }

    pub fn close(&self) -> Result<(), ForwardingError> {
        self.table.close()
    }
}

fn forwarding_error(
    operation: &'static str,
    session: SessionId,
    source: ForwardingError,
) -> ControlError {
    error!(%session, operation, error = %source, "Forwarding table call failed");
    ControlError::Forwarding {
        operation,
        session,
        source,
    }
}
