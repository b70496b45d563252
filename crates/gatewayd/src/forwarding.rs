//! In-memory per-session forwarding table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gateway_control::{ForwardingError, ForwardingTable, PacketWriter};
use gateway_types::SessionId;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    writers: HashMap<SessionId, Arc<dyn PacketWriter>>,
    closed: bool,
}

/// Maps each bound session to the writer of its tunnel.
#[derive(Default)]
pub struct SessionTable {
    state: RwLock<State>,
}

impl fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionTable")
            .field("sessions", &state.writers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the writer bound to `session`.
    pub fn writer(&self, session: SessionId) -> Option<Arc<dyn PacketWriter>> {
        self.state.read().writers.get(&session).cloned()
    }

    /// Returns every bound session with its writer.
    pub fn sessions(&self) -> Vec<(SessionId, Arc<dyn PacketWriter>)> {
        self.state
            .read()
            .writers
            .iter()
            .map(|(id, writer)| (*id, Arc::clone(writer)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ForwardingTable for SessionTable {
    fn bind_session(
        &self,
        session: SessionId,
        writer: Arc<dyn PacketWriter>,
    ) -> Result<(), ForwardingError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(ForwardingError::Closed);
        }
        // Rebinding replaces the previous writer.
        state.writers.insert(session, writer);
        debug!(%session, "Session bound");
        Ok(())
    }

    fn unbind_session(&self, session: SessionId) -> Result<(), ForwardingError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(ForwardingError::Closed);
        }
        if state.writers.remove(&session).is_some() {
            debug!(%session, "Session unbound");
        }
        Ok(())
    }

    fn close(&self) -> Result<(), ForwardingError> {
        let mut state = self.state.write();
        state.writers.clear();
        state.closed = true;
        Ok(())
    }
}
