//! Route publisher that logs every route operation.

use std::collections::HashSet;

use gateway_control::{PublishError, Publisher, Route};
use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Default)]
struct State {
    installed: HashSet<Route>,
    closed: bool,
}

/// Publisher that records installed routes and reports them through tracing.
///
/// Used when no routing daemon is attached. It enforces the publisher
/// contract: adding an installed route or deleting an absent one fails.
#[derive(Debug, Default)]
pub struct TracingPublisher {
    state: Mutex<State>,
}

impl TracingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently installed routes, sorted by display form.
    pub fn installed(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.state.lock().installed.iter().cloned().collect();
        routes.sort_by_key(|route| route.to_string());
        routes
    }
}

impl Publisher for TracingPublisher {
    fn add_route(&self, route: &Route) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PublishError::Closed);
        }
        if !state.installed.insert(route.clone()) {
            return Err(PublishError::AlreadyPublished(route.clone()));
        }
        info!(%route, installed = state.installed.len(), "Route added");
        Ok(())
    }

    fn delete_route(&self, route: &Route) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PublishError::Closed);
        }
        if !state.installed.remove(route) {
            return Err(PublishError::NotPublished(route.clone()));
        }
        info!(%route, installed = state.installed.len(), "Route deleted");
        Ok(())
    }

    /// Retracts every installed route, then rejects further calls.
    fn close(&self) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        for route in state.installed.drain() {
            info!(%route, "Route retracted on close");
        }
        info!("Route publisher closed");
        Ok(())
    }
}
