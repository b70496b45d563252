//! Error types for the control plane.

use gateway_types::SessionId;
use thiserror::Error;

use crate::publish::Route;

/// Result type alias for control plane operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors reported by a route publisher.
///
/// Under correct bookkeeping none of these occur; they signal a contract
/// violation or a broken backend and are never retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("route already published: {0}")]
    AlreadyPublished(Route),

    #[error("route not published: {0}")]
    NotPublished(Route),

    #[error("publisher is closed")]
    Closed,

    #[error("publisher backend error: {0}")]
    Backend(String),
}

/// Errors reported by the per-session forwarding table.
#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("forwarding table is closed")]
    Closed,

    #[error("session {session} rejected: {reason}")]
    Rejected {
        /// The session the operation was issued for.
        session: SessionId,
        /// Why the forwarding table refused it.
        reason: String,
    },

    #[error("forwarding backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the publishing routing table.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The dataplane bind/unbind failed; health and published state are unchanged.
    #[error("dataplane {operation} for session {session} failed")]
    Forwarding {
        /// "bind" or "unbind".
        operation: &'static str,
        /// The session the call was issued for.
        session: SessionId,
        #[source]
        source: ForwardingError,
    },

    /// A publisher call failed.
    #[error("publisher call for route {route} failed")]
    Publish {
        /// The route that was being published or withdrawn.
        route: Route,
        #[source]
        source: PublishError,
    },

    /// The table was closed; no further session events are accepted.
    #[error("publishing routing table is closed")]
    Closed,

    #[error("closing forwarding table failed")]
    CloseForwarding(#[source] ForwardingError),

    #[error("closing publisher failed")]
    ClosePublisher(#[source] PublishError),
}

impl ControlError {
    /// Returns true if the error originates from the dataplane collaborator.
    pub fn is_forwarding(&self) -> bool {
        matches!(
            self,
            ControlError::Forwarding { .. } | ControlError::CloseForwarding(_)
        )
    }
}
