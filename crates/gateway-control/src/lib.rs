//! Gateway control plane core.
//!
//! This crate decides, per routing chain, whether the gateway has a usable
//! forwarding path and publishes or withdraws the chain's routes
//! accordingly:
//!
//! - [`RoutingChainIndex`]: immutable chains plus a session -> chains index
//! - [`HealthTracker`]: which sessions are active, and the resulting chain health
//! - [`PublishEngine`]: turns chain health transitions into publisher calls
//! - [`DataplaneAdapter`]: forwards session bind/unbind to the forwarding table
//! - [`PublishingRoutingTable`]: the orchestrator used by session management
//!
//! # Architecture
//!
//! A session lifecycle event flows through the table under a single lock:
//!
//! 1. The forwarding table is updated (bind/unbind), unconditionally
//! 2. The health tracker updates the chains the session is eligible for
//! 3. The publish engine issues AddRoute/DeleteRoute for chains whose
//!    aggregate health changed, and nothing otherwise
//!
//! # Example
//!
//! ```ignore
//! use gateway_control::{PublishingConfig, PublishingRoutingTable, RouteSources};
//!
//! let table = PublishingRoutingTable::new(
//!     chains,
//!     forwarding_table,
//!     publisher,
//!     PublishingConfig::new(RouteSources::new(source_v4, source_v6)),
//! );
//!
//! table.bind(SessionId::new(1), writer)?;   // publishes the chain's routes
//! table.unbind(SessionId::new(1))?;         // withdraws them again
//! table.close()?;
//! ```

mod chain;
mod dataplane;
mod diagnostics;
mod error;
mod health;
mod publish;
mod table;

pub use chain::{ChainId, RoutingChain, RoutingChainIndex, TrafficMatcher};
pub use dataplane::{DataplaneAdapter, ForwardingTable, PacketWriter};
pub use diagnostics::{ChainDiagnostics, Diagnostics};
pub use error::{ControlError, ControlResult, ForwardingError, PublishError};
pub use health::{ChainHealth, HealthTracker};
pub use publish::{PublishEngine, Publisher, PublishingConfig, Route, RouteSources};
pub use table::PublishingRoutingTable;
