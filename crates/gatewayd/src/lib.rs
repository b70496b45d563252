//! gatewayd - gateway control daemon
//!
//! Wires the configuration loader to the publishing routing table:
//!
//! - [`Gateway`]: swaps in a new routing table on every configuration reload
//! - [`SessionTable`]: in-memory per-session forwarding table
//! - [`TracingPublisher`]: route publisher that reports through tracing

mod forwarding;
mod gateway;
mod publisher;

pub use forwarding::SessionTable;
pub use gateway::Gateway;
pub use publisher::TracingPublisher;
