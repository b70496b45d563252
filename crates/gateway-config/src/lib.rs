//! Gateway configuration loading.
//!
//! This crate feeds the control plane with configuration:
//!
//! - [`policy`]: session policy and routing policy file formats
//! - [`build_routing_chains`]: turns a loaded configuration into routing chains
//! - [`Loader`]: reloads the policy files whenever a trigger fires and hands
//!   the result to a [`ConfigPublisher`]
//! - [`error`]: error types for configuration handling
//!
//! # Reload model
//!
//! The loader is a single cooperative loop. Each trigger reloads both files;
//! a failed reload is logged and publishes nothing, so the configuration in
//! effect stays untouched. A missing routing policy at the default path is
//! not an error: it yields a policy that rejects everything.

mod chains;
pub mod error;
mod loader;
pub mod policy;

pub use chains::build_routing_chains;
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    defaults, load_routing_policy, load_session_policies, ConfigPublisher, Loader, LoaderBuilder,
};
pub use policy::{
    JsonSessionPolicyParser, RoutingAction, RoutingPolicy, RoutingRule, SessionPolicies,
    SessionPolicy, SessionPolicyParser,
};
