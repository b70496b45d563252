//! Common gateway types shared by the control plane crates.
//!
//! - [`IpPrefix`]: IP network prefixes (CIDR notation), normalised to the
//!   network address
//! - [`AddressFamily`]: IPv4 / IPv6 discrimination for prefixes and addresses
//! - [`SessionId`]: identifier of a gateway session (a tunnel towards a
//!   remote gateway)

mod ip;
mod session;

pub use ip::{AddressFamily, IpPrefix};
pub use session::SessionId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}
