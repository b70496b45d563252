//! Session identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a gateway session.
///
/// Session ids are assigned by the session policies; the control plane only
/// uses them as opaque keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn new(id: u32) -> Self {
        SessionId(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(SessionId)
            .map_err(|_| ParseError::InvalidSessionId(s.to_string()))
    }
}

impl From<u32> for SessionId {
    fn from(id: u32) -> Self {
        SessionId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_parse() {
        let id: SessionId = "42".parse().unwrap();
        assert_eq!(id, SessionId::new(42));
        assert_eq!(id.to_string(), "42");

        assert!("-1".parse::<SessionId>().is_err());
        assert!("one".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_serde_transparent() {
        let id: SessionId = serde_json::from_str("7").unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
