//! Session policy and routing policy file formats.
//!
//! Both files are JSON:
//!
//! ```text
//! session policies:
//! [
//!   {"id": 1, "traffic_matcher": "dscp=0x2", "prefixes": ["10.0.0.0/8"]},
//!   {"id": 2, "traffic_matcher": "true", "prefixes": ["10.0.0.0/8"]}
//! ]
//!
//! routing policy:
//! {
//!   "default_action": "reject",
//!   "rules": [{"action": "accept", "prefix": "10.0.0.0/8"}]
//! }
//! ```

use gateway_types::{IpPrefix, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};

/// A session and the remote prefixes reachable through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionPolicy {
    pub id: SessionId,
    /// Packet classification expression, evaluated by the dataplane.
    pub traffic_matcher: String,
    #[serde(default)]
    pub prefixes: Vec<IpPrefix>,
}

/// All session policies, in file order. Session ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionPolicies(Vec<SessionPolicy>);

impl SessionPolicies {
    /// Creates the policy set, rejecting duplicate session ids.
    pub fn new(policies: Vec<SessionPolicy>) -> ConfigResult<Self> {
        let mut seen = HashSet::new();
        for policy in &policies {
            if !seen.insert(policy.id) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "duplicate session id {}",
                    policy.id
                )));
            }
        }
        Ok(Self(policies))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionPolicy> {
        self.0.iter()
    }
}

/// Parses raw session policy files.
pub trait SessionPolicyParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> ConfigResult<SessionPolicies>;
}

/// Parser for the JSON session policy format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSessionPolicyParser;

impl SessionPolicyParser for JsonSessionPolicyParser {
    fn parse(&self, raw: &[u8]) -> ConfigResult<SessionPolicies> {
        let policies: Vec<SessionPolicy> = serde_json::from_slice(raw)
            .map_err(|e| ConfigError::InvalidPolicy(e.to_string()))?;
        SessionPolicies::new(policies)
    }
}

/// Verdict of the routing policy for a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingAction {
    Accept,
    Reject,
}

/// One routing policy rule; matches prefixes equal to or inside `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRule {
    pub action: RoutingAction,
    pub prefix: IpPrefix,
}

/// Decides which session prefixes may be advertised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingPolicy {
    pub default_action: RoutingAction,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl RoutingPolicy {
    /// Policy that rejects every prefix.
    pub fn deny_all() -> Self {
        Self {
            default_action: RoutingAction::Reject,
            rules: Vec::new(),
        }
    }

    /// Returns the action of the first rule covering `prefix`, or the default.
    pub fn action_for(&self, prefix: &IpPrefix) -> RoutingAction {
        self.rules
            .iter()
            .find(|rule| rule.prefix.contains(prefix))
            .map(|rule| rule.action)
            .unwrap_or(self.default_action)
    }

    pub fn accepts(&self, prefix: &IpPrefix) -> bool {
        self.action_for(prefix) == RoutingAction::Accept
    }

    /// Parses the JSON routing policy format.
    pub fn from_json(raw: &[u8]) -> ConfigResult<Self> {
        serde_json::from_slice(raw).map_err(|e| ConfigError::InvalidPolicy(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_session_policies() {
        let raw = br#"[
            {"id": 1, "traffic_matcher": "true", "prefixes": ["10.0.0.0/8", "2001:db8::/32"]},
            {"id": 2, "traffic_matcher": "dscp=0x2"}
        ]"#;
        let policies = JsonSessionPolicyParser.parse(raw).unwrap();

        assert_eq!(policies.len(), 2);
        let first = policies.iter().next().unwrap();
        assert_eq!(first.id, SessionId::new(1));
        assert_eq!(first.prefixes, vec![prefix("10.0.0.0/8"), prefix("2001:db8::/32")]);
        assert!(policies.iter().nth(1).unwrap().prefixes.is_empty());
    }

    #[test]
    fn test_duplicate_session_id_rejected() {
        let raw = br#"[
            {"id": 1, "traffic_matcher": "true"},
            {"id": 1, "traffic_matcher": "false"}
        ]"#;
        let err = JsonSessionPolicyParser.parse(raw).unwrap_err();
        assert_eq!(err.to_string(), "invalid policy: duplicate session id 1");
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let raw = br#"[{"id": 1, "traffic_matcher": "true", "prefixes": ["10.0.0.0/40"]}]"#;
        assert!(JsonSessionPolicyParser.parse(raw).is_err());
    }

    #[test]
    fn test_routing_policy_first_match_wins() {
        let policy = RoutingPolicy::from_json(
            br#"{
                "default_action": "accept",
                "rules": [
                    {"action": "reject", "prefix": "10.1.0.0/16"},
                    {"action": "accept", "prefix": "10.0.0.0/8"}
                ]
            }"#,
        )
        .unwrap();

        assert!(!policy.accepts(&prefix("10.1.2.0/24")));
        assert!(policy.accepts(&prefix("10.2.0.0/16")));
        // Wider than any rule: default applies.
        assert!(policy.accepts(&prefix("0.0.0.0/0")));
    }

    #[test]
    fn test_deny_all() {
        let policy = RoutingPolicy::deny_all();
        assert!(!policy.accepts(&prefix("10.0.0.0/8")));
        assert!(!policy.accepts(&prefix("::/0")));
    }

    #[test]
    fn test_routing_policy_requires_default_action() {
        assert!(RoutingPolicy::from_json(br#"{"rules": []}"#).is_err());
    }
}
