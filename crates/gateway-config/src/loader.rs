//! Trigger-driven policy loader.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{RoutingPolicy, SessionPolicies, SessionPolicyParser};

/// Well-known policy file locations.
pub mod defaults {
    pub const DEFAULT_SESSION_POLICIES_FILE: &str = "/share/conf/session.policy";
    pub const DEFAULT_ROUTING_POLICY_FILE: &str = "/share/conf/ip_routing.policy";
}

/// Receives every successfully loaded configuration.
pub trait ConfigPublisher: Send + Sync {
    fn publish(&self, sessions: SessionPolicies, routing: RoutingPolicy);
}

/// Reads and parses the session policies file.
pub fn load_session_policies(
    path: &Path,
    parser: &dyn SessionPolicyParser,
) -> ConfigResult<SessionPolicies> {
    let raw = fs::read(path).map_err(|e| ConfigError::io(path, e))?;
    parser.parse(&raw).map_err(|e| ConfigError::parse(path, e))
}

/// Reads and parses the routing policy file.
///
/// A missing file at `default_path` yields [`RoutingPolicy::deny_all`]; a
/// missing file anywhere else is an error.
pub fn load_routing_policy(path: &Path, default_path: &Path) -> ConfigResult<RoutingPolicy> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound && path == default_path => {
            warn!(path = %path.display(), "Routing policy not found, rejecting all prefixes");
            return Ok(RoutingPolicy::deny_all());
        }
        Err(e) => return Err(ConfigError::io(path, e)),
    };
    RoutingPolicy::from_json(&raw).map_err(|e| ConfigError::parse(path, e))
}

/// Builder for [`Loader`]. Every field is required except the default
/// routing policy path, which falls back to
/// [`defaults::DEFAULT_ROUTING_POLICY_FILE`].
#[derive(Default)]
pub struct LoaderBuilder {
    session_policies_file: Option<PathBuf>,
    routing_policy_file: Option<PathBuf>,
    default_routing_policy_file: Option<PathBuf>,
    publisher: Option<Arc<dyn ConfigPublisher>>,
    trigger: Option<mpsc::Receiver<()>>,
    parser: Option<Arc<dyn SessionPolicyParser>>,
}

impl LoaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_policies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_policies_file = Some(path.into());
        self
    }

    pub fn routing_policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.routing_policy_file = Some(path.into());
        self
    }

    /// Path at which a missing routing policy means "reject everything".
    pub fn default_routing_policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_routing_policy_file = Some(path.into());
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn ConfigPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn trigger(mut self, trigger: mpsc::Receiver<()>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn SessionPolicyParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Validates the fields and creates the loader.
    ///
    /// Fails on the first missing field; empty paths count as missing.
    pub fn build(self) -> ConfigResult<Loader> {
        let session_policies_file = self
            .session_policies_file
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::missing("session policies file"))?;
        let routing_policy_file = self
            .routing_policy_file
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::missing("routing policy file"))?;
        let publisher = self
            .publisher
            .ok_or_else(|| ConfigError::missing("publisher"))?;
        let trigger = self.trigger.ok_or_else(|| ConfigError::missing("trigger"))?;
        let parser = self.parser.ok_or_else(|| ConfigError::missing("parser"))?;

        Ok(Loader {
            session_policies_file,
            routing_policy_file,
            default_routing_policy_file: self
                .default_routing_policy_file
                .unwrap_or_else(|| PathBuf::from(defaults::DEFAULT_ROUTING_POLICY_FILE)),
            publisher,
            trigger,
            parser,
        })
    }
}

/// Reloads both policy files on every trigger and publishes the result.
pub struct Loader {
    session_policies_file: PathBuf,
    routing_policy_file: PathBuf,
    default_routing_policy_file: PathBuf,
    publisher: Arc<dyn ConfigPublisher>,
    trigger: mpsc::Receiver<()>,
    parser: Arc<dyn SessionPolicyParser>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("session_policies_file", &self.session_policies_file)
            .field("routing_policy_file", &self.routing_policy_file)
            .finish_non_exhaustive()
    }
}

impl Loader {
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Loads both files once.
    pub fn load(&self) -> ConfigResult<(SessionPolicies, RoutingPolicy)> {
        let sessions = load_session_policies(&self.session_policies_file, self.parser.as_ref())?;
        let routing =
            load_routing_policy(&self.routing_policy_file, &self.default_routing_policy_file)?;
        Ok((sessions, routing))
    }

    /// Runs until `cancel` fires or the trigger channel closes.
    pub async fn run(mut self, cancel: CancellationToken) -> ConfigResult<()> {
        info!(
            session_policies = %self.session_policies_file.display(),
            routing_policy = %self.routing_policy_file.display(),
            "Configuration loader started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Configuration loader cancelled");
                    break;
                }
                trigger = self.trigger.recv() => {
                    if trigger.is_none() {
                        debug!("Reload trigger closed");
                        break;
                    }
                    self.reload();
                }
            }
        }

        info!("Configuration loader stopped");
        Ok(())
    }

    fn reload(&self) {
        match self.load() {
            Ok((sessions, routing)) => {
                info!(
                    sessions = sessions.len(),
                    rules = routing.rules.len(),
                    "Loaded configuration"
                );
                self.publisher.publish(sessions, routing);
            }
            Err(e) => {
                error!(error = %e, "Failed to load configuration, keeping previous");
            }
        }
    }
}
