//! Route publishing driven by chain health transitions.

use gateway_types::{AddressFamily, IpPrefix};
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::{ChainId, RoutingChainIndex};
use crate::error::{ControlError, ControlResult, PublishError};
use crate::health::ChainHealth;

/// The gateway's own source address, one per address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSources {
    pub v4: Ipv4Addr,
    pub v6: Ipv6Addr,
}

impl RouteSources {
    pub fn new(v4: Ipv4Addr, v6: Ipv6Addr) -> Self {
        Self { v4, v6 }
    }

    /// Returns the source address for the given family.
    pub fn for_family(&self, family: AddressFamily) -> IpAddr {
        match family {
            AddressFamily::V4 => IpAddr::V4(self.v4),
            AddressFamily::V6 => IpAddr::V6(self.v6),
        }
    }
}

/// Fixed values stamped into every published route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishingConfig {
    /// Local next hop installed for all routes. `None` publishes routes
    /// without an explicit next hop.
    pub next_hop: Option<IpAddr>,
    pub sources: RouteSources,
}

impl PublishingConfig {
    pub fn new(sources: RouteSources) -> Self {
        Self {
            next_hop: None,
            sources,
        }
    }

    pub fn with_next_hop(mut self, next_hop: IpAddr) -> Self {
        self.next_hop = Some(next_hop);
        self
    }
}

/// A route handed to the external publisher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Route {
    pub prefix: IpPrefix,
    pub source: IpAddr,
    pub next_hop: Option<IpAddr>,
}

impl Route {
    /// Builds the route for `prefix`, picking the source of the prefix's family.
    pub fn new(prefix: IpPrefix, config: &PublishingConfig) -> Self {
        Self {
            prefix,
            source: config.sources.for_family(prefix.family()),
            next_hop: config.next_hop,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} src {}", self.prefix, self.source)?;
        if let Some(next_hop) = self.next_hop {
            write!(f, " via {}", next_hop)?;
        }
        Ok(())
    }
}

/// Outbound interface to the external routing surface.
///
/// Calls arrive from a single serialized caller. Every `add_route` is
/// preceded by no unmatched `add_route` of the same route, and every
/// `delete_route` matches an earlier `add_route`.
#[cfg_attr(test, mockall::automock)]
pub trait Publisher: Send + Sync {
    fn add_route(&self, route: &Route) -> Result<(), PublishError>;

    fn delete_route(&self, route: &Route) -> Result<(), PublishError>;

    fn close(&self) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteOp {
    Add,
    Delete,
}

/// Issues the minimal set of publisher calls for chain health transitions.
///
/// Owns the published flag of every chain. Publication follows chain-level
/// aggregate health: a chain whose new health equals its published flag
/// causes no publisher call.
pub struct PublishEngine {
    index: Arc<RoutingChainIndex>,
    publisher: Arc<dyn Publisher>,
    config: PublishingConfig,
    published: Vec<bool>,
}

impl fmt::Debug for PublishEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishEngine")
            .field("config", &self.config)
            .field("chains", &self.published.len())
            .field(
                "published",
                &self.published.iter().filter(|p| **p).count(),
            )
            .finish()
    }
}

impl PublishEngine {
    pub fn new(
        index: Arc<RoutingChainIndex>,
        publisher: Arc<dyn Publisher>,
        config: PublishingConfig,
    ) -> Self {
        let published = vec![false; index.len()];
        Self {
            index,
            publisher,
            config,
            published,
        }
    }

    /// Returns true if the chain's routes are currently advertised.
    pub fn is_published(&self, chain: ChainId) -> bool {
        self.published.get(chain.0).copied().unwrap_or(false)
    }

    /// Returns the routes of the chain, in prefix order.
    pub fn routes(&self, chain: ChainId) -> Vec<Route> {
        self.index
            .get(chain)
            .map(|c| {
                c.prefixes
                    .iter()
                    .map(|prefix| Route::new(*prefix, &self.config))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Applies a batch of health transitions.
    ///
    /// Every chain of the batch is processed before returning. A transition is
    /// recorded even if a publisher call fails, so no call is ever repeated;
    /// the first failure is returned.
    pub fn apply(&mut self, transitions: &[ChainHealth]) -> ControlResult<()> {
        let mut first_err = None;
        for transition in transitions {
            let Some(published) = self.published.get(transition.chain.0).copied() else {
                continue;
            };
            if published == transition.healthy {
                continue;
            }

            let op = if transition.healthy {
                RouteOp::Add
            } else {
                RouteOp::Delete
            };
            if let Err(err) = self.issue(transition.chain, op) {
                first_err.get_or_insert(err);
            }
            self.published[transition.chain.0] = transition.healthy;
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn issue(&self, chain: ChainId, op: RouteOp) -> ControlResult<()> {
        let mut first_err = None;
        for route in self.routes(chain) {
            let result = match op {
                RouteOp::Add => self.publisher.add_route(&route),
                RouteOp::Delete => self.publisher.delete_route(&route),
            };
            match result {
                Ok(()) => match op {
                    RouteOp::Add => info!(%chain, route = %route, "Published route"),
                    RouteOp::Delete => info!(%chain, route = %route, "Withdrew route"),
                },
                Err(source) => {
                    error!(%chain, route = %route, error = %source, ?op, "Publisher call failed");
                    first_err.get_or_insert(ControlError::Publish { route, source });
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Closes the publisher. Published routes are left in place.
    pub fn close(&self) -> Result<(), PublishError> {
        self.publisher.close()
    }
}
