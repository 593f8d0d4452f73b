use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::command::Role;
use crate::error::Error;
use crate::link::{Connector, Link};
use crate::topology::Topology;

/// Process-wide cache of open links, one slot per (store, role).
///
/// A slot holds at most one link. Inserting for a pair that already has one
/// unconditionally supersedes it; superseded links are never closed here,
/// they drop once the last caller lets go of its handle.
pub struct ConnectionPool {
    links: DashMap<(String, Role), Arc<dyn Link>>,
}

impl ConnectionPool {
    pub fn new() -> ConnectionPool {
        ConnectionPool {
            links: DashMap::new(),
        }
    }

    pub fn get(&self, store: &str, role: Role) -> Option<Arc<dyn Link>> {
        self.links
            .get(&(store.to_owned(), role))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// The pooled link for the pair, if there is one and it passes the
    /// liveness probe.
    pub async fn live(&self, store: &str, role: Role) -> Option<Arc<dyn Link>> {
        let link = self.get(store, role)?;
        if link.ping().await {
            Some(link)
        } else {
            debug!(store, %role, "pooled link failed its probe");
            None
        }
    }

    pub fn insert(&self, store: impl Into<String>, role: Role, link: Arc<dyn Link>) {
        self.links.insert((store.into(), role), link);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("entries", &self.links.len())
            .finish()
    }
}

/// Picks the link a command runs on.
///
/// Resolution order, per store:
/// 1. a live pooled master link, whatever role was asked for. Once the
///    process has touched a store's master, that store's reads follow it
///    too, which keeps read-after-write sequences off lagging replicas.
///    The preference is store-scoped, not caller-scoped, because the pool
///    is shared.
/// 2. a live pooled link for the requested role.
/// 3. a freshly dialed link for the requested role, cached for the next
///    caller and superseding whatever stale entry held that slot.
#[derive(Clone)]
pub struct Resolver {
    topology: Arc<Topology>,
    pool: Arc<ConnectionPool>,
    connector: Arc<dyn Connector>,
}

impl Resolver {
    pub fn new(topology: Arc<Topology>, connector: Arc<dyn Connector>) -> Resolver {
        Resolver::with_pool(topology, connector, Arc::new(ConnectionPool::new()))
    }

    /// Compose with an externally owned pool. Resolvers sharing a pool
    /// share its connections and its master preference.
    pub fn with_pool(
        topology: Arc<Topology>,
        connector: Arc<dyn Connector>,
        pool: Arc<ConnectionPool>,
    ) -> Resolver {
        Resolver {
            topology,
            pool,
            connector,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub async fn resolve(&self, store: &str, role: Role) -> Result<Arc<dyn Link>, Error> {
        if let Some(master) = self.pool.live(store, Role::Master).await {
            debug!(store, requested = %role, "using pooled master link");
            return Ok(master);
        }
        // The master slot was just probed; only other roles warrant a
        // second pool lookup.
        if role != Role::Master {
            if let Some(link) = self.pool.live(store, role).await {
                debug!(store, %role, "using pooled link");
                return Ok(link);
            }
        }
        let endpoint = self.topology.endpoint(store, role)?;
        let link = self.connector.connect(endpoint).await?;
        debug!(store, %role, endpoint = %endpoint, "dialed new link");
        self.pool.insert(store, role, Arc::clone(&link));
        Ok(link)
    }
}
