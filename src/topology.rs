use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::Role;
use crate::error::Error;

/// A single reachable address for one role of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("expected host:port, got '{0}'")]
pub struct ParseEndpointError(String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Endpoint, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseEndpointError(s.to_owned()))?;
        let port = port
            .parse()
            .map_err(|_| ParseEndpointError(s.to_owned()))?;
        if host.is_empty() {
            return Err(ParseEndpointError(s.to_owned()));
        }
        Ok(Endpoint::new(host, port))
    }
}

/// Master endpoint plus an optional read replica for one logical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSet {
    pub master: Endpoint,
    #[serde(default)]
    pub slave: Option<Endpoint>,
}

/// Endpoint lookup table for every logical store this process may address.
///
/// Built by whatever owns process configuration; the access layer only ever
/// reads from it. A store with no replica serves reads from its master only
/// after the caller asks for the master — a [`Role::Slave`] lookup on such a
/// store is a configuration error, not a silent fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    stores: HashMap<String, ReplicaSet>,
}

impl Topology {
    pub fn new() -> Topology {
        Topology::default()
    }

    pub fn insert(&mut self, store: impl Into<String>, replicas: ReplicaSet) {
        self.stores.insert(store.into(), replicas);
    }

    pub fn with_store(mut self, store: impl Into<String>, replicas: ReplicaSet) -> Topology {
        self.insert(store, replicas);
        self
    }

    /// The endpoint serving `role` for `store`.
    pub fn endpoint(&self, store: &str, role: Role) -> Result<&Endpoint, Error> {
        let missing = || Error::NoEndpoint {
            store: store.to_owned(),
            role,
        };
        let replicas = self.stores.get(store).ok_or_else(missing)?;
        match role {
            Role::Master => Ok(&replicas.master),
            Role::Slave => replicas.slave.as_ref().ok_or_else(missing),
        }
    }
}
