//! Read/write-splitting access layer for master/replica Redis stores.
//!
//! Writes always land on a store's master; reads go to a replica until the
//! process has opened a master connection for that store, after which reads
//! prefer the master too. The bias narrows the window where a read lands on
//! a replica that has not yet caught up with a recent write.

use std::time::Duration;

pub mod command;
pub mod error;
pub mod link;
pub mod pool;
pub mod router;
pub mod topology;

pub use command::{Command, Role};
pub use error::Error;
pub use link::{Connector, Link, RedisConnector};
pub use pool::{ConnectionPool, Resolver};
pub use router::{Degraded, Router};
pub use topology::{Endpoint, ReplicaSet, Topology};

/// Deadline for a single connect attempt against a configured endpoint.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for the PING probe deciding whether a pooled connection is
/// still usable.
pub const PING_TIMEOUT: Duration = Duration::from_secs(1);

pub type Result<T> = std::result::Result<T, Error>;
