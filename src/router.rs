use std::sync::Arc;

use redis::{from_redis_value, FromRedisValue, Value};
use tracing::error;

use crate::command::{Command, Role};
use crate::error::Error;
use crate::link::{Connector, Link, RedisConnector};
use crate::pool::{ConnectionPool, Resolver};
use crate::topology::Topology;
use crate::Result;

/// Command router for replicated stores.
///
/// Every operation classifies itself, resolves one link through the shared
/// pool (master preference applies), executes on that link, and returns the
/// typed reply. Composite operations arm the key's expiry first and then
/// mutate, both on the one resolved link; the pair is not atomic.
///
/// Clones share the pool, so the master bias is per process, not per
/// handle. Failures surface as [`Error`]; callers that want the legacy
/// swallow-everything contract use [`Router::degraded`].
#[derive(Clone)]
pub struct Router {
    resolver: Resolver,
}

impl Router {
    /// Router dialing real servers with the default connect deadline.
    pub fn new(topology: Topology) -> Router {
        Router::with_connector(topology, Arc::new(RedisConnector::new()))
    }

    pub fn with_connector(topology: Topology, connector: Arc<dyn Connector>) -> Router {
        Router {
            resolver: Resolver::new(Arc::new(topology), connector),
        }
    }

    /// Compose with an injected pool, shared across routers or isolated
    /// per test.
    pub fn with_pool(
        topology: Topology,
        connector: Arc<dyn Connector>,
        pool: Arc<ConnectionPool>,
    ) -> Router {
        Router {
            resolver: Resolver::with_pool(Arc::new(topology), connector, pool),
        }
    }

    /// Failure-swallowing view of this router.
    pub fn degraded(&self) -> Degraded<'_> {
        Degraded { router: self }
    }

    pub fn pool(&self) -> &ConnectionPool {
        self.resolver.pool()
    }

    /// Resolve once and execute a single command.
    pub async fn dispatch(&self, store: &str, command: Command) -> Result<Value> {
        let link = self.resolver.resolve(store, command.role()).await?;
        self.run(&link, command).await
    }

    /// Forward any other store command verbatim, classified by name.
    pub async fn execute(&self, store: &str, name: &str, args: Vec<String>) -> Result<Value> {
        self.dispatch(
            store,
            Command::Raw {
                name: name.to_owned(),
                args,
            },
        )
        .await
    }

    pub async fn get(&self, store: &str, key: &str) -> Result<Option<String>> {
        let reply = self
            .dispatch(store, Command::Get { key: key.to_owned() })
            .await?;
        convert("GET", &reply)
    }

    /// Arm the expiry, then write the value.
    pub async fn set(&self, store: &str, key: &str, value: &str, ttl: u64) -> Result<bool> {
        let link = self.write_link(store, "SET", ttl).await?;
        self.expire(&link, key, ttl).await?;
        let reply = self
            .run(
                &link,
                Command::Set {
                    key: key.to_owned(),
                    value: value.to_owned(),
                },
            )
            .await?;
        convert("SET", &reply)
    }

    /// Arm the expiry, then increment.
    pub async fn incr(&self, store: &str, key: &str, ttl: u64) -> Result<i64> {
        let link = self.write_link(store, "INCR", ttl).await?;
        self.expire(&link, key, ttl).await?;
        let reply = self
            .run(&link, Command::Incr { key: key.to_owned() })
            .await?;
        convert("INCR", &reply)
    }

    /// Arm the expiry, then increment by `step`.
    pub async fn incr_by(&self, store: &str, key: &str, step: i64, ttl: u64) -> Result<i64> {
        let link = self.write_link(store, "INCRBY", ttl).await?;
        self.expire(&link, key, ttl).await?;
        let reply = self
            .run(
                &link,
                Command::IncrBy {
                    key: key.to_owned(),
                    step,
                },
            )
            .await?;
        convert("INCRBY", &reply)
    }

    /// Append to the list head, arming the expiry first when one is given.
    /// Returns the list length after the push.
    pub async fn push(&self, store: &str, key: &str, value: &str, ttl: Option<u64>) -> Result<i64> {
        let link = self.resolver.resolve(store, Role::Master).await?;
        if let Some(seconds) = ttl.filter(|&s| s != 0) {
            self.expire(&link, key, seconds).await?;
        }
        let reply = self
            .run(
                &link,
                Command::LPush {
                    key: key.to_owned(),
                    value: value.to_owned(),
                },
            )
            .await?;
        convert("LPUSH", &reply)
    }

    /// Take from the list tail.
    pub async fn pop(&self, store: &str, key: &str) -> Result<Option<String>> {
        let reply = self
            .dispatch(store, Command::RPop { key: key.to_owned() })
            .await?;
        convert("RPOP", &reply)
    }

    pub async fn list_len(&self, store: &str, key: &str) -> Result<usize> {
        let reply = self
            .dispatch(store, Command::LLen { key: key.to_owned() })
            .await?;
        convert("LLEN", &reply)
    }

    /// Returns how many keys were removed.
    pub async fn del(&self, store: &str, key: &str) -> Result<i64> {
        let reply = self
            .dispatch(store, Command::Del { key: key.to_owned() })
            .await?;
        convert("DEL", &reply)
    }

    /// Arm the expiry, then write only if the key is absent. `true` when
    /// the write happened.
    pub async fn set_if_absent(
        &self,
        store: &str,
        key: &str,
        value: &str,
        ttl: u64,
    ) -> Result<bool> {
        let link = self.write_link(store, "SETNX", ttl).await?;
        self.expire(&link, key, ttl).await?;
        let reply = self
            .run(
                &link,
                Command::SetNx {
                    key: key.to_owned(),
                    value: value.to_owned(),
                },
            )
            .await?;
        convert("SETNX", &reply)
    }

    /// The master link for a ttl-guarded write. The guard runs before any
    /// resolution, so a missing ttl never touches the network.
    async fn write_link(
        &self,
        store: &str,
        command: &'static str,
        ttl: u64,
    ) -> Result<Arc<dyn Link>> {
        if ttl == 0 {
            return Err(Error::MissingTtl { command });
        }
        self.resolver.resolve(store, Role::Master).await
    }

    async fn expire(&self, link: &Arc<dyn Link>, key: &str, seconds: u64) -> Result<Value> {
        self.run(
            link,
            Command::Expire {
                key: key.to_owned(),
                seconds,
            },
        )
        .await
    }

    async fn run(&self, link: &Arc<dyn Link>, command: Command) -> Result<Value> {
        link.run(&command).await.map_err(|source| Error::Command {
            command: command.name().to_owned(),
            source,
        })
    }
}

fn convert<T: FromRedisValue>(command: &str, reply: &Value) -> Result<T> {
    from_redis_value(reply).map_err(|source| Error::Command {
        command: command.to_owned(),
        source,
    })
}

/// Operations that never fail across the call boundary.
///
/// Every error becomes one structured diagnostic — operation, error detail,
/// and the endpoint configured for the operation's role — plus a sentinel
/// return (`None`, `false`). The price is that a configuration mistake and
/// a network blip look identical to the caller; use the [`Router`] surface
/// when the distinction matters.
pub struct Degraded<'a> {
    router: &'a Router,
}

impl Degraded<'_> {
    /// `None` means missing key *or* failure, as the legacy contract had it.
    pub async fn get(&self, store: &str, key: &str) -> Option<String> {
        match self.router.get(store, key).await {
            Ok(value) => value,
            Err(err) => self.report(store, "GET", err),
        }
    }

    pub async fn set(&self, store: &str, key: &str, value: &str, ttl: u64) -> bool {
        match self.router.set(store, key, value, ttl).await {
            Ok(written) => written,
            Err(err) => {
                self.report::<bool>(store, "SET", err);
                false
            }
        }
    }

    pub async fn incr(&self, store: &str, key: &str, ttl: u64) -> Option<i64> {
        match self.router.incr(store, key, ttl).await {
            Ok(n) => Some(n),
            Err(err) => self.report(store, "INCR", err),
        }
    }

    pub async fn incr_by(&self, store: &str, key: &str, step: i64, ttl: u64) -> Option<i64> {
        match self.router.incr_by(store, key, step, ttl).await {
            Ok(n) => Some(n),
            Err(err) => self.report(store, "INCRBY", err),
        }
    }

    pub async fn push(&self, store: &str, key: &str, value: &str, ttl: Option<u64>) -> Option<i64> {
        match self.router.push(store, key, value, ttl).await {
            Ok(len) => Some(len),
            Err(err) => self.report(store, "LPUSH", err),
        }
    }

    pub async fn pop(&self, store: &str, key: &str) -> Option<String> {
        match self.router.pop(store, key).await {
            Ok(value) => value,
            Err(err) => self.report(store, "RPOP", err),
        }
    }

    pub async fn list_len(&self, store: &str, key: &str) -> Option<usize> {
        match self.router.list_len(store, key).await {
            Ok(len) => Some(len),
            Err(err) => self.report(store, "LLEN", err),
        }
    }

    pub async fn del(&self, store: &str, key: &str) -> Option<i64> {
        match self.router.del(store, key).await {
            Ok(removed) => Some(removed),
            Err(err) => self.report(store, "DEL", err),
        }
    }

    pub async fn set_if_absent(&self, store: &str, key: &str, value: &str, ttl: u64) -> bool {
        match self.router.set_if_absent(store, key, value, ttl).await {
            Ok(written) => written,
            Err(err) => {
                self.report::<bool>(store, "SETNX", err);
                false
            }
        }
    }

    pub async fn execute(&self, store: &str, name: &str, args: Vec<String>) -> Option<Value> {
        match self.router.execute(store, name, args).await {
            Ok(reply) => Some(reply),
            Err(err) => self.report(store, name, err),
        }
    }

    fn report<T>(&self, store: &str, operation: &str, err: Error) -> Option<T> {
        let endpoint = self
            .router
            .resolver
            .topology()
            .endpoint(store, Role::of(operation))
            .ok();
        error!(
            category = err.category(),
            store,
            operation,
            error = %err,
            endpoint = ?endpoint,
            "store operation failed"
        );
        None
    }
}
