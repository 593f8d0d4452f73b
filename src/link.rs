use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tracing::debug;

use crate::command::Command;
use crate::error::Error;
use crate::topology::Endpoint;
use crate::{CONNECT_TIMEOUT, PING_TIMEOUT};

/// An open connection to one endpoint of one store.
///
/// The pool hands the same link to every caller addressing a (store, role)
/// pair, so implementations take `&self` and manage interior mutability
/// themselves.
#[async_trait]
pub trait Link: Send + Sync {
    /// Liveness probe. `true` means the affirmative reply arrived within
    /// [`PING_TIMEOUT`]; a wrong reply, protocol error or timeout all count
    /// as dead.
    async fn ping(&self) -> bool;

    /// Execute a single command, forwarding the reply verbatim.
    async fn run(&self, command: &Command) -> Result<Value, redis::RedisError>;
}

/// Opens links. A factory makes a single attempt per call; retrying is the
/// caller's business.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Link>, Error>;
}

/// [`Link`] over a multiplexed connection from the `redis` crate.
pub struct RedisLink {
    conn: MultiplexedConnection,
    addr: String,
}

#[async_trait]
impl Link for RedisLink {
    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let cmd = redis::cmd("PING");
        let probe = cmd.query_async::<_, String>(&mut conn);
        match tokio::time::timeout(PING_TIMEOUT, probe).await {
            Ok(Ok(reply)) => reply == "PONG",
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "ping failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "ping timed out");
                false
            }
        }
    }

    async fn run(&self, command: &Command) -> Result<Value, redis::RedisError> {
        let mut conn = self.conn.clone();
        to_cmd(command).query_async(&mut conn).await
    }
}

fn to_cmd(command: &Command) -> redis::Cmd {
    let mut cmd = redis::cmd(command.name());
    match command {
        Command::Get { key }
        | Command::Incr { key }
        | Command::RPop { key }
        | Command::LLen { key }
        | Command::Del { key } => {
            cmd.arg(key);
        }
        Command::Set { key, value }
        | Command::SetNx { key, value }
        | Command::LPush { key, value } => {
            cmd.arg(key).arg(value);
        }
        Command::IncrBy { key, step } => {
            cmd.arg(key).arg(*step);
        }
        Command::Expire { key, seconds } => {
            cmd.arg(key).arg(*seconds);
        }
        Command::Raw { args, .. } => {
            for arg in args {
                cmd.arg(arg);
            }
        }
    }
    cmd
}

/// [`Connector`] dialing real servers, bounded by [`CONNECT_TIMEOUT`].
#[derive(Debug, Clone)]
pub struct RedisConnector {
    timeout: Duration,
}

impl RedisConnector {
    pub fn new() -> RedisConnector {
        RedisConnector {
            timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> RedisConnector {
        RedisConnector { timeout }
    }
}

impl Default for RedisConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Link>, Error> {
        let addr = endpoint.to_string();
        let client = redis::Client::open(format!("redis://{addr}")).map_err(|source| {
            Error::Connect {
                addr: addr.clone(),
                source,
            }
        })?;
        let conn = match tokio::time::timeout(
            self.timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(source)) => return Err(Error::Connect { addr, source }),
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    addr,
                    timeout: self.timeout,
                })
            }
        };
        debug!(%addr, "connected");
        Ok(Arc::new(RedisLink { conn, addr }))
    }
}
