use std::time::Duration;

use crate::command::Role;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no {role} endpoint configured for store '{store}'")]
    NoEndpoint { store: String, role: Role },

    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: redis::RedisError,
    },

    #[error("{command} failed: {source}")]
    Command {
        command: String,
        source: redis::RedisError,
    },

    #[error("{command} requires an expiry")]
    MissingTtl { command: &'static str },
}

impl Error {
    /// Category label attached to failure diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::NoEndpoint { .. } => "config",
            Error::ConnectTimeout { .. } | Error::Connect { .. } => "connect",
            Error::Command { .. } | Error::MissingTtl { .. } => "command",
        }
    }
}
