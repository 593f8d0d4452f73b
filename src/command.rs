use std::fmt;

use serde::{Deserialize, Serialize};

/// Read-only command names, spelled the way the wire protocol spells them.
///
/// Classification is a closed allow-list: a name missing from here routes to
/// the master, so an unrecognised or future command costs extra master load
/// instead of risking a stale read.
const READ_COMMANDS: &[&str] = &[
    "TYPE",
    "KEYS",
    "SCAN",
    "RANDOMKEY",
    "GET",
    "MGET",
    "SUBSTR",
    "STRLEN",
    "GETRANGE",
    "GETBIT",
    "LLEN",
    "LRANGE",
    "LINDEX",
    "SCARD",
    "SISMEMBER",
    "SINTER",
    "SUNION",
    "SDIFF",
    "SMEMBERS",
    "SSCAN",
    "SRANDMEMBER",
    "ZRANGE",
    "ZREVRANGE",
    "ZRANGEBYSCORE",
    "ZREVRANGEBYSCORE",
    "ZCARD",
    "ZSCORE",
    "ZCOUNT",
    "ZRANK",
    "ZREVRANK",
    "ZSCAN",
    "ZLEXCOUNT",
    "ZRANGEBYLEX",
    "ZREVRANGEBYLEX",
    "HGET",
    "HMGET",
    "HLEN",
    "HKEYS",
    "HVALS",
    "HGETALL",
    "HSCAN",
    "HSTRLEN",
    "AUTH",
    "SELECT",
    "ECHO",
    "QUIT",
    "OBJECT",
    "BITCOUNT",
    "BITPOS",
    "TIME",
    "PFCOUNT",
    "SORT",
    "BITFIELD",
    "GEOHASH",
    "GEOPOS",
    "GEODIST",
    "GEORADIUS",
    "GEORADIUSBYMEMBER",
];

/// Which replica of a store a command may run against.
///
/// Derived per call from the command; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    /// Classify a command name, case-insensitively.
    pub fn of(command: &str) -> Role {
        if READ_COMMANDS.contains(&command.to_ascii_uppercase().as_str()) {
            Role::Slave
        } else {
            Role::Master
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// Commands the router issues on its own behalf.
///
/// Each variant carries its classification statically, so adding a variant
/// without deciding where it routes is a compile error. [`Command::Raw`]
/// covers the rest of the command surface and falls back to the name-based
/// allow-list.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    SetNx { key: String, value: String },
    Incr { key: String },
    IncrBy { key: String, step: i64 },
    LPush { key: String, value: String },
    RPop { key: String },
    LLen { key: String },
    Del { key: String },
    Expire { key: String, seconds: u64 },
    Raw { name: String, args: Vec<String> },
}

impl Command {
    /// The wire name this command is sent as.
    pub fn name(&self) -> &str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::SetNx { .. } => "SETNX",
            Command::Incr { .. } => "INCR",
            Command::IncrBy { .. } => "INCRBY",
            Command::LPush { .. } => "LPUSH",
            Command::RPop { .. } => "RPOP",
            Command::LLen { .. } => "LLEN",
            Command::Del { .. } => "DEL",
            Command::Expire { .. } => "EXPIRE",
            Command::Raw { name, .. } => name,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Command::Get { .. } | Command::LLen { .. } => Role::Slave,
            Command::Set { .. }
            | Command::SetNx { .. }
            | Command::Incr { .. }
            | Command::IncrBy { .. }
            | Command::LPush { .. }
            | Command::RPop { .. }
            | Command::Del { .. }
            | Command::Expire { .. } => Role::Master,
            Command::Raw { name, .. } => Role::of(name),
        }
    }
}
