use clap::{Parser, Subcommand};
use shunt::{Endpoint, ReplicaSet, Router, Topology};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    /// Logical store the command addresses.
    #[clap(long, default_value = "default")]
    store: String,

    /// Master endpoint, host:port.
    #[clap(long)]
    master: Endpoint,

    /// Replica endpoint, host:port.
    #[clap(long)]
    slave: Option<Endpoint>,

    #[clap(long, default_value = "info", env = "SHUNT_LOG")]
    log_level: tracing_subscriber::filter::LevelFilter,

    #[clap(subcommand)]
    op: Op,
}

#[derive(Debug, Subcommand)]
enum Op {
    /// Read a key.
    Get { key: String },

    /// Write a key with an expiry in seconds.
    Set { key: String, value: String, ttl: u64 },

    /// Increment a counter, arming its expiry first.
    Incr { key: String, ttl: u64 },

    /// Increment a counter by a step, arming its expiry first.
    IncrBy { key: String, step: i64, ttl: u64 },

    /// Append to a list, optionally arming an expiry.
    Push {
        key: String,
        value: String,
        #[clap(long)]
        ttl: Option<u64>,
    },

    /// Take from the tail of a list.
    Pop { key: String },

    /// Length of a list.
    Len { key: String },

    /// Remove a key.
    Del { key: String },

    /// Write a key only if absent, arming its expiry first.
    SetNx { key: String, value: String, ttl: u64 },

    /// Any other store command, forwarded as-is.
    Raw { name: String, args: Vec<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    tracing_subscriber::fmt()
        .with_max_level(app.log_level)
        .init();

    let topology = Topology::new().with_store(
        app.store.clone(),
        ReplicaSet {
            master: app.master.clone(),
            slave: app.slave.clone(),
        },
    );
    let router = Router::new(topology);
    let store = app.store.as_str();

    match app.op {
        Op::Get { key } => match router.get(store, &key).await? {
            Some(value) => println!("{value}"),
            None => println!("(nil)"),
        },
        Op::Set { key, value, ttl } => {
            println!("{}", router.set(store, &key, &value, ttl).await?)
        }
        Op::Incr { key, ttl } => println!("{}", router.incr(store, &key, ttl).await?),
        Op::IncrBy { key, step, ttl } => {
            println!("{}", router.incr_by(store, &key, step, ttl).await?)
        }
        Op::Push { key, value, ttl } => {
            println!("{}", router.push(store, &key, &value, ttl).await?)
        }
        Op::Pop { key } => match router.pop(store, &key).await? {
            Some(value) => println!("{value}"),
            None => println!("(nil)"),
        },
        Op::Len { key } => println!("{}", router.list_len(store, &key).await?),
        Op::Del { key } => println!("{}", router.del(store, &key).await?),
        Op::SetNx { key, value, ttl } => {
            println!("{}", router.set_if_absent(store, &key, &value, ttl).await?)
        }
        Op::Raw { name, args } => println!("{:?}", router.execute(store, &name, args).await?),
    }

    Ok(())
}
