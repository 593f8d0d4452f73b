use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::Value;
use shunt::{
    Command, ConnectionPool, Connector, Endpoint, Error, Link, ReplicaSet, Role, Router,
    Topology, CONNECT_TIMEOUT,
};

/// In-memory link that records every command it runs.
struct RecordingLink {
    endpoint: Endpoint,
    alive: AtomicBool,
    commands: Mutex<Vec<String>>,
}

impl RecordingLink {
    fn new(endpoint: Endpoint) -> RecordingLink {
        RecordingLink {
            endpoint,
            alive: AtomicBool::new(true),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    fn command_names(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Link for RecordingLink {
    async fn ping(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn run(&self, command: &Command) -> Result<Value, redis::RedisError> {
        self.commands
            .lock()
            .unwrap()
            .push(command.name().to_owned());
        Ok(match command {
            Command::Get { .. } => Value::Data(b"v1".to_vec()),
            Command::Set { .. } | Command::Raw { .. } => Value::Okay,
            Command::SetNx { .. } | Command::Expire { .. } | Command::Del { .. } => Value::Int(1),
            Command::Incr { .. } => Value::Int(1),
            Command::IncrBy { step, .. } => Value::Int(*step),
            Command::LPush { .. } => Value::Int(1),
            Command::RPop { .. } => Value::Nil,
            Command::LLen { .. } => Value::Int(0),
        })
    }
}

/// Connector handing out [`RecordingLink`]s, keeping hold of everything it
/// dialed so tests can inspect traffic after the fact.
#[derive(Default)]
struct MockConnector {
    dialed: Mutex<Vec<Endpoint>>,
    links: Mutex<Vec<Arc<RecordingLink>>>,
    unreachable: Mutex<Option<Endpoint>>,
}

impl MockConnector {
    fn time_out_on(&self, endpoint: Endpoint) {
        *self.unreachable.lock().unwrap() = Some(endpoint);
    }

    fn dialed(&self) -> Vec<Endpoint> {
        self.dialed.lock().unwrap().clone()
    }

    fn link(&self, index: usize) -> Arc<RecordingLink> {
        Arc::clone(&self.links.lock().unwrap()[index])
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Link>, Error> {
        self.dialed.lock().unwrap().push(endpoint.clone());
        if self.unreachable.lock().unwrap().as_ref() == Some(endpoint) {
            return Err(Error::ConnectTimeout {
                addr: endpoint.to_string(),
                timeout: CONNECT_TIMEOUT,
            });
        }
        let link = Arc::new(RecordingLink::new(endpoint.clone()));
        self.links.lock().unwrap().push(Arc::clone(&link));
        Ok(link)
    }
}

fn master() -> Endpoint {
    Endpoint::new("h1", 6379)
}

fn replica() -> Endpoint {
    Endpoint::new("h2", 6379)
}

fn cache_topology() -> Topology {
    Topology::new().with_store(
        "cache",
        ReplicaSet {
            master: master(),
            slave: Some(replica()),
        },
    )
}

fn cache_router(connector: &Arc<MockConnector>) -> Router {
    Router::with_connector(cache_topology(), Arc::clone(connector) as Arc<dyn Connector>)
}

#[tokio::test]
async fn first_read_dials_the_replica_and_pools_it() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    let value = router.get("cache", "k").await.unwrap();

    assert_eq!(value, Some("v1".to_owned()));
    assert_eq!(connector.dialed(), vec![replica()]);
    assert_eq!(connector.link(0).endpoint, replica());
    assert_eq!(connector.link(0).command_names(), vec!["GET"]);
    assert!(router.pool().get("cache", Role::Slave).is_some());
    assert!(router.pool().get("cache", Role::Master).is_none());
}

#[tokio::test]
async fn repeated_reads_reuse_the_pooled_replica_link() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    router.get("cache", "k1").await.unwrap();
    router.get("cache", "k2").await.unwrap();

    assert_eq!(connector.dialed(), vec![replica()]);
    assert_eq!(connector.link(0).command_names(), vec!["GET", "GET"]);
}

#[tokio::test]
async fn reads_after_a_write_stick_to_the_master() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    // Read first: goes to the replica.
    router.get("cache", "k").await.unwrap();
    // Write: opens and pools the master link, expiry armed before the value.
    assert!(router.set("cache", "k", "v", 30).await.unwrap());
    // Read again: rides the live master link, not the pooled replica.
    router.get("cache", "k").await.unwrap();

    assert_eq!(connector.dialed(), vec![replica(), master()]);
    assert_eq!(connector.link(0).command_names(), vec!["GET"]);
    assert_eq!(
        connector.link(1).command_names(),
        vec!["EXPIRE", "SET", "GET"]
    );
    assert_eq!(router.pool().len(), 2);
}

#[tokio::test]
async fn dead_links_are_replaced_not_reused() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    router.get("cache", "k").await.unwrap();
    connector.link(0).kill();
    router.get("cache", "k").await.unwrap();

    assert_eq!(connector.dialed(), vec![replica(), replica()]);
    // The dead link saw only the first command; the replacement took over.
    assert_eq!(connector.link(0).command_names(), vec!["GET"]);
    assert_eq!(connector.link(1).command_names(), vec!["GET"]);
    assert_eq!(router.pool().len(), 1);
}

#[tokio::test]
async fn a_dead_master_does_not_capture_reads() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    router.set("cache", "k", "v", 30).await.unwrap();
    connector.link(0).kill();
    router.get("cache", "k").await.unwrap();

    // Master preference only applies to a live master link.
    assert_eq!(connector.dialed(), vec![master(), replica()]);
    assert_eq!(connector.link(1).command_names(), vec!["GET"]);
}

#[tokio::test]
async fn composite_writes_run_on_one_resolved_link() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    assert_eq!(router.incr("cache", "hits", 60).await.unwrap(), 1);
    assert_eq!(router.incr_by("cache", "hits", 5, 60).await.unwrap(), 5);
    assert!(router.set_if_absent("cache", "lock", "1", 10).await.unwrap());

    assert_eq!(connector.dialed(), vec![master()]);
    assert_eq!(
        connector.link(0).command_names(),
        vec!["EXPIRE", "INCR", "EXPIRE", "INCRBY", "EXPIRE", "SETNX"]
    );
}

#[tokio::test]
async fn push_arms_the_expiry_only_when_given() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    router.push("cache", "q", "job-1", None).await.unwrap();
    router.push("cache", "q", "job-2", Some(30)).await.unwrap();

    assert_eq!(
        connector.link(0).command_names(),
        vec!["LPUSH", "EXPIRE", "LPUSH"]
    );
}

#[tokio::test]
async fn missing_ttl_fails_before_touching_the_network() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    let err = router.set("cache", "k", "v", 0).await.unwrap_err();
    assert!(matches!(err, Error::MissingTtl { command: "SET" }));

    let err = router.incr("cache", "k", 0).await.unwrap_err();
    assert!(matches!(err, Error::MissingTtl { command: "INCR" }));

    assert!(connector.dialed().is_empty());
    assert!(router.pool().is_empty());
}

#[tokio::test]
async fn unconfigured_replica_is_a_config_error_with_no_dial() {
    let connector = Arc::new(MockConnector::default());
    let topology = Topology::new().with_store(
        "x",
        ReplicaSet {
            master: master(),
            slave: None,
        },
    );
    let router = Router::with_connector(topology, Arc::clone(&connector) as Arc<dyn Connector>);

    let err = router.get("x", "k").await.unwrap_err();

    assert!(matches!(err, Error::NoEndpoint { ref store, role } if store == "x" && role == Role::Slave));
    assert!(connector.dialed().is_empty());
    assert!(router.pool().is_empty());
}

#[tokio::test]
async fn connect_timeout_leaves_no_pool_entry() {
    let connector = Arc::new(MockConnector::default());
    connector.time_out_on(replica());
    let router = cache_router(&connector);

    let err = router.get("cache", "k").await.unwrap_err();

    assert!(matches!(err, Error::ConnectTimeout { .. }));
    assert_eq!(connector.dialed(), vec![replica()]);
    assert!(router.pool().is_empty());
}

#[tokio::test]
async fn raw_commands_route_by_name() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);

    router
        .execute("cache", "LRANGE", vec!["k".into(), "0".into(), "-1".into()])
        .await
        .unwrap();
    router
        .execute("cache", "rpush", vec!["k".into(), "v".into()])
        .await
        .unwrap();

    assert_eq!(connector.dialed(), vec![replica(), master()]);
}

#[tokio::test]
async fn degraded_surface_swallows_failures_into_sentinels() {
    let connector = Arc::new(MockConnector::default());
    let topology = Topology::new().with_store(
        "x",
        ReplicaSet {
            master: master(),
            slave: None,
        },
    );
    let router = Router::with_connector(topology, Arc::clone(&connector) as Arc<dyn Connector>);

    // Config error and missing ttl both collapse to the sentinel.
    assert_eq!(router.degraded().get("x", "k").await, None);
    assert!(!router.degraded().set("x", "k", "v", 0).await);
    assert_eq!(router.degraded().incr("x", "k", 0).await, None);

    // A healthy call still returns its value.
    assert!(router.degraded().set("x", "k", "v", 30).await);
    assert_eq!(router.degraded().get("x", "k").await, Some("v1".to_owned()));
}

#[tokio::test]
async fn an_injected_pool_is_shared_between_routers() {
    let connector = Arc::new(MockConnector::default());
    let pool = Arc::new(ConnectionPool::new());
    let writer = Router::with_pool(
        cache_topology(),
        Arc::clone(&connector) as Arc<dyn Connector>,
        Arc::clone(&pool),
    );
    let reader = Router::with_pool(
        cache_topology(),
        Arc::clone(&connector) as Arc<dyn Connector>,
        Arc::clone(&pool),
    );

    writer.set("cache", "k", "v", 30).await.unwrap();
    reader.get("cache", "k").await.unwrap();

    assert_eq!(connector.dialed(), vec![master()]);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn routers_sharing_a_pool_share_the_master_bias() {
    let connector = Arc::new(MockConnector::default());
    let router = cache_router(&connector);
    let clone = router.clone();

    clone.set("cache", "k", "v", 30).await.unwrap();
    router.get("cache", "k").await.unwrap();

    // One handle's write pins the other handle's reads to the master.
    assert_eq!(connector.dialed(), vec![master()]);
    assert_eq!(
        connector.link(0).command_names(),
        vec!["EXPIRE", "SET", "GET"]
    );
}
