//! Bootstrap and shutdown scenarios.
//!
//! Each test drives a real listener on localhost through the lifecycle,
//! with the coordination service replaced by an in-process hub.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Instant;
use world_core::{Endpoint, MessageCatalog, NodeIdentity, RegistrationFailurePolicy, WorldConfig};
use worldgrid_cluster::{CoordinationError, CoordinationService, LocalCoordination};
use worldgrid_lifecycle::{
    Bootstrap, LifecycleError, LifecycleState, TerminationKind, TerminationRequests, WorldContext,
};
use worldgrid_net::{CommandHandler, Plaintext, Session};
use worldgrid_state::{
    InMemoryInitializer, PersistenceInitializer, StateError, StateResult, StateStore,
    WorldSnapshotMapping,
};

struct Echo;

impl CommandHandler for Echo {
    type Context = WorldContext;

    fn create(_: &WorldContext, _: &Session) -> Self {
        Echo
    }

    fn handle(&mut self, packet: Vec<u8>) -> Vec<Vec<u8>> {
        vec![packet]
    }
}

type Node<C> = Bootstrap<C, Plaintext, Echo>;

/// Hub that remembers what it was asked, in order.
#[derive(Clone)]
struct RecordingHub {
    inner: Arc<LocalCoordination>,
    events: Arc<Mutex<Vec<(String, Instant)>>>,
    /// Store the node saves into, to check save happened before deregister.
    store: Arc<OnceLock<StateStore>>,
}

impl RecordingHub {
    fn new(channels: u32) -> Self {
        Self {
            inner: Arc::new(LocalCoordination::new(channels)),
            events: Arc::default(),
            store: Arc::default(),
        }
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push((event, Instant::now()));
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }
}

impl CoordinationService for RecordingHub {
    async fn register_worldserver(
        &self,
        server_group: &str,
        identity: &NodeIdentity,
    ) -> Result<Option<i32>, CoordinationError> {
        self.push(format!("register {}", identity.endpoint.port));
        self.inner.register_worldserver(server_group, identity).await
    }

    async fn unregister_worldserver(
        &self,
        server_group: &str,
        endpoint: &Endpoint,
    ) -> Result<(), CoordinationError> {
        let saved = self
            .store
            .get()
            .map(|store| store.count_records("world_snapshot").unwrap_or(0))
            .unwrap_or(0);
        self.push(format!("deregister {} saved={saved}", endpoint.port));
        self.inner.unregister_worldserver(server_group, endpoint).await
    }
}

struct UnreachableHub;

impl CoordinationService for UnreachableHub {
    async fn register_worldserver(
        &self,
        _: &str,
        _: &NodeIdentity,
    ) -> Result<Option<i32>, CoordinationError> {
        Err(CoordinationError::Transport("connection refused".into()))
    }

    async fn unregister_worldserver(&self, _: &str, _: &Endpoint) -> Result<(), CoordinationError> {
        Err(CoordinationError::Transport("connection refused".into()))
    }
}

struct BrokenDisk;

impl PersistenceInitializer for BrokenDisk {
    fn initialize(&self) -> StateResult<StateStore> {
        Err(StateError::Open("database server unreachable".into()))
    }
}

fn free_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

fn config(port: u16) -> WorldConfig {
    let mut config = WorldConfig::scaffold("S1", port);
    config.world.session_limit = 8;
    config
}

#[tokio::test]
async fn free_port_is_registered_as_configured() {
    let port = free_port();
    let hub = RecordingHub::new(4);
    let node = Node::new(config(port), MessageCatalog::default(), hub.clone());

    let running = node.start(&InMemoryInitializer).await.unwrap();

    assert_eq!(running.active_port(), port);
    assert_eq!(hub.events(), [format!("register {port}")]);
    assert_eq!(running.identity().endpoint, Endpoint::new("127.0.0.1", port));
    assert_eq!(running.channel_id(), Some(1));
    assert_eq!(running.lifecycle().current(), LifecycleState::Registered);
    assert_eq!(
        running.lifecycle().history(),
        [
            LifecycleState::Init,
            LifecycleState::ConfigLoaded,
            LifecycleState::DbReady,
            LifecycleState::MappingsFrozen,
            LifecycleState::Listening,
            LifecycleState::Registered,
        ]
    );
}

#[tokio::test]
async fn occupied_port_registers_the_bound_port() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let busy = blocker.local_addr().unwrap().port();
    let hub = RecordingHub::new(4);
    let node = Node::new(config(busy), MessageCatalog::default(), hub.clone());

    let running = node.start(&InMemoryInitializer).await.unwrap();

    let bound = running.active_port();
    assert!(bound > busy);
    assert_eq!(hub.events(), [format!("register {bound}")]);
    assert_eq!(hub.inner.worlds("S1")[0].identity.endpoint.port, bound);
}

#[tokio::test]
async fn persistence_failure_stops_everything_after_it() {
    let port = free_port();
    let hub = RecordingHub::new(4);
    let node = Node::new(config(port), MessageCatalog::default(), hub.clone());
    let lifecycle = node.lifecycle().clone();

    let err = node.start(&BrokenDisk).await.err().unwrap();

    assert!(matches!(err, LifecycleError::PersistenceInit(_)));
    assert_eq!(err.exit_code(), 0);
    assert_eq!(lifecycle.current(), LifecycleState::Failed);
    assert!(hub.events().is_empty());
    // Nothing was bound.
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn absent_assignment_runs_degraded() {
    let hub = RecordingHub::new(0);
    let node = Node::new(config(free_port()), MessageCatalog::default(), hub.clone());

    let running = node.start(&InMemoryInitializer).await.unwrap();

    assert!(running.is_degraded());
    assert_eq!(running.channel_id(), None);
    assert_eq!(running.lifecycle().current(), LifecycleState::Registered);
}

#[tokio::test]
async fn unreachable_hub_degrades_by_default() {
    let node = Node::new(config(free_port()), MessageCatalog::default(), UnreachableHub);
    let running = node.start(&InMemoryInitializer).await.unwrap();
    assert!(running.is_degraded());
}

#[tokio::test]
async fn unreachable_hub_with_abort_policy_fails() {
    let port = free_port();
    let mut config = config(port);
    config.coordination.on_register_failure = RegistrationFailurePolicy::Abort;
    let node = Node::new(config, MessageCatalog::default(), UnreachableHub);
    let lifecycle = node.lifecycle().clone();

    let err = node.start(&InMemoryInitializer).await.err().unwrap();

    assert!(matches!(err, LifecycleError::Registration(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(lifecycle.current(), LifecycleState::Failed);
}

#[tokio::test]
async fn termination_runs_shutdown_in_order() {
    let hub = RecordingHub::new(4);
    let node = Node::new(config(free_port()), MessageCatalog::default(), hub.clone());
    let running = node.start(&InMemoryInitializer).await.unwrap();

    let _ = hub.store.set(running.context().store.clone());
    let sessions = running.context().sessions.clone();
    let world_id = running.identity().world_id.clone();
    let port = running.active_port();
    let lifecycle = running.lifecycle().clone();

    let requests = TerminationRequests::channel();
    let requester = requests.requester();
    let hold = requests.hold();

    let client = async {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut reader = BufReader::new(stream);
        while sessions.len().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let started = Instant::now();
        assert!(requester.request(TerminationKind::Interrupt));
        assert!(requester.request(TerminationKind::Shutdown));

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        (started, line)
    };

    let (served, (started, line)) = tokio::join!(running.serve(Some(requests)), client);
    let finished = Instant::now();

    let report = served.unwrap().unwrap();
    assert_eq!(report.kind, TerminationKind::Interrupt);
    assert!(report.saved);
    assert!(report.deregistered);
    assert_eq!(line, "The server will shut down in 5 seconds!\n");

    let events = hub.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].0, format!("deregister {port} saved=1"));
    assert!(finished - events[1].1 >= Duration::from_secs(5));
    assert!(finished - started >= Duration::from_secs(5));

    let snapshot = hub
        .store
        .get()
        .unwrap()
        .get_domain::<WorldSnapshotMapping>(world_id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.active_sessions, 1);
    assert!(hub.inner.worlds("S1").is_empty());
    assert_eq!(lifecycle.current(), LifecycleState::Terminated);
    assert!(hold.is_released());
}

#[tokio::test]
async fn serving_without_signals_keeps_running() {
    let hub = RecordingHub::new(4);
    let node = Node::new(config(free_port()), MessageCatalog::default(), hub.clone());
    let running = node.start(&InMemoryInitializer).await.unwrap();

    let sessions = running.context().sessions.clone();
    let port = running.active_port();
    let lifecycle = running.lifecycle().clone();

    let serve = tokio::time::timeout(Duration::from_millis(300), running.serve(None));
    let client = async {
        while lifecycle.current() != LifecycleState::Running {
            tokio::task::yield_now().await;
        }
        let _stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        while sessions.len().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sessions.len().await
    };

    let (served, connected) = tokio::join!(serve, client);

    assert!(served.is_err(), "serve must not return without a termination request");
    assert_eq!(connected, 1);
    assert_eq!(lifecycle.current(), LifecycleState::Running);
    assert_eq!(hub.events().len(), 1);
}

