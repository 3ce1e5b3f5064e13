//! Cold start to RUNNING.
//!
//! [`Bootstrap::start`] walks the node through its startup states in a
//! fixed order: configuration, persistence, entity mappings, listener,
//! cluster registration. Each step must succeed before the next begins, so
//! no connection is accepted before the mappings are frozen and the
//! coordination service only ever sees the port the listener really bound.

use std::marker::PhantomData;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use world_core::config::BindConfig;
use world_core::{
    ConfigError, Endpoint, MessageCatalog, NodeIdentity, RegistrationFailurePolicy, WorldConfig,
    WorldId,
};
use worldgrid_cluster::{ClusterRegistrationClient, CoordinationService};
use worldgrid_net::{
    BindPolicy, CommandHandler, ListenerHandle, SessionRegistry, WireEncryption, WorldListener,
};
use worldgrid_state::{MappingRegistry, PersistenceInitializer, register_world_mappings};

use crate::context::WorldContext;
use crate::error::{LifecycleError, LifecycleResult};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownSettings};
use crate::signals::{TerminationRequests, supervise};
use crate::state::{LifecycleState, LifecycleTracker};
use crate::world::World;

/// Startup orchestrator for one world server.
///
/// `E` is the wire-encryption scheme and `H` the command handler every
/// accepted connection is served with.
pub struct Bootstrap<C, E, H> {
    config: Arc<WorldConfig>,
    messages: Arc<MessageCatalog>,
    registration: Arc<ClusterRegistrationClient<C>>,
    lifecycle: LifecycleTracker,
    _wire: PhantomData<fn() -> (E, H)>,
}

impl<C, E, H> Bootstrap<C, E, H>
where
    C: CoordinationService,
    E: WireEncryption,
    H: CommandHandler<Context = WorldContext>,
{
    pub fn new(config: WorldConfig, messages: MessageCatalog, coordination: C) -> Self {
        let timeout = config.coordination.timeout();
        Self {
            config: Arc::new(config),
            messages: Arc::new(messages),
            registration: Arc::new(ClusterRegistrationClient::new(coordination, timeout)),
            lifecycle: LifecycleTracker::new(),
            _wire: PhantomData,
        }
    }

    pub fn lifecycle(&self) -> &LifecycleTracker {
        &self.lifecycle
    }

    /// Bring the node up to REGISTERED.
    ///
    /// On error the lifecycle ends in FAILED and nothing started by earlier
    /// steps is left running.
    pub async fn start<P>(self, persistence: &P) -> LifecycleResult<RunningWorld<C>>
    where
        P: PersistenceInitializer + ?Sized,
    {
        let lifecycle = self.lifecycle.clone();
        match self.run_startup(persistence).await {
            Ok(world) => Ok(world),
            Err(e) => {
                error!(error = %e, "world server startup aborted");
                lifecycle.fail();
                Err(e)
            }
        }
    }

    async fn run_startup<P>(self, persistence: &P) -> LifecycleResult<RunningWorld<C>>
    where
        P: PersistenceInitializer + ?Sized,
    {
        let config = self.config.clone();
        config.validate()?;
        let session_limit = config.session_limit()?;
        let address: IpAddr = config.world.address.parse().map_err(|_| {
            ConfigError::Invalid(format!("world.address is not an IP address: {}", config.world.address))
        })?;
        self.lifecycle.transition(LifecycleState::ConfigLoaded)?;

        // ── Persistence ─────────────────────────────────────────────
        let store = persistence
            .initialize()
            .map_err(LifecycleError::PersistenceInit)?;
        self.lifecycle.transition(LifecycleState::DbReady)?;

        // ── Entity mappings ─────────────────────────────────────────
        let mut registry = MappingRegistry::new();
        register_world_mappings(&mut registry)?;
        let mappings = registry.freeze();
        info!(count = mappings.len(), "entity mappings frozen");
        let store = store.with_mappings(mappings);
        self.lifecycle.transition(LifecycleState::MappingsFrozen)?;

        // ── Listener ────────────────────────────────────────────────
        let sessions = SessionRegistry::new(session_limit.get() as usize);
        let context = WorldContext::new(
            config.clone(),
            self.messages.clone(),
            store,
            sessions.clone(),
        );
        let listener = WorldListener::<E, H>::bind(
            address,
            config.world.port,
            &bind_policy(&config.bind),
            context.clone(),
            sessions,
        )
        .await?;
        self.lifecycle.transition(LifecycleState::Listening)?;

        let identity = NodeIdentity {
            world_id: WorldId::generate(),
            server_group: config.world.server_group.clone(),
            endpoint: Endpoint::new(config.world.address.clone(), listener.active_port()),
            session_limit,
        };
        if context.set_identity(identity.clone()).is_err() {
            warn!("node identity was already set");
        }

        // ── Cluster registration ────────────────────────────────────
        match self
            .registration
            .register(&identity.server_group, &identity)
            .await
        {
            Ok(channel_id) => {
                if let Err(rejected) = context.channel.assign(channel_id) {
                    warn!(rejected, "channel already assigned, keeping the first");
                }
            }
            Err(e)
                if e.is_transport()
                    && config.coordination.on_register_failure
                        == RegistrationFailurePolicy::Abort =>
            {
                listener.stop().await;
                return Err(e.into());
            }
            Err(e) => {
                error!(error = %e, "serving without a channel assignment");
            }
        }
        self.lifecycle.transition(LifecycleState::Registered)?;

        Ok(RunningWorld {
            context,
            identity,
            listener,
            registration: self.registration,
            lifecycle: self.lifecycle,
        })
    }
}

fn bind_policy(config: &BindConfig) -> BindPolicy {
    let policy = BindPolicy::default().with_backoff(Duration::from_millis(config.backoff_ms));
    match config.max_attempts {
        Some(max) => policy.with_max_attempts(max),
        None => policy,
    }
}

/// A node that completed startup and is accepting connections.
pub struct RunningWorld<C> {
    context: WorldContext,
    identity: NodeIdentity,
    listener: ListenerHandle,
    registration: Arc<ClusterRegistrationClient<C>>,
    lifecycle: LifecycleTracker,
}

impl<C: CoordinationService> RunningWorld<C> {
    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn active_port(&self) -> u16 {
        self.listener.active_port()
    }

    pub fn channel_id(&self) -> Option<i32> {
        self.context.channel_id()
    }

    /// Running without a channel assignment.
    pub fn is_degraded(&self) -> bool {
        self.channel_id().is_none()
    }

    pub fn lifecycle(&self) -> &LifecycleTracker {
        &self.lifecycle
    }

    pub fn registration(&self) -> &ClusterRegistrationClient<C> {
        &self.registration
    }

    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator<World, C> {
        ShutdownCoordinator::new(
            World::new(self.context.clone()),
            self.registration.clone(),
            self.context.messages.clone(),
            self.identity.server_group.clone(),
            self.identity.endpoint.clone(),
            ShutdownSettings::from(&self.context.config.shutdown),
            self.lifecycle.clone(),
        )
    }

    /// Enter RUNNING and serve until a termination request has been
    /// handled.
    ///
    /// Without a request queue the node serves forever.
    pub async fn serve(
        self,
        requests: Option<TerminationRequests>,
    ) -> LifecycleResult<Option<ShutdownReport>> {
        self.lifecycle.transition(LifecycleState::Running)?;
        info!(
            endpoint = %self.identity.endpoint,
            channel_id = ?self.channel_id(),
            world_id = %self.identity.world_id,
            "world server running"
        );

        let Some(requests) = requests else {
            warn!("termination signals unavailable, graceful shutdown disabled");
            return std::future::pending().await;
        };

        let hold = requests.hold();
        let coordinator = self.shutdown_coordinator();
        let report = supervise(requests, &coordinator).await;

        self.listener.stop().await;
        let terminated = self.lifecycle.transition(LifecycleState::Terminated);
        hold.release();
        terminated?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use worldgrid_cluster::LocalCoordination;
    use worldgrid_net::{Plaintext, Session};
    use worldgrid_state::{InMemoryInitializer, StateError, StateResult, StateStore};

    use super::*;

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

    struct BrokenDisk;

    impl PersistenceInitializer for BrokenDisk {
        fn initialize(&self) -> StateResult<StateStore> {
            Err(StateError::Open("permission denied".into()))
        }
    }

    type TestBootstrap = Bootstrap<LocalCoordination, Plaintext, Echo>;

    #[tokio::test]
    async fn persistence_failure_stops_before_bind() {
        let bootstrap = TestBootstrap::new(
            WorldConfig::scaffold("S1", 1337),
            MessageCatalog::default(),
            LocalCoordination::new(4),
        );
        let lifecycle = bootstrap.lifecycle().clone();

        let err = bootstrap.start(&BrokenDisk).await.err().unwrap();
        assert!(matches!(err, LifecycleError::PersistenceInit(_)));
        assert_eq!(
            lifecycle.history(),
            [
                LifecycleState::Init,
                LifecycleState::ConfigLoaded,
                LifecycleState::Failed
            ]
        );
    }

    #[tokio::test]
    async fn invalid_config_fails_before_persistence() {
        let mut config = WorldConfig::scaffold("S1", 1337);
        config.world.session_limit = 0;
        let bootstrap =
            TestBootstrap::new(config, MessageCatalog::default(), LocalCoordination::new(4));
        let lifecycle = bootstrap.lifecycle().clone();

        let err = bootstrap.start(&InMemoryInitializer).await.err().unwrap();
        assert!(matches!(err, LifecycleError::Config(_)));
        assert_eq!(lifecycle.history(), [LifecycleState::Init, LifecycleState::Failed]);
    }

    #[test]
    fn bind_policy_follows_config() {
        let policy = bind_policy(&BindConfig::default());
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.backoff, Duration::ZERO);

        let policy = bind_policy(&BindConfig {
            max_attempts: Some(3),
            backoff_ms: 250,
        });
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }
}
