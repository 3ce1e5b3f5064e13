//! worldgrid-lifecycle — startup and shutdown of a WorldGrid world server.
//!
//! # Architecture
//!
//! ```text
//! Bootstrap::start(persistence)
//!   ├── WorldConfig::validate            → CONFIG_LOADED
//!   ├── PersistenceInitializer           → DB_READY
//!   ├── MappingRegistry::freeze          → MAPPINGS_FROZEN
//!   ├── WorldListener::bind              → LISTENING
//!   └── ClusterRegistrationClient        → REGISTERED
//!
//! RunningWorld::serve(requests)          → RUNNING
//!   └── supervise()
//!       └── ShutdownCoordinator::run     → SHUTTING_DOWN
//!           broadcast → save → deregister → grace delay
//!                                        → TERMINATED
//! ```

pub mod bootstrap;
pub mod context;
pub mod error;
pub mod shutdown;
pub mod signals;
pub mod state;
pub mod world;

pub use bootstrap::{Bootstrap, RunningWorld};
pub use context::WorldContext;
pub use error::{LifecycleError, LifecycleResult};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownReport, ShutdownSettings};
pub use signals::{
    supervise, ShutdownHold, TerminationKind, TerminationRequester, TerminationRequests,
    TerminationSignalHandler,
};
pub use state::{LifecycleState, LifecycleTracker};
pub use world::{World, WorldServices};
