//! worldgrid-cluster — cluster registration for WorldGrid world servers.
//!
//! A world server announces itself to the coordination service once it is
//! listening, receives a channel id in return, and withdraws on shutdown.
//!
//! # Architecture
//!
//! ```text
//! ClusterRegistrationClient   (timeout, error classification)
//!   └── C: CoordinationService
//!       ├── GrpcCoordinationClient  → remote hub over gRPC
//!       │   ├── RegisterWorldserver(group, worldserver) → channel_id?
//!       │   └── UnregisterWorldserver(group, endpoint)  → ack
//!       └── LocalCoordination       → in-process, standalone mode
//! ```

pub mod client;
pub mod error;
pub mod local;
pub mod proto;
pub mod registration;

pub use client::{CoordinationService, GrpcCoordinationClient};
pub use error::{CoordinationError, RegistrationError};
pub use local::LocalCoordination;
pub use registration::ClusterRegistrationClient;
