//! worldgrid-net — the world server's network front door.
//!
//! # Architecture
//!
//! ```text
//! WorldListener<E, H>::bind(address, port)
//!   ├── bind_with_retry()  port, port+1, ... until a free port is found
//!   └── accept loop
//!       └── per connection
//!           ├── SessionRegistry  (limit, broadcast)
//!           ├── E: WireEncryption (decrypt inbound, encrypt outbound)
//!           └── H: CommandHandler (packet → replies)
//! ```
//!
//! Packet semantics and cipher internals live behind the two traits; this
//! crate only moves bytes.

pub mod bind;
pub mod encryption;
pub mod error;
pub mod handler;
pub mod listener;
pub mod session;

pub use bind::{bind_with_retry, BindAttempt, BindOutcome, BindPolicy};
pub use encryption::{Plaintext, WireEncryption};
pub use error::{NetError, NetResult};
pub use handler::CommandHandler;
pub use listener::{ListenerHandle, WorldListener};
pub use session::{Session, SessionId, SessionRegistry};
