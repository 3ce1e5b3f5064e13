//! Command handler seam.

use crate::session::Session;

/// Per-connection packet handler.
///
/// The listener builds one handler per accepted session from the shared
/// `Context` and feeds it every decrypted packet in arrival order.
pub trait CommandHandler: Send + Sized + 'static {
    type Context: Clone + Send + Sync + 'static;

    fn create(context: &Self::Context, session: &Session) -> Self;

    /// Handle one packet; returned packets are sent back to the client.
    fn handle(&mut self, packet: Vec<u8>) -> Vec<Vec<u8>>;

    fn on_disconnect(&mut self) {}
}
