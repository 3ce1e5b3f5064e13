//! Default command handler.
//!
//! Game packet semantics live outside this daemon. The trace handler logs
//! what arrives, answers keep-alives, and tells players when the channel
//! runs without a cluster assignment.

use tracing::{debug, trace};
use world_core::messages::CHANNEL_UNASSIGNED;
use worldgrid_lifecycle::WorldContext;
use worldgrid_net::{CommandHandler, Session, SessionId};

const PING: &[u8] = b"PING";
const PONG: &[u8] = b"PONG";

pub struct TraceHandler {
    session: SessionId,
    context: WorldContext,
    greeted: bool,
}

impl CommandHandler for TraceHandler {
    type Context = WorldContext;

    fn create(context: &WorldContext, session: &Session) -> Self {
        debug!(session = %session.id(), peer = %session.peer(), "session handler created");
        Self {
            session: session.id(),
            context: context.clone(),
            greeted: false,
        }
    }

    fn handle(&mut self, packet: Vec<u8>) -> Vec<Vec<u8>> {
        trace!(session = %self.session, len = packet.len(), "packet received");

        let mut replies = Vec::new();
        if !self.greeted {
            self.greeted = true;
            if self.context.channel_id().is_none() {
                replies.push(self.context.messages.get(CHANNEL_UNASSIGNED).as_bytes().to_vec());
            }
        }
        if packet == PING {
            replies.push(PONG.to_vec());
        }
        replies
    }

    fn on_disconnect(&mut self) {
        debug!(session = %self.session, "session handler dropped");
    }
}
