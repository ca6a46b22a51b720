//! User data packet routing

use crate::room::RoomSession;
use crate::types::UserPacket;

impl RoomSession {
    /// Route a data packet to session listeners, then to the sender's own
    /// listeners.
    ///
    /// Packets whose sender is not a registered remote participant (server
    /// broadcasts) reach the session with no sender and nobody else.
    pub(crate) fn handle_user_packet(&self, packet: UserPacket) {
        let UserPacket {
            participant_identity,
            payload,
            topic,
        } = packet;
        let sender = self
            .store
            .read(|state| state.remote_participant(&participant_identity).cloned());
        let topic = topic.as_deref();

        tracing::trace!(
            sender = %participant_identity,
            resolved = sender.is_some(),
            bytes = payload.len(),
            "User packet received"
        );

        if self.engine.state().connection_state.is_connected() {
            self.delegates.notify(
                || format!("data_received from {}", participant_identity),
                |d| d.on_data_received(sender.as_ref(), &payload, topic),
            );
        }

        if let Some(sender) = &sender {
            sender.delegates().notify(
                || format!("participant data_received from {}", participant_identity),
                |d| d.on_data_received(sender, &payload, topic),
            );
        }
    }
}
