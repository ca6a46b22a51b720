//! Connection lifecycle
//!
//! Turns an engine state transition into the room's side effects and
//! notifications. For a transition from `old` to `new`:
//!
//! 1. The stored connection state follows the engine, and one
//!    `on_session_state_invalidated` is scheduled.
//! 2. If the connection-state variant did not change, nothing else happens.
//! 3. On `connected`: track settings are reset after a quick reconnect
//!    (awaited), and the subscription permissions are re-sent (dispatched).
//! 4. `on_connection_state_changed` fires, then exactly one branch
//!    notification (`connected`, `reconnected`, `reconnecting`,
//!    `disconnected` or `failed_to_connect`).
//! 5. A full reconnect republishes every local track in the background.

use crate::room::RoomSession;
use crate::types::{ConnectionState, EngineState, ReconnectMode};
use std::sync::Arc;

impl RoomSession {
    pub(crate) async fn handle_state_mutated(self: &Arc<Self>, new: EngineState, old: EngineState) {
        if !new.is_consistent() {
            tracing::warn!(
                state = %new.connection_state,
                reconnect_mode = ?new.reconnect_mode,
                "Inconsistent engine state"
            );
        }

        self.store.mutate(|state| {
            state.connection_state = new.connection_state.clone();
            state.reconnect_mode = new.reconnect_mode;
        });
        self.schedule_invalidation();

        if new.connection_state.same_variant(&old.connection_state) {
            tracing::trace!(state = %new.connection_state, "Connection state unchanged");
            return;
        }

        tracing::info!(
            from = %old.connection_state,
            to = %new.connection_state,
            "Connection state changed"
        );

        if new.connection_state.is_connected() {
            if old.reconnect_mode == ReconnectMode::Quick {
                self.reset_track_settings().await;
            }
            self.resend_permissions();
        }

        let (new_state, old_state) = (&new.connection_state, &old.connection_state);
        self.delegates.notify(
            || format!("connection_state_changed {} <- {}", new_state, old_state),
            |d| d.on_connection_state_changed(new_state, old_state),
        );

        match new_state {
            ConnectionState::Connected if old_state.is_reconnecting() => {
                self.delegates.notify(|| "reconnected".to_string(), |d| d.on_reconnected());
            }
            ConnectionState::Connected => {
                self.delegates.notify(|| "connected".to_string(), |d| d.on_connected());
            }
            ConnectionState::Reconnecting => {
                self.delegates.notify(|| "reconnecting".to_string(), |d| d.on_reconnecting());
            }
            ConnectionState::Disconnected { error } => {
                self.clear_e2ee_manager();
                if let ConnectionState::Connecting { error: old_error } = old_state {
                    self.delegates.notify(
                        || "failed_to_connect".to_string(),
                        |d| d.on_failed_to_connect(old_error.as_ref()),
                    );
                } else {
                    self.delegates.notify(
                        || "disconnected".to_string(),
                        |d| d.on_disconnected(error.as_ref()),
                    );
                }
                self.cleanup_after_disconnect();
            }
            ConnectionState::Connecting { .. } => {}
        }

        if new_state.is_connected()
            && old_state.is_reconnecting()
            && old.reconnect_mode == ReconnectMode::Full
        {
            self.spawn_republish();
        }
    }

    fn schedule_invalidation(self: &Arc<Self>) {
        let session = self.clone();
        tokio::spawn(async move {
            session.delegates.notify(
                || "session_state_invalidated".to_string(),
                |d| d.on_session_state_invalidated(),
            );
        });
    }

    async fn reset_track_settings(&self) {
        let publications = self.store.read(|state| {
            state
                .remote_participants
                .values()
                .flat_map(|p| p.publications.values().cloned())
                .collect::<Vec<_>>()
        });
        let count = publications.len();

        match self.engine.reset_track_settings(publications).await {
            Ok(()) => tracing::debug!(publications = count, "Track settings reset"),
            Err(e) => tracing::warn!(error = %e, "Failed to reset track settings"),
        }
    }

    fn resend_permissions(self: &Arc<Self>) {
        let permissions = self.store.read(|state| state.permissions.clone());
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session
                .engine
                .send_track_subscription_permissions(&permissions)
                .await
            {
                tracing::warn!(error = %e, "Failed to send track subscription permissions");
            }
        });
    }

    fn spawn_republish(self: &Arc<Self>) {
        let session = self.clone();
        tokio::spawn(async move {
            let publications = session.store.read(|state| {
                state
                    .local_participant
                    .publications
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
            });
            let count = publications.len();

            match session.engine.republish_tracks(publications).await {
                Ok(()) => tracing::info!(tracks = count, "Republished local tracks"),
                Err(e) => tracing::error!(error = %e, "Failed to republish local tracks"),
            }
        });
    }

    /// Drop everything learned from the server during the session
    fn cleanup_after_disconnect(&self) {
        let removed = self.store.mutate(|state| {
            state.active_speakers.clear();
            state.local_participant.reset_speaking();
            let removed = state.remote_participants.len();
            state.remote_participants.clear();
            state.pending_attaches.clear();
            removed
        });
        tracing::debug!(participants = removed, "Session state cleared");
    }
}
