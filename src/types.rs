//! Core value types for the a3s-room system
//!
//! Wire-facing shapes (speaker info, participant info, permissions) use
//! camelCase JSON serialization, matching the signaling payloads.

use crate::error::{EngineError, RoomError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Server-assigned, session-scoped participant id (e.g. `PA_xxxx`)
    ParticipantSid
);
string_id!(
    /// Application-chosen participant identity, stable across reconnects
    ParticipantIdentity
);
string_id!(
    /// Server-assigned track id (e.g. `TR_xxxx`)
    TrackSid
);

/// Connection state of the room session
///
/// `Disconnected` and `Connecting` carry the last error observed by the
/// engine, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected { error: Option<EngineError> },
    Connecting { error: Option<EngineError> },
    Connected,
    Reconnecting,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected { error: None }
    }
}

impl ConnectionState {
    /// Compare variants only, ignoring carried errors
    pub fn same_variant(&self, other: &ConnectionState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, ConnectionState::Reconnecting)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected { .. })
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting { .. })
    }

    /// Error carried by this state, if any
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            ConnectionState::Disconnected { error } | ConnectionState::Connecting { error } => {
                error.as_ref()
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected { .. } => "disconnected",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            Some(error) => write!(f, "{} ({})", self.as_str(), error),
            None => f.write_str(self.as_str()),
        }
    }
}

/// How the engine is resuming a broken connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconnectMode {
    #[default]
    None,
    /// Resume keeping existing subscriptions; only track settings are reset
    Quick,
    /// Full renegotiation; local tracks must be republished
    Full,
}

/// Engine state as observed by the room
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub connection_state: ConnectionState,
    pub reconnect_mode: ReconnectMode,
}

impl EngineState {
    pub fn new(connection_state: ConnectionState, reconnect_mode: ReconnectMode) -> Self {
        Self {
            connection_state,
            reconnect_mode,
        }
    }

    /// A reconnect mode is only meaningful while reconnecting, or on the
    /// connected state that completes the reconnect.
    pub fn is_consistent(&self) -> bool {
        self.reconnect_mode == ReconnectMode::None
            || matches!(
                self.connection_state,
                ConnectionState::Reconnecting | ConnectionState::Connected
            )
    }
}

/// One entry of an active-speaker update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerInfo {
    pub sid: ParticipantSid,
    /// Audio level in `[0, 1]`
    pub level: f32,
}

impl SpeakerInfo {
    pub fn new(sid: impl Into<ParticipantSid>, level: f32) -> Self {
        Self {
            sid: sid.into(),
            level,
        }
    }
}

/// Application data packet received from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPacket {
    /// Sender identity; empty or unknown for server-originated broadcasts
    pub participant_identity: ParticipantIdentity,
    pub payload: Bytes,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Track metadata announced by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub sid: TrackSid,
    pub kind: TrackKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantStatus {
    Joining,
    Joined,
    #[default]
    Active,
    Disconnected,
}

/// Participant metadata announced by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub sid: ParticipantSid,
    pub identity: ParticipantIdentity,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: ParticipantStatus,
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
}

/// Opaque inbound media track produced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawTrack {
    pub id: String,
    pub kind: TrackKind,
}

impl RawTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Opaque receiver handle paired with an inbound track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackReceiver {
    pub id: String,
}

impl TrackReceiver {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Media stream metadata accompanying an inbound track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// `<participant_sid>|<track_sid>`, or a bare participant sid
    pub id: String,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Split a stream id into its participant sid and optional track sid
pub fn parse_stream_id(stream_id: &str) -> Result<(ParticipantSid, Option<TrackSid>)> {
    let mut parts = stream_id.split('|');
    let participant_sid = match parts.next() {
        Some(sid) if !sid.is_empty() => ParticipantSid::from(sid),
        _ => return Err(RoomError::InvalidStreamId(stream_id.to_string())),
    };
    let track_sid = parts
        .next()
        .filter(|sid| !sid.is_empty())
        .map(TrackSid::from);

    if parts.next().is_some() {
        return Err(RoomError::InvalidStreamId(stream_id.to_string()));
    }

    Ok((participant_sid, track_sid))
}

/// Which of the local participant's tracks a remote participant may subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPermission {
    pub participant_identity: ParticipantIdentity,
    #[serde(default)]
    pub all_tracks_allowed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_track_sids: Vec<TrackSid>,
}

/// Local track-subscription permissions, re-sent on every (re)connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSubscriptionPermissions {
    pub all_participants_allowed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_permissions: Vec<TrackPermission>,
}

impl Default for TrackSubscriptionPermissions {
    fn default() -> Self {
        Self {
            all_participants_allowed: true,
            track_permissions: Vec::new(),
        }
    }
}
