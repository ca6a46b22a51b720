//! # a3s-room
//!
//! Session-state synchronization core for the A3S real-time communication
//! client.
//!
//! ## Overview
//!
//! `a3s-room` sits between a transport/media engine and the application. It
//! consumes the engine's event stream (connection changes, speaker updates,
//! participant updates, inbound tracks, data packets), keeps one consistent
//! picture of the session, and notifies registered listeners.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_room::engine::memory::MemoryEngine;
//! use a3s_room::{ConnectionState, EngineState, ReconnectMode, Room, RoomOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_room::Result<()> {
//! let engine = Arc::new(MemoryEngine::new());
//! let room = Room::new(engine.clone(), "alice", RoomOptions::default())?;
//!
//! if let Some(events) = engine.take_events() {
//!     room.start(events).await?;
//! }
//!
//! engine.transition(EngineState::new(
//!     ConnectionState::Connected,
//!     ReconnectMode::None,
//! ))?;
//!
//! room.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Engine** trait: the transport collaborator the room consumes events from
//! - **Room**: event loop, per-kind event lanes and the public query API
//! - **StateStore**: one lock-guarded `RoomState`, mutated atomically
//! - **RoomDelegate / ParticipantDelegate**: listener traits fanned out by
//!   `MulticastDelegate`

pub mod config;
mod data;
pub mod delegate;
pub mod e2ee;
pub mod engine;
pub mod error;
mod lifecycle;
pub mod participant;
mod registry;
pub mod retry;
pub mod room;
mod speakers;
pub mod state;
mod tracks;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export core types
pub use config::RoomOptions;
pub use delegate::{DelegateId, MulticastDelegate, ParticipantDelegate, RoomDelegate};
pub use e2ee::E2eeManager;
pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, Result, RoomError};
pub use participant::{AttachedTrack, Participant, ParticipantKind, TrackPublication};
pub use retry::RetryConfig;
pub use room::Room;
pub use state::RoomState;
pub use types::{
    ConnectionState, EngineState, MediaStream, ParticipantIdentity, ParticipantInfo,
    ParticipantSid, ParticipantStatus, RawTrack, ReconnectMode, SpeakerInfo, TrackInfo,
    TrackKind, TrackPermission, TrackReceiver, TrackSid, TrackSubscriptionPermissions,
    UserPacket,
};

// Re-export the in-memory engine for convenience
pub use engine::memory::{EngineCall, MemoryEngine, MemoryFailures};
