//! End-to-end encryption lifecycle hook
//!
//! Key management and frame encryption live outside this crate; the room only
//! holds the manager for the lifetime of a connection.

/// Encryption manager attached to a room
pub trait E2eeManager: Send + Sync {
    /// Release keys and frame cryptors; called once when the manager is
    /// dropped from the room (disconnect or close)
    fn cleanup(&self);
}
