//! Ratchet limits
//!
//! Bounds on how far a chain may be fast-forwarded and how much historical
//! state is retained. These values must match between peers only in the loose
//! sense that a receiver with a smaller `max_skip` rejects gaps a sender
//! considers fine.

use thiserror::Error;

/// Default maximum number of message keys derived ahead in one step.
pub const DEFAULT_MAX_SKIP: u32 = 1000;

/// Default capacity of each skipped message key cache.
pub const DEFAULT_MAX_MESSAGE_KEYS: usize = 2000;

/// Default number of receiving chains retained per pairwise session.
pub const DEFAULT_MAX_RECEIVER_CHAINS: usize = 5;

/// Default number of sender key states retained per record.
pub const DEFAULT_MAX_SENDER_KEY_STATES: usize = 5;

/// Default number of superseded pairwise sessions kept per record.
pub const DEFAULT_MAX_ARCHIVED_SESSIONS: usize = 40;

/// Ratchet configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatchetConfig {
    /// Largest iteration gap accepted in a single decrypt
    pub max_skip: u32,
    /// Capacity of each skipped-key cache (FIFO eviction)
    pub max_message_keys: usize,
    /// Receiving chains kept per session; older ones are pruned with their
    /// skipped keys
    pub max_receiver_chains: usize,
    /// Sender key states kept per record; the oldest is evicted on rotation
    pub max_sender_key_states: usize,
    /// Archived sessions kept per record
    pub max_archived_sessions: usize,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self {
            max_skip: DEFAULT_MAX_SKIP,
            max_message_keys: DEFAULT_MAX_MESSAGE_KEYS,
            max_receiver_chains: DEFAULT_MAX_RECEIVER_CHAINS,
            max_sender_key_states: DEFAULT_MAX_SENDER_KEY_STATES,
            max_archived_sessions: DEFAULT_MAX_ARCHIVED_SESSIONS,
        }
    }
}

impl RatchetConfig {
    /// Check that every bound leaves room for the current state.
    ///
    /// `max_skip`, `max_message_keys` and `max_archived_sessions` may be zero
    /// (no reordering tolerance, no archive). A record or session without
    /// room for its current chain cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_receiver_chains == 0 {
            return Err(ConfigError::ZeroBound { field: "max_receiver_chains" });
        }
        if self.max_sender_key_states == 0 {
            return Err(ConfigError::ZeroBound { field: "max_sender_key_states" });
        }
        Ok(())
    }
}

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A bound that must hold at least one entry was zero
    #[error("{field} must be at least 1")]
    ZeroBound {
        /// Name of the offending field
        field: &'static str,
    },
}
