//! Bounded cache of skipped message keys
//!
//! When a chain is fast-forwarded past iterations whose messages have not
//! arrived yet, the intermediate message keys are parked here so the late
//! message can still be decrypted exactly once.
//!
//! Eviction is FIFO: the oldest skipped key belongs to the message least
//! likely to ever arrive. Eviction is silent; a message whose key was evicted
//! simply fails to decrypt later.

use std::collections::VecDeque;

use crate::message_key::MessageKey;

/// Default number of skipped keys retained per cache.
pub const DEFAULT_CAPACITY: usize = 2000;

/// FIFO-bounded store of not-yet-consumed message keys.
///
/// Entries are keyed by `(tag, iteration)`. Group chains use the unit tag and
/// the untagged convenience methods; pairwise sessions tag each key with the
/// ratchet public key of the chain it was derived from.
///
/// # Invariants
///
/// - `len() <= capacity()`
/// - At most one entry per `(tag, iteration)`
/// - A key returned by `take` is no longer in the cache
#[derive(Debug, Clone)]
pub struct MessageKeyCache<T = ()> {
    entries: VecDeque<(T, MessageKey)>,
    capacity: usize,
}

impl<T: PartialEq> MessageKeyCache<T> {
    /// Create an empty cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity }
    }

    /// Maximum number of keys retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a key, replacing any entry for the same `(tag, iteration)`.
    ///
    /// Returns the evicted oldest key if the bound was exceeded.
    pub fn put_tagged(&mut self, tag: T, key: MessageKey) -> Option<MessageKey> {
        if let Some(pos) = self.position(&tag, key.iteration()) {
            self.entries.remove(pos);
        }
        self.entries.push_back((tag, key));

        let mut evicted = None;
        while self.entries.len() > self.capacity {
            evicted = self.entries.pop_front().map(|(_, key)| key);
        }
        evicted
    }

    /// Remove and return the key for `(tag, iteration)`, if cached.
    pub fn take_tagged(&mut self, tag: &T, iteration: u32) -> Option<MessageKey> {
        let pos = self.position(tag, iteration)?;
        self.entries.remove(pos).map(|(_, key)| key)
    }

    /// Whether a key for `(tag, iteration)` is cached.
    pub fn contains_tagged(&self, tag: &T, iteration: u32) -> bool {
        self.position(tag, iteration).is_some()
    }

    /// Drop every key whose tag fails the predicate.
    pub fn retain_tags(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|(tag, _)| keep(tag));
    }

    /// Cached entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &MessageKey)> {
        self.entries.iter().map(|(tag, key)| (tag, key))
    }

    fn position(&self, tag: &T, iteration: u32) -> Option<usize> {
        self.entries.iter().position(|(t, key)| t == tag && key.iteration() == iteration)
    }
}

impl MessageKeyCache<()> {
    /// Insert an untagged key. See [`Self::put_tagged`].
    pub fn put(&mut self, key: MessageKey) -> Option<MessageKey> {
        self.put_tagged((), key)
    }

    /// Remove and return the key for `iteration`, if cached.
    pub fn take(&mut self, iteration: u32) -> Option<MessageKey> {
        self.take_tagged(&(), iteration)
    }

    /// Whether a key for `iteration` is cached.
    pub fn contains(&self, iteration: u32) -> bool {
        self.contains_tagged(&(), iteration)
    }

    /// Cached keys, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &MessageKey> {
        self.entries.iter().map(|(_, key)| key)
    }
}

impl<T: PartialEq> Default for MessageKeyCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
