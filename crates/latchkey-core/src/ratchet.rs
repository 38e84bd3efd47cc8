//! Message key resolution shared by pairwise and group chains

use latchkey_crypto::{ChainKey, MessageKey, MessageKeyCache};
use tracing::debug;

use crate::error::RatchetError;

/// Find the message key for `iteration` on a receiving chain.
///
/// - Behind the chain: the key must be in the cache (taken, so single use)
/// - At the chain: derive and advance
/// - Ahead of the chain: park every intermediate key in the cache, then derive
///   and advance
///
/// The gap bound is checked before anything is derived, so a rejected
/// iteration leaves both chain and cache untouched. Callers still work on a
/// copy because later verification steps can fail too.
pub(crate) fn resolve_message_key<T: PartialEq + Clone>(
    chain: &mut ChainKey,
    cache: &mut MessageKeyCache<T>,
    tag: &T,
    iteration: u32,
    max_skip: u32,
) -> Result<MessageKey, RatchetError> {
    let current = chain.iteration();

    if iteration < current {
        return cache
            .take_tagged(tag, iteration)
            .ok_or(RatchetError::DuplicateOrStaleMessage { iteration, current });
    }

    let gap = iteration - current;
    if gap > max_skip {
        return Err(RatchetError::ExcessiveMessageGap { current, requested: iteration, max_skip });
    }

    while chain.iteration() < iteration {
        let skipped = chain.advance()?;
        if let Some(evicted) = cache.put_tagged(tag.clone(), skipped) {
            debug!(evicted = evicted.iteration(), "skipped message key evicted");
        }
    }

    if gap > 0 {
        debug!(from = current, to = iteration, cached = cache.len(), "fast-forwarded chain");
    }

    Ok(chain.advance()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: () = ();

    fn fresh_chain() -> ChainKey {
        ChainKey::new([0x11; 32], 0)
    }

    #[test]
    fn in_order_advances_without_caching() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache = MessageKeyCache::new(10);

        let key = resolve_message_key(&mut chain, &mut cache, &TAG, 0, 5).unwrap();

        assert_eq!(key.iteration(), 0);
        assert_eq!(chain.iteration(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn ahead_caches_intermediate_keys() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache = MessageKeyCache::new(10);

        let key = resolve_message_key(&mut chain, &mut cache, &TAG, 3, 5).unwrap();

        assert_eq!(key.iteration(), 3);
        assert_eq!(chain.iteration(), 4);
        assert!(cache.contains(0));
        assert!(cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn behind_takes_from_cache_once() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache = MessageKeyCache::new(10);
        resolve_message_key(&mut chain, &mut cache, &TAG, 2, 5).unwrap();

        let expected = ChainKey::new([0x11; 32], 0).message_key();
        let key = resolve_message_key(&mut chain, &mut cache, &TAG, 0, 5).unwrap();
        assert_eq!(key, expected);

        let err = resolve_message_key(&mut chain, &mut cache, &TAG, 0, 5).unwrap_err();
        assert_eq!(err, RatchetError::DuplicateOrStaleMessage { iteration: 0, current: 3 });
    }

    #[test]
    fn gap_over_bound_leaves_state_untouched() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache = MessageKeyCache::new(10);

        let err = resolve_message_key(&mut chain, &mut cache, &TAG, 6, 5).unwrap_err();

        assert_eq!(
            err,
            RatchetError::ExcessiveMessageGap { current: 0, requested: 6, max_skip: 5 }
        );
        assert_eq!(chain.iteration(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn gap_at_bound_is_accepted() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache = MessageKeyCache::new(10);

        let key = resolve_message_key(&mut chain, &mut cache, &TAG, 5, 5).unwrap();
        assert_eq!(key.iteration(), 5);
    }

    #[test]
    fn tags_keep_chains_apart() {
        let mut chain = fresh_chain();
        let mut cache: MessageKeyCache<u8> = MessageKeyCache::new(10);
        resolve_message_key(&mut chain, &mut cache, &1, 1, 5).unwrap();

        let err = resolve_message_key(&mut chain, &mut cache, &2, 0, 5).unwrap_err();
        assert!(matches!(err, RatchetError::DuplicateOrStaleMessage { .. }));
        assert!(cache.contains_tagged(&1, 0));
    }
}
