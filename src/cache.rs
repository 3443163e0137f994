//! Per-client tick-size / fee-rate / neg-risk cache. Populated lazily on
//! first use; never refreshed on a timer by this crate.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;

use crate::numeric::Amount;

#[derive(Debug, Clone, Copy)]
pub struct MarketMeta {
    pub tick_size: Decimal,
    pub fee_rate_bps: u32,
    pub neg_risk: bool,
}

#[derive(Debug, Default)]
pub struct MarketMetaCache {
    entries: RwLock<HashMap<Amount, MarketMeta>>,
}

impl MarketMetaCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, token_id: Amount) -> Option<MarketMeta> {
        self.entries.read().expect("cache lock poisoned").get(&token_id).copied()
    }

    pub fn insert(&self, token_id: Amount, meta: MarketMeta) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(token_id, meta);
    }

    pub fn invalidate(&self, token_id: Amount) {
        self.entries.write().expect("cache lock poisoned").remove(&token_id);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cache_insert_get_invalidate() {
        let cache = MarketMetaCache::new();
        let token = Amount::from_u64(7);
        assert!(cache.get(token).is_none());
        cache.insert(
            token,
            MarketMeta {
                tick_size: dec!(0.01),
                fee_rate_bps: 0,
                neg_risk: false,
            },
        );
        assert!(cache.get(token).is_some());
        cache.invalidate(token);
        assert!(cache.get(token).is_none());
    }
}
