//! TTL 快取
//!
//! Engine 1 與 orchestrator 各自擁有一個實例（不使用全域狀態）。
//! 以 `DashMap` 儲存，查詢不需要跨請求的鎖。鍵是完整的正規化輸入，
//! 不是雜湊摘要。

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

/// 快取值的結構檢查；未通過者視為未命中
pub trait CacheIntegrity {
    fn is_well_formed(&self) -> bool;
}

impl<T: CacheIntegrity> CacheIntegrity for Vec<T> {
    fn is_well_formed(&self) -> bool {
        self.iter().all(T::is_well_formed)
    }
}

struct Entry<V> {
    value: V,
    inserted: Instant,
    seq: u64,
}

/// 命中統計
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Corrupt,
    Miss,
}

pub struct TtlCache<K, V> {
    name: &'static str,
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
    max_entries: usize,
    seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + CacheIntegrity,
{
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            max_entries,
            seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 讀取；過期或結構不符的項目會被移除並回傳 None
    pub fn get(&self, key: &K) -> Option<V> {
        let lookup = match self.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() >= self.ttl => Lookup::Expired,
            Some(entry) if !entry.value.is_well_formed() => Lookup::Corrupt,
            Some(entry) => Lookup::Hit(entry.value.clone()),
            None => Lookup::Miss,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, "cache hit");
                Some(value)
            }
            Lookup::Expired => {
                self.entries.remove(key);
                self.record_miss();
                None
            }
            Lookup::Corrupt => {
                self.entries.remove(key);
                warn!(cache = self.name, "dropping malformed cache entry");
                self.record_miss();
                None
            }
            Lookup::Miss => {
                self.record_miss();
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if self.max_entries == 0 {
            return;
        }
        self.purge_expired();

        while self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().seq)
                .map(|e| e.key().clone());
            match oldest {
                Some(old) => {
                    self.entries.remove(&old);
                    debug!(cache = self.name, "evicted oldest entry");
                }
                None => break,
            }
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                seq,
            },
        );
    }

    /// 讀穿式查詢：命中直接回傳，否則計算並存入
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted.elapsed() < ttl);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.name, "cache miss");
    }
}

// ============================================================================
// 單元測試
// ============================================================================
