use std::collections::BTreeSet;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 进程内缓存，过期条目在读取或清理时删除
#[derive(Debug)]
pub struct LocalStore {
    entries: DashMap<String, Entry>,
    // 按过期时间排序；可能残留已被覆盖或删除的旧项，使用前与 entries 核对
    expiries: Mutex<BTreeSet<(Instant, String)>>,
    max_entries: usize,
}

impl LocalStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            expiries: Mutex::new(BTreeSet::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        // 读锁已释放；重新判断过期，避免删掉并发写入的新值
        if let Some((key, entry)) = self.entries.remove_if(key, |_, entry| entry.is_expired(now)) {
            self.expiries.lock().remove(&(entry.expires_at, key));
        }
        None
    }

    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(far_future);

        let mut expiries = self.expiries.lock();
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room(&mut expiries, now);
        }

        let previous = self
            .entries
            .insert(key.to_owned(), Entry { value, expires_at });
        if let Some(previous) = previous {
            expiries.remove(&(previous.expires_at, key.to_owned()));
        }
        expiries.insert((expires_at, key.to_owned()));
    }

    /// 删除所有已过期条目
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut expiries = self.expiries.lock();
        let mut removed = 0;

        while let Some((expires_at, _)) = expiries.first() {
            if *expires_at > now {
                break;
            }
            if let Some((expires_at, key)) = expiries.pop_first() {
                if self.remove_exact(&key, expires_at) {
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // 从最早过期的一端淘汰，已过期条目自然排在最前
    fn make_room(&self, expiries: &mut BTreeSet<(Instant, String)>, now: Instant) {
        while self.entries.len() >= self.max_entries {
            let Some((expires_at, key)) = expiries.pop_first() else {
                break;
            };
            if self.remove_exact(&key, expires_at) {
                tracing::debug!(key = %key, expired = expires_at <= now, "local cache evicted entry");
            }
        }
    }

    fn remove_exact(&self, key: &str, expires_at: Instant) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.expires_at == expires_at)
            .is_some()
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}
