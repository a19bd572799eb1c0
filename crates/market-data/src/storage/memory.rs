//! 인메모리 캐시 저장소 (테스트 전용).
//!
//! 만료 시각은 tokio 시계를 따르므로 `tokio::time::pause`/`advance`로
//! TTL 윈도우를 결정적으로 검증할 수 있습니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::CacheStore;
use crate::error::{DataError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// 인메모리 [`CacheStore`] 구현.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장소 장애를 흉내냅니다. `true`면 모든 명령이 실패합니다.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 만료되지 않은 키 개수.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // 테스트 전용 저장소이므로 poison 상태도 그대로 사용
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DataError::CacheError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn live_entry<'a>(
        map: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Entry> {
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
        }
        map.get_mut(key)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        let mut map = self.lock();
        Ok(Self::live_entry(&mut map, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_online()?;
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.check_online()?;
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.check_online()?;
        let mut map = self.lock();
        let now = Instant::now();
        match Self::live_entry(&mut map, key, now) {
            Some(entry) => {
                let count: i64 = entry.value.parse().map_err(|_| {
                    DataError::CacheError("value is not an integer or out of range".to_string())
                })?;
                let next = count + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        self.check_online()?;
        let mut map = self.lock();
        let now = Instant::now();
        match Self::live_entry(&mut map, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        self.check_online()?;
        let mut map = self.lock();
        let now = Instant::now();
        Ok(match Self::live_entry(&mut map, key, now) {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(now);
                remaining.as_millis().div_ceil(1000) as i64
            }
        })
    }

    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
