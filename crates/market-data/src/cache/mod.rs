//! 인프로세스 윈도우 캐시.
//!
//! 주기별로 하나의 스냅샷(`CacheEntry`)을 보관합니다. 쓰기(`install`)는
//! 쓰기 잠금 아래에서 스냅샷을 교체하고, 읽기는 `Arc`를 복제한 뒤 바로 잠금을
//! 놓으므로 조회 도중 교체되어도 읽던 스냅샷은 그대로 유효합니다.

mod entry;

pub use entry::CacheEntry;

use std::collections::HashMap;
use std::sync::Arc;

use market_core::Granularity;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct CacheState {
    active: Option<Granularity>,
    entries: HashMap<Granularity, Arc<CacheEntry>>,
}

/// 주기별 스냅샷 캐시.
#[derive(Debug, Default)]
pub struct WindowCache {
    state: RwLock<CacheState>,
}

impl WindowCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스냅샷을 설치하고 해당 주기를 활성 주기로 만듭니다.
    pub async fn install(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let frequency = entry.frequency();
        let entry = Arc::new(entry);

        let mut state = self.state.write().await;
        state.active = Some(frequency);
        state.entries.insert(frequency, Arc::clone(&entry));

        debug!(
            frequency = %frequency,
            instruments = entry.instruments().len(),
            bars = entry.axis().len(),
            "캐시 스냅샷 교체"
        );
        entry
    }

    /// 주기의 스냅샷을 반환합니다.
    pub async fn snapshot(&self, frequency: Granularity) -> Option<Arc<CacheEntry>> {
        self.state.read().await.entries.get(&frequency).cloned()
    }

    /// 마지막으로 설치된 주기.
    pub async fn active_frequency(&self) -> Option<Granularity> {
        self.state.read().await.active
    }

    /// 캐시된 주기 목록.
    pub async fn frequencies(&self) -> Vec<Granularity> {
        let mut frequencies: Vec<_> = self.state.read().await.entries.keys().copied().collect();
        frequencies.sort();
        frequencies
    }

    /// 모든 스냅샷을 제거합니다.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.active = None;
    }
}
