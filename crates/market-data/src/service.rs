//! 시장 데이터 서비스.
//!
//! 읽기 경로는 캐시 → 합성 데이터 순으로 대체하고, 쓰기 경로는 읽기 결과에
//! 시뮬레이션 틱을 한 번 적용해 짧은 TTL로 저장합니다. 저장소 장애는
//! 호출자에게 오류로 전파하지 않고 스냅샷/결과 필드로 알립니다.

use chrono::{DateTime, TimeZone, Utc};
use market_core::{catalog, DataSource, MarketConfig, MarketData};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};
use crate::fallback::FallbackGenerator;
use crate::simulator::MarketSimulator;
use crate::storage::{keys, CacheStore, CacheStoreExt};

/// 읽기 결과.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub data: MarketData,
    /// 저장소에서 읽었는지 여부
    pub from_cache: bool,
    /// 저장소 장애 메시지 (합성 데이터로 대체된 경우)
    pub error: Option<String>,
}

/// 쓰기(update) 결과.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub data: MarketData,
    /// 저장소에 기록했는지 여부
    pub persisted: bool,
    pub trends_updated: bool,
}

/// 캐시/합성/시뮬레이션을 조율하는 서비스.
pub struct MarketDataService {
    store: Option<Arc<dyn CacheStore>>,
    generator: FallbackGenerator,
    simulator: Mutex<MarketSimulator>,
    config: MarketConfig,
}

impl MarketDataService {
    pub fn new(store: Option<Arc<dyn CacheStore>>, config: MarketConfig) -> Self {
        Self {
            store,
            generator: FallbackGenerator::new(),
            simulator: Mutex::new(MarketSimulator::new(&config)),
            config,
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// 저장소 백엔드 이름.
    pub fn store_backend(&self) -> Option<&'static str> {
        self.store.as_ref().map(|s| s.backend())
    }

    /// 현재 데이터셋을 읽습니다. 실패하지 않습니다.
    pub async fn read(&self) -> MarketSnapshot {
        match self.cached_dataset().await {
            Ok(Some(data)) => match data.validate() {
                Ok(()) => {
                    debug!(instruments = data.instrument_count(), "Serving cached market data");
                    MarketSnapshot {
                        data: data.with_source(DataSource::Cached),
                        from_cache: true,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Cached market data is invalid, serving fallback data");
                    MarketSnapshot {
                        data: self.synthesize().await,
                        from_cache: false,
                        error: Some(e.to_string()),
                    }
                }
            },
            Ok(None) => {
                debug!("No cached market data, generating fallback");
                MarketSnapshot {
                    data: self.synthesize().await,
                    from_cache: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Cache store read failed, serving fallback data");
                MarketSnapshot {
                    data: self.synthesize().await,
                    from_cache: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// 시뮬레이션 틱을 한 번 적용하고 저장합니다.
    pub async fn update(&self) -> UpdateOutcome {
        let snapshot = self.read().await;
        let mut data = snapshot.data;

        if let Some(shared) = self.shared_trend_update().await {
            if data.last_trend_update.map_or(true, |own| shared > own) {
                data.last_trend_update = Some(shared);
            }
        }

        let now = Utc::now();
        let outcome = self.simulator.lock().await.tick(&data, now);
        if outcome.failures > 0 {
            warn!(failures = outcome.failures, "Some instruments were passed through unchanged");
        }

        let mut data = outcome.data;
        let persisted = match self.store_dataset(&data, self.config.tick_ttl_secs).await {
            Ok(()) => {
                data.source = DataSource::Cached;
                true
            }
            Err(DataError::CacheUnavailable) => false,
            Err(e) => {
                warn!(error = %e, "Failed to persist simulated tick");
                false
            }
        };

        if persisted && outcome.trends_updated {
            if let Some(store) = &self.store {
                let millis = now.timestamp_millis().to_string();
                if let Err(e) = store.set(keys::LAST_TREND_UPDATE, &millis).await {
                    warn!(error = %e, "Failed to record trend update time");
                }
            }
        }

        UpdateOutcome {
            data,
            persisted,
            trends_updated: outcome.trends_updated,
        }
    }

    /// 저장소의 데이터셋. 저장소가 없으면 `None`.
    pub async fn cached_dataset(&self) -> Result<Option<MarketData>> {
        match &self.store {
            Some(store) => store.get_json(keys::MARKET_DATA).await,
            None => Ok(None),
        }
    }

    /// 데이터셋을 TTL과 함께 저장합니다. 저장 형식은 태그를 포함합니다.
    pub async fn store_dataset(&self, data: &MarketData, ttl_secs: u64) -> Result<()> {
        let store = self.store.as_ref().ok_or(DataError::CacheUnavailable)?;
        store.set_json_ex(keys::MARKET_DATA, data, ttl_secs).await?;
        info!(
            source = %data.source,
            ttl_secs,
            instruments = data.instrument_count(),
            "Market data stored"
        );
        Ok(())
    }

    /// 저장소 연결 확인.
    pub async fn ping_store(&self) -> Result<()> {
        let store = self.store.as_ref().ok_or(DataError::CacheUnavailable)?;
        store.ping().await
    }

    /// 합성 데이터셋을 만들고 연초 기준값을 관측합니다.
    async fn synthesize(&self) -> MarketData {
        let now = Utc::now();
        let data = self.generator.dataset(catalog(), now);
        let initialized = self.simulator.lock().await.observe(&data, now);
        if initialized > 0 {
            debug!(count = initialized, "Year start baselines initialized from fallback data");
        }
        data
    }

    async fn shared_trend_update(&self) -> Option<DateTime<Utc>> {
        let store = self.store.as_ref()?;
        match store.get(keys::LAST_TREND_UPDATE).await {
            Ok(Some(raw)) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Shared trend update time unavailable");
                None
            }
        }
    }
}
