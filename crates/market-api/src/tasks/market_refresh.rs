//! 시장 데이터 전체 갱신 작업.
//!
//! 업스트림 어댑터로 카탈로그 전체를 가져와 긴 TTL로 저장합니다. 시뮬레이터는
//! 사용하지 않습니다. 스케줄러가 필요보다 자주 실행해도 되도록, 저장된
//! 데이터셋의 `lastFullRefresh`가 충분히 최근이면 네트워크 호출을 건너뜁니다.

use async_trait::async_trait;
use chrono::Utc;
use market_core::{catalog, SchedulerConfig};
use market_data::{DataSourceAdapter, MarketDataService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::scheduler::{JobResult, ScheduledJob};
use crate::metrics::record_refresh;

pub const TASK_ID: &str = "market-data-refresh";
pub const TASK_NAME: &str = "Alpha Vantage Market Data Refresh";

pub struct MarketRefreshJob {
    adapter: DataSourceAdapter,
    service: Arc<MarketDataService>,
    interval: Duration,
    min_refresh_age: chrono::Duration,
    min_instruments: usize,
    ttl_secs: u64,
}

impl MarketRefreshJob {
    pub fn new(
        adapter: DataSourceAdapter,
        service: Arc<MarketDataService>,
        config: &SchedulerConfig,
    ) -> Self {
        let ttl_secs = service.config().refresh_ttl_secs;
        Self {
            adapter,
            service,
            interval: config.refresh_interval(),
            min_refresh_age: chrono::Duration::seconds(config.min_refresh_age_secs as i64),
            min_instruments: config.min_instruments,
            ttl_secs,
        }
    }

    /// 저장된 데이터셋이 최근 전체 갱신 결과인지 확인합니다.
    async fn recently_refreshed(&self) -> Option<chrono::Duration> {
        match self.service.cached_dataset().await {
            Ok(Some(data)) => data
                .last_full_refresh
                .map(|at| Utc::now() - at)
                .filter(|age| *age < self.min_refresh_age),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not read cached dataset before refresh");
                None
            }
        }
    }
}

#[async_trait]
impl ScheduledJob for MarketRefreshJob {
    fn id(&self) -> &str {
        TASK_ID
    }

    fn name(&self) -> &str {
        TASK_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> JobResult {
        if let Some(age) = self.recently_refreshed().await {
            info!(age_minutes = age.num_minutes(), "Market data is fresh, skipping refresh");
            record_refresh("skipped", 0);
            return Ok(format!(
                "Skipped: last full refresh {} minutes ago",
                age.num_minutes()
            ));
        }

        let outcome = self.adapter.fetch_all(catalog()).await;
        let count = outcome.data.instrument_count();
        if count < self.min_instruments {
            record_refresh("failed", outcome.stats.live);
            return Err(format!("Insufficient market data: {} instruments", count).into());
        }

        if let Err(e) = self.service.store_dataset(&outcome.data, self.ttl_secs).await {
            record_refresh("failed", outcome.stats.live);
            return Err(e.into());
        }

        record_refresh("success", outcome.stats.live);
        Ok(format!(
            "Refreshed {} instruments ({} live, {} fallback, {} calls)",
            count, outcome.stats.live, outcome.stats.fallbacks, outcome.stats.calls_used
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{DataSource, MarketConfig, ProviderConfig};
    use market_data::{keys, CacheStore, FallbackGenerator, MemoryCache};

    fn job(store: Option<Arc<MemoryCache>>) -> (MarketRefreshJob, Arc<MarketDataService>) {
        let service = Arc::new(MarketDataService::new(
            store.map(|s| s as Arc<dyn CacheStore>),
            MarketConfig::default(),
        ));
        let adapter = DataSourceAdapter::new(None, &ProviderConfig::default());
        let job = MarketRefreshJob::new(adapter, service.clone(), &SchedulerConfig::default());
        (job, service)
    }

    #[tokio::test]
    async fn test_refresh_persists_with_long_ttl() {
        let store = Arc::new(MemoryCache::new());
        let (job, service) = job(Some(store.clone()));

        let message = job.run().await.unwrap();
        assert!(message.starts_with("Refreshed 18 instruments"));

        let ttl = store.ttl(keys::MARKET_DATA).await.unwrap();
        assert!(ttl > 47 * 3600 && ttl <= 48 * 3600);

        let cached = service.cached_dataset().await.unwrap().unwrap();
        assert_eq!(cached.source, DataSource::Synthetic);
        assert!(cached.last_full_refresh.is_some());
    }

    #[tokio::test]
    async fn test_recent_refresh_is_skipped() {
        let store = Arc::new(MemoryCache::new());
        let (job, service) = job(Some(store));

        let mut data = FallbackGenerator::new().dataset(catalog(), Utc::now());
        data.last_full_refresh = Some(Utc::now() - chrono::Duration::hours(2));
        service.store_dataset(&data, 3600).await.unwrap();

        let message = job.run().await.unwrap();
        assert!(message.starts_with("Skipped"));
    }

    #[tokio::test]
    async fn test_stale_refresh_runs() {
        let store = Arc::new(MemoryCache::new());
        let (job, service) = job(Some(store));

        let mut data = FallbackGenerator::new().dataset(catalog(), Utc::now());
        data.last_full_refresh = Some(Utc::now() - chrono::Duration::hours(23));
        service.store_dataset(&data, 3600).await.unwrap();

        assert!(job.run().await.unwrap().starts_with("Refreshed"));
    }

    #[tokio::test]
    async fn test_store_failure_fails_task() {
        let store = Arc::new(MemoryCache::new());
        store.set_offline(true);
        let (job, _) = job(Some(store));

        assert!(job.run().await.is_err());
    }

    #[test]
    fn test_identity() {
        let (job, _) = job(None);
        assert_eq!(job.id(), "market-data-refresh");
        assert_eq!(job.interval(), Duration::from_secs(86_400));
    }
}
