//! 업스트림 데이터 소스 어댑터.
//!
//! 갱신 1회(pass) 전체가 하나의 호출 예산을 공유합니다. 예산이 소진되었거나
//! 개별 호출이 실패한 지수는 합성 데이터로 대체하며, 한 지수의 실패가
//! 전체 pass를 중단시키지 않습니다.

use chrono::Utc;
use market_core::{
    display_time, DataSource, Instrument, MarketData, MarketItem, ProviderConfig, Region,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::alpha_vantage::{IntradaySeries, Quote, QuoteProvider};
use crate::fallback::{random_trend, FallbackGenerator};

/// 단일 pass 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// 사용한 호출 수
    pub calls_used: u32,
    /// 업스트림 시세로 채운 지수 수
    pub live: usize,
    /// 합성 데이터로 대체한 지수 수
    pub fallbacks: usize,
}

impl FetchStats {
    pub fn log_summary(&self) {
        info!(
            calls_used = self.calls_used,
            live = self.live,
            fallbacks = self.fallbacks,
            "Market data fetch pass completed"
        );
    }
}

/// pass 결과.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub data: MarketData,
    pub stats: FetchStats,
}

/// 데이터 소스 어댑터.
#[derive(Clone)]
pub struct DataSourceAdapter {
    provider: Option<Arc<dyn QuoteProvider>>,
    generator: FallbackGenerator,
    call_budget: u32,
    request_delay: Duration,
}

impl DataSourceAdapter {
    /// 새 어댑터를 생성합니다. `provider`가 없으면 모든 지수를 합성합니다.
    pub fn new(provider: Option<Arc<dyn QuoteProvider>>, config: &ProviderConfig) -> Self {
        Self {
            provider,
            generator: FallbackGenerator::new(),
            call_budget: config.call_budget,
            request_delay: config.request_delay(),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// 카탈로그 전체를 고정 순서로 가져옵니다.
    pub async fn fetch_all(&self, catalog: &[Instrument]) -> FetchOutcome {
        let mut data = MarketData::empty(Utc::now(), DataSource::Authoritative);
        let mut stats = FetchStats::default();

        for region in Region::ALL {
            let instruments: Vec<&Instrument> =
                catalog.iter().filter(|i| i.region == region).collect();

            for (position, instrument) in instruments.iter().enumerate() {
                let item = self.fetch_one(instrument, position, &mut stats).await;
                data.region_mut(region).push(item);

                let is_last = position + 1 == instruments.len();
                if !is_last && self.provider.is_some() && stats.calls_used < self.call_budget {
                    tokio::time::sleep(self.request_delay).await;
                }
            }
        }

        let finished = Utc::now();
        data.last_updated = finished;
        data.last_full_refresh = Some(finished);
        data.last_trend_update = Some(finished);
        if stats.live == 0 {
            data.source = DataSource::Synthetic;
        }

        stats.log_summary();
        FetchOutcome { data, stats }
    }

    async fn fetch_one(
        &self,
        instrument: &Instrument,
        position: usize,
        stats: &mut FetchStats,
    ) -> MarketItem {
        let Some(provider) = self.provider.as_ref() else {
            stats.fallbacks += 1;
            return self.generator.instrument(instrument, position, Utc::now());
        };

        if stats.calls_used >= self.call_budget {
            debug!(instrument = instrument.id, "호출 예산 소진, 합성 데이터 사용");
            stats.fallbacks += 1;
            return self.generator.instrument(instrument, position, Utc::now());
        }

        let quote = provider.global_quote(instrument.symbol).await;
        stats.calls_used += 1;

        let series = if stats.calls_used < self.call_budget {
            stats.calls_used += 1;
            match provider.intraday(instrument.symbol).await {
                Ok(series) => Some(series),
                Err(e) => {
                    warn!(instrument = instrument.id, error = %e, "장중 데이터 조회 실패");
                    None
                }
            }
        } else {
            None
        };

        match quote {
            Ok(quote) => {
                stats.live += 1;
                live_item(instrument, position, quote, series)
            }
            Err(e) => {
                warn!(
                    instrument = instrument.id,
                    provider = provider.name(),
                    error = %e,
                    "시세 조회 실패, 합성 데이터로 대체"
                );
                stats.fallbacks += 1;
                self.generator.instrument(instrument, position, Utc::now())
            }
        }
    }
}

/// 업스트림이 제공하지 않는 필드(avat, ytd)는 무작위로 채웁니다.
fn live_item(
    instrument: &Instrument,
    position: usize,
    quote: Quote,
    series: Option<IntradaySeries>,
) -> MarketItem {
    let now = Utc::now();
    let mut rng = rand::thread_rng();
    let ytd: f64 = rng.gen_range(-15.0..=15.0);

    // 포인트가 부족한 시리즈는 고정 길이 추세를 만들 수 없으므로 버림
    let (trend1, trend2, two_day_data) = match series {
        Some(series) if series.covers_trend() => (
            series.first_trend(),
            series.last_trend(),
            Some(series.points),
        ),
        Some(series) => {
            debug!(
                instrument = instrument.id,
                points = series.points.len(),
                "장중 포인트 부족, 무작위 추세 사용"
            );
            (random_trend(&mut rng), random_trend(&mut rng), None)
        }
        None => (random_trend(&mut rng), random_trend(&mut rng), None),
    };

    MarketItem {
        id: instrument.id.to_string(),
        num: instrument.region.rank(position),
        value: quote.price,
        change: quote.change,
        pct_change: quote.change_percent,
        avat: rng.gen_range(-50.0..=50.0),
        time: display_time(now),
        ytd,
        ytd_cur: ytd * rng.gen_range(0.95..=1.05),
        trend1,
        trend2,
        trend_updated: Some(now),
        last_updated: Some(now),
        two_day_data,
    }
}
