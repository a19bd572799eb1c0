//! 시장 데이터 시뮬레이터.
//!
//! 마지막으로 알려진 데이터셋으로부터 다음 틱을 만듭니다. 한 틱 안의 모든
//! 지수는 같은 시장 심리/지역 요인을 공유하므로 서로 상관된 방향으로
//! 움직입니다.
//!
//! 1. 시장 심리 `s ∈ [-1, 1]`
//! 2. 지역 요인 `r = 0.7·s + U(-0.3, 0.3)`
//! 3. 지수별 개별 요인 `i ∈ [-0.4, 0.4]`, 결합 `0.4·s + 0.4·r + 0.2·i`
//! 4. 변화율(%) = 결합 요인 × 0.2 × 변동성 배수
//!
//! 추세 시퀀스는 마지막 갱신 후 설정된 간격(기본 5분)이 지나야 갱신됩니다.

mod baseline;
pub mod trend;

pub use baseline::YearStartBaselines;

use chrono::{DateTime, Timelike, Utc};
use market_core::{display_time, MarketConfig, MarketData, MarketItem, Region, VolatilityClass};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// 틱당 변화율 크기 (%).
pub const TICK_MAGNITUDE: f64 = 0.2;
/// 지역 요인에서 시장 심리의 비중.
pub const REGION_SENTIMENT_WEIGHT: f64 = 0.7;
/// 지역 요인의 독립 노이즈 크기.
pub const REGION_NOISE: f64 = 0.3;
/// 개별 요인 크기.
pub const IDIOSYNCRATIC_RANGE: f64 = 0.4;

/// 지수 단위 계산 실패.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("non-finite {field} for {id}")]
    NonFinite { id: String, field: &'static str },

    #[error("negative value {value} for {id}")]
    NegativeValue { id: String, value: f64 },

    #[error("zero previous close for {id}")]
    ZeroPreviousClose { id: String },

    #[error("missing year start baseline for {id}")]
    MissingBaseline { id: String },
}

/// 틱 결과.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub data: MarketData,
    /// 이번 틱에서 추세 시퀀스를 갱신했는지 여부
    pub trends_updated: bool,
    /// 계산에 실패해 그대로 통과시킨 지수 수
    pub failures: usize,
}

/// 지수 하나에 쓰이는 난수 묶음.
///
/// 계산 성공 여부와 관계없이 항상 같은 순서로 뽑아 시드가 같으면
/// 결과가 같도록 합니다.
#[derive(Debug, Clone, Copy)]
struct Draws {
    idiosyncratic: f64,
    avat: f64,
    currency: f64,
    trend1: f64,
    trend2: f64,
}

impl Draws {
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            idiosyncratic: rng.gen_range(-IDIOSYNCRATIC_RANGE..=IDIOSYNCRATIC_RANGE),
            avat: rng.gen_range(-1.0..=1.0),
            currency: rng.gen_range(0.95..=1.05),
            trend1: rng.gen_range(-trend::TREND_NOISE..=trend::TREND_NOISE),
            trend2: rng.gen_range(-trend::TREND_NOISE..=trend::TREND_NOISE),
        }
    }
}

/// 틱 전체가 공유하는 요인.
struct TickContext {
    sentiment: f64,
    region_factors: [(Region, f64); 3],
    volume_multiplier: f64,
    update_trends: bool,
    now: DateTime<Utc>,
}

impl TickContext {
    fn region_factor(&self, region: Region) -> f64 {
        self.region_factors
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, f)| *f)
            .unwrap_or(self.sentiment)
    }
}

/// 상관된 랜덤 워크 시뮬레이터.
#[derive(Debug, Clone)]
pub struct MarketSimulator {
    baselines: YearStartBaselines,
    trend_interval: chrono::Duration,
    calm_start_hour: u32,
    calm_end_hour: u32,
    busy_volume_multiplier: f64,
}

impl MarketSimulator {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            baselines: YearStartBaselines::new(),
            trend_interval: chrono::Duration::seconds(config.trend_interval_secs as i64),
            calm_start_hour: config.calm_start_hour,
            calm_end_hour: config.calm_end_hour,
            busy_volume_multiplier: config.busy_volume_multiplier,
        }
    }

    /// 연초 기준값을 지연 초기화합니다.
    pub fn observe(&mut self, data: &MarketData, now: DateTime<Utc>) -> usize {
        self.baselines.observe(data, now)
    }

    pub fn baselines(&self) -> &YearStartBaselines {
        &self.baselines
    }

    /// 거래가 몰리는 시간대(개장/마감 부근)면 배수를 키웁니다.
    pub fn volume_multiplier(&self, hour: u32) -> f64 {
        if hour < self.calm_start_hour || hour > self.calm_end_hour {
            self.busy_volume_multiplier
        } else {
            1.0
        }
    }

    /// 추세 갱신 시점 여부.
    pub fn trends_due(&self, last_trend_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_trend_update.map_or(true, |last| now - last >= self.trend_interval)
    }

    /// 스레드 로컬 난수로 한 틱 진행합니다.
    pub fn tick(&mut self, data: &MarketData, now: DateTime<Utc>) -> TickOutcome {
        self.tick_with_rng(data, now, &mut rand::thread_rng())
    }

    /// 주어진 난수 생성기로 한 틱 진행합니다.
    pub fn tick_with_rng<R: Rng + ?Sized>(
        &mut self,
        data: &MarketData,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TickOutcome {
        self.baselines.observe(data, now);

        let sentiment: f64 = rng.gen_range(-1.0..=1.0);
        let region_factors = Region::ALL.map(|region| {
            let noise: f64 = rng.gen_range(-REGION_NOISE..=REGION_NOISE);
            (region, sentiment * REGION_SENTIMENT_WEIGHT + noise)
        });

        let ctx = TickContext {
            sentiment,
            region_factors,
            volume_multiplier: self.volume_multiplier(now.hour()),
            update_trends: self.trends_due(data.last_trend_update, now),
            now,
        };

        let mut next = data.clone();
        let mut failures = 0;

        for region in Region::ALL {
            let items = data
                .region(region)
                .iter()
                .map(|item| {
                    let draws = Draws::sample(rng);
                    match self.step(region, item, &ctx, draws, rng) {
                        Ok(updated) => updated,
                        Err(e) => {
                            warn!(instrument = %item.id, region = %region, error = %e, "Error updating item");
                            failures += 1;
                            self.pass_through(item, &ctx, rng)
                        }
                    }
                })
                .collect();
            *next.region_mut(region) = items;
        }

        next.last_updated = now;
        if ctx.update_trends {
            next.last_trend_update = Some(now);
        }

        debug!(
            sentiment = ctx.sentiment,
            trends_updated = ctx.update_trends,
            failures,
            "Simulated tick"
        );

        TickOutcome {
            data: next,
            trends_updated: ctx.update_trends,
            failures,
        }
    }

    fn step<R: Rng + ?Sized>(
        &self,
        region: Region,
        item: &MarketItem,
        ctx: &TickContext,
        draws: Draws,
        rng: &mut R,
    ) -> Result<MarketItem, SimulationError> {
        let id = || item.id.clone();

        for (field, value) in [("value", item.value), ("change", item.change), ("avat", item.avat)] {
            if !value.is_finite() {
                return Err(SimulationError::NonFinite { id: id(), field });
            }
        }
        if item.value < 0.0 {
            return Err(SimulationError::NegativeValue {
                id: id(),
                value: item.value,
            });
        }

        let previous_close = item.value - item.change;
        if previous_close == 0.0 {
            return Err(SimulationError::ZeroPreviousClose { id: id() });
        }

        let baseline = self
            .baselines
            .get(region, &item.id)
            .filter(|b| *b != 0.0 && b.is_finite())
            .ok_or_else(|| SimulationError::MissingBaseline { id: id() })?;

        let combined = ctx.sentiment * 0.4 + ctx.region_factor(region) * 0.4 + draws.idiosyncratic * 0.2;
        let volatility = VolatilityClass::for_instrument(&item.id).multiplier();
        let change_percent = combined * TICK_MAGNITUDE * volatility;
        let delta = item.value * change_percent / 100.0;

        let value = item.value + delta;
        if value < 0.0 {
            return Err(SimulationError::NegativeValue { id: id(), value });
        }
        let change = item.change + delta;
        let ytd = (value - baseline) / baseline * 100.0;

        let (trend1, trend2, trend_updated) = if ctx.update_trends {
            (
                trend::shift(&trend::sanitize(&item.trend1, rng), draws.trend1),
                trend::shift(&trend::sanitize(&item.trend2, rng), draws.trend2),
                Some(ctx.now),
            )
        } else {
            (
                trend::sanitize(&item.trend1, rng),
                trend::sanitize(&item.trend2, rng),
                item.trend_updated.or(Some(ctx.now)),
            )
        };

        Ok(MarketItem {
            value,
            change,
            pct_change: change / previous_close * 100.0,
            avat: item.avat + draws.avat * ctx.volume_multiplier,
            time: display_time(ctx.now),
            ytd,
            ytd_cur: ytd * draws.currency,
            trend1,
            trend2,
            trend_updated,
            last_updated: Some(ctx.now),
            ..item.clone()
        })
    }

    /// 계산 실패 시 표시 시각과 추세 대체만 적용합니다.
    fn pass_through<R: Rng + ?Sized>(&self, item: &MarketItem, ctx: &TickContext, rng: &mut R) -> MarketItem {
        MarketItem {
            time: display_time(ctx.now),
            trend1: trend::sanitize(&item.trend1, rng),
            trend2: trend::sanitize(&item.trend2, rng),
            last_updated: Some(ctx.now),
            ..item.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackGenerator;
    use chrono::{Duration, TimeZone};
    use market_core::{catalog, DataSource, TREND_LENGTH};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    fn seeded_dataset(seed: u64) -> MarketData {
        let mut rng = StdRng::seed_from_u64(seed);
        FallbackGenerator::new().dataset_with_rng(catalog(), start(), &mut rng)
    }

    fn simulator() -> MarketSimulator {
        MarketSimulator::new(&MarketConfig::default())
    }

    #[test]
    fn test_pct_change_matches_change_and_value() {
        let mut sim = simulator();
        let mut rng = StdRng::seed_from_u64(11);
        let mut data = seeded_dataset(11);

        for n in 0..50 {
            let now = start() + Duration::seconds(30 * n);
            data = sim.tick_with_rng(&data, now, &mut rng).data;
            for (_, item) in data.items() {
                let implied = item.implied_pct_change().unwrap();
                assert!((implied - item.pct_change).abs() < 1e-6, "{}", item.id);
            }
        }
    }

    #[test]
    fn test_seeded_tick_is_deterministic() {
        let data = seeded_dataset(5);
        let a = simulator().tick_with_rng(&data, start(), &mut StdRng::seed_from_u64(99));
        let b = simulator().tick_with_rng(&data, start(), &mut StdRng::seed_from_u64(99));
        assert_eq!(a.data, b.data);

        let c = simulator().tick_with_rng(&data, start(), &mut StdRng::seed_from_u64(100));
        assert_ne!(a.data, c.data);
    }

    #[test]
    fn test_shape_and_source_preserved() {
        let data = seeded_dataset(1).with_source(DataSource::Cached);
        let outcome = simulator().tick(&data, start());

        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.data.source, DataSource::Cached);
        let before: Vec<_> = data.items().map(|(r, i)| (r, i.id.clone(), i.num.clone())).collect();
        let after: Vec<_> = outcome.data.items().map(|(r, i)| (r, i.id.clone(), i.num.clone())).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_trends_change_at_most_once_per_interval() {
        let mut sim = simulator();
        let mut rng = StdRng::seed_from_u64(3);
        let mut data = seeded_dataset(3);
        data.last_trend_update = Some(start());

        let original = data.americas[0].trend1.clone();
        let mut updates = 0;
        // 10초 간격으로 4분 50초 동안
        for n in 1..=29 {
            let outcome = sim.tick_with_rng(&data, start() + Duration::seconds(10 * n), &mut rng);
            updates += outcome.trends_updated as usize;
            data = outcome.data;
        }
        assert_eq!(updates, 0);
        assert_eq!(data.americas[0].trend1, original);
        assert_eq!(data.last_trend_update, Some(start()));

        let due = start() + Duration::minutes(5);
        let outcome = sim.tick_with_rng(&data, due, &mut rng);
        assert!(outcome.trends_updated);
        assert_eq!(outcome.data.last_trend_update, Some(due));
        assert_eq!(outcome.data.americas[0].trend1[..TREND_LENGTH - 1], original[1..]);

        let again = sim.tick_with_rng(&outcome.data, due + Duration::seconds(10), &mut rng);
        assert!(!again.trends_updated);
    }

    #[test]
    fn test_missing_trend_timestamp_updates_immediately() {
        let mut data = seeded_dataset(8);
        data.last_trend_update = None;
        assert!(simulator().tick(&data, start()).trends_updated);
    }

    #[test]
    fn test_ytd_follows_baseline() {
        let mut sim = simulator();
        let data = seeded_dataset(21);
        let outcome = sim.tick_with_rng(&data, start(), &mut StdRng::seed_from_u64(21));

        for (region, item) in outcome.data.items() {
            let baseline = sim.baselines().get(region, &item.id).unwrap();
            let expected = (item.value - baseline) / baseline * 100.0;
            assert!((item.ytd - expected).abs() < 1e-9);
            let ratio = item.ytd_cur / item.ytd;
            assert!(item.ytd == 0.0 || (0.95..=1.05).contains(&ratio));
        }
    }

    #[test]
    fn test_bad_instrument_passes_through() {
        let mut data = seeded_dataset(4);
        data.emea[2].value = f64::NAN;
        let poisoned = data.emea[2].clone();

        let now = start() + Duration::minutes(1);
        let outcome = simulator().tick(&data, now);

        assert_eq!(outcome.failures, 1);
        let passed = &outcome.data.emea[2];
        assert!(passed.value.is_nan());
        assert_eq!(passed.change, poisoned.change);
        assert_eq!(passed.time, display_time(now));
        assert_eq!(passed.last_updated, Some(now));
        assert_ne!(outcome.data.emea[1].value, data.emea[1].value);
    }

    #[test]
    fn test_hundred_ticks_stay_bounded() {
        for seed in 0..20 {
            let mut sim = simulator();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut data = MarketData::empty(start(), DataSource::Synthetic);
            let mut ibovespa = seeded_dataset(seed).americas[5].clone();
            ibovespa.change = 0.0;
            let initial = ibovespa.value;
            data.americas.push(ibovespa);

            for n in 0..100 {
                data = sim
                    .tick_with_rng(&data, start() + Duration::seconds(n), &mut rng)
                    .data;
                let value = data.americas[0].value;
                assert!(value >= 0.0);
                assert!((value - initial).abs() <= initial * 0.5, "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_moves_are_correlated_across_regions() {
        let mut sim = simulator();
        let mut rng = StdRng::seed_from_u64(2024);
        let mut data = seeded_dataset(2024);
        let (mut nasdaq, mut dax) = (Vec::new(), Vec::new());

        for n in 0..300 {
            let next = sim
                .tick_with_rng(&data, start() + Duration::seconds(n), &mut rng)
                .data;
            nasdaq.push(next.americas[2].value / data.americas[2].value - 1.0);
            dax.push(next.emea[3].value / data.emea[3].value - 1.0);
            data = next;
        }

        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        let (ma, mb) = (mean(&nasdaq), mean(&dax));
        let cov: f64 = nasdaq.iter().zip(&dax).map(|(a, b)| (a - ma) * (b - mb)).sum();
        let var_a: f64 = nasdaq.iter().map(|a| (a - ma).powi(2)).sum();
        let var_b: f64 = dax.iter().map(|b| (b - mb).powi(2)).sum();
        let correlation = cov / (var_a.sqrt() * var_b.sqrt());

        assert!(correlation > 0.5, "correlation {}", correlation);
    }

    #[test]
    fn test_volume_multiplier_window() {
        let sim = simulator();
        assert_eq!(sim.volume_multiplier(9), 1.5);
        assert_eq!(sim.volume_multiplier(10), 1.0);
        assert_eq!(sim.volume_multiplier(15), 1.0);
        assert_eq!(sim.volume_multiplier(16), 1.5);
    }
}
