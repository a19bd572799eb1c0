//! 합성 데이터 생성기.
//!
//! 외부 호출 없이 구조적으로 유효한 데이터셋을 만듭니다. 지수마다 독립적으로
//! 값을 만들며 지수 간 상관관계는 없습니다 (상관된 움직임은 시뮬레이터 담당).

use chrono::{DateTime, Utc};
use market_core::{display_time, DataSource, Instrument, MarketData, MarketItem, Region, TREND_LENGTH};
use rand::Rng;

/// [0, 1] 범위의 무작위 추세 시퀀스.
pub fn random_trend<R: Rng + ?Sized>(rng: &mut R) -> Vec<f64> {
    (0..TREND_LENGTH).map(|_| rng.gen_range(0.0..=1.0)).collect()
}

/// 합성 데이터 생성기.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 카탈로그 전체에 대한 합성 데이터셋.
    pub fn dataset(&self, catalog: &[Instrument], now: DateTime<Utc>) -> MarketData {
        self.dataset_with_rng(catalog, now, &mut rand::thread_rng())
    }

    pub fn dataset_with_rng<R: Rng + ?Sized>(
        &self,
        catalog: &[Instrument],
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> MarketData {
        let mut data = MarketData::empty(now, DataSource::Synthetic);
        data.last_trend_update = Some(now);

        for region in Region::ALL {
            let items = catalog
                .iter()
                .filter(|i| i.region == region)
                .enumerate()
                .map(|(position, instrument)| {
                    self.instrument_with_rng(instrument, position, now, rng)
                })
                .collect();
            *data.region_mut(region) = items;
        }

        data
    }

    /// 단일 지수 합성.
    pub fn instrument(&self, instrument: &Instrument, position: usize, now: DateTime<Utc>) -> MarketItem {
        self.instrument_with_rng(instrument, position, now, &mut rand::thread_rng())
    }

    /// 기준 수준 ±10% 안에서 값을 정하고, `pct_change`가 `change`와
    /// `value`에서 유도되는 값과 일치하도록 `change`를 역산합니다.
    pub fn instrument_with_rng<R: Rng + ?Sized>(
        &self,
        instrument: &Instrument,
        position: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> MarketItem {
        let value = instrument.reference_level * rng.gen_range(0.9..=1.1);
        let pct_change: f64 = rng.gen_range(-2.0..=2.0);
        let change = value * pct_change / (100.0 + pct_change);
        let ytd: f64 = rng.gen_range(-15.0..=15.0);

        MarketItem {
            id: instrument.id.to_string(),
            num: instrument.region.rank(position),
            value,
            change,
            pct_change,
            avat: rng.gen_range(-50.0..=50.0),
            time: display_time(now),
            ytd,
            ytd_cur: ytd * rng.gen_range(0.95..=1.05),
            trend1: random_trend(rng),
            trend2: random_trend(rng),
            trend_updated: Some(now),
            last_updated: Some(now),
            two_day_data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::catalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dataset_covers_catalog_in_order() {
        let now = Utc::now();
        let data = FallbackGenerator::new().dataset(catalog(), now);

        assert_eq!(data.source, DataSource::Synthetic);
        assert_eq!(data.instrument_count(), catalog().len());
        assert!(data.validate().is_ok());

        let ids: Vec<&str> = data.items().map(|(_, i)| i.id.as_str()).collect();
        let expected: Vec<&str> = catalog().iter().map(|i| i.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(data.emea[0].num, "21)");
        assert_eq!(data.asia_pacific[3].num, "34)");
    }

    #[test]
    fn test_items_respect_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = FallbackGenerator::new().dataset_with_rng(catalog(), Utc::now(), &mut rng);

        for (_, item) in data.items() {
            assert!(item.value > 0.0);
            let implied = item.implied_pct_change().unwrap();
            assert!((implied - item.pct_change).abs() < 1e-9, "{}", item.id);
            assert_eq!(item.trend1.len(), TREND_LENGTH);
            assert!(item.trend2.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let now = Utc::now();
        let a = FallbackGenerator::new().dataset_with_rng(catalog(), now, &mut StdRng::seed_from_u64(1));
        let b = FallbackGenerator::new().dataset_with_rng(catalog(), now, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }
}
