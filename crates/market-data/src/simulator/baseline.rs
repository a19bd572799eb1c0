//! 연초 기준값.
//!
//! 지수별로 처음 관측한 데이터셋에서 `value / (1 + ytd/100)`로 유도하고,
//! 관측 시점의 UTC 연도가 바뀌면 직전 값(전년도 마지막 값)으로 다시 잡습니다.

use chrono::{DateTime, Datelike, Utc};
use market_core::{MarketData, MarketItem, Region};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    year: i32,
    value: f64,
}

/// 지수별 연초 기준값 저장소 (프로세스 메모리).
#[derive(Debug, Default, Clone)]
pub struct YearStartBaselines {
    entries: HashMap<(Region, String), Baseline>,
}

impl YearStartBaselines {
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터셋의 모든 지수를 관측합니다.
    ///
    /// 처음 보는 지수는 기준값을 생성하고, 연도가 바뀐 지수는 기준값을
    /// 현재 값으로 재설정합니다. 반환값은 새로 만들거나 재설정한 개수입니다.
    pub fn observe(&mut self, data: &MarketData, now: DateTime<Utc>) -> usize {
        let year = now.year();
        let mut touched = 0;

        for (region, item) in data.items() {
            let key = (region, item.id.clone());
            match self.entries.get_mut(&key) {
                None => {
                    self.entries.insert(
                        key,
                        Baseline {
                            year,
                            value: derive_from(item),
                        },
                    );
                    touched += 1;
                }
                Some(baseline) if baseline.year != year => {
                    info!(
                        instrument = %item.id,
                        previous_year = baseline.year,
                        year,
                        "연도 변경, 연초 기준값 재설정"
                    );
                    *baseline = Baseline {
                        year,
                        value: item.value,
                    };
                    touched += 1;
                }
                Some(_) => {}
            }
        }

        if touched > 0 {
            debug!(count = touched, "Year start values initialized");
        }
        touched
    }

    pub fn get(&self, region: Region, id: &str) -> Option<f64> {
        self.entries
            .get(&(region, id.to_string()))
            .map(|b| b.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 현재 값과 YTD로 연초 값을 역산합니다. 역산할 수 없으면 10% 상승을 가정합니다.
fn derive_from(item: &MarketItem) -> f64 {
    let denominator = 1.0 + item.ytd / 100.0;
    let derived = item.value / denominator;
    if item.ytd.is_finite() && denominator > 0.0 && derived.is_finite() {
        derived
    } else {
        item.value * 0.9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackGenerator;
    use chrono::TimeZone;
    use market_core::{catalog, DataSource};

    fn dataset(now: DateTime<Utc>) -> MarketData {
        FallbackGenerator::new().dataset(catalog(), now)
    }

    #[test]
    fn test_derived_once() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut data = dataset(now);
        data.americas[0].value = 110.0;
        data.americas[0].ytd = 10.0;

        let mut baselines = YearStartBaselines::new();
        assert_eq!(baselines.observe(&data, now), catalog().len());
        let dow = baselines.get(Region::Americas, "DOW JONES").unwrap();
        assert!((dow - 100.0).abs() < 1e-9);

        // 같은 해에는 다시 계산하지 않음
        data.americas[0].value = 500.0;
        assert_eq!(baselines.observe(&data, now), 0);
        assert_eq!(baselines.get(Region::Americas, "DOW JONES"), Some(dow));
    }

    #[test]
    fn test_year_rollover_rebases_to_last_value() {
        let december = Utc.with_ymd_and_hms(2024, 12, 31, 23, 55, 0).unwrap();
        let january = Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap();
        let mut data = dataset(december);

        let mut baselines = YearStartBaselines::new();
        baselines.observe(&data, december);

        data.emea[3].value = 18_250.0;
        assert_eq!(baselines.observe(&data, january), catalog().len());
        assert_eq!(baselines.get(Region::Emea, "DAX"), Some(18_250.0));
    }

    #[test]
    fn test_degenerate_ytd_uses_fallback() {
        let now = Utc::now();
        let mut data = MarketData::empty(now, DataSource::Cached);
        let mut item = dataset(now).americas[0].clone();
        item.value = 200.0;
        item.ytd = -100.0;
        data.americas.push(item);

        let mut baselines = YearStartBaselines::new();
        baselines.observe(&data, now);
        assert_eq!(baselines.get(Region::Americas, "DOW JONES"), Some(180.0));
    }
}
