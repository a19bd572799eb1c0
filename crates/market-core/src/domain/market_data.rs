//! 지수 항목과 데이터셋.
//!
//! 내부 계산과 캐시 저장은 전체 정밀도로 유지하고, 외부로 내보낼 때만
//! [`MarketData::rounded`]로 소수점 2자리 반올림을 적용합니다.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::Region;
use crate::error::{CoreError, CoreResult};

/// 추세 시퀀스 길이.
pub const TREND_LENGTH: usize = 8;

/// 데이터셋 출처 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// 업스트림 제공자에서 직접 받은 데이터
    Authoritative,
    /// 캐시 저장소에서 읽은 데이터
    #[default]
    Cached,
    /// 로컬에서 생성한 데이터
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataSource::Authoritative => "authoritative",
            DataSource::Cached => "cached",
            DataSource::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

/// 장중 종가 포인트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayPoint {
    pub timestamp: String,
    pub close: f64,
}

/// 단일 지수 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketItem {
    /// 지수 식별자
    pub id: String,
    /// 표시 순위 (예: `"11)"`)
    pub num: String,
    pub value: f64,
    /// 전일 종가 대비 누적 변화량
    pub change: f64,
    pub pct_change: f64,
    /// 거래량 변화 지표
    pub avat: f64,
    /// 표시 시각 (HH:MM, 24시간제)
    pub time: String,
    pub ytd: f64,
    /// 통화 조정 YTD
    pub ytd_cur: f64,
    /// 첫 번째 추세 시퀀스 ([0, 1])
    #[serde(rename = "sparkline1", default)]
    pub trend1: Vec<f64>,
    /// 두 번째 추세 시퀀스 ([0, 1])
    #[serde(rename = "sparkline2", default)]
    pub trend2: Vec<f64>,
    /// 추세 시퀀스 갱신 시각
    #[serde(rename = "sparklineUpdated", default, skip_serializing_if = "Option::is_none")]
    pub trend_updated: Option<DateTime<Utc>>,
    /// 값 갱신 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// 업스트림 장중 데이터 원본
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_day_data: Option<Vec<IntradayPoint>>,
}

impl MarketItem {
    /// `change`와 `value`에서 유도되는 등락률.
    ///
    /// 전일 종가(`value - change`)가 0이면 `None`.
    pub fn implied_pct_change(&self) -> Option<f64> {
        let previous_close = self.value - self.change;
        if previous_close == 0.0 || !previous_close.is_finite() {
            return None;
        }
        Some(self.change / previous_close * 100.0)
    }

    /// 모든 수치 필드를 소수점 2자리로 반올림한 사본.
    pub fn rounded(&self) -> Self {
        Self {
            value: round2(self.value),
            change: round2(self.change),
            pct_change: round2(self.pct_change),
            avat: round2(self.avat),
            ytd: round2(self.ytd),
            ytd_cur: round2(self.ytd_cur),
            trend1: self.trend1.iter().copied().map(round2).collect(),
            trend2: self.trend2.iter().copied().map(round2).collect(),
            ..self.clone()
        }
    }
}

/// 세 지역의 지수 묶음과 메타데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub americas: Vec<MarketItem>,
    pub emea: Vec<MarketItem>,
    pub asia_pacific: Vec<MarketItem>,
    pub last_updated: DateTime<Utc>,
    /// 마지막 업스트림 전체 갱신 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_refresh: Option<DateTime<Utc>>,
    /// 마지막 추세 시퀀스 갱신 시각
    #[serde(rename = "lastSparklineUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_trend_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: DataSource,
}

impl MarketData {
    /// 빈 데이터셋을 생성합니다.
    pub fn empty(now: DateTime<Utc>, source: DataSource) -> Self {
        Self {
            americas: Vec::new(),
            emea: Vec::new(),
            asia_pacific: Vec::new(),
            last_updated: now,
            last_full_refresh: None,
            last_trend_update: None,
            source,
        }
    }

    pub fn region(&self, region: Region) -> &[MarketItem] {
        match region {
            Region::Americas => &self.americas,
            Region::Emea => &self.emea,
            Region::AsiaPacific => &self.asia_pacific,
        }
    }

    pub fn region_mut(&mut self, region: Region) -> &mut Vec<MarketItem> {
        match region {
            Region::Americas => &mut self.americas,
            Region::Emea => &mut self.emea,
            Region::AsiaPacific => &mut self.asia_pacific,
        }
    }

    /// 지역 순서대로 모든 항목을 순회합니다.
    pub fn items(&self) -> impl Iterator<Item = (Region, &MarketItem)> {
        Region::ALL
            .into_iter()
            .flat_map(move |region| self.region(region).iter().map(move |item| (region, item)))
    }

    pub fn instrument_count(&self) -> usize {
        self.americas.len() + self.emea.len() + self.asia_pacific.len()
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    /// 지역 내 식별자 유일성을 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        for region in Region::ALL {
            let mut seen = HashSet::new();
            for item in self.region(region) {
                if !seen.insert(item.id.as_str()) {
                    return Err(CoreError::InvalidDataset(format!(
                        "duplicate instrument '{}' in {}",
                        item.id, region
                    )));
                }
            }
        }
        Ok(())
    }

    /// 출력용으로 반올림된 사본.
    pub fn rounded(&self) -> Self {
        Self {
            americas: self.americas.iter().map(MarketItem::rounded).collect(),
            emea: self.emea.iter().map(MarketItem::rounded).collect(),
            asia_pacific: self.asia_pacific.iter().map(MarketItem::rounded).collect(),
            ..self.clone()
        }
    }
}

/// 표시 시각 문자열 (HH:MM).
pub fn display_time(now: DateTime<Utc>) -> String {
    now.format("%H:%M").to_string()
}

/// 소수점 2자리 반올림. 유한하지 않은 값은 그대로 반환합니다.
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}
