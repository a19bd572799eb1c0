//! Alpha Vantage 시세 클라이언트.
//!
//! 두 가지 엔드포인트를 사용합니다:
//! - `GLOBAL_QUOTE`: 현재가, 변화량, 등락률
//! - `TIME_SERIES_INTRADAY` (60분봉): 최근 16개 종가로 추세 시퀀스 생성
//!
//! 응답 본문의 `Note`/`Information` 필드는 업스트림 호출 제한 신호이며
//! [`ProviderError::Throttled`]로 보고됩니다.

use async_trait::async_trait;
use market_core::{IntradayPoint, ProviderConfig, TREND_LENGTH};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::error::{DataError, Result};

/// 장중 시리즈에서 사용하는 포인트 개수 (약 2 거래일).
pub const INTRADAY_POINTS: usize = TREND_LENGTH * 2;

/// 업스트림 단일 호출 실패.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status} for {symbol}")]
    Http { symbol: String, status: u16 },

    #[error("Upstream throttled: {0}")]
    Throttled(String),

    #[error("Malformed payload for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// 현재 시세.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    /// 등락률 (%)
    pub change_percent: f64,
}

/// 최근 장중 종가 시리즈.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradaySeries {
    /// 시간순 원본 포인트
    pub points: Vec<IntradayPoint>,
    /// [0, 1]로 min-max 정규화된 종가
    pub normalized: Vec<f64>,
}

impl IntradaySeries {
    /// 원본 포인트로부터 정규화된 시리즈를 만듭니다.
    pub fn from_points(points: Vec<IntradayPoint>) -> Self {
        let min = points.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);
        let max = points.iter().map(|p| p.close).fold(f64::NEG_INFINITY, f64::max);
        let range = if max - min > 0.0 { max - min } else { 1.0 };

        let normalized = points.iter().map(|p| (p.close - min) / range).collect();
        Self { points, normalized }
    }

    /// 추세 시퀀스 두 개를 채울 만큼 포인트가 있는지 여부.
    pub fn covers_trend(&self) -> bool {
        self.normalized.len() >= TREND_LENGTH
    }

    /// 앞쪽 절반 추세 시퀀스.
    pub fn first_trend(&self) -> Vec<f64> {
        self.normalized.iter().take(TREND_LENGTH).copied().collect()
    }

    /// 뒤쪽 절반 추세 시퀀스.
    pub fn last_trend(&self) -> Vec<f64> {
        let skip = self.normalized.len().saturating_sub(TREND_LENGTH);
        self.normalized.iter().skip(skip).copied().collect()
    }
}

/// 시세 제공자 추상화.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// 제공자 이름.
    fn name(&self) -> &str;

    /// 현재 시세를 조회합니다.
    async fn global_quote(&self, symbol: &str) -> std::result::Result<Quote, ProviderError>;

    /// 최근 장중 시리즈를 조회합니다.
    async fn intraday(&self, symbol: &str) -> std::result::Result<IntradaySeries, ProviderError>;
}

/// Alpha Vantage REST 클라이언트.
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    /// 새로운 클라이언트 생성.
    pub fn new(api_key: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// 설정에 API 키가 있으면 클라이언트를 생성합니다.
    pub fn from_config(config: &ProviderConfig) -> Result<Option<Self>> {
        match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Self::new(key, config).map(Some),
            None => Ok(None),
        }
    }

    async fn request(
        &self,
        symbol: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<Value, ProviderError> {
        debug!(symbol = symbol, function = params[0].1, "Alpha Vantage 요청");

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Http {
                symbol: symbol.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| ProviderError::Malformed {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(note) = throttle_note(&body) {
            return Err(ProviderError::Throttled(note));
        }

        Ok(body)
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    fn name(&self) -> &str {
        "alpha-vantage"
    }

    async fn global_quote(&self, symbol: &str) -> std::result::Result<Quote, ProviderError> {
        let body = self.request(symbol, &[("function", "GLOBAL_QUOTE")]).await?;
        parse_global_quote(symbol, &body)
    }

    async fn intraday(&self, symbol: &str) -> std::result::Result<IntradaySeries, ProviderError> {
        let body = self
            .request(
                symbol,
                &[
                    ("function", "TIME_SERIES_INTRADAY"),
                    ("interval", "60min"),
                    ("outputsize", "compact"),
                ],
            )
            .await?;
        parse_intraday(symbol, &body)
    }
}

fn throttle_note(body: &Value) -> Option<String> {
    ["Note", "Information"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    Decimal::from_str(cleaned).ok().and_then(|d| d.to_f64())
}

fn malformed(symbol: &str, reason: impl Into<String>) -> ProviderError {
    ProviderError::Malformed {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

fn parse_global_quote(symbol: &str, body: &Value) -> std::result::Result<Quote, ProviderError> {
    let quote = body
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| malformed(symbol, "missing Global Quote"))?;

    let field = |name: &str| {
        quote
            .get(name)
            .and_then(Value::as_str)
            .and_then(parse_number)
            .ok_or_else(|| malformed(symbol, format!("invalid field '{}'", name)))
    };

    let price = field("05. price")?;
    if price < 0.0 {
        return Err(malformed(symbol, "negative price"));
    }

    Ok(Quote {
        price,
        change: field("09. change")?,
        change_percent: field("10. change percent")?,
    })
}

fn parse_intraday(symbol: &str, body: &Value) -> std::result::Result<IntradaySeries, ProviderError> {
    let series = body
        .get("Time Series (60min)")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(symbol, "missing Time Series (60min)"))?;

    // 타임스탬프 문자열 ("YYYY-MM-DD HH:MM:SS")은 사전순 정렬이 곧 시간순
    let mut timestamps: Vec<&String> = series.keys().collect();
    timestamps.sort();
    let skip = timestamps.len().saturating_sub(INTRADAY_POINTS);

    let points = timestamps
        .into_iter()
        .skip(skip)
        .map(|ts| {
            series[ts.as_str()]
                .get("4. close")
                .and_then(Value::as_str)
                .and_then(parse_number)
                .map(|close| IntradayPoint {
                    timestamp: ts.clone(),
                    close,
                })
                .ok_or_else(|| malformed(symbol, format!("invalid close at {}", ts)))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if points.is_empty() {
        return Err(malformed(symbol, "empty time series"));
    }

    Ok(IntradaySeries::from_points(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> AlphaVantageClient {
        let config = ProviderConfig {
            base_url: server.url(),
            ..Default::default()
        };
        AlphaVantageClient::new("test-key", &config).unwrap()
    }

    fn intraday_body(closes: &[f64]) -> Value {
        let series: serde_json::Map<String, Value> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                (
                    format!("2024-03-01 {:02}:00:00", i),
                    json!({ "4. close": format!("{:.4}", c) }),
                )
            })
            .collect();
        json!({ "Meta Data": {}, "Time Series (60min)": series })
    }

    #[tokio::test]
    async fn test_global_quote_parses_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()),
                mockito::Matcher::UrlEncoded("symbol".into(), "^GSPC".into()),
                mockito::Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            ]))
            .with_body(
                json!({
                    "Global Quote": {
                        "01. symbol": "^GSPC",
                        "05. price": "5123.4500",
                        "09. change": "-12.3000",
                        "10. change percent": "-0.2395%"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let quote = client_for(&server).global_quote("^GSPC").await.unwrap();
        assert!((quote.price - 5123.45).abs() < 1e-9);
        assert!((quote.change + 12.3).abs() < 1e-9);
        assert!((quote.change_percent + 0.2395).abs() < 1e-9);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_note_field_is_throttling() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_body(json!({ "Note": "Thank you for using Alpha Vantage!" }).to_string())
            .create_async()
            .await;

        let err = client_for(&server).global_quote("^DJI").await.unwrap_err();
        assert!(matches!(err, ProviderError::Throttled(_)));
    }

    #[tokio::test]
    async fn test_http_error_and_empty_quote() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("symbol".into(), "^FAIL".into()))
            .with_status(503)
            .create_async()
            .await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("symbol".into(), "^EMPTY".into()))
            .with_body(json!({ "Global Quote": {} }).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.global_quote("^FAIL").await.unwrap_err(),
            ProviderError::Http { status: 503, .. }
        ));
        assert!(matches!(
            client.global_quote("^EMPTY").await.unwrap_err(),
            ProviderError::Malformed { .. }
        ));
    }

    #[tokio::test]
    async fn test_intraday_keeps_most_recent_points() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded(
                "function".into(),
                "TIME_SERIES_INTRADAY".into(),
            ))
            .with_body(intraday_body(&closes).to_string())
            .create_async()
            .await;

        let series = client_for(&server).intraday("^N225").await.unwrap();
        assert_eq!(series.points.len(), INTRADAY_POINTS);
        assert_eq!(series.points[0].close, 104.0);
        assert_eq!(series.normalized[0], 0.0);
        assert_eq!(*series.normalized.last().unwrap(), 1.0);
        assert_eq!(series.first_trend().len(), TREND_LENGTH);
        assert_eq!(series.last_trend()[TREND_LENGTH - 1], 1.0);
    }

    #[test]
    fn test_flat_series_normalizes_to_zero() {
        let points = (0..4)
            .map(|i| IntradayPoint {
                timestamp: format!("t{}", i),
                close: 42.0,
            })
            .collect();
        let series = IntradaySeries::from_points(points);
        assert!(series.normalized.iter().all(|v| *v == 0.0));
        assert!(!series.covers_trend());
    }

    #[test]
    fn test_parse_number() {
        assert!((parse_number(" 1.25% ").unwrap() - 1.25).abs() < 1e-12);
        assert_eq!(parse_number("abc"), None);
    }
}
