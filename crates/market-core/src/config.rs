//! 설정 관리.
//!
//! 설정은 다음 순서로 적용됩니다 (뒤쪽이 우선):
//! 1. 구조체 기본값
//! 2. 설정 파일 (`config/default.toml`, 없으면 건너뜀)
//! 3. `MARKET__SECTION__KEY` 형식의 환경 변수
//! 4. 잘 알려진 환경 변수 (`REDIS_URL`, `ALPHA_VANTAGE_API_KEY`, `ALLOWED_ORIGINS` 등)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// Redis 설정
    pub redis: RedisConfig,
    /// 업스트림 시세 제공자 설정
    pub provider: ProviderConfig,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 시장 데이터(시뮬레이션/캐시) 설정
    pub market: MarketConfig,
    /// Rate limit 설정
    pub rate_limit: RateLimitConfig,
    /// AI 분석 엔드포인트 설정
    pub ai: AiConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 연결 URL. 없으면 캐시 없이 동작
    pub url: Option<String>,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
    /// 명령 타임아웃 (밀리초)
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            connection_timeout_secs: 5,
            command_timeout_ms: 2_000,
        }
    }
}

impl RedisConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// 업스트림 시세 제공자(Alpha Vantage) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API 기본 URL
    pub base_url: String,
    /// API 키. 없으면 모든 지수를 합성 데이터로 채움
    pub api_key: Option<String>,
    /// 갱신 1회당 호출 예산
    pub call_budget: u32,
    /// 지수 사이 지연 (밀리초)
    pub request_delay_ms: u64,
    /// HTTP 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".to_string(),
            api_key: None,
            call_budget: 5,
            request_delay_ms: 250,
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 스케줄러 활성화 여부
    pub enabled: bool,
    /// 틱 주기 (초)
    pub tick_secs: u64,
    /// 전체 갱신 주기 (초)
    pub refresh_interval_secs: u64,
    /// 이보다 최신인 데이터셋은 갱신을 건너뜀 (초)
    pub min_refresh_age_secs: u64,
    /// 갱신 결과가 이보다 적은 지수를 담으면 실패로 처리
    pub min_instruments: usize,
    /// 실행 이력 보관 개수
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 60,
            refresh_interval_secs: 24 * 60 * 60,
            min_refresh_age_secs: 23 * 60 * 60,
            min_instruments: 5,
            history_capacity: 50,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// 시장 데이터 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// 시뮬레이션 틱 결과 TTL (초)
    pub tick_ttl_secs: u64,
    /// 전체 갱신 결과 TTL (초)
    pub refresh_ttl_secs: u64,
    /// 추세 시퀀스 갱신 간격 (초)
    pub trend_interval_secs: u64,
    /// 거래량이 평이한 구간의 시작 시각 (UTC, 포함)
    pub calm_start_hour: u32,
    /// 거래량이 평이한 구간의 끝 시각 (UTC, 포함)
    pub calm_end_hour: u32,
    /// 평이한 구간 밖에서의 avat 변화 배수
    pub busy_volume_multiplier: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            tick_ttl_secs: 60 * 60,
            refresh_ttl_secs: 48 * 60 * 60,
            trend_interval_secs: 5 * 60,
            calm_start_hour: 10,
            calm_end_hour: 15,
            busy_volume_multiplier: 1.5,
        }
    }
}

/// 저장소 장애 시 rate limiter 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// 요청 허용
    #[default]
    Open,
    /// 요청 거부 (429)
    Closed,
}

impl std::str::FromStr for FailMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(CoreError::Config(format!("unknown fail mode: {}", other))),
        }
    }
}

/// Rate limit 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 윈도우당 최대 요청 수
    pub max_requests: u32,
    /// 윈도우 길이 (초)
    pub window_secs: u64,
    /// 저장소 장애 시 동작
    pub fail_mode: FailMode,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
            fail_mode: FailMode::Open,
        }
    }
}

/// AI 분석 엔드포인트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// 허용된 Origin 목록. 비어 있으면 모든 Origin 허용 (개발 모드)
    pub allowed_origins: Vec<String>,
    /// 완성 API 키
    pub api_key: Option<String>,
    /// OpenAI 호환 API 기본 URL
    pub base_url: String,
    /// 모델 이름
    pub model: String,
    /// 최대 응답 토큰 수
    pub max_tokens: u32,
    /// 샘플링 온도
    pub temperature: f32,
    /// HTTP 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("MARKET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        app.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(app)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// 잘 알려진 환경 변수를 적용합니다.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("REDIS_URL").or_else(|| get("UPSTASH_REDIS_URL")) {
            self.redis.url = Some(url);
        }
        if let Some(key) = get("ALPHA_VANTAGE_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            self.ai.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.ai.model = model;
        }
        if let Some(host) = get("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("API_PORT") {
            self.server.port = parse_var("API_PORT", &port)?;
        }
        if let Some(max) = get("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_var("RATE_LIMIT_MAX_REQUESTS", &max)?;
        }
        if let Some(window) = get("RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", &window)?;
        }
        if let Some(mode) = get("RATE_LIMIT_FAIL_MODE") {
            self.rate_limit.fail_mode = mode.parse()?;
        }

        self.validate()
    }

    /// 설정 값의 범위를 검증합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.rate_limit.window_secs == 0 {
            return Err(CoreError::Config(
                "rate_limit.window_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(CoreError::Config(
                "scheduler.tick_secs must be positive".to_string(),
            ));
        }
        if self.market.calm_start_hour > 23 || self.market.calm_end_hour > 23 {
            return Err(CoreError::Config(
                "market calm hours must be within 0..=23".to_string(),
            ));
        }
        Ok(())
    }

    /// AI 엔드포인트가 Origin 제한 없이 동작하는지 여부.
    pub fn is_development(&self) -> bool {
        self.ai.allowed_origins.is_empty()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> CoreResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("invalid value for {}: {}", key, value)))
}
