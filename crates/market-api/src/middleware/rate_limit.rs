//! Rate limiting middleware.
//!
//! 캐시 저장소 기반 고정 윈도우 카운터입니다. 카운터는 저장소에만 존재하므로
//! 여러 프로세스가 하나의 limiter를 공유합니다. 식별자별로 윈도우의 첫
//! 요청에서 키 TTL을 윈도우 길이로 설정합니다.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use market_core::{FailMode, RateLimitConfig};
use market_data::{keys, CacheStore, DataError};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::metrics::record_rate_limit;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// 식별 헤더가 없는 클라이언트가 공유하는 버킷.
pub const ANONYMOUS: &str = "anonymous";

/// Rate limit 판정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// 윈도우 리셋 시각 (epoch 초)
    pub reset: i64,
}

impl RateLimitDecision {
    /// `X-RateLimit-*` 헤더를 설정합니다.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let pairs = [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset.to_string()),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
    }

    /// 429 응답.
    pub fn rejection(&self) -> Response {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Rate limit exceeded. Please try again later.",
                "reset": self.reset,
            })),
        )
            .into_response();
        self.apply_headers(response.headers_mut());
        response
    }
}

/// 저장소 기반 rate limiter.
pub struct RateLimiter {
    store: Option<Arc<dyn CacheStore>>,
    scope: String,
    max_requests: u32,
    window_secs: u64,
    fail_mode: FailMode,
}

impl RateLimiter {
    /// 보호 대상 라우트(`scope`)별 limiter를 생성합니다.
    pub fn new(
        store: Option<Arc<dyn CacheStore>>,
        config: &RateLimitConfig,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scope: scope.into(),
            max_requests: config.max_requests,
            window_secs: config.window_secs,
            fail_mode: config.fail_mode,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 요청 하나를 계산하고 판정합니다.
    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        let now = chrono::Utc::now().timestamp();
        let Some(store) = self.store.as_ref() else {
            debug!(scope = %self.scope, "No cache store configured for rate limiting");
            return self.on_store_failure(now);
        };

        let key = keys::rate_limit(&format!("{}:{}", self.scope, identity));
        match self.count(store.as_ref(), &key, now).await {
            Ok(decision) => {
                record_rate_limit(&self.scope, if decision.allowed { "allowed" } else { "limited" });
                if !decision.allowed {
                    warn!(scope = %self.scope, identity, reset = decision.reset, "Rate limit exceeded");
                }
                decision
            }
            Err(e) => {
                warn!(
                    scope = %self.scope,
                    identity,
                    error = %e,
                    fail_mode = ?self.fail_mode,
                    "Rate limit store unavailable"
                );
                record_rate_limit(&self.scope, "store_error");
                self.on_store_failure(now)
            }
        }
    }

    async fn count(&self, store: &dyn CacheStore, key: &str, now: i64) -> Result<RateLimitDecision, DataError> {
        let count = store.incr(key).await?;
        if count == 1 {
            store.expire(key, self.window_secs).await?;
        }

        let mut ttl = store.ttl(key).await?;
        if ttl == -1 {
            // 이전 요청이 incr 후 expire 전에 끊긴 경우
            store.expire(key, self.window_secs).await?;
            ttl = self.window_secs as i64;
        }

        let reset = if ttl > 0 { now + ttl } else { now + self.window_secs as i64 };
        let limit = i64::from(self.max_requests);

        Ok(RateLimitDecision {
            allowed: count <= limit,
            limit: self.max_requests,
            remaining: (limit - count).max(0) as u32,
            reset,
        })
    }

    fn on_store_failure(&self, now: i64) -> RateLimitDecision {
        let reset = now + self.window_secs as i64;
        match self.fail_mode {
            FailMode::Open => RateLimitDecision {
                allowed: true,
                limit: self.max_requests,
                remaining: self.max_requests,
                reset,
            },
            FailMode::Closed => RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset,
            },
        }
    }
}

/// 요청 헤더에서 클라이언트 식별자를 추출합니다.
///
/// X-Forwarded-For의 첫 항목, X-Real-IP, 익명 버킷 순입니다.
pub fn client_identity(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    header("x-real-ip")
        .map(str::to_string)
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Rate limiting 미들웨어.
///
/// 허용된 요청의 응답에도 `X-RateLimit-*` 헤더를 붙입니다.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = client_identity(request.headers());
    let decision = limiter.check(&identity).await;

    if !decision.allowed {
        return decision.rejection();
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::MemoryCache;
    use std::time::Duration;

    fn limiter(store: Option<Arc<MemoryCache>>, max: u32, fail_mode: FailMode) -> RateLimiter {
        let config = RateLimitConfig {
            max_requests: max,
            window_secs: 60,
            fail_mode,
        };
        RateLimiter::new(store.map(|s| s as Arc<dyn CacheStore>), &config, "ai")
    }

    #[tokio::test(start_paused = true)]
    async fn test_n_plus_one_is_limited() {
        let limiter = limiter(Some(Arc::new(MemoryCache::new())), 3, FailMode::Open);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("1.2.3.4").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 3);
        }

        let fourth = limiter.check("1.2.3.4").await;
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_ttl() {
        let limiter = limiter(Some(Arc::new(MemoryCache::new())), 1, FailMode::Open);

        assert!(limiter.check("a").await.allowed);
        assert!(!limiter.check("a").await.allowed);

        tokio::time::advance(Duration::from_secs(61)).await;
        let decision = limiter.check("a").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_are_separate() {
        let limiter = limiter(Some(Arc::new(MemoryCache::new())), 1, FailMode::Open);

        assert!(limiter.check("a").await.allowed);
        assert!(!limiter.check("a").await.allowed);
        assert!(limiter.check("b").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_uses_remaining_ttl() {
        let store = Arc::new(MemoryCache::new());
        let limiter = limiter(Some(store.clone()), 5, FailMode::Open);

        limiter.check("a").await;
        assert_eq!(store.ttl("rate:ai:a").await.unwrap(), 60);

        tokio::time::advance(Duration::from_secs(20)).await;
        let before = chrono::Utc::now().timestamp();
        let decision = limiter.check("a").await;
        assert!(decision.reset >= before + 39 && decision.reset <= before + 41);
    }

    #[tokio::test]
    async fn test_missing_expiry_is_repaired() {
        let store = Arc::new(MemoryCache::new());
        store.set("rate:ai:a", "4").await.unwrap();
        let limiter = limiter(Some(store.clone()), 10, FailMode::Open);

        let decision = limiter.check("a").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 5);
        assert_eq!(store.ttl("rate:ai:a").await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_store_failure_follows_fail_mode() {
        let store = Arc::new(MemoryCache::new());
        store.set_offline(true);

        let open = limiter(Some(store.clone()), 2, FailMode::Open).check("a").await;
        assert!(open.allowed);
        assert_eq!(open.remaining, 2);

        let closed = limiter(Some(store), 2, FailMode::Closed).check("a").await;
        assert!(!closed.allowed);

        assert!(limiter(None, 2, FailMode::Open).check("a").await.allowed);
        assert!(!limiter(None, 2, FailMode::Closed).check("a").await.allowed);
    }

    #[test]
    fn test_client_identity_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), ANONYMOUS);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_identity(&headers), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers), "203.0.113.7");
    }

    #[tokio::test]
    async fn test_rejection_response() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 20,
            remaining: 0,
            reset: 1_700_000_000,
        };
        let response = decision.rejection();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[HEADER_LIMIT], "20");
        assert_eq!(response.headers()[HEADER_REMAINING], "0");
        assert_eq!(response.headers()[HEADER_RESET], "1700000000");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");
        assert_eq!(body["reset"], 1_700_000_000);
    }
}
