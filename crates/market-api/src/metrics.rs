//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 시장 데이터 파이프라인 메트릭을 수집하고 `/metrics`
//! 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 패닉
///
/// 레코더가 이미 설치되어 있으면 패닉합니다.
pub fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("히스토그램 버킷 설정 실패")
        .install_recorder()
        .expect("Prometheus 레코더 설치 실패")
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 시장 데이터 메트릭
// ============================================================================

/// Rate limit 판정 (`allowed` | `limited` | `store_error`).
pub fn record_rate_limit(scope: &str, outcome: &'static str) {
    counter!(
        "rate_limit_requests_total",
        "scope" => scope.to_string(),
        "status" => outcome
    )
    .increment(1);
}

/// 읽기 경로 결과 (`cache_hit` | `fallback`).
pub fn record_market_read(outcome: &'static str) {
    counter!("market_data_reads_total", "outcome" => outcome).increment(1);
}

/// 시뮬레이션 틱 결과.
pub fn record_tick(persisted: bool, trends_updated: bool) {
    counter!(
        "market_data_ticks_total",
        "persisted" => persisted.to_string(),
        "trends_updated" => trends_updated.to_string()
    )
    .increment(1);
}

/// 전체 갱신 결과 (`success` | `skipped` | `failed`).
pub fn record_refresh(outcome: &'static str, live_instruments: usize) {
    counter!("market_data_refresh_total", "outcome" => outcome).increment(1);
    gauge!("market_data_live_instruments").set(live_instruments as f64);
}

/// 스케줄 작업 실행 결과.
pub fn record_task_run(task_id: &str, success: bool, duration_secs: f64) {
    counter!(
        "scheduler_task_runs_total",
        "task" => task_id.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
    histogram!("scheduler_task_duration_seconds", "task" => task_id.to_string())
        .record(duration_secs);
}
