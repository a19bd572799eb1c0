//! 추세 시퀀스 갱신.

use market_core::TREND_LENGTH;
use rand::Rng;

use crate::fallback::random_trend;

/// 새 샘플에 더하는 노이즈의 최대 크기.
pub const TREND_NOISE: f64 = 0.1;

/// 길이가 맞지 않거나 범위를 벗어난 시퀀스면 무작위 시퀀스로 대체합니다.
pub fn sanitize<R: Rng + ?Sized>(trend: &[f64], rng: &mut R) -> Vec<f64> {
    let valid = trend.len() == TREND_LENGTH
        && trend.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v));
    if valid {
        trend.to_vec()
    } else {
        random_trend(rng)
    }
}

/// 링 버퍼 시프트: 가장 오래된 샘플을 버리고, 마지막 샘플에 노이즈를 더한
/// 값을 [0, 1]로 잘라 추가합니다.
pub fn shift(trend: &[f64], noise: f64) -> Vec<f64> {
    let last = trend.last().copied().unwrap_or(0.5);
    let next = (last + noise).clamp(0.0, 1.0);

    let mut shifted: Vec<f64> = trend.iter().skip(1).copied().collect();
    shifted.push(next);
    shifted
}
