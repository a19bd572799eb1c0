//! 벤치마크 지수 카탈로그와 변동성 분류.

use super::Region;

/// 카탈로그에 등록된 벤치마크 지수.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instrument {
    /// 표시 식별자 (지역 내에서 유일)
    pub id: &'static str,
    /// 업스트림 심볼
    pub symbol: &'static str,
    /// 소속 지역
    pub region: Region,
    /// 합성 데이터 생성 시 사용하는 기준 지수 수준
    pub reference_level: f64,
}

impl Instrument {
    const fn new(id: &'static str, symbol: &'static str, region: Region, reference_level: f64) -> Self {
        Self {
            id,
            symbol,
            region,
            reference_level,
        }
    }
}

/// 지역 순서, 지역 내 표시 순서대로 정렬된 18개 지수.
pub const CATALOG: &[Instrument] = &[
    Instrument::new("DOW JONES", "^DJI", Region::Americas, 39_000.0),
    Instrument::new("S&P 500", "^GSPC", Region::Americas, 5_200.0),
    Instrument::new("NASDAQ", "^IXIC", Region::Americas, 16_300.0),
    Instrument::new("S&P/TSX Comp", "^GSPTSE", Region::Americas, 22_000.0),
    Instrument::new("S&P/BMV IPC", "^MXX", Region::Americas, 56_000.0),
    Instrument::new("IBOVESPA", "^BVSP", Region::Americas, 127_000.0),
    Instrument::new("Euro Stoxx 50", "^STOXX50E", Region::Emea, 5_000.0),
    Instrument::new("FTSE 100", "^FTSE", Region::Emea, 8_100.0),
    Instrument::new("CAC 40", "^FCHI", Region::Emea, 8_000.0),
    Instrument::new("DAX", "^GDAXI", Region::Emea, 18_000.0),
    Instrument::new("IBEX 35", "^IBEX", Region::Emea, 11_000.0),
    Instrument::new("FTSE MIB", "FTSEMIB.MI", Region::Emea, 34_000.0),
    Instrument::new("OMX STKH30", "^OMX", Region::Emea, 2_500.0),
    Instrument::new("SWISS MKT", "^SSMI", Region::Emea, 11_600.0),
    Instrument::new("NIKKEI", "^N225", Region::AsiaPacific, 39_500.0),
    Instrument::new("HANG SENG", "^HSI", Region::AsiaPacific, 17_000.0),
    Instrument::new("CSI 300", "000300.SS", Region::AsiaPacific, 3_600.0),
    Instrument::new("S&P/ASX 200", "^AXJO", Region::AsiaPacific, 7_800.0),
];

/// 전체 카탈로그.
pub fn catalog() -> &'static [Instrument] {
    CATALOG
}

/// 특정 지역의 지수를 표시 순서대로 반환합니다.
pub fn instruments_in(region: Region) -> impl Iterator<Item = &'static Instrument> {
    CATALOG.iter().filter(move |i| i.region == region)
}

/// 지수별 정적 변동성 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityClass {
    /// 변동성이 큰 신흥시장 벤치마크
    High,
    /// 대형주 벤치마크
    Low,
    Normal,
}

impl VolatilityClass {
    /// 틱당 가격 변화에 곱하는 배수.
    pub fn multiplier(self) -> f64 {
        match self {
            VolatilityClass::High => 1.5,
            VolatilityClass::Low => 0.8,
            VolatilityClass::Normal => 1.0,
        }
    }

    /// 식별자로 분류합니다. 카탈로그에 없는 지수도 이름으로 판별합니다.
    pub fn for_instrument(id: &str) -> Self {
        const HIGH: [&str; 3] = ["IBOVESPA", "HANG SENG", "CSI 300"];
        const LOW: [&str; 2] = ["S&P 500", "DOW JONES"];

        if HIGH.iter().any(|name| id.contains(name)) {
            VolatilityClass::High
        } else if LOW.iter().any(|name| id.contains(name)) {
            VolatilityClass::Low
        } else {
            VolatilityClass::Normal
        }
    }
}
