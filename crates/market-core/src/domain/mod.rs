//! 시장 데이터 도메인 모델.

mod instrument;
mod market_data;
mod region;

pub use instrument::*;
pub use market_data::*;
pub use region::*;
