//! 지역 구분.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 지수가 속한 지리적 지역.
///
/// 세 지역으로 고정되며 직렬화 이름은 `americas`, `emea`, `asiaPacific`입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    /// 미주
    Americas,
    /// 유럽/중동/아프리카
    Emea,
    /// 아시아/태평양
    AsiaPacific,
}

impl Region {
    /// 고정 순서의 전체 지역 목록.
    pub const ALL: [Region; 3] = [Region::Americas, Region::Emea, Region::AsiaPacific];

    /// 표시 순위 접두 숫자.
    pub fn code(self) -> u8 {
        match self {
            Region::Americas => 1,
            Region::Emea => 2,
            Region::AsiaPacific => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Americas => "americas",
            Region::Emea => "emea",
            Region::AsiaPacific => "asiaPacific",
        }
    }

    /// 지역 내 위치(0부터)로 표시 순위 문자열을 만듭니다. 예: `"23)"`.
    pub fn rank(self, position: usize) -> String {
        format!("{}{})", self.code(), position + 1)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "americas" => Ok(Region::Americas),
            "emea" => Ok(Region::Emea),
            "asiaPacific" | "asia_pacific" | "apac" => Ok(Region::AsiaPacific),
            other => Err(CoreError::UnknownRegion(other.to_string())),
        }
    }
}
