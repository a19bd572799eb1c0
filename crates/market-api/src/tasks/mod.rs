//! 백그라운드 태스크 모듈.
//!
//! - 스케줄러: 등록된 작업을 주기적으로 실행하고 실행 이력을 보관
//! - 시장 데이터 갱신: 업스트림에서 전체 데이터셋을 가져와 캐시에 저장

pub mod market_refresh;
pub mod scheduler;

pub use market_refresh::MarketRefreshJob;
pub use scheduler::{
    JobResult, ScheduledJob, Scheduler, SchedulerError, SchedulerStatus, TaskInfo, TaskOutcome,
    TaskRun, Trigger,
};
