//! 프로세스 내 주기 작업 스케줄러.
//!
//! 짧은 주기의 틱마다 등록된 작업을 순서대로 확인하고, 간격이 지난 작업을
//! 실행합니다. 실행 전에 `last_run`을 먼저 기록하므로 느린 작업이 다음
//! 틱에서 다시 시작되지 않습니다. 작업 실패(패닉 포함)는 이력에 남고
//! 스케줄러 루프와 다른 작업에 영향을 주지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::record_task_run;

/// 작업 결과. 성공 시 요약 메시지.
pub type JobResult = Result<String, Box<dyn std::error::Error + Send + Sync>>;

/// 인자 없이 반복 실행 가능한 작업.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    async fn run(&self) -> JobResult;
}

/// 스케줄러 오류.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task with id {0} not found")]
    TaskNotFound(String),

    #[error("Task {0} is already running")]
    AlreadyRunning(String),

    #[error("Task with id {0} is already registered")]
    DuplicateTask(String),
}

/// 실행 계기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Schedule,
    Manual,
}

/// 작업 실행 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    Succeeded { message: String },
    Failed { error: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

/// 실행 이력 항목.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub task_id: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: TaskOutcome,
}

/// 등록된 작업 정보.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: String,
    pub name: String,
    pub interval_secs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub running: bool,
}

/// 스케줄러 상태.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub tick_secs: u64,
    pub tasks: Vec<TaskInfo>,
    /// 최신 실행이 앞에 옵니다
    pub history: Vec<TaskRun>,
}

struct TaskSlot {
    job: Arc<dyn ScheduledJob>,
    last_run: Option<DateTime<Utc>>,
    running: bool,
}

impl TaskSlot {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map_or(false, |elapsed| elapsed >= self.job.interval()),
        }
    }

    fn info(&self) -> TaskInfo {
        let interval = self.job.interval();
        TaskInfo {
            id: self.job.id().to_string(),
            name: self.job.name().to_string(),
            interval_secs: interval.as_secs(),
            last_run: self.last_run,
            next_run: self.last_run.and_then(|last| {
                chrono::Duration::from_std(interval).ok().map(|d| last + d)
            }),
            running: self.running,
        }
    }
}

/// 주기 작업 스케줄러.
pub struct Scheduler {
    tasks: RwLock<Vec<TaskSlot>>,
    history: RwLock<VecDeque<TaskRun>>,
    history_capacity: usize,
    tick: Duration,
    started: AtomicBool,
    /// 틱 루프 세대. 이전 루프가 새 루프의 상태를 지우지 않도록 구분
    generation: AtomicU64,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl Scheduler {
    pub fn new(tick: Duration, history_capacity: usize) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            tick,
            started: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            shutdown: Mutex::new(None),
        }
    }

    /// 작업을 등록합니다. 같은 id는 한 번만 등록할 수 있습니다.
    pub async fn register(&self, job: Arc<dyn ScheduledJob>) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|slot| slot.job.id() == job.id()) {
            return Err(SchedulerError::DuplicateTask(job.id().to_string()));
        }

        info!(
            task_id = job.id(),
            name = job.name(),
            interval_secs = job.interval().as_secs(),
            "Scheduled task registered"
        );
        tasks.push(TaskSlot {
            job,
            last_run: None,
            running: false,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// 백그라운드 틱 루프를 시작합니다. 이미 시작했으면 `false`를 반환합니다.
    ///
    /// `shutdown`이 취소되거나 [`Scheduler::stop`]이 호출되면 루프가 끝납니다.
    pub async fn start(self: &Arc<Self>, shutdown: &CancellationToken) -> bool {
        let mut slot = self.shutdown.lock().await;
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already started");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = shutdown.child_token();
        *slot = Some(token.clone());
        drop(slot);

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            info!(tick_secs = scheduler.tick.as_secs(), "Scheduler started");

            let mut ticker = interval(scheduler.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.run_due(Utc::now()).await;
                    }
                    _ = token.cancelled() => {
                        info!("Scheduler: 종료 시그널 수신");
                        break;
                    }
                }
            }

            let _slot = scheduler.shutdown.lock().await;
            if scheduler.generation.load(Ordering::SeqCst) == generation {
                scheduler.started.store(false, Ordering::SeqCst);
            }
            info!(generation, "Scheduler stopped");
        });

        true
    }

    /// 틱 루프를 중단합니다. 실행 중인 작업은 끝까지 실행됩니다.
    pub async fn stop(&self) {
        let mut slot = self.shutdown.lock().await;
        if let Some(token) = slot.take() {
            token.cancel();
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// `now` 기준으로 실행 시점이 된 작업을 순서대로 실행합니다.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Vec<TaskRun> {
        let ids: Vec<String> = self
            .tasks
            .read()
            .await
            .iter()
            .map(|slot| slot.job.id().to_string())
            .collect();

        let mut runs = Vec::new();
        for id in ids {
            let job = {
                let mut tasks = self.tasks.write().await;
                match tasks.iter_mut().find(|slot| slot.job.id() == id) {
                    Some(slot) if !slot.running && slot.is_due(now) => {
                        slot.last_run = Some(now);
                        slot.running = true;
                        Some(slot.job.clone())
                    }
                    _ => None,
                }
            };

            if let Some(job) = job {
                runs.push(self.execute(job, Trigger::Schedule, now).await);
            }
        }
        runs
    }

    /// 간격과 관계없이 즉시 실행합니다.
    pub async fn run_now(&self, id: &str) -> Result<TaskRun, SchedulerError> {
        let now = Utc::now();
        let job = {
            let mut tasks = self.tasks.write().await;
            let slot = tasks
                .iter_mut()
                .find(|slot| slot.job.id() == id)
                .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))?;
            if slot.running {
                return Err(SchedulerError::AlreadyRunning(id.to_string()));
            }
            slot.last_run = Some(now);
            slot.running = true;
            slot.job.clone()
        };

        info!(task_id = id, "Running task manually");
        Ok(self.execute(job, Trigger::Manual, now).await)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let tasks = self.tasks.read().await.iter().map(TaskSlot::info).collect();
        let history = self.history.read().await.iter().rev().cloned().collect();
        SchedulerStatus {
            running: self.is_running(),
            tick_secs: self.tick.as_secs(),
            tasks,
            history,
        }
    }

    async fn execute(&self, job: Arc<dyn ScheduledJob>, trigger: Trigger, started_at: DateTime<Utc>) -> TaskRun {
        let id = job.id().to_string();
        debug!(task_id = %id, ?trigger, "Running scheduled task");

        let started = Instant::now();
        let result = AssertUnwindSafe(job.run()).catch_unwind().await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(Ok(message)) => {
                info!(task_id = %id, duration_ms = elapsed.as_millis() as u64, %message, "Task completed");
                TaskOutcome::Succeeded { message }
            }
            Ok(Err(e)) => {
                error!(task_id = %id, error = %e, "Task failed");
                TaskOutcome::Failed { error: e.to_string() }
            }
            Err(_) => {
                error!(task_id = %id, "Task panicked");
                TaskOutcome::Failed {
                    error: "task panicked".to_string(),
                }
            }
        };
        record_task_run(&id, outcome.is_success(), elapsed.as_secs_f64());

        if let Some(slot) = self.tasks.write().await.iter_mut().find(|slot| slot.job.id() == id) {
            slot.running = false;
        } else {
            warn!(task_id = %id, "Task disappeared while running");
        }

        let run = TaskRun {
            task_id: id,
            trigger,
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            outcome,
        };

        let mut history = self.history.write().await;
        if self.history_capacity > 0 {
            while history.len() >= self.history_capacity {
                history.pop_front();
            }
            history.push_back(run.clone());
        }
        run
    }
}
