use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::JudgeConfig;
use crate::job::{Job, JobConfig, JobSnapshot, JobStatus, ResultPayload};
use crate::pipeline::{self, JudgeContext};

/// Owns the job table and the admission cap.
///
/// All scheduler state lives on this value, never in module globals, so
/// independent instances (one per test, say) cannot collide. The table
/// mutex covers insert, evict, and the admission scan; each job's
/// result is behind its own lock and is only read here for admission.
pub struct Scheduler {
    ctx: Arc<JudgeContext>,
    jobs: Mutex<HashMap<Uuid, Arc<Job>>>,
    max_running: usize,
    job_ttl: chrono::Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(ctx: Arc<JudgeContext>, config: &JudgeConfig) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            jobs: Mutex::new(HashMap::new()),
            max_running: config.max_running_jobs,
            job_ttl: chrono::Duration::seconds(config.job_ttl_seconds as i64),
            shutdown: CancellationToken::new(),
        })
    }

    /// Registers a new job in STARTING state and immediately runs an
    /// admission pass. Returns the job's polling token.
    pub fn submit(&self, config: JobConfig) -> Uuid {
        let job = Arc::new(Job::new(config));
        let id = job.id;
        let mut jobs = self.jobs.lock();
        jobs.insert(id, job);
        self.admit(&mut jobs);
        log::info!("job {id} registered ({} in table)", jobs.len());
        id
    }

    pub fn status(&self, id: Uuid) -> Option<JobSnapshot> {
        self.jobs.lock().get(&id).map(|job| job.snapshot())
    }

    pub fn running_jobs(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|job| job.status() == JobStatus::Running)
            .count()
    }

    /// One garbage-collection plus admission pass. Jobs past their TTL
    /// are evicted regardless of state; then STARTING jobs are promoted
    /// until the running count hits the cap. Scan order is the table's,
    /// which is not guaranteed stable.
    pub fn tick(&self) {
        let now = Utc::now();
        let mut jobs = self.jobs.lock();
        jobs.retain(|id, job| {
            let keep = !job.expired(now, self.job_ttl);
            if !keep {
                log::info!("evicting stale job {id}");
            }
            keep
        });
        self.admit(&mut jobs);
    }

    // The running count is derived by scanning rather than kept as a
    // counter, so a crashed worker cannot leave it drifted.
    fn admit(&self, jobs: &mut HashMap<Uuid, Arc<Job>>) {
        let mut running = jobs
            .values()
            .filter(|job| job.status() == JobStatus::Running)
            .count();
        for job in jobs.values() {
            if running >= self.max_running {
                break;
            }
            if job.status() == JobStatus::Starting {
                job.set_status(JobStatus::Running);
                running += 1;
                self.dispatch(job.clone());
            }
        }
    }

    // Fire-and-forget: the worker is not tracked further; the job's own
    // status transitions are the only observable signal of progress.
    fn dispatch(&self, job: Arc<Job>) {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            log::info!("job {} started", job.id);
            match pipeline::execute(&ctx, &job).await {
                Ok(()) => {
                    log::info!("job {} finished: {}", job.id, job.snapshot().status);
                }
                Err(e) => {
                    log::error!("job {} aborted: {e:#}", job.id);
                    job.set_result(
                        ResultPayload::Exception {
                            error: format!("{e:#}"),
                        },
                        Some(JobStatus::Exception),
                    );
                }
            }
        });
    }

    /// Spawns the background loop: a fixed 1-second cadence of
    /// `tick()`, independent of any job's progress.
    pub fn run(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = scheduler.shutdown.cancelled() => break,
                    _ = interval.tick() => scheduler.tick(),
                }
            }
            log::info!("scheduler loop stopped");
        })
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
