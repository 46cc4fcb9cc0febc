//! Job poller
//!
//! Polls the database for pending deployment jobs and executes them.
//! Each job runs in its own task, gated by a semaphore. Delivery is
//! at-least-once: the deployer's conditional claim makes a job that is
//! picked up twice execute only once.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::deployer::Deployer;
use crate::repository;
use sqlx::PgPool;

/// Job poller that continuously polls for and executes pending jobs
pub struct JobPoller {
    pool: PgPool,
    deployer: Arc<Deployer>,
    poll_interval: Duration,
    semaphore: Arc<Semaphore>,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(
        pool: PgPool,
        deployer: Arc<Deployer>,
        poll_interval: Duration,
        max_parallel_jobs: usize,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(max_parallel_jobs));
        Self {
            pool,
            deployer,
            poll_interval,
            semaphore,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Starting job poller (interval: {:?})", self.poll_interval);

        let mut interval = time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            debug!("Polling for pending deployment jobs");

            match self.poll_once().await {
                Ok(spawned) => {
                    if spawned > 0 {
                        info!("Picked up {} job(s) this cycle", spawned);
                    }
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                }
            }
        }
    }

    /// Performs a single poll cycle
    async fn poll_once(&self) -> anyhow::Result<usize> {
        let job_ids = repository::pending_job_ids(&self.pool).await?;

        if job_ids.is_empty() {
            debug!("No pending jobs");
            return Ok(0);
        }

        let mut spawned = 0;

        for job_id in job_ids {
            // Skip when at max capacity; the job stays pending and is
            // picked up on a later cycle
            if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
                self.spawn_job_task(job_id, permit);
                spawned += 1;
            } else {
                debug!("Max parallel jobs reached, leaving job {} for now", job_id);
            }
        }

        Ok(spawned)
    }

    /// Spawns a task to execute a single job
    fn spawn_job_task(&self, job_id: Uuid, permit: tokio::sync::OwnedSemaphorePermit) {
        let deployer = Arc::clone(&self.deployer);

        tokio::spawn(async move {
            // Hold the permit for the lifetime of the run
            let _permit = permit;

            if let Err(e) = deployer.run(job_id).await {
                warn!("Job {} could not be executed: {:#}", job_id, e);
            }
        });
    }
}
