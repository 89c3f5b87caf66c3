//! Bounded job execution.
//!
//! Each submitted job runs in its own task. A semaphore caps how many jobs are
//! RUNNING at once and every dispatch is raced against the configured timeout.

use protflow_common::error::{ProtflowError, Result};
use protflow_common::outcome::ToolOutcome;
use protflow_config::{DependencyPolicy, ExecutorConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::dependency::chain_parameters;
use crate::dispatcher::Dispatcher;
use crate::job::{Job, JobStatus};
use crate::registry::JobRegistry;

#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    dispatcher: Arc<Dispatcher>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    job_timeout: Duration,
    policy: DependencyPolicy,
}

impl JobExecutor {
    pub fn new(registry: Arc<JobRegistry>, dispatcher: Arc<Dispatcher>, config: &ExecutorConfig) -> Self {
        Self {
            registry,
            dispatcher,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            job_timeout: config.job_timeout(),
            policy: config.dependency_policy,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Queue a PENDING job and start it in the background.
    ///
    /// Fails with `NotFound` for an unknown id and `Validation` when the job is
    /// not PENDING or was already submitted.
    pub async fn submit(&self, job_id: &str) -> Result<JoinHandle<()>> {
        let job = self
            .registry
            .get_job(job_id)
            .await
            .ok_or_else(|| ProtflowError::NotFound(format!("Job {job_id}")))?;
        if job.status != JobStatus::Pending {
            return Err(ProtflowError::Validation(format!(
                "Job {job_id} is {}; only pending jobs can be submitted",
                job.status
            )));
        }
        if !self.in_flight.lock().await.insert(job_id.to_string()) {
            return Err(ProtflowError::Validation(format!("Job {job_id} is already submitted")));
        }

        self.registry.queue_job(job_id).await;
        debug!(job_id = %job_id, "Job submitted");

        let this = self.clone();
        let id = job_id.to_string();
        Ok(tokio::spawn(async move {
            this.run(&id).await;
            this.in_flight.lock().await.remove(&id);
        }))
    }

    /// Submit and wait for the job to finish. Returns the terminal job.
    pub async fn run_to_completion(&self, job_id: &str) -> Result<Job> {
        let handle = self.submit(job_id).await?;
        if let Err(e) = handle.await {
            error!(job_id = %job_id, error = %e, "Executor task aborted");
        }
        self.registry
            .get_job(job_id)
            .await
            .ok_or_else(|| ProtflowError::NotFound(format!("Job {job_id}")))
    }

    #[instrument(skip(self))]
    async fn run(&self, job_id: &str) {
        let Some(job) = self.registry.get_job(job_id).await else {
            warn!("Job vanished before execution");
            return;
        };

        if let Some(dep_id) = job.depends_on.as_deref() {
            let predecessor = match self.policy {
                DependencyPolicy::Strict => self.registry.wait_for_terminal(dep_id).await,
                DependencyPolicy::BestEffort => self.registry.get_job(dep_id).await,
            };
            match predecessor {
                Some(dep) if dep.status == JobStatus::Completed => {
                    if let Some(result) = dep.result.as_ref() {
                        let chained = chain_parameters(dep.function_name, result, &job.parameters);
                        self.registry.set_parameters(job_id, chained).await;
                    }
                }
                Some(dep) if dep.status == JobStatus::Failed && self.policy == DependencyPolicy::Strict => {
                    let reason = dep.error.as_deref().unwrap_or("unknown error");
                    self.finish_failed(job_id, format!("Dependency {dep_id} failed: {reason}")).await;
                    return;
                }
                Some(dep) => {
                    debug!(depends_on = %dep_id, status = %dep.status, "Predecessor has no result; using own parameters");
                }
                None => {
                    warn!(depends_on = %dep_id, "Predecessor not found; using own parameters");
                }
            }
        }

        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish_failed(job_id, "Executor is shutting down".to_string()).await;
                return;
            }
        };

        if let Err(e) = self.registry.update_job_status(job_id, JobStatus::Running, None, None).await {
            warn!(error = %e, "Could not start job");
            return;
        }
        let Some(job) = self.registry.get_job(job_id).await else {
            return;
        };
        info!(op = %job.function_name, "Job running");

        let dispatcher = Arc::clone(&self.dispatcher);
        let mut task = tokio::spawn(async move { dispatcher.execute_job(&job).await });
        let raced = tokio::time::timeout(self.job_timeout, &mut task).await;
        let outcome = match raced {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Dispatch task panicked");
                ToolOutcome::failure(format!("Job execution aborted: {e}"))
            }
            Err(_) => {
                task.abort();
                warn!(timeout_secs = self.job_timeout.as_secs(), "Job timed out");
                ToolOutcome::failure(ProtflowError::Timeout(self.job_timeout).to_string())
            }
        };

        let recorded = match outcome {
            ToolOutcome::Failure(msg) => {
                self.registry
                    .update_job_status(job_id, JobStatus::Failed, None, Some(msg))
                    .await
            }
            success => {
                self.registry
                    .update_job_status(job_id, JobStatus::Completed, Some(success.to_value()), None)
                    .await
            }
        };
        if let Err(e) = recorded {
            error!(error = %e, "Failed to record job outcome");
        }
    }

    /// Fail a job that never reached dispatch. It passes through RUNNING first.
    async fn finish_failed(&self, job_id: &str, message: String) {
        warn!(job_id = %job_id, reason = %message, "Job failed before dispatch");
        let started = self
            .registry
            .update_job_status(job_id, JobStatus::Running, None, None)
            .await;
        let failed = match started {
            Ok(_) => {
                self.registry
                    .update_job_status(job_id, JobStatus::Failed, None, Some(message))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = failed {
            error!(job_id = %job_id, error = %e, "Failed to record job failure");
        }
    }
}
