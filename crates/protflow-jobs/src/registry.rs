//! In-memory job registry and queue.
//!
//! The registry is the single source of truth for job state. Every accepted status
//! transition is broadcast as a [`JobEvent`] so the web layer and strict dependency
//! waits can follow progress without polling.

use chrono::Utc;
use protflow_common::error::{ProtflowError, Result};
use protflow_common::outcome::Parameters;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::job::{Job, JobEvent, JobStatus, JobView};
use crate::operation::Operation;

const EVENT_CAPACITY: usize = 256;

/// Builder for [`JobRegistry::create`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub function_name: Operation,
    pub parameters: Parameters,
    pub depends_on: Option<String>,
    pub block_id: Option<String>,
}

impl NewJob {
    pub fn new(function_name: Operation, parameters: Parameters) -> Self {
        Self {
            title: function_name.title().to_string(),
            description: String::new(),
            function_name,
            parameters,
            depends_on: None,
            block_id: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, job_id: impl Into<String>) -> Self {
        self.depends_on = Some(job_id.into());
        self
    }

    pub fn block_id(mut self, block_id: impl Into<String>) -> Self {
        self.block_id = Some(block_id.into());
        self
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    queue: Vec<String>,
}

pub struct JobRegistry {
    inner: RwLock<Inner>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { inner: RwLock::new(Inner::default()), events }
    }

    /// Create a PENDING job. Always succeeds.
    pub async fn create_job(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        function_name: Operation,
        parameters: Parameters,
    ) -> Job {
        self.create(
            NewJob::new(function_name, parameters)
                .title(title)
                .description(description),
        )
        .await
    }

    /// Create a PENDING job from a builder. An unknown `depends_on` is dropped.
    pub async fn create(&self, new: NewJob) -> Job {
        let mut job = Job::new(new.title, new.description, new.function_name, new.parameters);
        job.block_id = new.block_id;

        let mut inner = self.inner.write().await;
        if let Some(dep) = new.depends_on {
            if inner.jobs.contains_key(&dep) {
                job.depends_on = Some(dep);
            } else {
                warn!(job_id = %job.id, depends_on = %dep, "Ignoring dependency on unknown job");
            }
        }
        inner.jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, op = %job.function_name, "Job created");
        job
    }

    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.inner.read().await.jobs.get(id).cloned()
    }

    /// Idempotent; false for an unknown id.
    pub async fn queue_job(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(id) {
            return false;
        }
        if !inner.queue.iter().any(|q| q == id) {
            inner.queue.push(id.to_string());
        }
        true
    }

    /// Apply a lifecycle transition.
    ///
    /// `Ok(false)` for an unknown id; [`ProtflowError::InvalidTransition`] for anything
    /// but PENDING → RUNNING → COMPLETED | FAILED. `result` is kept only for COMPLETED
    /// and `error` only for FAILED; anything else is dropped with a warning.
    pub async fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.get_mut(id) else {
            return Ok(false);
        };
        if !job.status.can_transition_to(status) {
            return Err(ProtflowError::InvalidTransition {
                job_id: id.to_string(),
                from: job.status.to_string(),
                to: status.to_string(),
            });
        }

        let (result, error) = match status {
            JobStatus::Completed => {
                if error.is_some() {
                    warn!(job_id = %id, "Dropping error passed with COMPLETED");
                }
                (Some(result.unwrap_or_else(|| json!({ "success": true }))), None)
            }
            JobStatus::Failed => {
                if result.is_some() {
                    warn!(job_id = %id, "Dropping result passed with FAILED");
                }
                (None, Some(error.unwrap_or_else(|| "Job failed".to_string())))
            }
            _ => {
                if result.is_some() || error.is_some() {
                    warn!(job_id = %id, status = %status, "Dropping result/error passed with non-terminal status");
                }
                (None, None)
            }
        };

        job.status = status;
        job.result = result;
        job.error = error;
        job.updated_at = Utc::now();

        let event = JobEvent {
            job_id: id.to_string(),
            status,
            timestamp: job.updated_at,
        };
        drop(inner);
        // No subscribers is fine.
        let _ = self.events.send(event);
        info!(job_id = %id, status = %status, "Job status updated");
        Ok(true)
    }

    /// Link `id` to an existing predecessor. Refuses self-links and non-pending jobs.
    pub async fn set_dependency(&self, id: &str, dep_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if id == dep_id || !inner.jobs.contains_key(dep_id) {
            return false;
        }
        match inner.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.depends_on = Some(dep_id.to_string());
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Replace the parameter bag. Only allowed while PENDING.
    pub async fn set_parameters(&self, id: &str, parameters: Parameters) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.parameters = parameters;
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub async fn get_all_jobs(&self) -> Vec<JobView> {
        self.inner.read().await.jobs.values().map(Job::view).collect()
    }

    /// Queued jobs in queue order.
    pub async fn get_queued_jobs(&self) -> Vec<JobView> {
        let inner = self.inner.read().await;
        inner
            .queue
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .map(Job::view)
            .collect()
    }

    /// Drop terminal jobs not updated within `ttl`. Returns how many were removed.
    pub async fn evict_terminal_older_than(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|_, job| !(job.status.is_terminal() && now - job.updated_at >= ttl));
        let Inner { jobs, queue } = &mut *inner;
        queue.retain(|id| jobs.contains_key(id));

        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(evicted, remaining = jobs.len(), "Evicted terminal jobs");
        }
        evicted
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Resolve once `id` is COMPLETED or FAILED. `None` if the job is unknown or evicted.
    pub async fn wait_for_terminal(&self, id: &str) -> Option<Job> {
        let mut rx = self.subscribe();
        loop {
            let job = self.get_job(id).await?;
            if job.status.is_terminal() {
                return Some(job);
            }
            loop {
                match rx.recv().await {
                    Ok(event) if event.job_id == id && event.status.is_terminal() => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return self.get_job(id).await,
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    async fn job(registry: &JobRegistry, op: Operation) -> Job {
        registry.create_job(op.title(), "", op, Parameters::new()).await
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = JobRegistry::new();
        let created = registry
            .create_job("Generate", "Target: binder", Operation::GenerateProtein, params(json!({ "prompt": "binder" })))
            .await;
        assert_eq!(created.status, JobStatus::Pending);

        let fetched = registry.get_job(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert!(registry.get_job("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_ids_unique() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;
        let b = job(&registry, Operation::GenerateProtein).await;
        assert_ne!(a.id, b.id);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_queue_is_idempotent() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;
        let b = job(&registry, Operation::PredictStructure).await;

        assert!(registry.queue_job(&b.id).await);
        assert!(registry.queue_job(&a.id).await);
        assert!(registry.queue_job(&b.id).await);
        assert!(!registry.queue_job("missing").await);

        let queued: Vec<String> = registry.get_queued_jobs().await.into_iter().map(|v| v.id).collect();
        assert_eq!(queued, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_transitions_enforced() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;

        let err = registry
            .update_job_status(&a.id, JobStatus::Completed, Some(json!({})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtflowError::InvalidTransition { .. }));

        assert!(registry.update_job_status(&a.id, JobStatus::Running, None, None).await.unwrap());
        assert!(registry
            .update_job_status(&a.id, JobStatus::Failed, None, Some("boom".into()))
            .await
            .unwrap());
        assert!(registry.update_job_status(&a.id, JobStatus::Running, None, None).await.is_err());

        let done = registry.get_job(&a.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("boom"));

        assert!(!registry.update_job_status("missing", JobStatus::Running, None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_inconsistent_fields_dropped() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;
        registry
            .update_job_status(&a.id, JobStatus::Running, Some(json!({ "x": 1 })), Some("e".into()))
            .await
            .unwrap();
        let running = registry.get_job(&a.id).await.unwrap();
        assert!(running.result.is_none() && running.error.is_none());

        registry
            .update_job_status(&a.id, JobStatus::Completed, Some(json!({ "sequence": "MK" })), Some("e".into()))
            .await
            .unwrap();
        let done = registry.get_job(&a.id).await.unwrap();
        assert_eq!(done.result, Some(json!({ "sequence": "MK" })));
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn test_failed_without_message_still_has_error() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;
        registry.update_job_status(&a.id, JobStatus::Running, None, None).await.unwrap();
        registry.update_job_status(&a.id, JobStatus::Failed, None, None).await.unwrap();
        assert!(registry.get_job(&a.id).await.unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_set_dependency_and_parameters() {
        let registry = JobRegistry::new();
        let a = job(&registry, Operation::GenerateProtein).await;
        let b = job(&registry, Operation::PredictStructure).await;

        assert!(registry.set_dependency(&b.id, &a.id).await);
        assert!(!registry.set_dependency(&b.id, &b.id).await);
        assert!(!registry.set_dependency(&b.id, "missing").await);
        assert_eq!(registry.get_job(&b.id).await.unwrap().depends_on, Some(a.id.clone()));

        assert!(registry.set_parameters(&b.id, params(json!({ "sequence": "MK" }))).await);
        registry.update_job_status(&b.id, JobStatus::Running, None, None).await.unwrap();
        assert!(!registry.set_parameters(&b.id, Parameters::new()).await);
        assert_eq!(registry.get_job(&b.id).await.unwrap().parameters["sequence"], "MK");
    }

    #[tokio::test]
    async fn test_builder_drops_unknown_dependency() {
        let registry = JobRegistry::new();
        let created = registry
            .create(NewJob::new(Operation::PredictStructure, Parameters::new()).depends_on("ghost").block_id("b-1"))
            .await;
        assert!(created.depends_on.is_none());
        assert_eq!(created.block_id.as_deref(), Some("b-1"));
        assert_eq!(created.title, "Predict 3D Structure");
    }

    #[tokio::test]
    async fn test_eviction_only_touches_terminal_jobs() {
        let registry = JobRegistry::new();
        let pending = job(&registry, Operation::GenerateProtein).await;
        let running = job(&registry, Operation::GenerateProtein).await;
        let done = job(&registry, Operation::GenerateProtein).await;
        registry.update_job_status(&running.id, JobStatus::Running, None, None).await.unwrap();
        registry.update_job_status(&done.id, JobStatus::Running, None, None).await.unwrap();
        registry.update_job_status(&done.id, JobStatus::Completed, None, None).await.unwrap();
        registry.queue_job(&done.id).await;

        assert_eq!(registry.evict_terminal_older_than(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.evict_terminal_older_than(Duration::ZERO).await, 1);
        assert!(registry.get_job(&done.id).await.is_none());
        assert!(registry.get_job(&pending.id).await.is_some());
        assert!(registry.get_job(&running.id).await.is_some());
        assert!(registry.get_queued_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_events_and_wait_for_terminal() {
        let registry = Arc::new(JobRegistry::new());
        let a = job(&registry, Operation::GenerateProtein).await;
        let mut rx = registry.subscribe();

        let waiter = {
            let registry = registry.clone();
            let id = a.id.clone();
            tokio::spawn(async move { registry.wait_for_terminal(&id).await })
        };

        registry.update_job_status(&a.id, JobStatus::Running, None, None).await.unwrap();
        registry.update_job_status(&a.id, JobStatus::Completed, None, None).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().status, JobStatus::Running);
        assert_eq!(rx.recv().await.unwrap().status, JobStatus::Completed);
        let finished = waiter.await.unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert!(registry.wait_for_terminal("missing").await.is_none());
    }
}
