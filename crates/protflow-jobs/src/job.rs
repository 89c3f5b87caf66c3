//! Job model and lifecycle.

use chrono::{DateTime, Utc};
use protflow_common::outcome::Parameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// PENDING → RUNNING → COMPLETED | FAILED. Nothing else.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work. Owned by the registry; everyone else sees clones or [`JobView`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub description: String,
    pub function_name: Operation,
    pub parameters: Parameters,
    pub status: JobStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub depends_on: Option<String>,
    pub block_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(
        title: String,
        description: String,
        function_name: Operation,
        parameters: Parameters,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            description,
            function_name,
            parameters,
            status: JobStatus::Pending,
            result: None,
            error: None,
            depends_on: None,
            block_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            function_name: self.function_name,
            parameters: self.parameters.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            depends_on: self.depends_on.clone(),
            block_id: self.block_id.clone(),
        }
    }
}

/// Externally visible job fields, as returned by the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub function_name: Operation,
    pub parameters: Parameters,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub depends_on: Option<String>,
    pub block_id: Option<String>,
}

/// Broadcast on every accepted status transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allowed_transitions() {
        use JobStatus::*;
        let all = [Pending, Running, Completed, Failed];
        let allowed: Vec<(JobStatus, JobStatus)> = all
            .iter()
            .flat_map(|from| all.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();
        assert_eq!(allowed, vec![(Pending, Running), (Running, Completed), (Running, Failed)]);
    }

    #[test]
    fn test_view_serializes_lowercase_status_and_tag() {
        let job = Job::new(
            "Predict 3D Structure".into(),
            "Sequence length: 3".into(),
            Operation::PredictStructure,
            json!({ "sequence": "MKV" }).as_object().cloned().unwrap(),
        );
        let value = serde_json::to_value(job.view()).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["function_name"], "predict_structure");
        assert_eq!(value["result"], Value::Null);
        assert_eq!(value["id"].as_str().unwrap().len(), 36);
    }
}
