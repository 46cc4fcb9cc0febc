//! Deployment job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single request to provision a batch of virtual machines.
///
/// Created by the API server in `Pending` state, then exclusively owned and
/// mutated by the worker until it reaches a terminal state. The API only
/// reads jobs after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentJob {
    pub id: Uuid,
    pub name: String,
    pub vm_name: String,
    pub vm_count: i32,
    pub cpu: i32,
    pub memory_mb: i32,
    pub datacenter_id: i64,
    pub cluster_id: Option<i64>,
    pub network_id: Option<i64>,
    pub datastore: String,
    /// `bucket/key` of the rendered template, set once rendering succeeds.
    pub blob_reference: Option<String>,
    /// First 5000 bytes of the run log, set once the run produces output.
    pub log_excerpt: Option<String>,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Job lifecycle status
///
/// Transitions are monotonic: `Pending -> Running -> {Completed | Failed}`.
/// A job never re-enters an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

    /// Parses a status string as stored in the database.
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// True once the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        assert_eq!(JobStatus::parse("queued"), None);
        assert_eq!(JobStatus::parse(""), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
