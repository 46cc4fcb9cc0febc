//! Deployment job DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobStatus;

/// Request to create a new deployment job
///
/// `datacenter`, `cluster` and `network` are inventory references.
/// `cluster` and `network` are optional at the API boundary but rendering
/// requires both, so a job created without them will fail during its run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeployment {
    pub name: String,
    pub vm_name: String,
    pub vm_count: i32,
    #[serde(default = "default_cpu")]
    pub cpu: i32,
    #[serde(default = "default_memory")]
    pub memory: i32,
    pub datacenter: i64,
    pub cluster: Option<i64>,
    pub network: Option<i64>,
    #[serde(default = "default_datastore")]
    pub datastore: String,
}

fn default_cpu() -> i32 {
    2
}

fn default_memory() -> i32 {
    2048
}

fn default_datastore() -> String {
    "LocalDS_0".to_string()
}

/// Response returned when a deployment job has been accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentAccepted {
    pub message: String,
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Full run log of a deployment job, fetched from the blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLogs {
    pub logs: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_deployment_defaults() {
        let req: CreateDeployment = serde_json::from_str(
            r#"{"name": "batch-1", "vm_name": "web01", "vm_count": 3, "datacenter": 1}"#,
        )
        .unwrap();

        assert_eq!(req.cpu, 2);
        assert_eq!(req.memory, 2048);
        assert_eq!(req.datastore, "LocalDS_0");
        assert_eq!(req.cluster, None);
        assert_eq!(req.network, None);
    }

    #[test]
    fn test_create_deployment_explicit_values() {
        let req: CreateDeployment = serde_json::from_str(
            r#"{
                "name": "batch-1", "vm_name": "web01", "vm_count": 3,
                "cpu": 4, "memory": 4096,
                "datacenter": 1, "cluster": 2, "network": 3,
                "datastore": "DS1"
            }"#,
        )
        .unwrap();

        assert_eq!(req.cpu, 4);
        assert_eq!(req.memory, 4096);
        assert_eq!(req.cluster, Some(2));
        assert_eq!(req.network, Some(3));
        assert_eq!(req.datastore, "DS1");
    }

    #[test]
    fn test_create_deployment_missing_required_field() {
        let result: Result<CreateDeployment, _> =
            serde_json::from_str(r#"{"name": "batch-1", "vm_count": 3, "datacenter": 1}"#);
        assert!(result.is_err());
    }
}
