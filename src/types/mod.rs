//! Wire types for the job registry API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job lifecycle status.
///
/// Closed set; serialized as lower-case strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job record exists but nothing has been submitted for execution.
    Created,
    /// Job is queued for execution.
    Queued,
    /// Job is running.
    Running,
    /// Job finished successfully.
    Finished,
    /// Job failed.
    Error,
    /// Job was canceled.
    Canceled,
}

impl JobStatus {
    /// Wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }

    /// Returns true for statuses a job can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Canceled)
    }

    /// The non-terminal statuses, i.e. what "active" means in a search.
    pub fn active() -> &'static [JobStatus] {
        &[Self::Created, Self::Queued, Self::Running]
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a job's upstream dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    /// Waiting for dependencies to become available.
    Awaiting,
    /// A dependency failed transiently and will be polled again.
    AwaitingRetry,
    /// All dependencies are available.
    Available,
    /// A dependency failed permanently.
    Error,
}

impl DependencyStatus {
    /// Wire representation of the dependency status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awaiting => "awaiting",
            Self::AwaitingRetry => "awaiting_retry",
            Self::Available => "available",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job document as exchanged with the registry.
///
/// `job_options` is always present in the serialized form (explicitly
/// `null` when not given); the trailing optional fields are omitted when
/// unset. Fields the server adds that this client does not model are kept
/// in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Identifier of the backend that owns the job.
    pub backend_id: String,
    /// Client-generated job identifier (`j-` + hex).
    pub job_id: String,
    /// Identifier of the user the job belongs to.
    pub user_id: String,
    /// Process description (an opaque document to this client).
    pub process: Value,
    /// Creation timestamp, `YYYY-MM-DDTHH:MM:SSZ`.
    pub created: String,
    /// Last-update timestamp, same format as `created`.
    pub updated: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Free-form job options; serialized as `null` when not given.
    #[serde(default)]
    pub job_options: Option<Value>,
    /// When execution started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    /// When execution finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    /// Upstream dependency descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Value>>,
    /// Aggregate status of the dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_status: Option<DependencyStatus>,
    /// User the job is executed on behalf of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_user: Option<String>,
    /// Identifier of the underlying execution application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Server-side fields this client passes through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Partial update payload for `PATCH /jobs/{job_id}`.
///
/// The registry applies merge semantics: a field omitted here is left
/// untouched server-side, while a field present as explicit `null` is
/// cleared. `None` therefore means "omit"; to clear a field, set it to
/// `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobUpdate {
    /// New lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Last-update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Execution start timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    /// Execution finish timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    /// Dependency descriptors, or `null` to clear them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,
    /// Dependency status, or `null` to clear it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_status: Option<Value>,
    /// Proxy user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_user: Option<String>,
    /// Execution application id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

/// Formats a timestamp in the registry's canonical form:
/// ISO-8601 with a literal `Z` suffix and second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_status_wire_values() {
        assert_eq!(serde_json::to_value(JobStatus::Created).unwrap(), "created");
        assert_eq!(
            serde_json::to_value(JobStatus::Canceled).unwrap(),
            "canceled"
        );
        let status: JobStatus = serde_json::from_value(json!("running")).unwrap();
        assert_eq!(status, JobStatus::Running);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Created.is_terminal());
        assert!(JobStatus::active().iter().all(|s| !s.is_terminal()));
    }

    #[test]
    fn test_dependency_status_wire_values() {
        assert_eq!(
            serde_json::to_value(DependencyStatus::AwaitingRetry).unwrap(),
            "awaiting_retry"
        );
        assert_eq!(
            serde_json::to_value(DependencyStatus::Awaiting).unwrap(),
            "awaiting"
        );
    }

    #[test]
    fn test_job_record_serializes_null_job_options() {
        let record = JobRecord {
            backend_id: "b1".into(),
            job_id: "j-123abc".into(),
            user_id: "john".into(),
            process: json!({"process_graph": {}}),
            created: "2024-01-02T03:04:05Z".into(),
            updated: "2024-01-02T03:04:05Z".into(),
            status: JobStatus::Created,
            job_options: None,
            started: None,
            finished: None,
            dependencies: None,
            dependency_status: None,
            proxy_user: None,
            application_id: None,
            extra: Default::default(),
        };
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["job_options"], Value::Null);
        assert!(!object.contains_key("started"));
        assert!(!object.contains_key("dependencies"));
    }

    #[test]
    fn test_job_update_omission_vs_clearing() {
        let update = JobUpdate {
            dependencies: Some(Value::Null),
            dependency_status: Some(Value::Null),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"dependencies": null, "dependency_status": null})
        );

        let update = JobUpdate {
            status: Some(JobStatus::Running),
            updated: Some("2022-12-14T12:34:56Z".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"status": "running", "updated": "2022-12-14T12:34:56Z"})
        );
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2020-01-02T03:04:05Z");
    }
}
