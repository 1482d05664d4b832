use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::TimekeeperError;

/// Synthetic time-of-day appended to every task date sent on creation.
pub const TASK_TIME_SUFFIX: &str = "T00:10:00.000Z";

/// One row of the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimesheetEntry {
    pub description: String,
    pub hours_worked: String,
    pub work_order: String,
    pub labor_task_name: String,
}

impl TimesheetEntry {
    pub fn work_order_prefix(&self) -> &str {
        work_order_prefix(&self.work_order)
    }
}

impl fmt::Display for TimesheetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.description, self.hours_worked, self.work_order, self.labor_task_name
        )
    }
}

/// Everything before the first `-` of a work order, or the whole string when there is none.
pub fn work_order_prefix(work_order: &str) -> &str {
    work_order
        .split_once('-')
        .map_or(work_order, |(prefix, _)| prefix)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LaborTask {
    pub name: String,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LaborTaskRelationship {
    #[serde(rename = "taskDesc")]
    pub task_desc: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// Response of `GET /laborTaskRelationships`, keyed by work order prefix.
pub type LaborTaskRelationships = HashMap<String, Vec<LaborTaskRelationship>>;

#[derive(Serialize, Debug)]
pub struct CreateTaskRequest<'a> {
    pub user: &'a str,
    pub description: &'a str,
    pub date: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl CreateTaskResponse {
    /// The id assigned by the service, or an empty string when the response has none.
    pub fn task_id(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UpdateTaskRequest<'a> {
    pub taskid: &'a str,
    pub hours: &'a str,
    #[serde(rename = "laborTask")]
    pub labor_task: &'a LaborTask,
    #[serde(rename = "workOrder")]
    pub work_order: &'a str,
    // The service expects the flag as a string.
    pub approved: &'static str,
}

/// A task as returned by the service's read endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of the create+update pair for a single attempt.
#[derive(Debug, Clone)]
pub struct WriteResponse {
    pub task_id: String,
    pub status: u16,
    pub body: String,
}

/// Terminal result of importing one entry.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub entry: TimesheetEntry,
    pub task_id: String,
    pub http_status: Option<u16>,
    pub response_body: String,
    pub attempts_used: u32,
    pub succeeded: bool,
}

impl ImportOutcome {
    /// The retry-exhaustion error for a failed outcome.
    pub fn exhaustion(&self) -> Option<TimekeeperError> {
        (!self.succeeded).then(|| TimekeeperError::RetryExhausted {
            status: self.http_status,
            body: self.response_body.clone(),
            retries: self.attempts_used.saturating_sub(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_stops_at_first_dash() {
        assert_eq!(work_order_prefix("AA-111-1: Crazy Friday"), "AA");
        assert_eq!(work_order_prefix("OH-11111-1: Overhead Labor"), "OH");
    }

    #[test]
    fn prefix_without_dash_is_whole_work_order() {
        assert_eq!(work_order_prefix("NODASH"), "NODASH");
        assert_eq!(work_order_prefix(""), "");
    }

    #[test]
    fn created_id_falls_back_to_empty() {
        let response: CreateTaskResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert_eq!(response.task_id(), "");

        let response: CreateTaskResponse = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(response.task_id(), "abc");

        let response: CreateTaskResponse = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(response.task_id(), "42");
    }

    #[test]
    fn update_body_always_sends_unapproved() {
        let labor_task = LaborTask {
            name: "Project Meetings".to_string(),
            code: "MTG".to_string(),
        };
        let body = UpdateTaskRequest {
            taskid: "t-1",
            hours: "8.0",
            labor_task: &labor_task,
            work_order: "AA-111-1",
            approved: "false",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "taskid": "t-1",
                "hours": "8.0",
                "laborTask": {"name": "Project Meetings", "code": "MTG"},
                "workOrder": "AA-111-1",
                "approved": "false"
            })
        );
    }
}
