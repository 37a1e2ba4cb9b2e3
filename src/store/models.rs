//! Row types and their typed domain equivalents.
//!
//! SQLite stores booleans as `Integer` (0/1) and the job/schedule status as
//! `Text`; these types convert in both directions, following the same shape
//! as a `Queryable` row plus a `From`-convertible status enum.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::{jobs, schedules};

/// Convert a boolean to an integer for SQLite storage.
pub fn bool_to_int(b: bool) -> i32 {
    if b { 1 } else { 0 }
}

/// Convert an integer from SQLite storage to a boolean.
pub fn int_to_bool(i: i32) -> bool {
    i != 0
}

// ─── Job status ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => "pending".to_string(),
            JobStatus::Running => "running".to_string(),
            JobStatus::Completed => "completed".to_string(),
            JobStatus::Failed => "failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Task,
    Quick,
}

impl From<String> for JobType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "quick" => JobType::Quick,
            _ => JobType::Task,
        }
    }
}

impl From<JobType> for String {
    fn from(t: JobType) -> Self {
        match t {
            JobType::Task => "task".to_string(),
            JobType::Quick => "quick".to_string(),
        }
    }
}

// ─── Job row / domain struct ──────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub input: String,
    pub output: Option<String>,
    pub chat_id: i64,
    pub schedule_id: Option<String>,
    pub delivered: i32,
    pub retry_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The typed, serializable view of a job, as returned from the store's API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub input: String,
    pub output: Option<String>,
    pub chat_id: i64,
    pub schedule_id: Option<String>,
    pub delivered: bool,
    pub retry_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            job_type: JobType::from(row.job_type),
            status: JobStatus::from(row.status),
            input: row.input,
            output: row.output,
            chat_id: row.chat_id,
            schedule_id: row.schedule_id,
            delivered: int_to_bool(row.delivered),
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub input: String,
    pub output: Option<String>,
    pub chat_id: i64,
    pub schedule_id: Option<String>,
    pub delivered: i32,
    pub retry_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NewJobRow {
    pub fn new(job_type: JobType, input: impl Into<String>, chat_id: i64, schedule_id: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: String::from(job_type),
            status: String::from(JobStatus::Pending),
            input: input.into(),
            output: None,
            chat_id,
            schedule_id,
            delivered: bool_to_int(false),
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ─── Schedule row / domain struct ─────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schedules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScheduleRow {
    pub id: String,
    pub description: String,
    pub natural_schedule: String,
    pub parsed_cron: String,
    pub prompt: String,
    pub enabled: i32,
    pub last_run_at: Option<i64>,
    pub next_run_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub description: String,
    pub natural_schedule: String,
    pub parsed_cron: String,
    pub prompt: String,
    pub enabled: bool,
    pub last_run_at: Option<i64>,
    pub next_run_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            natural_schedule: row.natural_schedule,
            parsed_cron: row.parsed_cron,
            prompt: row.prompt,
            enabled: int_to_bool(row.enabled),
            last_run_at: row.last_run_at,
            next_run_at: row.next_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schedules)]
pub struct NewScheduleRow {
    pub id: String,
    pub description: String,
    pub natural_schedule: String,
    pub parsed_cron: String,
    pub prompt: String,
    pub enabled: i32,
    pub last_run_at: Option<i64>,
    pub next_run_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
