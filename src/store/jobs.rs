//! Job operations: `spec.md` §4.1 (all but the schedule operations).

use diesel::dsl::count_star;
use diesel::prelude::*;

use crate::error::StorageFailure;

use super::JobStore;
use super::models::{Job, JobRow, JobStatus, JobType, NewJobRow, bool_to_int};
use super::schema::jobs;

/// Number of times `claimNextPending` will retry after losing a claim race
/// to another worker before giving up for this poll.
const CLAIM_RETRY_ATTEMPTS: usize = 8;

impl JobStore {
    /// Insert a new job with `status=pending`, `delivered=false`, `retryCount=0`.
    pub fn create_job(
        &self,
        job_type: JobType,
        input: impl Into<String>,
        chat_id: i64,
        schedule_id: Option<String>,
    ) -> Result<Job, StorageFailure> {
        let mut conn = self.pool().get()?;
        let row = NewJobRow::new(job_type, input, chat_id, schedule_id);

        diesel::insert_into(jobs::table).values(&row).execute(&mut conn)?;

        let inserted: JobRow = jobs::table.find(&row.id).select(JobRow::as_select()).first(&mut conn)?;
        Ok(Job::from(inserted))
    }

    /// Fetch a single job by id, or `None` if it does not exist.
    pub fn get_job(&self, id: &str) -> Result<Option<Job>, StorageFailure> {
        let mut conn = self.pool().get()?;
        let row: Option<JobRow> = jobs::table
            .find(id)
            .select(JobRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Job::from))
    }

    /// Resolve a full id or unique 8-character prefix to a single job.
    ///
    /// Returns `Ok(None)` if nothing matches, and `Err` only on storage
    /// failure; ambiguous prefixes (matching more than one job) also resolve
    /// to `None` — the caller treats that as not-found.
    pub fn find_job_by_id_prefix(&self, prefix: &str) -> Result<Option<Job>, StorageFailure> {
        if let Some(job) = self.get_job(prefix)? {
            return Ok(Some(job));
        }

        let mut conn = self.pool().get()?;
        let pattern = format!("{prefix}%");
        let mut matches: Vec<JobRow> = jobs::table
            .filter(jobs::id.like(pattern))
            .select(JobRow::as_select())
            .load(&mut conn)?;

        if matches.len() == 1 {
            Ok(matches.pop().map(Job::from))
        } else {
            Ok(None)
        }
    }

    /// Jobs belonging to `chat_id`, most recent first.
    pub fn list_jobs_by_chat(&self, chat_id: i64, limit: i64) -> Result<Vec<Job>, StorageFailure> {
        let mut conn = self.pool().get()?;
        let rows: Vec<JobRow> = jobs::table
            .filter(jobs::chat_id.eq(chat_id))
            .order(jobs::created_at.desc())
            .limit(limit)
            .select(JobRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    /// Atomically claim the oldest pending job, transitioning it to
    /// `running`. Returns `None` if there is no pending job.
    ///
    /// Implemented as a conditional update (`WHERE id = ? AND status =
    /// 'pending'`) inside a transaction; a zero-affected-rows result means
    /// another claimant won the race, in which case the next-oldest
    /// candidate is retried (I2).
    pub fn claim_next_pending(&self) -> Result<Option<Job>, StorageFailure> {
        let mut conn = self.pool().get()?;

        for _ in 0..CLAIM_RETRY_ATTEMPTS {
            let claimed = conn.transaction::<Option<Job>, StorageFailure, _>(|conn| {
                let candidate: Option<String> = jobs::table
                    .filter(jobs::status.eq(String::from(JobStatus::Pending)))
                    .order(jobs::created_at.asc())
                    .select(jobs::id)
                    .first(conn)
                    .optional()?;

                let Some(candidate_id) = candidate else {
                    return Ok(None);
                };

                let now = chrono::Utc::now().timestamp_millis();
                let affected = diesel::update(
                    jobs::table.filter(jobs::id.eq(&candidate_id)).filter(jobs::status.eq(String::from(JobStatus::Pending))),
                )
                .set((jobs::status.eq(String::from(JobStatus::Running)), jobs::updated_at.eq(now)))
                .execute(conn)?;

                if affected == 0 {
                    // Another worker claimed it between the select and the update.
                    return Ok(None);
                }

                let row: JobRow = jobs::table.find(&candidate_id).select(JobRow::as_select()).first(conn)?;
                Ok(Some(Job::from(row)))
            })?;

            match claimed {
                Some(job) => return Ok(Some(job)),
                None => {
                    // Either no pending job remains, or we lost the race — check
                    // whether any pending job still exists before retrying.
                    let still_pending: i64 = jobs::table
                        .filter(jobs::status.eq(String::from(JobStatus::Pending)))
                        .select(count_star())
                        .first(&mut conn)?;
                    if still_pending == 0 {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(None)
    }

    /// Transition `running → completed`. No-op if the job is not `running`.
    pub fn complete_job(&self, id: &str, output: impl Into<String>) -> Result<(), StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();
        diesel::update(jobs::table.filter(jobs::id.eq(id)).filter(jobs::status.eq(String::from(JobStatus::Running))))
            .set((
                jobs::status.eq(String::from(JobStatus::Completed)),
                jobs::output.eq(output.into()),
                jobs::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Transition to `failed`, optionally incrementing `retryCount`.
    pub fn fail_job(&self, id: &str, reason: impl Into<String>, increment_retry: bool) -> Result<(), StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();

        conn.transaction::<(), StorageFailure, _>(|conn| {
            let current: JobRow = jobs::table.find(id).select(JobRow::as_select()).first(conn)?;
            let retry_count = if increment_retry { current.retry_count + 1 } else { current.retry_count };

            diesel::update(jobs::table.filter(jobs::id.eq(id)))
                .set((
                    jobs::status.eq(String::from(JobStatus::Failed)),
                    jobs::output.eq(reason.into()),
                    jobs::retry_count.eq(retry_count),
                    jobs::updated_at.eq(now),
                ))
                .execute(conn)?;
            Ok(())
        })
    }

    /// Cancel a `pending` or `running` job, transitioning it to `failed`
    /// with reason "Cancelled by user". Returns `Ok(false)` without
    /// modifying the row if the job is already in a terminal state.
    pub fn cancel_job(&self, id: &str) -> Result<bool, StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();

        let affected = diesel::update(
            jobs::table
                .filter(jobs::id.eq(id))
                .filter(
                    jobs::status
                        .eq(String::from(JobStatus::Pending))
                        .or(jobs::status.eq(String::from(JobStatus::Running))),
                ),
        )
        .set((
            jobs::status.eq(String::from(JobStatus::Failed)),
            jobs::output.eq("Cancelled by user"),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        Ok(affected > 0)
    }

    /// Set `delivered = true`. Idempotent.
    pub fn mark_delivered(&self, id: &str) -> Result<(), StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();
        diesel::update(jobs::table.filter(jobs::id.eq(id)))
            .set((jobs::delivered.eq(bool_to_int(true)), jobs::updated_at.eq(now)))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Terminal jobs (`completed`/`failed`) with `delivered = false`, for
    /// delivery recovery on process restart.
    pub fn list_undelivered(&self) -> Result<Vec<Job>, StorageFailure> {
        let mut conn = self.pool().get()?;
        let rows: Vec<JobRow> = jobs::table
            .filter(jobs::delivered.eq(bool_to_int(false)))
            .filter(
                jobs::status
                    .eq(String::from(JobStatus::Completed))
                    .or(jobs::status.eq(String::from(JobStatus::Failed))),
            )
            .select(JobRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    /// Startup reconciliation: `running` jobs older than `stuck_threshold_ms`
    /// are reset to `pending` with `retryCount += 1`. The previous worker
    /// has demonstrably died; this is the one sanctioned exception to I1.
    pub fn reconcile_stuck_jobs(&self, stuck_threshold_ms: i64) -> Result<usize, StorageFailure> {
        let mut conn = self.pool().get()?;
        let cutoff = chrono::Utc::now().timestamp_millis() - stuck_threshold_ms;
        let now = chrono::Utc::now().timestamp_millis();

        conn.transaction::<usize, StorageFailure, _>(|conn| {
            let stuck: Vec<JobRow> = jobs::table
                .filter(jobs::status.eq(String::from(JobStatus::Running)))
                .filter(jobs::updated_at.lt(cutoff))
                .select(JobRow::as_select())
                .load(conn)?;

            for job in &stuck {
                diesel::update(jobs::table.filter(jobs::id.eq(&job.id)))
                    .set((
                        jobs::status.eq(String::from(JobStatus::Pending)),
                        jobs::retry_count.eq(job.retry_count + 1),
                        jobs::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }

            Ok(stuck.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    #[test]
    fn create_job_starts_pending_undelivered_zero_retries() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "do a thing", 1, None).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.delivered);
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn claim_next_pending_returns_oldest_and_transitions_to_running() {
        let (store, _dir) = test_store();
        let j1 = store.create_job(JobType::Task, "first", 1, None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _j2 = store.create_job(JobType::Task, "second", 1, None).unwrap();

        let claimed = store.claim_next_pending().unwrap().unwrap();
        assert_eq!(claimed.id, j1.id);
        assert_eq!(claimed.status, JobStatus::Running);
    }

    #[test]
    fn claim_next_pending_returns_distinct_jobs_on_successive_calls() {
        let (store, _dir) = test_store();
        let j1 = store.create_job(JobType::Task, "first", 1, None).unwrap();
        let j2 = store.create_job(JobType::Task, "second", 1, None).unwrap();

        let c1 = store.claim_next_pending().unwrap().unwrap();
        let c2 = store.claim_next_pending().unwrap().unwrap();
        assert_ne!(c1.id, c2.id);
        assert!([j1.id, j2.id].contains(&c1.id));
    }

    #[test]
    fn claim_next_pending_returns_none_when_queue_empty() {
        let (store, _dir) = test_store();
        assert!(store.claim_next_pending().unwrap().is_none());
    }

    #[test]
    fn complete_job_is_noop_if_not_running() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.complete_job(&job.id, "output").unwrap();
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Pending, "complete on non-running job is a no-op");
    }

    #[test]
    fn complete_job_transitions_running_to_completed() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.claim_next_pending().unwrap();
        store.complete_job(&job.id, "the output").unwrap();
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        assert_eq!(fetched.output.as_deref(), Some("the output"));
    }

    #[test]
    fn fail_job_increments_retry_count_by_default() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.claim_next_pending().unwrap();
        store.fail_job(&job.id, "boom", true).unwrap();
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Failed);
        assert_eq!(fetched.retry_count, 1);
    }

    #[test]
    fn cancel_job_transitions_pending_to_failed() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        assert!(store.cancel_job(&job.id).unwrap());
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Failed);
        assert_eq!(fetched.output.as_deref(), Some("Cancelled by user"));
    }

    #[test]
    fn cancel_job_rejects_terminal_status() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.claim_next_pending().unwrap();
        store.complete_job(&job.id, "done").unwrap();
        assert!(!store.cancel_job(&job.id).unwrap());
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
    }

    #[test]
    fn mark_delivered_is_idempotent() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.mark_delivered(&job.id).unwrap();
        store.mark_delivered(&job.id).unwrap();
        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert!(fetched.delivered);
    }

    #[test]
    fn list_undelivered_only_returns_terminal_undelivered_jobs() {
        let (store, _dir) = test_store();
        let pending = store.create_job(JobType::Task, "p", 1, None).unwrap();
        let completed = store.create_job(JobType::Task, "c", 1, None).unwrap();
        store.claim_next_pending().unwrap();
        store.complete_job(&completed.id, "done").unwrap();

        let undelivered = store.list_undelivered().unwrap();
        let ids: Vec<&str> = undelivered.iter().map(|j| j.id.as_str()).collect();
        assert!(ids.contains(&completed.id.as_str()));
        assert!(!ids.contains(&pending.id.as_str()));
    }

    #[test]
    fn reconcile_stuck_jobs_resets_old_running_jobs_to_pending() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.claim_next_pending().unwrap();

        // Force it to look stale by requiring a threshold of -1ms (always stale).
        let reconciled = store.reconcile_stuck_jobs(-1).unwrap();
        assert_eq!(reconciled, 1);

        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.retry_count, 1);
    }

    #[test]
    fn find_job_by_id_prefix_resolves_unique_prefix() {
        let (store, _dir) = test_store();
        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        let prefix = &job.id[..8];
        let found = store.find_job_by_id_prefix(prefix).unwrap().unwrap();
        assert_eq!(found.id, job.id);
    }

    #[test]
    fn find_job_by_id_prefix_missing_returns_none() {
        let (store, _dir) = test_store();
        assert!(store.find_job_by_id_prefix("deadbeef").unwrap().is_none());
    }
}
