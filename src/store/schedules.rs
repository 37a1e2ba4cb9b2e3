//! Schedule operations: `spec.md` §4.1 (the schedule half of `JobStore`).

use diesel::prelude::*;

use crate::error::StorageFailure;

use super::JobStore;
use super::models::{NewScheduleRow, Schedule, ScheduleRow, bool_to_int};
use super::schema::schedules;

impl JobStore {
    /// Create a new recurring schedule template.
    #[allow(clippy::too_many_arguments)]
    pub fn create_schedule(
        &self,
        description: impl Into<String>,
        natural_schedule: impl Into<String>,
        parsed_cron: impl Into<String>,
        prompt: impl Into<String>,
        enabled: bool,
        next_run_at: i64,
    ) -> Result<Schedule, StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();

        let row = NewScheduleRow {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            natural_schedule: natural_schedule.into(),
            parsed_cron: parsed_cron.into(),
            prompt: prompt.into(),
            enabled: bool_to_int(enabled),
            last_run_at: None,
            next_run_at,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(schedules::table).values(&row).execute(&mut conn)?;

        let inserted: ScheduleRow = schedules::table.find(&row.id).select(ScheduleRow::as_select()).first(&mut conn)?;
        Ok(Schedule::from(inserted))
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, StorageFailure> {
        let mut conn = self.pool().get()?;
        let row: Option<ScheduleRow> = schedules::table
            .find(id)
            .select(ScheduleRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Schedule::from))
    }

    /// Enabled schedules whose `nextRunAt <= now`, in insertion order.
    pub fn due_schedules(&self, now_ms: i64) -> Result<Vec<Schedule>, StorageFailure> {
        let mut conn = self.pool().get()?;
        let rows: Vec<ScheduleRow> = schedules::table
            .filter(schedules::enabled.eq(bool_to_int(true)))
            .filter(schedules::next_run_at.le(now_ms))
            .order(schedules::created_at.asc())
            .select(ScheduleRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    /// Atomically advance a schedule's `nextRunAt` and `lastRunAt`.
    pub fn advance_schedule(&self, id: &str, next_run_at: i64, last_run_at: i64) -> Result<(), StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();
        diesel::update(schedules::table.filter(schedules::id.eq(id)))
            .set((
                schedules::next_run_at.eq(next_run_at),
                schedules::last_run_at.eq(Some(last_run_at)),
                schedules::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Enable/disable a schedule, optionally overriding `nextRunAt`. Used for
    /// disable-on-parse-failure (I5) and for safe-`nextRunAt` recovery (I6).
    pub fn set_schedule_enabled(&self, id: &str, enabled: bool, next_run_at: Option<i64>) -> Result<(), StorageFailure> {
        let mut conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();

        match next_run_at {
            Some(next_run_at) => {
                diesel::update(schedules::table.filter(schedules::id.eq(id)))
                    .set((
                        schedules::enabled.eq(bool_to_int(enabled)),
                        schedules::next_run_at.eq(next_run_at),
                        schedules::updated_at.eq(now),
                    ))
                    .execute(&mut conn)?;
            }
            None => {
                diesel::update(schedules::table.filter(schedules::id.eq(id)))
                    .set((schedules::enabled.eq(bool_to_int(enabled)), schedules::updated_at.eq(now)))
                    .execute(&mut conn)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use chrono::Utc;

    #[test]
    fn due_schedules_excludes_disabled() {
        let (store, _dir) = test_store();
        let now = Utc::now().timestamp_millis();
        let s = store
            .create_schedule("daily", "every day at 9am", "0 9 * * *", "Daily summary", true, now - 1)
            .unwrap();
        store.set_schedule_enabled(&s.id, false, None).unwrap();

        let due = store.due_schedules(now).unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn due_schedules_excludes_future_next_run() {
        let (store, _dir) = test_store();
        let now = Utc::now().timestamp_millis();
        store
            .create_schedule("daily", "every day at 9am", "0 9 * * *", "Daily summary", true, now + 60_000)
            .unwrap();

        let due = store.due_schedules(now).unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn due_schedules_includes_past_due() {
        let (store, _dir) = test_store();
        let now = Utc::now().timestamp_millis();
        let s = store
            .create_schedule("daily", "every day at 9am", "0 9 * * *", "Daily summary", true, now - 5_000)
            .unwrap();

        let due = store.due_schedules(now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, s.id);
    }

    #[test]
    fn advance_schedule_updates_both_timestamps() {
        let (store, _dir) = test_store();
        let now = Utc::now().timestamp_millis();
        let s = store
            .create_schedule("daily", "every day at 9am", "0 9 * * *", "Daily summary", true, now - 1)
            .unwrap();

        let next = now + 86_400_000;
        store.advance_schedule(&s.id, next, now).unwrap();

        let fetched = store.get_schedule(&s.id).unwrap().unwrap();
        assert_eq!(fetched.next_run_at, next);
        assert_eq!(fetched.last_run_at, Some(now));
    }

    #[test]
    fn set_schedule_enabled_false_is_idempotent_on_observable_state() {
        let (store, _dir) = test_store();
        let now = Utc::now().timestamp_millis();
        let s = store
            .create_schedule("daily", "every day at 9am", "0 9 * * *", "Daily summary", true, now - 1)
            .unwrap();

        store.set_schedule_enabled(&s.id, false, None).unwrap();
        let after_first = store.get_schedule(&s.id).unwrap().unwrap();

        store.set_schedule_enabled(&s.id, false, None).unwrap();
        let after_second = store.get_schedule(&s.id).unwrap().unwrap();

        assert!(!after_first.enabled);
        assert!(!after_second.enabled);
        assert_eq!(after_first.next_run_at, after_second.next_run_at);
    }
}
