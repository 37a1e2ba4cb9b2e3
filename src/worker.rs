//! The worker loop: `spec.md` §4.5. Drains the pending queue, one job at a
//! time, via a single-worker polling loop.

use std::sync::Arc;
use std::time::Duration;

use crate::chat::ChatGateway;
use crate::configstore::ConfigStore;
use crate::llm::Completion;
use crate::store::JobStore;
use crate::store::models::JobStatus;

/// Idle-poll interval when the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the outer supervisor respawns a crashed worker task.
pub const DEFAULT_WORKER_RESTART_DELAY: Duration = Duration::from_secs(2);

/// `running` jobs older than this are assumed to belong to a dead worker
/// instance and are reconciled back to `pending` at startup.
pub const DEFAULT_STUCK_THRESHOLD_MS: i64 = 10 * 60 * 1000;

pub struct Worker {
    store: JobStore,
    completion: Arc<dyn Completion>,
    gateway: Arc<dyn ChatGateway>,
    config: Arc<ConfigStore>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(store: JobStore, completion: Arc<dyn Completion>, gateway: Arc<dyn ChatGateway>, config: Arc<ConfigStore>) -> Self {
        Self { store, completion, gateway, config, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Startup recovery: reconcile stuck `running` jobs, then attempt
    /// delivery of anything left undelivered by a previous instance.
    pub async fn recover(&self) {
        match self.store.reconcile_stuck_jobs(DEFAULT_STUCK_THRESHOLD_MS) {
            Ok(count) if count > 0 => tracing::warn!(count, "reconciled stuck running jobs back to pending"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "failed to reconcile stuck jobs"),
        }

        let undelivered = match self.store.list_undelivered() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "failed to list undelivered jobs");
                return;
            }
        };

        for job in undelivered {
            let message = format_result(job.status, job.output.as_deref().unwrap_or_default());
            match self.gateway.send(job.chat_id, &message).await {
                Ok(()) => {
                    if let Err(e) = self.store.mark_delivered(&job.id) {
                        tracing::error!(job = %job.id, error = %e, "failed to mark job delivered after recovery send");
                    }
                }
                Err(e) => {
                    tracing::warn!(job = %job.id, error = %e, "delivery recovery send failed, will retry next startup");
                }
            }
        }
    }

    /// Run the main poll loop forever. Intended to be wrapped in a restart
    /// supervisor by the caller.
    pub async fn run(&self) {
        loop {
            match self.store.claim_next_pending() {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    tracing::error!(error = %e, "claim_next_pending failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn process(&self, job: crate::store::models::Job) {
        let system_prompt = self.config.build_system_prompt().unwrap_or_default();
        let (final_status, message) = match self.completion.complete(&job.input, Some(&system_prompt)).await {
            Ok(output) => {
                if let Err(e) = self.store.complete_job(&job.id, output.clone()) {
                    tracing::error!(job = %job.id, error = %e, "failed to mark job completed");
                }
                (JobStatus::Completed, format_result(JobStatus::Completed, &output))
            }
            Err(err) => {
                let reason = format!("Error: {err}");
                if let Err(e) = self.store.fail_job(&job.id, reason.clone(), true) {
                    tracing::error!(job = %job.id, error = %e, "failed to mark job failed");
                }
                (JobStatus::Failed, format_result(JobStatus::Failed, &reason))
            }
        };

        match self.gateway.send(job.chat_id, &message).await {
            Ok(()) => {
                if let Err(e) = self.store.mark_delivered(&job.id) {
                    tracing::error!(job = %job.id, error = %e, "failed to mark job delivered");
                }
            }
            Err(e) => {
                tracing::warn!(job = %job.id, status = ?final_status, error = %e, "delivery failed, will retry on next startup");
            }
        }
    }
}

/// The user-facing message for a finished job: raw output when completed,
/// a short apology plus truncated reason when failed.
fn format_result(status: JobStatus, body: &str) -> String {
    match status {
        JobStatus::Failed => format!("Sorry, this task failed: {}", truncate(body, 500)),
        _ => body.to_string(),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit { text.to_string() } else { format!("{}...", &text[..floor_char_boundary(text, limit)]) }
}

/// The largest byte offset `<= limit` that lands on a char boundary. Failure
/// reasons can embed arbitrary completion-error text, so truncation must
/// never slice mid-codepoint.
fn floor_char_boundary(text: &str, limit: usize) -> usize {
    if limit >= text.len() {
        return text.len();
    }
    (0..=limit).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

/// Restart-loop supervision around the worker's main task, generalizing the
/// teacher's lifecycle supervisor down to the single case this engine needs:
/// on panic or unexpected exit, wait and respawn.
pub async fn run_supervised(worker: Arc<Worker>) {
    worker.recover().await;

    loop {
        let worker = Arc::clone(&worker);
        let handle = tokio::spawn(async move { worker.run().await });

        if let Err(e) = handle.await {
            tracing::error!(error = %e, "worker task exited unexpectedly, restarting");
        }

        tokio::time::sleep(DEFAULT_WORKER_RESTART_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    use crate::chat::InboundMessage;
    use crate::error::{CompletionFailure, TransportFailure};
    use crate::store::models::JobType;
    use crate::store::test_store;

    struct RecordingGateway {
        sent: Mutex<Vec<(i64, String)>>,
        fail_next: Mutex<bool>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()), fail_next: Mutex::new(false) }
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        fn name(&self) -> &str {
            "test"
        }

        async fn send(&self, chat_id: i64, message: &str) -> Result<(), TransportFailure> {
            if *self.fail_next.lock().unwrap() {
                return Err(TransportFailure("send failed".to_string()));
            }
            self.sent.lock().unwrap().push((chat_id, message.to_string()));
            Ok(())
        }

        async fn listen(&self, _tx: mpsc::Sender<InboundMessage>) -> Result<(), TransportFailure> {
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct StaticCompletion(Result<&'static str, &'static str>);

    #[async_trait]
    impl Completion for StaticCompletion {
        async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, CompletionFailure> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(CompletionFailure(msg.to_string())),
            }
        }
    }

    fn test_config() -> (Arc<ConfigStore>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        (Arc::new(ConfigStore::new(dir.path())), dir)
    }

    #[tokio::test]
    async fn successful_job_completes_and_delivers() {
        let (store, _dir) = test_store();
        let (config, _config_dir) = test_config();
        let gateway = Arc::new(RecordingGateway::new());
        let completion = Arc::new(StaticCompletion(Ok("the answer")));
        let worker = Worker::new(store.clone(), completion, gateway.clone(), config);

        let job = store.create_job(JobType::Task, "do it", 1, None).unwrap();
        let claimed = store.claim_next_pending().unwrap().unwrap();
        assert_eq!(claimed.id, job.id);

        worker.process(claimed).await;

        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        assert!(fetched.delivered);
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_completion_fails_job_and_sends_apology() {
        let (store, _dir) = test_store();
        let (config, _config_dir) = test_config();
        let gateway = Arc::new(RecordingGateway::new());
        let completion = Arc::new(StaticCompletion(Err("timeout")));
        let worker = Worker::new(store.clone(), completion, gateway.clone(), config);

        let job = store.create_job(JobType::Task, "do it", 1, None).unwrap();
        let claimed = store.claim_next_pending().unwrap().unwrap();
        worker.process(claimed).await;

        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Failed);
        assert_eq!(fetched.retry_count, 1);

        let sent = gateway.sent.lock().unwrap();
        assert!(sent[0].1.contains("Sorry, this task failed"));
    }

    #[tokio::test]
    async fn failed_send_leaves_job_undelivered_for_recovery() {
        let (store, _dir) = test_store();
        let (config, _config_dir) = test_config();
        let gateway = Arc::new(RecordingGateway::new());
        *gateway.fail_next.lock().unwrap() = true;
        let completion = Arc::new(StaticCompletion(Ok("done")));
        let worker = Worker::new(store.clone(), completion, gateway, config);

        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        let claimed = store.claim_next_pending().unwrap().unwrap();
        worker.process(claimed).await;

        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        assert!(!fetched.delivered);
    }

    #[tokio::test]
    async fn recover_delivers_undelivered_terminal_jobs() {
        let (store, _dir) = test_store();
        let (config, _config_dir) = test_config();
        let gateway = Arc::new(RecordingGateway::new());
        let completion = Arc::new(StaticCompletion(Ok("unused")));

        let job = store.create_job(JobType::Task, "x", 1, None).unwrap();
        store.claim_next_pending().unwrap();
        store.complete_job(&job.id, "already done").unwrap();

        let worker = Worker::new(store.clone(), completion, gateway.clone(), config);
        worker.recover().await;

        let fetched = store.get_job(&job.id).unwrap().unwrap();
        assert!(fetched.delivered);
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn format_result_does_not_panic_on_multibyte_boundary_in_failure_reason() {
        let reason = format!("{}{}", "a".repeat(499), "é and then some more text after it");
        let formatted = format_result(JobStatus::Failed, &reason);
        assert!(formatted.starts_with("Sorry, this task failed:"));
    }
}
