//! The front door from chat transport to the rest of the engine:
//! `spec.md` §4.4.

use std::sync::Arc;

use crate::configstore::ConfigStore;
use crate::intent::{Intent, classify};
use crate::llm::Completion;
use crate::store::JobStore;
use crate::store::models::{Job, JobStatus, JobType};

use super::command::{Command, parse_command};
use super::{ChatGateway, InboundMessage};

const REJECTION_MESSAGE: &str = "Sorry, I can't help with that here.";
const COMPLETION_APOLOGY: &str = "Sorry, I couldn't get an answer just now. Please try again in a moment.";
const GET_TRUNCATE_LIMIT: usize = 4000;
const STATUS_LIST_LIMIT: i64 = 20;

/// Dispatches inbound chat messages: authorization, command handling,
/// classification, and quick/task routing.
pub struct ChatDispatcher {
    gateway: Arc<dyn ChatGateway>,
    store: JobStore,
    completion: Arc<dyn Completion>,
    config: Arc<ConfigStore>,
    authorized_chat: i64,
}

impl ChatDispatcher {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        store: JobStore,
        completion: Arc<dyn Completion>,
        config: Arc<ConfigStore>,
        authorized_chat: i64,
    ) -> Self {
        Self { gateway, store, completion, config, authorized_chat }
    }

    /// Handle a single inbound message, following `spec.md` §4.4's numbered
    /// behavior.
    pub async fn handle(&self, message: InboundMessage) {
        if message.chat_id != self.authorized_chat {
            let _ = self.gateway.send(message.chat_id, REJECTION_MESSAGE).await;
            return;
        }

        if let Some(command) = parse_command(&message.content) {
            self.handle_command(message.chat_id, command).await;
            return;
        }

        match classify(&message.content) {
            Intent::Quick => self.handle_quick(message.chat_id, &message.content).await,
            Intent::Task => self.handle_task(message.chat_id, &message.content).await,
        }
    }

    async fn handle_quick(&self, chat_id: i64, text: &str) {
        self.gateway.send_typing_indicator(chat_id).await;

        let system_prompt = self.config.build_system_prompt().unwrap_or_default();
        let reply = match self.completion.complete(text, Some(&system_prompt)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "completion failed for quick message");
                COMPLETION_APOLOGY.to_string()
            }
        };

        let _ = self.gateway.send(chat_id, &reply).await;
    }

    async fn handle_task(&self, chat_id: i64, text: &str) {
        let job = match self.store.create_job(JobType::Task, text, chat_id, None) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "failed to create task job");
                let _ = self.gateway.send(chat_id, COMPLETION_APOLOGY).await;
                return;
            }
        };

        let ack = format!("Got it \u{2713} Job ID: `{}`. Send /status to track progress.", &job.id[..8]);
        let _ = self.gateway.send(chat_id, &ack).await;
    }

    async fn handle_command(&self, chat_id: i64, command: Command) {
        match command {
            Command::Start => {
                let _ = self
                    .gateway
                    .send(chat_id, "Hi, I'm peterbot. Send me a message and I'll help, or /status to see your jobs.")
                    .await;
            }
            Command::Status => {
                let reply = self.format_status(chat_id);
                let _ = self.gateway.send(chat_id, &reply).await;
            }
            Command::Get(prefix) => {
                let reply = self.handle_get(&prefix);
                let _ = self.gateway.send(chat_id, &reply).await;
            }
            Command::Retry(prefix) => {
                let reply = self.handle_retry(chat_id, &prefix).await;
                let _ = self.gateway.send(chat_id, &reply).await;
            }
            Command::Unknown(_) => {}
        }
    }

    fn format_status(&self, chat_id: i64) -> String {
        let jobs = match self.store.list_jobs_by_chat(chat_id, STATUS_LIST_LIMIT) {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "failed to list jobs for /status");
                return COMPLETION_APOLOGY.to_string();
            }
        };

        if jobs.is_empty() {
            return "You have no jobs yet.".to_string();
        }

        let mut by_status: Vec<(JobStatus, Vec<&Job>)> = Vec::new();
        for status in [JobStatus::Running, JobStatus::Pending, JobStatus::Completed, JobStatus::Failed] {
            let matching: Vec<&Job> = jobs.iter().filter(|j| j.status == status).collect();
            if !matching.is_empty() {
                by_status.push((status, matching));
            }
        }

        let mut out = String::new();
        for (status, jobs) in by_status {
            out.push_str(&format!("{}:\n", String::from(status)));
            for job in jobs {
                out.push_str(&format!("  {} - {}\n", &job.id[..8], truncate_preview(&job.input, 60)));
            }
        }
        out
    }

    fn handle_get(&self, prefix: &str) -> String {
        let job = match self.store.find_job_by_id_prefix(prefix) {
            Ok(Some(job)) => job,
            Ok(None) => return format!("No job found matching `{prefix}`."),
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve job prefix");
                return COMPLETION_APOLOGY.to_string();
            }
        };

        if job.status != JobStatus::Completed {
            return format!("Job `{prefix}` is {}, not completed yet.", String::from(job.status));
        }

        let output = job.output.unwrap_or_default();
        truncate_output(&output)
    }

    async fn handle_retry(&self, chat_id: i64, prefix: &str) -> String {
        let job = match self.store.find_job_by_id_prefix(prefix) {
            Ok(Some(job)) => job,
            Ok(None) => return format!("No job found matching `{prefix}`."),
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve job prefix for retry");
                return COMPLETION_APOLOGY.to_string();
            }
        };

        if job.status != JobStatus::Failed {
            return format!("Job `{prefix}` is {}, not failed.", String::from(job.status));
        }

        match self.store.create_job(JobType::Task, job.input.clone(), chat_id, None) {
            Ok(new_job) => format!("Got it \u{2713} Job ID: `{}`. Send /status to track progress.", &new_job.id[..8]),
            Err(e) => {
                tracing::error!(error = %e, "failed to create retry job");
                COMPLETION_APOLOGY.to_string()
            }
        }
    }
}

/// The largest byte offset `<= limit` that lands on a char boundary.
/// `input`/`output` are unbounded, LLM-authored UTF-8 — an em-dash, curly
/// quote, or emoji can straddle a raw byte offset, so truncation must never
/// slice mid-codepoint.
fn floor_char_boundary(text: &str, limit: usize) -> usize {
    if limit >= text.len() {
        return text.len();
    }
    (0..=limit).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

fn truncate_preview(text: &str, limit: usize) -> String {
    if text.len() <= limit { text.to_string() } else { format!("{}...", &text[..floor_char_boundary(text, limit)]) }
}

fn truncate_output(text: &str) -> String {
    if text.len() <= GET_TRUNCATE_LIMIT {
        text.to_string()
    } else {
        format!("{}... (truncated)", &text[..floor_char_boundary(text, GET_TRUNCATE_LIMIT)])
    }
}
