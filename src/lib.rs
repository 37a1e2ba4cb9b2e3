//! peterbot's core orchestration engine: a durable job queue, a scheduler
//! that turns cron recurrences into jobs, an intent classifier that routes
//! chat messages between synchronous and asynchronous handling, and the
//! worker loop that executes queued jobs against a language model.
//!
//! See `SPEC_FULL.md` for the full behavioral specification; `DESIGN.md`
//! for how each module is grounded in the teacher codebase.

pub mod chat;
pub mod config;
pub mod configstore;
pub mod dashboard;
pub mod error;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod worker;

/// Convenience re-exports for the engine's main pieces.
pub mod prelude {
    pub use crate::chat::{ChatDispatcher, ChatGateway, Command, InboundMessage, TelegramGateway};
    pub use crate::config::AppConfig;
    pub use crate::configstore::ConfigStore;
    pub use crate::dashboard::DashboardState;
    pub use crate::error::EngineError;
    pub use crate::intent::{Intent, classify};
    pub use crate::llm::{Completion, GeminiCompletion};
    pub use crate::scheduler::Scheduler;
    pub use crate::store::JobStore;
    pub use crate::worker::Worker;
}
