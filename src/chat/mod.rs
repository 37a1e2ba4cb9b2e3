//! Chat transport and the front door from chat to the rest of the engine:
//! `spec.md` §4.4.

pub mod command;
pub mod dispatcher;
pub mod telegram;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportFailure;

pub use command::Command;
pub use dispatcher::ChatDispatcher;
pub use telegram::TelegramGateway;

/// A message received from a chat transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub content: String,
}

/// Abstraction over a chat transport. One implementation (Telegram) ships by
/// default; additional transports implement the same trait.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, chat_id: i64, message: &str) -> Result<(), TransportFailure>;

    /// Begin receiving inbound messages, pushing each onto `tx`. Returns
    /// when the transport gives up (the caller is expected to reconnect at
    /// a higher level if desired).
    async fn listen(&self, tx: mpsc::Sender<InboundMessage>) -> Result<(), TransportFailure>;

    async fn health_check(&self) -> bool;

    /// Best-effort typing indicator. Failures are not surfaced; the default
    /// implementation does nothing.
    async fn send_typing_indicator(&self, _chat_id: i64) {}
}
