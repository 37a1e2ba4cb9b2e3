//! Telegram transport, generalized from the teacher's `channels::telegram`
//! module: long-polling, exponential back-off, MarkdownV2 escaping, and
//! 4096-char message splitting.
//!
//! Unlike the teacher's multi-chat allow-list, authorization here is a
//! single dispatcher-level check against `AUTHORIZED_CHAT` (see
//! [`crate::chat::dispatcher::ChatDispatcher`]) rather than a silent drop at
//! the transport layer — every inbound message is forwarded, rejected or
//! not, so the caller always gets a reply.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, UpdateKind};

use super::{ChatGateway, InboundMessage};
use crate::error::TransportFailure;

const MAX_MESSAGE_LEN: usize = 4096;

/// Reserved MarkdownV2 characters that must be escaped outside of
/// pre-formatted regions.
const RESERVED_MARKDOWN_CHARS: &[char] =
    &['_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!'];

/// Escape `text` for Telegram's MarkdownV2 parse mode.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if RESERVED_MARKDOWN_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Split `text` into chunks of at most 4096 characters, preferring to break
/// on a paragraph, then line, then sentence, then word boundary.
pub fn split_message(text: &str) -> Vec<String> {
    if text.len() <= MAX_MESSAGE_LEN {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut remaining = text;

    while remaining.len() > MAX_MESSAGE_LEN {
        let chunk = &remaining[..MAX_MESSAGE_LEN];

        let split_at = find_split(chunk, "\n\n")
            .or_else(|| find_split(chunk, "\n"))
            .or_else(|| find_split(chunk, ". "))
            .or_else(|| find_split(chunk, " "))
            .unwrap_or(MAX_MESSAGE_LEN);

        parts.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        parts.push(remaining.to_string());
    }

    parts
}

fn find_split(chunk: &str, delimiter: &str) -> Option<usize> {
    chunk.rfind(delimiter).map(|i| i + delimiter.len())
}

/// Exponential back-off for reconnection attempts: `min(2^attempt, 60)`
/// seconds.
pub fn reconnect_backoff(attempt: u32) -> Duration {
    let secs = (1u64 << attempt.min(63)).min(60);
    Duration::from_secs(secs)
}

/// A [`ChatGateway`] backed by the Telegram Bot API.
pub struct TelegramGateway {
    bot: Bot,
    polling_timeout_secs: u32,
}

impl TelegramGateway {
    pub fn new(token: impl Into<String>) -> Self {
        Self { bot: Bot::new(token.into()), polling_timeout_secs: 30 }
    }

    fn describe_media(msg: &teloxide::types::Message) -> String {
        if msg.photo().is_some() {
            "[photo]".to_string()
        } else if let Some(doc) = msg.document() {
            format!("[document: {}]", doc.file_name.as_deref().unwrap_or("unknown"))
        } else if msg.voice().is_some() {
            "[voice message]".to_string()
        } else if msg.audio().is_some() {
            "[audio]".to_string()
        } else if msg.video().is_some() {
            "[video]".to_string()
        } else {
            "[unsupported message]".to_string()
        }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, chat_id: i64, message: &str) -> Result<(), TransportFailure> {
        for part in split_message(message) {
            let escaped = escape_markdown_v2(&part);
            self.bot
                .send_message(ChatId(chat_id), escaped)
                .parse_mode(ParseMode::MarkdownV2)
                .await
                .map_err(|e| TransportFailure(format!("telegram send error: {e}")))?;
        }
        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<InboundMessage>) -> Result<(), TransportFailure> {
        let mut attempt = 0u32;
        let mut offset: i32 = 0;

        loop {
            let result = self.bot.get_updates().offset(offset).timeout(self.polling_timeout_secs).await;

            match result {
                Ok(updates) => {
                    attempt = 0;
                    for update in updates {
                        offset = (update.id.0 as i32).saturating_add(1);

                        if let UpdateKind::Message(ref msg) = update.kind {
                            let chat_id = msg.chat.id.0;
                            let content = msg.text().map(str::to_string).unwrap_or_else(|| Self::describe_media(msg));

                            if tx.send(InboundMessage { chat_id, content }).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    if tx.is_closed() {
                        return Ok(());
                    }
                    tracing::warn!(attempt, error = %e, "telegram polling error");
                    let backoff = reconnect_backoff(attempt);
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.bot.get_me().await.is_ok()
    }

    async fn send_typing_indicator(&self, chat_id: i64) {
        use teloxide::types::ChatAction;
        let _ = self.bot.send_chat_action(ChatId(chat_id), ChatAction::Typing).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_dots_and_exclamation() {
        assert_eq!(escape_markdown_v2("3.14!"), r"3\.14\!");
    }

    #[test]
    fn escape_parentheses() {
        assert_eq!(escape_markdown_v2("(value)"), r"\(value\)");
    }

    #[test]
    fn short_message_is_not_split() {
        assert_eq!(split_message("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn long_message_splits_on_paragraph_boundary() {
        let para = "a".repeat(2000);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let parts = split_message(&text);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= MAX_MESSAGE_LEN);
        }
    }

    #[test]
    fn reconnect_backoff_caps_at_60_seconds() {
        assert_eq!(reconnect_backoff(0), Duration::from_secs(1));
        assert_eq!(reconnect_backoff(1), Duration::from_secs(2));
        assert_eq!(reconnect_backoff(10), Duration::from_secs(60));
    }
}
