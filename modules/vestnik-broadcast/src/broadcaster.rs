//! Rate-paced delivery with per-recipient error classification (SPEC_FULL.md §4.13).

use std::time::Duration;

use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::Bot;
use tracing::{info, warn};
use vestnik_common::error::Result;
use vestnik_store::{Store, SubscriberRow};

use crate::outcome::{classify_error, DeliveryOutcome};

const DEFAULT_MESSAGES_PER_SECOND: f64 = 15.0;

/// Outcome of one full broadcast pass.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
    pub deactivated: u32,
}

pub struct Broadcaster {
    bot: Bot,
    delay: Duration,
    admin_chat_id: Option<i64>,
}

impl Broadcaster {
    pub fn new(bot: Bot, admin_chat_id: Option<i64>) -> Self {
        Self::with_rate(bot, admin_chat_id, DEFAULT_MESSAGES_PER_SECOND)
    }

    pub fn with_rate(bot: Bot, admin_chat_id: Option<i64>, messages_per_second: f64) -> Self {
        Self {
            bot,
            delay: Duration::from_secs_f64(1.0 / messages_per_second),
            admin_chat_id,
        }
    }

    /// Delivers `text` to every active subscriber in `store`, deactivating
    /// recipients the chat provider reports as blocked/gone. When `signal_id`
    /// is `Some`, the admin recipient (and only the admin) gets a 👍/👎
    /// feedback keyboard carrying that id.
    pub async fn broadcast(&self, store: &Store, text: &str, signal_id: Option<i64>) -> Result<BroadcastReport> {
        let subscribers = store.active_subscribers().await?;
        if subscribers.is_empty() {
            info!("broadcast_no_subscribers");
            return Ok(BroadcastReport::default());
        }

        let mut report = BroadcastReport::default();
        let mut to_deactivate: Vec<i64> = Vec::new();

        for subscriber in &subscribers {
            let keyboard = signal_id.filter(|_| Some(subscriber.chat_id) == self.admin_chat_id).map(|id| feedback_keyboard(id));

            match self.send_once(subscriber, text, keyboard.clone()).await {
                Ok(()) => report.sent += 1,
                Err(outcome) => self.handle_failure(subscriber, text, keyboard, outcome, &mut report, &mut to_deactivate).await,
            }

            tokio::time::sleep(self.delay).await;
        }

        for chat_id in &to_deactivate {
            store.deactivate(*chat_id).await?;
        }
        report.deactivated = to_deactivate.len() as u32;

        info!(sent = report.sent, failed = report.failed, deactivated = report.deactivated, "broadcast_complete");
        Ok(report)
    }

    async fn send_once(
        &self,
        subscriber: &SubscriberRow,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> std::result::Result<(), teloxide::RequestError> {
        let mut request = self.bot.send_message(ChatId(subscriber.chat_id), text).disable_web_page_preview(true);
        if let Some(markup) = keyboard {
            request = request.reply_markup(markup);
        }
        request.await.map(|_| ())
    }

    async fn handle_failure(
        &self,
        subscriber: &SubscriberRow,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
        err: teloxide::RequestError,
        report: &mut BroadcastReport,
        to_deactivate: &mut Vec<i64>,
    ) {
        match classify_error(&err) {
            DeliveryOutcome::Forbidden | DeliveryOutcome::NotFound => {
                to_deactivate.push(subscriber.chat_id);
                report.failed += 1;
            }
            DeliveryOutcome::FloodWait(secs) => {
                warn!(chat_id = subscriber.chat_id, seconds = secs, "broadcast_flood_wait");
                tokio::time::sleep(Duration::from_secs(secs)).await;
                match self.send_once(subscriber, text, keyboard).await {
                    Ok(()) => report.sent += 1,
                    Err(_) => report.failed += 1,
                }
            }
            DeliveryOutcome::Other(msg) => {
                warn!(chat_id = subscriber.chat_id, error = %msg, "broadcast_error");
                report.failed += 1;
            }
            DeliveryOutcome::Sent => unreachable!("classify_error never returns Sent"),
        }
    }
}

fn feedback_keyboard(signal_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("👍", format!("fb1:good:{signal_id}")),
        InlineKeyboardButton::callback("👎", format!("fb1:bad:{signal_id}")),
    ]])
}

