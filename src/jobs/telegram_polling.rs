// ==================== TELEGRAM LONG POLLING ====================
// Fetches updates, turns them into dialogue events and sends the replies.
// Events of one user run strictly in order; different users run concurrently.

use crate::{
    api::metrics,
    models::{InboundEvent, TelegramUpdate},
    services::{ConversationService, Notifier, TelegramClient},
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Polls Telegram forever. Poll failures are logged and retried.
pub async fn run_polling(
    client: TelegramClient,
    service: Arc<ConversationService>,
    poll_timeout_secs: u64,
) {
    log::info!("📡 Starting Telegram long polling (timeout {}s)", poll_timeout_secs);

    let mut offset = 0;

    loop {
        let updates = match client.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                log::error!("❌ getUpdates failed: {} (retrying in {:?})", e, RETRY_DELAY);
                sleep(RETRY_DELAY).await;
                continue;
            }
        };

        if let Some(last) = updates.last() {
            offset = last.update_id + 1;
        }

        if !updates.is_empty() {
            log::debug!("📥 Received {} updates", updates.len());
            dispatch_batch(&service, &client, updates).await;
        }
    }
}

/// Processes one batch of updates; returns how many became events
pub async fn dispatch_batch<N: Notifier>(
    service: &Arc<ConversationService>,
    notifier: &N,
    updates: Vec<TelegramUpdate>,
) -> usize {
    let groups = group_by_user(updates);
    let count = groups.iter().map(Vec::len).sum();

    join_all(
        groups
            .into_iter()
            .map(|events| process_user_events(Arc::clone(service), notifier, events)),
    )
    .await;

    count
}

/// Splits updates into per-user event lists, keeping arrival order in each
fn group_by_user(updates: Vec<TelegramUpdate>) -> Vec<Vec<InboundEvent>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<InboundEvent>> = Vec::new();

    for update in updates {
        metrics::increment_update_count();

        let Some(event) = update.message.as_ref().and_then(InboundEvent::from_message) else {
            log::debug!("⏭️  Skipping update {}", update.update_id);
            continue;
        };

        match index.get(&event.user_id) {
            Some(&i) => groups[i].push(event),
            None => {
                index.insert(event.user_id.clone(), groups.len());
                groups.push(vec![event]);
            }
        }
    }

    groups
}

async fn process_user_events<N: Notifier>(
    service: Arc<ConversationService>,
    notifier: &N,
    events: Vec<InboundEvent>,
) {
    for event in events {
        let step_service = Arc::clone(&service);
        let step_event = event.clone();

        // The dialogue step does blocking file I/O
        let result = tokio::task::spawn_blocking(move || step_service.handle(&step_event)).await;

        let replies = match result {
            Ok(Ok(replies)) => replies,
            Ok(Err(e)) => {
                metrics::increment_error_count();
                log::error!("❌ Failed to handle event from user {}: {}", event.user_id, e);
                continue;
            }
            Err(e) => {
                metrics::increment_error_count();
                log::error!("❌ Dialogue step for user {} panicked: {}", event.user_id, e);
                continue;
            }
        };

        for reply in &replies {
            log::debug!("📤 Reply to chat {}: {}", event.chat_id, reply.as_text());
            if let Err(e) = notifier.send(event.chat_id, reply).await {
                log::error!("❌ Failed to reply to chat {}: {}", event.chat_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::JsonStore;
    use crate::models::{
        ConversationState, Reply, TelegramChat, TelegramMessage, TelegramUser,
    };
    use crate::services::{MeterLedger, QrService, UserRegistry};
    use crate::utils::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, Reply)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: i64, reply: &Reply) -> Result<(), AppError> {
            self.sent.lock().unwrap().push((chat_id, reply.clone()));
            Ok(())
        }
    }

    impl RecordingNotifier {
        fn texts_for(&self, chat_id: i64) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id == chat_id)
                .map(|(_, reply)| reply.as_text().to_string())
                .collect()
        }
    }

    fn service(dir: &TempDir) -> Arc<ConversationService> {
        let store = JsonStore::new(dir.path());
        Arc::new(ConversationService::new(
            UserRegistry::new(store.clone()),
            MeterLedger::new(store),
            QrService::new("https://t.me/zapadny_bot", dir.path().join("qr.png")),
        ))
    }

    fn update(update_id: i64, user_id: i64, text: Option<&str>) -> TelegramUpdate {
        TelegramUpdate {
            update_id,
            message: Some(TelegramMessage {
                chat: TelegramChat { id: user_id },
                from: Some(TelegramUser {
                    id: user_id,
                    is_bot: false,
                    first_name: format!("User{}", user_id),
                    username: None,
                }),
                text: text.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_group_by_user_keeps_order() {
        let groups = group_by_user(vec![
            update(1, 10, Some("/start")),
            update(2, 20, Some("/start")),
            update(3, 10, Some("200")),
            update(4, 10, None),
            TelegramUpdate {
                update_id: 5,
                message: None,
            },
            update(6, 20, Some("/unknown")),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].user_id, "10");
        assert_eq!(groups[0][1].user_id, "10");
        assert_eq!(groups[1].len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_batch_runs_dialogues() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let notifier = RecordingNotifier::default();

        let processed = dispatch_batch(
            &service,
            &notifier,
            vec![
                update(1, 10, Some("/start")),
                update(2, 20, Some("/start")),
                update(3, 10, Some("200")),
                update(4, 20, Some("abc")),
                update(5, 10, Some("50 60")),
            ],
        )
        .await;

        assert_eq!(processed, 5);
        assert_eq!(service.state_of("10"), ConversationState::Idle);
        assert_eq!(service.state_of("20"), ConversationState::Register);

        let user_10 = notifier.texts_for(10);
        assert!(user_10[1].contains("Hi User10!"));
        assert!(user_10[2].contains("apartment number 200"));
        assert_eq!(user_10.last().unwrap(), "Thank you for using our bot!");

        let user_20 = notifier.texts_for(20);
        assert!(user_20.last().unwrap().contains("must be an integer"));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let notifier = RecordingNotifier::default();
        std::fs::write(dir.path().join("users.json"), "[broken").unwrap();

        dispatch_batch(
            &service,
            &notifier,
            vec![update(1, 10, Some("/start")), update(2, 10, Some("/help"))],
        )
        .await;

        let texts = notifier.texts_for(10);
        // /start fails on the corrupt registry, /help still answers
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("/start"));
        assert_eq!(service.state_of("10"), ConversationState::Idle);
    }
}
