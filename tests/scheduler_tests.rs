//! # Scheduler Tests
//!
//! Outbound queue behavior under a paused Tokio clock.

use async_trait::async_trait;
use order_intake::config::{BotConfig, PacingConfig};
use order_intake::error::SendError;
use order_intake::outbound::{Messenger, Outbound, OutboundPayload, SendCategory, SentMessageId};
use order_intake::scheduler::{OutboundScheduler, SentRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records deliveries; can be told to answer the first N sends with a rate-limit error
#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    rate_limited_sends: AtomicUsize,
}

impl RecordingMessenger {
    fn rate_limited(times: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            rate_limited_sends: AtomicUsize::new(times),
        }
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, customer_id: &str, payload: &OutboundPayload) -> Result<SentMessageId, SendError> {
        let remaining = self.rate_limited_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limited_sends.store(remaining - 1, Ordering::SeqCst);
            return Err(SendError::RateLimited("retry after 30".to_string()));
        }

        let text = payload.as_text();
        if text == "boom" {
            return Err(SendError::Transport("bad request".to_string()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push((customer_id.to_string(), text));
        Ok(format!("m{}", sent.len()))
    }
}

fn config(anti_abuse: bool) -> BotConfig {
    BotConfig {
        anti_abuse,
        pacing: PacingConfig::immediate(),
        ..BotConfig::default()
    }
}

fn texts(range: std::ops::Range<usize>) -> Vec<Outbound> {
    range
        .map(|i| Outbound::text(format!("msg {i}"), SendCategory::Text))
        .collect()
}

fn start(messenger: Arc<RecordingMessenger>, config: &BotConfig) -> Arc<OutboundScheduler> {
    let scheduler = Arc::new(OutboundScheduler::new(
        messenger,
        config,
        Arc::new(SentRegistry::new()),
    ));
    tokio::spawn(scheduler.clone().run());
    scheduler
}

#[tokio::test(start_paused = true)]
async fn test_sixteenth_message_is_deferred_not_dropped() {
    let messenger = Arc::new(RecordingMessenger::default());
    let scheduler = start(messenger.clone(), &config(true));

    scheduler.enqueue("a@telegram", texts(0..16));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(messenger.texts().len(), 15);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let sent = messenger.texts();
    assert_eq!(sent.len(), 16);
    assert_eq!(sent[15], "msg 15");
}

#[tokio::test(start_paused = true)]
async fn test_limited_customer_does_not_block_others() {
    let messenger = Arc::new(RecordingMessenger::default());
    let scheduler = start(messenger.clone(), &config(true));

    scheduler.enqueue("a@telegram", texts(0..17));
    scheduler.enqueue("b@telegram", texts(100..101));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let sent = messenger.sent.lock().unwrap().clone();
    assert!(sent.iter().any(|(customer, _)| customer == "b@telegram"));
    assert_eq!(sent.iter().filter(|(customer, _)| customer == "a@telegram").count(), 15);
    drop(sent);

    tokio::time::sleep(Duration::from_secs(65)).await;
    let a_texts: Vec<String> = messenger
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter(|(customer, _)| customer == "a@telegram")
        .map(|(_, text)| text.clone())
        .collect();
    let expected: Vec<String> = (0..17).map(|i| format!("msg {i}")).collect();
    assert_eq!(a_texts, expected);
}

#[tokio::test(start_paused = true)]
async fn test_transport_rate_limit_cools_down_and_retries() {
    let messenger = Arc::new(RecordingMessenger::rate_limited(1));
    let scheduler = start(messenger.clone(), &config(true));

    scheduler.enqueue("a@telegram", texts(0..2));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(messenger.texts().is_empty());

    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(messenger.texts(), vec!["msg 0", "msg 1"]);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_drop_only_that_message() {
    let messenger = Arc::new(RecordingMessenger::default());
    let scheduler = start(messenger.clone(), &config(false));

    scheduler.enqueue(
        "a@telegram",
        vec![
            Outbound::text("boom", SendCategory::Error),
            Outbound::text("ok", SendCategory::Text),
        ],
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(messenger.texts(), vec!["ok"]);
}

#[tokio::test(start_paused = true)]
async fn test_without_anti_abuse_everything_goes_out_and_is_registered() {
    let messenger = Arc::new(RecordingMessenger::default());
    let scheduler = start(messenger.clone(), &config(false));

    scheduler.enqueue("a@telegram", texts(0..30));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(messenger.texts().len(), 30);
    assert_eq!(scheduler.pending(), 0);
    assert!(scheduler.sent_registry().contains("m1"));
    assert!(scheduler.sent_registry().contains("m30"));
}
