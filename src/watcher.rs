//! The poll loop.
//!
//! One cycle at a time: fetch, validate, interpret, decide, notify, sleep.
//! Every per-cycle failure is converted into an operator notification and
//! deduplicated; nothing short of cancellation stops the loop.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::api::StatusApi;
use crate::error::PollError;
use crate::notify::Notifier;
use crate::review::{self, Homework};

/// Time between poll cycles.
const RETRY_PERIOD: Duration = Duration::from_secs(600); // 10 minutes

/// Message sent when a poll returns no homework records.
const IDLE_MESSAGE: &str = "Статус не обновлён.";

/// What a successful cycle observed.
#[derive(Debug)]
enum CycleOutcome {
    /// The newest record, already interpreted into its operator message.
    Verdict(String),
    /// The service returned an empty homework list.
    Idle,
}

/// Dedup state carried between cycles.
///
/// Owned exclusively by the loop, initialized empty, never persisted.
/// Fields are updated only after a notification actually went out, so a
/// failed delivery is retried on the next cycle.
#[derive(Debug, Default)]
struct LoopState {
    /// Last verdict message successfully reported.
    last_status: String,
    /// Last error description successfully reported.
    last_error: String,
    /// Whether the current empty-list stretch has been reported.
    idle_reported: bool,
}

/// Polls the review-status API and notifies the chat on state changes.
pub struct ReviewWatcher {
    api: Arc<dyn StatusApi>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    cancel: CancellationToken,
    state: LoopState,
}

impl ReviewWatcher {
    /// Create a watcher. Call [`run`](Self::run) to start polling.
    pub fn new(
        api: Arc<dyn StatusApi>,
        notifier: Arc<dyn Notifier>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            notifier,
            poll_interval: RETRY_PERIOD,
            cancel,
            state: LoopState::default(),
        }
    }

    /// Override the poll interval (useful for testing).
    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the loop until the cancellation token is cancelled.
    ///
    /// The point-in-time marker is captured once here and reused for every
    /// fetch; the remote service decides what "new" means for a stable
    /// marker.
    pub async fn run(mut self) {
        let from_date = unix_now();
        tracing::info!(
            from_date,
            interval = ?self.poll_interval,
            "review watcher started"
        );

        loop {
            self.poll_once(from_date).await;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("review watcher cancelled");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Execute one poll cycle: fetch, interpret, apply the notification
    /// policy. Never fails; every error becomes a notification candidate.
    async fn poll_once(&mut self, from_date: u64) {
        match self.check_status(from_date).await {
            Ok(CycleOutcome::Verdict(message)) => {
                self.state.idle_reported = false;
                self.report_status(message).await;
            }
            Ok(CycleOutcome::Idle) => self.report_idle().await,
            Err(e) => self.report_error(e).await,
        }
    }

    /// Fetch and interpret the current review state of the newest homework.
    async fn check_status(&self, from_date: u64) -> Result<CycleOutcome, PollError> {
        let payload = self.api.fetch(from_date).await?;
        let records = review::homeworks(&payload)?;

        match records.first() {
            None => Ok(CycleOutcome::Idle),
            Some(raw) => {
                let homework = Homework::from_value(raw)?;
                Ok(CycleOutcome::Verdict(homework.status_message()))
            }
        }
    }

    /// Notify about a verdict message unless it was already reported.
    async fn report_status(&mut self, message: String) {
        if message == self.state.last_status {
            tracing::debug!("verdict unchanged: {}", message);
            return;
        }

        match self.notifier.deliver(&message).await {
            Ok(()) => self.state.last_status = message,
            // State stays untouched so the next cycle retries this message.
            Err(e) => tracing::error!("failed to deliver status notification: {}", e),
        }
    }

    /// Report an empty homework list once per idle stretch.
    async fn report_idle(&mut self) {
        if self.state.idle_reported {
            tracing::debug!("status still not updated");
            return;
        }

        match self.notifier.deliver(IDLE_MESSAGE).await {
            Ok(()) => self.state.idle_reported = true,
            Err(e) => tracing::error!("failed to deliver idle notification: {}", e),
        }
    }

    /// Report a cycle failure unless the same description was already
    /// reported and is presumably still active.
    async fn report_error(&mut self, error: PollError) {
        let description = error.to_string();
        tracing::error!("poll cycle failed: {}", description);

        if description == self.state.last_error {
            tracing::debug!("failure already reported, suppressing duplicate");
            return;
        }

        let message = format!("Сбой в работе программы: {description}");
        match self.notifier.deliver(&message).await {
            Ok(()) => self.state.last_error = description,
            Err(e) => tracing::error!("failed to deliver error notification: {}", e),
        }
    }
}

/// Seconds since the unix epoch.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::NotifyError;

    /// Serves a scripted sequence of fetch results; once the script is
    /// exhausted, every further poll sees an empty homework list.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<Value, PollError>>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<Value, PollError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl StatusApi for ScriptedApi {
        async fn fetch(&self, _from_date: u64) -> Result<Value, PollError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "homeworks": [] })))
        }
    }

    /// Records every delivered message; can be told to fail upcoming
    /// deliveries.
    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<String>>,
        failures_left: Mutex<u32>,
    }

    impl RecordingNotifier {
        fn failing_first(n: u32) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                failures_left: Mutex::new(n),
            }
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(NotifyError::Api {
                    description: "scripted failure".to_string(),
                });
            }
            drop(failures);

            self.delivered.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn approved(name: &str) -> Value {
        json!({ "homeworks": [{ "homework_name": name, "status": "approved" }] })
    }

    fn watcher(
        responses: Vec<Result<Value, PollError>>,
        notifier: Arc<RecordingNotifier>,
    ) -> ReviewWatcher {
        ReviewWatcher::new(
            Arc::new(ScriptedApi::new(responses)),
            notifier,
            CancellationToken::new(),
        )
    }

    // ==================== verdict dedup ====================

    #[tokio::test]
    async fn test_first_verdict_is_delivered_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut watcher = watcher(
            vec![Ok(approved("diplom1")), Ok(approved("diplom1"))],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        assert_eq!(
            notifier.delivered(),
            vec![
                "Изменился статус проверки работы \"diplom1\". \
                 Работа проверена: ревьюеру всё понравилось. Ура!"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_changed_verdict_is_delivered_again() {
        let notifier = Arc::new(RecordingNotifier::default());
        let reviewing =
            json!({ "homeworks": [{ "homework_name": "diplom1", "status": "reviewing" }] });
        let mut watcher = watcher(
            vec![Ok(reviewing), Ok(approved("diplom1"))],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        assert_eq!(notifier.delivered().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_next_cycle() {
        let notifier = Arc::new(RecordingNotifier::failing_first(1));
        let mut watcher = watcher(
            vec![Ok(approved("diplom1")), Ok(approved("diplom1"))],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        assert!(notifier.delivered().is_empty());
        assert_eq!(watcher.state.last_status, "");

        watcher.poll_once(0).await;
        assert_eq!(notifier.delivered().len(), 1);
    }

    // ==================== empty list ====================

    #[tokio::test]
    async fn test_empty_list_is_reported_once_per_stretch() {
        let notifier = Arc::new(RecordingNotifier::default());
        let empty = json!({ "homeworks": [] });
        let mut watcher = watcher(vec![Ok(empty.clone()), Ok(empty)], notifier.clone());

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        assert_eq!(notifier.delivered(), vec![IDLE_MESSAGE.to_string()]);
        assert_eq!(watcher.state.last_status, "");
    }

    #[tokio::test]
    async fn test_idle_report_rearms_after_a_verdict() {
        let notifier = Arc::new(RecordingNotifier::default());
        let empty = json!({ "homeworks": [] });
        let mut watcher = watcher(
            vec![Ok(empty.clone()), Ok(approved("diplom1")), Ok(empty)],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 3);
        assert_eq!(delivered[0], IDLE_MESSAGE);
        assert_eq!(delivered[2], IDLE_MESSAGE);
    }

    // ==================== error dedup ====================

    #[tokio::test]
    async fn test_repeated_error_is_reported_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bad = json!({ "homeworks": [{ "homework_name": "x", "status": "pending" }] });
        let mut watcher = watcher(
            vec![Ok(bad.clone()), Ok(bad.clone()), Ok(bad)],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        assert_eq!(
            notifier.delivered(),
            vec![
                "Сбой в работе программы: unknown homework status \"pending\"".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_distinct_errors_are_both_reported() {
        let notifier = Arc::new(RecordingNotifier::default());
        let unknown = json!({ "homeworks": [{ "homework_name": "x", "status": "pending" }] });
        let malformed = json!({ "lessons": [] });
        let mut watcher = watcher(vec![Ok(unknown), Ok(malformed)], notifier.clone());

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].contains("unknown homework status"));
        assert!(delivered[1].contains("malformed status payload"));
    }

    #[tokio::test]
    async fn test_failed_error_delivery_is_retried() {
        let notifier = Arc::new(RecordingNotifier::failing_first(1));
        let bad = json!({ "homeworks": [{ "homework_name": "x", "status": "pending" }] });
        let mut watcher = watcher(vec![Ok(bad.clone()), Ok(bad)], notifier.clone());

        watcher.poll_once(0).await;
        assert!(notifier.delivered().is_empty());
        assert_eq!(watcher.state.last_error, "");

        watcher.poll_once(0).await;
        assert_eq!(notifier.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_success_after_error_still_notifies_verdict() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut watcher = watcher(
            vec![
                Err(PollError::Decode {
                    reason: "EOF while parsing".to_string(),
                }),
                Ok(approved("diplom1")),
            ],
            notifier.clone(),
        );

        watcher.poll_once(0).await;
        watcher.poll_once(0).await;

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].starts_with("Сбой в работе программы:"));
        assert!(delivered[1].starts_with("Изменился статус"));
    }

    // ==================== cancellation ====================

    #[tokio::test]
    async fn test_run_stops_on_cancel_without_waiting_out_interval() {
        let notifier = Arc::new(RecordingNotifier::default());
        let cancel = CancellationToken::new();
        let watcher = ReviewWatcher::new(
            Arc::new(ScriptedApi::new(Vec::new())),
            notifier,
            cancel.clone(),
        )
        .with_poll_interval(Duration::from_secs(600));

        let task = tokio::spawn(watcher.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(result.is_ok(), "watcher task should finish after cancel");
    }
}
