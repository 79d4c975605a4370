//! Sequential batch delivery through a session.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::phone;
use crate::provider::ProviderError;
use crate::session::SessionManager;
use crate::status::StatusBus;

use super::pacing::PacingPolicy;

/// Topic for per-target progress events on the status bus.
pub const DISPATCH_PROGRESS_TOPIC: &str = "dispatch:progress";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("target list must not be empty")]
    NoTargets,

    #[error("message body must not be empty")]
    EmptyMessage,
}

/// One target the provider refused, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub target: String,
    pub error: String,
}

/// Full accounting of a dispatch job: every target lands in exactly one of
/// `sent` or `failed`, in input order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub job_id: String,
    pub sent: Vec<String>,
    pub failed: Vec<DispatchFailure>,
}

#[derive(Error, Debug)]
enum SendError {
    #[error("session not found: {0}")]
    NoSession(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Delivers message batches through a chosen session, one target at a time.
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    bus: Arc<StatusBus>,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>, bus: Arc<StatusBus>) -> Self {
        Self { sessions, bus }
    }

    /// Send `message` to every target through `session_id`'s client.
    ///
    /// Strictly sequential, best-effort per target: a refused send (or a
    /// missing/unlinked session) is recorded and the loop moves on. Pacing
    /// pauses apply between targets, never after the last one, and suspend
    /// only this job.
    pub async fn dispatch(
        &self,
        session_id: &str,
        targets: &[String],
        message: &str,
        pacing: PacingPolicy,
    ) -> Result<DispatchReport, DispatchError> {
        if targets.is_empty() {
            return Err(DispatchError::NoTargets);
        }
        if message.is_empty() {
            return Err(DispatchError::EmptyMessage);
        }

        let job_id = Uuid::new_v4().to_string();
        let mut report = DispatchReport {
            job_id: job_id.clone(),
            sent: Vec::new(),
            failed: Vec::new(),
        };
        log::info!(
            "dispatch {job_id}: {} target(s) through session {session_id}",
            targets.len()
        );

        for (index, target) in targets.iter().enumerate() {
            self.bus.publish(
                DISPATCH_PROGRESS_TOPIC,
                &json!({ "jobId": job_id, "target": target, "stage": "sending" }),
            );

            match self.send_one(session_id, target, message).await {
                Ok(()) => {
                    report.sent.push(target.clone());
                    self.bus.publish(
                        DISPATCH_PROGRESS_TOPIC,
                        &json!({ "jobId": job_id, "target": target, "stage": "sent" }),
                    );
                }
                Err(err) => {
                    let error = err.to_string();
                    log::debug!("dispatch {job_id}: send to {target} failed: {error}");
                    self.bus.publish(
                        DISPATCH_PROGRESS_TOPIC,
                        &json!({
                            "jobId": job_id,
                            "target": target,
                            "stage": "failed",
                            "error": error,
                        }),
                    );
                    report.failed.push(DispatchFailure {
                        target: target.clone(),
                        error,
                    });
                }
            }

            let pause = pacing.pause_after(index, targets.len());
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        log::info!(
            "dispatch {job_id}: {} sent, {} failed",
            report.sent.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// One send attempt. The session is looked up fresh each time so a
    /// session destroyed mid-job turns the remaining targets into
    /// individual failures instead of aborting the loop.
    async fn send_one(
        &self,
        session_id: &str,
        target: &str,
        body: &str,
    ) -> Result<(), SendError> {
        let client = self
            .sessions
            .client(session_id)
            .ok_or_else(|| SendError::NoSession(session_id.to_string()))?;
        let address = phone::canonical_address(target);
        client.send_message(&address, body).await?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::local::LocalProvider;
    use crate::provider::{ProviderEvent, ProviderFactory};
    use tempfile::{tempdir, TempDir};

    fn targets(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    async fn setup_linked(
        id: &str,
    ) -> (Arc<Dispatcher>, Arc<SessionManager>, Arc<LocalProvider>, Arc<StatusBus>, TempDir) {
        let provider = Arc::new(LocalProvider::new());
        let bus = Arc::new(StatusBus::new());
        let data_dir = tempdir().unwrap();
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&provider) as Arc<dyn ProviderFactory>,
            Arc::clone(&bus),
            data_dir.path().to_path_buf(),
        ));
        let mut events = bus.subscribe();
        sessions.create(id).unwrap();
        provider.emit(id, ProviderEvent::Ready);
        events.recv().await.unwrap();

        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&sessions), Arc::clone(&bus)));
        (dispatcher, sessions, provider, bus, data_dir)
    }

    mod validation {
        use super::*;

        #[tokio::test]
        async fn empty_target_list_is_rejected() {
            let (dispatcher, _sessions, _provider, _bus, _dir) = setup_linked("main").await;

            let result = dispatcher
                .dispatch("main", &[], "hello", PacingPolicy::default())
                .await;
            assert!(matches!(result, Err(DispatchError::NoTargets)));
        }

        #[tokio::test]
        async fn empty_message_is_rejected() {
            let (dispatcher, _sessions, _provider, _bus, _dir) = setup_linked("main").await;

            let result = dispatcher
                .dispatch("main", &targets(&["11987654321"]), "", PacingPolicy::default())
                .await;
            assert!(matches!(result, Err(DispatchError::EmptyMessage)));
        }
    }

    mod accounting {
        use super::*;

        #[tokio::test]
        async fn every_target_lands_in_exactly_one_list() {
            let (dispatcher, _sessions, provider, _bus, _dir) = setup_linked("main").await;
            provider.fail_sends_to("main", &phone::canonical_address("22222222222"), "blocked");

            let batch = targets(&["11111111111", "22222222222", "33333333333"]);
            let report = dispatcher
                .dispatch("main", &batch, "hello", PacingPolicy::default())
                .await
                .unwrap();

            assert_eq!(report.sent.len() + report.failed.len(), batch.len());
            assert_eq!(report.sent, targets(&["11111111111", "33333333333"]));
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].target, "22222222222");
            assert_eq!(report.failed[0].error, "provider rejected the message: blocked");
        }

        #[tokio::test]
        async fn targets_are_delivered_in_input_order_with_canonical_addresses() {
            let (dispatcher, _sessions, provider, _bus, _dir) = setup_linked("main").await;

            dispatcher
                .dispatch(
                    "main",
                    &targets(&["11987654321", "+55 21 91234-5678"]),
                    "hello",
                    PacingPolicy::default(),
                )
                .await
                .unwrap();

            let sent = provider.sent_messages("main");
            assert_eq!(sent[0].0, "5511987654321@c.us");
            assert_eq!(sent[1].0, "5521912345678@c.us");
            assert!(sent.iter().all(|(_, body)| body == "hello"));
        }

        #[tokio::test]
        async fn duplicate_targets_are_attempted_individually() {
            let (dispatcher, _sessions, provider, _bus, _dir) = setup_linked("main").await;

            let batch = targets(&["11987654321", "11987654321"]);
            let report = dispatcher
                .dispatch("main", &batch, "hello", PacingPolicy::default())
                .await
                .unwrap();

            assert_eq!(report.sent, batch);
            assert_eq!(provider.sent_messages("main").len(), 2);
        }

        #[tokio::test]
        async fn total_session_failure_fails_every_target_without_aborting() {
            let (dispatcher, _sessions, provider, _bus, _dir) = setup_linked("main").await;
            provider.emit("main", ProviderEvent::Disconnected);

            let batch = targets(&["11111111111", "22222222222"]);
            let report = dispatcher
                .dispatch("main", &batch, "hello", PacingPolicy::default())
                .await
                .unwrap();

            assert!(report.sent.is_empty());
            assert_eq!(report.failed.len(), 2);
            assert!(report
                .failed
                .iter()
                .all(|f| f.error == "session is not connected"));
        }

        #[tokio::test]
        async fn missing_session_fails_per_target_not_per_batch() {
            let provider = Arc::new(LocalProvider::new());
            let bus = Arc::new(StatusBus::new());
            let data_dir = tempdir().unwrap();
            let sessions = Arc::new(SessionManager::new(
                Arc::clone(&provider) as Arc<dyn ProviderFactory>,
                Arc::clone(&bus),
                data_dir.path().to_path_buf(),
            ));
            let dispatcher = Dispatcher::new(sessions, bus);

            let report = dispatcher
                .dispatch(
                    "ghost",
                    &targets(&["11111111111", "22222222222"]),
                    "hello",
                    PacingPolicy::default(),
                )
                .await
                .unwrap();

            assert!(report.sent.is_empty());
            assert_eq!(report.failed.len(), 2);
            assert!(report
                .failed
                .iter()
                .all(|f| f.error == "session not found: ghost"));
        }
    }

    mod progress_events {
        use super::*;

        #[tokio::test]
        async fn each_target_announces_sending_then_outcome() {
            let (dispatcher, _sessions, provider, bus, _dir) = setup_linked("main").await;
            provider.fail_sends_to("main", &phone::canonical_address("22222222222"), "blocked");
            let mut events = bus.subscribe();

            dispatcher
                .dispatch(
                    "main",
                    &targets(&["11111111111", "22222222222"]),
                    "hello",
                    PacingPolicy::default(),
                )
                .await
                .unwrap();

            let stages: Vec<(String, String)> = {
                let mut out = Vec::new();
                for _ in 0..4 {
                    let event = events.recv().await.unwrap();
                    assert_eq!(event.topic, DISPATCH_PROGRESS_TOPIC);
                    out.push((
                        event.payload["target"].as_str().unwrap().to_string(),
                        event.payload["stage"].as_str().unwrap().to_string(),
                    ));
                }
                out
            };

            assert_eq!(
                stages,
                vec![
                    ("11111111111".to_string(), "sending".to_string()),
                    ("11111111111".to_string(), "sent".to_string()),
                    ("22222222222".to_string(), "sending".to_string()),
                    ("22222222222".to_string(), "failed".to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn failure_events_carry_the_error() {
            let (dispatcher, _sessions, provider, bus, _dir) = setup_linked("main").await;
            provider.fail_sends("main", "blocked");
            let mut events = bus.subscribe();

            dispatcher
                .dispatch("main", &targets(&["11111111111"]), "hello", PacingPolicy::default())
                .await
                .unwrap();

            events.recv().await.unwrap(); // sending
            let failed = events.recv().await.unwrap();
            assert_eq!(failed.payload["stage"], "failed");
            assert_eq!(
                failed.payload["error"],
                "provider rejected the message: blocked"
            );
        }

        #[tokio::test]
        async fn events_within_a_job_share_one_job_id() {
            let (dispatcher, _sessions, _provider, bus, _dir) = setup_linked("main").await;
            let mut events = bus.subscribe();

            let report = dispatcher
                .dispatch(
                    "main",
                    &targets(&["11111111111", "22222222222"]),
                    "hello",
                    PacingPolicy::default(),
                )
                .await
                .unwrap();

            for _ in 0..4 {
                let event = events.recv().await.unwrap();
                assert_eq!(event.payload["jobId"], report.job_id.as_str());
            }
        }
    }

    mod pacing_behavior {
        use super::*;
        use std::time::Duration;

        #[tokio::test(start_paused = true)]
        async fn four_targets_suspend_for_exactly_eight_seconds() {
            let (dispatcher, _sessions, _provider, _bus, _dir) = setup_linked("main").await;
            let pacing = PacingPolicy {
                per_message_delay_seconds: 1,
                every_n_delay_count: 2,
                group_delay_seconds: 5,
            };

            let started = tokio::time::Instant::now();
            dispatcher
                .dispatch(
                    "main",
                    &targets(&["1", "2", "3", "4"]),
                    "hello",
                    pacing,
                )
                .await
                .unwrap();

            assert_eq!(started.elapsed(), Duration::from_secs(8));
        }

        #[tokio::test(start_paused = true)]
        async fn unpaced_batches_do_not_suspend() {
            let (dispatcher, _sessions, _provider, _bus, _dir) = setup_linked("main").await;

            let started = tokio::time::Instant::now();
            dispatcher
                .dispatch("main", &targets(&["1", "2", "3"]), "hello", PacingPolicy::default())
                .await
                .unwrap();

            assert_eq!(started.elapsed(), Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn destroy_mid_job_fails_remaining_targets_individually() {
            let (dispatcher, sessions, _provider, bus, _dir) = setup_linked("main").await;
            let mut events = bus.subscribe();
            let pacing = PacingPolicy {
                per_message_delay_seconds: 1,
                ..PacingPolicy::default()
            };

            let job = tokio::spawn({
                let dispatcher = Arc::clone(&dispatcher);
                let batch = targets(&["11111111111", "22222222222", "33333333333"]);
                async move { dispatcher.dispatch("main", &batch, "hello", pacing).await }
            });

            // Wait for the first target to go out, then pull the session.
            loop {
                let event = events.recv().await.unwrap();
                if event.payload["stage"] == "sent" {
                    break;
                }
            }
            sessions.destroy("main").await.unwrap();

            let report = job.await.unwrap().unwrap();
            assert_eq!(report.sent, targets(&["11111111111"]));
            assert_eq!(report.failed.len(), 2);
            assert!(report
                .failed
                .iter()
                .all(|f| f.error == "session not found: main"));
        }
    }
}
