//! Operator notifications.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Client;
use serde_json::json;
use shortdraft_models::{ErrorDescriptor, OutputLocations};
use shortdraft_storage::parse_retry_after;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};
use crate::retry::{invoke, RetryPolicy};

const SERVICE: &str = "slack";
const WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";
const MAX_MESSAGE_CHARS: usize = 40_000;
/// Operators read timestamps in JST.
const OPERATOR_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Fire-and-forget message sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> WorkerResult<()>;
}

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, message: &str) -> WorkerResult<()> {
        debug!(chars = message.chars().count(), "Notifications disabled, dropping message");
        Ok(())
    }
}

/// Slack incoming-webhook notifier.
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    policy: RetryPolicy,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, policy: RetryPolicy) -> WorkerResult<Self> {
        let webhook_url = webhook_url.into();
        if !webhook_url.starts_with(WEBHOOK_PREFIX) {
            return Err(WorkerError::config_error(format!(
                "Slack webhook URL must start with {}",
                WEBHOOK_PREFIX
            )));
        }
        Self::with_endpoint(webhook_url, policy)
    }

    fn with_endpoint(webhook_url: String, policy: RetryPolicy) -> WorkerResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            webhook_url,
            policy: policy.named("slack.send"),
        })
    }

    async fn post_once(&self, message: &str) -> WorkerResult<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let retry_after = parse_retry_after(response.headers()).map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::from_status(SERVICE, status.as_u16(), body, retry_after));
        }
        Ok(())
    }
}

fn validate_message(message: &str) -> WorkerResult<()> {
    if message.trim().is_empty() {
        return Err(WorkerError::notification_failed("message is empty"));
    }
    let chars = message.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(WorkerError::notification_failed(format!(
            "message has {} characters, limit is {}",
            chars, MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &str) -> WorkerResult<()> {
        validate_message(message)?;
        invoke(&self.policy, || self.post_once(message)).await
    }
}

/// Current time in the operators' timezone.
pub fn operator_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(OPERATOR_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

fn stamp(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn start_message(item_name: &str, at: &DateTime<FixedOffset>) -> String {
    format!("🎬 Processing started: {}\nStarted at: {}", item_name, stamp(at))
}

pub fn success_message(
    item_name: &str,
    elapsed: Duration,
    outputs: &OutputLocations,
    at: &DateTime<FixedOffset>,
) -> String {
    format!(
        "✅ Processing finished: {}\nElapsed: {:.1}s\nFinished at: {}\nDraft: {}\nSubtitle: {}\nVideo: {}",
        item_name,
        elapsed.as_secs_f64(),
        stamp(at),
        outputs.draft,
        outputs.subtitle,
        outputs.video
    )
}

pub fn failure_message(
    item_name: &str,
    elapsed: Duration,
    error: &ErrorDescriptor,
    at: &DateTime<FixedOffset>,
) -> String {
    let mut message = format!(
        "❌ Processing failed: {}\nElapsed: {:.1}s\nFailed at: {}\nError: {}",
        item_name,
        elapsed.as_secs_f64(),
        stamp(at),
        error
    );
    if let Some(cause) = error.chain.last() {
        message.push_str(&format!("\nCause: {}", cause));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> SlackNotifier {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));
        SlackNotifier::with_endpoint(format!("{}/hook", server.uri()), policy).unwrap()
    }

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 18, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_non_slack_url() {
        let err = SlackNotifier::new("https://example.com/hook", RetryPolicy::default())
            .err()
            .unwrap();
        assert!(matches!(err, WorkerError::ConfigError(_)));
        assert!(SlackNotifier::new("https://hooks.slack.com/services/x", RetryPolicy::default()).is_ok());
    }

    #[tokio::test]
    async fn test_send_posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_messages_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let slack = notifier(&server);
        assert!(slack.send("   ").await.is_err());
        assert!(slack.send(&"x".repeat(MAX_MESSAGE_CHARS + 1)).await.is_err());
    }

    #[test]
    fn test_message_formats() {
        assert_eq!(
            start_message("talk.mp4", &at()),
            "🎬 Processing started: talk.mp4\nStarted at: 2024-05-01 18:00:00"
        );

        let outputs = OutputLocations {
            draft: "https://d/draft".into(),
            subtitle: "https://d/srt".into(),
            video: "https://d/video".into(),
            transcript: "https://d/json".into(),
        };
        let success = success_message("talk.mp4", Duration::from_millis(12_340), &outputs, &at());
        assert!(success.contains("Elapsed: 12.3s"));
        assert!(success.contains("Draft: https://d/draft"));
        assert!(success.contains("Video: https://d/video"));

        let mut error = ErrorDescriptor::new("transcribe", "Transcription failed: boom");
        error.chain.push("root cause".into());
        let failure = failure_message("talk.mp4", Duration::from_secs(3), &error, &at());
        assert!(failure.contains("Error: transcribe: Transcription failed: boom"));
        assert!(failure.ends_with("Cause: root cause"));
    }

    #[test]
    fn test_operator_now_is_utc_plus_nine() {
        assert_eq!(operator_now().offset().local_minus_utc(), 9 * 3600);
    }
}
