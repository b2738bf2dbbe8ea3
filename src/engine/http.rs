use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use std::error::Error as _;
use std::future::Future;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::engine::cancel::cancelled;
use crate::engine::fixture::FixturePayload;
use crate::error::TransportError;

const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// Multipart body for one question.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub question: String,
    pub file: Option<FixturePayload>,
}

/// A single round trip to the endpoint, with no retry or timeout of its own.
pub trait Transport: Send + Sync + 'static {
    fn post(
        &self,
        request: &QuestionRequest,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

/// One client per run; its pool is shared by every worker.
pub fn build_client(concurrency: usize) -> Result<Client, String> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .pool_max_idle_per_host(concurrency.max(1))
        .user_agent(concat!("qaprobe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| format!("Failed to build HTTP client: {err}"))
}

impl Transport for HttpTransport {
    async fn post(&self, request: &QuestionRequest) -> Result<String, TransportError> {
        let mut form = Form::new().text("question", request.question.clone());
        if let Some(file) = &request.file {
            let part = Part::stream_with_length(file.bytes.clone(), file.bytes.len() as u64)
                .file_name(file.filename.clone())
                .mime_str("application/octet-stream")
                .map_err(|err| TransportError::Request(err.to_string()))?;
            form = form.part("file", part);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        if !status.is_success() {
            let capped = &bytes[..bytes.len().min(MAX_ERROR_BODY_BYTES)];
            return Err(TransportError::BadStatus {
                code: status.as_u16(),
                body: String::from_utf8_lossy(capped).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    // Only refused or dropped connections are transient; DNS and TLS failures are not.
    if is_connection_drop(err) {
        return TransportError::Unreachable(err.to_string());
    }
    TransportError::Request(err.to_string())
}

fn is_connection_drop(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            );
        }
        source = cause.source();
    }
    false
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

/// Exponential backoff applied to `Unreachable` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(exponent))
    }
}

pub struct Dispatcher<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends the question, bounding each round trip by `timeout`.
    pub async fn send(
        &self,
        request: &QuestionRequest,
        timeout: Duration,
        cancel_rx: &mut broadcast::Receiver<()>,
    ) -> Result<String, TransportError> {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = cancelled(cancel_rx) => return Err(TransportError::Cancelled),
                }
            }

            let started = Instant::now();
            let result = tokio::select! {
                res = tokio::time::timeout(timeout, self.transport.post(request)) => res,
                _ = cancelled(cancel_rx) => return Err(TransportError::Cancelled),
            };

            let err = match result {
                Ok(Ok(body)) => {
                    tracing::debug!(attempt, elapsed_ms = started.elapsed().as_millis() as u64, "answer received");
                    return Ok(body);
                }
                Ok(Err(err)) => err,
                Err(_) => return Err(TransportError::Timeout(timeout)),
            };

            if err.is_transient() && attempt < self.retry.max_retries {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    delay_ms = self.retry.delay_for(attempt).as_millis() as u64,
                    "{err}; retrying"
                );
                continue;
            }
            return Err(err);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::cancel::CancelSignal;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records when each attempt started.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, TransportError>>>,
        pub(crate) attempts: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: impl IntoIterator<Item = Result<String, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempt_gaps(&self) -> Vec<Duration> {
            let attempts = self.attempts.lock().unwrap();
            attempts.windows(2).map(|pair| pair[1] - pair[0]).collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn post(&self, _request: &QuestionRequest) -> Result<String, TransportError> {
            self.attempts.lock().unwrap().push(tokio::time::Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(TransportError::Request("script exhausted".to_string())))
        }
    }

    struct SlowTransport;

    impl Transport for SlowTransport {
        async fn post(&self, _request: &QuestionRequest) -> Result<String, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".to_string())
        }
    }

    fn request() -> QuestionRequest {
        QuestionRequest {
            question: "What is 2 + 2?".to_string(),
            file: None,
        }
    }

    fn refused() -> Result<String, TransportError> {
        Err(TransportError::Unreachable("connection refused".to_string()))
    }

    #[test]
    fn backoff_grows_by_factor() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_is_retried_twice_then_surfaces() {
        let signal = CancelSignal::new();
        let dispatcher = Dispatcher::new(ScriptedTransport::new([refused(), refused(), refused(), Ok("never".into())]));

        let result = dispatcher
            .send(&request(), Duration::from_secs(5), &mut signal.subscribe())
            .await;

        assert!(matches!(result, Err(TransportError::Unreachable(_))));
        assert_eq!(dispatcher.transport().attempts.lock().unwrap().len(), 3);
        let gaps = dispatcher.transport().attempt_gaps();
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0] >= Duration::from_millis(200) && gaps[0] < Duration::from_millis(250));
        assert!(gaps[1] >= Duration::from_millis(400) && gaps[1] < Duration::from_millis(450));
        assert!(gaps[1] > gaps[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_transient_failure_recovers() {
        let signal = CancelSignal::new();
        let dispatcher = Dispatcher::new(ScriptedTransport::new([refused(), Ok("4".into())]));

        let result = dispatcher
            .send(&request(), Duration::from_secs(5), &mut signal.subscribe())
            .await;

        assert_eq!(result, Ok("4".to_string()));
        assert_eq!(dispatcher.transport().attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_status_is_not_retried() {
        let signal = CancelSignal::new();
        let dispatcher = Dispatcher::new(ScriptedTransport::new([
            Err(TransportError::BadStatus {
                code: 500,
                body: "boom".to_string(),
            }),
            Ok("unused".into()),
        ]));

        let result = dispatcher
            .send(&request(), Duration::from_secs(5), &mut signal.subscribe())
            .await;

        assert!(matches!(result, Err(TransportError::BadStatus { code: 500, .. })));
        assert_eq!(dispatcher.transport().attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_retried() {
        let signal = CancelSignal::new();
        let dispatcher = Dispatcher::new(SlowTransport);

        let result = dispatcher
            .send(&request(), Duration::from_millis(250), &mut signal.subscribe())
            .await;

        assert_eq!(result, Err(TransportError::Timeout(Duration::from_millis(250))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_request() {
        let signal = CancelSignal::new();
        let dispatcher = Dispatcher::new(SlowTransport);
        let mut cancel_rx = signal.subscribe();

        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = dispatcher
            .send(&request(), Duration::from_secs(60), &mut cancel_rx)
            .await;
        assert_eq!(result, Err(TransportError::Cancelled));
    }
}
