#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

/// What the mock endpoint saw in one multipart request.
#[derive(Debug, Clone, Default)]
pub struct Received {
    pub question: String,
    pub file: Option<(String, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = Arc<dyn Fn(&Received) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    responder: Responder,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct MockEndpoint {
    pub url: String,
    pub received: Arc<Mutex<Vec<Received>>>,
    handle: JoinHandle<()>,
}

impl MockEndpoint {
    pub fn requests(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves `POST /api/` on an ephemeral local port.
pub async fn spawn_endpoint(responder: impl Fn(&Received) -> Reply + Send + Sync + 'static) -> MockEndpoint {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock endpoint");
    let addr = listener.local_addr().expect("mock endpoint address");
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        responder: Arc::new(responder),
        received: received.clone(),
    };

    let app = Router::new().route("/api/", post(answer)).with_state(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock endpoint serves");
    });

    MockEndpoint {
        url: format!("http://{addr}/api/"),
        received,
        handle,
    }
}

/// An address nothing listens on.
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe port");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{addr}/api/")
}

async fn answer(State(state): State<MockState>, mut multipart: Multipart) -> (StatusCode, String) {
    let mut received = Received::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default();
        match name.as_str() {
            "question" => received.question = String::from_utf8_lossy(&data).into_owned(),
            "file" => received.file = Some((file_name.unwrap_or_default(), data.to_vec())),
            _ => {}
        }
    }

    let reply = (state.responder)(&received);
    state.received.lock().unwrap().push(received);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    (reply.status, reply.body)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Answers the built-in suite correctly.
pub fn standard_answers(received: &Received) -> Reply {
    let question = received.question.as_str();
    if question.contains("Wednesdays") {
        Reply::ok("1360\n")
    } else if question.starts_with("Sort this JSON array") {
        Reply::ok(
            r#"[{"age":30,"name":"Bob"},{"age":30,"name":"Dave"},{"age":55,"name":"Alice"},{"age":55,"name":"Charlie"}]"#,
        )
    } else if question.contains("extract.csv") {
        Reply::ok("test_answer")
    } else if question.contains("sha256sum") {
        let bytes = received.file.as_ref().map(|(_, bytes)| bytes.as_slice()).unwrap_or_default();
        Reply::ok(format!("{}  -\n", sha256_hex(bytes)))
    } else if question.contains("Google Sheets") {
        Reply::ok("360")
    } else if question.contains("key=value") {
        Reply::ok(" forty-two ")
    } else {
        Reply::status(StatusCode::BAD_REQUEST, "unrecognised question")
    }
}
