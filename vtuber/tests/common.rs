//! Common utilities for integration tests
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use llm_core::{AnswerSource, ByteStream, ChatRequest, StreamError};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tts_core::{SpeechDispatcher, SpeechEngine, SpeechSettings, Utterance, UtteranceReporter, Voice};
use vtuber::{ConversationController, Message, Motion, MotionActuator, StreamConsumer};

enum Reply {
    Stream(mpsc::UnboundedReceiver<Result<Bytes, StreamError>>),
    Refuse(StreamError),
}

/// Answer source whose bodies are fed by the test, chunk by chunk.
#[derive(Default)]
pub struct GatedSource {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

/// Test side of one scripted body.
pub struct Gate {
    tx: mpsc::UnboundedSender<Result<Bytes, StreamError>>,
}

impl Gate {
    pub fn push(&self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        let _ = self.tx.send(Ok(Bytes::copy_from_slice(bytes)));
    }

    /// Break the body with a read error.
    pub fn fail(self, reason: &str) {
        let _ = self.tx.send(Err(StreamError::Body(reason.to_string())));
    }

    /// End the body normally.
    pub fn finish(self) {}
}

impl GatedSource {
    /// Script the body of the next request.
    pub fn next_body(&self) -> Gate {
        let (tx, rx) = mpsc::unbounded_channel();
        self.replies.lock().unwrap().push_back(Reply::Stream(rx));
        Gate { tx }
    }

    /// Make the next request fail before any body arrives.
    pub fn refuse_next(&self, error: StreamError) {
        self.replies.lock().unwrap().push_back(Reply::Refuse(error));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerSource for GatedSource {
    async fn open(&self, request: ChatRequest) -> Result<ByteStream, StreamError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Stream(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(Reply::Refuse(error)) => Err(error),
            None => Err(StreamError::MissingBody),
        }
    }
}

/// Speech engine that records what it was asked to say.
#[derive(Default)]
pub struct RecordingEngine {
    spoken: Mutex<Vec<String>>,
}

impl RecordingEngine {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for RecordingEngine {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Google 한국의", "ko-KR")]
    }

    fn submit(&self, utterance: Utterance, reporter: UtteranceReporter) {
        reporter.started();
        self.spoken.lock().unwrap().push(utterance.text);
        reporter.finished();
    }
}

#[derive(Default)]
pub struct RecordingActuator {
    motions: Mutex<Vec<Motion>>,
}

impl RecordingActuator {
    pub fn motions(&self) -> Vec<Motion> {
        self.motions.lock().unwrap().clone()
    }
}

impl MotionActuator for RecordingActuator {
    fn play(&self, motion: Motion) {
        self.motions.lock().unwrap().push(motion);
    }

    fn set_audio_active(&self, _active: bool) {}
}

pub struct Harness {
    pub controller: ConversationController,
    pub source: Arc<GatedSource>,
    pub engine: Arc<RecordingEngine>,
    pub actuator: Arc<RecordingActuator>,
}

pub fn harness() -> Harness {
    harness_with(None)
}

pub fn harness_with(completion_motion: Option<Motion>) -> Harness {
    let source = Arc::new(GatedSource::default());
    let (controller, engine, actuator) = build_controller(source.clone(), completion_motion);
    Harness {
        controller,
        source,
        engine,
        actuator,
    }
}

pub fn build_controller(
    source: Arc<dyn AnswerSource>,
    completion_motion: Option<Motion>,
) -> (ConversationController, Arc<RecordingEngine>, Arc<RecordingActuator>) {
    let engine = Arc::new(RecordingEngine::default());
    let actuator = Arc::new(RecordingActuator::default());
    let dispatcher = SpeechDispatcher::new(engine.clone(), SpeechSettings::default());
    let controller = ConversationController::new(
        StreamConsumer::new(source, dispatcher),
        actuator.clone(),
        completion_motion,
    );
    (controller, engine, actuator)
}

impl Harness {
    /// Wait until the last message matches, failing after two seconds.
    pub async fn wait_for_last<F>(&self, mut check: F) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        for _ in 0..400 {
            if let Some(last) = self.controller.transcript().last() {
                if check(last) {
                    return last.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transcript never reached the expected state: {:?}", self.controller.transcript());
    }
}

/// What the HTTP backend saw in one request.
#[derive(Debug, Clone, Default)]
pub struct Received {
    pub question: Option<String>,
    /// (file name, content type) for every `file` field.
    pub files: Vec<(String, String)>,
}

#[derive(Clone)]
struct BackendState {
    status: StatusCode,
    chunks: Vec<Vec<u8>>,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct TestBackend {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Received>>>,
}

impl TestBackend {
    pub fn url(&self) -> String {
        format!("http://{}/chat", self.addr)
    }

    pub fn requests(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn chat(State(state): State<BackendState>, mut multipart: Multipart) -> Response {
    let mut received = Received::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        match name.as_str() {
            "question" => received.question = Some(String::from_utf8(bytes.to_vec()).unwrap()),
            "file" => received.files.push((file_name, content_type)),
            _ => {}
        }
    }
    state.received.lock().unwrap().push(received);

    if !state.status.is_success() {
        return (state.status, "backend exploded").into_response();
    }

    let body = stream::iter(state.chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, std::io::Error>(chunk)
    });
    Body::from_stream(body).into_response()
}

/// Start a backend answering every question with `parts`.
pub async fn spawn_backend(status: StatusCode, parts: &[&str]) -> TestBackend {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        status,
        chunks: parts.iter().map(|p| p.as_bytes().to_vec()).collect(),
        received: received.clone(),
    };
    let app = Router::new().route("/chat", post(chat)).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestBackend { addr, received }
}
