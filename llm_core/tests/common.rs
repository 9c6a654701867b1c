//! In-process streaming backend for integration tests

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use futures::{stream, StreamExt};
use tokio::net::TcpListener;

/// What the backend saw in one request.
#[derive(Debug, Clone, Default)]
pub struct Received {
    pub question: Option<String>,
    /// (file name, content type, bytes) for every `file` field.
    pub files: Vec<(String, String, Vec<u8>)>,
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
        let bytes = field.bytes().await.unwrap().to_vec();
        match name.as_str() {
            "question" => received.question = Some(String::from_utf8(bytes).unwrap()),
            "file" => received.files.push((file_name, content_type, bytes)),
            _ => {}
        }
    }
    state.received.lock().unwrap().push(received);

    if !state.status.is_success() {
        return (state.status, "backend exploded").into_response();
    }
    if state.status == StatusCode::NO_CONTENT {
        return StatusCode::NO_CONTENT.into_response();
    }

    // Pause between chunks so they reach the client as separate reads.
    let body = stream::iter(state.chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        Ok::<_, std::io::Error>(chunk)
    });
    Body::from_stream(body).into_response()
}

/// Start a backend answering every question with `chunks`.
pub async fn spawn_backend(status: StatusCode, chunks: Vec<Vec<u8>>) -> TestBackend {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        status,
        chunks,
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

pub fn text_chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}
