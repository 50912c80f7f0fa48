//! The HTTP front-end.
//!
//! `POST /query` takes either raw statement text or a JSON envelope
//! (`statement`, `args`, `timeout_ms`) and streams the response as JSON
//! while rows flow: a `results` array first, then buffered warnings, the
//! first error if any, and the final status. `GET /health` is a liveness
//! probe.

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use quill_query::{Engine, Error, Request, RequestStatus, ResponseSink};
use quill_value::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct QueryEnvelope {
    statement: String,
    #[serde(default)]
    args: HashMap<String, Value>,
    timeout_ms: Option<u64>,
}

/// Raw text bodies are statements; JSON object bodies are envelopes.
fn request_from_body(body: &str) -> Request {
    if body.trim_start().starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<QueryEnvelope>(body) {
            return Request::new(envelope.statement)
                .with_args(envelope.args)
                .with_timeout(envelope.timeout_ms.map(Duration::from_millis));
        }
    }
    Request::new(body.to_string())
}

async fn query(State(state): State<AppState>, body: String) -> Response {
    let request = request_from_body(&body);
    debug!(id = %request.id, "query received");

    let (tx, rx) = mpsc::channel::<String>(64);
    let engine = state.engine.clone();
    tokio::spawn(async move {
        let mut sink = StreamingSink::new(tx);
        engine.execute(&request, &mut sink).await;
    });

    let stream = ReceiverStream::new(rx).map(Ok::<String, std::convert::Infallible>);
    Body::from_stream(stream).into_response()
}

/// Streams results as they arrive; warnings and the first error are held
/// back for the footer so the results array stays well-formed JSON.
struct StreamingSink {
    tx: mpsc::Sender<String>,
    rows: u64,
    warnings: Vec<Error>,
    error: Option<Error>,
}

impl StreamingSink {
    fn new(tx: mpsc::Sender<String>) -> Self {
        StreamingSink {
            tx,
            rows: 0,
            warnings: Vec::new(),
            error: None,
        }
    }

    async fn emit(&mut self, chunk: String) {
        let _ = self.tx.send(chunk).await;
    }
}

#[async_trait::async_trait]
impl ResponseSink for StreamingSink {
    async fn result(&mut self, value: Value) {
        let prefix = if self.rows == 0 {
            "{\n\"results\": [\n"
        } else {
            ",\n"
        };
        let row = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
        self.emit(format!("{}{}", prefix, row)).await;
        self.rows += 1;
    }

    async fn warning(&mut self, error: Error) {
        self.warnings.push(error);
    }

    async fn error(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    async fn complete(&mut self, status: RequestStatus) {
        let mut footer = String::new();
        if self.rows == 0 {
            footer.push_str("{\n\"results\": [\n");
        }
        footer.push_str("\n]");
        if !self.warnings.is_empty() {
            let warnings: Vec<String> = self.warnings.iter().map(|w| w.to_string()).collect();
            footer.push_str(",\n\"warnings\": ");
            footer.push_str(&serde_json::to_string(&warnings).unwrap_or_default());
        }
        if let Some(error) = &self.error {
            footer.push_str(",\n\"error\": ");
            footer.push_str(&serde_json::to_string(&error.to_string()).unwrap_or_default());
        }
        let status = match status {
            RequestStatus::Success => "success",
            RequestStatus::Errors => "errors",
            RequestStatus::Timeout => "timeout",
        };
        footer.push_str(&format!(",\n\"status\": \"{}\"\n}}\n", status));
        self.emit(footer).await;
    }
}
