// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::SupportError;
use crate::support::config::ServerSettings;
use crate::support::service::{SupportResponse, SupportService};
use crate::support::workflow::WorkflowEvent;

type AppState = Arc<SupportService>;

pub fn router(service: Arc<SupportService>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(service)
}

pub async fn serve(
    service: Arc<SupportService>,
    settings: &ServerSettings,
) -> Result<(), SupportError> {
    let app = router(service, &settings.allowed_origins);

    let listener = bind(settings).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind the listener; `host` may be an IP address or a hostname
async fn bind(settings: &ServerSettings) -> Result<TcpListener, SupportError> {
    Ok(TcpListener::bind((settings.host.as_str(), settings.port)).await?)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

/// Maps service errors to status codes without echoing backend detail
struct ApiError(SupportError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SupportError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.0.public_message() }))).into_response()
    }
}

impl From<SupportError> for ApiError {
    fn from(err: SupportError) -> Self {
        Self(err)
    }
}

async fn chat(
    State(service): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<SupportResponse>, ApiError> {
    log::debug!("Received message: {}", payload.message);
    let answer = service.run_customer_support(&payload.message).await?;
    Ok(Json(answer))
}

async fn chat_stream(
    State(service): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();

    // client disconnect drops the stream, which drops this guard
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        let _ = service
            .run_customer_support_stream(&payload.message, &cancel, tx)
            .await;
    });

    let stream = ReceiverStream::new(rx).map(move |event: WorkflowEvent| {
        let _keep = &guard;
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::llm::CompletionClient;
    use crate::support::workflow::SupportWorkflow;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct ScriptedClient {
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        fn provider(&self) -> &str {
            "mock"
        }

        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            if self.fail {
                return Err(CompletionError::api("mock", "secret backend detail"));
            }
            if prompt.starts_with("Categorize") {
                Ok("Billing".to_string())
            } else if prompt.starts_with("Analyze the sentiment") {
                Ok("Positive".to_string())
            } else {
                Ok("Your receipt is in the billing portal.".to_string())
            }
        }
    }

    /// Sets its flag when dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Never answers; records when a pending call is abandoned
    #[derive(Default)]
    struct StalledClient {
        calls: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CompletionClient for StalledClient {
        fn provider(&self) -> &str {
            "stalled"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            let _flag = DropFlag(self.dropped.clone());
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn app(fail: bool) -> Router {
        let workflow = SupportWorkflow::new(Arc::new(ScriptedClient { fail }));
        let service = Arc::new(SupportService::new(Arc::new(workflow)));
        router(service, &["http://localhost:5173".to_string()])
    }

    fn chat_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn stream_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat/stream")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Collect the JSON payload of every `data:` line in an SSE body
    async fn sse_events(response: Response) -> Vec<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).unwrap())
            .collect()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(false)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_chat_success() {
        let response = app(false)
            .oneshot(chat_request(json!({ "message": "where can I find my receipt" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "category": "Billing",
                "sentiment": "Positive",
                "response": "Your receipt is in the billing portal."
            })
        );
    }

    #[tokio::test]
    async fn test_chat_blank_message_is_bad_request() {
        let response = app(false)
            .oneshot(chat_request(json!({ "message": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_failure_hides_backend_detail() {
        let response = app(true)
            .oneshot(chat_request(json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body["detail"]
            .as_str()
            .unwrap()
            .contains("secret backend detail"));
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app(false).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn test_chat_stream_emits_ordered_events() {
        let response = app(false)
            .oneshot(stream_request(json!({ "message": "where can I find my receipt" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let events = sse_events(response).await;
        assert_eq!(
            events,
            vec![
                json!({ "StageStarted": { "stage": "categorize" } }),
                json!({ "StageCompleted": { "stage": "categorize" } }),
                json!({ "StageStarted": { "stage": "analyze_sentiment" } }),
                json!({ "StageCompleted": { "stage": "analyze_sentiment" } }),
                json!({ "Routed": { "route": "billing", "stage": "handle_billing" } }),
                json!({ "StageStarted": { "stage": "handle_billing" } }),
                json!({ "StageCompleted": { "stage": "handle_billing" } }),
                json!({ "Completed": {
                    "category": "Billing",
                    "sentiment": "Positive",
                    "response": "Your receipt is in the billing portal.",
                    "route": "billing",
                    "stage": "handle_billing"
                } }),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_stream_blank_message_yields_error_event() {
        let response = app(false)
            .oneshot(stream_request(json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            sse_events(response).await,
            vec![json!({ "Error": "Empty message received" })]
        );
    }

    #[tokio::test]
    async fn test_dropping_chat_stream_cancels_run() {
        let client = StalledClient::default();
        let calls = client.calls.clone();
        let dropped = client.dropped.clone();
        let workflow = SupportWorkflow::new(Arc::new(client));
        let service = Arc::new(SupportService::new(Arc::new(workflow)));
        let app = router(service, &[]);

        let response = app
            .oneshot(stream_request(json!({ "message": "my modem is dead" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dropped.load(Ordering::SeqCst));

        drop(response);

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_bind_accepts_hostname() {
        let settings = ServerSettings {
            host: "localhost".to_string(),
            port: 0,
            allowed_origins: Vec::new(),
        };
        let listener = bind(&settings).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
