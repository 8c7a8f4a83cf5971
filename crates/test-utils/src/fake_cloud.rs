//! In-process stand-in for the deployment-tracking service.
//!
//! Serves `POST`/`GET /v1/deployments/{org}/{run}/events` on `127.0.0.1:0`,
//! checks the bearer token and rejects events that arrive out of order for
//! a stack.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use stackrun::cloud::{CloudEvent, EventAck, EventsResponse};
use stackrun::types::LifecycleState;
use tokio::sync::oneshot;

type RunKey = (String, String);

#[derive(Default)]
struct Recorded {
    /// (org, run) -> stack id -> states in arrival order.
    events: HashMap<RunKey, BTreeMap<String, Vec<LifecycleState>>>,
    /// (org, run) -> stack id -> last accepted position.
    positions: HashMap<RunKey, HashMap<String, usize>>,
    posts: usize,
}

#[derive(Clone)]
struct ServerState {
    token: Arc<String>,
    recorded: Arc<Mutex<Recorded>>,
    fail_next_posts: Arc<AtomicUsize>,
    stall_posts: Arc<AtomicBool>,
}

pub struct FakeCloud {
    base_url: String,
    state: ServerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for FakeCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeCloud")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FakeCloud {
    /// Start a server accepting `token` as the only valid bearer token.
    pub async fn start(token: &str) -> anyhow::Result<Self> {
        let state = ServerState {
            token: Arc::new(token.to_string()),
            recorded: Arc::new(Mutex::new(Recorded::default())),
            fail_next_posts: Arc::new(AtomicUsize::new(0)),
            stall_posts: Arc::new(AtomicBool::new(false)),
        };

        let app = Router::new()
            .route(
                "/v1/deployments/:org/:run/events",
                get(list_events).post(create_event),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let base_url = format!("http://{addr}");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Ok(Self {
            base_url,
            state,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    /// e.g. `http://127.0.0.1:12345`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Recorded states per stack id for a run.
    pub fn events(&self, org: &str, run: &str) -> BTreeMap<String, Vec<LifecycleState>> {
        let recorded = self.state.recorded.lock().unwrap();
        recorded
            .events
            .get(&(org.to_string(), run.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of POST requests seen, including rejected ones.
    pub fn post_count(&self) -> usize {
        self.state.recorded.lock().unwrap().posts
    }

    /// Answer the next `n` POSTs with 503.
    pub fn fail_next_posts(&self, n: usize) {
        self.state.fail_next_posts.store(n, Ordering::SeqCst);
    }

    /// Accept POSTs but never answer them.
    pub fn stall_posts(&self) {
        self.state.stall_posts.store(true, Ordering::SeqCst);
    }

    /// Store a sequence verbatim, bypassing every check.
    pub fn seed_raw(&self, org: &str, run: &str, stack_id: &str, states: Vec<LifecycleState>) {
        let mut recorded = self.state.recorded.lock().unwrap();
        recorded
            .events
            .entry((org.to_string(), run.to_string()))
            .or_default()
            .insert(stack_id.to_string(), states);
    }
}

impl Drop for FakeCloud {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn authorized(state: &ServerState, headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|t| t == state.token.as_str())
}

async fn create_event(
    State(state): State<ServerState>,
    Path((org, run)): Path<(String, String)>,
    headers: HeaderMap,
    Json(event): Json<CloudEvent>,
) -> Response {
    if state.stall_posts.load(Ordering::SeqCst) {
        state.recorded.lock().unwrap().posts += 1;
        std::future::pending::<()>().await;
    }

    let mut recorded = state.recorded.lock().unwrap();
    recorded.posts += 1;

    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    let pending_failures = state.fail_next_posts.load(Ordering::SeqCst);
    if pending_failures > 0 {
        state
            .fail_next_posts
            .store(pending_failures - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
    }

    if event.run_id != run {
        return (StatusCode::BAD_REQUEST, "run id mismatch").into_response();
    }

    let key = (org, run);
    let last = recorded
        .positions
        .entry(key.clone())
        .or_default()
        .get(&event.stack_id)
        .copied();
    if last.is_some_and(|last| event.position <= last) {
        return (StatusCode::CONFLICT, "event out of order").into_response();
    }

    recorded
        .positions
        .entry(key.clone())
        .or_default()
        .insert(event.stack_id.clone(), event.position);
    recorded
        .events
        .entry(key)
        .or_default()
        .entry(event.stack_id.clone())
        .or_default()
        .push(event.state);

    Json(EventAck {
        stack_id: event.stack_id,
        position: event.position,
    })
    .into_response()
}

async fn list_events(
    State(state): State<ServerState>,
    Path((org, run)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    let recorded = state.recorded.lock().unwrap();
    let events = recorded
        .events
        .get(&(org, run))
        .cloned()
        .unwrap_or_default();
    Json(EventsResponse(events)).into_response()
}
