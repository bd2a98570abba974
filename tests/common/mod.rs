#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use microtxn::application::orchestrator::OrchestratorHandle;
use microtxn::domain::order::{AppId, OrderId, PurchasePhase, TransactionId};
use microtxn::domain::ports::{Confirmed, InitPurchaseRequest, PurchaseApi};
use microtxn::error::ApiError;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend double answering from scripted replies and recording every call.
#[derive(Default)]
pub struct ScriptedApi {
    init_replies: Mutex<VecDeque<Result<TransactionId, ApiError>>>,
    finalize_replies: Mutex<VecDeque<Result<Confirmed, ApiError>>>,
    init_calls: Mutex<Vec<InitPurchaseRequest>>,
    finalize_calls: Mutex<Vec<(OrderId, AppId)>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_init(&self, reply: Result<TransactionId, ApiError>) {
        self.init_replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_finalize(&self, reply: Result<Confirmed, ApiError>) {
        self.finalize_replies.lock().unwrap().push_back(reply);
    }

    pub fn init_calls(&self) -> Vec<InitPurchaseRequest> {
        self.init_calls.lock().unwrap().clone()
    }

    pub fn finalize_calls(&self) -> Vec<(OrderId, AppId)> {
        self.finalize_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PurchaseApi for ScriptedApi {
    async fn init_purchase(
        &self,
        request: &InitPurchaseRequest,
    ) -> Result<TransactionId, ApiError> {
        self.init_calls.lock().unwrap().push(request.clone());
        self.init_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted init reply".to_string())))
    }

    async fn finalize_purchase(
        &self,
        order_id: OrderId,
        app_id: AppId,
    ) -> Result<Confirmed, ApiError> {
        self.finalize_calls.lock().unwrap().push((order_id, app_id));
        self.finalize_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted finalize reply".to_string())))
    }
}

/// Polls the orchestrator until it reaches `phase`.
pub async fn wait_for_phase(handle: &OrchestratorHandle, phase: PurchasePhase) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if handle.snapshot().await.unwrap().phase == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("orchestrator never reached {phase:?}"));
}

pub type Reply = (StatusCode, Value);

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    init: Reply,
    finalize: Reply,
    status: Reply,
}

/// Purchase-verification backend stub listening on an ephemeral local port.
pub struct StubBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubBackend {
    pub async fn start(init: Reply, finalize: Reply, status: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            requests: Arc::clone(&requests),
            init,
            finalize,
            status,
        };
        let app = Router::new()
            .route("/InitPurchase", post(init_purchase))
            .route("/FinalizePurchase", post(finalize_purchase))
            .route("/CheckPurchaseStatus", post(check_purchase_status))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// Requests received so far as `(endpoint, body)`.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

fn record(
    state: &StubState,
    endpoint: &str,
    body: Value,
    reply: &Reply,
) -> (StatusCode, Json<Value>) {
    state
        .requests
        .lock()
        .unwrap()
        .push((endpoint.to_string(), body));
    (reply.0, Json(reply.1.clone()))
}

async fn init_purchase(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, "InitPurchase", body, &state.init)
}

async fn finalize_purchase(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, "FinalizePurchase", body, &state.finalize)
}

async fn check_purchase_status(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, "CheckPurchaseStatus", body, &state.status)
}
