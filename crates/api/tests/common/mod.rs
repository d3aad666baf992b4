#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use genflow_api::auth::jwt::{generate_access_token, JwtConfig};
use genflow_api::config::ServerConfig;
use genflow_api::router::build_app_router;
use genflow_api::state::AppState;
use genflow_api::ws::WsManager;
use genflow_db::MemoryJobStore;
use genflow_events::EventBus;
use genflow_pipeline::PipelineConfig;
use genflow_provider::{GenerationClient, StubGenerationClient};
use genflow_worker::runtime::StoreHandle;
use genflow_worker::{Runtime, StoreBackend, WorkerConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-long-enough";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    }
}

/// Test `ServerConfig`: dev CORS origin, 30-second request timeout, no
/// embedded processors (tests drive processors by hand).
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        embedded_workers: 0,
        jwt: jwt_config(),
    }
}

pub fn worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 1,
        poll_interval: std::time::Duration::from_millis(10),
        max_idle_backoff: std::time::Duration::from_millis(50),
        store_backend: StoreBackend::Memory,
        database_url: None,
    }
}

/// Application wired to an in-memory store and a stub provider.
pub struct TestApp {
    pub router: Router,
    pub runtime: Runtime,
    pub store: Arc<MemoryJobStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Arc::new(MemoryJobStore::new()), Arc::new(StubGenerationClient::new()))
    }

    pub fn with(store: Arc<MemoryJobStore>, client: Arc<dyn GenerationClient>) -> Self {
        let runtime = Runtime::assemble(
            StoreHandle::Memory(Arc::clone(&store)),
            client,
            &PipelineConfig::default(),
        );
        let state = AppState::new(
            &runtime,
            test_config(),
            Arc::new(WsManager::new()),
            Arc::new(EventBus::default()),
        );
        Self {
            router: build_app_router(state.clone()),
            runtime,
            store,
            state,
        }
    }

    /// Run one processor cycle.
    pub async fn process_one(&self) {
        self.runtime
            .processor("test-worker", &worker_config())
            .run_once()
            .await
            .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, owner_id: Option<i64>) -> Response<Body> {
        self.send(request(Method::GET, uri, owner_id, None)).await
    }

    pub async fn delete(&self, uri: &str, owner_id: i64) -> Response<Body> {
        self.send(request(Method::DELETE, uri, Some(owner_id), None))
            .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        owner_id: Option<i64>,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.send(request(Method::POST, uri, owner_id, Some(body.to_string())))
            .await
    }

    /// `POST /api/generate` as `owner_id`, returning the new job id.
    pub async fn create_job(&self, owner_id: i64, body: serde_json::Value) -> i64 {
        let response = self.post_json("/api/generate", Some(owner_id), body).await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let json = body_json(response).await;
        json["data"]["jobId"].as_i64().unwrap()
    }
}

pub fn token_for(owner_id: i64) -> String {
    generate_access_token(owner_id, "user", &jwt_config()).unwrap()
}

pub fn request(
    method: Method,
    uri: &str,
    owner_id: Option<i64>,
    body: Option<String>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner_id) = owner_id {
        builder = builder.header("authorization", format!("Bearer {}", token_for(owner_id)));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
