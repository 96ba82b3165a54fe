//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! with temporary SQLite databases and no external integrations.

use axum::{body::Body, http::Request, Router};
use tower::ServiceExt;
use uuid::Uuid;

use siem_reports::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, ReportsConfig, ServerConfig,
    },
    db,
    middleware::create_access_token,
    AppState,
};

pub const TEST_USER: &str = "analyst@example.com";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with a temporary SQLite database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a new test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        let state = AppState {
            config,
            db,
            tenant_api: None,
            publisher: None,
            storage: None,
            search: None,
        };

        let router = Router::new()
            .nest("/api/v1", api::public_routes())
            .nest(
                "/api/v1",
                api::protected_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    siem_reports::middleware::auth::auth_middleware,
                )),
            )
            .with_state(state.clone());

        Self { router, state }
    }

    /// Token accepted by the auth middleware for the default test user
    pub fn token(&self) -> String {
        create_access_token(TEST_USER, &self.state.config.auth.jwt_secret, 24)
            .expect("Failed to create test token")
    }

    /// Insert a tenant into the replicated analytics tables
    pub async fn seed_tenant(&self, id: i64, code: &str, name: &str, eps_licensed: i64) {
        sqlx::query("INSERT INTO tenants (id, code, name, eps_licensed) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(code)
            .bind(name)
            .bind(eps_licensed)
            .execute(&self.state.db)
            .await
            .expect("Failed to seed tenant");
    }

    pub async fn seed_rule(&self, id: i64, name: &str, rule_type: i64, severity: i64, source: i64) {
        sqlx::query(
            "INSERT INTO rule (id, name, rule_type, severity, source) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(rule_type)
        .bind(severity)
        .bind(source)
        .execute(&self.state.db)
        .await
        .expect("Failed to seed rule");
    }

    pub async fn seed_alert(
        &self,
        rule_id: i64,
        tenant_id: i64,
        triggers: i64,
        trial: i64,
        created_at: &str,
    ) {
        sqlx::query(
            "INSERT INTO alert (rule_id, tenant_id, triggers, logs, trial, created_at) \
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(rule_id)
        .bind(tenant_id)
        .bind(triggers)
        .bind(trial)
        .bind(created_at)
        .execute(&self.state.db)
        .await
        .expect("Failed to seed alert");
    }

    pub async fn seed_eps(&self, tenant_code: &str, eps_date: &str, total: i64, avg: f64, peak: f64) {
        sqlx::query(
            "INSERT INTO event_metrics (tenant_code, eps_date, eps_total, eps_avg, eps) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tenant_code)
        .bind(eps_date)
        .bind(total)
        .bind(avg)
        .bind(peak)
        .execute(&self.state.db)
        .await
        .expect("Failed to seed EPS metrics");
    }

    /// Make a GET request without authentication
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request_with_auth(request, &self.token()).await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request_with_auth(request, &self.token()).await
    }

    /// Make a request with authentication
    pub async fn request_with_auth(&self, request: Request<Body>, token: &str) -> TestResponse {
        let (mut parts, body) = request.into_parts();
        parts.headers.insert(
            "Authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        self.request(Request::from_parts(parts, body)).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }
}

/// Create a test configuration with a temporary SQLite database
pub fn test_config() -> AppConfig {
    let run_id = Uuid::new_v4().to_string().replace('-', "");
    let db_path = format!("/tmp/siem_reports_test_{}.db", run_id);
    let output_dir = format!("/tmp/siem_reports_out_{}", run_id);

    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            workers: 1,
            tls: None,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path),
            max_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: "test_secret_key_that_is_at_least_32_bytes_long".to_string(),
            token_expiry_hours: 24,
        },
        logging: LoggingConfig::default(),
        tenant_api: None,
        kafka: None,
        object_storage: None,
        opensearch: None,
        reports: ReportsConfig {
            output_dir: output_dir.into(),
        },
    }
}
