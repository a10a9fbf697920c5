/// Common test utilities for integration tests
///
/// Provides shared infrastructure:
/// - Test database setup (migrations run on first use)
/// - Test user creation with JWT tokens
/// - Request helpers driving the router via `tower::Service::call`
///
/// These tests expect a scratch Postgres database reachable through
/// `DATABASE_URL`; every test creates its own users and families with
/// random identifiers, so no cross-test cleanup is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use choreboard_api::app::{build_router, AppState};
use choreboard_api::config::Config;
use choreboard_shared::auth::jwt::{create_token, Claims, TokenType};
use choreboard_shared::models::user::{CreateUser, User};
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a new test context against the configured database
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db = PgPool::connect(&config.database.url).await?;

        choreboard_shared::db::migrations::run_migrations(&db).await?;

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        Ok(TestContext { db, app, config })
    }

    /// Creates a test user and returns it with a Bearer token
    pub async fn create_user(&self, label: &str) -> anyhow::Result<(User, String)> {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("{}-{}@example.com", label, Uuid::new_v4()),
                password_hash: "test_hash".to_string(), // Not used in tests
                name: Some(label.to_string()),
                avatar_url: None,
            },
        )
        .await?;

        let claims = Claims::new(user.id, TokenType::Access);
        let token = create_token(&claims, &self.config.jwt.secret)?;

        Ok((user, token))
    }

    /// Sends a request through the router and returns status plus JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }
}

/// Creates a family through the API and returns its ID
pub async fn create_family(ctx: &TestContext, token: &str, name: &str) -> Uuid {
    let (status, body) = ctx
        .send(
            "POST",
            "/families",
            Some(token),
            Some(serde_json::json!({ "name": name })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create family failed: {body}");

    body["family"]["id"].as_str().unwrap().parse().unwrap()
}

/// Joins a user into a family by generating and using an invite code
pub async fn join_family(ctx: &TestContext, owner_token: &str, member_token: &str, family_id: Uuid) {
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/families/{}/invite", family_id),
            Some(owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "invite failed: {body}");
    let code = body["inviteCode"].as_str().unwrap().to_string();

    let (status, body) = ctx
        .send(
            "POST",
            "/families/join",
            Some(member_token),
            Some(serde_json::json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "join failed: {body}");
}

/// Creates a task through the API and returns its ID
pub async fn create_task(
    ctx: &TestContext,
    token: &str,
    family_id: Uuid,
    payload: serde_json::Value,
) -> Uuid {
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/families/{}/tasks", family_id),
            Some(token),
            Some(payload),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create task failed: {body}");

    body["task"]["id"].as_str().unwrap().parse().unwrap()
}

/// Counts rows referencing a task across all dependent tables
pub async fn count_task_references(db: &PgPool, task_id: Uuid) -> i64 {
    let counts: Vec<i64> = futures::future::join_all(
        [
            "SELECT COUNT(*) FROM assignments WHERE task_id = $1",
            "SELECT COUNT(*) FROM comments WHERE task_id = $1",
            "SELECT COUNT(*) FROM reactions WHERE task_id = $1",
            "SELECT COUNT(*) FROM notifications WHERE task_id = $1",
            "SELECT COUNT(*) FROM tasks WHERE id = $1",
        ]
        .iter()
        .map(|query| {
            let db = db.clone();
            async move {
                let (count,): (i64,) = sqlx::query_as(query)
                    .bind(task_id)
                    .fetch_one(&db)
                    .await
                    .unwrap();
                count
            }
        }),
    )
    .await;

    counts.into_iter().sum()
}
