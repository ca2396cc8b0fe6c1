#![allow(dead_code)]

use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};
use tokio::sync::OnceCell;

static INIT: Once = Once::new();
static MIGRATED: OnceCell<()> = OnceCell::const_new();
static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        std::env::set_var("ENABLE_HSTS", "false");
        let config = forum_api::config::jwt::JwtConfig::from_env().unwrap();
        let _ = forum_api::utils::jwt::init_jwt_config(config);
    });
}

/// Tests share one database and never truncate it, so every name they
/// create carries this suffix.
pub fn unique(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{}_{}_{}_{}", prefix, std::process::id(), nanos, n)
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.addr, path)
    }
}

pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    MIGRATED
        .get_or_init(|| async {
            forum_api::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
        })
        .await;

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(forum_api::routes::create_routes())
        .layer(axum::middleware::from_fn(
            forum_api::middleware::security_headers_middleware,
        ))
        .layer(axum::extract::Extension(db.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    }
}

/// Register a fresh user.
pub async fn create_test_user(app: &TestApp, prefix: &str) -> TestUser {
    let username = unique(prefix);

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@test.com", username),
            "password": "test_password_123"
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse register response");
    assert_eq!(status, 201, "register failed for '{}': {}", username, body);

    TestUser {
        id: body["user"]["id"].as_i64().expect("missing user id") as i32,
        username,
        token: body["token"].as_str().expect("missing token").to_string(),
    }
}

/// Promote a user straight in the database.
pub async fn make_admin(db: &DatabaseConnection, user_id: i32) {
    set_role(db, user_id, "admin").await;
}

pub async fn set_role(db: &DatabaseConnection, user_id: i32, role: &str) {
    db.execute(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        "UPDATE users SET role = $1 WHERE id = $2",
        vec![role.into(), user_id.into()],
    ))
    .await
    .expect("Failed to update role");
}

pub async fn create_admin(app: &TestApp) -> TestUser {
    let admin = create_test_user(app, "admin").await;
    make_admin(&app.db, admin.id).await;
    admin
}

/// Create a category as `admin`; returns the response body.
pub async fn create_category(app: &TestApp, admin: &TestUser) -> Value {
    let name = unique("Category");
    let resp = app
        .client
        .post(app.url("/forum/categories"))
        .bearer_auth(&admin.token)
        .json(&serde_json::json!({ "name": name, "description": "test category" }))
        .send()
        .await
        .expect("Failed to create category");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse category response");
    assert_eq!(status, 201, "create category failed: {}", body);
    body
}

/// Create a topic in `category_id`; returns the response body.
pub async fn create_topic(app: &TestApp, user: &TestUser, category_id: i64, title: &str) -> Value {
    let resp = app
        .client
        .post(app.url("/forum/topics"))
        .bearer_auth(&user.token)
        .json(&serde_json::json!({
            "title": title,
            "content": "Opening words",
            "categoryId": category_id,
        }))
        .send()
        .await
        .expect("Failed to create topic");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse topic response");
    assert_eq!(status, 201, "create topic failed: {}", body);
    body
}

/// Post into a topic; returns the raw response so callers can check errors.
pub async fn post_reply(
    app: &TestApp,
    user: &TestUser,
    topic_slug: &str,
    content: &str,
    parent_id: Option<i64>,
) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/forum/topics/{}/posts", topic_slug)))
        .bearer_auth(&user.token)
        .json(&serde_json::json!({ "content": content, "parentId": parent_id }))
        .send()
        .await
        .expect("Failed to create post")
}

pub async fn get_json(app: &TestApp, path: &str) -> (u16, Value) {
    let resp = app
        .client
        .get(app.url(path))
        .send()
        .await
        .expect("GET failed");
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}
