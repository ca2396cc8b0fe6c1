mod common;

use serde_json::Value;

#[tokio::test]
async fn register_login_and_me() {
    let app = common::spawn_app().await;
    let username = common::unique("alice");

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password_123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["username"], username.as_str());
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"]["createdAt"].is_string());

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "username": username, "password": "password_123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["username"], username.as_str());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = common::spawn_app().await;
    let user = common::create_test_user(&app, "dup").await;

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": user.username,
            "email": format!("other_{}@example.com", user.username),
            "password": "password_123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn short_password_rejected() {
    let app = common::spawn_app().await;
    let username = common::unique("shortpw");

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "short"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn wrong_password_unauthorized() {
    let app = common::spawn_app().await;
    let user = common::create_test_user(&app, "bob").await;

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "username": user.username, "password": "not_the_password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
async fn protected_route_requires_token() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = common::spawn_app().await;
    let user = common::create_test_user(&app, "cookie").await;

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();

    let resp = client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "username": user.username, "password": "test_password_123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let set_cookie = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("forum_session="));
    assert!(set_cookie.contains("HttpOnly"));

    let resp = client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.post(app.url("/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let cleared = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn banned_user_is_forbidden() {
    let app = common::spawn_app().await;
    let user = common::create_test_user(&app, "banned").await;
    common::set_role(&app.db, user.id, "banned").await;

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/forum/categories"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["x-frame-options"], "DENY");
}
