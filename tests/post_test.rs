mod common;

use forum_api::models::{post, topic as topic_entity, Topic};
use forum_api::services::last_post;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use std::time::Duration;

/// Admin, a member, and a fresh topic authored by the member.
async fn setup(app: &common::TestApp) -> (common::TestUser, common::TestUser, String) {
    let admin = common::create_admin(app).await;
    let member = common::create_test_user(app, "member").await;
    let category = common::create_category(app, &admin).await;
    let topic = common::create_topic(
        app,
        &member,
        category["id"].as_i64().unwrap(),
        &common::unique("Thread"),
    )
    .await;
    (admin, member, topic["slug"].as_str().unwrap().to_string())
}

async fn topic(app: &common::TestApp, slug: &str) -> Value {
    let (status, body) = common::get_json(app, &format!("/forum/topics/{}", slug)).await;
    assert_eq!(status, 200);
    body
}

#[tokio::test]
async fn new_post_becomes_last_post() {
    let app = common::spawn_app().await;
    let (admin, _member, slug) = setup(&app).await;

    let resp = common::post_reply(&app, &admin, &slug, "Welcome!", None).await;
    assert_eq!(resp.status(), 201);
    let post: Value = resp.json().await.unwrap();
    assert_eq!(post["isEdited"], false);
    assert_eq!(post["parentId"], Value::Null);
    assert_eq!(post["authorId"], admin.id);

    let t = topic(&app, &slug).await;
    assert_eq!(t["lastPostId"], post["id"]);
    assert_eq!(t["lastPostUser"], admin.username.as_str());
    assert_eq!(t["lastPostAt"], post["createdAt"]);
}

#[tokio::test]
async fn replies_and_roots_listed_separately() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;

    let first: Value = common::post_reply(&app, &member, &slug, "first", None)
        .await
        .json()
        .await
        .unwrap();
    let second: Value = common::post_reply(&app, &admin, &slug, "second", None)
        .await
        .json()
        .await
        .unwrap();
    let reply = common::post_reply(&app, &admin, &slug, "reply", first["id"].as_i64()).await;
    assert_eq!(reply.status(), 201);
    let reply: Value = reply.json().await.unwrap();
    assert_eq!(reply["parentId"], first["id"]);

    let (status, roots) = common::get_json(&app, &format!("/forum/topics/{}/posts", slug)).await;
    assert_eq!(status, 200);
    assert_eq!(roots["total"], 2);
    assert_eq!(roots["items"][0]["id"], first["id"]);
    assert_eq!(roots["items"][1]["id"], second["id"]);

    let (_, replies) = common::get_json(
        &app,
        &format!("/forum/topics/{}/posts?parentId={}", slug, first["id"]),
    )
    .await;
    assert_eq!(replies["total"], 1);
    assert_eq!(replies["items"][0]["id"], reply["id"]);

    let (status, _) = common::get_json(&app, "/forum/topics/no-such-topic-anywhere/posts").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn parent_must_be_root_of_same_topic() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;
    let (_, _, other_slug) = setup(&app).await;

    let root: Value = common::post_reply(&app, &member, &slug, "root", None)
        .await
        .json()
        .await
        .unwrap();
    let reply: Value = common::post_reply(&app, &admin, &slug, "reply", root["id"].as_i64())
        .await
        .json()
        .await
        .unwrap();

    let resp = common::post_reply(&app, &admin, &slug, "nested", reply["id"].as_i64()).await;
    assert_eq!(resp.status(), 400);

    let resp = common::post_reply(&app, &admin, &other_slug, "cross", root["id"].as_i64()).await;
    assert_eq!(resp.status(), 400);

    let resp = common::post_reply(&app, &admin, &slug, "ghost", Some(i32::MAX as i64)).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Parent post not found");

    let resp = common::post_reply(&app, &admin, "no-such-topic-anywhere", "lost", None).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn locked_topic_only_accepts_admin_posts() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;

    let existing: Value = common::post_reply(&app, &member, &slug, "before lock", None)
        .await
        .json()
        .await
        .unwrap();

    let resp = app
        .client
        .put(app.url(&format!("/forum/topics/{}", slug)))
        .bearer_auth(&admin.token)
        .json(&serde_json::json!({ "isLocked": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = common::post_reply(&app, &member, &slug, "after lock", None).await;
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(app.url(&format!("/forum/posts/{}", existing["id"])))
        .bearer_auth(&member.token)
        .json(&serde_json::json!({ "content": "sneaky edit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .post(app.url(&format!("/forum/posts/{}/reactions", existing["id"])))
        .bearer_auth(&member.token)
        .json(&serde_json::json!({ "emoji": "👍" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = common::post_reply(&app, &admin, &slug, "moderator note", None).await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn edit_marks_post_edited() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;
    let stranger = common::create_test_user(&app, "stranger").await;

    let post: Value = common::post_reply(&app, &member, &slug, "draft", None)
        .await
        .json()
        .await
        .unwrap();
    let url = app.url(&format!("/forum/posts/{}", post["id"]));

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&stranger.token)
        .json(&serde_json::json!({ "content": "not mine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&member.token)
        .json(&serde_json::json!({ "content": "final" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "final");
    assert_eq!(body["isEdited"], true);

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&admin.token)
        .json(&serde_json::json!({ "content": "moderated" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn deleting_posts_recomputes_last_post() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;

    let first: Value = common::post_reply(&app, &member, &slug, "first", None)
        .await
        .json()
        .await
        .unwrap();
    let second: Value = common::post_reply(&app, &admin, &slug, "second", None)
        .await
        .json()
        .await
        .unwrap();
    let reply: Value = common::post_reply(&app, &admin, &slug, "reply", first["id"].as_i64())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(topic(&app, &slug).await["lastPostId"], reply["id"]);

    // Deleting a root takes its reply with it; `second` is now newest.
    let resp = app
        .client
        .delete(app.url(&format!("/forum/posts/{}", first["id"])))
        .bearer_auth(&member.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (status, _) = common::get_json(&app, &format!("/forum/posts/{}", reply["id"])).await;
    assert_eq!(status, 404);
    let t = topic(&app, &slug).await;
    assert_eq!(t["lastPostId"], second["id"]);
    assert_eq!(t["lastPostUser"], admin.username.as_str());

    let resp = app
        .client
        .delete(app.url(&format!("/forum/posts/{}", second["id"])))
        .bearer_auth(&member.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .delete(app.url(&format!("/forum/posts/{}", second["id"])))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let t = topic(&app, &slug).await;
    assert_eq!(t["lastPostId"], Value::Null);
    assert_eq!(t["lastPostAt"], Value::Null);
    assert_eq!(t["lastPostUser"], Value::Null);
}

#[tokio::test]
async fn delete_waits_for_in_flight_post_before_recomputing() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;

    let old: Value = common::post_reply(&app, &member, &slug, "old", None)
        .await
        .json()
        .await
        .unwrap();

    // Same steps as a post create, left uncommitted while the delete runs.
    let txn = app.db.begin().await.unwrap();
    let locked = Topic::find()
        .filter(topic_entity::Column::Slug.eq(&slug))
        .lock_exclusive()
        .one(&txn)
        .await
        .unwrap()
        .unwrap();
    let now = chrono::Utc::now().naive_utc();
    let newer = post::ActiveModel {
        content: Set("new".to_string()),
        author_id: Set(admin.id),
        topic_id: Set(locked.id),
        parent_id: Set(None),
        is_edited: Set(false),
        reactions: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .unwrap();
    last_post::record(&txn, locked, &newer, &admin.username)
        .await
        .unwrap();

    let delete = {
        let client = app.client.clone();
        let url = app.url(&format!("/forum/posts/{}", old["id"]));
        let token = member.token.clone();
        tokio::spawn(async move {
            client
                .delete(url)
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
                .status()
        })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!delete.is_finished(), "delete must wait on the topic lock");
    txn.commit().await.unwrap();
    assert_eq!(delete.await.unwrap(), 200);

    let t = topic(&app, &slug).await;
    assert_eq!(t["lastPostId"], newer.id);
    assert_eq!(t["lastPostUser"], admin.username.as_str());
}

#[tokio::test]
async fn reactions_toggle_per_user() {
    let app = common::spawn_app().await;
    let (admin, member, slug) = setup(&app).await;

    let post: Value = common::post_reply(&app, &member, &slug, "react to me", None)
        .await
        .json()
        .await
        .unwrap();
    let url = app.url(&format!("/forum/posts/{}/reactions", post["id"]));

    for user in [&member, &admin] {
        let resp = app
            .client
            .post(&url)
            .bearer_auth(&user.token)
            .json(&serde_json::json!({ "emoji": "🎉" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let (_, body) = common::get_json(&app, &format!("/forum/posts/{}", post["id"])).await;
    assert_eq!(body["reactions"]["🎉"], serde_json::json!([member.id, admin.id]));

    let resp = app
        .client
        .post(&url)
        .bearer_auth(&member.token)
        .json(&serde_json::json!({ "emoji": "🎉" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reactions"]["🎉"], serde_json::json!([admin.id]));

    let resp = app
        .client
        .post(&url)
        .bearer_auth(&member.token)
        .json(&serde_json::json!({ "emoji": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
