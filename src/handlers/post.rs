use super::{timestamp, validate_payload};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::PostModel;
use crate::response::{MessageResponse, PaginatedResponse, PaginationQuery};
use crate::services::post::{NewPost, PostService};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListPostsQuery {
    /// List the direct replies of this post instead of root posts
    pub parent_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(min = 1))]
    pub content: String,
    /// Root post being replied to
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i32,
    pub content: String,
    pub author_id: i32,
    pub topic_id: i32,
    pub parent_id: Option<i32>,
    pub is_edited: bool,
    /// Emoji mapped to the ids of users who reacted with it
    #[schema(value_type = Option<Object>)]
    pub reactions: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostModel> for PostResponse {
    fn from(p: PostModel) -> Self {
        Self {
            id: p.id,
            content: p.content,
            author_id: p.author_id,
            topic_id: p.topic_id,
            parent_id: p.parent_id,
            is_edited: p.is_edited,
            reactions: p.reactions,
            created_at: timestamp(p.created_at),
            updated_at: timestamp(p.updated_at),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/forum/topics/{slug}/posts",
    params(
        ("slug" = String, Path, description = "Topic slug"),
        ListPostsQuery,
    ),
    responses(
        (status = 200, description = "Root posts, or replies to parentId, oldest first", body = PaginatedResponse<PostResponse>),
        (status = 404, description = "Topic not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn list_posts(
    Extension(db): Extension<DatabaseConnection>,
    Path(slug): Path<String>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<PaginatedResponse<PostResponse>> {
    let (page, per_page) = PaginationQuery::resolve(query.page, query.per_page);
    let (posts, total) = PostService::new(db)
        .list(&slug, query.parent_id, page, per_page)
        .await?;

    let items = posts.into_iter().map(PostResponse::from).collect();
    Ok(PaginatedResponse::new(items, total, page, per_page))
}

#[utoipa::path(
    post,
    path = "/api/forum/topics/{slug}/posts",
    security(("jwt_token" = [])),
    params(("slug" = String, Path, description = "Topic slug")),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Invalid content or parent", body = AppError),
        (status = 403, description = "Topic is locked", body = AppError),
        (status = 404, description = "Topic or parent post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn create_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    validate_payload(&payload)?;

    let post = PostService::new(db)
        .create(
            &auth_user.actor(),
            &slug,
            NewPost {
                content: payload.content,
                parent_id: payload.parent_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

#[utoipa::path(
    get,
    path = "/api/forum/posts/{id}",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post details", body = PostResponse),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn get_post(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<Json<PostResponse>> {
    let post = PostService::new(db).get_by_id(id).await?;
    Ok(Json(PostResponse::from(post)))
}

#[utoipa::path(
    put,
    path = "/api/forum/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the author, or topic locked", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn update_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    validate_payload(&payload)?;

    let post = PostService::new(db)
        .update(&auth_user.actor(), id, payload.content)
        .await?;
    Ok(Json(PostResponse::from(post)))
}

#[utoipa::path(
    delete,
    path = "/api/forum/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post and its replies deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<MessageResponse> {
    PostService::new(db).delete(&auth_user.actor(), id).await?;
    Ok(MessageResponse::new("Post deleted"))
}

#[utoipa::path(
    post,
    path = "/api/forum/posts/{id}/reactions",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction toggled", body = PostResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Topic is locked", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn toggle_reaction(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<ReactionRequest>,
) -> AppResult<Json<PostResponse>> {
    validate_payload(&payload)?;

    let post = PostService::new(db)
        .toggle_reaction(&auth_user.actor(), id, payload.emoji.trim())
        .await?;
    Ok(Json(PostResponse::from(post)))
}
