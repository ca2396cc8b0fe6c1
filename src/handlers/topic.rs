use super::{non_blank, timestamp, validate_payload};
use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, Viewer};
use crate::response::{MessageResponse, PaginatedResponse, PaginationQuery};
use crate::services::topic::{
    NewTopic, SortDirection, TopicChanges, TopicFilter, TopicService, TopicSort, TopicWithTags,
};
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
pub struct ListTopicsQuery {
    /// Category slug
    pub category: Option<String>,
    pub tag: Option<String>,
    /// lastPostAt (default), createdAt, updatedAt, viewCount or title
    pub sort: Option<String>,
    /// desc (default) or asc
    pub order: Option<String>,
    pub page: Option<u64>,
    /// Page size, at most 100
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    /// Topic title (1-200 characters)
    #[validate(length(min = 1, max = 200), custom(function = "non_blank"))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub category_id: i32,
    /// Up to 5 tags, each 1-30 characters
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 200), custom(function = "non_blank"))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub category_id: Option<i32>,
    /// Replaces the whole tag set
    pub tags: Option<Vec<String>>,
    /// Admin only
    pub is_pinned: Option<bool>,
    /// Admin only
    pub is_locked: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: i32,
    pub category_id: i32,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i32,
    pub last_post_id: Option<i32>,
    pub last_post_at: Option<String>,
    pub last_post_user: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TopicWithTags> for TopicResponse {
    fn from(TopicWithTags { topic: t, tags }: TopicWithTags) -> Self {
        Self {
            id: t.id,
            title: t.title,
            slug: t.slug,
            content: t.content,
            author_id: t.author_id,
            category_id: t.category_id,
            is_pinned: t.is_pinned,
            is_locked: t.is_locked,
            view_count: t.view_count,
            last_post_id: t.last_post_id,
            last_post_at: t.last_post_at.map(timestamp),
            last_post_user: t.last_post_user,
            tags,
            created_at: timestamp(t.created_at),
            updated_at: timestamp(t.updated_at),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/forum/topics",
    params(ListTopicsQuery),
    responses(
        (status = 200, description = "Page of topics", body = PaginatedResponse<TopicResponse>),
        (status = 400, description = "Invalid sort or order", body = AppError),
    ),
    tag = "topics"
)]
pub async fn list_topics(
    Extension(db): Extension<DatabaseConnection>,
    Query(query): Query<ListTopicsQuery>,
) -> AppResult<PaginatedResponse<TopicResponse>> {
    let sort = query
        .sort
        .as_deref()
        .map(str::parse::<TopicSort>)
        .transpose()?
        .unwrap_or_default();
    let direction = query
        .order
        .as_deref()
        .map(str::parse::<SortDirection>)
        .transpose()?
        .unwrap_or_default();
    let (page, per_page) = PaginationQuery::resolve(query.page, query.per_page);

    let filter = TopicFilter {
        category: query.category,
        tag: query.tag,
    };
    let (topics, total) = TopicService::new(db)
        .list(filter, sort, direction, page, per_page)
        .await?;

    let items = topics.into_iter().map(TopicResponse::from).collect();
    Ok(PaginatedResponse::new(items, total, page, per_page))
}

#[utoipa::path(
    get,
    path = "/api/forum/topics/{slug}",
    params(("slug" = String, Path, description = "Topic slug")),
    responses(
        (status = 200, description = "Topic details; counts a view unless read by its author", body = TopicResponse),
        (status = 404, description = "Topic not found", body = AppError),
    ),
    tag = "topics"
)]
pub async fn get_topic(
    Extension(db): Extension<DatabaseConnection>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> AppResult<Json<TopicResponse>> {
    let topic = TopicService::new(db).view(&slug, viewer.user_id).await?;
    Ok(Json(TopicResponse::from(topic)))
}

#[utoipa::path(
    post,
    path = "/api/forum/topics",
    security(("jwt_token" = [])),
    request_body = CreateTopicRequest,
    responses(
        (status = 201, description = "Topic created", body = TopicResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "topics"
)]
pub async fn create_topic(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTopicRequest>,
) -> AppResult<impl IntoResponse> {
    validate_payload(&payload)?;

    let topic = TopicService::new(db)
        .create(
            &auth_user.actor(),
            NewTopic {
                title: payload.title,
                content: payload.content,
                category_id: payload.category_id,
                tags: payload.tags.unwrap_or_default(),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TopicResponse::from(topic))))
}

#[utoipa::path(
    put,
    path = "/api/forum/topics/{slug}",
    security(("jwt_token" = [])),
    params(("slug" = String, Path, description = "Topic slug")),
    request_body = UpdateTopicRequest,
    responses(
        (status = 200, description = "Topic updated", body = TopicResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the author, topic locked, or pin/lock without admin rights", body = AppError),
        (status = 404, description = "Topic or category not found", body = AppError),
    ),
    tag = "topics"
)]
pub async fn update_topic(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateTopicRequest>,
) -> AppResult<Json<TopicResponse>> {
    validate_payload(&payload)?;

    let changes = TopicChanges {
        title: payload.title,
        content: payload.content,
        category_id: payload.category_id,
        tags: payload.tags,
        is_pinned: payload.is_pinned,
        is_locked: payload.is_locked,
    };
    let topic = TopicService::new(db)
        .update(&auth_user.actor(), &slug, changes)
        .await?;

    Ok(Json(TopicResponse::from(topic)))
}

#[utoipa::path(
    delete,
    path = "/api/forum/topics/{slug}",
    security(("jwt_token" = [])),
    params(("slug" = String, Path, description = "Topic slug")),
    responses(
        (status = 200, description = "Topic and all its posts deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Topic not found", body = AppError),
    ),
    tag = "topics"
)]
pub async fn delete_topic(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(slug): Path<String>,
) -> AppResult<MessageResponse> {
    TopicService::new(db).delete(&auth_user.actor(), &slug).await?;
    Ok(MessageResponse::new("Topic deleted"))
}
