use super::{non_blank, timestamp, validate_payload};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::CategoryModel;
use crate::response::MessageResponse;
use crate::services::cache::CacheService;
use crate::services::category::{CategoryChanges, CategoryService, NewCategory};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    /// Category name (1-100 characters)
    #[validate(length(min = 1, max = 100), custom(function = "non_blank"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub icon: Option<String>,
    /// Display position, ascending
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100), custom(function = "non_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub icon: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub order: i32,
    /// Present on single-category reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CategoryModel> for CategoryResponse {
    fn from(c: CategoryModel) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            icon: c.icon,
            order: c.sort_order,
            topic_count: None,
            created_at: timestamp(c.created_at),
            updated_at: timestamp(c.updated_at),
        }
    }
}

fn make_category_service(db: DatabaseConnection, cache: Option<CacheService>) -> CategoryService {
    let service = CategoryService::new(db);
    match cache {
        Some(c) => service.with_cache(c),
        None => service,
    }
}

#[utoipa::path(
    get,
    path = "/api/forum/categories",
    responses(
        (status = 200, description = "All categories by display order", body = Vec<CategoryResponse>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
) -> AppResult<Json<Vec<CategoryResponse>>> {
    let service = make_category_service(db, cache.map(|c| c.0));
    let categories = service.list().await?;
    Ok(Json(
        categories.into_iter().map(CategoryResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/forum/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category with its topic count", body = CategoryResponse),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "categories"
)]
pub async fn get_category(
    Extension(db): Extension<DatabaseConnection>,
    Path(slug): Path<String>,
) -> AppResult<Json<CategoryResponse>> {
    let (category, topic_count) = CategoryService::new(db).get_with_topic_count(&slug).await?;
    let mut response = CategoryResponse::from(category);
    response.topic_count = Some(topic_count);
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/forum/categories",
    security(("jwt_token" = [])),
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "categories"
)]
pub async fn create_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    validate_payload(&payload)?;

    let service = make_category_service(db, cache.map(|c| c.0));
    let category = service
        .create(
            &auth_user.actor(),
            NewCategory {
                name: payload.name,
                description: payload.description,
                icon: payload.icon,
                sort_order: payload.order.unwrap_or(0),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

#[utoipa::path(
    put,
    path = "/api/forum/categories/{slug}",
    security(("jwt_token" = [])),
    params(("slug" = String, Path, description = "Category slug")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Admin only", body = AppError),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "categories"
)]
pub async fn update_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<CategoryResponse>> {
    validate_payload(&payload)?;

    let service = make_category_service(db, cache.map(|c| c.0));
    let category = service
        .update(
            &auth_user.actor(),
            &slug,
            CategoryChanges {
                name: payload.name,
                description: payload.description,
                icon: payload.icon,
                sort_order: payload.order,
            },
        )
        .await?;

    Ok(Json(CategoryResponse::from(category)))
}

#[utoipa::path(
    delete,
    path = "/api/forum/categories/{slug}",
    security(("jwt_token" = [])),
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 400, description = "Category still has topics", body = AppError),
        (status = 403, description = "Admin only", body = AppError),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "categories"
)]
pub async fn delete_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(slug): Path<String>,
) -> AppResult<MessageResponse> {
    let service = make_category_service(db, cache.map(|c| c.0));
    service.delete(&auth_user.actor(), &slug).await?;
    Ok(MessageResponse::new("Category deleted"))
}
