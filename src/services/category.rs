use crate::{
    error::{AppError, AppResult},
    models::{category, topic, Category, CategoryModel, Topic},
    services::{cache::CacheService, slug::allocate_slug, Actor},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

const CACHE_KEY_CATEGORIES: &str = "forum:categories";
const CACHE_TTL_CATEGORIES: u64 = 300;

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
}

pub struct CategoryService {
    db: DatabaseConnection,
    cache: Option<CacheService>,
}

impl CategoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, cache: None }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn list(&self) -> AppResult<Vec<CategoryModel>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<Vec<CategoryModel>>(CACHE_KEY_CATEGORIES).await {
                return Ok(cached);
            }
        }

        let categories = Category::find()
            .order_by_asc(category::Column::SortOrder)
            .order_by_asc(category::Column::Id)
            .all(&self.db)
            .await?;

        if let Some(cache) = &self.cache {
            cache
                .set(CACHE_KEY_CATEGORIES, &categories, CACHE_TTL_CATEGORIES)
                .await;
        }

        Ok(categories)
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<CategoryModel> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    pub async fn get_with_topic_count(&self, slug: &str) -> AppResult<(CategoryModel, u64)> {
        let category = self.get_by_slug(slug).await?;
        let count = topic_count(&self.db, category.id).await?;
        Ok((category, count))
    }

    pub async fn create(&self, actor: &Actor, input: NewCategory) -> AppResult<CategoryModel> {
        actor.require_admin()?;

        let name = input.name.trim().to_string();
        let txn = self.db.begin().await?;
        let slug = allocate_category_slug(&txn, &name, None).await?;
        let now = chrono::Utc::now().naive_utc();

        let category = category::ActiveModel {
            name: Set(name),
            slug: Set(slug),
            description: Set(input.description),
            icon: Set(input.icon),
            sort_order: Set(input.sort_order),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        self.invalidate_list_cache().await;
        tracing::info!(category_id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        slug: &str,
        changes: CategoryChanges,
    ) -> AppResult<CategoryModel> {
        actor.require_admin()?;

        let txn = self.db.begin().await?;
        let existing = Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))?;

        let mut active: category::ActiveModel = existing.clone().into();

        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name != existing.name {
                active.slug = Set(allocate_category_slug(&txn, &name, Some(existing.id)).await?);
                active.name = Set(name);
            }
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(icon) = changes.icon {
            active.icon = Set(Some(icon));
        }
        if let Some(sort_order) = changes.sort_order {
            active.sort_order = Set(sort_order);
        }
        active.updated_at = Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.invalidate_list_cache().await;
        Ok(updated)
    }

    /// Only empty categories can be removed; topics are never orphaned.
    pub async fn delete(&self, actor: &Actor, slug: &str) -> AppResult<()> {
        actor.require_admin()?;

        let txn = self.db.begin().await?;
        let existing = Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))?;

        let topics = topic_count(&txn, existing.id).await?;
        if topics > 0 {
            return Err(AppError::Validation(format!(
                "Category still has {topics} topic(s)"
            )));
        }

        Category::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;

        self.invalidate_list_cache().await;
        tracing::info!(category_id = existing.id, "Category deleted");
        Ok(())
    }

    async fn invalidate_list_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate(CACHE_KEY_CATEGORIES).await;
        }
    }
}

async fn topic_count<C: ConnectionTrait>(conn: &C, category_id: i32) -> AppResult<u64> {
    Ok(Topic::find()
        .filter(topic::Column::CategoryId.eq(category_id))
        .count(conn)
        .await?)
}

async fn allocate_category_slug<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude_id: Option<i32>,
) -> AppResult<String> {
    allocate_slug(name, "category", exclude_id, move |candidate| async move {
        let owner = Category::find()
            .filter(category::Column::Slug.eq(candidate))
            .one(conn)
            .await?;
        Ok(owner.map(|c| c.id))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_namespaced() {
        assert!(CACHE_KEY_CATEGORIES.starts_with("forum:"));
        assert_eq!(CACHE_TTL_CATEGORIES, 300);
    }
}
