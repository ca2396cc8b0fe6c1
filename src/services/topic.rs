use crate::{
    error::{AppError, AppResult},
    models::{category, post, topic, topic_tag, Category, Post, PostModel, Topic, TopicModel, TopicTag},
    services::{slug::allocate_slug, Actor},
};
use sea_orm::{
    sea_query::{Expr, NullOrdering, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::str::FromStr;

pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicSort {
    #[default]
    LastPostAt,
    CreatedAt,
    UpdatedAt,
    ViewCount,
    Title,
}

impl TopicSort {
    fn column(self) -> topic::Column {
        match self {
            TopicSort::LastPostAt => topic::Column::LastPostAt,
            TopicSort::CreatedAt => topic::Column::CreatedAt,
            TopicSort::UpdatedAt => topic::Column::UpdatedAt,
            TopicSort::ViewCount => topic::Column::ViewCount,
            TopicSort::Title => topic::Column::Title,
        }
    }

    /// Pinned topics float to the top only for "newest first" listings.
    pub fn pins_first(self, direction: SortDirection) -> bool {
        direction == SortDirection::Desc
            && matches!(
                self,
                TopicSort::LastPostAt | TopicSort::CreatedAt | TopicSort::UpdatedAt
            )
    }
}

impl FromStr for TopicSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lastPostAt" => Ok(TopicSort::LastPostAt),
            "createdAt" => Ok(TopicSort::CreatedAt),
            "updatedAt" => Ok(TopicSort::UpdatedAt),
            "viewCount" => Ok(TopicSort::ViewCount),
            "title" => Ok(TopicSort::Title),
            other => Err(AppError::Validation(format!(
                "Invalid sort '{other}'. Must be one of: lastPostAt, createdAt, updatedAt, viewCount, title"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn order(self) -> Order {
        match self {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(AppError::Validation(format!(
                "Invalid order '{other}'. Must be asc or desc"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    /// Category slug.
    pub category: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub title: String,
    pub content: String,
    pub category_id: i32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_locked: Option<bool>,
}

impl TopicChanges {
    fn touches_moderation(&self) -> bool {
        self.is_pinned.is_some() || self.is_locked.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct TopicWithTags {
    pub topic: TopicModel,
    pub tags: Vec<String>,
}

pub struct TopicService {
    db: DatabaseConnection,
}

impl TopicService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: TopicFilter,
        sort: TopicSort,
        direction: SortDirection,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<TopicWithTags>, u64)> {
        let mut query = Topic::find();

        if let Some(category_slug) = filter.category.as_deref() {
            let category = Category::find()
                .filter(category::Column::Slug.eq(category_slug))
                .one(&self.db)
                .await?;
            match category {
                Some(c) => query = query.filter(topic::Column::CategoryId.eq(c.id)),
                None => return Ok((Vec::new(), 0)),
            }
        }

        if let Some(tag) = filter.tag.as_deref() {
            let tagged = Query::select()
                .column(topic_tag::Column::TopicId)
                .from(TopicTag)
                .and_where(topic_tag::Column::Name.eq(tag.trim().to_lowercase()))
                .to_owned();
            query = query.filter(topic::Column::Id.in_subquery(tagged));
        }

        if sort.pins_first(direction) {
            query = query.order_by_desc(topic::Column::IsPinned);
        }
        let paginator = query
            .order_by_with_nulls(sort.column(), direction.order(), NullOrdering::Last)
            .order_by_desc(topic::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let topics = paginator.fetch_page(page.saturating_sub(1)).await?;

        let ids: Vec<i32> = topics.iter().map(|t| t.id).collect();
        let mut tags_map = tags_for_topics(&self.db, &ids).await?;

        let items = topics
            .into_iter()
            .map(|topic| {
                let tags = tags_map.remove(&topic.id).unwrap_or_default();
                TopicWithTags { topic, tags }
            })
            .collect();

        Ok((items, total))
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<TopicModel> {
        Topic::find()
            .filter(topic::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Topic"))
    }

    /// Fetch a topic for display, counting the view unless the viewer wrote it.
    pub async fn view(&self, slug: &str, viewer_id: Option<i32>) -> AppResult<TopicWithTags> {
        let mut topic = self.get_by_slug(slug).await?;

        if viewer_id != Some(topic.author_id) {
            self.increment_view_count(topic.id).await?;
            topic.view_count += 1;
        }

        let tags = tags_for_topic(&self.db, topic.id).await?;
        Ok(TopicWithTags { topic, tags })
    }

    /// Single-statement increment so concurrent viewers never lose a count.
    async fn increment_view_count(&self, id: i32) -> AppResult<()> {
        Topic::update_many()
            .col_expr(
                topic::Column::ViewCount,
                Expr::col(topic::Column::ViewCount).add(1),
            )
            .filter(topic::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn create(&self, actor: &Actor, input: NewTopic) -> AppResult<TopicWithTags> {
        let tags = normalize_tags(input.tags)?;
        let title = input.title.trim().to_string();

        let txn = self.db.begin().await?;

        Category::find_by_id(input.category_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))?;

        let slug = allocate_topic_slug(&txn, &title, None).await?;
        let now = chrono::Utc::now().naive_utc();

        let topic = topic::ActiveModel {
            title: Set(title),
            slug: Set(slug),
            content: Set(input.content),
            author_id: Set(actor.user_id),
            category_id: Set(input.category_id),
            is_pinned: Set(false),
            is_locked: Set(false),
            view_count: Set(0),
            last_post_id: Set(None),
            last_post_at: Set(Some(now)),
            last_post_user: Set(Some(actor.username.clone())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        replace_tags(&txn, topic.id, &tags).await?;
        txn.commit().await?;

        tracing::info!(topic_id = topic.id, slug = %topic.slug, "Topic created");
        Ok(TopicWithTags { topic, tags })
    }

    pub async fn update(
        &self,
        actor: &Actor,
        slug: &str,
        changes: TopicChanges,
    ) -> AppResult<TopicWithTags> {
        let txn = self.db.begin().await?;

        let existing = Topic::find()
            .filter(topic::Column::Slug.eq(slug))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Topic"))?;

        actor.require_author_or_admin(existing.author_id)?;
        if existing.is_locked && !actor.is_admin {
            return Err(AppError::Locked);
        }
        if changes.touches_moderation() && !actor.is_admin {
            return Err(AppError::forbidden("Only admins can pin or lock topics"));
        }

        let new_tags = changes.tags.map(normalize_tags).transpose()?;
        let mut active: topic::ActiveModel = existing.clone().into();

        if let Some(category_id) = changes.category_id {
            if category_id != existing.category_id {
                Category::find_by_id(category_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::not_found("Category"))?;
                active.category_id = Set(category_id);
            }
        }

        if let Some(title) = changes.title {
            let title = title.trim().to_string();
            if title != existing.title {
                let slug = allocate_topic_slug(&txn, &title, Some(existing.id)).await?;
                active.slug = Set(slug);
                active.title = Set(title);
            }
        }

        if let Some(content) = changes.content {
            active.content = Set(content);
        }
        if let Some(pinned) = changes.is_pinned {
            active.is_pinned = Set(pinned);
        }
        if let Some(locked) = changes.is_locked {
            active.is_locked = Set(locked);
        }
        active.updated_at = Set(chrono::Utc::now().naive_utc());

        let topic = active.update(&txn).await?;

        let tags = match new_tags {
            Some(tags) => {
                replace_tags(&txn, topic.id, &tags).await?;
                tags
            }
            None => tags_for_topic(&txn, topic.id).await?,
        };

        txn.commit().await?;
        Ok(TopicWithTags { topic, tags })
    }

    /// Delete a topic and everything under it: replies, root posts, tags,
    /// then the topic row, all in one transaction.
    pub async fn delete(&self, actor: &Actor, slug: &str) -> AppResult<()> {
        let txn = self.db.begin().await?;

        let topic = Topic::find()
            .filter(topic::Column::Slug.eq(slug))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Topic"))?;

        actor.require_author_or_admin(topic.author_id)?;

        let posts = Post::find()
            .filter(post::Column::TopicId.eq(topic.id))
            .all(&txn)
            .await?;

        for batch in deletion_batches(&posts) {
            Post::delete_many()
                .filter(post::Column::Id.is_in(batch))
                .exec(&txn)
                .await?;
        }

        TopicTag::delete_many()
            .filter(topic_tag::Column::TopicId.eq(topic.id))
            .exec(&txn)
            .await?;
        Topic::delete_by_id(topic.id).exec(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            topic_id = topic.id,
            posts = posts.len(),
            "Topic deleted with its posts"
        );
        Ok(())
    }
}

async fn allocate_topic_slug<C: ConnectionTrait>(
    conn: &C,
    title: &str,
    exclude_id: Option<i32>,
) -> AppResult<String> {
    allocate_slug(title, "topic", exclude_id, move |candidate| async move {
        let owner = Topic::find()
            .filter(topic::Column::Slug.eq(candidate))
            .one(conn)
            .await?;
        Ok(owner.map(|t| t.id))
    })
    .await
}

/// Trim, lowercase and de-duplicate tags, enforcing count and length limits.
pub fn normalize_tags(tags: Vec<String>) -> AppResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            return Err(AppError::Validation(format!(
                "Each tag must be 1-{MAX_TAG_LEN} characters"
            )));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "Maximum {MAX_TAGS} tags allowed"
        )));
    }

    Ok(normalized)
}

/// Group post ids into delete batches, deepest replies first and root posts
/// last, so no batch removes a row another surviving row still points at.
pub fn deletion_batches(posts: &[PostModel]) -> Vec<Vec<i32>> {
    let parents: HashMap<i32, Option<i32>> = posts.iter().map(|p| (p.id, p.parent_id)).collect();

    let depth_of = |id: i32| -> usize {
        let mut depth = 0;
        let mut current = parents.get(&id).copied().flatten();
        while let Some(parent) = current {
            depth += 1;
            if depth > posts.len() {
                break; // cycle guard
            }
            current = parents.get(&parent).copied().flatten();
        }
        depth
    };

    let mut by_depth: Vec<Vec<i32>> = Vec::new();
    for post in posts {
        let depth = depth_of(post.id);
        if by_depth.len() <= depth {
            by_depth.resize_with(depth + 1, Vec::new);
        }
        by_depth[depth].push(post.id);
    }

    by_depth.reverse();
    by_depth.retain(|batch| !batch.is_empty());
    by_depth
}

async fn replace_tags<C: ConnectionTrait>(conn: &C, topic_id: i32, tags: &[String]) -> AppResult<()> {
    TopicTag::delete_many()
        .filter(topic_tag::Column::TopicId.eq(topic_id))
        .exec(conn)
        .await?;

    if tags.is_empty() {
        return Ok(());
    }

    let rows = tags.iter().map(|name| topic_tag::ActiveModel {
        topic_id: Set(topic_id),
        name: Set(name.clone()),
        ..Default::default()
    });
    TopicTag::insert_many(rows).exec(conn).await?;
    Ok(())
}

async fn tags_for_topic<C: ConnectionTrait>(conn: &C, topic_id: i32) -> AppResult<Vec<String>> {
    let tags = TopicTag::find()
        .filter(topic_tag::Column::TopicId.eq(topic_id))
        .order_by_asc(topic_tag::Column::Id)
        .all(conn)
        .await?;
    Ok(tags.into_iter().map(|t| t.name).collect())
}

async fn tags_for_topics<C: ConnectionTrait>(
    conn: &C,
    topic_ids: &[i32],
) -> AppResult<HashMap<i32, Vec<String>>> {
    if topic_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = TopicTag::find()
        .filter(topic_tag::Column::TopicId.is_in(topic_ids.iter().copied()))
        .order_by_asc(topic_tag::Column::Id)
        .all(conn)
        .await?;

    let mut map: HashMap<i32, Vec<String>> = HashMap::new();
    for row in rows {
        map.entry(row.topic_id).or_default().push(row.name);
    }
    Ok(map)
}
