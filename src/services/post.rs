use crate::{
    error::{AppError, AppResult},
    models::{post, topic, Post, PostModel, Topic, TopicModel},
    services::{last_post, Actor},
};
use sea_orm::{
    prelude::Json, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub parent_id: Option<i32>,
}

pub struct PostService {
    db: DatabaseConnection,
}

impl PostService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Root posts of a topic, or the direct replies to `parent_id`, oldest first.
    pub async fn list(
        &self,
        topic_slug: &str,
        parent_id: Option<i32>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PostModel>, u64)> {
        let topic = find_topic_by_slug(&self.db, topic_slug).await?;

        let mut query = Post::find().filter(post::Column::TopicId.eq(topic.id));
        query = match parent_id {
            Some(parent) => query.filter(post::Column::ParentId.eq(parent)),
            None => query.filter(post::Column::ParentId.is_null()),
        };

        let paginator = query
            .order_by_asc(post::Column::CreatedAt)
            .order_by_asc(post::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((posts, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<PostModel> {
        Post::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    pub async fn create(
        &self,
        actor: &Actor,
        topic_slug: &str,
        input: NewPost,
    ) -> AppResult<PostModel> {
        let txn = self.db.begin().await?;

        // Row lock serializes concurrent writers of the last-post pointer.
        let topic = Topic::find()
            .filter(topic::Column::Slug.eq(topic_slug))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Topic"))?;

        ensure_writable(&topic, actor)?;

        if let Some(parent_id) = input.parent_id {
            let parent = Post::find_by_id(parent_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::not_found("Parent post"))?;
            check_parent(&parent, topic.id)?;
        }

        let now = chrono::Utc::now().naive_utc();
        let post = post::ActiveModel {
            content: Set(input.content),
            author_id: Set(actor.user_id),
            topic_id: Set(topic.id),
            parent_id: Set(input.parent_id),
            is_edited: Set(false),
            reactions: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        last_post::record(&txn, topic, &post, &actor.username).await?;
        txn.commit().await?;

        tracing::debug!(post_id = post.id, topic_id = post.topic_id, "Post created");
        Ok(post)
    }

    pub async fn update(&self, actor: &Actor, id: i32, content: String) -> AppResult<PostModel> {
        let txn = self.db.begin().await?;
        let (existing, topic) = lock_with_topic(&txn, id).await?;

        actor.require_author_or_admin(existing.author_id)?;
        ensure_writable(&topic, actor)?;

        let mut active: post::ActiveModel = existing.into();
        active.content = Set(content);
        active.is_edited = Set(true);
        active.updated_at = Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Remove a post with its direct replies and re-point the topic's
    /// last-post fields at whatever remains.
    pub async fn delete(&self, actor: &Actor, id: i32) -> AppResult<TopicModel> {
        let txn = self.db.begin().await?;
        let (existing, topic) = lock_with_topic(&txn, id).await?;

        actor.require_author_or_admin(existing.author_id)?;

        let replies = Post::delete_many()
            .filter(post::Column::ParentId.eq(existing.id))
            .exec(&txn)
            .await?;
        Post::delete_by_id(existing.id).exec(&txn).await?;

        let topic = last_post::recompute(&txn, topic.id).await?;
        txn.commit().await?;

        tracing::info!(
            post_id = id,
            replies = replies.rows_affected,
            "Post deleted"
        );
        Ok(topic)
    }

    pub async fn toggle_reaction(&self, actor: &Actor, id: i32, emoji: &str) -> AppResult<PostModel> {
        let txn = self.db.begin().await?;

        let (existing, topic) = lock_with_topic(&txn, id).await?;
        ensure_writable(&topic, actor)?;

        let reactions = toggle_reaction(existing.reactions.clone(), emoji, actor.user_id);
        let mut active: post::ActiveModel = existing.into();
        active.reactions = Set(reactions);

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }
}

async fn find_topic_by_slug<C: ConnectionTrait>(conn: &C, slug: &str) -> AppResult<TopicModel> {
    Topic::find()
        .filter(topic::Column::Slug.eq(slug))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Topic"))
}

/// Lock the post's topic row, then the post row. Same order as `create` and
/// topic deletion, so every last-post write for a topic is serialized.
async fn lock_with_topic<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<(PostModel, TopicModel)> {
    let topic_id = Post::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?
        .topic_id;

    let topic = Topic::find_by_id(topic_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Topic"))?;

    // The post may have gone while we waited on the topic lock.
    let post = Post::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    Ok((post, topic))
}

fn ensure_writable(topic: &TopicModel, actor: &Actor) -> AppResult<()> {
    if topic.is_locked && !actor.is_admin {
        return Err(AppError::Locked);
    }
    Ok(())
}

/// A reply must target a root post of the same topic.
fn check_parent(parent: &PostModel, topic_id: i32) -> AppResult<()> {
    if parent.topic_id != topic_id {
        return Err(AppError::Validation(
            "Parent post belongs to a different topic".to_string(),
        ));
    }
    if !parent.is_root() {
        return Err(AppError::Validation(
            "Cannot reply to a reply".to_string(),
        ));
    }
    Ok(())
}

/// Add `user_id` under `emoji`, or remove it if already there. Emojis with
/// no remaining users are dropped, and an empty map becomes `None`.
pub fn toggle_reaction(current: Option<Json>, emoji: &str, user_id: i32) -> Option<Json> {
    let mut map: BTreeMap<String, Vec<i32>> = match current {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding malformed post reactions");
            BTreeMap::new()
        }),
        None => BTreeMap::new(),
    };

    let users = map.entry(emoji.to_string()).or_default();
    match users.iter().position(|&u| u == user_id) {
        Some(idx) => {
            users.remove(idx);
        }
        None => users.push(user_id),
    }
    map.retain(|_, users| !users.is_empty());

    if map.is_empty() {
        None
    } else {
        serde_json::to_value(map).ok()
    }
}
