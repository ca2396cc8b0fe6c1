//! Maintains the denormalized `last_post_*` pointer on a topic.
//!
//! Both entry points take a connection so callers run them inside the
//! transaction that created or deleted the post.

use crate::{
    error::{AppError, AppResult},
    models::{post, topic, Post, PostModel, Topic, TopicModel, User},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// The three pointer columns, always written together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastPost {
    pub id: Option<i32>,
    pub at: Option<sea_orm::prelude::DateTime>,
    pub user: Option<String>,
}

impl LastPost {
    pub fn of(post: &PostModel, username: &str) -> Self {
        Self {
            id: Some(post.id),
            at: Some(post.created_at),
            user: Some(username.to_string()),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}

/// Point `topic` at a freshly created post.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    topic: TopicModel,
    post: &PostModel,
    author_username: &str,
) -> AppResult<TopicModel> {
    write(conn, topic, LastPost::of(post, author_username)).await
}

/// Re-derive the pointer from the newest surviving post, or clear it.
pub async fn recompute<C: ConnectionTrait>(conn: &C, topic_id: i32) -> AppResult<TopicModel> {
    let topic = Topic::find_by_id(topic_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Topic"))?;

    let latest = Post::find()
        .filter(post::Column::TopicId.eq(topic_id))
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
        .one(conn)
        .await?;

    let pointer = match latest {
        Some(post) => {
            let author = User::find_by_id(post.author_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "post {} references missing author {}",
                        post.id,
                        post.author_id
                    ))
                })?;
            LastPost::of(&post, &author.username)
        }
        None => LastPost::cleared(),
    };

    write(conn, topic, pointer).await
}

async fn write<C: ConnectionTrait>(
    conn: &C,
    topic: TopicModel,
    pointer: LastPost,
) -> AppResult<TopicModel> {
    let mut active: topic::ActiveModel = topic.into();
    active.last_post_id = Set(pointer.id);
    active.last_post_at = Set(pointer.at);
    active.last_post_user = Set(pointer.user);
    Ok(active.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_at(id: i32, minute: u32) -> PostModel {
        let created_at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap();
        PostModel {
            id,
            content: "body".to_string(),
            author_id: 1,
            topic_id: 1,
            parent_id: None,
            is_edited: false,
            reactions: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn pointer_copies_post_identity() {
        let post = post_at(9, 30);
        let pointer = LastPost::of(&post, "alice");
        assert_eq!(pointer.id, Some(9));
        assert_eq!(pointer.at, Some(post.created_at));
        assert_eq!(pointer.user.as_deref(), Some("alice"));
    }

    #[test]
    fn cleared_pointer_is_all_null() {
        let pointer = LastPost::cleared();
        assert!(pointer.id.is_none() && pointer.at.is_none() && pointer.user.is_none());
    }
}
