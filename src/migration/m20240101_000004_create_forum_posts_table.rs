use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ForumPosts {
    Table,
    Id,
    Content,
    AuthorId,
    TopicId,
    ParentId,
    IsEdited,
    Reactions,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ForumTopics {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Deletion order (replies, roots, topic) is enforced by the service layer,
        // so none of these keys cascade.
        manager
            .create_table(
                Table::create()
                    .table(ForumPosts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ForumPosts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ForumPosts::Content).text().not_null())
                    .col(ColumnDef::new(ForumPosts::AuthorId).integer().not_null())
                    .col(ColumnDef::new(ForumPosts::TopicId).integer().not_null())
                    .col(ColumnDef::new(ForumPosts::ParentId).integer().null())
                    .col(
                        ColumnDef::new(ForumPosts::IsEdited)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ForumPosts::Reactions).json_binary().null())
                    .col(
                        ColumnDef::new(ForumPosts::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ForumPosts::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_forum_posts_author_id")
                            .from(ForumPosts::Table, ForumPosts::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_forum_posts_topic_id")
                            .from(ForumPosts::Table, ForumPosts::TopicId)
                            .to(ForumTopics::Table, ForumTopics::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_forum_posts_parent_id")
                            .from(ForumPosts::Table, ForumPosts::ParentId)
                            .to(ForumPosts::Table, ForumPosts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_forum_posts_topic_parent_created")
                    .table(ForumPosts::Table)
                    .col(ForumPosts::TopicId)
                    .col(ForumPosts::ParentId)
                    .col(ForumPosts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_forum_posts_parent_id")
                    .table(ForumPosts::Table)
                    .col(ForumPosts::ParentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ForumPosts::Table).to_owned())
            .await
    }
}
