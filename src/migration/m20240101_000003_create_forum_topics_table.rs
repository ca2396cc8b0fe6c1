use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ForumTopics {
    Table,
    Id,
    Title,
    Slug,
    Content,
    AuthorId,
    CategoryId,
    IsPinned,
    IsLocked,
    ViewCount,
    LastPostId,
    LastPostAt,
    LastPostUser,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ForumCategories {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ForumTopics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ForumTopics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ForumTopics::Title).string_len(200).not_null())
                    .col(
                        ColumnDef::new(ForumTopics::Slug)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ForumTopics::Content).text().not_null())
                    .col(ColumnDef::new(ForumTopics::AuthorId).integer().not_null())
                    .col(ColumnDef::new(ForumTopics::CategoryId).integer().not_null())
                    .col(
                        ColumnDef::new(ForumTopics::IsPinned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ForumTopics::IsLocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ForumTopics::ViewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    // No FK: the pointer is recomputed inside the same transaction
                    // that deletes posts.
                    .col(ColumnDef::new(ForumTopics::LastPostId).integer().null())
                    .col(ColumnDef::new(ForumTopics::LastPostAt).timestamp().null())
                    .col(ColumnDef::new(ForumTopics::LastPostUser).string_len(50).null())
                    .col(
                        ColumnDef::new(ForumTopics::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ForumTopics::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_forum_topics_author_id")
                            .from(ForumTopics::Table, ForumTopics::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_forum_topics_category_id")
                            .from(ForumTopics::Table, ForumTopics::CategoryId)
                            .to(ForumCategories::Table, ForumCategories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_forum_topics_category_id")
                    .table(ForumTopics::Table)
                    .col(ForumTopics::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_forum_topics_pinned_last_post
                 ON forum_topics (is_pinned DESC, last_post_at DESC NULLS LAST)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ForumTopics::Table).to_owned())
            .await
    }
}
