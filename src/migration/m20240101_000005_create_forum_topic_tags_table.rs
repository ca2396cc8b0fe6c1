use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS forum_topic_tags (
                id SERIAL PRIMARY KEY,
                topic_id INTEGER NOT NULL REFERENCES forum_topics(id),
                name VARCHAR(30) NOT NULL
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_forum_topic_tags_pair
             ON forum_topic_tags(topic_id, name)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_forum_topic_tags_name ON forum_topic_tags(name)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS forum_topic_tags")
            .await?;
        Ok(())
    }
}
