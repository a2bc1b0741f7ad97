use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

use crate::m20251101_000001_url_table::Url;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 按用户列出链接
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_user_id")
                    .table(Url::Table)
                    .col(Url::UserId)
                    .col(Url::IsDeleted)
                    .to_owned(),
            )
            .await?;

        // 去重查询；MySQL 无法直接索引 TEXT 列
        if manager.get_database_backend() != DbBackend::MySql {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_url_original_url")
                        .table(Url::Table)
                        .col(Url::OriginalUrl)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DbBackend::MySql {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_url_original_url")
                        .table(Url::Table)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .drop_index(
                Index::drop()
                    .name("idx_url_user_id")
                    .table(Url::Table)
                    .to_owned(),
            )
            .await
    }
}
