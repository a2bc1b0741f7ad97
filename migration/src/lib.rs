pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20251101_000001_url_table;
mod m20251101_000002_url_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251101_000001_url_table::Migration),
            Box::new(m20251101_000002_url_indexes::Migration),
        ]
    }
}
