pub use sea_orm_migration::prelude::*;

mod util;
mod m20240601_000001_init;
mod m20240601_000002_seed_staff;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_init::Migration),
            Box::new(m20240601_000002_seed_staff::Migration),
        ]
    }
}
