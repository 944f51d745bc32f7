use sea_orm_migration::prelude::*;
use sha2::Digest as _;

use crate::m20240601_000001_init::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

const SITES: [u128; 2] = [0x5173_0001, 0x5173_0002];
const STAFF_PER_SITE: u128 = 20;
const ADMIN: u128 = 12345;

fn uuid(id: u128) -> SimpleExpr {
    Expr::val(format!("{:032x}", id)).cast_as("uuid")
}

fn date(value: &str) -> SimpleExpr {
    Expr::val(value).cast_as("date")
}

fn hashed(username: &str) -> Vec<u8> {
    sha2::Sha256::digest(format!("{}:{}", username, username)).to_vec()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let time = Expr::val("2024-06-01T00:00:00.000Z").cast_as("timestamptz");
        let columns = ["id", "created_at", "updated_at", "username", "password", "role", "salary", "site_id", "joining_date", "exit_date"];

        for (site_index, site) in SITES.iter().enumerate() {
            // A manager per site, followed by its staff
            let manager_id = (site_index as u128 + 1) * 1000;
            let username = format!("manager{}", site_index + 1);

            manager
                .exec_stmt(Query::insert()
                    .into_table(User::Table)
                    .columns(columns)
                    .values_panic([uuid(manager_id), time.clone(), time.clone(), username.clone().into(), hashed(&username).into(), Expr::val("manager").cast_as("role_type"), 45_000i64.into(), uuid(*site), date("2022-01-10"), Expr::val(Option::<String>::None).cast_as("date")])
                    .to_owned()
            ).await?;

            for i in 1..=STAFF_PER_SITE {
                let id = manager_id + i;
                let username = format!("staff{}", id);
                let salary: i64 = rand::random_range(12_000..=30_000);

                // A handful join or leave during the seeded month
                let joining_date = match i {
                    19 => "2024-06-12",
                    _ => "2023-03-01",
                };
                let exit_date = match i {
                    20 => Some("2024-06-20"),
                    _ => None,
                };

                manager
                    .exec_stmt(Query::insert()
                        .into_table(User::Table)
                        .columns(columns)
                        .values_panic([uuid(id), time.clone(), time.clone(), username.clone().into(), hashed(&username).into(), Expr::val("staff").cast_as("role_type"), salary.into(), uuid(*site), date(joining_date), Expr::val(exit_date.map(str::to_string)).cast_as("date")])
                        .to_owned()
                ).await?;
            }
        }

        manager
            .exec_stmt(Query::insert()
                .into_table(User::Table)
                .columns(columns)
                .values_panic([uuid(ADMIN), time.clone(), time.clone(), "admin".into(), hashed("admin").into(), Expr::val("admin").cast_as("role_type"), 0i64.into(), Expr::val(Option::<String>::None).cast_as("uuid"), Expr::val(Option::<String>::None).cast_as("date"), Expr::val(Option::<String>::None).cast_as("date")])
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut ids = vec![ADMIN];
        for site_index in 0..SITES.len() as u128 {
            let manager_id = (site_index + 1) * 1000;
            ids.extend(manager_id..=manager_id + STAFF_PER_SITE);
        }

        for id in ids {
            manager
                .exec_stmt(Query::delete()
                    .from_table(User::Table)
                    .and_where(Expr::col("id").eq(uuid(id)))
                    .to_owned()
            ).await?;
        }

        Ok(())
    }
}
