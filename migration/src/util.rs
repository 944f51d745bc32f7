use sea_orm_migration::prelude::*;

pub(crate) fn default_table_statement() -> TableCreateStatement {
    TableCreateStatement::new()
        .if_not_exists()
        .col(ColumnDef::new(DefaultColumn::Id)
            .uuid()
            .primary_key()
            .default(Expr::cust("GEN_RANDOM_UUID()"))
            .take())
        .col(ColumnDef::new(DefaultColumn::CreatedAt)
            .timestamp_with_time_zone()
            .not_null()
            .take())
        .col(ColumnDef::new(DefaultColumn::UpdatedAt)
            .timestamp_with_time_zone()
            .not_null()
            .take())
        .take()
}

#[derive(DeriveIden)]
pub(crate) enum DefaultColumn {
    Id,
    CreatedAt,
    UpdatedAt,
}

/// A table whose rows remember which user created and last changed them
///
/// Run [`setup_authored_table`] on the table afterwards for the foreign keys.
pub(crate) fn default_user_table_statement() -> TableCreateStatement {
    default_table_statement()
        .col(ColumnDef::new(DefaultUserColumn::CreatedBy)
            .uuid())
        .col(ColumnDef::new(DefaultUserColumn::UpdatedBy)
            .uuid())
        .take()
}

#[derive(DeriveIden)]
pub(crate) enum DefaultUserColumn {
    CreatedBy,
    UpdatedBy,
}

#[derive(DeriveIden)]
pub(crate) enum StaffColumn {
    StaffId,
}

/// Points `created_by` and `updated_by` of `table` at `user`
pub(crate) async fn setup_authored_table(manager: &SchemaManager<'_>, table: impl IntoIden + Clone) -> Result<(), DbErr> {
    use crate::m20240601_000001_init::User;

    for column in [DefaultUserColumn::CreatedBy, DefaultUserColumn::UpdatedBy] {
        manager
            .create_foreign_key(ForeignKeyCreateStatement::new()
                .from(table.clone(), column)
                .to(User::Table, DefaultColumn::Id)
                .on_delete(ForeignKeyAction::SetNull)
                .on_update(ForeignKeyAction::Cascade)
                .take()
            ).await?;
    }

    Ok(())
}

/// Adds a `staff_id` column owned by a user; the rows go when the user does
pub(crate) fn with_staff(statement: &mut TableCreateStatement) -> &mut TableCreateStatement {
    use crate::m20240601_000001_init::User;

    statement
        .col(ColumnDef::new(StaffColumn::StaffId)
            .uuid()
            .not_null())
        .foreign_key(ForeignKey::create()
            .from_col(StaffColumn::StaffId)
            .to(User::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .on_update(ForeignKeyAction::Cascade))
}
