use sea_orm_migration::{prelude::{extension::postgres::TypeDropStatement, *}, sea_orm::{ActiveEnum, DbBackend, DeriveActiveEnum, EnumIter, Schema}};

use crate::util::{default_table_statement, default_user_table_statement, setup_authored_table, with_staff, StaffColumn};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager
            .create_type(
                schema.create_enum_from_active_enum::<RoleType>()
            ).await?;

        manager
            .create_type(
                schema.create_enum_from_active_enum::<AttendanceStatus>()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(User::Table)
                .col(ColumnDef::new(User::Username)
                    .text()
                    .unique_key()
                    .not_null())
                .col(ColumnDef::new(User::Password)
                    .binary()
                    .not_null()) // sha256 of `password:username`
                .col(ColumnDef::new(User::Role)
                    .custom(RoleType::name())
                    .not_null())
                .col(ColumnDef::new(User::Salary)
                    .big_integer()
                    .not_null()) // whole currency units per month
                .col(ColumnDef::new(User::SiteId)
                    .uuid())
                .col(ColumnDef::new(User::JoiningDate)
                    .date())
                .col(ColumnDef::new(User::ExitDate)
                    .date())
                .take()
            ).await?;

        manager
            .create_table(default_user_table_statement()
                .table(Holiday::Table)
                .col(ColumnDef::new(Holiday::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(Holiday::Name)
                    .text()
                    .not_null())
                .col(ColumnDef::new(Holiday::SiteId)
                    .uuid()) // null applies to every site
                .take()
            ).await?;
        setup_authored_table(manager, Holiday::Table).await?;

        manager
            .create_index(Index::create()
                .name("idx_holiday_date")
                .table(Holiday::Table)
                .col(Holiday::Date)
                .take()
            ).await?;

        manager
            .create_table(with_staff(&mut default_user_table_statement())
                .table(Attendance::Table)
                .col(ColumnDef::new(Attendance::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(Attendance::Status)
                    .custom(AttendanceStatus::name())
                    .not_null())
                .col(ColumnDef::new(Attendance::Note)
                    .text())
                .take()
            ).await?;
        setup_authored_table(manager, Attendance::Table).await?;

        // One record per employee and day; writes merge into it
        manager
            .create_index(Index::create()
                .name("idx_attendance_staff_date")
                .table(Attendance::Table)
                .col(StaffColumn::StaffId)
                .col(Attendance::Date)
                .unique()
                .take()
            ).await?;

        manager
            .create_table(with_staff(&mut default_user_table_statement())
                .table(SalaryAdvance::Table)
                .col(ColumnDef::new(SalaryAdvance::Amount)
                    .big_integer()
                    .not_null())
                .col(ColumnDef::new(SalaryAdvance::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(SalaryAdvance::Note)
                    .text())
                .take()
            ).await?;
        setup_authored_table(manager, SalaryAdvance::Table).await?;

        manager
            .create_index(Index::create()
                .name("idx_salary_advance_staff_date")
                .table(SalaryAdvance::Table)
                .col(StaffColumn::StaffId)
                .col(SalaryAdvance::Date)
                .take()
            ).await?;

        manager
            .create_table(with_staff(&mut default_user_table_statement())
                .table(SalaryPayment::Table)
                .col(ColumnDef::new(SalaryPayment::AmountPaid)
                    .big_integer()
                    .not_null())
                .col(ColumnDef::new(SalaryPayment::ForMonth)
                    .small_integer()
                    .not_null()
                    .check(Expr::col(SalaryPayment::ForMonth).between(1, 12)))
                .col(ColumnDef::new(SalaryPayment::ForYear)
                    .integer()
                    .not_null())
                .col(ColumnDef::new(SalaryPayment::PaymentDate)
                    .date()
                    .not_null())
                .take()
            ).await?;
        setup_authored_table(manager, SalaryPayment::Table).await?;

        manager
            .create_index(Index::create()
                .name("idx_salary_payment_staff_month")
                .table(SalaryPayment::Table)
                .col(StaffColumn::StaffId)
                .col(SalaryPayment::ForYear)
                .col(SalaryPayment::ForMonth)
                .take()
            ).await?;

        manager
            .create_table(with_staff(&mut default_user_table_statement())
                .table(SalaryHistory::Table)
                .col(ColumnDef::new(SalaryHistory::OldSalary)
                    .big_integer()
                    .not_null())
                .col(ColumnDef::new(SalaryHistory::NewSalary)
                    .big_integer()
                    .not_null())
                .col(ColumnDef::new(SalaryHistory::EffectiveDate)
                    .date()
                    .not_null())
                .take()
            ).await?;
        setup_authored_table(manager, SalaryHistory::Table).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            SalaryHistory::Table.into_iden(),
            SalaryPayment::Table.into_iden(),
            SalaryAdvance::Table.into_iden(),
            Attendance::Table.into_iden(),
            Holiday::Table.into_iden(),
            User::Table.into_iden(),
        ] {
            manager
                .drop_table(
                    TableDropStatement::new()
                        .table(table)
                        .take()
                ).await?;
        }

        for name in [AttendanceStatus::name(), RoleType::name()] {
            manager
                .drop_type(
                    TypeDropStatement::new()
                        .name(name)
                        .to_owned()
                ).await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
pub(crate) enum User {
    Table,
    Username,
    Password,
    Role,
    Salary,
    SiteId,
    JoiningDate,
    ExitDate,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "role_type")]
enum RoleType {
    #[sea_orm(string_value = "staff")]
    Staff,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status")]
enum AttendanceStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "leave")]
    Leave,
    #[sea_orm(string_value = "half_day")]
    HalfDay,
}

#[derive(DeriveIden, Clone, Copy)]
enum Holiday {
    Table,
    Date,
    Name,
    SiteId,
}

#[derive(DeriveIden, Clone, Copy)]
enum Attendance {
    Table,
    Date,
    Status,
    Note,
}

#[derive(DeriveIden, Clone, Copy)]
enum SalaryAdvance {
    Table,
    Amount,
    Date,
    Note,
}

#[derive(DeriveIden, Clone, Copy)]
enum SalaryPayment {
    Table,
    AmountPaid,
    ForMonth,
    ForYear,
    PaymentDate,
}

#[derive(DeriveIden, Clone, Copy)]
enum SalaryHistory {
    Table,
    OldSalary,
    NewSalary,
    EffectiveDate,
}
