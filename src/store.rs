//! The database client every service and page goes through
//!
//! Built once in `main` and handed out as app data. Every write publishes a
//! [`Change`] once it commits so live subscriptions can refetch.

use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::{Local, NaiveDate};
use sea_orm::{
    ActiveValue::{Set, Unchanged}, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    entity::{attendance, holiday, prelude::*, salary_advance, salary_history, salary_payment, sea_orm_active_enums::{AttendanceStatus, RoleType}, user},
    error::Error,
    fanout::feed::{Change, ChangeFeed, Collection},
    payroll::period::SalaryMonth,
};

/// Fields to change on an attendance record; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct AttendancePatch {
    pub status: Option<AttendanceStatus>,
    /// An empty note clears it
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAdvance {
    pub staff_id: Uuid,
    pub amount: i64,
    pub date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub staff_id: Uuid,
    pub amount_paid: i64,
    pub month: SalaryMonth,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewHoliday {
    pub date: NaiveDate,
    pub name: String,
    pub site_id: Option<Uuid>,
}

/// The reads a live payroll view subscribes to, plus the one write it makes
pub trait PayrollSource: Clone + 'static {
    fn feed(&self) -> &ChangeFeed;

    fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> impl Future<Output = Result<Vec<holiday::Model>, Error>> + 'static + use<Self>;

    fn attendance_for(
        &self,
        staff_ids: Vec<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<attendance::Model>>, Error>> + 'static + use<Self>;

    fn advances_for(
        &self,
        staff_ids: Vec<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_advance::Model>>, Error>> + 'static + use<Self>;

    fn payments_for(
        &self,
        staff_ids: Vec<Uuid>,
        month: SalaryMonth,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_payment::Model>>, Error>> + 'static + use<Self>;

    fn record_payment(&self, payment: NewPayment, author: Uuid) -> impl Future<Output = Result<salary_payment::Model, Error>> + 'static + use<Self>;
}

/// Groups `rows` by staff id, with an entry for every id even when it has no rows
pub(crate) fn group_by_staff<M>(staff_ids: &[Uuid], rows: Vec<M>, staff_id: impl Fn(&M) -> Uuid) -> HashMap<Uuid, Vec<M>> {
    let mut grouped = staff_ids.iter().map(|id| (*id, Vec::new())).collect::<HashMap<_, _>>();

    for row in rows {
        grouped.entry(staff_id(&row)).or_default().push(row);
    }

    grouped
}

fn non_empty(note: Option<String>) -> Option<String> {
    note.filter(|note| !note.trim().is_empty())
}

/// Merges `patch` into the record for `(staff_id, date)`, creating it if needed
async fn merge_attendance<C: ConnectionTrait>(
    conn: &C,
    staff_id: Uuid,
    date: NaiveDate,
    patch: AttendancePatch,
    author: Uuid,
) -> Result<attendance::Model, Error> {
    let now = Local::now().fixed_offset();

    let existing = Attendance::find()
        .filter(attendance::Column::StaffId.eq(staff_id))
        .filter(attendance::Column::Date.eq(date))
        .one(conn)
        .await?;

    let Some(existing) = existing else {
        let Some(status) = patch.status else {
            return Err(Error::bad_request("a status is required to record new attendance"));
        };

        return Ok(Attendance::insert(attendance::ActiveModel {
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(Some(author)),
            updated_by: Set(Some(author)),
            staff_id: Set(staff_id),
            date: Set(date),
            status: Set(status),
            note: Set(non_empty(patch.note)),
            ..Default::default()
        })
        .exec_with_returning(conn)
        .await?);
    };

    let mut model = attendance::ActiveModel {
        id: Unchanged(existing.id),
        updated_at: Set(now),
        updated_by: Set(Some(author)),
        ..Default::default()
    };

    if let Some(status) = patch.status {
        model.status = Set(status);
    }

    if let Some(note) = patch.note {
        model.note = Set(non_empty(Some(note)));
    }

    Ok(Attendance::update(model).exec(conn).await?)
}

#[derive(Debug, Clone)]
pub struct Store {
    db: Arc<DatabaseConnection>,
    feed: ChangeFeed,
}

impl Store {
    pub fn new(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db: Arc::new(db), feed }
    }

    pub async fn staff(&self, staff_id: Uuid) -> Result<Option<user::Model>, Error> {
        Ok(User::find_by_id(staff_id).one(&*self.db).await?)
    }

    pub async fn user_by_credentials(&self, username: &str, password: &[u8]) -> Result<Option<user::Model>, Error> {
        Ok(User::find()
            .filter(user::Column::Username.eq(username))
            .filter(user::Column::Password.eq(password))
            .one(&*self.db)
            .await?)
    }

    /// Staff and managers employed at some point during `month`, by username
    pub async fn payroll_staff(&self, month: SalaryMonth, site_id: Option<Uuid>) -> Result<Vec<user::Model>, Error> {
        let mut query = User::find()
            .filter(user::Column::Role.is_in([RoleType::Staff, RoleType::Manager]))
            .filter(
                Condition::any()
                    .add(user::Column::JoiningDate.is_null())
                    .add(user::Column::JoiningDate.lte(month.last_day())),
            )
            .filter(
                Condition::any()
                    .add(user::Column::ExitDate.is_null())
                    .add(user::Column::ExitDate.gte(month.first_day())),
            );

        if let Some(site_id) = site_id {
            query = query.filter(user::Column::SiteId.eq(site_id));
        }

        Ok(query.order_by_asc(user::Column::Username).all(&*self.db).await?)
    }

    pub async fn salary_history(&self, staff_id: Uuid) -> Result<Vec<salary_history::Model>, Error> {
        Ok(SalaryHistory::find()
            .filter(salary_history::Column::StaffId.eq(staff_id))
            .order_by_desc(salary_history::Column::EffectiveDate)
            .all(&*self.db)
            .await?)
    }

    /// Creates or merges into the single record for `(staff_id, date)`
    pub async fn upsert_attendance(&self, staff_id: Uuid, date: NaiveDate, patch: AttendancePatch, author: Uuid) -> Result<attendance::Model, Error> {
        let txn = self.db.begin().await?;
        let model = merge_attendance(&txn, staff_id, date, patch, author).await?;
        txn.commit().await?;

        debug!(%staff_id, %date, status = ?model.status, "attendance recorded");
        self.feed.publish(Change::of(Collection::Attendance, staff_id));

        Ok(model)
    }

    /// Upserts every `(staff_id, patch)` for `date` in one transaction
    ///
    /// Either all records are written or none are. Changes are published only once
    /// the whole batch commits.
    pub async fn upsert_attendance_many(
        &self,
        date: NaiveDate,
        entries: Vec<(Uuid, AttendancePatch)>,
        author: Uuid,
    ) -> Result<Vec<attendance::Model>, Error> {
        let txn = self.db.begin().await?;

        let mut models = Vec::with_capacity(entries.len());
        for (staff_id, patch) in entries {
            models.push(merge_attendance(&txn, staff_id, date, patch, author).await?);
        }

        txn.commit().await?;

        debug!(%date, recorded = models.len(), "attendance batch recorded");
        for model in &models {
            self.feed.publish(Change::of(Collection::Attendance, model.staff_id));
        }

        Ok(models)
    }

    pub async fn insert_advance(&self, advance: NewAdvance, author: Uuid) -> Result<salary_advance::Model, Error> {
        let now = Local::now().fixed_offset();

        let model = SalaryAdvance::insert(salary_advance::ActiveModel {
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(Some(author)),
            updated_by: Set(Some(author)),
            staff_id: Set(advance.staff_id),
            amount: Set(advance.amount),
            date: Set(advance.date),
            note: Set(non_empty(advance.note)),
            ..Default::default()
        })
        .exec_with_returning(&*self.db)
        .await?;

        self.feed.publish(Change::of(Collection::Advances, model.staff_id));

        Ok(model)
    }

    pub async fn insert_payment(&self, payment: NewPayment, author: Uuid) -> Result<salary_payment::Model, Error> {
        let now = Local::now().fixed_offset();

        let model = SalaryPayment::insert(salary_payment::ActiveModel {
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(Some(author)),
            updated_by: Set(Some(author)),
            staff_id: Set(payment.staff_id),
            amount_paid: Set(payment.amount_paid),
            for_month: Set(payment.month.month() as i16),
            for_year: Set(payment.month.year()),
            payment_date: Set(payment.payment_date),
            ..Default::default()
        })
        .exec_with_returning(&*self.db)
        .await?;

        info!(staff_id = %model.staff_id, amount = model.amount_paid, month = model.for_month, year = model.for_year, "salary payment recorded");
        self.feed.publish(Change::of(Collection::Payments, model.staff_id));

        Ok(model)
    }

    /// Changes a salary and appends the history entry in one transaction
    pub async fn update_salary(
        &self,
        staff_id: Uuid,
        salary: i64,
        effective_date: NaiveDate,
        author: Uuid,
    ) -> Result<(user::Model, salary_history::Model), Error> {
        let now = Local::now().fixed_offset();
        let txn = self.db.begin().await?;

        let Some(staff) = User::find_by_id(staff_id).one(&txn).await? else {
            return Err(Error::NotFound("staff"));
        };

        let updated = User::update(user::ActiveModel {
            id: Unchanged(staff.id),
            updated_at: Set(now),
            salary: Set(salary),
            ..Default::default()
        })
        .exec(&txn)
        .await?;

        let history = SalaryHistory::insert(salary_history::ActiveModel {
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(Some(author)),
            updated_by: Set(Some(author)),
            staff_id: Set(staff.id),
            old_salary: Set(staff.salary),
            new_salary: Set(salary),
            effective_date: Set(effective_date),
            ..Default::default()
        })
        .exec_with_returning(&txn)
        .await?;

        txn.commit().await?;

        info!(%staff_id, old = staff.salary, new = salary, "salary updated");
        self.feed.publish(Change::of(Collection::Staff, staff_id));
        self.feed.publish(Change::of(Collection::SalaryHistory, staff_id));

        Ok((updated, history))
    }

    pub async fn insert_holiday(&self, holiday: NewHoliday, author: Uuid) -> Result<holiday::Model, Error> {
        let now = Local::now().fixed_offset();

        let model = Holiday::insert(holiday::ActiveModel {
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(Some(author)),
            updated_by: Set(Some(author)),
            date: Set(holiday.date),
            name: Set(holiday.name),
            site_id: Set(holiday.site_id),
            ..Default::default()
        })
        .exec_with_returning(&*self.db)
        .await?;

        self.feed.publish(Change::of(Collection::Holidays, None));

        Ok(model)
    }

    pub async fn delete_holiday(&self, holiday_id: Uuid) -> Result<(), Error> {
        let res = Holiday::delete_by_id(holiday_id).exec(&*self.db).await?;

        if res.rows_affected == 0 {
            return Err(Error::NotFound("holiday"));
        }

        self.feed.publish(Change::of(Collection::Holidays, None));

        Ok(())
    }
}

impl PayrollSource for Store {
    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> impl Future<Output = Result<Vec<holiday::Model>, Error>> + 'static + use<> {
        let db = self.db.clone();

        async move {
            Ok(Holiday::find()
                .filter(holiday::Column::Date.between(start, end))
                .order_by_asc(holiday::Column::Date)
                .all(&*db)
                .await?)
        }
    }

    fn attendance_for(
        &self,
        staff_ids: Vec<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<attendance::Model>>, Error>> + 'static + use<> {
        let db = self.db.clone();

        async move {
            let rows = Attendance::find()
                .filter(attendance::Column::StaffId.is_in(staff_ids.clone()))
                .filter(attendance::Column::Date.between(start, end))
                .all(&*db)
                .await?;

            Ok(group_by_staff(&staff_ids, rows, |row| row.staff_id))
        }
    }

    fn advances_for(
        &self,
        staff_ids: Vec<Uuid>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_advance::Model>>, Error>> + 'static + use<> {
        let db = self.db.clone();

        async move {
            let rows = SalaryAdvance::find()
                .filter(salary_advance::Column::StaffId.is_in(staff_ids.clone()))
                .filter(salary_advance::Column::Date.between(start, end))
                .all(&*db)
                .await?;

            Ok(group_by_staff(&staff_ids, rows, |row| row.staff_id))
        }
    }

    fn payments_for(
        &self,
        staff_ids: Vec<Uuid>,
        month: SalaryMonth,
    ) -> impl Future<Output = Result<HashMap<Uuid, Vec<salary_payment::Model>>, Error>> + 'static + use<> {
        let db = self.db.clone();

        async move {
            let rows = SalaryPayment::find()
                .filter(salary_payment::Column::StaffId.is_in(staff_ids.clone()))
                .filter(salary_payment::Column::ForMonth.eq(month.month() as i16))
                .filter(salary_payment::Column::ForYear.eq(month.year()))
                .all(&*db)
                .await?;

            Ok(group_by_staff(&staff_ids, rows, |row| row.staff_id))
        }
    }

    fn record_payment(&self, payment: NewPayment, author: Uuid) -> impl Future<Output = Result<salary_payment::Model, Error>> + 'static + use<> {
        let store = self.clone();

        async move { store.insert_payment(payment, author).await }
    }
}
