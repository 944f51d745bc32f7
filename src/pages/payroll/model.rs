use super::*;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct PayrollQuery {
    pub(super) year: i32,
    pub(super) month: u32,
    pub(super) from: Option<NaiveDate>,
    pub(super) to: Option<NaiveDate>,
    pub(super) site_id: Option<Uuid>,
}

impl PayrollQuery {
    /// The whole month, or the `[from, to]` part of it when either is given
    pub(super) fn window(&self) -> Result<ReportWindow, Error> {
        let Some(month) = SalaryMonth::new(self.year, self.month) else {
            return Err(Error::bad_request("invalid year or month"));
        };

        if self.from.is_none() && self.to.is_none() {
            return Ok(ReportWindow::whole(month));
        }

        let start = self.from.unwrap_or(month.first_day());
        let end = self.to.unwrap_or(month.last_day());

        if !month.contains(start) {
            return Err(Error::bad_request("`from` is outside the requested month"));
        }

        ReportWindow::within(start, end).ok_or_else(|| Error::bad_request("`to` is before `from`"))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct PayrollResponse {
    pub(super) report: PayrollReport,
    pub(super) failures: Vec<SourceFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CreateAdvance {
    pub(super) staff_id: Uuid,
    pub(super) amount: i64,
    #[serde(default)]
    pub(super) date: Option<NaiveDate>,
    #[serde(default)]
    pub(super) note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CreatePayment {
    pub(super) staff_id: Uuid,
    pub(super) amount_paid: i64,
    pub(super) year: i32,
    pub(super) month: u32,
    #[serde(default)]
    pub(super) payment_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentReceipt {
    pub(super) payment: salary_payment::Model,
    /// The staff member's payroll row with this payment counted
    pub(super) row: Option<PayrollRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct UpdateSalary {
    pub(super) salary: i64,
    #[serde(default)]
    pub(super) effective_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(super) struct SalaryChange {
    pub(super) staff: user::Model,
    pub(super) history: salary_history::Model,
}
