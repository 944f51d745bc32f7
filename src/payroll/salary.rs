/// Pay for a single working day of the salary month
///
/// Zero when the month has no working days, never NaN or infinite.
pub fn daily_rate(base_salary: f64, working_days: u32) -> f64 {
    if working_days == 0 {
        return 0.0;
    }

    base_salary / working_days as f64
}

/// `(base_salary / working_days) * present_days`
///
/// `working_days` must be the whole salary month's count even when only part of the
/// month is being reported on.
pub fn earned_salary(base_salary: f64, working_days: u32, present_days: f64) -> f64 {
    daily_rate(base_salary, working_days) * present_days
}
