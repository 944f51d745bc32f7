use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{entity::holiday, utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayKind<'a> {
    Working,
    Weekend,
    Holiday { name: &'a str },
}

/// Holiday records indexed for lookups by date and site
///
/// A record without a site applies to every site. Several records may exist for
/// the same day; any one of them makes the day non-working.
#[derive(Debug, Default)]
pub struct HolidayCalendar<'a> {
    global: HashMap<NaiveDate, &'a str>,
    by_site: HashMap<Uuid, HashMap<NaiveDate, &'a str>>,
}

impl<'a> HolidayCalendar<'a> {
    pub fn new(holidays: impl IntoIterator<Item = &'a holiday::Model>) -> Self {
        let mut calendar = Self::default();

        for holiday in holidays {
            let dates = match holiday.site_id {
                Some(site_id) => calendar.by_site.entry(site_id).or_default(),
                None => &mut calendar.global,
            };

            dates.entry(holiday.date).or_insert(holiday.name.as_str());
        }

        calendar
    }

    /// Name of the holiday covering `date` for someone at `site_id`, global ones first
    pub fn holiday_name(&self, date: NaiveDate, site_id: Option<Uuid>) -> Option<&'a str> {
        if let Some(name) = self.global.get(&date) {
            return Some(*name);
        }

        site_id
            .and_then(|site_id| self.by_site.get(&site_id))
            .and_then(|dates| dates.get(&date))
            .copied()
    }

    pub fn day_kind(&self, date: NaiveDate, site_id: Option<Uuid>) -> DayKind<'a> {
        if utils::is_weekend(date) {
            return DayKind::Weekend;
        }

        match self.holiday_name(date, site_id) {
            Some(name) => DayKind::Holiday { name },
            None => DayKind::Working,
        }
    }

    pub fn is_working_day(&self, date: NaiveDate, site_id: Option<Uuid>) -> bool {
        self.day_kind(date, site_id) == DayKind::Working
    }

    pub fn working_dates(&self, start: NaiveDate, end: NaiveDate, site_id: Option<Uuid>) -> impl Iterator<Item = NaiveDate> + '_ {
        utils::days(start, end).filter(move |date| self.is_working_day(*date, site_id))
    }

    /// Working days in `[start, end]`, zero when the range is inverted
    pub fn working_days(&self, start: NaiveDate, end: NaiveDate, site_id: Option<Uuid>) -> u32 {
        self.working_dates(start, end, site_id).count() as u32
    }
}

pub fn working_days(start: NaiveDate, end: NaiveDate, holidays: &[holiday::Model], site_id: Option<Uuid>) -> u32 {
    HolidayCalendar::new(holidays).working_days(start, end, site_id)
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Local;

    use super::*;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn holiday(date: NaiveDate, name: &str, site_id: Option<Uuid>) -> holiday::Model {
        holiday::Model {
            id: Uuid::new_v4(),
            created_at: Local::now().into(),
            updated_at: Local::now().into(),
            created_by: None,
            updated_by: None,
            date,
            name: name.to_string(),
            site_id,
        }
    }

    #[test]
    fn test_working_days_excludes_weekends() {
        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 30), &[], None), 20);
        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 2), &[], None), 0);
    }

    #[test]
    fn test_inverted_range_is_zero() {
        assert_eq!(working_days(date(2024, 6, 30), date(2024, 6, 1), &[], None), 0);
        assert_eq!(working_days(date(2024, 6, 4), date(2024, 6, 3), &[], None), 0);
    }

    #[test]
    fn test_global_and_site_holidays() {
        let site_a = Uuid::new_v4();
        let site_b = Uuid::new_v4();

        // Wednesday and Thursday
        let holidays = vec![
            holiday(date(2024, 6, 12), "Founders day", None),
            holiday(date(2024, 6, 13), "Market closure", Some(site_a)),
        ];

        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 30), &holidays, Some(site_a)), 18);
        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 30), &holidays, Some(site_b)), 19);
        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 30), &holidays, None), 19);
    }

    #[test]
    fn test_duplicate_holidays_count_once() {
        let holidays = vec![
            holiday(date(2024, 6, 12), "Founders day", None),
            holiday(date(2024, 6, 12), "Founders day (again)", None),
        ];

        assert_eq!(working_days(date(2024, 6, 10), date(2024, 6, 14), &holidays, None), 4);
    }

    #[test]
    fn test_only_non_working_days_is_zero() {
        let site = Uuid::new_v4();
        let holidays = vec![
            holiday(date(2024, 6, 3), "a", None),
            holiday(date(2024, 6, 4), "b", Some(site)),
            holiday(date(2024, 6, 5), "c", None),
            holiday(date(2024, 6, 6), "d", Some(site)),
            holiday(date(2024, 6, 7), "e", None),
        ];

        assert_eq!(working_days(date(2024, 6, 1), date(2024, 6, 9), &holidays, Some(site)), 0);
    }

    #[test]
    fn test_day_kind() {
        let site = Uuid::new_v4();
        let holidays = vec![holiday(date(2024, 6, 13), "Market closure", Some(site))];
        let calendar = HolidayCalendar::new(&holidays);

        assert_eq!(calendar.day_kind(date(2024, 6, 15), Some(site)), DayKind::Weekend);
        assert_eq!(calendar.day_kind(date(2024, 6, 13), Some(site)), DayKind::Holiday { name: "Market closure" });
        assert_eq!(calendar.day_kind(date(2024, 6, 13), None), DayKind::Working);
        assert_eq!(calendar.holiday_name(date(2024, 6, 13), Some(site)), Some("Market closure"));
    }
}
