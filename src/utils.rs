use chrono::{Datelike as _, Local, NaiveDate, Weekday};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every calendar day from `start` to `end`, both inclusive
///
/// Yields nothing when `start` is after `end`.
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Narrows `[start, end]` to `[max(start, lower), min(end, upper)]`
///
/// The result may be inverted, callers treat that as an empty range.
pub fn clamp_range(
    start: NaiveDate,
    end: NaiveDate,
    lower: Option<NaiveDate>,
    upper: Option<NaiveDate>,
) -> (NaiveDate, NaiveDate) {
    let start = lower.map_or(start, |lower| start.max(lower));
    let end = upper.map_or(end, |upper| end.min(upper));

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_is_weekend() {
        assert!(is_weekend(date(2024, 6, 1)));
        assert!(is_weekend(date(2024, 6, 2)));
        assert!(!is_weekend(date(2024, 6, 3)));
        assert!(!is_weekend(date(2024, 6, 7)));
    }

    #[test]
    fn test_days() {
        let range = days(date(2024, 2, 27), date(2024, 3, 1)).collect::<Vec<_>>();

        assert_eq!(range, vec![date(2024, 2, 27), date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
        assert_eq!(days(date(2024, 6, 30), date(2024, 6, 30)).count(), 1);
        assert_eq!(days(date(2024, 7, 1), date(2024, 6, 30)).count(), 0);
    }

    #[test]
    fn test_clamp_range() {
        let (start, end) = clamp_range(date(2024, 6, 1), date(2024, 6, 30), Some(date(2024, 6, 10)), None);
        assert_eq!((start, end), (date(2024, 6, 10), date(2024, 6, 30)));

        let (start, end) = clamp_range(date(2024, 6, 1), date(2024, 6, 30), Some(date(2024, 5, 1)), Some(date(2024, 6, 20)));
        assert_eq!((start, end), (date(2024, 6, 1), date(2024, 6, 20)));

        let (start, end) = clamp_range(date(2024, 6, 1), date(2024, 6, 30), Some(date(2024, 7, 3)), None);
        assert!(start > end);
    }
}
