//! The typed form of the page URL and the date arithmetic of the month view.

use chrono::{Datelike, Duration, Months, NaiveDate};
use url::Url;

use crate::source::{endpoint_for, sources_from_query, CalendarSource};

pub static MONTH_OFFSET_PARAM: &str = "monthOffset";

/// Everything the page URL configures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Months relative to the current month. Not clamped.
    pub month_offset: i32,
    pub sources: Vec<CalendarSource>,
}

impl ViewConfig {
    pub fn from_url(page: &Url) -> Self {
        Self::from_query(&endpoint_for(page), page)
    }

    /// Read the configuration from `page`, fetching through `endpoint`.
    pub fn from_query(endpoint: &Url, page: &Url) -> Self {
        let month_offset = parse_month_offset(
            page.query_pairs()
                .find(|(key, _)| key == MONTH_OFFSET_PARAM)
                .map(|(_, value)| value)
                .as_deref(),
        );
        ViewConfig {
            month_offset,
            sources: sources_from_query(endpoint, page.query_pairs()),
        }
    }

    /// The first day of the displayed month.
    pub fn initial_date(&self, today: NaiveDate) -> NaiveDate {
        initial_date(today, self.month_offset)
    }
}

/// A missing or malformed offset is 0.
///
/// The whole value must be an integer: a numeric prefix such as `3abc` or `1.5` is not read.
pub fn parse_month_offset(value: Option<&str>) -> i32 {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// The first day of the month `offset` months away from the month of `today`.
pub fn initial_date(today: NaiveDate, offset: i32) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    let months = Months::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    };
    shifted.unwrap_or(first)
}

/// A half-open range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day < end)
    }

    /// The range split into rows of seven days.
    pub fn weeks(&self) -> Vec<Vec<NaiveDate>> {
        self.days()
            .collect::<Vec<_>>()
            .chunks(7)
            .map(|week| week.to_vec())
            .collect()
    }
}

/// The whole weeks (Monday to Sunday) covering the month of `month`.
pub fn visible_range(month: NaiveDate) -> DateRange {
    let first = month.with_day(1).unwrap_or(month);
    let last = first
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::days(1))
        .unwrap_or(first);
    let start = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
    let end = last + Duration::days(7 - i64::from(last.weekday().num_days_from_monday()));
    DateRange { start, end }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use url::Url;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_parse_month_offset() {
        assert_eq!(parse_month_offset(None), 0);
        assert_eq!(parse_month_offset(Some("2")), 2);
        assert_eq!(parse_month_offset(Some("-3")), -3);
        assert_eq!(parse_month_offset(Some("-14")), -14);
        assert_eq!(parse_month_offset(Some("abc")), 0);
        assert_eq!(parse_month_offset(Some("")), 0);
        assert_eq!(parse_month_offset(Some("3abc")), 0);
        assert_eq!(parse_month_offset(Some("1.5")), 0);
    }

    #[test]
    fn test_from_url() {
        let page = Url::parse("http://wall:3000/?monthOffset=nope&id=A&ics=x").unwrap();
        let config = ViewConfig::from_url(&page);
        assert_eq!(config.month_offset, 0);
        assert_eq!(config.sources.len(), 1);
        let page = Url::parse("http://wall:3000/?monthOffset=1").unwrap();
        let config = ViewConfig::from_url(&page);
        assert_eq!(config.month_offset, 1);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_initial_date() {
        assert_eq!(initial_date(date(2024, 1, 31), 0), date(2024, 1, 1));
        assert_eq!(initial_date(date(2024, 1, 31), 1), date(2024, 2, 1));
        assert_eq!(initial_date(date(2024, 1, 15), -1), date(2023, 12, 1));
        assert_eq!(initial_date(date(2024, 11, 15), 14), date(2026, 1, 1));
    }

    #[test]
    fn test_visible_range() {
        // January 2024 starts on a Monday and ends on a Wednesday.
        let range = visible_range(date(2024, 1, 1));
        assert_eq!(range.start, date(2024, 1, 1));
        assert_eq!(range.end, date(2024, 2, 5));
        assert_eq!(range.weeks().len(), 5);

        // September 2024 starts on a Sunday and ends on a Monday.
        let range = visible_range(date(2024, 9, 10));
        assert_eq!(range.start, date(2024, 8, 26));
        assert_eq!(range.end, date(2024, 10, 7));
        assert!(range.weeks().iter().all(|week| week.len() == 7));

        // March 2024 ends on a Sunday.
        let range = visible_range(date(2024, 3, 1));
        assert_eq!(range.end, date(2024, 4, 1));
    }
}
