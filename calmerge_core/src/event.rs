//! The flat event format exchanged between the server and the frontend.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single occurrence of an event, after recurrence expansion.
///
/// `start` and `end` are ISO 8601 date-times with offset. All-day events are already shifted
/// forward by one day by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: String,
    pub end: String,
    pub all_day: bool,
}

impl CalendarEvent {
    pub fn start_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.start).ok()
    }

    pub fn end_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.end).ok()
    }

    /// The time shown next to the title, `None` for all-day events.
    pub fn time_text(&self) -> Option<String> {
        if self.all_day {
            return None;
        }
        self.start_at()
            .map(|start| start.format("%H:%M").to_string())
    }

    /// Whether the event is drawn in the cell of `day`.
    ///
    /// All-day events cover every day up to their exclusive end date, timed events only appear on
    /// the day they start.
    pub fn occurs_on(&self, day: NaiveDate) -> bool {
        let Some(start) = self.start_at().map(|start| start.date_naive()) else {
            return false;
        };
        if !self.all_day {
            return start == day;
        }
        let end = self
            .end_at()
            .map(|end| end.date_naive())
            .filter(|end| *end > start)
            .unwrap_or(start + Duration::days(1));
        start <= day && day < end
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::CalendarEvent;

    fn event(start: &str, end: &str, all_day: bool) -> CalendarEvent {
        CalendarEvent {
            id: "uid".to_string(),
            title: "Title".to_string(),
            location: None,
            start: start.to_string(),
            end: end.to_string(),
            all_day,
        }
    }

    #[test]
    fn test_serialize_camel_case() {
        let json = serde_json::to_value(event(
            "2024-01-02T00:00:00+00:00",
            "2024-01-03T00:00:00+00:00",
            true,
        ))
        .unwrap();
        assert_eq!(json["allDay"], true);
        assert!(json.get("location").is_none());
        assert!(json.get("all_day").is_none());
    }

    #[test]
    fn test_deserialize_null_location() {
        let parsed: CalendarEvent = serde_json::from_str(
            r#"{"id":"a","title":"b","location":null,"start":"2024-01-01T10:00:00+01:00","end":"2024-01-01T11:00:00+01:00","allDay":false}"#,
        )
        .unwrap();
        assert_eq!(parsed.location, None);
        assert_eq!(parsed.time_text().as_deref(), Some("10:00"));
    }

    #[test]
    fn test_occurs_on() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let timed = event("2024-01-05T23:30:00+01:00", "2024-01-06T01:00:00+01:00", false);
        assert!(timed.occurs_on(day(5)));
        assert!(!timed.occurs_on(day(6)));

        let all_day = event("2024-01-05T00:00:00+01:00", "2024-01-07T00:00:00+01:00", true);
        assert!(!all_day.occurs_on(day(4)));
        assert!(all_day.occurs_on(day(5)));
        assert!(all_day.occurs_on(day(6)));
        assert!(!all_day.occurs_on(day(7)));
        assert_eq!(all_day.time_text(), None);

        let broken = event("yesterday", "today", true);
        assert!(!broken.occurs_on(day(5)));
    }
}
