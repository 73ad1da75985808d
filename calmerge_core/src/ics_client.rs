//! This client fetches iCalendar feeds and flattens them into events of a time range.
//!
//! Recurring events are expanded with the `rrule` crate. Floating times and dates are read in the
//! configured timezone, which is also the timezone of the emitted events.

use std::{
    collections::HashSet,
    io::{BufReader, Cursor},
    sync::OnceLock,
};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::{parser::ical::component::IcalEvent, property::Property, IcalParser};
use regex::Regex;
use rrule::RRuleSet;
use url::Url;

use crate::{event::CalendarEvent, Error, Result};

static UNTITLED: &str = "Untitled Event";
static ALL_DAY_PROPERTY: &str = "X-MICROSOFT-CDO-ALLDAYEVENT";
static OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
static DATE_FORMAT: &str = "%Y%m%d";
static DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const MAX_OCCURRENCES: u16 = 1000;

#[derive(Debug, Clone)]
pub struct IcsClient {
    http: reqwest::Client,
    timezone: Tz,
}

impl IcsClient {
    pub fn new(timezone: Tz) -> Self {
        Self::with_http(reqwest::Client::new(), timezone)
    }

    pub fn with_http(http: reqwest::Client, timezone: Tz) -> Self {
        IcsClient { http, timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Get the events of `source` overlapping `range`.
    pub async fn events(&self, source: &Url, range: &TimeRange) -> Result<Vec<CalendarEvent>> {
        let ics = self.fetch(source).await?;
        let events = parse(&ics, range, self.timezone)?;
        tracing::info!(%source, events = events.len(), "expanded calendar");
        Ok(events)
    }

    async fn fetch(&self, source: &Url) -> Result<String> {
        tracing::debug!(%source, "fetching calendar");
        let response = self.http.get(source.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Validate the `source` parameter: an absolute http(s) URL.
pub fn parse_source(value: &str) -> Result<Url> {
    let invalid = || Error::InvalidSource(value.to_string());
    let url = Url::parse(value).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(invalid()),
    }
}

/// A half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(Error::EmptyRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(TimeRange { start, end })
    }

    /// Parse the `start` and `end` query parameters.
    pub fn parse(start: &str, end: &str, timezone: Tz) -> Result<Self> {
        Self::new(parse_bound(start, timezone)?, parse_bound(end, timezone)?)
    }

    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if end <= start {
            return self.start <= start && start < self.end;
        }
        start < self.end && end > self.start
    }
}

/// Parse an RFC 3339 date-time, a naive date-time or a date.
///
/// Naive values are local to `timezone`.
pub fn parse_bound(value: &str, timezone: Tz) -> Result<DateTime<Utc>> {
    let value = value.trim();
    let invalid = || Error::InvalidDate(value.to_string());
    // A `+` in an unencoded query string arrives as a space.
    let offset = DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc3339(&value.replace(' ', "+")));
    if let Ok(parsed) = offset {
        return Ok(parsed.with_timezone(&Utc));
    }
    let local = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| invalid())?;
    resolve(&timezone, local)
        .map(|resolved| resolved.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// The earliest instant of a local time, or an hour later inside a DST gap.
fn resolve<T: TimeZone>(timezone: &T, local: NaiveDateTime) -> Option<DateTime<T>> {
    timezone.from_local_datetime(&local).earliest().or_else(|| {
        timezone
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
    })
}

/// Parse an iCalendar document and expand its events within `range`.
pub fn parse(ics: &str, range: &TimeRange, timezone: Tz) -> Result<Vec<CalendarEvent>> {
    let parser = IcalParser::new(BufReader::new(Cursor::new(ics)));
    let mut vevents = vec![];
    let mut calendars = 0;
    for ical_calendar_result in parser {
        let ical_calendar = ical_calendar_result.map_err(|err| Error::Parse(err.to_string()))?;
        calendars += 1;
        vevents.extend(
            ical_calendar
                .events
                .iter()
                .filter_map(|ical_event| VEvent::from_ical(ical_event, timezone)),
        );
    }
    if calendars == 0 {
        return Err(Error::Parse(String::from("no VCALENDAR found")));
    }
    let overridden: HashSet<(&str, DateTime<Utc>)> = vevents
        .iter()
        .filter_map(|vevent| Some((vevent.uid.as_str(), vevent.recurrence_id?)))
        .collect();
    let mut occurrences = vec![];
    for vevent in &vevents {
        let starts = match vevent.recurrence_id {
            Some(_) => vec![vevent.start],
            None => vevent.occurrences(range),
        };
        for start in starts {
            let begin = start.instant();
            if vevent.recurrence_id.is_none()
                && vevent.is_recurring()
                && overridden.contains(&(vevent.uid.as_str(), begin))
            {
                continue;
            }
            let end = vevent.end_of(&start);
            if !range.overlaps(begin, end) {
                continue;
            }
            occurrences.push((begin, vevent.emit(begin, end, timezone)));
        }
    }
    occurrences.sort_by(|(a, a_event), (b, b_event)| {
        a.cmp(b).then_with(|| a_event.title.cmp(&b_event.title))
    });
    Ok(occurrences.into_iter().map(|(_, event)| event).collect())
}

trait GetIcalProperty {
    fn get_ical_property(&self, name: &str) -> Option<&Property>;
    fn get_ical_property_value(&self, name: &str) -> Option<&String>;
    fn get_ical_properties(&self, name: &str) -> Vec<&Property>;
}

impl GetIcalProperty for IcalEvent {
    fn get_ical_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name))
    }

    fn get_ical_property_value(&self, name: &str) -> Option<&String> {
        self.get_ical_property(name)
            .and_then(|property| property.value.as_ref())
    }

    fn get_ical_properties(&self, name: &str) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|property| property.name.eq_ignore_ascii_case(name))
            .collect()
    }
}

fn param<'a>(property: &'a Property, key: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim_matches('"'))
}

fn zone_for(tzid: &str, default_zone: Tz) -> Tz {
    tzid.trim_start_matches('/').parse().unwrap_or_else(|_| {
        tracing::debug!(tzid, "unknown TZID, using the default timezone");
        default_zone
    })
}

/// A DTSTART-like value: local time in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Moment {
    local: NaiveDateTime,
    zone: Tz,
    date_only: bool,
}

impl Moment {
    fn from_property(property: &Property, default_zone: Tz) -> Option<Moment> {
        let value = property.value.as_deref()?;
        Self::parse(value.split(',').next()?, property, default_zone)
    }

    /// All values of a list property such as EXDATE.
    fn all_from_property(property: &Property, default_zone: Tz) -> Vec<Moment> {
        property
            .value
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|value| Self::parse(value, property, default_zone))
            .collect()
    }

    fn parse(value: &str, property: &Property, default_zone: Tz) -> Option<Moment> {
        let value = value.trim();
        let date_param = param(property, "VALUE").is_some_and(|kind| kind.eq_ignore_ascii_case("DATE"));
        if date_param || value.len() == 8 {
            let date = NaiveDate::parse_from_str(value.get(..8)?, DATE_FORMAT).ok()?;
            return Some(Moment {
                local: date.and_time(NaiveTime::MIN),
                zone: default_zone,
                date_only: true,
            });
        }
        if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
            return Some(Moment {
                local: NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).ok()?,
                zone: chrono_tz::UTC,
                date_only: false,
            });
        }
        let zone = param(property, "TZID")
            .map(|tzid| zone_for(tzid, default_zone))
            .unwrap_or(default_zone);
        Some(Moment {
            local: NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()?,
            zone,
            date_only: false,
        })
    }

    fn instant(&self) -> DateTime<Utc> {
        resolve(&self.zone, self.local)
            .map(|resolved| resolved.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&self.local))
    }

    /// The same kind of moment at another instant.
    fn at(&self, instant: DateTime<Utc>) -> Moment {
        Moment {
            local: instant.with_timezone(&self.zone).naive_local(),
            ..*self
        }
    }

    fn rrule_line(&self, name: &str) -> String {
        let local = self.local.format(DATE_TIME_FORMAT);
        if self.zone == chrono_tz::UTC {
            format!("{name}:{local}Z")
        } else {
            format!("{name};TZID={}:{local}", self.zone.name())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// Whole days of a date-valued event.
    Days(i64),
    Exact(Duration),
}

#[derive(Debug, Clone)]
struct VEvent {
    uid: String,
    title: String,
    location: Option<String>,
    start: Moment,
    span: Span,
    all_day: bool,
    rrule: Option<String>,
    exdates: Vec<Moment>,
    rdates: Vec<Moment>,
    recurrence_id: Option<DateTime<Utc>>,
}

impl VEvent {
    fn from_ical(ical_event: &IcalEvent, default_zone: Tz) -> Option<VEvent> {
        let uid = ical_event
            .get_ical_property_value("UID")
            .cloned()
            .unwrap_or_default();
        let Some(start) = ical_event
            .get_ical_property("DTSTART")
            .and_then(|property| Moment::from_property(property, default_zone))
        else {
            tracing::warn!(%uid, "skipping event without a valid DTSTART");
            return None;
        };
        let end = ical_event
            .get_ical_property("DTEND")
            .and_then(|property| Moment::from_property(property, default_zone));
        let duration = ical_event
            .get_ical_property_value("DURATION")
            .and_then(|value| parse_duration(value));
        let span = match (end, duration) {
            (Some(end), _) if start.date_only && end.date_only => {
                Span::Days((end.local.date() - start.local.date()).num_days().max(0))
            }
            (Some(end), _) => Span::Exact((end.instant() - start.instant()).max(Duration::zero())),
            (None, Some(duration)) if start.date_only && duration.num_seconds() % 86_400 == 0 => {
                Span::Days(duration.num_days().max(0))
            }
            (None, Some(duration)) => Span::Exact(duration.max(Duration::zero())),
            (None, None) if start.date_only => Span::Days(1),
            (None, None) => Span::Exact(Duration::zero()),
        };
        let text = |name: &str| {
            ical_event
                .get_ical_property_value(name)
                .map(|value| unescape(value))
                .filter(|value| !value.is_empty())
        };
        let list = |name: &str| {
            ical_event
                .get_ical_properties(name)
                .into_iter()
                .flat_map(|property| Moment::all_from_property(property, default_zone))
                .collect::<Vec<_>>()
        };
        Some(VEvent {
            title: text("SUMMARY").unwrap_or_else(|| String::from(UNTITLED)),
            location: text("LOCATION"),
            start,
            span,
            all_day: ical_event
                .get_ical_property_value(ALL_DAY_PROPERTY)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("TRUE")),
            rrule: ical_event
                .get_ical_property_value("RRULE")
                .filter(|rule| !rule.trim().is_empty())
                .cloned(),
            exdates: list("EXDATE"),
            rdates: list("RDATE"),
            recurrence_id: ical_event
                .get_ical_property("RECURRENCE-ID")
                .and_then(|property| Moment::from_property(property, default_zone))
                .map(|moment| moment.instant()),
            uid,
        })
    }

    fn is_recurring(&self) -> bool {
        self.rrule.is_some() || !self.rdates.is_empty()
    }

    fn end_of(&self, start: &Moment) -> DateTime<Utc> {
        match self.span {
            Span::Days(days) => Moment {
                local: start.local + Duration::days(days),
                ..*start
            }
            .instant(),
            Span::Exact(duration) => start.instant() + duration,
        }
    }

    fn longest_span(&self) -> Duration {
        match self.span {
            Span::Days(days) => Duration::days(days) + Duration::hours(1),
            Span::Exact(duration) => duration,
        }
    }

    /// `other` expressed like DTSTART, so that instants can be compared.
    fn in_start_zone(&self, other: &Moment) -> Moment {
        if other.date_only && !self.start.date_only {
            return Moment {
                local: other.local.date().and_time(self.start.local.time()),
                ..self.start
            };
        }
        self.start.at(other.instant())
    }

    /// Start of every occurrence that may overlap `range`.
    fn occurrences(&self, range: &TimeRange) -> Vec<Moment> {
        let mut starts = vec![];
        match &self.rrule {
            Some(rule) => match self.expand(rule, range) {
                Ok(expanded) => starts.extend(expanded),
                Err(err) => {
                    tracing::warn!(uid = %self.uid, %err, "using the first occurrence only");
                    starts.push(self.start);
                }
            },
            None => starts.push(self.start),
        }
        starts.extend(self.rdates.iter().map(|rdate| self.in_start_zone(rdate)));
        let excluded: HashSet<DateTime<Utc>> = self
            .exdates
            .iter()
            .map(|exdate| self.in_start_zone(exdate).instant())
            .collect();
        let mut seen = HashSet::new();
        starts.retain(|start| {
            let instant = start.instant();
            !excluded.contains(&instant) && seen.insert(instant)
        });
        starts
    }

    fn expand(&self, rule: &str, range: &TimeRange) -> Result<Vec<Moment>> {
        let text = format!(
            "{}\nRRULE:{}",
            self.start.rrule_line("DTSTART"),
            self.normalize_rule(rule)
        );
        let set = text.parse::<RRuleSet>().map_err(|err| {
            Error::Parse(format!("recurrence rule of `{}`: {}", self.uid, err))
        })?;
        let tz: rrule::Tz = Utc.into();
        let after = (range.start - self.longest_span() - Duration::seconds(1)).with_timezone(&tz);
        let before = (range.end + Duration::seconds(1)).with_timezone(&tz);
        let result = set.after(after).before(before).all(MAX_OCCURRENCES);
        if result.limited {
            tracing::warn!(uid = %self.uid, "recurrence expansion hit the occurrence limit");
        }
        Ok(result
            .dates
            .iter()
            .map(|date| self.start.at(date.with_timezone(&Utc)))
            .collect())
    }

    /// Rewrite `UNTIL` to UTC, which is required when DTSTART carries a timezone.
    fn normalize_rule(&self, rule: &str) -> String {
        rule.trim()
            .split(';')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                    format!("UNTIL={}", self.until_utc(value))
                }
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    fn until_utc(&self, value: &str) -> String {
        let value = value.trim();
        if value.ends_with('Z') {
            return value.to_string();
        }
        let local = if value.len() == 8 {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(23, 59, 59))
        } else {
            NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()
        };
        match local.and_then(|local| resolve(&self.start.zone, local)) {
            Some(until) => until
                .with_timezone(&Utc)
                .format("%Y%m%dT%H%M%SZ")
                .to_string(),
            None => value.to_string(),
        }
    }

    fn emit(&self, start: DateTime<Utc>, end: DateTime<Utc>, timezone: Tz) -> CalendarEvent {
        let mut start = start.with_timezone(&timezone);
        let mut end = end.with_timezone(&timezone);
        if self.all_day {
            start = next_day(start);
            end = next_day(end);
        }
        CalendarEvent {
            id: self.uid.clone(),
            title: self.title.clone(),
            location: self.location.clone(),
            start: start.format(OUTPUT_FORMAT).to_string(),
            end: end.format(OUTPUT_FORMAT).to_string(),
            all_day: self.all_day,
        }
    }
}

/// The same local time one calendar day later.
fn next_day(date_time: DateTime<Tz>) -> DateTime<Tz> {
    let timezone = date_time.timezone();
    resolve(&timezone, date_time.naive_local() + Duration::days(1))
        .unwrap_or(date_time + Duration::days(1))
}

/// Parse an iCalendar DURATION such as `PT1H30M` or `-P1W`.
fn parse_duration(value: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)
                ^(?P<sign>[+-])?P
                (?:(?P<weeks>\d+)W)?
                (?:(?P<days>\d+)D)?
                (?:T
                    (?:(?P<hours>\d+)H)?
                    (?:(?P<minutes>\d+)M)?
                    (?:(?P<seconds>\d+)S)?
                )?$
            ",
        )
        .expect("duration pattern is valid")
    });
    let captures = pattern.captures(value.trim())?;
    let field = |name: &str| {
        captures
            .name(name)
            .and_then(|field| field.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    let duration = Duration::weeks(field("weeks"))
        + Duration::days(field("days"))
        + Duration::hours(field("hours"))
        + Duration::minutes(field("minutes"))
        + Duration::seconds(field("seconds"));
    match captures.name("sign").map(|sign| sign.as_str()) {
        Some("-") => Some(-duration),
        _ => Some(duration),
    }
}

/// Undo TEXT escaping (`\,`, `\;`, `\n`, `\\`).
fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => unescaped.push('\n'),
            Some(escaped) => unescaped.push(escaped),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}
