//! Per-source error messages and the aggregate loading state behind the status banner.

use std::fmt;

use url::Url;

use crate::source::{normalize, CalendarSource};

pub static UNKNOWN_SOURCE: &str = "Unknown Source";

/// The last error of every source, keyed by the normalized fetch URL.
///
/// Entries are kept in the order sources were configured. Entries of removed sources are never
/// cleaned up; the tracker is rebuilt when the source list changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorTracker {
    entries: Vec<(String, Option<String>)>,
}

impl ErrorTracker {
    pub fn new(sources: &[CalendarSource]) -> Self {
        let mut tracker = ErrorTracker::default();
        for source in sources {
            tracker.slot(source.key());
        }
        tracker
    }

    fn slot(&mut self, key: String) -> &mut Option<String> {
        let ix = match self.entries.iter().position(|(entry, _)| *entry == key) {
            Some(ix) => ix,
            None => {
                self.entries.push((key, None));
                self.entries.len() - 1
            }
        };
        &mut self.entries[ix].1
    }

    /// Record a failed fetch of `url`.
    pub fn on_failure(&mut self, url: &Url, message: &str, source_id: Option<&str>) {
        let message = format!("{}: {}", source_id.unwrap_or(UNKNOWN_SOURCE), message);
        *self.slot(normalize(url).into()) = Some(message);
    }

    /// Clear the error of `url`. Returns whether there was one.
    pub fn on_success(&mut self, url: &Url) -> bool {
        let key: String = normalize(url).into();
        match self.entries.iter_mut().find(|(entry, _)| *entry == key) {
            Some((_, message @ Some(_))) => {
                *message = None;
                true
            }
            _ => false,
        }
    }

    /// Whether `url` has an entry at all, errored or not.
    pub fn contains(&self, url: &Url) -> bool {
        let key: String = normalize(url).into();
        self.entries.iter().any(|(entry, _)| *entry == key)
    }

    /// The current error of `url`.
    pub fn error(&self, url: &Url) -> Option<&str> {
        let key: String = normalize(url).into();
        self.entries
            .iter()
            .find(|(entry, _)| *entry == key)
            .and_then(|(_, message)| message.as_deref())
    }

    /// Number of sources currently in error.
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, message)| message.is_some())
            .count()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(_, message)| message.as_deref())
            .collect()
    }

    /// The banner to show. Errors take priority over loading.
    pub fn status(&self, loading: bool) -> Status {
        match (self.count(), loading) {
            (0, true) => Status::Loading,
            (0, false) => Status::UpToDate,
            _ => Status::Errors(self.messages().into_iter().map(String::from).collect()),
        }
    }
}

/// Counts the fetches that have not settled yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingTracker {
    outstanding: usize,
}

impl LoadingTracker {
    pub fn begin(&mut self) {
        self.outstanding += 1;
    }

    /// Settle one fetch. Returns `true` if that was the last outstanding one.
    pub fn finish(&mut self) -> bool {
        let was_loading = self.is_loading();
        self.outstanding = self.outstanding.saturating_sub(1);
        was_loading && !self.is_loading()
    }

    pub fn reset(&mut self) {
        self.outstanding = 0;
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Loading,
    UpToDate,
    Errors(Vec<String>),
}

impl Status {
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Errors(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loading => write!(f, "Loading..."),
            Status::UpToDate => write!(f, "Up to date"),
            Status::Errors(messages) => write!(f, "{}", messages.join("\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::source::{endpoint_for, fetch_url, CalendarSource};

    fn source(id: &str, ics: &str) -> CalendarSource {
        let endpoint = endpoint_for(&Url::parse("http://wall/").unwrap());
        CalendarSource::new(&endpoint, id, ics, None)
    }

    fn request(source: &CalendarSource, start: &str) -> Url {
        let mut url = source.fetch_url.clone();
        url.query_pairs_mut()
            .append_pair("start", start)
            .append_pair("end", "2024-02-05");
        url
    }

    #[test]
    fn test_new_has_one_clear_entry_per_source() {
        let sources = [source("A", "u1"), source("B", "u2")];
        let tracker = ErrorTracker::new(&sources);
        assert!(tracker.contains(&sources[0].fetch_url));
        assert!(tracker.contains(&sources[1].fetch_url));
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.status(false), Status::UpToDate);
        assert_eq!(tracker.status(true), Status::Loading);
    }

    #[test]
    fn test_failure_then_success() {
        let sources = [source("A", "u1")];
        let mut tracker = ErrorTracker::new(&sources);
        let url = request(&sources[0], "2024-01-01");
        tracker.on_failure(&url, "timeout", Some("A"));
        assert_eq!(tracker.error(&sources[0].fetch_url), Some("A: timeout"));
        assert_eq!(tracker.count(), 1);

        let refetch = request(&sources[0], "2024-01-08");
        assert!(tracker.on_success(&refetch));
        assert!(tracker.contains(&url));
        assert_eq!(tracker.error(&url), None);
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.on_success(&refetch));
    }

    #[test]
    fn test_unknown_source() {
        let mut tracker = ErrorTracker::default();
        let endpoint = endpoint_for(&Url::parse("http://wall/").unwrap());
        let url = fetch_url(&endpoint, "elsewhere");
        tracker.on_failure(&url, "boom", None);
        assert_eq!(tracker.messages(), vec!["Unknown Source: boom"]);
    }

    #[test]
    fn test_errors_take_priority() {
        let sources = [source("A", "u1"), source("B", "u2"), source("C", "u3")];
        let mut tracker = ErrorTracker::new(&sources);
        tracker.on_failure(&sources[2].fetch_url, "404", Some("C"));
        tracker.on_failure(&sources[0].fetch_url, "500", Some("A"));
        let expected = Status::Errors(vec!["A: 500".to_string(), "C: 404".to_string()]);
        assert_eq!(tracker.status(true), expected);
        assert_eq!(tracker.status(false), expected);
        assert!(expected.is_error());
        assert_eq!(expected.to_string(), "A: 500\nC: 404");
    }

    #[test]
    fn test_loading_clears_after_last_fetch() {
        let mut loading = LoadingTracker::default();
        assert!(!loading.is_loading());
        loading.begin();
        loading.begin();
        assert!(!loading.finish());
        assert!(loading.is_loading());
        assert!(loading.finish());
        assert!(!loading.is_loading());
        assert!(!loading.finish());
        assert_eq!(loading.outstanding(), 0);
    }
}
