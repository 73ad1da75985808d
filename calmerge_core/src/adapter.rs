//! Glue between the configured sources and the month view.
//!
//! [`Feeds`] holds everything that changes while the page is open: the events of every source,
//! the per-source errors and the number of outstanding fetches. It is updated through plain
//! methods and cloned into the UI after every change.

use url::Url;

use crate::{
    event::CalendarEvent,
    source::{normalize, CalendarSource},
    status::{ErrorTracker, LoadingTracker, Status},
    view::DateRange,
};

static START_PARAM: &str = "start";
static END_PARAM: &str = "end";

/// The body format of a feed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedFormat {
    /// A JSON array of [`CalendarEvent`].
    #[default]
    Json,
}

impl FeedFormat {
    /// The `Accept` header sent with the request.
    pub fn mime(self) -> &'static str {
        match self {
            FeedFormat::Json => "application/json",
        }
    }
}

/// How a source is handed to the month view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSource {
    pub id: String,
    pub url: Url,
    pub format: FeedFormat,
    pub background_color: String,
}

impl From<&CalendarSource> for EventSource {
    fn from(value: &CalendarSource) -> Self {
        EventSource {
            id: value.id.clone(),
            url: value.fetch_url.clone(),
            format: FeedFormat::Json,
            background_color: value.color.clone(),
        }
    }
}

impl EventSource {
    /// The URL fetched for `range`: the source URL plus `start` and `end`.
    pub fn request_url(&self, range: &DateRange) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair(START_PARAM, &range.start.to_string())
            .append_pair(END_PARAM, &range.end.to_string());
        url
    }
}

/// One fetch of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    /// Index of the source in [`Feeds::sources`].
    pub source: usize,
    pub url: Url,
    pub format: FeedFormat,
}

/// An event together with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEvent {
    pub source_id: String,
    pub color: String,
    pub event: CalendarEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feeds {
    sources: Vec<EventSource>,
    /// Events per source, parallel to `sources`.
    events: Vec<Vec<CalendarEvent>>,
    errors: ErrorTracker,
    loading: LoadingTracker,
    generation: u64,
}

impl Feeds {
    pub fn new(sources: &[CalendarSource]) -> Self {
        Feeds {
            sources: sources.iter().map(EventSource::from).collect(),
            events: vec![vec![]; sources.len()],
            errors: ErrorTracker::new(sources),
            loading: LoadingTracker::default(),
            generation: 0,
        }
    }

    pub fn sources(&self) -> &[EventSource] {
        &self.sources
    }

    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn status(&self) -> Status {
        self.errors.status(self.is_loading())
    }

    /// The requests of a refresh of all sources, one per source.
    pub fn requests(&self, range: &DateRange) -> Vec<FeedRequest> {
        self.sources
            .iter()
            .enumerate()
            .map(|(ix, source)| FeedRequest {
                source: ix,
                url: source.request_url(range),
                format: source.format,
            })
            .collect()
    }

    /// Start refresh cycle `generation` with `count` fetches.
    ///
    /// Completions of earlier cycles are ignored from now on.
    pub fn begin_cycle(&mut self, generation: u64, count: usize) {
        self.generation = generation;
        self.loading.reset();
        for _ in 0..count {
            self.loading.begin();
        }
    }

    /// The id of the first source a request or response URL belongs to.
    pub fn source_id_for(&self, url: &Url) -> Option<&str> {
        let key = normalize(url);
        self.sources
            .iter()
            .find(|source| source.url == key)
            .map(|source| source.id.as_str())
    }

    /// Returns `false` if the completion belongs to an outdated cycle and was dropped.
    ///
    /// Events are stored per source, so sources sharing a feed each keep their own copy.
    pub fn on_success(
        &mut self,
        generation: u64,
        request: &FeedRequest,
        events: Vec<CalendarEvent>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(url = %request.url, generation, "dropping stale response");
            return false;
        }
        self.loading.finish();
        self.errors.on_success(&request.url);
        if let Some(slot) = self.events.get_mut(request.source) {
            *slot = events;
        }
        true
    }

    /// Returns `false` if the completion belongs to an outdated cycle and was dropped.
    pub fn on_failure(&mut self, generation: u64, request: &FeedRequest, message: &str) -> bool {
        if generation != self.generation {
            tracing::debug!(url = %request.url, generation, "dropping stale failure");
            return false;
        }
        self.loading.finish();
        let source_id = self
            .sources
            .get(request.source)
            .map(|source| source.id.clone());
        tracing::warn!(url = %request.url, error = message, "fetching events failed");
        self.errors
            .on_failure(&request.url, message, source_id.as_deref());
        if let Some(slot) = self.events.get_mut(request.source) {
            slot.clear();
        }
        true
    }

    /// All events of all sources, sorted by start.
    pub fn merged(&self) -> Vec<MergedEvent> {
        let mut merged: Vec<MergedEvent> = self
            .sources
            .iter()
            .zip(self.events.iter())
            .flat_map(|(source, events)| {
                events.iter().map(|event| MergedEvent {
                    source_id: source.id.clone(),
                    color: source.background_color.clone(),
                    event: event.clone(),
                })
            })
            .collect();
        merged.sort_by_key(|merged| merged.event.start_at());
        merged
    }
}
