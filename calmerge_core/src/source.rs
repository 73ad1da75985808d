//! The calendar sources listed in the page URL.

use std::borrow::Cow;

use url::Url;

use crate::color::{color_for, is_hex_color};

/// The aggregation endpoint used when the page has no host, e.g. when opened from a file.
static DEFAULT_ENDPOINT: &str = "http://localhost:8000/parse";
/// The only query parameter that identifies a source.
pub static SOURCE_PARAM: &str = "source";

/// One upstream calendar feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSource {
    /// Short label, e.g. initials. Not necessarily unique.
    pub id: String,
    /// The aggregation endpoint with the upstream address as its only `source` parameter.
    pub fetch_url: Url,
    /// `#rrggbb` (or `#rgb` when given explicitly).
    pub color: String,
}

impl CalendarSource {
    /// Build a source, falling back to the hash color when `color` is missing or malformed.
    pub fn new(endpoint: &Url, id: &str, ics: &str, color: Option<&str>) -> Self {
        let color = match color {
            Some(color) if is_hex_color(color) => color.to_string(),
            Some(color) if !color.is_empty() => {
                tracing::debug!(id, color, "ignoring malformed source color");
                color_for(id)
            }
            _ => color_for(id),
        };
        CalendarSource {
            id: id.to_string(),
            fetch_url: fetch_url(endpoint, ics),
            color,
        }
    }

    /// The upstream address, i.e. the `source` parameter of the fetch URL.
    pub fn ics(&self) -> String {
        source_param(&self.fetch_url).unwrap_or_default()
    }

    /// The key errors of this source are tracked under.
    pub fn key(&self) -> String {
        normalize(&self.fetch_url).into()
    }
}

/// The aggregation endpoint on port 8000 of the host serving the page.
pub fn endpoint_for(page: &Url) -> Url {
    let mut endpoint = default_endpoint();
    if let Some(host) = page.host_str() {
        if endpoint.set_host(Some(host)).is_err() {
            tracing::warn!(host, "cannot use page host for the aggregation endpoint");
        }
    }
    endpoint
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL")
}

/// The fetch URL of an upstream address: `endpoint?source=<ics>`.
pub fn fetch_url(endpoint: &Url, ics: &str) -> Url {
    let mut url = endpoint.clone();
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair(SOURCE_PARAM, ics);
    url
}

/// Zip the repeated `id`, `ics` and `color` parameters into sources.
///
/// `id` and `ics` are truncated to the shorter list. Missing colors are derived from the id.
pub fn sources_from_query<'a, I>(endpoint: &Url, pairs: I) -> Vec<CalendarSource>
where
    I: IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
{
    let mut ids = vec![];
    let mut icses = vec![];
    let mut colors = vec![];
    for (key, value) in pairs {
        match key.as_ref() {
            "id" => ids.push(value),
            "ics" => icses.push(value),
            "color" => colors.push(value),
            _ => continue,
        }
    }
    if ids.len() != icses.len() {
        tracing::debug!(
            ids = ids.len(),
            icses = icses.len(),
            "id and ics lists differ in length, truncating"
        );
    }
    ids.iter()
        .zip(icses.iter())
        .enumerate()
        .map(|(ix, (id, ics))| {
            CalendarSource::new(endpoint, id, ics, colors.get(ix).map(|color| color.as_ref()))
        })
        .collect()
}

/// The `source` parameter of a URL, if any.
pub fn source_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == SOURCE_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Remove every query parameter except `source`.
///
/// The frontend appends the visible range to each request, so request URLs of the same source
/// differ between fetches. The normalized URL is stable.
pub fn normalize(url: &Url) -> Url {
    let source = source_param(url).unwrap_or_default();
    fetch_url(url, &source)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::color::color_for;

    fn page(query: &str) -> Url {
        Url::parse(&format!("http://wall.example:3000/?{query}")).unwrap()
    }

    fn sources(query: &str) -> Vec<CalendarSource> {
        let page = page(query);
        sources_from_query(&endpoint_for(&page), page.query_pairs())
    }

    #[test]
    fn test_endpoint_for() {
        let endpoint = endpoint_for(&page(""));
        assert_eq!(endpoint.as_str(), "http://wall.example:8000/parse");
        let file = Url::parse("file:///home/user/index.html").unwrap();
        assert_eq!(endpoint_for(&file).as_str(), "http://localhost:8000/parse");
    }

    #[test]
    fn test_sources_with_hash_colors() {
        let sources = sources("id=A&id=B&ics=http%3A%2F%2Fa.test%2Fa.ics&ics=http%3A%2F%2Fb.test%2Fb.ics");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, "A");
        assert_eq!(sources[0].color, color_for("A"));
        assert_eq!(sources[1].color, color_for("B"));
        for source in &sources {
            let pairs: Vec<_> = source.fetch_url.query_pairs().collect();
            assert_eq!(pairs.len(), 1);
            assert_eq!(pairs[0].0, "source");
        }
        assert_eq!(sources[1].ics(), "http://b.test/b.ics");
        assert_eq!(
            sources[0].fetch_url.as_str(),
            "http://wall.example:8000/parse?source=http%3A%2F%2Fa.test%2Fa.ics"
        );
    }

    #[test]
    fn test_sources_with_explicit_colors() {
        let sources = sources("id=A&ics=x&color=%23ff0000&id=B&ics=y&color=red&id=C&ics=z");
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].color, "#ff0000");
        assert_eq!(sources[1].color, color_for("B"));
        assert_eq!(sources[2].color, color_for("C"));
    }

    #[test]
    fn test_sources_truncate_to_shortest() {
        assert_eq!(sources("id=A&id=B&id=C&ics=x").len(), 1);
        assert_eq!(sources("id=A&ics=x&ics=y").len(), 1);
        assert!(sources("ics=x").is_empty());
        assert!(sources("").is_empty());
    }

    #[test]
    fn test_normalize() {
        let base = Url::parse("http://h:8000/parse?source=http%3A%2F%2Fa.test%2Fa.ics").unwrap();
        let with_range = Url::parse(
            "http://h:8000/parse?start=2024-01-01&source=http%3A%2F%2Fa.test%2Fa.ics&end=2024-02-05&_=1",
        )
        .unwrap();
        let other = Url::parse("http://h:8000/parse?start=2024-01-01&source=http%3A%2F%2Fb.test").unwrap();
        assert_eq!(normalize(&base), normalize(&with_range));
        assert_eq!(normalize(&with_range), base);
        assert_ne!(normalize(&base), normalize(&other));
    }

    #[test]
    fn test_normalize_without_source() {
        let url = Url::parse("http://h:8000/parse?start=1").unwrap();
        assert_eq!(normalize(&url).as_str(), "http://h:8000/parse?source=");
    }
}
