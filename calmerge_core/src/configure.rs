//! The configuration dialog as plain data.
//!
//! The dialog edits a copy of the sources and the month offset. Saving produces a new page URL;
//! the page URL is the only place the configuration is stored.

use chrono::NaiveDate;
use url::Url;

use crate::{
    source::CalendarSource,
    view::{initial_date, ViewConfig, MONTH_OFFSET_PARAM},
};

/// One editable row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureSource {
    pub id: String,
    /// The upstream address, not the wrapped fetch URL.
    pub url: String,
    pub color: String,
}

impl ConfigureSource {
    pub fn is_blank(&self) -> bool {
        *self == ConfigureSource::default()
    }

    /// Rows without id or url are unfinished edits and are not saved.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.url.is_empty()
    }
}

impl From<&CalendarSource> for ConfigureSource {
    fn from(value: &CalendarSource) -> Self {
        ConfigureSource {
            id: value.id.clone(),
            url: value.ics(),
            color: value.color.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Url,
    Color,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureDialog {
    month_offset: i32,
    sources: Vec<ConfigureSource>,
}

impl From<&ViewConfig> for ConfigureDialog {
    fn from(value: &ViewConfig) -> Self {
        ConfigureDialog::new(value.month_offset, &value.sources)
    }
}

impl ConfigureDialog {
    pub fn new(month_offset: i32, sources: &[CalendarSource]) -> Self {
        ConfigureDialog {
            month_offset,
            sources: sources.iter().map(ConfigureSource::from).collect(),
        }
    }

    pub fn month_offset(&self) -> i32 {
        self.month_offset
    }

    pub fn sources(&self) -> &[ConfigureSource] {
        &self.sources
    }

    /// Take the offset from the text of the input. Text that is not an integer is ignored.
    pub fn set_month_offset(&mut self, text: &str) {
        if let Ok(month_offset) = text.trim().parse() {
            self.month_offset = month_offset;
        }
    }

    /// The month the offset selects, e.g. "March 2024".
    pub fn visible_month(&self, today: NaiveDate) -> String {
        initial_date(today, self.month_offset)
            .format("%B %Y")
            .to_string()
    }

    pub fn update(&mut self, ix: usize, field: Field, value: impl Into<String>) {
        let Some(source) = self.sources.get_mut(ix) else {
            return;
        };
        let value = value.into();
        match field {
            Field::Id => source.id = value,
            Field::Url => source.url = value,
            Field::Color => source.color = value,
        }
    }

    pub fn remove(&mut self, ix: usize) {
        if ix < self.sources.len() {
            self.sources.remove(ix);
        }
    }

    /// Append an empty row, unless there already is one.
    pub fn add_blank(&mut self) {
        if self.sources.iter().any(ConfigureSource::is_blank) {
            return;
        }
        self.sources.push(ConfigureSource::default());
    }

    /// The page URL to navigate to on save.
    pub fn save_url(&self, current: &Url) -> Url {
        let mut url = current.clone();
        url.set_fragment(None);
        {
            let mut query = url.query_pairs_mut();
            query
                .clear()
                .append_pair(MONTH_OFFSET_PARAM, &self.month_offset.to_string());
            for source in self.sources.iter().filter(|source| source.is_complete()) {
                query
                    .append_pair("id", &source.id)
                    .append_pair("ics", &source.url)
                    .append_pair("color", &source.color);
            }
        }
        url
    }
}
