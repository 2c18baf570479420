//! Catalog state and the pure derivation of the visible page.
//!
//! Nothing here touches the network or the clock; [`CatalogState::derive`]
//! is a function of the source set, the query, the series filter and the
//! requested page.

use std::collections::BTreeSet;

use pulpit_proto::protocol::{PublicationStatus, Sermon};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::format::{format_count, format_duration, format_preached};

pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Series selection.  On the wire this is the plain label, with `"all"`
/// meaning no filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeriesFilter {
    #[default]
    All,
    Series(String),
}

impl SeriesFilter {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case("all") {
            SeriesFilter::All
        } else {
            SeriesFilter::Series(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SeriesFilter::All => "all",
            SeriesFilter::Series(s) => s,
        }
    }

    fn admits(&self, sermon: &Sermon) -> bool {
        match self {
            SeriesFilter::All => true,
            SeriesFilter::Series(label) => sermon.series.as_deref() == Some(label.as_str()),
        }
    }
}

impl Serialize for SeriesFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for SeriesFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(SeriesFilter::from_label(&label))
    }
}

/// One catalog entry with its display labels precomputed.  Serialises as
/// the sermon's own fields plus the labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SermonCard {
    #[serde(flatten)]
    pub sermon: Sermon,
    pub duration_label: String,
    pub preached_label: String,
    pub views_label: String,
}

impl From<&Sermon> for SermonCard {
    fn from(sermon: &Sermon) -> Self {
        Self {
            duration_label: format_duration(sermon.duration),
            preached_label: format_preached(&sermon.date_preached),
            views_label: format_count(sermon.views),
            sermon: sermon.clone(),
        }
    }
}

/// Everything the host needs to render one catalog page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub items: Vec<SermonCard>,
    /// Requested page clamped to `[1, total_pages]`.
    pub current_page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub page_size: usize,
    pub available_series: Vec<String>,
    pub search_query: String,
    pub filter: SeriesFilter,
}

#[derive(Debug, Clone)]
pub struct CatalogState {
    source: Vec<Sermon>,
    search_query: String,
    filter: SeriesFilter,
    current_page: usize,
    page_size: usize,
    selected: Option<Sermon>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CatalogState {
    pub fn new(page_size: usize) -> Self {
        Self {
            source: Vec::new(),
            search_query: String::new(),
            filter: SeriesFilter::All,
            current_page: 1,
            page_size: page_size.max(1),
            selected: None,
        }
    }

    pub fn source(&self) -> &[Sermon] {
        &self.source
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn selected(&self) -> Option<&Sermon> {
        self.selected.as_ref()
    }

    /// Replace the working set, keeping only published items in source
    /// order.  Returns how many were kept.
    pub fn replace_source(&mut self, items: Vec<Sermon>) -> usize {
        self.source = items
            .into_iter()
            .filter(|s| s.status == PublicationStatus::Published)
            .collect();
        self.source.len()
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 1;
    }

    pub fn set_filter(&mut self, filter: SeriesFilter) {
        self.filter = filter;
        self.current_page = 1;
    }

    /// Out-of-range pages are accepted here and clamped at derivation time,
    /// so a page chosen before a refresh survives if it still exists.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Select by id from the current source set.  Unknown ids leave the
    /// selection untouched and return false.
    pub fn select(&mut self, id: &str) -> bool {
        match self.source.iter().find(|s| s.id == id) {
            Some(sermon) => {
                self.selected = Some(sermon.clone());
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn derive(&self) -> CatalogView {
        let needle = self.search_query.trim().to_lowercase();
        let matches: Vec<&Sermon> = self
            .source
            .iter()
            .filter(|s| self.filter.admits(s))
            .filter(|s| needle.is_empty() || matches_query(s, &needle))
            .collect();

        let total_matches = matches.len();
        let total_pages = total_matches.div_ceil(self.page_size).max(1);
        let current_page = self.current_page.clamp(1, total_pages);

        let items = matches
            .into_iter()
            .skip((current_page - 1) * self.page_size)
            .take(self.page_size)
            .map(SermonCard::from)
            .collect();

        let available_series = self
            .source
            .iter()
            .filter_map(|s| s.series_label())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        CatalogView {
            items,
            current_page,
            total_pages,
            total_matches,
            page_size: self.page_size,
            available_series,
            search_query: self.search_query.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// `needle` is already trimmed and lower-cased.
fn matches_query(sermon: &Sermon, needle: &str) -> bool {
    sermon.title.to_lowercase().contains(needle)
        || sermon.main_speaker.to_lowercase().contains(needle)
        || sermon
            .series
            .as_deref()
            .is_some_and(|series| series.to_lowercase().contains(needle))
}
