use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Category used for posts that carry no category of their own.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One entry of the blog index.
///
/// Only `slug`, `date` and `category` drive grouping; every other field of the
/// index entry is carried through `extra` untouched so a save writes it back
/// exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub slug: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostRecord {
    pub fn new(slug: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            date: date.into(),
            category: None,
            extra: Map::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn parsed_date(&self) -> Option<OffsetDateTime> {
        parse_post_date(&self.date)
    }

    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref() {
            Some(category) if !category.is_empty() => category,
            _ => UNCATEGORIZED,
        }
    }

    pub fn title(&self) -> &str {
        self.extra
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.slug)
    }

    pub fn summary(&self) -> Option<&str> {
        self.extra
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.extra
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Parses the ISO 8601 date forms found in blog indexes.
///
/// Date-times without an offset, bare dates and reduced-precision `YYYY-MM` /
/// `YYYY` values are read as UTC, the latter two at the start of the period.
/// Offsets that are present are kept, so calendar fields come out in the
/// post's own zone.
pub fn parse_post_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt);
    }
    // extended date and time followed by a basic `+hhmm` offset
    let with_offset = format_description!(
        version = 2,
        "[year]-[month]-[day][first [T][ ]][hour]:[minute][optional [:[second][optional [.[subsecond]]]]][offset_hour sign:mandatory][optional [:]][offset_minute]"
    );
    if let Ok(dt) = OffsetDateTime::parse(raw, with_offset) {
        return Some(dt);
    }
    let naive = format_description!(
        version = 2,
        "[year]-[month]-[day][first [T][ ]][hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
    );
    if let Ok(dt) = PrimitiveDateTime::parse(raw, naive) {
        return Some(dt.assume_utc());
    }
    if let Ok(dt) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Some(dt);
    }
    let day_only = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(raw, day_only) {
        return Some(date.with_time(Time::MIDNIGHT).assume_utc());
    }
    parse_reduced_date(raw).map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
}

/// `YYYY-MM` or `YYYY`, as the first day of that month or year.
fn parse_reduced_date(raw: &str) -> Option<Date> {
    let (year, month) = match raw.split_once('-') {
        Some((year, month)) if month.len() == 2 => (year, month.parse::<u8>().ok()?),
        Some(_) => return None,
        None => (raw, 1),
    };
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, 1).ok()
}

/// Granularity used to bucket the post list.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DisplayMode {
    Day,
    Week,
    Month,
    Year,
    Category,
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Year
    }
}

impl DisplayMode {
    pub fn is_time_based(self) -> bool {
        !matches!(self, DisplayMode::Category)
    }

    /// Next mode in declaration order, wrapping around. `Category` is skipped
    /// when categories are disabled for the site.
    pub fn next(self, categories_enabled: bool) -> DisplayMode {
        let modes: Vec<DisplayMode> = DisplayMode::iter()
            .filter(|mode| categories_enabled || mode.is_time_based())
            .collect();
        let position = modes.iter().position(|mode| *mode == self);
        match position {
            Some(idx) => modes[(idx + 1) % modes.len()],
            None => modes[0],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            DisplayMode::Day => "Day",
            DisplayMode::Week => "Week",
            DisplayMode::Month => "Month",
            DisplayMode::Year => "Year",
            DisplayMode::Category => "Category",
        }
    }
}

/// Result of staging a new category name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryAddition {
    Added(Vec<String>),
    Duplicate,
    Blank,
}

pub fn add_category(list: &[String], name: &str) -> CategoryAddition {
    let value = name.trim();
    if value.is_empty() {
        return CategoryAddition::Blank;
    }
    if list.iter().any(|existing| existing == value) {
        return CategoryAddition::Duplicate;
    }
    let mut next = list.to_vec();
    next.push(value.to_string());
    CategoryAddition::Added(next)
}
