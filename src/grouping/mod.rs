use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use time::OffsetDateTime;

use crate::posts::{DisplayMode, PostRecord};

/// Bucket used in time-based modes for posts whose date does not parse.
pub const UNDATED: &str = "Undated";

static WEEK_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?\d{4,})-W(\d{2})$").expect("valid week key pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub items: Vec<PostRecord>,
}

/// Posts bucketed by display mode. Iteration follows display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedPosts {
    groups: IndexMap<String, Group>,
}

impl GroupedPosts {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.groups.iter().map(|(key, group)| (key.as_str(), group))
    }

    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.get(key)
    }

    /// Stored label for `key`, or the key itself when there is no such group.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.groups
            .get(key)
            .map(|group| group.label.as_str())
            .unwrap_or(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.groups.values().map(|group| group.items.len()).sum()
    }

    /// Every post in display order, group by group.
    pub fn posts(&self) -> impl Iterator<Item = &PostRecord> {
        self.groups.values().flat_map(|group| group.items.iter())
    }

    /// Key of the group holding the `index`-th post of [`GroupedPosts::posts`].
    pub fn key_for_post_index(&self, index: usize) -> Option<&str> {
        let mut remaining = index;
        for (key, group) in &self.groups {
            if remaining < group.items.len() {
                return Some(key.as_str());
            }
            remaining -= group.items.len();
        }
        None
    }
}

pub fn compute_groups(
    items: &[PostRecord],
    mode: DisplayMode,
    category_order: &[String],
) -> GroupedPosts {
    let mut dated: Vec<(Option<OffsetDateTime>, &PostRecord)> =
        items.iter().map(|item| (item.parsed_date(), item)).collect();
    // stable: equal dates keep input order
    dated.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for (date, item) in dated {
        let (key, label) = bucket_for(item, date, mode);
        groups
            .entry(key)
            .or_insert_with(|| Group {
                label,
                items: Vec::new(),
            })
            .items
            .push(item.clone());
    }

    let ranks: HashMap<&str, usize> = category_order
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    groups.sort_by(|a, _, b, _| compare_keys(mode, &ranks, a, b));

    GroupedPosts { groups }
}

fn bucket_for(item: &PostRecord, date: Option<OffsetDateTime>, mode: DisplayMode) -> (String, String) {
    if mode == DisplayMode::Category {
        let key = item.category_or_default().to_string();
        return (key.clone(), key);
    }
    let Some(date) = date.map(|dt| dt.date()) else {
        return (UNDATED.to_string(), UNDATED.to_string());
    };
    match mode {
        DisplayMode::Day => {
            let key = format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            );
            (key.clone(), key)
        }
        DisplayMode::Week => {
            let (iso_year, week, _) = date.to_iso_week_date();
            (encode_week_key(iso_year, week), format!("Week {week}, {iso_year}"))
        }
        DisplayMode::Month => {
            let key = format!("{:04}-{:02}", date.year(), u8::from(date.month()));
            (key.clone(), key)
        }
        DisplayMode::Year | DisplayMode::Category => {
            let key = format!("{:04}", date.year());
            (key.clone(), key)
        }
    }
}

pub fn encode_week_key(iso_year: i32, week: u8) -> String {
    format!("{iso_year:04}-W{week:02}")
}

/// Inverse of [`encode_week_key`].
pub fn decode_week_key(key: &str) -> Option<(i32, u8)> {
    let caps = WEEK_KEY.captures(key)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let week = caps.get(2)?.as_str().parse().ok()?;
    Some((year, week))
}

fn compare_keys(mode: DisplayMode, ranks: &HashMap<&str, usize>, a: &str, b: &str) -> Ordering {
    if mode == DisplayMode::Category {
        let rank_a = ranks.get(a).copied().unwrap_or(usize::MAX);
        let rank_b = ranks.get(b).copied().unwrap_or(usize::MAX);
        return rank_a
            .cmp(&rank_b)
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
            .then_with(|| a.cmp(b));
    }

    match (a == UNDATED, b == UNDATED) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    if mode == DisplayMode::Week {
        match (decode_week_key(a), decode_week_key(b)) {
            (Some(a), Some(b)) => return b.cmp(&a),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }
    }

    b.cmp(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn post(slug: &str, date: &str) -> PostRecord {
        PostRecord::new(slug, date)
    }

    fn keys(grouped: &GroupedPosts) -> Vec<&str> {
        grouped.keys().collect()
    }

    fn slugs(group: &Group) -> Vec<&str> {
        group.items.iter().map(|item| item.slug.as_str()).collect()
    }

    fn sample() -> Vec<PostRecord> {
        vec![
            post("a", "2024-03-01").with_category("Life"),
            post("b", "2023-12-31").with_category("Tech"),
            post("c", "2024-01-15").with_category("Random"),
            post("d", "2024-01-01T09:00:00Z"),
            post("e", "2020-12-31T22:00:00-05:00").with_category("Tech"),
            post("f", "not a date").with_category("Life"),
        ]
    }

    #[test]
    fn year_mode_groups_and_orders_newest_first() {
        let items = vec![
            post("first", "2024-03-01"),
            post("second", "2023-12-31"),
            post("third", "2024-01-15"),
        ];
        let grouped = compute_groups(&items, DisplayMode::Year, &[]);
        assert_eq!(keys(&grouped), vec!["2024", "2023"]);
        assert_eq!(slugs(grouped.group("2024").unwrap()), vec!["first", "third"]);
        assert_eq!(slugs(grouped.group("2023").unwrap()), vec!["second"]);
        assert_eq!(grouped.label("2024"), "2024");
    }

    #[test]
    fn category_mode_follows_configured_order_then_alphabetical() {
        let items = vec![
            post("life", "2024-01-01").with_category("Life"),
            post("tech", "2024-01-02").with_category("Tech"),
            post("random", "2024-01-03").with_category("Random"),
            post("none", "2024-01-04"),
            post("apple", "2024-01-05").with_category("apple"),
        ];
        let order = vec!["Tech".to_string(), "Life".to_string()];
        let grouped = compute_groups(&items, DisplayMode::Category, &order);
        assert_eq!(
            keys(&grouped),
            vec!["Tech", "Life", "apple", "Random", "Uncategorized"]
        );
        assert_eq!(grouped.label("Uncategorized"), "Uncategorized");
    }

    #[test]
    fn every_mode_partitions_the_input_exactly() {
        let items = sample();
        let expected: HashSet<&str> = items.iter().map(|item| item.slug.as_str()).collect();
        for mode in [
            DisplayMode::Day,
            DisplayMode::Week,
            DisplayMode::Month,
            DisplayMode::Year,
            DisplayMode::Category,
        ] {
            let grouped = compute_groups(&items, mode, &[]);
            let seen: Vec<&str> = grouped.posts().map(|item| item.slug.as_str()).collect();
            assert_eq!(seen.len(), items.len(), "{mode}: item count");
            assert_eq!(seen.iter().copied().collect::<HashSet<_>>(), expected, "{mode}");
            assert!(grouped.iter().all(|(_, group)| !group.items.is_empty()));
            let unique: HashSet<&str> = grouped.keys().collect();
            assert_eq!(unique.len(), grouped.len());
        }
    }

    #[test]
    fn day_and_month_keys_use_the_dates_own_offset() {
        let items = sample();
        let by_day = compute_groups(&items, DisplayMode::Day, &[]);
        assert_eq!(
            keys(&by_day),
            vec![
                "2024-03-01",
                "2024-01-15",
                "2024-01-01",
                "2023-12-31",
                "2020-12-31",
                UNDATED
            ]
        );
        let by_month = compute_groups(&items, DisplayMode::Month, &[]);
        assert_eq!(
            keys(&by_month),
            vec!["2024-03", "2024-01", "2023-12", "2020-12", UNDATED]
        );
        assert_eq!(slugs(by_month.group("2024-01").unwrap()), vec!["c", "d"]);
    }

    #[test]
    fn week_mode_uses_iso_weeks_and_numeric_order() {
        let items = vec![
            post("w52", "2023-12-25"),
            post("w01-late", "2024-01-03"),
            post("w01-spill", "2023-01-01"),
            post("w10", "2024-03-04"),
            post("w09", "2024-02-26"),
        ];
        let grouped = compute_groups(&items, DisplayMode::Week, &[]);
        assert_eq!(
            keys(&grouped),
            vec!["2024-W10", "2024-W09", "2024-W01", "2023-W52", "2022-W52"]
        );
        assert_eq!(grouped.label("2024-W01"), "Week 1, 2024");
        assert_eq!(grouped.label("2022-W52"), "Week 52, 2022");
    }

    #[test]
    fn week_key_encoding_round_trips() {
        for (year, week) in [(2024, 1), (2024, 53), (1999, 10), (2020, 9)] {
            let key = encode_week_key(year, week);
            assert_eq!(decode_week_key(&key), Some((year, week)));
        }
        assert_eq!(encode_week_key(2024, 3), "2024-W03");
        assert_eq!(decode_week_key("2024-03"), None);
        assert_eq!(decode_week_key("2024-W3"), None);
    }

    #[test]
    fn equal_dates_keep_input_order_and_undated_sort_last() {
        let items = vec![
            post("undated-1", "???"),
            post("tie-1", "2024-05-05"),
            post("tie-2", "2024-05-05"),
            post("undated-2", ""),
            post("tie-3", "2024-05-05T00:00:00Z"),
        ];
        let grouped = compute_groups(&items, DisplayMode::Year, &[]);
        assert_eq!(keys(&grouped), vec!["2024", UNDATED]);
        assert_eq!(
            slugs(grouped.group("2024").unwrap()),
            vec!["tie-1", "tie-2", "tie-3"]
        );
        assert_eq!(
            slugs(grouped.group(UNDATED).unwrap()),
            vec!["undated-1", "undated-2"]
        );
    }

    #[test]
    fn fractional_offset_and_reduced_dates_are_not_undated() {
        for raw in [
            "2024-03-01T10:00:00.500",
            "2024-03-01T10:00:00+0800",
            "2024-03",
        ] {
            let grouped = compute_groups(&[post("x", raw)], DisplayMode::Year, &[]);
            assert_eq!(keys(&grouped), vec!["2024"], "{raw}");
        }
    }

    #[test]
    fn unknown_key_label_falls_back_to_key() {
        let grouped = compute_groups(&[], DisplayMode::Year, &[]);
        assert!(grouped.is_empty());
        assert_eq!(grouped.label("1999"), "1999");
    }

    #[test]
    fn post_index_maps_back_to_group_key() {
        let items = sample();
        let grouped = compute_groups(&items, DisplayMode::Year, &[]);
        assert_eq!(grouped.item_count(), items.len());
        assert_eq!(grouped.key_for_post_index(0), Some("2024"));
        assert_eq!(grouped.key_for_post_index(2), Some("2024"));
        assert_eq!(grouped.key_for_post_index(3), Some("2023"));
        assert_eq!(grouped.key_for_post_index(5), Some(UNDATED));
        assert_eq!(grouped.key_for_post_index(6), None);
    }
}
