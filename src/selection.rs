use std::collections::{BTreeSet, HashSet};

use crate::grouping::GroupedPosts;
use crate::posts::PostRecord;

/// Slugs marked for bulk deletion. Every operation returns a fresh set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    slugs: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.slugs.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            slugs: iter.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn toggle_select(set: &SelectionSet, slug: &str) -> SelectionSet {
    let mut next = set.clone();
    if !next.slugs.remove(slug) {
        next.slugs.insert(slug.to_string());
    }
    next
}

pub fn select_all(items: &[PostRecord]) -> SelectionSet {
    items.iter().map(|item| item.slug.clone()).collect()
}

/// Selects every post of the group, or deselects them all when the group is
/// already fully selected.
pub fn select_group(groups: &GroupedPosts, key: &str, current: &SelectionSet) -> SelectionSet {
    let Some(group) = groups.group(key) else {
        return current.clone();
    };
    let all_selected = group.items.iter().all(|item| current.contains(&item.slug));
    let mut next = current.clone();
    for item in &group.items {
        if all_selected {
            next.slugs.remove(&item.slug);
        } else {
            next.slugs.insert(item.slug.clone());
        }
    }
    next
}

pub fn deselect_all() -> SelectionSet {
    SelectionSet::new()
}

/// Draft without the selected posts, or `None` when nothing is selected.
pub fn delete_selected(draft: &[PostRecord], selection: &SelectionSet) -> Option<Vec<PostRecord>> {
    if selection.is_empty() {
        return None;
    }
    Some(
        draft
            .iter()
            .filter(|item| !selection.contains(&item.slug))
            .cloned()
            .collect(),
    )
}

/// Slugs of `original` missing from `draft`, in `original` order.
pub fn compute_removed_slugs(original: &[PostRecord], draft: &[PostRecord]) -> Vec<String> {
    let kept: HashSet<&str> = draft.iter().map(|item| item.slug.as_str()).collect();
    original
        .iter()
        .filter(|item| !kept.contains(item.slug.as_str()))
        .map(|item| item.slug.clone())
        .collect()
}
