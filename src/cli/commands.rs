use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::app::{ActionDispatcher, App, BlogViewState, SaveOutcome};
use crate::config::{AppConfig, SiteOptions};
use crate::grouping::{compute_groups, GroupedPosts};
use crate::posts::DisplayMode;
use crate::providers::{CategoryProvider, IndexProvider, KeyStore, ReadSet, ReadStateProvider};
use crate::repo::BlogRepo;
use crate::storage::StorageHandle;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Grouping: day, week, month, year or category (defaults to config)
    #[arg(long)]
    pub mode: Option<DisplayMode>,
    /// Emit the groups as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Slug of a post to delete (repeatable)
    #[arg(long = "delete", value_name = "SLUG")]
    pub delete: Vec<String>,
    /// Category name to add to the category list (repeatable)
    #[arg(long = "add-category", value_name = "NAME")]
    pub add_category: Vec<String>,
    /// Private key authorising the save
    #[arg(long, value_name = "PEM")]
    pub key: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Slug of the post to mark as read
    pub slug: String,
}

#[derive(Debug, Serialize)]
struct GroupOut<'a> {
    key: &'a str,
    label: &'a str,
    posts: Vec<PostOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PostOut<'a> {
    slug: &'a str,
    title: &'a str,
    date: &'a str,
    category: &'a str,
    read: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn list_posts(
    config: &AppConfig,
    repo: &BlogRepo,
    reads: &ReadSet,
    args: &ListArgs,
) -> Result<String> {
    let items = repo.fetch_index()?;
    let categories = repo.fetch_categories()?;
    let mode = args.mode.unwrap_or(config.default_display_mode);
    let grouped = compute_groups(&items, mode, &categories);
    if args.json {
        let mut json = serde_json::to_string_pretty(&groups_json(&grouped, reads))
            .context("serializing listing")?;
        json.push('\n');
        return Ok(json);
    }
    Ok(format_listing(&grouped, reads))
}

fn groups_json<'a>(grouped: &'a GroupedPosts, reads: &dyn ReadStateProvider) -> Vec<GroupOut<'a>> {
    grouped
        .iter()
        .map(|(key, group)| GroupOut {
            key,
            label: &group.label,
            posts: group
                .items
                .iter()
                .map(|post| PostOut {
                    slug: &post.slug,
                    title: post.title(),
                    date: &post.date,
                    category: post.category_or_default(),
                    read: reads.is_read(&post.slug),
                })
                .collect(),
        })
        .collect()
}

pub fn format_listing(grouped: &GroupedPosts, reads: &dyn ReadStateProvider) -> String {
    if grouped.is_empty() {
        return "No posts yet\n".to_string();
    }
    let mut output = String::new();
    for (_, group) in grouped.iter() {
        let _ = writeln!(output, "{} ({})", group.label, group.items.len());
        for post in &group.items {
            let marker = if reads.is_read(&post.slug) { ' ' } else { '*' };
            let _ = writeln!(
                output,
                "  {marker} {} [{}] {}",
                post.title(),
                post.slug,
                post.date
            );
        }
    }
    output
}

/// Runs the edit flow without the interactive view: stage categories,
/// select and delete the named posts, then save.
pub fn run_edit(
    config: &AppConfig,
    repo: &BlogRepo,
    storage: &StorageHandle,
    args: &EditArgs,
) -> Result<String> {
    let keys = KeyStore::new();
    let dispatcher = ActionDispatcher::new(storage, repo, &keys);
    let site = SiteOptions {
        hide_edit_button: false,
        ..config.site.clone()
    };
    let mut state = BlogViewState::new(site, DisplayMode::Year);
    dispatcher.reload(&mut state)?;

    state.toggle_edit_mode();
    for name in &args.add_category {
        if !state.add_category(name) {
            tracing::warn!(name = name.as_str(), "category not added");
        }
    }
    for slug in &args.delete {
        if !state.items().iter().any(|post| &post.slug == slug) {
            bail!("unknown post '{slug}'");
        }
        if !state.is_selected(slug) {
            state.toggle_select(slug);
        }
    }
    if !state.selection().is_empty() {
        state.delete_selected();
    }

    if !state.import_credential(&keys, &args.key) {
        bail!("Failed to read private key {}", args.key.display());
    }
    match dispatcher.save(&mut state)? {
        SaveOutcome::Saved { removed } => Ok(format!(
            "Removed {} post(s): {}",
            removed.len(),
            removed.join(", ")
        )),
        SaveOutcome::NoChanges => Ok("No changes to save".to_string()),
        SaveOutcome::Failed(reason) => bail!(reason),
        SaveOutcome::NeedsCredential => bail!("the private key in {} is empty", args.key.display()),
        SaveOutcome::InFlight => bail!("a save is already in progress"),
    }
}

pub fn list_categories(repo: &BlogRepo) -> Result<String> {
    let categories = repo.fetch_categories()?;
    if categories.is_empty() {
        return Ok("No categories\n".to_string());
    }
    let mut output = String::new();
    for name in categories {
        let _ = writeln!(output, "{name}");
    }
    Ok(output)
}

pub fn mark_read(repo: &BlogRepo, storage: &StorageHandle, args: &ReadArgs) -> Result<String> {
    let items = repo.fetch_index()?;
    let Some(post) = items.iter().find(|post| post.slug == args.slug) else {
        bail!("unknown post '{}'", args.slug);
    };
    storage.mark_read(&post.slug)?;
    Ok(format!("Marked \"{}\" as read", post.title()))
}
