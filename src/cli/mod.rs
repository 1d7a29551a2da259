use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::providers::KeyStore;
use crate::repo::BlogRepo;
use crate::storage;

pub mod commands;

use self::commands::{EditArgs, ListArgs, ReadArgs};

#[derive(Parser, Debug)]
#[command(
    name = "blogdesk",
    version,
    about = "Browse, group and prune a static blog's post index from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over BLOGDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over BLOGDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Blog checkout containing public/blogs/index.json (overrides blog.root)
    #[arg(long)]
    pub blog_root: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print the grouped post listing
    List(ListArgs),
    /// Delete posts and stage categories, then save
    Edit(EditArgs),
    /// Print the known categories in display order
    Categories,
    /// Mark a post as read
    Read(ReadArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let mut config = loader.load_or_init()?;
    if let Some(root) = cli.blog_root {
        config.blog.root = root;
    }
    let storage = storage::init(&config.storage)?;
    let repo = BlogRepo::open(config.blog.root.clone());
    tracing::debug!(root = %repo.root().display(), "using blog checkout");

    let config = Arc::new(config);
    let command = cli.command.unwrap_or(Commands::Tui);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, storage, repo, KeyStore::new())?;
            commands::run_tui(&mut app)
        }
        Commands::List(args) => {
            let reads = storage.fetch_read_slugs()?;
            print!("{}", commands::list_posts(&config, &repo, &reads, &args)?);
            Ok(())
        }
        Commands::Edit(args) => {
            println!("{}", commands::run_edit(&config, &repo, &storage, &args)?);
            Ok(())
        }
        Commands::Categories => {
            print!("{}", commands::list_categories(&repo)?);
            Ok(())
        }
        Commands::Read(args) => {
            println!("{}", commands::mark_read(&repo, &storage, &args)?);
            Ok(())
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
