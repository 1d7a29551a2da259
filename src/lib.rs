pub mod app;
pub mod cli;
pub mod config;
pub mod grouping;
pub mod posts;
pub mod providers;
pub mod repo;
pub mod selection;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
