//! CLI module for the bgcompose binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, CatalogArgs, Cli, CliCategory, Command, ComposeArgs, SearchArgs};
