//! Background composition CLI
//!
//! Command-line front end for composing cut-outs onto backgrounds, resolving
//! prompts to stock photos and browsing the preset catalog.

use super::config::CliConfigBuilder;
use crate::{
    catalog::{BackgroundCatalog, Category},
    compositor::Compositor,
    config::{KeywordTable, SearchConfig, DEFAULT_SEARCH_ENDPOINT},
    search::{BackgroundSearch, PexelsIndex},
    services::{HttpFetcher, ImageCodec, ImageIOService, LocalOrHttpFetcher},
    tracing_config::{init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Background composition CLI tool
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcompose")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON (requires the `tracing-json` feature)
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compose a cut-out subject onto a background
    Compose(ComposeArgs),
    /// Resolve a prompt to a stock-photo background URL
    Search(SearchArgs),
    /// List preset backgrounds
    Catalog(CatalogArgs),
}

/// Arguments for `bgcompose compose`
#[derive(Debug, Clone, Args)]
pub struct ComposeArgs {
    /// Cut-out image with transparency (URL or local path)
    #[arg(short, long)]
    pub subject: String,

    /// Background image (URL, local path or preset id)
    #[arg(short, long)]
    pub background: String,

    /// Output PNG file. Use "-" for stdout.
    #[arg(short, long, default_value = "composite.png")]
    pub output: String,

    /// Subject width as a fraction of the background width (0, 1]
    #[arg(long)]
    pub scale: Option<f32>,

    /// Gaussian blur radius applied to the background
    #[arg(long)]
    pub bg_blur: Option<f32>,

    /// Subject saturation multiplier
    #[arg(long)]
    pub saturation: Option<f32>,

    /// Subject brightness multiplier
    #[arg(long)]
    pub brightness: Option<f32>,

    /// Disable the drop shadow
    #[arg(long)]
    pub no_shadow: bool,

    /// Shadow horizontal offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    pub shadow_offset_x: Option<i32>,

    /// Shadow vertical offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    pub shadow_offset_y: Option<i32>,

    /// Shadow blur radius
    #[arg(long)]
    pub shadow_blur: Option<f32>,

    /// Gap between the subject's bottom edge and the background's bottom edge
    #[arg(long)]
    pub bottom_margin: Option<u32>,

    /// Network timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

/// Arguments for `bgcompose search`
#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Free-text background description
    pub prompt: String,

    /// Stock-photo API key
    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Search endpoint
    #[arg(long, env = "PEXELS_ENDPOINT", default_value = DEFAULT_SEARCH_ENDPOINT)]
    pub endpoint: String,

    /// JSON keyword table replacing the built-in one
    #[arg(long, env = "BGCOMPOSE_KEYWORDS", value_name = "PATH")]
    pub keywords: Option<String>,

    /// Print the normalized query without searching
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `bgcompose catalog`
#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Only show one category
    #[arg(short, long, value_enum)]
    pub category: Option<CliCategory>,

    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliCategory {
    Studio,
    Office,
    Outdoor,
    Abstract,
}

impl From<CliCategory> for Category {
    fn from(category: CliCategory) -> Self {
        match category {
            CliCategory::Studio => Self::Studio,
            CliCategory::Office => Self::Office,
            CliCategory::Outdoor => Self::Outdoor,
            CliCategory::Abstract => Self::Abstract,
        }
    }
}

/// CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.log_json).context("Failed to initialize tracing")?;

    match cli.command {
        Command::Compose(args) => run_compose(&args).await,
        Command::Search(args) => run_search(&args).await,
        Command::Catalog(args) => run_catalog(&args),
    }
}

async fn run_compose(args: &ComposeArgs) -> Result<()> {
    let span = spans::command("compose");
    let _guard = span.enter();

    let catalog = BackgroundCatalog::builtin();
    let (background_url, params) = CliConfigBuilder::resolve_background(args, &catalog)?;
    debug!(background = %background_url, ?params, "Resolved compose inputs");

    let http = HttpFetcher::new(Duration::from_secs(args.timeout))
        .context("Failed to create HTTP client")?;
    let compositor = Compositor::new(Arc::new(LocalOrHttpFetcher::new(http)));

    let bytes = compositor
        .compose(&args.subject, &background_url, &params)
        .await
        .context("Composition failed")?;

    if args.output == "-" {
        std::io::stdout()
            .lock()
            .write_all(&bytes)
            .context("Failed to write composite to stdout")?;
    } else {
        ImageIOService::save_bytes(&bytes, &args.output)
            .with_context(|| format!("Failed to save {}", args.output))?;
        let image = ImageCodec::decode_any(&bytes)?;
        info!(
            output = %args.output,
            width = image.width(),
            height = image.height(),
            "Composite written"
        );
        println!("✅ {} ({}x{})", args.output, image.width(), image.height());
    }

    Ok(())
}

async fn run_search(args: &SearchArgs) -> Result<()> {
    let span = spans::command("search");
    let _guard = span.enter();

    let mut config = SearchConfig {
        endpoint: args.endpoint.clone(),
        api_key: args.api_key.clone().unwrap_or_default(),
        ..SearchConfig::default()
    };
    if let Some(path) = &args.keywords {
        config.keywords = KeywordTable::from_json_file(path)
            .with_context(|| format!("Failed to load keyword table {}", path))?;
    }

    let query = config.keywords.normalize(&args.prompt);
    println!("query: {}", query);
    if args.dry_run {
        return Ok(());
    }

    let index = PexelsIndex::new(&config).context("Search is not configured")?;
    let search = BackgroundSearch::new(Arc::new(index), &config);
    let url = search.search(&args.prompt).await.context("Search failed")?;
    println!("url: {}", url);

    Ok(())
}

fn run_catalog(args: &CatalogArgs) -> Result<()> {
    let catalog = BackgroundCatalog::builtin();
    let entries: Vec<_> = match args.category {
        Some(category) => catalog.by_category(category.into()).collect(),
        None => catalog.list().iter().collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No preset backgrounds in this category");
        return Ok(());
    }
    for entry in entries {
        println!("{:<16} {:<10} {}", entry.id, entry.category, entry.label);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compose_command() {
        let cli = Cli::try_parse_from([
            "bgcompose",
            "-vv",
            "compose",
            "--subject",
            "cutout.png",
            "--background",
            "studio-soft",
            "--scale",
            "0.5",
            "--shadow-offset-x",
            "-4",
            "--no-shadow",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Compose(args) = cli.command else {
            panic!("expected compose");
        };
        assert_eq!(args.background, "studio-soft");
        assert_eq!(args.scale, Some(0.5));
        assert_eq!(args.shadow_offset_x, Some(-4));
        assert!(args.no_shadow);
        assert_eq!(args.output, "composite.png");
    }

    #[test]
    fn test_parse_catalog_command() {
        let cli = Cli::try_parse_from(["bgcompose", "catalog", "--category", "studio"]).unwrap();
        let Command::Catalog(args) = cli.command else {
            panic!("expected catalog");
        };
        assert_eq!(args.category, Some(CliCategory::Studio));
        assert!(run_catalog(&args).is_ok());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["bgcompose"]).is_err());
    }
}
