//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use notepress_content::{AssetStrategy, filter_by_level};
use notepress_core::pipeline::{ExportConfig, ProgressReporter};
use notepress_core::{PostFetcher, PrefetchConfig, validate_bundle};
use notepress_notion::{ClientConfig, NotionHttpClient};
use notepress_shared::{
    AppConfig, FetchOptions, HeadingLevel, Post, api_key, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// notepress: a Notion workspace as a blog content source.
#[derive(Parser)]
#[command(
    name = "notepress",
    version,
    about = "Fetch published Notion pages as blog posts and export them for static builds.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// How `show` prints a post.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum ShowFormat {
    Json,
    Markdown,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List published posts, newest first.
    List {
        /// Only posts in this category.
        #[arg(long, conflicts_with = "tag")]
        category: Option<String>,

        /// Only posts with this tag.
        #[arg(long)]
        tag: Option<String>,
    },

    /// Print one post by its composite slug.
    Show {
        slug: String,

        #[arg(short, long, default_value = "markdown")]
        format: ShowFormat,
    },

    /// Print the table of contents of a post.
    Toc {
        slug: String,

        /// Deepest heading level to include (1-3).
        #[arg(long, default_value = "3")]
        max_level: u8,
    },

    /// List categories of published posts.
    Categories,

    /// Export all published posts as a bundle directory.
    Export {
        /// Bundle output directory.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Download post images and write the image mapping file.
    Images {
        /// Mapping file to update (defaults to `assets.mapping_file`).
        #[arg(long)]
        mapping_file: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "notepress=info",
        1 => "notepress=debug",
        _ => "notepress=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List { category, tag } => cmd_list(category.as_deref(), tag.as_deref()).await,
        Command::Show { slug, format } => cmd_show(&slug, format).await,
        Command::Toc { slug, max_level } => cmd_toc(&slug, max_level).await,
        Command::Categories => cmd_categories().await,
        Command::Export { out } => cmd_export(out).await,
        Command::Images { mapping_file } => cmd_images(mapping_file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Build a fetcher from config with the given asset strategy.
fn build_fetcher(
    config: &AppConfig,
    assets: AssetStrategy,
) -> Result<PostFetcher<NotionHttpClient>> {
    let key = api_key(config)?;
    let client = NotionHttpClient::new(ClientConfig::from(config).with_api_key(key))?;
    Ok(PostFetcher::new(client, assets, FetchOptions::from(config)))
}

/// Fetcher using the configured asset strategy.
fn configured_fetcher() -> Result<PostFetcher<NotionHttpClient>> {
    let config = load_config()?;
    let assets = AssetStrategy::from_config(&config.assets)?;
    build_fetcher(&config, assets)
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

async fn cmd_list(category: Option<&str>, tag: Option<&str>) -> Result<()> {
    let fetcher = configured_fetcher()?;

    let posts: Vec<Post> = match (category, tag) {
        (Some(category), _) => fetcher
            .get_posts_by_category(category)
            .await?
            .into_iter()
            .map(|d| d.post)
            .collect(),
        (None, Some(tag)) => fetcher
            .get_posts_by_tag(tag)
            .await?
            .into_iter()
            .map(|d| d.post)
            .collect(),
        (None, None) => fetcher.list_posts().await?,
    };

    if posts.is_empty() {
        println!("No published posts.");
        return Ok(());
    }

    for post in &posts {
        println!(
            "{}  {:<12} {}\n            {}",
            post.published_at.format("%Y-%m-%d"),
            post.category,
            post.title,
            post.slug()
        );
    }
    println!("\n  {} post(s)", posts.len());
    Ok(())
}

async fn cmd_show(slug: &str, format: ShowFormat) -> Result<()> {
    let fetcher = configured_fetcher()?;

    match format {
        ShowFormat::Markdown => {
            let markdown = fetcher.get_post_markdown(slug).await?;
            println!("{markdown}");
        }
        ShowFormat::Json => {
            let detail = fetcher.get_post_by_slug(slug).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
    }
    Ok(())
}

async fn cmd_toc(slug: &str, max_level: u8) -> Result<()> {
    let max_level = HeadingLevel::try_from(max_level).map_err(|e| eyre!(e))?;
    let fetcher = configured_fetcher()?;

    let detail = fetcher.get_post_by_slug(slug).await?;
    let toc = filter_by_level(&detail.toc, max_level);

    if toc.is_empty() {
        println!("No headings.");
        return Ok(());
    }
    for entry in &toc {
        let indent = "  ".repeat(entry.level.as_u8() as usize - 1);
        println!("{indent}- {} (#{})", entry.title, entry.anchor_id);
    }
    Ok(())
}

async fn cmd_categories() -> Result<()> {
    let fetcher = configured_fetcher()?;
    for category in fetcher.get_categories().await? {
        println!("{}  ({})", category.name, category.slug);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Build commands
// ---------------------------------------------------------------------------

async fn cmd_export(out: PathBuf) -> Result<()> {
    let fetcher = configured_fetcher()?;

    info!(out = %out.display(), "exporting bundle");

    let reporter = CliProgress::new();
    let export_config = ExportConfig {
        out_dir: out,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let result = notepress_core::export_bundle(&fetcher, &export_config, &reporter).await;
    reporter.finish();
    let result = result?;

    validate_bundle(&result.out_dir)?;

    println!();
    println!("  Bundle exported!");
    println!("  Posts:  {}", result.post_count);
    println!("  Path:   {}", result.out_dir.display());
    println!("  Time:   {:.1}s", result.elapsed.as_secs_f64());
    if !result.partial_posts.is_empty() {
        println!("  Partial content in:");
        for slug in &result.partial_posts {
            println!("    - {slug}");
        }
    }
    println!();

    Ok(())
}

async fn cmd_images(mapping_file: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    // Images are keyed by their proxy URL, so fetch without local substitution.
    let fetcher = build_fetcher(
        &config,
        AssetStrategy::Proxy {
            host: config.assets.proxy_host.clone(),
        },
    )?;
    let mapping_file =
        mapping_file.unwrap_or_else(|| PathBuf::from(&config.assets.mapping_file));

    let reporter = CliProgress::new();
    let result = notepress_core::prefetch_images(
        &fetcher,
        PrefetchConfig::from(&config),
        mapping_file,
        &reporter,
    )
    .await;
    reporter.finish();
    let result = result?;

    println!();
    println!("  Images prefetched!");
    println!("  Downloaded: {}", result.counts.downloaded);
    println!("  Reused:     {}", result.counts.skipped);
    println!("  Failed:     {}", result.counts.failed);
    println!("  Mapped:     {}", result.mapped);
    println!("  Mapping:    {}", result.mapping_file.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn post_fetched(&self, slug: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {slug}"));
    }

    fn image_processed(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Image [{current}/{total}] {url}"));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
