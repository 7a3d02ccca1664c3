//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bindery_core::{Book, BuildOptions, BuildResult, Pipeline, ProgressReporter};
use bindery_plugins::{HookCatalog, NpmRegistry, PluginInstaller, TarballInstaller};
use bindery_shared::{AppConfig, Article, BuildStage, SummaryNode, init_config, load_config};

use crate::manifest::ManifestGenerator;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Bindery: build structured books with plugins.
#[derive(Parser)]
#[command(
    name = "bindery",
    version,
    about = "Build structured books through a plugin-extensible pipeline.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a book.
    ///
    /// Plugins are resolved and installed under `node_modules`, but this
    /// binary registers no native hook handlers, so every hook passes its
    /// payload through unchanged. Programs embedding `bindery-core` supply
    /// handlers through the `HookCatalog` given to `Pipeline::new`.
    Build {
        /// Book root directory.
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Output directory (defaults to `[defaults] output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Inspect or install the book's plugins.
    Plugins {
        #[command(subcommand)]
        action: PluginsAction,
    },

    /// Print the table of contents.
    Summary {
        /// Book root directory.
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Only print the entry at this dotted level (e.g., `1.2`).
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Plugin subcommands.
#[derive(Subcommand)]
pub(crate) enum PluginsAction {
    /// Print the resolved plugin set.
    List {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Resolve and install the plugin set without building.
    Install {
        #[arg(default_value = ".")]
        root: PathBuf,
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
        0 => "bindery=info",
        1 => "bindery=debug",
        _ => "bindery=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Build { root, out } => cmd_build(&root, out).await,
        Command::Plugins { action } => match action {
            PluginsAction::List { root } => cmd_plugins_list(&root).await,
            PluginsAction::Install { root } => cmd_plugins_install(&root).await,
        },
        Command::Summary { root, level } => cmd_summary(&root, level.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Build the pipeline from the loaded config.
///
/// The catalog is empty: installed plugins load without hook handlers.
fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let registry = NpmRegistry::from_config(&config.registry)?;
    let host_version = semver::Version::parse(env!("CARGO_PKG_VERSION"))?;
    let installer = PluginInstaller::new(
        Arc::new(registry.clone()),
        Arc::new(TarballInstaller::new(registry)),
        host_version,
        config.registry.engine.as_str(),
    );
    Ok(Pipeline::new(installer, HookCatalog::new()))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(root: &Path, out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    if config.defaults.generator != "manifest" {
        return Err(eyre!(
            "unknown generator '{}': expected 'manifest'",
            config.defaults.generator
        ));
    }

    let book = Book::load(root)?;
    let mut options = BuildOptions::from_config(&config);
    if let Some(out) = out {
        options = options.with_output(out);
    }

    info!(root = %root.display(), title = %book.title(), "building book");

    let pipeline = build_pipeline(&config)?;
    let reporter = CliProgress::new();
    let output = pipeline
        .generate_book(&ManifestGenerator, book, options, &reporter)
        .await;
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let result = BuildResult::from_output(&output);

    println!();
    println!("  Book built successfully!");
    println!("  Title:     {}", output.book().title());
    println!("  Generator: {}", result.generator);
    println!("  Plugins:   {}", result.plugin_count);
    println!("  Pages:     {}", result.page_count);
    println!("  Assets:    {}", result.asset_count);
    println!("  Output:    {}", result.output_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_plugins_list(root: &Path) -> Result<()> {
    let config = load_config()?;
    let book = Book::load(root)?;
    let options = BuildOptions::from_config(&config);
    let plugins = build_pipeline(&config)?.resolve_plugins(&book, &options)?;

    if plugins.is_empty() {
        println!("No plugins.");
    }
    for plugin in &plugins {
        println!("  {:<24} {:<12} {}", plugin.name(), plugin.version(), plugin.package_id());
    }
    let disabled: Vec<&str> = plugins.disabled().collect();
    if !disabled.is_empty() {
        println!("  disabled: {}", disabled.join(", "));
    }
    Ok(())
}

async fn cmd_plugins_install(root: &Path) -> Result<()> {
    let config = load_config()?;
    let book = Book::load(root)?;
    let options = BuildOptions::from_config(&config);
    let pipeline = build_pipeline(&config)?;
    let plugins = pipeline.resolve_plugins(&book, &options)?;

    info!(count = plugins.len(), "installing plugins");

    let reporter = CliProgress::new();
    let installed = pipeline.install_plugins(&book, &plugins, &reporter).await;
    reporter.spinner.finish_and_clear();

    for plugin in &installed? {
        println!(
            "  {} {}",
            plugin.name(),
            plugin.resolved_version().unwrap_or(plugin.version())
        );
    }
    Ok(())
}

async fn cmd_summary(root: &Path, level: Option<&str>) -> Result<()> {
    let book = Book::load(root)?;
    let summary = book.summary();

    match level {
        Some(level) => {
            let node = summary
                .get_by_level(level)
                .ok_or_else(|| eyre!("no summary entry at level '{level}'"))?;
            match node {
                SummaryNode::Part(part) => {
                    println!("{} {}", part.level(), part.title().unwrap_or("(untitled part)"));
                }
                SummaryNode::Article(article) => print_article(article, 0),
            }
            for child in node.children() {
                print_articles(child, 1);
            }
        }
        None => {
            for part in summary.parts() {
                if let Some(title) = part.title() {
                    println!("{} {title}", part.level());
                }
                for article in part.articles() {
                    print_articles(article, 1);
                }
            }
        }
    }
    Ok(())
}

fn print_article(article: &Article, depth: usize) {
    let indent = "  ".repeat(depth);
    match article.path() {
        Some(path) => println!("{indent}{} {} ({path})", article.level(), article.title()),
        None => println!("{indent}{} {}", article.level(), article.title()),
    }
}

fn print_articles(article: &Article, depth: usize) {
    print_article(article, depth);
    for child in article.children() {
        print_articles(child, depth + 1);
    }
}

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
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: BuildStage) {
        self.spinner.set_message(stage.to_string());
    }

    fn plugin_installed(&self, name: &str, version: &str) {
        self.spinner
            .set_message(format!("Installed plugin {name}@{version}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}
