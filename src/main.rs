use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kite_digest::config::Config;
use kite_digest::site::{self, STORIES_FILE};
use kite_digest::validate;
use kite_digest::workflow;

#[derive(Parser)]
#[command(name = "kite-digest")]
#[command(about = "Turn Kagi Kite category feeds into an RSS feed and static pages")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "KITE_CONFIG", default_value = "kite.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, process and write the stories file, feed and pages
    Run {
        /// Directory receiving all output files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Fetch and process feeds, writing the processed stories as JSON
    Process {
        /// Output file (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the feed and pages from an existing stories file
    Render {
        /// Processed stories file
        #[arg(short, long, default_value = STORIES_FILE)]
        input: PathBuf,

        /// Directory receiving the feed and pages
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Check a generated site for a parseable feed and missing pages
    Validate {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kite_digest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { output_dir } => {
            let config = load_config(&cli.config)?;
            let report = workflow::run(&config, &output_dir, Utc::now()).await?;
            println!(
                "Generated {} story pages, {} and {} in {}",
                report.pages,
                site::FEED_FILE,
                site::INDEX_FILE,
                report.output_dir.display()
            );
        }
        Commands::Process { output } => {
            let config = load_config(&cli.config)?;
            let outcome = workflow::fetch_and_process(&config, Utc::now()).await?;
            match output {
                Some(path) => site::write_stories(&path, &outcome.stories)?,
                None => {
                    let json = site::stories_to_json(&outcome.stories)?;
                    writeln!(io::stdout(), "{}", json)?;
                }
            }
        }
        Commands::Render { input, output_dir } => {
            let config = load_config(&cli.config)?;
            let stories = site::read_stories(&input)?;
            info!("Loaded {} stories from {}", stories.len(), input.display());
            let report = site::generate_site(&output_dir, &config.site, &stories, Utc::now())?;
            println!("Generated {} story pages in {}", report.pages, report.output_dir.display());
        }
        Commands::Validate { output_dir } => {
            let check = validate::check_site(&output_dir)?;
            println!(
                "Feed: {} items, {} thumbnails ({} with size); {} story pages",
                check.feed.items,
                check.feed.thumbnails,
                check.feed.thumbnails_with_size,
                check.story_pages
            );
            if !check.is_ok() {
                for page in &check.missing_pages {
                    warn!("Missing page: {}", page);
                }
                anyhow::bail!("{} feed items link to missing pages", check.missing_pages.len());
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    info!(
        "Loaded {} categories and {} direct sources from {}",
        config.feeds.categories.len(),
        config.feeds.sources.len(),
        path.display()
    );
    Ok(config)
}
