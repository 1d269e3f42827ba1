mod browser;
mod db;
mod engine;
mod output;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use engine::Outcome;

#[derive(Parser)]
#[command(
    name = "duo_words",
    about = "Scrape Duolingo Practice Hub vocabulary into a flat file and SQLite"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect words from the live page, then write the file and store sinks
    Run(RunArgs),
    /// Re-emit the flat file from the store (no browser needed)
    Export {
        /// Flat-file shape
        #[arg(long, value_enum, default_value = "csv")]
        format: output::Format,
        /// Flat-file path (defaults per --format)
        #[arg(long)]
        out: Option<PathBuf>,
        /// SQLite database path
        #[arg(long, env = "DUO_DB_PATH")]
        db: Option<String>,
    },
    /// Show store statistics
    Stats {
        /// SQLite database path
        #[arg(long, env = "DUO_DB_PATH")]
        db: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Attach to an already-running, already-logged-in browser over CDP
    /// instead of launching one
    #[arg(long)]
    attach: bool,

    /// CDP endpoint used with --attach
    #[arg(long, env = "DUO_CDP_ENDPOINT", default_value = browser::DEFAULT_CDP_ENDPOINT)]
    endpoint: String,

    /// Flat-file shape
    #[arg(long, value_enum, default_value = "csv")]
    format: output::Format,

    /// Flat-file path (defaults per --format)
    #[arg(long)]
    out: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, env = "DUO_DB_PATH")]
    db: Option<String>,

    /// Skip the database sink
    #[arg(long)]
    no_db: bool,

    /// Seconds to wait for the word-list markup to appear
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            attach: false,
            endpoint: browser::DEFAULT_CDP_ENDPOINT.to_string(),
            format: output::Format::Csv,
            out: None,
            db: std::env::var("DUO_DB_PATH").ok(),
            no_db: false,
            timeout_secs: 20,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args).await,
        Commands::Export { format, out, db } => export(format, out, db),
        Commands::Stats { db } => stats(db),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(args: RunArgs) -> Result<()> {
    let endpoint = args.attach.then_some(args.endpoint.as_str());
    let session =
        browser::open_words_page(endpoint, Duration::from_secs(args.timeout_secs)).await?;

    let expected = engine::expected::read_expected_total(&session.dom).await?;
    let harvest = engine::collect(&session.dom, expected).await?;
    session.close().await?;

    match harvest.outcome {
        Outcome::Done => println!(
            "Collected {} pairs in {} rounds (reached expected total).",
            harvest.pairs.len(),
            harvest.rounds
        ),
        Outcome::Stalled => println!(
            "Collected {} pairs in {} rounds (stalled; expected {}).",
            harvest.pairs.len(),
            harvest.rounds,
            harvest
                .expected
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into()),
        ),
    }

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(args.format.default_path()));
    output::write_pairs(&harvest.pairs, &out, args.format)?;
    println!("Saved word list to {}", out.display());

    if !args.no_db {
        let path = args.db.as_deref().context(
            "database path is not set; pass --db or set DUO_DB_PATH (or use --no-db)",
        )?;
        let conn = db::connect(path)?;
        db::init_schema(&conn)?;
        let lang = db::ensure_language(&conn, db::SOURCE_LANG_CODE, db::SOURCE_LANG_NAME)?;
        let counts = db::upsert_terms(&conn, lang, &harvest.pairs)?;
        println!(
            "Database: {} new terms, {} already present.",
            counts.inserted, counts.skipped
        );
    }

    Ok(())
}

fn export(format: output::Format, out: Option<PathBuf>, db: Option<String>) -> Result<()> {
    let path = db
        .as_deref()
        .context("database path is not set; pass --db or set DUO_DB_PATH")?;
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    let lang = db::ensure_language(&conn, db::SOURCE_LANG_CODE, db::SOURCE_LANG_NAME)?;
    let pairs = db::fetch_terms(&conn, lang)?;
    if pairs.is_empty() {
        println!("No stored terms. Run 'duo_words run' first.");
        return Ok(());
    }

    let out = out.unwrap_or_else(|| PathBuf::from(format.default_path()));
    output::write_pairs(&pairs, &out, format)?;
    println!("Exported {} pairs to {}", pairs.len(), out.display());
    Ok(())
}

fn stats(db: Option<String>) -> Result<()> {
    let path = db
        .as_deref()
        .context("database path is not set; pass --db or set DUO_DB_PATH")?;
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    let s = db::get_stats(&conn)?;
    println!("Languages: {}", s.languages);
    println!("Terms:     {}", s.terms);
    println!("Learned:   {}", s.learned);
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
