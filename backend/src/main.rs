//! Samplefindr CLI - find the sample behind any song
//!
//! # Main Commands
//!
//! ```bash
//! samplefindr serve                              # Start HTTP server (port 3000)
//! samplefindr search "California Love 2Pac"      # Run the full pipeline
//! samplefindr home now --samples-only            # Curated home lists
//! ```
//!
//! # Debug Commands (one stage at a time)
//!
//! ```bash
//! samplefindr identify "Juicy Biggie"           # Stage 1 only
//! samplefindr video "Stan" "Eminem"             # Stage 2 only
//! samplefindr metadata "Stan" "Eminem"          # Stage 3 only
//! ```
//!
//! Pass `--remote <url>` to use a deployed server instead of calling the
//! upstream APIs directly.

use clap::{Parser, Subcommand, ValueEnum};
use samplefindr::api::start_server;
use samplefindr::{home_tracks, AppState, Config, HomeList, MetadataLookup, Query};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "samplefindr")]
#[command(about = "Find the sample behind any song", long_about = None)]
struct Cli {
    /// Env file to read before the process environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Base URL of a deployed Samplefindr server to use as upstream
    #[arg(long, global = true)]
    remote: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3000")]
        port: u16,
    },

    /// Resolve a query, then enrich it with videos and metadata
    Search {
        /// Free-text query, e.g. "California Love 2Pac"
        query: String,
    },

    /// Identify the song and its primary sample
    Identify {
        query: String,
    },

    /// Find the official video for a track
    Video {
        title: String,
        artist: String,
    },

    /// Look up catalog metadata for a track
    Metadata {
        title: String,
        artist: String,
    },

    /// Show a curated home list
    Home {
        #[arg(value_enum)]
        list: ListArg,

        /// Number of tracks (default: 6)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only tracks with a verified sample
        #[arg(long)]
        samples_only: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListArg {
    Now,
    Discover,
}

impl From<ListArg> for HomeList {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Now => HomeList::Now,
            ListArg::Discover => HomeList::Discover,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("samplefindr=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };

    if let Commands::Home {
        list,
        limit,
        samples_only,
    } = cli.command
    {
        return cmd_home(list.into(), limit, samples_only, &config);
    }

    let state = match &cli.remote {
        Some(url) => {
            eprintln!("🌐 Using remote upstream: {}", url);
            AppState::remote(url, &config)
        }
        None => AppState::from_config(&config)?,
    };

    match cli.command {
        Commands::Serve { port } => {
            start_server(state, port, config.catalog_cache_ttl).await?;
            Ok(())
        }
        Commands::Search { query } => cmd_search(&state, &query).await,
        Commands::Identify { query } => cmd_identify(&state, &query).await,
        Commands::Video { title, artist } => cmd_video(&state, &title, &artist).await,
        Commands::Metadata { title, artist } => cmd_metadata(&state, &title, &artist).await,
        Commands::Home { .. } => Ok(()),
    }
}

async fn cmd_search(state: &AppState, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔎 Searching: {}", query);

    let pipeline = state.pipeline();
    let mut rx = pipeline.subscribe();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            eprintln!(
                "   [{}] {:?}: {} result(s), {} video / {} metadata pending",
                snap.generation,
                snap.phase,
                snap.entries.len(),
                snap.video_loading.len(),
                snap.metadata_loading.len()
            );
        }
    });

    let settled = pipeline.run(query).await;
    watcher.abort();

    match settled? {
        Some(snapshot) => {
            eprintln!("✨ Settled with {} result(s)", snapshot.entries.len());
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        None => eprintln!("⚠️  Superseded before settling"),
    }
    Ok(())
}

async fn cmd_identify(state: &AppState, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let query = Query::parse(query)?;
    eprintln!("🎵 Identifying: {}", query.as_str());

    let ident = state.sample_resolver().resolve(&query).await;
    if ident.is_unknown() {
        eprintln!("⚠️  Unknown song");
    }
    println!("{}", serde_json::to_string_pretty(&ident)?);
    Ok(())
}

async fn cmd_video(state: &AppState, title: &str, artist: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📺 Video search: {} - {}", artist, title);

    let found = state.video_resolver().find_video(title, artist).await;
    let threshold = state.config().video_threshold;
    match found.accepted(threshold) {
        Some(url) => eprintln!("✅ Accepted: {}", url),
        None => eprintln!("⚠️  No video above confidence {}", threshold),
    }
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

async fn cmd_metadata(state: &AppState, title: &str, artist: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("💿 Metadata: {} - {}", artist, title);

    match state.catalog().lookup(title, artist).await {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => eprintln!("⚠️  No catalog match"),
    }
    Ok(())
}

fn cmd_home(
    list: HomeList,
    limit: Option<usize>,
    samples_only: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let home = home_tracks(list, limit, samples_only, config.pipeline.discovery_threshold);
    eprintln!("📋 {} track(s)", home.total);
    println!("{}", serde_json::to_string_pretty(&home)?);
    Ok(())
}
