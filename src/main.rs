mod config;
mod database;
mod entities;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;
mod time_units;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use serde::Serialize;

use crate::{
    config::Config,
    database::Database,
    logging::init_tracing,
    services::listen_time::ListenTimeService,
    spotify_rs::{auth::ClientCredentials, client::SpotifyClient},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "LISTEN_TIME_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Export spans to this OTLP gRPC endpoint
    #[arg(long, env = "OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Spotify client id, overrides the config file
    #[arg(long, env = "SPOTIFY_ID", global = true, hide_env_values = true)]
    client_id: Option<String>,

    /// Spotify client secret, overrides the config file
    #[arg(long, env = "SPOTIFY_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search artists by name
    Search {
        query: String,

        #[arg(short, long, default_value = "5")]
        limit: u32,
    },
    /// Show an artist
    Artist { id: String },
    /// List an artist's albums with their runtimes
    Albums { id: String },
    /// List the cached tracks of an album
    Tracks { album_id: String },
    /// How long it takes to listen to everything by an artist
    Timing {
        /// Artist id, or a name to search for
        artist: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the cache database is reachable
    Health,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).wrap_err("Failed to serialize output")?
    );
    Ok(())
}

async fn build_service(
    args: &Args,
    config: &Config,
) -> Result<ListenTimeService<SpotifyClient>> {
    let credentials =
        config.spotify_credentials(args.client_id.clone(), args.client_secret.clone())?;
    let request_timeout = config.request_timeout()?;

    tracing::debug!("Opening database at: {}", config.database_path().display());
    let database = Arc::new(Database::open(&config.database_path()).await?);

    let http = reqwest::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .wrap_err("Failed to build HTTP client")?;

    let credentials = Arc::new(ClientCredentials::new(
        credentials.client_id,
        credentials.client_secret,
        &config.spotify().accounts_base_url,
        http.clone(),
        request_timeout,
    ));
    let client = SpotifyClient::new(
        http,
        credentials,
        &config.spotify().api_base_url,
        request_timeout,
    );

    Ok(
        ListenTimeService::new(database, client, config.cache_retention()?)
            .with_album_concurrency(config.spotify().album_concurrency),
    )
}

async fn run(args: Args) -> Result<()> {
    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .wrap_err("Failed to load listen-time config")?;

    let service = build_service(&args, &config).await?;

    match &args.command {
        Commands::Search { query, limit } => {
            print_json(&service.search_artists(query, *limit).await?)?;
        }
        Commands::Artist { id } => match service.get_artist_by_id(id).await? {
            Some(artist) => print_json(&artist)?,
            None => color_eyre::eyre::bail!("Artist {} not found", id),
        },
        Commands::Albums { id } => {
            print_json(&service.get_artist_albums(id).await?)?;
        }
        Commands::Tracks { album_id } => {
            print_json(&service.get_album_tracks(album_id).await?)?;
        }
        Commands::Timing { artist, json } => match service.resolve_artist_timing(artist).await? {
            Some(timing) if *json => print_json(&timing)?,
            Some(timing) if timing.time.string.is_empty() => {
                println!("There is nothing to listen to by {}", timing.artist.name);
            }
            Some(timing) => println!(
                "It takes {} to listen to everything by {}",
                timing.time.string, timing.artist.name
            ),
            None => color_eyre::eyre::bail!("No artist found for '{}'", artist),
        },
        Commands::Health => {
            let artists = service.health().await?;
            print_json(&serde_json::json!({ "status": "ok", "artists": artists }))?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        env!("CARGO_PKG_NAME"),
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    tracing::debug!("listen-time starting");
    let result = run(args).await;

    if let Some(tracer_provider) = tracer_provider {
        if let Err(err) = tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {err}");
        }
    }

    result
}
