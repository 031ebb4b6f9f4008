use cinesearch::catalog::{Movie, SearchRequest};
use cinesearch::cli::{parse_browse_line, BrowseInput, Cli, Commands, ConfigAction, BROWSE_HELP};
use cinesearch::client::{
    spawn_session, ClientSearchState, HttpBackend, Phase, SessionConfig, UserAction,
};
use cinesearch::config::Config;
use cinesearch::engine::ElasticEngine;
use cinesearch::error::{CineError, Result};
use cinesearch::search::HybridSearcher;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
        Commands::Browse { server } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_browse(&config, server).await?;
        }
        command => {
            let config = load_config(cli.config, cli.profile)?;
            let searcher = build_searcher(&config)?;
            run_engine_command(command, &config, searcher).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "cinesearch=debug"
    } else {
        "cinesearch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn build_searcher(config: &Config) -> Result<Arc<HybridSearcher>> {
    let engine = ElasticEngine::new(&config.engine)?;
    let searcher = HybridSearcher::from_config(Arc::new(engine), config)?;
    Ok(Arc::new(searcher))
}

async fn run_engine_command(
    command: Commands,
    config: &Config,
    searcher: Arc<HybridSearcher>,
) -> Result<()> {
    match command {
        Commands::Serve => {
            cinesearch::server::serve(config, searcher).await?;
        }
        Commands::Search {
            query,
            ratio,
            genres,
            rating_min,
            rating_max,
            page,
            page_size,
            json,
        } => {
            let request = SearchRequest::new(query)
                .with_semantic_ratio(ratio)
                .with_genres(genres)
                .with_rating(rating_min, rating_max)
                .with_page(page, page_size);
            let result = searcher.search(request).await?;

            if json {
                println!("{}", to_json(&result)?);
            } else {
                println!("{} matches in {}ms", result.total, result.latency_millis);
                print_movies(&result.movies, 0);
                if !result.genre_facets.is_empty() {
                    let facets: Vec<String> = result
                        .genre_facets
                        .iter()
                        .map(|(genre, count)| format!("{} ({})", genre, count))
                        .collect();
                    println!("\nGenres: {}", facets.join(", "));
                }
            }
        }
        Commands::Similar { id, limit, json } => {
            let movies = searcher.similar(&id, limit).await;
            if json {
                println!("{}", to_json(&movies)?);
            } else if movies.is_empty() {
                println!("No similar movies found for {}", id);
            } else {
                print_movies(&movies, 0);
            }
        }
        Commands::Genres => {
            for bucket in searcher.genres().await {
                println!("{:<24} {}", bucket.key, bucket.doc_count);
            }
        }
        Commands::Health => {
            let report = searcher.health().await;
            println!("{}", to_json(&report)?);
            if !report.is_ok() {
                return Err(CineError::search_unavailable());
            }
        }
        Commands::Config { .. } | Commands::Browse { .. } => {}
    }

    Ok(())
}

async fn cmd_browse(config: &Config, server: Option<String>) -> Result<()> {
    let base_url = server.unwrap_or_else(|| config.client.base_url.clone());
    let backend = HttpBackend::new(&base_url, config.engine.semantic_timeout())
        .map_err(|e| CineError::Session(e.to_string()))?;
    let session = spawn_session(Arc::new(backend), SessionConfig::from(&config.client));

    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_shown: Option<(Phase, usize, u64)> = None;
        let mut printed = 0;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            let key = (state.phase.clone(), state.movies.len(), state.total);
            if state.phase == Phase::Searching || last_shown.as_ref() == Some(&key) {
                continue;
            }
            // Appended pages only print the new rows
            let from = if state.page > 1 {
                printed.min(state.movies.len())
            } else {
                0
            };
            print_session_state(&state, from);
            if state.phase == Phase::Ready {
                printed = state.movies.len();
            }
            last_shown = Some(key);
        }
    });

    println!("Connected to {}", base_url);
    println!("{}", BROWSE_HELP);
    session.send(UserAction::Refresh)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = lines.next_line().await.map_err(|e| CineError::Io {
            source: e,
            context: "Failed to read input".to_string(),
        })?;
        let Some(line) = line else {
            break;
        };

        match parse_browse_line(&line) {
            Ok(BrowseInput::Quit) => break,
            Ok(BrowseInput::Help) => println!("{}", BROWSE_HELP),
            Ok(BrowseInput::Action(action)) => session.send(action)?,
            Err(message) => println!("{}", message),
        }
    }

    session.shutdown().await;
    let _ = printer.await;
    Ok(())
}

fn print_session_state(state: &ClientSearchState, from: usize) {
    match &state.phase {
        Phase::Error(message) => println!("! {}", message),
        Phase::Ready => {
            println!(
                "\n'{}': {} of {} shown ({}ms){}",
                state.query,
                state.movies.len(),
                state.total,
                state.latency_millis.unwrap_or(0),
                if state.has_more { ", :more for next page" } else { "" }
            );
            print_movies(&state.movies[from..], from);
        }
        Phase::Idle | Phase::Searching => {}
    }
}

fn print_movies(movies: &[Movie], offset: usize) {
    for (i, movie) in movies.iter().enumerate() {
        let year = movie
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or("----");
        println!(
            "{:>3}. {} ({})  {:.1}  [{}]  #{}",
            offset + i + 1,
            movie.title,
            year,
            movie.vote_average,
            movie.genres.join(", "),
            movie.id
        );
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CineError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, None)?;
            let value = serde_json::to_value(&config).map_err(|e| CineError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match section {
                Some(section) => value
                    .get(&section)
                    .cloned()
                    .ok_or_else(|| CineError::Config(format!("Unknown section: {}", section)))?,
                None => value,
            };

            println!("{}", to_json(&shown)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Engine: {} at {}", config.engine.kind.as_str(), config.engine.url);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CineError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'cinesearch config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        config.apply_env_overrides();
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
