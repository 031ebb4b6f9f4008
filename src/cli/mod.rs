//! CLI command definitions and parsing
use crate::client::UserAction;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cinesearch",
    version,
    author = "neur0map",
    about = "Hybrid keyword and semantic movie search",
    long_about = "Cinesearch searches a movie catalog stored in Elasticsearch or OpenSearch, \
                  blending keyword relevance with semantic similarity and falling back to \
                  keyword-only ranking whenever the semantic model is unavailable."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/cinesearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "opensearch")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP search API
    Serve,

    /// Search the catalog directly against the engine
    Search {
        /// Search query text (empty browses by popularity)
        #[arg(default_value = "")]
        query: String,

        /// Semantic share of the ranking, 0 (keyword only) to 1 (semantic only)
        #[arg(short, long, default_value = "0")]
        ratio: f64,

        /// Only movies in any of these genres
        #[arg(short, long = "genre")]
        genres: Vec<String>,

        /// Minimum vote average
        #[arg(long)]
        rating_min: Option<f64>,

        /// Maximum vote average
        #[arg(long)]
        rating_max: Option<f64>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,

        /// Results per page
        #[arg(long, default_value = "24")]
        page_size: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find movies similar to a stored movie
    Similar {
        /// Movie id
        id: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List genres with their movie counts
    Genres,

    /// Check engine and semantic model status
    Health,

    /// Interactive search session against a running server
    Browse {
        /// Server base URL (defaults to client.base_url)
        #[arg(long)]
        server: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

pub const BROWSE_HELP: &str = "\
Type to search. Commands:
  :more          load the next page
  :genre NAME    toggle a genre filter
  :clear         clear genre filters
  :rating N      minimum rating (0 for none)
  :ratio R       semantic ratio between 0 and 1
  :help          show this help
  :quit          leave";

/// One line of input in a `browse` session
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseInput {
    Action(UserAction),
    Help,
    Quit,
}

/// Parse a `browse` line. Lines not starting with ':' are search text.
pub fn parse_browse_line(line: &str) -> Result<BrowseInput, String> {
    let Some(command) = line.trim().strip_prefix(':') else {
        return Ok(BrowseInput::Action(UserAction::Input(line.to_string())));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let number = |what: &str| -> Result<f64, String> {
        arg.parse::<f64>()
            .map_err(|_| format!("{} expects a number, got '{}'", what, arg))
    };

    match name {
        "q" | "quit" => Ok(BrowseInput::Quit),
        "h" | "help" => Ok(BrowseInput::Help),
        "more" => Ok(BrowseInput::Action(UserAction::LoadMore)),
        "clear" => Ok(BrowseInput::Action(UserAction::ClearGenres)),
        "genre" if !arg.is_empty() => Ok(BrowseInput::Action(UserAction::ToggleGenre(
            arg.to_string(),
        ))),
        "genre" => Err(":genre expects a genre name".to_string()),
        "rating" => Ok(BrowseInput::Action(UserAction::SetRatingMin(number(
            ":rating",
        )?))),
        "ratio" => Ok(BrowseInput::Action(UserAction::SetSemanticRatio(number(
            ":ratio",
        )?))),
        other => Err(format!("Unknown command ':{}' (try :help)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::try_parse_from([
            "cinesearch",
            "search",
            "space opera",
            "--ratio",
            "0.5",
            "-g",
            "Drama",
            "--genre",
            "Science Fiction",
            "--page",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                ratio,
                genres,
                page,
                page_size,
                ..
            } => {
                assert_eq!(query, "space opera");
                assert_eq!(ratio, 0.5);
                assert_eq!(genres, vec!["Drama", "Science Fiction"]);
                assert_eq!(page, 2);
                assert_eq!(page_size, 24);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_browse_lines() {
        assert_eq!(
            parse_browse_line("blade runner"),
            Ok(BrowseInput::Action(UserAction::Input(
                "blade runner".to_string()
            )))
        );
        assert_eq!(
            parse_browse_line(":genre Science Fiction"),
            Ok(BrowseInput::Action(UserAction::ToggleGenre(
                "Science Fiction".to_string()
            )))
        );
        assert_eq!(
            parse_browse_line(":rating 7.5"),
            Ok(BrowseInput::Action(UserAction::SetRatingMin(7.5)))
        );
        assert_eq!(parse_browse_line(":q"), Ok(BrowseInput::Quit));
        assert!(parse_browse_line(":ratio lots").is_err());
        assert!(parse_browse_line(":genre").is_err());
        assert!(parse_browse_line(":rewind").is_err());
    }

    #[test]
    fn test_global_profile() {
        let cli = Cli::try_parse_from(["cinesearch", "health", "--profile", "opensearch"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("opensearch"));
        assert!(matches!(cli.command, Commands::Health));
    }
}
