//! anime-hub CLI application.

use anime_hub::{Aggregator, ApiError, ListingCategory, SearchHistory, SuggestionSearch};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::{Config, MediaRecord, Source};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every catalog
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Live suggestions; each argument is one keystroke state, e.g. `nar naru narut`
    Suggest {
        #[arg(required = true)]
        prefixes: Vec<String>,
    },
    /// Show one title with ratings from every source
    Details {
        /// Source-specific id (AniList id, MAL id or IMDb id)
        id: String,

        /// Source the id belongs to (anilist, jikan/mal, omdb/imdb)
        #[arg(short, long, default_value = "anilist")]
        source: Source,
    },
    /// Currently airing titles sorted by trend
    Trending {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Highest rated finished titles
    TopRated {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Catalog to list from (anilist or jikan/mal)
        #[arg(short, long, default_value = "anilist")]
        source: Source,
    },
    /// Most recently started titles
    NewReleases {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Trending, top rated and new releases together
    Home,
    /// Show or clear recent searches
    History {
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config =
        shared::LogConfig::from_settings(&config.logging, &config.log_dir(), "anime-hub");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!(config_file = %args.config.display(), "anime-hub starting");

    let aggregator =
        Arc::new(Aggregator::from_config(&config).context("Failed to initialize API clients")?);

    let result = run(&args, &config, &aggregator).await;

    let status = aggregator.cache_status().await;
    info!(
        cache_size = status.size,
        cache_max = status.max_size,
        requests = ?status.per_source_counts,
        "Cache status"
    );

    result
}

async fn run(args: &Args, config: &Config, aggregator: &Arc<Aggregator>) -> Result<()> {
    match &args.command {
        Command::Search { query, page } => {
            let query = query.join(" ");
            let results = match aggregator.search(&query, *page).await {
                Ok(results) => results,
                Err(e @ ApiError::InvalidInput { .. }) => {
                    println!("{}", e);
                    return Ok(());
                }
                Err(e) => return Err(e).context("Search failed"),
            };

            let mut history = SearchHistory::load(
                config.history_path(),
                config.history.max_entries,
                config.search.min_query_length,
            );
            if history.add(&query) {
                if let Err(e) = history.save() {
                    warn!(error = %e, "Failed to save search history");
                }
            }

            if args.json {
                print_json(&results)?;
            } else {
                for source in &results.failed_sources {
                    println!("warning: {} is unavailable, results may be incomplete", source.label());
                }
                println!("{} result(s) for \"{}\"", results.total, query);
                print_records(&results.results);
            }
        }

        Command::Suggest { prefixes } => {
            let suggester = Arc::new(SuggestionSearch::new(
                Arc::clone(aggregator),
                aggregator.cache().clone(),
                config.cache.search_results_ttl(),
                config.search.max_suggestions,
            ));

            let mut tasks = Vec::new();
            for prefix in prefixes.iter().cloned() {
                let suggester = Arc::clone(&suggester);
                tasks.push(tokio::spawn(async move {
                    let outcome = suggester.suggest(&prefix).await;
                    (prefix, outcome)
                }));
                tokio::task::yield_now().await;
            }

            for task in tasks {
                let (prefix, outcome) = task.await.context("Suggestion task failed")?;
                match outcome {
                    Ok(Some(suggestions)) => {
                        if args.json {
                            print_json(&suggestions)?;
                        } else {
                            println!("Suggestions for \"{}\":", prefix);
                            print_records(&suggestions);
                        }
                    }
                    Ok(None) => info!(prefix = %prefix, "Suggestion superseded"),
                    Err(e) => println!("\"{}\": {}", prefix, e),
                }
            }
        }

        Command::Details { id, source } => {
            match aggregator.details(id, *source).await.context("Details failed")? {
                Some(record) if args.json => print_json(&record)?,
                Some(record) => print_details(&record),
                None => println!("No {} entry with id {}", source.label(), id),
            }
        }

        Command::Trending { page } => print_listing(args, &aggregator.trending(*page).await)?,
        Command::TopRated { page, source } => {
            let records = aggregator
                .listing_from(*source, ListingCategory::TopRated, *page)
                .await;
            print_listing(args, &records)?
        }
        Command::NewReleases { page } => print_listing(args, &aggregator.new_releases(*page).await)?,

        Command::Home => {
            let home = aggregator.home().await;
            if args.json {
                print_json(&home)?;
            } else {
                for (name, records) in [
                    ("Trending", &home.trending),
                    ("Top rated", &home.top_rated),
                    ("New releases", &home.new_releases),
                ] {
                    println!("== {} ==", name);
                    print_records(records);
                }
            }
        }

        Command::History { clear } => {
            let mut history = SearchHistory::load(
                config.history_path(),
                config.history.max_entries,
                config.search.min_query_length,
            );
            if *clear {
                history.clear();
                history.save()?;
            } else if args.json {
                print_json(&history.entries())?;
            } else {
                for entry in history.entries() {
                    println!("{}  {}", entry.searched_at.format("%Y-%m-%d %H:%M"), entry.query);
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_listing(args: &Args, records: &[MediaRecord]) -> Result<()> {
    if args.json {
        return print_json(records);
    }
    if records.is_empty() {
        println!("Nothing to show right now");
    }
    print_records(records);
    Ok(())
}

fn score_text(score: Option<f64>) -> String {
    score.map_or_else(|| "N/A".to_string(), |s| format!("{:.1}", s))
}

fn print_records(records: &[MediaRecord]) {
    for (idx, record) in records.iter().enumerate() {
        println!(
            "{:>3}. {} ({}) [{} #{}] {}",
            idx + 1,
            record.title.display,
            record.year.map_or_else(|| "?".to_string(), |y| y.to_string()),
            record.source,
            record.id,
            score_text(record.rating.score),
        );
    }
}

fn print_details(record: &MediaRecord) {
    println!("{}", record.title.display);
    if let Some(native) = &record.title.native {
        println!("  {}", native);
    }
    println!("  Source: {} #{}", record.source.label(), record.id);
    if let Some(episodes) = record.episodes {
        println!("  Episodes: {}", episodes);
    }
    if let Some(status) = &record.status {
        println!("  Status: {}", status);
    }
    if !record.genres.is_empty() {
        println!("  Genres: {}", record.genres.join(", "));
    }
    if let Some(date) = &record.start_date {
        println!("  Started: {}", date);
    }

    if let Some(ratings) = &record.enhanced_ratings {
        for rating in [&ratings.anilist, &ratings.mal, &ratings.imdb].into_iter().flatten() {
            println!("  {}: {:.1}/{}", rating.source, rating.score, rating.max);
        }
        if let Some(average) = ratings.average_rating {
            println!("  Average: {:.1} ({} sources)", average, ratings.rating_count);
        }
        if !ratings.episodes.is_empty() {
            println!("  Rated episodes: {}", ratings.episodes.len());
        }
    }

    if let Some(description) = &record.description {
        println!();
        println!("{}", description);
    }
}
