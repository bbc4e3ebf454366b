use clap::{Parser, Subcommand, ValueEnum};
use season_scout::{
    CatalogQuery, Config, DEFAULT_FORMAT, DEFAULT_PATTERN, EpisodePattern, MediaKind, MediaResource,
    ProgressEvent, RenameAction, SeasonScoutError, SeriesTable, clear_cache, execute_renames, format_rating,
    list_files, open_catalog, plan_renames, rename_log_path, write_rename_log,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "season-scout")]
#[command(about = "Look up movies and series and assemble their seasons", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key (overrides config file and OMDB_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Read the catalog's website instead of its API
    #[arg(long, global = true)]
    scrape: bool,

    /// Don't read or write the response cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the details of a title
    Show {
        /// Catalog ID (e.g. tt0325980) or title
        query: String,

        /// Resolve titles through a search and show the best match
        #[arg(long)]
        search: bool,
    },

    /// Search the catalog
    Search {
        term: String,

        /// Only return titles of this kind
        #[arg(long)]
        kind: Option<KindArg>,
    },

    /// Print the seasons and episodes of a series
    Episodes {
        /// Catalog ID or title of a series
        query: String,

        /// Fetch the full details of every episode
        #[arg(long)]
        full: bool,
    },

    /// Print the episodes of a series as a table
    Table {
        /// Catalog ID or title of a series
        query: String,

        /// Print JSON instead of tab-separated values
        #[arg(long)]
        json: bool,

        /// Order rows by air date instead of series position
        #[arg(long)]
        by_date: bool,
    },

    /// Rename episode files in a directory after a series
    Rename {
        /// Directory containing the episode files
        directory: PathBuf,

        /// Catalog ID or title of a series
        query: String,

        /// Pattern with `season` and `episode` capture groups
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        /// Format of new file names
        #[arg(long, default_value = DEFAULT_FORMAT)]
        format: String,

        /// Rename without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete all cached responses
    ClearCache,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Series,
    Movie,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Series => MediaKind::Series,
            KindArg::Movie => MediaKind::Movie,
        }
    }
}

/// Handles progress events and prints formatted output to stderr
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::FetchingMedia { query } => {
            eprintln!("Looking up '{}'...", query);
        }
        ProgressEvent::MediaResolved { imdb_id, title, kind } => {
            eprintln!("Found {} '{}' ({})", kind, title, imdb_id);
        }
        ProgressEvent::FetchingSeason { season_index, .. } => {
            eprintln!("  Fetching season {}...", season_index);
        }
        ProgressEvent::SeasonAssembled {
            season_index,
            episode_count,
        } => {
            eprintln!("  Season {}: {} episode(s)", season_index, episode_count);
        }
        ProgressEvent::FetchingEpisode {
            episode_id,
            index,
            total,
        } => {
            eprintln!("  [{}/{}] Fetching {}...", index, total, episode_id);
        }
        ProgressEvent::AssemblyComplete {
            season_count,
            episode_count,
        } => {
            eprintln!(
                "Assembled {} episode(s) in {} season(s)\n",
                episode_count, season_count
            );
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "season_scout=info",
        1 => "season_scout=debug",
        _ => "season_scout=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, SeasonScoutError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(api_key) = &cli.api_key {
        config.api.api_key = Some(api_key.clone());
    }
    if cli.scrape {
        config.api.source = season_scout::Source::Scrape;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    Ok(config)
}

fn print_media(resource: &MediaResource) {
    let details = resource.details();
    println!("{} ({})", details.title, details.imdb_id);
    println!("  Type: {}", resource.kind());

    match resource {
        MediaResource::Series(series) => {
            println!("  Years: {}", series.years);
            println!("  Seasons: {}", series.total_seasons);
        }
        MediaResource::Film(film) => {
            if let Some(year) = film.year {
                println!("  Year: {}", year);
            }
            if let Some(box_office) = film.box_office {
                println!("  Box office: ${}", box_office);
            }
            if let Some(production) = &film.production {
                println!("  Production: {}", production);
            }
        }
        MediaResource::Episode(episode) => {
            println!("  Episode: {} of {}", episode.key(), episode.series_id);
        }
    }

    if let Some(date) = details.release_date {
        println!("  Released: {}", date);
    }
    if let Some(runtime) = details.runtime {
        println!("  Runtime: {}", runtime);
    }
    if !details.genres.is_empty() {
        println!("  Genres: {}", details.genres.join(", "));
    }
    if !details.directors.is_empty() {
        println!("  Directors: {}", details.directors.join(", "));
    }
    if !details.actors.is_empty() {
        println!("  Actors: {}", details.actors.join(", "));
    }
    println!(
        "  Rating: {} ({} votes)",
        format_rating(details.imdb_rating),
        details.imdb_votes
    );
    for rating in &details.ratings {
        println!("    {}: {}", rating.source, rating.value);
    }
    if let Some(plot) = &details.plot {
        println!("\n{}", plot);
    }
}

fn confirm(prompt: &str) -> Result<bool, SeasonScoutError> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| SeasonScoutError::Io(io::Error::other(e)))
}

fn rename(
    config: &Config,
    directory: &Path,
    query: &str,
    pattern: &str,
    format: &str,
    yes: bool,
) -> Result<(), SeasonScoutError> {
    let pattern = EpisodePattern::new(pattern)?;
    let files = list_files(directory)?;
    if files.is_empty() {
        println!("No files found in {}", directory.display());
        return Ok(());
    }

    let catalog = open_catalog(config)?;
    let Some(series) = catalog.series_with_episodes(&CatalogQuery::parse(query), handle_progress_event)? else {
        println!("No series found for '{}'", query);
        return Ok(());
    };

    let plans = plan_renames(&files, &series, &pattern, format);

    println!("=== Planned Renames ===\n");
    for plan in &plans {
        let file_name = plan.source.file_name().unwrap_or_default().to_string_lossy();
        match &plan.action {
            RenameAction::Rename { destination, .. } => {
                let new_name = destination.file_name().unwrap_or_default().to_string_lossy();
                println!("  {} -> {}", file_name, new_name);
            }
            RenameAction::AlreadyNamed => println!("  {} (already named)", file_name),
            RenameAction::UnknownEpisode(key) => {
                println!("  {} (skipped: {} is not an episode of this series)", file_name, key)
            }
            RenameAction::NoEpisodeKey => println!("  {} (skipped: no episode number)", file_name),
        }
    }

    let pending = plans.iter().filter(|plan| plan.destination().is_some()).count();
    if pending == 0 {
        println!("\nNothing to rename.");
        return Ok(());
    }

    if !yes && !confirm(&format!("Rename {} file(s)?", pending))? {
        println!("Aborted.");
        return Ok(());
    }

    let report = execute_renames(&plans);
    for failure in &report.failures {
        eprintln!(
            "Failed to rename {} -> {}: {}",
            failure.source.display(),
            failure.destination.display(),
            failure.error
        );
    }

    if !report.renamed.is_empty() {
        let log_path = rename_log_path(directory);
        write_rename_log(&log_path, &report.renamed)?;
        println!("Renamed {} file(s); log written to {}", report.renamed.len(), log_path.display());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), SeasonScoutError> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Show { query, search } => {
            let catalog = open_catalog(&config)?;
            let resource = if search {
                catalog.find(&query, None)?
            } else {
                catalog.get(&CatalogQuery::parse(&query))?
            };
            match resource {
                Some(resource) => print_media(&resource),
                None => println!("No title found for '{}'", query),
            }
        }
        Command::Search { term, kind } => {
            let catalog = open_catalog(&config)?;
            match catalog.search(&term, kind.map(MediaKind::from))? {
                Some(results) => {
                    println!("{} result(s) in total\n", results.total_results);
                    for candidate in &results.candidates {
                        let kind = candidate.kind.map(|k| k.to_string()).unwrap_or_default();
                        println!(
                            "  {}  {} ({}) {}",
                            candidate.imdb_id,
                            candidate.title,
                            candidate.year.as_deref().unwrap_or("?"),
                            kind
                        );
                    }
                }
                None => println!("No results for '{}'", term),
            }
        }
        Command::Episodes { query, full: true } => {
            let catalog = open_catalog(&config)?;
            let Some(resource) = catalog.get(&CatalogQuery::parse(&query))? else {
                println!("No series found for '{}'", query);
                return Ok(());
            };
            let Some(series) = resource.as_series() else {
                println!("'{}' is a {}, not a series", resource.title(), resource.kind());
                return Ok(());
            };

            println!("{}\n", series.details.title);
            for episode in catalog.full_episodes(&series.details.imdb_id, handle_progress_event)? {
                println!(
                    "{}  {}  [{}]",
                    episode.key(),
                    episode.details.title,
                    format_rating(episode.details.imdb_rating)
                );
                if let Some(plot) = &episode.details.plot {
                    println!("    {}", plot);
                }
            }
        }
        Command::Episodes { query, full: false } => {
            let catalog = open_catalog(&config)?;
            match catalog.series_with_episodes(&CatalogQuery::parse(&query), handle_progress_event)? {
                Some(series) => print!("{}", series.summary()),
                None => println!("No series found for '{}'", query),
            }
        }
        Command::Table { query, json, by_date } => {
            let catalog = open_catalog(&config)?;
            let Some(series) = catalog.series_with_episodes(&CatalogQuery::parse(&query), handle_progress_event)?
            else {
                println!("No series found for '{}'", query);
                return Ok(());
            };

            let mut table = SeriesTable::from_series(&series);
            if by_date {
                table.sort_by_release_date();
            }

            if json {
                let output = serde_json::to_string_pretty(&table).map_err(io::Error::other)?;
                println!("{}", output);
            } else {
                print!("{}", table.to_tsv());
            }
        }
        Command::Rename {
            directory,
            query,
            pattern,
            format,
            yes,
        } => rename(&config, &directory, &query, &pattern, &format, yes)?,
        Command::ClearCache => {
            let removed = clear_cache(&config.cache)?;
            println!("Removed {} cached response(s)", removed);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
