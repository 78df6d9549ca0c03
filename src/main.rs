use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use episode_archiver::{
    ArchiveApiResolver, ArchiveConfig, DEFAULT_CDN, DEFAULT_ENDPOINT, EpisodeArchiver,
    EpisodeSelection, HttpAssetFetcher, LayoutVariant, MetadataResolver, ProgressEvent,
    ProgressReporter, Quality, SubtitleRequest, check_library,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Exit status when the archive could not be reached at all
const EXIT_UNAVAILABLE: i32 = 1;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// Thumbnail as `thumb.<ext>` inside the episode folder
    Flat,
    /// Thumbnail inside a `metadata/` subfolder
    MetadataFolder,
}

impl From<LayoutArg> for LayoutVariant {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => LayoutVariant::Flat,
            LayoutArg::MetadataFolder => LayoutVariant::MetadataFolder,
        }
    }
}

/// Archive episodes, subtitles, thumbnails and NFO sidecars into a media
/// library.
///
/// Examples:
///   episode-archiver 1 3        # Season 1 episode 3
///   episode-archiver 0 6 720    # Season 0 episode 6 in 720p
///   episode-archiver 1 2-5      # Season 1 episodes 2, 3, 4 and 5
#[derive(Debug, Parser)]
#[command(name = "episode-archiver", version, verbatim_doc_comment)]
struct Cli {
    /// Season number (0 for specials)
    season: u32,

    /// Episode number or inclusive range (`2-5`, or `5-2` to go backwards)
    #[arg(required_unless_present = "list")]
    episodes: Option<EpisodeSelection>,

    /// Video quality: 2160, 1440, 1080, 720, 480, 360 or 240
    #[arg(default_value = "1080")]
    quality: Quality,

    /// Library root containing the `Season NN` folders
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Show title used for folder names and as NFO title fallback
    #[arg(long)]
    title: Option<String>,

    /// Metadata API base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// CDN base URL
    #[arg(long, default_value = DEFAULT_CDN)]
    cdn: String,

    /// Retries after a failed video download
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Episode folder layout
    #[arg(long, value_enum, default_value_t = LayoutArg::Flat)]
    layout: LayoutArg,

    /// Only download subtitles in this language (default: all available)
    #[arg(long, value_name = "LANG")]
    subtitle: Option<String>,

    /// List episode folders missing from the library instead of downloading
    #[arg(long, conflicts_with = "list")]
    missing: bool,

    /// With --missing, list the episode folders that exist instead
    #[arg(long, requires = "missing")]
    invert: bool,

    /// List the archive's episodes of the season with their subtitle languages
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn archive_config(&self) -> ArchiveConfig {
        let defaults = ArchiveConfig::default();

        ArchiveConfig {
            endpoint: self.endpoint.clone(),
            cdn: self.cdn.clone(),
            show_title: self.title.clone().unwrap_or(defaults.show_title),
            output_root: self.output.clone(),
            layout: self.layout.into(),
            quality: self.quality,
            max_attempts: self.retries,
            ..defaults
        }
    }
}

/// Prints download progress in 10% steps
#[derive(Default)]
struct ConsoleProgress {
    last_bytes: u64,
    last_percent: u64,
}

impl ProgressReporter for ConsoleProgress {
    fn report(&mut self, bytes_so_far: u64, total_bytes: u64) {
        // A retry started over
        if bytes_so_far < self.last_bytes {
            println!();
            self.last_bytes = 0;
            self.last_percent = 0;
        }
        if self.last_bytes == 0 {
            print!("  Progress: ");
        }
        self.last_bytes = bytes_so_far;

        if total_bytes == 0 {
            return;
        }

        let percent = bytes_so_far.saturating_mul(100) / total_bytes;
        if percent >= self.last_percent + 10 {
            print!("{}% ", percent);
            io::stdout().flush().ok();
            self.last_percent = percent;
        }

        if bytes_so_far >= total_bytes {
            println!(
                "({})",
                humansize::format_size(bytes_so_far, humansize::DECIMAL)
            );
            self.last_bytes = 0;
            self.last_percent = 0;
        }
    }
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::RangeStarted {
            season,
            selection,
            count,
        } => {
            if count > 1 {
                println!("Downloading S{}E{}... ({} episodes)", season, selection, count);
            }
        }
        ProgressEvent::EpisodeStarted { identifier } => {
            println!("\n=== Downloading {} ===", identifier);
        }
        ProgressEvent::ResolvingMetadata { .. } => {
            println!("Fetching metadata...");
        }
        ProgressEvent::MetadataResolved { title, .. } => {
            if let Some(title) = title {
                println!("Found '{}'", title);
            }
        }
        ProgressEvent::FolderReady { path } => {
            println!("Episode folder: {}", path.display());
        }
        ProgressEvent::SubtitleSaved { language, .. } => {
            println!("Saved `{}` subtitles", language);
        }
        ProgressEvent::SubtitleSkipped { language, reason } => {
            println!("Skipped `{}` subtitles ({})", language, reason);
        }
        ProgressEvent::ThumbnailSaved { path } => {
            println!("Saved thumbnail {}", path.display());
        }
        ProgressEvent::ThumbnailSkipped => {
            println!("No thumbnail available");
        }
        ProgressEvent::SidecarWritten { .. } => {
            println!("Generated NFO");
        }
        ProgressEvent::VideoSkipped { .. } => {
            println!("Skipping video because it already exists.");
        }
        ProgressEvent::VideoDownloadStarted { quality, .. } => {
            println!("Downloading video in {}... (Might take a long time)", quality);
        }
        ProgressEvent::VideoAttemptFailed {
            identifier,
            attempt,
            max_attempts,
            outcome,
            will_retry,
        } => {
            if will_retry {
                println!(
                    "Video download of {} failed: {}. Retrying... ({}/{})",
                    identifier, outcome, attempt, max_attempts
                );
            } else {
                println!(
                    "Failed to download video after {} {}: {}",
                    attempt,
                    if attempt == 1 { "attempt" } else { "attempts" },
                    outcome
                );
            }
        }
        ProgressEvent::VideoSaved { bytes, .. } => {
            println!(
                "Saved video ({})",
                humansize::format_size(bytes, humansize::DECIMAL)
            );
        }
        ProgressEvent::EpisodeFinished { identifier, error } => match error {
            None => println!("Done with {}!", identifier),
            Some(error) => eprintln!("Error archiving {}: {}", identifier, error),
        },
        ProgressEvent::RangeComplete { total, failures } => {
            if total > 1 {
                println!(
                    "\nArchived {} of {} episodes ({} failed)",
                    total - failures,
                    total,
                    failures
                );
            }
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn list_catalog(config: &ArchiveConfig, season: u32, selection: Option<EpisodeSelection>) -> i32 {
    let resolver = ArchiveApiResolver::new(config);

    let catalog = match resolver.fetch_all() {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error fetching the episode list: {}", e);
            return EXIT_UNAVAILABLE;
        }
    };

    let wanted = selection.map(|s| s.episodes());
    let mut episodes: Vec<_> = catalog
        .into_iter()
        .filter(|m| m.identifier.season == season)
        .filter(|m| {
            wanted
                .as_ref()
                .is_none_or(|episodes| episodes.contains(&m.identifier.episode))
        })
        .collect();
    episodes.sort_by_key(|m| m.identifier);

    for metadata in &episodes {
        let languages = metadata.subtitle_languages();
        println!(
            "{:<9} {} [{}]",
            metadata.identifier.to_string(),
            metadata.title.as_deref().unwrap_or("(untitled)"),
            if languages.is_empty() {
                "no subtitles".to_string()
            } else {
                languages.join(", ")
            }
        );
    }
    println!("\n{} episode(s) in season {}", episodes.len(), season);

    0
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let config = cli.archive_config();

    if cli.list {
        process::exit(list_catalog(&config, cli.season, cli.episodes));
    }

    let Some(selection) = cli.episodes else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "an episode number or range is required",
            )
            .exit();
    };

    if cli.missing {
        let entries = check_library(&config, cli.season, selection, cli.invert);

        if cli.invert {
            println!("Available episodes:");
        } else {
            println!("Missing episodes:");
        }
        println!();
        for entry in &entries {
            println!("    + {}", entry.episode_dir.display());
        }
        println!();
        return;
    }

    let fetcher = match HttpAssetFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_UNAVAILABLE);
        }
    };

    let subtitles = match &cli.subtitle {
        Some(language) => SubtitleRequest::One(language.clone()),
        None => SubtitleRequest::All,
    };

    let resolver = ArchiveApiResolver::new(&config);
    let mut archiver = EpisodeArchiver::new(config, resolver, fetcher)
        .with_subtitles(subtitles)
        .with_video_progress(Box::new(ConsoleProgress::default()));

    let report = archiver.archive_range(cli.season, selection, handle_progress_event);

    // The exit status is the number of failed episodes
    let failures = report.failures().min(255) as i32;
    process::exit(failures);
}
