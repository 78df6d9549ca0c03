//! episode_archiver - Archive episodic video into a media-center library
//!
//! This library resolves episode metadata from a remote archive, downloads the
//! video, subtitles and thumbnail of each episode, writes an NFO sidecar and
//! places everything in a `Season NN/<Title> SxEy/` layout that media-library
//! front ends understand.

mod asset_fetcher;
mod config;
mod identifier;
mod layout;
mod library_check;
mod metadata_retrieval;
mod nfo;
mod pipeline;
mod retry;

use std::path::PathBuf;

// Re-export error types
pub use asset_fetcher::AssetFetchError;
pub use config::QualityParseError;
pub use identifier::SelectionParseError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use pipeline::EpisodeError;

pub use asset_fetcher::{
    AssetFetcher, AssetKind, AssetRequest, DownloadOutcome, DownloadStatus, HttpAssetFetcher,
    NoProgress, ProgressReporter, stream_to_file,
};
pub use config::{
    ArchiveConfig, CastMember, DEFAULT_CDN, DEFAULT_ENDPOINT, LayoutVariant, Quality,
    SUPPORTED_QUALITIES,
};
pub use identifier::{EpisodeIdentifier, EpisodeSelection, normalize_episode, normalize_season};
pub use layout::{EpisodeLayout, sanitize_filename};
pub use library_check::{LibraryEntry, check_library};
pub use metadata_retrieval::{
    ArchiveApiResolver, EpisodeMetadata, MetadataResolver, SubtitleTrack,
};
pub use nfo::{NfoSynthesizer, aired_date, runtime_hours, strip_markup};
pub use pipeline::{
    EpisodeArchiver, EpisodeReport, EpisodeSummary, RangeReport, SubtitleRequest, VideoResult,
};
pub use retry::{RetryController, RetryOutcome, RetryPhase, RetryState, discard_partial};

/// Progress event emitted while archiving
///
/// These events allow library users to track progress and provide feedback
/// during an archive run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A range of episodes is about to be processed
    RangeStarted {
        season: u32,
        selection: EpisodeSelection,
        count: usize,
    },

    /// Processing of an episode started
    EpisodeStarted { identifier: EpisodeIdentifier },

    /// Fetching episode metadata
    ResolvingMetadata { identifier: EpisodeIdentifier },

    /// Metadata successfully fetched
    MetadataResolved {
        identifier: EpisodeIdentifier,
        title: Option<String>,
    },

    /// Episode folder exists
    FolderReady { path: PathBuf },

    /// A subtitle track was saved
    SubtitleSaved { language: String, path: PathBuf },

    /// A subtitle track could not be fetched and was skipped
    SubtitleSkipped { language: String, reason: String },

    /// The thumbnail was saved
    ThumbnailSaved { path: PathBuf },

    /// No thumbnail extension could be fetched
    ThumbnailSkipped,

    /// The NFO sidecar was written
    SidecarWritten { path: PathBuf },

    /// The video already exists and is not downloaded again
    VideoSkipped { path: PathBuf },

    /// Video download started
    VideoDownloadStarted {
        url: String,
        path: PathBuf,
        quality: Quality,
    },

    /// A video fetch failed
    VideoAttemptFailed {
        identifier: EpisodeIdentifier,
        /// Failed fetches so far
        attempt: u32,
        max_attempts: u32,
        outcome: DownloadOutcome,
        will_retry: bool,
    },

    /// The video was downloaded and verified
    VideoSaved { path: PathBuf, bytes: u64 },

    /// Episode processing finished; `error` is set for failed episodes
    EpisodeFinished {
        identifier: EpisodeIdentifier,
        error: Option<String>,
    },

    /// All episodes of a range were processed
    RangeComplete { total: usize, failures: usize },
}
