//! Episode acquisition pipeline
//!
//! Sequences one episode: metadata, folders, subtitles, thumbnail, sidecar,
//! video. Ranges are processed strictly one episode after another. Every
//! failure ends up in the episode's [`EpisodeReport`]; nothing is thrown past
//! this module.

use crate::ProgressEvent;
use crate::asset_fetcher::{
    AssetFetchError, AssetFetcher, AssetRequest, DownloadOutcome, NoProgress, ProgressReporter,
};
use crate::config::ArchiveConfig;
use crate::identifier::{EpisodeIdentifier, EpisodeSelection};
use crate::layout::EpisodeLayout;
use crate::metadata_retrieval::{EpisodeMetadata, MetadataResolver, MetadataRetrievalError};
use crate::nfo::NfoSynthesizer;
use crate::retry::{RetryController, RetryOutcome, RetryPhase, discard_partial};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that fail an episode
#[derive(Debug, Error)]
pub enum EpisodeError {
    /// Error during metadata retrieval
    #[error("Metadata retrieval error: {0}")]
    Metadata(#[from] MetadataRetrievalError),

    /// The episode folder could not be created
    #[error("Failed to create folder {path}: {source}")]
    CreateFolder { path: PathBuf, source: io::Error },

    /// The NFO sidecar could not be written
    #[error("Failed to write sidecar {path}: {source}")]
    WriteSidecar { path: PathBuf, source: io::Error },

    /// Local error while downloading the video
    #[error("Asset download error: {0}")]
    Fetch(#[from] AssetFetchError),

    /// Every video fetch failed
    #[error("Video download failed after {fetches} fetches, last result: {last}")]
    VideoExhausted { fetches: u32, last: DownloadOutcome },
}

/// Which subtitle languages to download
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubtitleRequest {
    /// A single language, whether or not the metadata lists it
    One(String),
    /// Every track listed in the episode metadata
    #[default]
    All,
}

impl SubtitleRequest {
    /// Language codes to fetch for an episode
    pub fn languages<'a>(&'a self, metadata: &'a EpisodeMetadata) -> Vec<&'a str> {
        match self {
            SubtitleRequest::One(language) => vec![language.as_str()],
            SubtitleRequest::All => metadata.subtitle_languages(),
        }
    }
}

/// How the video ended up on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResult {
    /// The file existed before the run and was left untouched
    AlreadyPresent,
    /// Downloaded and verified after `fetches` fetches
    Downloaded { fetches: u32, bytes: u64 },
}

/// What was archived for a successful episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode_dir: PathBuf,
    pub subtitles_saved: Vec<String>,
    pub subtitles_skipped: Vec<String>,
    pub thumbnail: Option<PathBuf>,
    pub sidecar: PathBuf,
    pub video: VideoResult,
}

/// Result of processing one episode
#[derive(Debug)]
pub struct EpisodeReport {
    pub identifier: EpisodeIdentifier,
    pub result: Result<EpisodeSummary, EpisodeError>,
}

impl EpisodeReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of processing a range, in processing order
#[derive(Debug, Default)]
pub struct RangeReport {
    pub reports: Vec<EpisodeReport>,
}

impl RangeReport {
    /// Number of failed episodes
    pub fn failures(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_success()).count()
    }
}

/// Archives episodes from a metadata resolver and an asset fetcher
pub struct EpisodeArchiver<R, F>
where
    R: MetadataResolver,
    F: AssetFetcher,
{
    config: ArchiveConfig,
    resolver: R,
    fetcher: F,
    synthesizer: NfoSynthesizer,
    retry: RetryController,
    subtitles: SubtitleRequest,
    video_progress: Box<dyn ProgressReporter>,
}

impl<R, F> EpisodeArchiver<R, F>
where
    R: MetadataResolver,
    F: AssetFetcher,
{
    /// Creates an archiver fetching all subtitle languages without progress
    /// reporting
    pub fn new(config: ArchiveConfig, resolver: R, fetcher: F) -> Self {
        let synthesizer = NfoSynthesizer::from_config(&config);
        let retry = RetryController::new(config.max_attempts);

        Self {
            config,
            resolver,
            fetcher,
            synthesizer,
            retry,
            subtitles: SubtitleRequest::default(),
            video_progress: Box::new(NoProgress),
        }
    }

    pub fn with_subtitles(mut self, subtitles: SubtitleRequest) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Reports the video download's progress to `reporter`
    pub fn with_video_progress(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.video_progress = reporter;
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Archives every episode of `selection` in order
    ///
    /// An episode is fully processed before the next one starts. Failures are
    /// collected in the returned report and never stop the range.
    pub fn archive_range<C>(
        &mut self,
        season: u32,
        selection: EpisodeSelection,
        mut progress_callback: C,
    ) -> RangeReport
    where
        C: FnMut(ProgressEvent),
    {
        let identifiers = selection.identifiers(season);

        progress_callback(ProgressEvent::RangeStarted {
            season,
            selection,
            count: identifiers.len(),
        });

        let mut report = RangeReport::default();
        for identifier in identifiers {
            report
                .reports
                .push(self.archive_episode(identifier, &mut progress_callback));
        }

        progress_callback(ProgressEvent::RangeComplete {
            total: report.reports.len(),
            failures: report.failures(),
        });

        report
    }

    /// Archives a single episode
    pub fn archive_episode<C>(
        &mut self,
        identifier: EpisodeIdentifier,
        mut progress_callback: C,
    ) -> EpisodeReport
    where
        C: FnMut(ProgressEvent),
    {
        progress_callback(ProgressEvent::EpisodeStarted { identifier });

        let result = self.run_episode(identifier, &mut progress_callback);

        progress_callback(ProgressEvent::EpisodeFinished {
            identifier,
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        EpisodeReport { identifier, result }
    }

    fn run_episode(
        &mut self,
        identifier: EpisodeIdentifier,
        progress_callback: &mut dyn FnMut(ProgressEvent),
    ) -> Result<EpisodeSummary, EpisodeError> {
        // Metadata first; nothing touches the disk for unknown episodes
        progress_callback(ProgressEvent::ResolvingMetadata { identifier });
        let metadata = self.resolver.fetch_episode(identifier)?;
        progress_callback(ProgressEvent::MetadataResolved {
            identifier,
            title: metadata.title.clone(),
        });

        let layout = EpisodeLayout::from_config(&self.config, identifier);
        create_folder(layout.episode_dir())?;
        if let Some(metadata_dir) = layout.metadata_dir() {
            create_folder(&metadata_dir)?;
        }
        progress_callback(ProgressEvent::FolderReady {
            path: layout.episode_dir().to_path_buf(),
        });

        let (subtitles_saved, subtitles_skipped) =
            self.fetch_subtitles(&metadata, &layout, progress_callback);

        let thumbnail = self.fetch_thumbnail(identifier, &layout);
        match &thumbnail {
            Some(path) => progress_callback(ProgressEvent::ThumbnailSaved { path: path.clone() }),
            None => progress_callback(ProgressEvent::ThumbnailSkipped),
        }

        let sidecar = layout.nfo_path();
        let document = self.synthesizer.render(&metadata, thumbnail.as_deref());
        fs::write(&sidecar, document).map_err(|source| EpisodeError::WriteSidecar {
            path: sidecar.clone(),
            source,
        })?;
        progress_callback(ProgressEvent::SidecarWritten {
            path: sidecar.clone(),
        });

        let video = self.fetch_video(identifier, &layout, progress_callback)?;

        Ok(EpisodeSummary {
            episode_dir: layout.episode_dir().to_path_buf(),
            subtitles_saved,
            subtitles_skipped,
            thumbnail,
            sidecar,
            video,
        })
    }

    /// Fetches every requested subtitle; failures are skipped
    fn fetch_subtitles(
        &self,
        metadata: &EpisodeMetadata,
        layout: &EpisodeLayout,
        progress_callback: &mut dyn FnMut(ProgressEvent),
    ) -> (Vec<String>, Vec<String>) {
        let mut saved = Vec::new();
        let mut skipped = Vec::new();

        for language in self.subtitles.languages(metadata) {
            let request = AssetRequest::Subtitle {
                language: language.to_string(),
            };
            let url = request.url(&self.config.cdn, metadata.identifier);
            let path = layout.subtitle_path(language);

            match self.fetch_optional(&url, &path) {
                Ok(outcome) if outcome.is_complete() => {
                    saved.push(language.to_string());
                    progress_callback(ProgressEvent::SubtitleSaved {
                        language: language.to_string(),
                        path,
                    });
                }
                Ok(outcome) => {
                    warn!(%url, %outcome, "Skipping subtitle");
                    skipped.push(language.to_string());
                    progress_callback(ProgressEvent::SubtitleSkipped {
                        language: language.to_string(),
                        reason: outcome.to_string(),
                    });
                }
                Err(e) => {
                    warn!(%url, error = %e, "Skipping subtitle");
                    skipped.push(language.to_string());
                    progress_callback(ProgressEvent::SubtitleSkipped {
                        language: language.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (saved, skipped)
    }

    /// Tries each configured image extension until one downloads completely
    fn fetch_thumbnail(
        &self,
        identifier: EpisodeIdentifier,
        layout: &EpisodeLayout,
    ) -> Option<PathBuf> {
        for extension in &self.config.thumbnail_extensions {
            let request = AssetRequest::Thumbnail {
                extension: extension.clone(),
            };
            let url = request.url(&self.config.cdn, identifier);
            let path = layout.thumbnail_path(extension);

            match self.fetch_optional(&url, &path) {
                Ok(outcome) if outcome.is_complete() => return Some(path),
                Ok(outcome) => debug!(%url, %outcome, "Thumbnail not available"),
                Err(e) => warn!(%url, error = %e, "Failed to save thumbnail"),
            }
        }

        warn!(%identifier, "No thumbnail could be downloaded");
        None
    }

    /// Downloads an optional asset next to `path` and moves it into place
    /// once complete
    ///
    /// A file already at `path` is only replaced by a complete download;
    /// whatever a failed fetch wrote is removed.
    fn fetch_optional(&self, url: &str, path: &Path) -> Result<DownloadOutcome, AssetFetchError> {
        let staging = staging_path(path);

        let outcome = match self.fetcher.fetch(url, &staging, &mut NoProgress) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup) = discard_partial(&staging) {
                    warn!(error = %cleanup, "Failed to remove partial download");
                }
                return Err(e);
            }
        };

        if outcome.is_complete() {
            fs::rename(&staging, path).map_err(|source| AssetFetchError::LocalIo {
                path: path.to_path_buf(),
                source,
            })?;
        } else {
            discard_partial(&staging)?;
        }
        Ok(outcome)
    }

    fn fetch_video(
        &mut self,
        identifier: EpisodeIdentifier,
        layout: &EpisodeLayout,
        progress_callback: &mut dyn FnMut(ProgressEvent),
    ) -> Result<VideoResult, EpisodeError> {
        let path = layout.video_path();

        if path.exists() {
            progress_callback(ProgressEvent::VideoSkipped { path });
            return Ok(VideoResult::AlreadyPresent);
        }

        let quality = self.config.quality;
        let url = AssetRequest::Video { quality }.url(&self.config.cdn, identifier);
        progress_callback(ProgressEvent::VideoDownloadStarted {
            url: url.clone(),
            path: path.clone(),
            quality,
        });

        let outcome = self.retry.run(
            &self.fetcher,
            &url,
            &path,
            self.video_progress.as_mut(),
            |state, outcome, phase| {
                progress_callback(ProgressEvent::VideoAttemptFailed {
                    identifier,
                    attempt: state.attempts_made,
                    max_attempts: state.max_attempts,
                    outcome: *outcome,
                    will_retry: phase == RetryPhase::Attempting,
                });
            },
        )?;

        match outcome {
            RetryOutcome::Succeeded { outcome, fetches } => {
                progress_callback(ProgressEvent::VideoSaved {
                    path,
                    bytes: outcome.bytes_written,
                });
                Ok(VideoResult::Downloaded {
                    fetches,
                    bytes: outcome.bytes_written,
                })
            }
            RetryOutcome::ExhaustedFailure { last, fetches } => {
                Err(EpisodeError::VideoExhausted { fetches, last })
            }
        }
    }
}

/// Sibling path an optional asset is downloaded to before it is complete
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn create_folder(path: &Path) -> Result<(), EpisodeError> {
    fs::create_dir_all(path).map_err(|source| EpisodeError::CreateFolder {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_fetcher::DownloadStatus;
    use crate::config::LayoutVariant;
    use crate::metadata_retrieval::SubtitleTrack;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const CDN: &str = "https://cdn.test";

    struct FakeResolver {
        episodes: HashMap<EpisodeIdentifier, EpisodeMetadata>,
        requested: RefCell<Vec<EpisodeIdentifier>>,
    }

    impl FakeResolver {
        fn with(episodes: Vec<EpisodeMetadata>) -> Self {
            Self {
                episodes: episodes.into_iter().map(|m| (m.identifier, m)).collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl MetadataResolver for FakeResolver {
        fn fetch_episode(
            &self,
            identifier: EpisodeIdentifier,
        ) -> Result<EpisodeMetadata, MetadataRetrievalError> {
            self.requested.borrow_mut().push(identifier);
            self.episodes
                .get(&identifier)
                .cloned()
                .ok_or(MetadataRetrievalError::NotFound(identifier))
        }

        fn fetch_all(&self) -> Result<Vec<EpisodeMetadata>, MetadataRetrievalError> {
            Ok(self.episodes.values().cloned().collect())
        }
    }

    #[derive(Clone)]
    enum FakeResponse {
        /// Body bytes and declared length
        Body(Vec<u8>, u64),
        Status(u16),
        /// Writes some bytes, then fails locally
        LocalFailure,
    }

    /// Serves canned responses by URL; unknown URLs answer 404
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, FakeResponse>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn respond(mut self, url: &str, response: FakeResponse) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl AssetFetcher for FakeFetcher {
        fn fetch(
            &self,
            url: &str,
            target: &Path,
            progress: &mut dyn ProgressReporter,
        ) -> Result<DownloadOutcome, AssetFetchError> {
            self.calls.borrow_mut().push(url.to_string());

            match self.responses.get(url).cloned().unwrap_or(FakeResponse::Status(404)) {
                FakeResponse::Status(code) => Ok(DownloadOutcome::transport_error(Some(code), 0, 0)),
                FakeResponse::Body(body, declared) => {
                    crate::asset_fetcher::stream_to_file(&body[..], declared, target, progress)
                }
                FakeResponse::LocalFailure => {
                    fs::write(target, b"trunc").unwrap();
                    Err(AssetFetchError::LocalIo {
                        path: target.to_path_buf(),
                        source: std::io::Error::other("disk full"),
                    })
                }
            }
        }
    }

    fn config(root: &Path) -> ArchiveConfig {
        ArchiveConfig {
            cdn: CDN.to_string(),
            output_root: root.to_path_buf(),
            ..ArchiveConfig::default()
        }
    }

    fn metadata(episode: u32, languages: &[&str]) -> EpisodeMetadata {
        EpisodeMetadata {
            title: Some(format!("Episode {}", episode)),
            description: "Line one<br>Line two".to_string(),
            duration_seconds: Some(1200.0),
            subtitle_tracks: languages
                .iter()
                .map(|l| SubtitleTrack {
                    language_code: l.to_string(),
                })
                .collect(),
            ..EpisodeMetadata::empty(EpisodeIdentifier::new(1, episode))
        }
    }

    fn ok(body: &[u8]) -> FakeResponse {
        FakeResponse::Body(body.to_vec(), body.len() as u64)
    }

    fn leftover_partials(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect()
    }

    #[test]
    fn test_full_episode() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FakeResolver::with(vec![metadata(4, &["en", "de"])]);
        let fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/subs/01/004.en.vtt"), ok(b"WEBVTT"))
            .respond(&format!("{CDN}/thumbnails/01/004.webp"), ok(b"image"))
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"video-bytes"));

        let mut archiver = EpisodeArchiver::new(config(dir.path()), resolver, fetcher);
        let mut events = Vec::new();
        let report = archiver.archive_episode(EpisodeIdentifier::new(1, 4), |e| events.push(e));

        let summary = report.result.expect("episode should succeed");
        let episode_dir = dir.path().join("Season 01").join("Unus Annus S1E4");

        assert_eq!(summary.episode_dir, episode_dir);
        assert_eq!(summary.subtitles_saved, vec!["en"]);
        assert_eq!(summary.subtitles_skipped, vec!["de"]);
        assert_eq!(summary.thumbnail, Some(episode_dir.join("thumb.webp")));
        assert_eq!(
            summary.video,
            VideoResult::Downloaded {
                fetches: 1,
                bytes: 11
            }
        );

        assert!(episode_dir.join("Unus Annus S1E4.en.vtt").is_file());
        assert!(!episode_dir.join("Unus Annus S1E4.de.vtt").exists());
        assert!(!episode_dir.join("thumb.jpg").exists());
        assert_eq!(
            fs::read(episode_dir.join("Unus Annus S1E4.mp4")).unwrap(),
            b"video-bytes"
        );

        let nfo = fs::read_to_string(episode_dir.join("Unus Annus S1E4.nfo")).unwrap();
        assert!(nfo.contains("<title>Episode 4</title>"));
        assert!(nfo.contains("<plot>Line one\nLine two</plot>"));
        assert!(nfo.contains("thumb.webp</poster>"));

        // Subtitles and thumbnail precede the video
        let calls = archiver.fetcher.calls();
        assert_eq!(
            calls,
            vec![
                format!("{CDN}/subs/01/004.en.vtt"),
                format!("{CDN}/subs/01/004.de.vtt"),
                format!("{CDN}/thumbnails/01/004.jpg"),
                format!("{CDN}/thumbnails/01/004.webp"),
                format!("{CDN}/01/004/1080.mp4"),
            ]
        );

        assert!(matches!(
            events.last(),
            Some(ProgressEvent::EpisodeFinished { error: None, .. })
        ));
    }

    #[test]
    fn test_failed_subtitle_does_not_block_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .respond(
                &format!("{CDN}/subs/01/004.de.vtt"),
                FakeResponse::Body(b"WEB".to_vec(), 10),
            )
            .respond(&format!("{CDN}/subs/01/004.fr.vtt"), ok(b"WEBVTT fr"))
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"video"));
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &["en", "de", "fr"])]),
            fetcher,
        );

        let summary = archiver
            .archive_episode(EpisodeIdentifier::new(1, 4), |_| {})
            .result
            .unwrap();

        let episode_dir = dir.path().join("Season 01").join("Unus Annus S1E4");
        assert_eq!(summary.subtitles_skipped, vec!["en", "de"]);
        assert_eq!(summary.subtitles_saved, vec!["fr"]);
        assert!(!episode_dir.join("Unus Annus S1E4.en.vtt").exists());
        assert!(!episode_dir.join("Unus Annus S1E4.de.vtt").exists());
        assert_eq!(
            fs::read(episode_dir.join("Unus Annus S1E4.fr.vtt")).unwrap(),
            b"WEBVTT fr"
        );
        assert!(leftover_partials(&episode_dir).is_empty());
    }

    #[test]
    fn test_rerun_keeps_archived_assets_on_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let layout = EpisodeLayout::new(
            dir.path(),
            "Unus Annus",
            EpisodeIdentifier::new(1, 4),
            LayoutVariant::Flat,
        );
        fs::create_dir_all(layout.episode_dir()).unwrap();
        fs::write(layout.subtitle_path("en"), b"archived subtitle").unwrap();
        fs::write(layout.thumbnail_path("jpg"), b"archived image").unwrap();

        let mut fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/subs/01/004.en.vtt"), FakeResponse::Status(503))
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"video"));
        for extension in ["jpg", "webp", "png"] {
            fetcher = fetcher.respond(
                &format!("{CDN}/thumbnails/01/004.{extension}"),
                FakeResponse::Status(503),
            );
        }
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &["en"])]),
            fetcher,
        );

        let summary = archiver
            .archive_episode(EpisodeIdentifier::new(1, 4), |_| {})
            .result
            .unwrap();

        assert_eq!(summary.subtitles_skipped, vec!["en"]);
        assert_eq!(summary.thumbnail, None);
        assert_eq!(
            fs::read(layout.subtitle_path("en")).unwrap(),
            b"archived subtitle"
        );
        assert_eq!(
            fs::read(layout.thumbnail_path("jpg")).unwrap(),
            b"archived image"
        );
    }

    #[test]
    fn test_local_failure_leaves_no_partial_asset() {
        let dir = tempfile::tempdir().unwrap();
        let layout = EpisodeLayout::new(
            dir.path(),
            "Unus Annus",
            EpisodeIdentifier::new(1, 4),
            LayoutVariant::Flat,
        );
        fs::create_dir_all(layout.episode_dir()).unwrap();
        fs::write(layout.subtitle_path("en"), b"archived subtitle").unwrap();

        let fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/subs/01/004.en.vtt"), FakeResponse::LocalFailure)
            .respond(&format!("{CDN}/subs/01/004.de.vtt"), FakeResponse::LocalFailure)
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"video"));
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &["en", "de"])]),
            fetcher,
        );

        let summary = archiver
            .archive_episode(EpisodeIdentifier::new(1, 4), |_| {})
            .result
            .unwrap();

        assert_eq!(summary.subtitles_skipped, vec!["en", "de"]);
        assert_eq!(
            fs::read(layout.subtitle_path("en")).unwrap(),
            b"archived subtitle"
        );
        assert!(!layout.subtitle_path("de").exists());
        assert!(leftover_partials(layout.episode_dir()).is_empty());
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("/lib/Season 01/S1E4/thumb.jpg")),
            PathBuf::from("/lib/Season 01/S1E4/thumb.jpg.part")
        );
    }

    #[test]
    fn test_unknown_episode_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver =
            EpisodeArchiver::new(config(dir.path()), FakeResolver::with(vec![]), FakeFetcher::default());

        let report = archiver.archive_episode(EpisodeIdentifier::new(1, 99), |_| {});

        assert!(matches!(
            report.result,
            Err(EpisodeError::Metadata(MetadataRetrievalError::NotFound(_)))
        ));
        assert!(!dir.path().join("Season 01").exists());
        assert!(archiver.fetcher.calls().is_empty());
    }

    #[test]
    fn test_existing_video_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let layout = EpisodeLayout::new(
            dir.path(),
            "Unus Annus",
            EpisodeIdentifier::new(1, 4),
            LayoutVariant::Flat,
        );
        fs::create_dir_all(layout.episode_dir()).unwrap();
        fs::write(layout.video_path(), b"already archived").unwrap();

        let fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"replacement"));
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &[])]),
            fetcher,
        );

        let report = archiver.archive_episode(EpisodeIdentifier::new(1, 4), |_| {});

        assert_eq!(report.result.unwrap().video, VideoResult::AlreadyPresent);
        assert_eq!(fs::read(layout.video_path()).unwrap(), b"already archived");
        assert!(
            !archiver
                .fetcher
                .calls()
                .iter()
                .any(|url| url.ends_with(".mp4"))
        );
        // The sidecar is still refreshed
        assert!(layout.nfo_path().is_file());
    }

    #[test]
    fn test_exhausted_video_fails_episode() {
        let dir = tempfile::tempdir().unwrap();
        let video_url = format!("{CDN}/01/004/1080.mp4");
        let fetcher =
            FakeFetcher::default().respond(&video_url, FakeResponse::Body(vec![0; 900], 1000));
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &[])]),
            fetcher,
        );
        let mut failed_attempts = Vec::new();

        let report = archiver.archive_episode(EpisodeIdentifier::new(1, 4), |event| {
            if let ProgressEvent::VideoAttemptFailed {
                attempt,
                will_retry,
                ..
            } = event
            {
                failed_attempts.push((attempt, will_retry));
            }
        });

        match report.result {
            Err(EpisodeError::VideoExhausted { fetches, last }) => {
                assert_eq!(fetches, 4);
                assert_eq!(last.status, DownloadStatus::Incomplete);
            }
            other => panic!("expected exhausted video, got {:?}", other),
        }
        assert_eq!(
            failed_attempts,
            vec![(1, true), (2, true), (3, true), (4, false)]
        );
        assert_eq!(
            archiver
                .fetcher
                .calls()
                .iter()
                .filter(|url| **url == video_url)
                .count(),
            4
        );
        let layout = EpisodeLayout::from_config(archiver.config(), EpisodeIdentifier::new(1, 4));
        assert!(!layout.video_path().exists());
        assert!(layout.nfo_path().is_file());
    }

    #[test]
    fn test_single_subtitle_language() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = EpisodeArchiver::new(
            config(dir.path()),
            FakeResolver::with(vec![metadata(4, &["en", "de", "fr"])]),
            FakeFetcher::default(),
        )
        .with_subtitles(SubtitleRequest::One("de".to_string()));

        archiver.archive_episode(EpisodeIdentifier::new(1, 4), |_| {});

        let subtitle_calls: Vec<_> = archiver
            .fetcher
            .calls()
            .into_iter()
            .filter(|url| url.ends_with(".vtt"))
            .collect();
        assert_eq!(subtitle_calls, vec![format!("{CDN}/subs/01/004.de.vtt")]);
    }

    #[test]
    fn test_metadata_folder_layout() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/thumbnails/01/004.jpg"), ok(b"image"))
            .respond(&format!("{CDN}/01/004/1080.mp4"), ok(b"video"));
        let config = ArchiveConfig {
            layout: LayoutVariant::MetadataFolder,
            ..config(dir.path())
        };
        let mut archiver =
            EpisodeArchiver::new(config, FakeResolver::with(vec![metadata(4, &[])]), fetcher);

        let summary = archiver
            .archive_episode(EpisodeIdentifier::new(1, 4), |_| {})
            .result
            .unwrap();

        let expected = dir
            .path()
            .join("Season 01/Unus Annus S1E4/metadata/Unus Annus S1E4.jpg");
        assert_eq!(summary.thumbnail, Some(expected.clone()));
        assert!(expected.is_file());
    }

    #[test]
    fn test_range_is_sequential_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .respond(&format!("{CDN}/01/005/1080.mp4"), ok(b"five"))
            .respond(&format!("{CDN}/01/003/1080.mp4"), ok(b"three"))
            .respond(&format!("{CDN}/01/002/1080.mp4"), ok(b"two"));
        // Episode 4 does not exist upstream
        let resolver = FakeResolver::with(vec![metadata(2, &[]), metadata(3, &[]), metadata(5, &[])]);
        let mut archiver = EpisodeArchiver::new(config(dir.path()), resolver, fetcher);

        let report = archiver.archive_range(1, "5-2".parse().unwrap(), |_| {});

        let order: Vec<u32> = report.reports.iter().map(|r| r.identifier.episode).collect();
        assert_eq!(order, vec![5, 4, 3, 2]);
        assert_eq!(report.failures(), 1);
        assert!(!report.reports[1].is_success());
        assert_eq!(
            *archiver.resolver.requested.borrow(),
            EpisodeSelection::Range { start: 5, end: 2 }.identifiers(1)
        );
    }
}
