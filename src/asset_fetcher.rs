//! Binary asset download and size verification
//!
//! This module streams a single remote resource (video, subtitle or thumbnail)
//! into a local file and checks the number of bytes written against the
//! content length the server declared.

use crate::config::Quality;
use crate::identifier::EpisodeIdentifier;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Size of the chunks copied from the response body to disk
const CHUNK_SIZE: usize = 8192;

/// Errors that can occur during asset download operations
///
/// Remote failures are not errors; they are reported through
/// [`DownloadStatus::TransportError`]. Only local problems end up here.
#[derive(Debug, Error)]
pub enum AssetFetchError {
    /// Failed to set up the HTTP client
    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),

    /// Failed to create, write or remove a local file
    #[error("Failed to write {path}: {source}")]
    LocalIo { path: PathBuf, source: io::Error },
}

/// The kinds of binary assets stored per episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Subtitle,
    Thumbnail,
}

impl AssetKind {
    /// Default file extension of the asset
    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Video => "mp4",
            AssetKind::Subtitle => "vtt",
            AssetKind::Thumbnail => "jpg",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Video => "video",
            AssetKind::Subtitle => "subtitle",
            AssetKind::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// A concrete asset to request from the CDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRequest {
    /// `{cdn}/{NN}/{NNN}/{quality}.mp4`
    Video { quality: Quality },
    /// `{cdn}/subs/{NN}/{NNN}.{language}.vtt`
    Subtitle { language: String },
    /// `{cdn}/thumbnails/{NN}/{NNN}.{extension}`
    Thumbnail { extension: String },
}

impl AssetRequest {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetRequest::Video { .. } => AssetKind::Video,
            AssetRequest::Subtitle { .. } => AssetKind::Subtitle,
            AssetRequest::Thumbnail { .. } => AssetKind::Thumbnail,
        }
    }

    /// Builds the CDN URL of this asset for the given episode
    pub fn url(&self, cdn: &str, identifier: EpisodeIdentifier) -> String {
        let cdn = cdn.trim_end_matches('/');
        let season = identifier.season_segment();
        let episode = identifier.episode_segment();

        match self {
            AssetRequest::Video { quality } => format!(
                "{}/{}/{}/{}.{}",
                cdn,
                season,
                episode,
                quality.value(),
                AssetKind::Video.extension()
            ),
            AssetRequest::Subtitle { language } => format!(
                "{}/subs/{}/{}.{}.{}",
                cdn,
                season,
                episode,
                language,
                AssetKind::Subtitle.extension()
            ),
            AssetRequest::Thumbnail { extension } => {
                format!("{}/thumbnails/{}/{}.{}", cdn, season, episode, extension)
            }
        }
    }
}

/// Result classification of a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Exactly the declared number of bytes was written
    Complete,
    /// Fewer bytes than declared, usually a truncated transfer
    Incomplete,
    /// More bytes than declared, the served content probably changed
    Oversized,
    /// Non-success HTTP status, or `None` when the connection failed
    TransportError(Option<u16>),
}

/// What a download produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status: DownloadStatus,
    pub bytes_written: u64,
    pub expected_bytes: u64,
}

impl DownloadOutcome {
    /// Classifies a finished transfer by comparing written and declared size
    pub fn verify(bytes_written: u64, expected_bytes: u64) -> Self {
        let status = match bytes_written.cmp(&expected_bytes) {
            std::cmp::Ordering::Equal => DownloadStatus::Complete,
            std::cmp::Ordering::Less => DownloadStatus::Incomplete,
            std::cmp::Ordering::Greater => DownloadStatus::Oversized,
        };

        Self {
            status,
            bytes_written,
            expected_bytes,
        }
    }

    pub fn transport_error(code: Option<u16>, bytes_written: u64, expected_bytes: u64) -> Self {
        Self {
            status: DownloadStatus::TransportError(code),
            bytes_written,
            expected_bytes,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DownloadStatus::Complete
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            DownloadStatus::Complete => write!(f, "complete ({} bytes)", self.bytes_written),
            DownloadStatus::Incomplete => write!(
                f,
                "incomplete ({} of {} bytes)",
                self.bytes_written, self.expected_bytes
            ),
            DownloadStatus::Oversized => write!(
                f,
                "oversized ({} bytes, {} declared)",
                self.bytes_written, self.expected_bytes
            ),
            DownloadStatus::TransportError(Some(code)) => write!(f, "HTTP {}", code),
            DownloadStatus::TransportError(None) => write!(f, "connection failed"),
        }
    }
}

/// Receives streaming progress of a download
///
/// Implementations only observe; they cannot influence the outcome.
pub trait ProgressReporter {
    /// Called after every chunk with the bytes written so far and the
    /// declared total (0 when the server did not declare one)
    fn report(&mut self, bytes_so_far: u64, total_bytes: u64);
}

/// Progress reporter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _bytes_so_far: u64, _total_bytes: u64) {}
}

/// Trait for downloading a remote resource into a local file
pub trait AssetFetcher {
    /// Downloads `url` into `target`
    ///
    /// A non-success HTTP status yields [`DownloadStatus::TransportError`]
    /// without touching `target`.
    ///
    /// # Errors
    ///
    /// Only local file system failures are returned as errors.
    fn fetch(
        &self,
        url: &str,
        target: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<DownloadOutcome, AssetFetchError>;
}

/// Fetches assets over HTTP using a blocking reqwest client
pub struct HttpAssetFetcher {
    client: reqwest::blocking::Client,
}

impl HttpAssetFetcher {
    /// Creates a fetcher without an overall request timeout, as full
    /// episodes may take a long time to download
    pub fn new() -> Result<Self, AssetFetchError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(AssetFetchError::ClientSetup)?;

        Ok(Self::with_client(client))
    }

    /// Creates a fetcher using an existing client
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(
        &self,
        url: &str,
        target: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<DownloadOutcome, AssetFetchError> {
        debug!(%url, target = %target.display(), "Fetching asset");

        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "Request failed");
                return Ok(DownloadOutcome::transport_error(
                    e.status().map(|status| status.as_u16()),
                    0,
                    0,
                ));
            }
        };

        // Declared size, read before any of the body
        let expected = response.content_length().unwrap_or(0);

        if !response.status().is_success() {
            return Ok(DownloadOutcome::transport_error(
                Some(response.status().as_u16()),
                0,
                expected,
            ));
        }

        stream_to_file(response, expected, target, progress)
    }
}

/// Copies `reader` into a newly created file at `target` in fixed-size chunks
///
/// The file is flushed and closed before the outcome is returned. A read
/// error part-way through is reported as a transport error carrying the
/// bytes written up to that point.
pub fn stream_to_file<R: Read>(
    mut reader: R,
    expected_bytes: u64,
    target: &Path,
    progress: &mut dyn ProgressReporter,
) -> Result<DownloadOutcome, AssetFetchError> {
    let local_io = |source: io::Error| AssetFetchError::LocalIo {
        path: target.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(File::create(target).map_err(local_io)?);
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let mut read_failure = None;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break, // EOF
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                read_failure = Some(e);
                break;
            }
        };

        writer.write_all(&buffer[..bytes_read]).map_err(local_io)?;
        written += bytes_read as u64;
        progress.report(written, expected_bytes);
    }

    writer.flush().map_err(local_io)?;
    drop(writer);

    if let Some(e) = read_failure {
        debug!(target = %target.display(), error = %e, "Response body ended with an error");
        return Ok(DownloadOutcome::transport_error(None, written, expected_bytes));
    }

    Ok(DownloadOutcome::verify(written, expected_bytes))
}
