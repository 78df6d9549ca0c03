/// Episode metadata records and the resolver trait.
///
/// This module provides the explicit metadata record handed from the resolver
/// to the rest of the pipeline, as well as the trait implemented by metadata
/// sources.
mod archive_api;
mod archive_types;

pub use archive_api::ArchiveApiResolver;

use crate::identifier::EpisodeIdentifier;
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// The episode does not exist upstream
    #[error("Episode not found: {0}")]
    NotFound(EpisodeIdentifier),

    /// Request to the metadata endpoint failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the endpoint's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// A subtitle track advertised for an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    /// Language code as used in the CDN path (e.g. `en`)
    pub language_code: String,
}

/// Resolved metadata of a single episode.
///
/// Fields the upstream record may omit are optional; the NFO renderer
/// documents the fallbacks it applies.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMetadata {
    /// The episode this record describes
    pub identifier: EpisodeIdentifier,
    /// Episode title, `None` when upstream has none
    pub title: Option<String>,
    /// Free-text description, may contain markup and `<br>` markers
    pub description: String,
    /// Air date as milliseconds since the Unix epoch
    pub air_date_epoch_millis: Option<i64>,
    /// Running time in seconds
    pub duration_seconds: Option<f64>,
    /// Subtitle tracks in upstream order
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

impl EpisodeMetadata {
    /// Creates a record with only the identifier set.
    pub fn empty(identifier: EpisodeIdentifier) -> Self {
        Self {
            identifier,
            title: None,
            description: String::new(),
            air_date_epoch_millis: None,
            duration_seconds: None,
            subtitle_tracks: Vec::new(),
        }
    }

    /// Language codes of all advertised subtitle tracks
    pub fn subtitle_languages(&self) -> Vec<&str> {
        self.subtitle_tracks
            .iter()
            .map(|track| track.language_code.as_str())
            .collect()
    }
}

/// Trait for sources that can resolve episode metadata.
///
/// Implementors are queried once per episode; nothing is cached between
/// calls.
pub trait MetadataResolver {
    /// Fetches metadata for a single episode.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataRetrievalError::NotFound`] when the episode does not
    /// exist upstream, or a request/parse error when the endpoint could not
    /// be queried.
    fn fetch_episode(
        &self,
        identifier: EpisodeIdentifier,
    ) -> Result<EpisodeMetadata, MetadataRetrievalError>;

    /// Fetches the metadata of every episode the archive knows about.
    fn fetch_all(&self) -> Result<Vec<EpisodeMetadata>, MetadataRetrievalError>;
}
