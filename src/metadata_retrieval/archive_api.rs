//! Archive metadata API implementation.
use super::archive_types::{ArchiveEpisode, ArchiveTrack};
use super::{EpisodeMetadata, MetadataResolver, MetadataRetrievalError, SubtitleTrack};
use crate::config::ArchiveConfig;
use crate::identifier::EpisodeIdentifier;
use tracing::{debug, warn};

/// Metadata resolver for the archive's JSON API.
///
/// Single episodes are fetched from `{endpoint}/episode/s{NN}.e{NNN}`, the
/// complete catalog from `{endpoint}/all`.
pub struct ArchiveApiResolver {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl ArchiveApiResolver {
    /// Creates a resolver for the endpoint configured in `config`.
    pub fn new(config: &ArchiveConfig) -> Self {
        Self::with_client(config, reqwest::blocking::Client::new())
    }

    /// Creates a resolver that sends its requests through `client`.
    pub fn with_client(config: &ArchiveConfig, client: reqwest::blocking::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn episode_url(&self, identifier: EpisodeIdentifier) -> String {
        format!(
            "{}/episode/s{}.e{}",
            self.endpoint,
            identifier.season_segment(),
            identifier.episode_segment()
        )
    }

    /// Converts an API record to our internal metadata structure.
    fn convert_episode(identifier: EpisodeIdentifier, record: ArchiveEpisode) -> EpisodeMetadata {
        EpisodeMetadata {
            identifier,
            title: record.title.filter(|title| !title.trim().is_empty()),
            description: record.description.unwrap_or_default(),
            air_date_epoch_millis: record.date.and_then(|date| date.as_millis()),
            duration_seconds: record.duration,
            subtitle_tracks: record
                .tracks
                .unwrap_or_default()
                .into_iter()
                .map(|ArchiveTrack { srclang }| SubtitleTrack {
                    language_code: srclang,
                })
                .collect(),
        }
    }

    /// Flattens the per-season catalog, dropping records without an identifier.
    fn convert_catalog(seasons: Vec<Vec<ArchiveEpisode>>) -> Vec<EpisodeMetadata> {
        seasons
            .into_iter()
            .flatten()
            .filter_map(|record| match (record.season, record.episode) {
                (Some(season), Some(episode)) => Some(Self::convert_episode(
                    EpisodeIdentifier::new(season, episode),
                    record,
                )),
                _ => {
                    warn!(title = ?record.title, "Skipping catalog record without season/episode");
                    None
                }
            })
            .collect()
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, MetadataRetrievalError> {
        debug!(%url, "Requesting metadata");

        self.client
            .get(url)
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))
    }
}

fn http_error(status: reqwest::StatusCode) -> MetadataRetrievalError {
    MetadataRetrievalError::RequestError(format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    ))
}

impl MetadataResolver for ArchiveApiResolver {
    fn fetch_episode(
        &self,
        identifier: EpisodeIdentifier,
    ) -> Result<EpisodeMetadata, MetadataRetrievalError> {
        let response = self.get(&self.episode_url(identifier))?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataRetrievalError::NotFound(identifier));
        }

        let body = response
            .text()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        // An error body marks an unknown episode whatever the status code
        match serde_json::from_str::<ArchiveEpisode>(&body) {
            Ok(record) if record.error.is_some() => {
                Err(MetadataRetrievalError::NotFound(identifier))
            }
            _ if !status.is_success() => Err(http_error(status)),
            Ok(record) => Ok(Self::convert_episode(identifier, record)),
            Err(e) => Err(MetadataRetrievalError::ParseError(e.to_string())),
        }
    }

    fn fetch_all(&self) -> Result<Vec<EpisodeMetadata>, MetadataRetrievalError> {
        let response = self.get(&format!("{}/all", self.endpoint))?;

        if !response.status().is_success() {
            return Err(http_error(response.status()));
        }

        let seasons: Vec<Vec<ArchiveEpisode>> = response
            .json()
            .map_err(|e| MetadataRetrievalError::ParseError(e.to_string()))?;

        Ok(Self::convert_catalog(seasons))
    }
}
