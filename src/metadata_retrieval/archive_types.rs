//! Archive API response types for deserialization.
//!
//! These structures mirror the JSON response format of the metadata endpoint.
use serde::Deserialize;

/// A single episode record, as returned by `/episode/sNN.eNNN` and inside
/// the nested season lists of `/all`.
#[derive(Debug, Deserialize)]
pub(super) struct ArchiveEpisode {
    /// Season number, only guaranteed in the bulk listing
    pub season: Option<u32>,
    /// Episode number, only guaranteed in the bulk listing
    pub episode: Option<u32>,
    pub title: Option<String>,
    /// Description in HTML format
    pub description: Option<String>,
    /// Air date in epoch milliseconds
    pub date: Option<EpochMillis>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub tracks: Option<Vec<ArchiveTrack>>,
    /// Present when the episode does not exist
    pub error: Option<serde_json::Value>,
}

/// A subtitle track entry.
#[derive(Debug, Deserialize)]
pub(super) struct ArchiveTrack {
    pub srclang: String,
}

/// The endpoint serves dates both as JSON numbers and as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum EpochMillis {
    Number(i64),
    Text(String),
}

impl EpochMillis {
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            EpochMillis::Number(millis) => Some(*millis),
            EpochMillis::Text(text) => text.trim().parse().ok(),
        }
    }
}
