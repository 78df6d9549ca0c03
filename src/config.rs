//! Archive configuration
//!
//! Everything that used to be a process-wide constant (endpoints, the show
//! title, the fixed cast) lives in [`ArchiveConfig`], which is handed to each
//! component when it is constructed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Base URL of the metadata API
pub const DEFAULT_ENDPOINT: &str = "https://unusannusarchive.tk/api/v2/metadata/video";

/// Base URL of the CDN serving videos, subtitles and thumbnails
pub const DEFAULT_CDN: &str = "https://cdn.unusannusarchive.tk";

/// Video qualities served by the CDN, best first
pub const SUPPORTED_QUALITIES: &[u16] = &[2160, 1440, 1080, 720, 480, 360, 240];

/// Thumbnail image extensions, tried in this order
pub const DEFAULT_THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "webp", "png"];

/// Default number of retries for the video asset (four fetches in total)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors that can occur while parsing a video quality
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QualityParseError {
    #[error("Invalid quality '{0}', expected a number such as 1080")]
    NotANumber(String),

    #[error("Unsupported quality {0}p, supported qualities: {list}", list = supported_qualities_list())]
    Unsupported(u16),
}

fn supported_qualities_list() -> String {
    SUPPORTED_QUALITIES
        .iter()
        .map(|q| format!("{}p", q))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Vertical resolution of the video asset (1080 means 1080p)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u16);

impl Quality {
    pub fn new(value: u16) -> Result<Self, QualityParseError> {
        if SUPPORTED_QUALITIES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(QualityParseError::Unsupported(value))
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(1080)
    }
}

impl FromStr for Quality {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(['p', 'P']);
        let value = trimmed
            .parse::<u16>()
            .map_err(|_| QualityParseError::NotANumber(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

/// How an episode folder is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutVariant {
    /// Everything in the episode folder, thumbnail saved as `thumb.<ext>`
    #[default]
    Flat,
    /// Thumbnail saved below a `metadata/` subfolder, named after the episode
    MetadataFolder,
}

/// A fixed cast entry written into every NFO sidecar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMember {
    pub name: String,
    pub role: String,
    pub kind: String,
    pub sort_order: u32,
}

impl CastMember {
    pub fn actor(name: &str, role: &str, sort_order: u32) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            kind: "Actor".to_string(),
            sort_order,
        }
    }
}

/// Configuration for one archive source
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Metadata API base (`{endpoint}/episode/s01.e004`, `{endpoint}/all`)
    pub endpoint: String,
    /// CDN base for all binary assets
    pub cdn: String,
    /// Show title, used for folder names and as NFO title fallback
    pub show_title: String,
    /// IMDb id of the show written into every sidecar
    pub imdb_id: String,
    /// Cast entries written into every sidecar
    pub cast: Vec<CastMember>,
    /// Library root containing the `Season NN` folders
    pub output_root: PathBuf,
    pub layout: LayoutVariant,
    pub quality: Quality,
    /// Retries allowed after the first failed video fetch
    pub max_attempts: u32,
    /// Thumbnail extensions in order of preference
    pub thumbnail_extensions: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cdn: DEFAULT_CDN.to_string(),
            show_title: "Unus Annus".to_string(),
            imdb_id: "tt11289784".to_string(),
            cast: vec![
                CastMember::actor("Mark Fishbach", "Markiplier", 0),
                CastMember::actor("Ethan Nestor", "CrankGameplays", 1),
            ],
            output_root: PathBuf::from("."),
            layout: LayoutVariant::default(),
            quality: Quality::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            thumbnail_extensions: DEFAULT_THUMBNAIL_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}
