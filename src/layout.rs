//! Local library layout
//!
//! Paths are derived purely from the episode identifier and the configured
//! show title:
//!
//! ```text
//! Season 01/
//!   Unus Annus S1E4/
//!     Unus Annus S1E4.mp4
//!     Unus Annus S1E4.en.vtt
//!     Unus Annus S1E4.nfo
//!     thumb.jpg            (flat layout)
//!     metadata/Unus Annus S1E4.jpg   (metadata-folder layout)
//! ```

use crate::asset_fetcher::AssetKind;
use crate::config::{ArchiveConfig, LayoutVariant};
use crate::identifier::EpisodeIdentifier;
use std::path::{Path, PathBuf};

const METADATA_FOLDER: &str = "metadata";
const NFO_EXTENSION: &str = "nfo";

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Computed target paths for one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLayout {
    episode_dir: PathBuf,
    stem: String,
    variant: LayoutVariant,
}

impl EpisodeLayout {
    pub fn new(
        root: &Path,
        show_title: &str,
        identifier: EpisodeIdentifier,
        variant: LayoutVariant,
    ) -> Self {
        let stem = format!("{} {}", sanitize_filename(show_title), identifier);
        let episode_dir = season_dir(root, identifier.season).join(&stem);

        Self {
            episode_dir,
            stem,
            variant,
        }
    }

    pub fn from_config(config: &ArchiveConfig, identifier: EpisodeIdentifier) -> Self {
        Self::new(
            &config.output_root,
            &config.show_title,
            identifier,
            config.layout,
        )
    }

    /// `Season NN/<Title> SxEy`
    pub fn episode_dir(&self) -> &Path {
        &self.episode_dir
    }

    /// The metadata subfolder, if the layout variant has one
    pub fn metadata_dir(&self) -> Option<PathBuf> {
        match self.variant {
            LayoutVariant::Flat => None,
            LayoutVariant::MetadataFolder => Some(self.episode_dir.join(METADATA_FOLDER)),
        }
    }

    /// File stem shared by the video, subtitles and sidecar (`<Title> SxEy`)
    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn video_path(&self) -> PathBuf {
        self.episode_file(AssetKind::Video.extension())
    }

    pub fn subtitle_path(&self, language: &str) -> PathBuf {
        self.episode_file(&format!(
            "{}.{}",
            sanitize_filename(language),
            AssetKind::Subtitle.extension()
        ))
    }

    pub fn thumbnail_path(&self, extension: &str) -> PathBuf {
        match self.metadata_dir() {
            None => self.episode_dir.join(format!("thumb.{}", extension)),
            Some(dir) => dir.join(format!("{}.{}", self.stem, extension)),
        }
    }

    pub fn nfo_path(&self) -> PathBuf {
        self.episode_file(NFO_EXTENSION)
    }

    fn episode_file(&self, extension: &str) -> PathBuf {
        self.episode_dir.join(format!("{}.{}", self.stem, extension))
    }
}

/// `<root>/Season NN`
pub fn season_dir(root: &Path, season: u32) -> PathBuf {
    root.join(format!("Season {}", crate::identifier::normalize_season(season)))
}
