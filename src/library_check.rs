//! Library completeness check
//!
//! Probes the local library for the episode folders of a season range and
//! reports which of them are missing, or which are present.

use crate::config::ArchiveConfig;
use crate::identifier::{EpisodeIdentifier, EpisodeSelection};
use crate::layout::EpisodeLayout;
use std::path::PathBuf;

/// An episode folder found (or not found) in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub identifier: EpisodeIdentifier,
    pub episode_dir: PathBuf,
    /// Whether the folder also contains the video file
    pub has_video: bool,
}

/// Lists the episodes of `selection` whose folders are missing
///
/// With `invert` set, lists the episodes whose folders exist instead.
/// Entries are returned in selection order.
pub fn check_library(
    config: &ArchiveConfig,
    season: u32,
    selection: EpisodeSelection,
    invert: bool,
) -> Vec<LibraryEntry> {
    selection
        .identifiers(season)
        .into_iter()
        .filter_map(|identifier| {
            let layout = EpisodeLayout::from_config(config, identifier);
            let exists = layout.episode_dir().is_dir();

            (exists == invert).then(|| LibraryEntry {
                identifier,
                episode_dir: layout.episode_dir().to_path_buf(),
                has_video: layout.video_path().is_file(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> (tempfile::TempDir, ArchiveConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig {
            output_root: dir.path().to_path_buf(),
            ..ArchiveConfig::default()
        };

        for episode in [1, 3] {
            let layout = EpisodeLayout::from_config(&config, EpisodeIdentifier::new(1, episode));
            fs::create_dir_all(layout.episode_dir()).unwrap();
            if episode == 3 {
                fs::write(layout.video_path(), b"video").unwrap();
            }
        }

        (dir, config)
    }

    #[test]
    fn test_missing_episodes() {
        let (_dir, config) = library();

        let missing = check_library(&config, 1, "1-4".parse().unwrap(), false);
        let episodes: Vec<u32> = missing.iter().map(|e| e.identifier.episode).collect();

        assert_eq!(episodes, vec![2, 4]);
        assert!(missing.iter().all(|e| !e.has_video));
    }

    #[test]
    fn test_present_episodes() {
        let (_dir, config) = library();

        let present = check_library(&config, 1, "4-1".parse().unwrap(), true);
        let episodes: Vec<(u32, bool)> = present
            .iter()
            .map(|e| (e.identifier.episode, e.has_video))
            .collect();

        assert_eq!(episodes, vec![(3, true), (1, false)]);
    }
}
