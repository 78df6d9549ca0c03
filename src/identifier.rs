//! Episode identifiers and episode selections
//!
//! The zero-padded forms produced here address both the CDN paths and the
//! local season folders, so the two always stay in lockstep.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pads a season number to at least two digits (`1` -> `"01"`).
pub fn normalize_season(season: u32) -> String {
    format!("{:02}", season)
}

/// Pads an episode number to at least three digits (`7` -> `"007"`).
pub fn normalize_episode(episode: u32) -> String {
    format!("{:03}", episode)
}

/// Identifies a single episode of the archived show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeIdentifier {
    /// Season number (0 for specials)
    pub season: u32,
    /// Episode number within the season
    pub episode: u32,
}

impl EpisodeIdentifier {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// Zero-padded season segment
    pub fn season_segment(&self) -> String {
        normalize_season(self.season)
    }

    /// Zero-padded episode segment
    pub fn episode_segment(&self) -> String {
        normalize_episode(self.episode)
    }
}

impl fmt::Display for EpisodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}E{}", self.season, self.episode)
    }
}

/// Errors that can occur while parsing an episode selection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionParseError {
    #[error("Episode selection is empty")]
    Empty,

    #[error("Invalid episode number '{0}'")]
    InvalidNumber(String),

    #[error("Invalid episode range '{0}', expected <start>-<end>")]
    InvalidRange(String),
}

/// One episode or an inclusive range of episodes
///
/// A range may run in either direction; `5-2` visits 5, 4, 3 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeSelection {
    Single(u32),
    Range { start: u32, end: u32 },
}

impl EpisodeSelection {
    /// Episode numbers in processing order
    pub fn episodes(&self) -> Vec<u32> {
        match *self {
            EpisodeSelection::Single(episode) => vec![episode],
            EpisodeSelection::Range { start, end } if start <= end => (start..=end).collect(),
            EpisodeSelection::Range { start, end } => (end..=start).rev().collect(),
        }
    }

    /// Identifiers for the given season in processing order
    pub fn identifiers(&self, season: u32) -> Vec<EpisodeIdentifier> {
        self.episodes()
            .into_iter()
            .map(|episode| EpisodeIdentifier::new(season, episode))
            .collect()
    }

    /// Number of episodes covered by the selection
    pub fn count(&self) -> usize {
        match *self {
            EpisodeSelection::Single(_) => 1,
            EpisodeSelection::Range { start, end } => start.abs_diff(end) as usize + 1,
        }
    }
}

impl FromStr for EpisodeSelection {
    type Err = SelectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SelectionParseError::Empty);
        }

        let parse_number = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| SelectionParseError::InvalidNumber(part.to_string()))
        };

        match s.split_once('-') {
            None => Ok(EpisodeSelection::Single(parse_number(s)?)),
            Some((start, end)) => {
                if start.trim().is_empty() || end.trim().is_empty() || end.contains('-') {
                    return Err(SelectionParseError::InvalidRange(s.to_string()));
                }

                let start = parse_number(start)?;
                let end = parse_number(end)?;

                if start == end {
                    Ok(EpisodeSelection::Single(start))
                } else {
                    Ok(EpisodeSelection::Range { start, end })
                }
            }
        }
    }
}

impl fmt::Display for EpisodeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeSelection::Single(episode) => write!(f, "{}", episode),
            EpisodeSelection::Range { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}
