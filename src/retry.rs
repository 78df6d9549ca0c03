//! Bounded retry of the video download
//!
//! The video is the largest asset and the one most likely to be cut short, so
//! it is the only asset that gets retried. Between attempts the partial file
//! is removed; there is no delay between attempts.

use crate::asset_fetcher::{AssetFetchError, AssetFetcher, DownloadOutcome, ProgressReporter};
use crate::config::DEFAULT_MAX_ATTEMPTS;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Phase of a retrying download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Attempting,
    Succeeded,
    ExhaustedFailure,
}

/// Attempt bookkeeping for one episode's video download
///
/// `max_attempts` counts retries, so the fetcher runs at most
/// `max_attempts + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempts_made: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
        }
    }

    /// Advances the state with the outcome of the latest fetch
    pub fn advance(&mut self, outcome: &DownloadOutcome) -> RetryPhase {
        if outcome.is_complete() {
            return RetryPhase::Succeeded;
        }

        let exhausted = self.attempts_made >= self.max_attempts;
        self.attempts_made = self.attempts_made.saturating_add(1);
        if exhausted {
            RetryPhase::ExhaustedFailure
        } else {
            RetryPhase::Attempting
        }
    }
}

/// Terminal result of a retrying download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded {
        outcome: DownloadOutcome,
        /// Total number of fetches, including the successful one
        fetches: u32,
    },
    ExhaustedFailure {
        /// Outcome of the final failed fetch
        last: DownloadOutcome,
        fetches: u32,
    },
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn fetches(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { fetches, .. } | RetryOutcome::ExhaustedFailure { fetches, .. } => {
                *fetches
            }
        }
    }
}

/// Runs a fetch until it completes or the attempt budget is used up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    max_attempts: u32,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Downloads `url` to `target`, retrying incomplete transfers
    ///
    /// `on_failed_attempt` is called after every failed fetch, once the
    /// partial file has been removed, with the updated state and the phase
    /// the controller moves to.
    ///
    /// # Errors
    ///
    /// Local file system failures abort immediately without further attempts.
    pub fn run<F, H>(
        &self,
        fetcher: &F,
        url: &str,
        target: &Path,
        progress: &mut dyn ProgressReporter,
        mut on_failed_attempt: H,
    ) -> Result<RetryOutcome, AssetFetchError>
    where
        F: AssetFetcher + ?Sized,
        H: FnMut(&RetryState, &DownloadOutcome, RetryPhase),
    {
        let mut state = RetryState::new(self.max_attempts);
        let mut fetches: u32 = 0;

        loop {
            let outcome = fetcher.fetch(url, target, progress)?;
            fetches = fetches.saturating_add(1);

            let phase = state.advance(&outcome);
            if phase == RetryPhase::Succeeded {
                return Ok(RetryOutcome::Succeeded { outcome, fetches });
            }

            debug!(%url, %outcome, attempt = fetches, "Video fetch failed");
            discard_partial(target)?;
            on_failed_attempt(&state, &outcome, phase);

            if phase == RetryPhase::ExhaustedFailure {
                return Ok(RetryOutcome::ExhaustedFailure {
                    last: outcome,
                    fetches,
                });
            }
        }
    }
}

/// Removes a partially written file; a file that is already gone is fine
pub fn discard_partial(path: &Path) -> Result<(), AssetFetchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(AssetFetchError::LocalIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}
