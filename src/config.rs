//! Configuration for a recovery run.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::PermutationKind;

/// Recovery run configuration.
#[derive(Debug, Clone)]
pub struct CrackConfig {
    /// Search the user password instead of the owner password.
    pub working_as_user: bool,

    /// User password supplied by the caller, verified when the run starts.
    pub known_password: Option<Vec<u8>>,

    /// Candidate expansion strategy.
    pub permutation: PermutationKind,

    /// Time between progress reports.
    pub progress_interval: Duration,

    /// Where to write checkpoints; none are written when unset.
    pub checkpoint_path: Option<PathBuf>,

    /// Time between checkpoints.
    pub checkpoint_interval: Duration,

    /// Worker count for parallel search; 0 picks one per core.
    pub workers: usize,

    /// Candidates handed to the workers at a time.
    pub batch_size: usize,

    /// Search the user password when the owner search finds nothing.
    pub user_fallback: bool,
}

impl Default for CrackConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CrackConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            working_as_user: false,
            known_password: None,
            permutation: PermutationKind::None,
            progress_interval: Duration::from_secs(20),
            checkpoint_path: None,
            checkpoint_interval: Duration::from_secs(60),
            workers: 1,
            batch_size: 4096,
            user_fallback: false,
        }
    }

    /// Search the user password.
    pub fn with_working_as_user(mut self, enable: bool) -> Self {
        self.working_as_user = enable;
        self
    }

    /// Supply a known user password.
    pub fn with_known_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.known_password = Some(password.into());
        self
    }

    /// Select the permutation strategy.
    pub fn with_permutation(mut self, permutation: PermutationKind) -> Self {
        self.permutation = permutation;
        self
    }

    /// Set the progress report interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Write checkpoints to `path` every `interval`.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>, interval: Duration) -> Self {
        self.checkpoint_path = Some(path.into());
        self.checkpoint_interval = interval;
        self
    }

    /// Set the worker count (0 = one per core).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the parallel batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fall back to a user password search when the owner search fails.
    pub fn with_user_fallback(mut self, enable: bool) -> Self {
        self.user_fallback = enable;
        self
    }
}
