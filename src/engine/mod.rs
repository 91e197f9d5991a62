//! Password recovery engine.
//!
//! A [`Session`] tests candidate passwords against one document's
//! encryption parameters. Each session owns its key derivation workspace
//! and counters; independent searches run independent sessions.
//!
//! # Modes
//!
//! The mode is fixed when the session begins:
//!
//! | Mode | Candidate is | Check |
//! |---|---|---|
//! | [`Mode::OwnerRecovery`] | owner password | decrypt O into user material, derive file key, reproduce U |
//! | [`Mode::UserVerification`] | user password | derive file key, reproduce U |
//! | [`Mode::OwnerGivenUser`] | owner password | decrypt O, compare with the known padded user password |
//! | [`Mode::UserEstablished`] | user password | as `UserVerification`; the user password was supplied |
//!
//! Revision 3 checks first undo the 20-round RC4 chain on the leading
//! [`PARTIAL_TEST_SIZE`] bytes only and run the full chain on a fresh copy
//! when those match.
//!
//! PDF Spec: Section 7.6.3.4 - Password algorithms (Algorithms 3.2 - 3.7)

use std::sync::Arc;
use std::time::Duration;

use crate::config::CrackConfig;
use crate::encryption::algorithms::{self, rev3_decrypt, PARTIAL_TEST_SIZE};
use crate::encryption::rc4::rc4_matches;
use crate::encryption::{
    pad_password, unpad_password, EncryptionParameters, KeyDerivationWorkspace, ParamWarning,
    PADDING,
};
use crate::error::{Error, Result};

mod checkpoint;
pub mod permutation;
mod progress;

pub use checkpoint::{Checkpoint, FORMAT_VERSION as CHECKPOINT_FORMAT_VERSION};
pub use permutation::{Permutation, PermutationKind};
pub use progress::Progress;

use progress::Stats;

/// Which authentication variant a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Search the owner password without knowing the user password
    OwnerRecovery,
    /// Search the user password
    UserVerification,
    /// Search the owner password with the user password known
    OwnerGivenUser,
    /// Working as user with a user password already verified
    UserEstablished,
}

impl Mode {
    /// Mode for the given flags.
    pub fn select(working_as_user: bool, known_password: bool) -> Self {
        match (working_as_user, known_password) {
            (false, false) => Mode::OwnerRecovery,
            (true, false) => Mode::UserVerification,
            (false, true) => Mode::OwnerGivenUser,
            (true, true) => Mode::UserEstablished,
        }
    }

    /// Whether candidates are owner passwords.
    pub fn searches_owner(self) -> bool {
        matches!(self, Mode::OwnerRecovery | Mode::OwnerGivenUser)
    }

    /// Whether testing candidates can find anything. With the user
    /// password established there is nothing left to search for.
    pub fn is_search(self) -> bool {
        self != Mode::UserEstablished
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::OwnerRecovery => "owner recovery",
            Mode::UserVerification => "user verification",
            Mode::OwnerGivenUser => "owner recovery (user password known)",
            Mode::UserEstablished => "user verification (user password known)",
        };
        f.write_str(name)
    }
}

/// Final numbers of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Candidates tested over the whole run
    pub total_processed: u64,
    /// Wall time over the whole run
    pub elapsed: Duration,
    /// Matching candidate, if any
    pub found: Option<Vec<u8>>,
}

/// One password search over one document.
#[derive(Debug, Clone)]
pub struct Session {
    params: Arc<EncryptionParameters>,
    workspace: KeyDerivationWorkspace,
    rev3_test_key: [u8; 16],
    owner_string: [u8; 32],
    user_string: [u8; 32],
    key_len: usize,
    /// Padded user password: supplied, detected empty, or recovered from O
    user_password: [u8; 32],
    known_password: bool,
    working_as_user: bool,
    mode: Mode,
    partial_check: bool,
    permutation: Box<dyn Permutation>,
    current: Vec<u8>,
    variant: Vec<u8>,
    found: Option<Vec<u8>>,
    stats: Stats,
    warnings: Vec<ParamWarning>,
}

impl Session {
    /// Start a session.
    ///
    /// `known_password` is a user password supplied by the caller; it must
    /// authenticate or the session does not start. Without one, the empty
    /// user password is tried and, when it authenticates, recorded as known.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedRevision`] for revisions other than 2 and 3,
    /// [`Error::PasswordRejected`] when `known_password` does not match.
    pub fn begin(
        params: &EncryptionParameters,
        known_password: Option<&[u8]>,
        working_as_user: bool,
        permutation: PermutationKind,
    ) -> Result<Self> {
        let mut session = Self::prepare(params, working_as_user, permutation)?;

        match known_password {
            Some(password) => {
                session.user_password = pad_password(password);
                session.workspace.set_padded(&session.user_password);
                if !session.check_user() {
                    log::warn!("Supplied user password does not authenticate");
                    return Err(Error::PasswordRejected);
                }
                session.workspace.reset_password();
                session.known_password = true;
            },
            None => {
                session.user_password = PADDING;
                session.known_password = session.check_user();
                if session.known_password {
                    log::info!("Document opens with an empty user password");
                }
            },
        }

        session.mode = Mode::select(working_as_user, session.known_password);
        log::info!(
            "Session started: R={}, {}-bit key, mode: {}, permutation: {:?}",
            params.revision,
            session.key_len * 8,
            session.mode,
            permutation
        );
        Ok(session)
    }

    /// [`Session::begin`] with the flags taken from `config`.
    pub fn from_config(params: &EncryptionParameters, config: &CrackConfig) -> Result<Self> {
        Self::begin(
            params,
            config.known_password.as_deref(),
            config.working_as_user,
            config.permutation,
        )
    }

    /// Rebuild a session from a checkpoint taken on the same document.
    ///
    /// # Errors
    ///
    /// [`Error::CheckpointMismatch`] when the checkpoint belongs to another
    /// document or its stored user password no longer authenticates.
    pub fn restore_from(params: &EncryptionParameters, checkpoint: &Checkpoint) -> Result<Self> {
        checkpoint.check_document(params)?;

        let mut session =
            Self::prepare(params, checkpoint.working_as_user, checkpoint.permutation)?;

        if let Some(stored) = checkpoint.user_password.as_deref() {
            session.user_password = stored.try_into().map_err(|_| {
                Error::Checkpoint(format!("stored user password is {} bytes", stored.len()))
            })?;
        }
        if checkpoint.known_password {
            if checkpoint.user_password.is_none() {
                return Err(Error::Checkpoint(
                    "known password flag set without a password".to_string(),
                ));
            }
            session.workspace.set_padded(&session.user_password);
            if !session.check_user() {
                return Err(Error::CheckpointMismatch(
                    "stored user password does not authenticate".to_string(),
                ));
            }
            session.workspace.reset_password();
            session.known_password = true;
        }

        session.mode = Mode::select(session.working_as_user, session.known_password);
        session.current = checkpoint.current_candidate.clone();
        session.found = checkpoint.found.clone();
        session.stats =
            Stats::resumed(checkpoint.processed, checkpoint.total_processed, checkpoint.elapsed);

        log::info!(
            "Session restored at '{}' after {} candidates, mode: {}",
            String::from_utf8_lossy(&session.current),
            checkpoint.total_processed,
            session.mode
        );
        Ok(session)
    }

    fn prepare(
        params: &EncryptionParameters,
        working_as_user: bool,
        permutation: PermutationKind,
    ) -> Result<Self> {
        if !matches!(params.revision, 2 | 3) {
            return Err(Error::UnsupportedRevision(params.revision));
        }

        let warnings = params.validate();
        for warning in &warnings {
            log::warn!("Encryption parameters: {}", warning);
        }

        let key_len = params.key_length_bytes();
        assert!((5..=16).contains(&key_len), "key length out of range: {}", key_len);

        Ok(Self {
            params: Arc::new(params.clone()),
            workspace: KeyDerivationWorkspace::new(params),
            rev3_test_key: algorithms::rev3_test_key(&params.file_id),
            owner_string: params.owner_string_32(),
            user_string: params.user_string_32(),
            key_len,
            user_password: PADDING,
            known_password: false,
            working_as_user,
            mode: Mode::select(working_as_user, false),
            partial_check: true,
            permutation: permutation.build(),
            current: Vec::with_capacity(algorithms::MAX_PASSWORD_LEN),
            variant: Vec::with_capacity(algorithms::MAX_PASSWORD_LEN),
            found: None,
            stats: Stats::new(),
            warnings,
        })
    }

    /// Enable or disable the revision 3 early-exit check. Verdicts are the
    /// same either way; disabling only costs time.
    pub fn with_partial_check(mut self, enabled: bool) -> Self {
        self.partial_check = enabled;
        self
    }

    /// Test one candidate and, through the permutation strategy, its
    /// variants. Candidates longer than 32 bytes are truncated.
    ///
    /// Returns `true` on a full match; the matching variant is then
    /// available from [`Session::found_password`].
    pub fn test(&mut self, candidate: &[u8]) -> bool {
        let len = candidate.len().min(algorithms::MAX_PASSWORD_LEN);
        self.current.clear();
        self.current.extend_from_slice(&candidate[..len]);

        let mut variant = std::mem::take(&mut self.variant);
        variant.clear();
        variant.extend_from_slice(&self.current);
        self.permutation.reset(&variant);

        let mut hit = false;
        loop {
            self.stats.add(1);
            if self.check(&variant) {
                hit = true;
                break;
            }
            if !self.permutation.next(&mut variant) {
                break;
            }
        }

        if hit {
            log::info!("Password found: '{}'", String::from_utf8_lossy(&variant));
            self.found = Some(variant.clone());
        }
        self.variant = variant;
        hit
    }

    #[inline]
    fn check(&mut self, candidate: &[u8]) -> bool {
        match self.mode {
            Mode::OwnerRecovery => self.check_owner_recovery(candidate),
            Mode::UserVerification | Mode::UserEstablished => {
                self.workspace.set_password(candidate);
                self.check_user()
            },
            Mode::OwnerGivenUser => self.check_owner_given_user(candidate),
        }
    }

    /// Does the password in the workspace slot reproduce U?
    ///
    /// PDF Spec: Algorithm 6 (Algorithms 4/5 run as a check)
    #[inline]
    fn check_user(&self) -> bool {
        if self.params.revision == 2 {
            let key = self.workspace.derive_key();
            rc4_matches(&key[..5], &self.user_string, &PADDING)
        } else {
            let key = self.workspace.derive_key();
            self.rev3_matches(&key[..self.key_len], &self.user_string[..16], &self.rev3_test_key)
        }
    }

    /// Owner candidate, user password unknown: the O string decrypted with
    /// the candidate's key is the padded user password, which must in turn
    /// reproduce U.
    ///
    /// PDF Spec: Algorithm 7 followed by Algorithm 6
    #[inline]
    fn check_owner_recovery(&mut self, candidate: &[u8]) -> bool {
        let key = algorithms::owner_key(&pad_password(candidate), self.params.revision, self.key_len);

        let mut user_material = self.owner_string;
        if self.params.revision == 2 {
            crate::encryption::rc4::rc4_in_place(&key[..5], &mut user_material);
        } else {
            rev3_decrypt(&key[..self.key_len], &mut user_material);
        }
        self.workspace.set_padded(&user_material);

        if self.check_user() {
            self.user_password = user_material;
            true
        } else {
            false
        }
    }

    /// Owner candidate, user password known: the decrypted O string must
    /// equal the padded user password.
    ///
    /// PDF Spec: Algorithm 7
    #[inline]
    fn check_owner_given_user(&self, candidate: &[u8]) -> bool {
        let key = algorithms::owner_key(&pad_password(candidate), self.params.revision, self.key_len);
        if self.params.revision == 2 {
            rc4_matches(&key[..5], &self.owner_string, &self.user_password)
        } else {
            self.rev3_matches(&key[..self.key_len], &self.owner_string, &self.user_password)
        }
    }

    /// Undo the revision 3 chain on `ciphertext` and compare with `expected`.
    ///
    /// The partial run works on its own copy; the full run always starts
    /// again from the ciphertext.
    #[inline]
    fn rev3_matches(&self, key: &[u8], ciphertext: &[u8], expected: &[u8]) -> bool {
        debug_assert!(ciphertext.len() <= 32 && ciphertext.len() == expected.len());

        if self.partial_check {
            let mut head = [0u8; PARTIAL_TEST_SIZE];
            head.copy_from_slice(&ciphertext[..PARTIAL_TEST_SIZE]);
            rev3_decrypt(key, &mut head);
            if head != expected[..PARTIAL_TEST_SIZE] {
                return false;
            }
        }

        let mut full = [0u8; 32];
        let full = &mut full[..ciphertext.len()];
        full.copy_from_slice(ciphertext);
        rev3_decrypt(key, full);
        full == expected
    }

    /// Fold a worker clone of this session back in: its test count beyond
    /// `baseline` and, if this session has none yet, its hit.
    pub(crate) fn absorb(&mut self, worker: Session, baseline: u64) {
        self.stats.add(worker.stats.total_processed.saturating_sub(baseline));
        if self.found.is_none() && worker.found.is_some() {
            self.found = worker.found;
            self.user_password = worker.user_password;
            self.current = worker.current;
        }
    }

    /// Record `candidate` as the last one worked on without testing it.
    pub(crate) fn mark_current(&mut self, candidate: &[u8]) {
        let len = candidate.len().min(algorithms::MAX_PASSWORD_LEN);
        self.current.clear();
        self.current.extend_from_slice(&candidate[..len]);
    }

    /// Take a progress report and start a new reporting window.
    pub fn report_progress(&mut self) -> Progress {
        let (processed, window) = self.stats.take_window();
        Progress::new(processed, window, self.stats.total_processed, self.current.clone())
    }

    /// Snapshot the session for a later [`Session::restore_from`].
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::capture(self)
    }

    /// Finish the session. Consuming `self` releases the workspace and
    /// makes any further use a compile error.
    pub fn end(self) -> SessionSummary {
        let summary = SessionSummary {
            total_processed: self.stats.total_processed,
            elapsed: self.stats.elapsed(),
            found: self.found,
        };
        log::info!(
            "Session ended after {} candidates in {:.1}s",
            summary.total_processed,
            summary.elapsed.as_secs_f64()
        );
        summary
    }

    /// Active mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether a user password is known (supplied, empty, or restored).
    pub fn known_password(&self) -> bool {
        self.known_password
    }

    /// Whether candidates are treated as user passwords.
    pub fn working_as_user(&self) -> bool {
        self.working_as_user
    }

    /// Permutation strategy in use.
    pub fn permutation(&self) -> PermutationKind {
        self.permutation.kind()
    }

    /// Candidates tested since the last progress report.
    pub fn processed_count(&self) -> u64 {
        self.stats.processed
    }

    /// Candidates tested over the whole run.
    pub fn total_processed(&self) -> u64 {
        self.stats.total_processed
    }

    /// Elapsed time over the whole run.
    pub fn elapsed(&self) -> Duration {
        self.stats.elapsed()
    }

    /// Candidate most recently handed to [`Session::test`].
    pub fn current_candidate(&self) -> &[u8] {
        &self.current
    }

    /// Variant that matched, if any.
    pub fn found_password(&self) -> Option<&[u8]> {
        self.found.as_deref()
    }

    /// User password known to the session, without padding.
    ///
    /// Set when supplied, when the empty password works, or when owner
    /// recovery decrypted it from the O string.
    pub fn recovered_user_password(&self) -> Option<Vec<u8>> {
        if self.known_password || (self.mode == Mode::OwnerRecovery && self.found.is_some()) {
            Some(unpad_password(&self.user_password))
        } else {
            None
        }
    }

    /// Padded user password material, for checkpoints.
    pub(crate) fn padded_user_password(&self) -> Option<[u8; 32]> {
        let recovered = self.mode == Mode::OwnerRecovery && self.found.is_some();
        (self.known_password || recovered).then_some(self.user_password)
    }

    pub(crate) fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Parameter warnings found when the session began.
    pub fn warnings(&self) -> &[ParamWarning] {
        &self.warnings
    }

    /// Parameters this session works on.
    pub fn parameters(&self) -> &EncryptionParameters {
        &self.params
    }
}
