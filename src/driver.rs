//! Search loop.
//!
//! Pulls candidates from a [`CandidateSupplier`], hands them to a
//! [`Session`], reports progress and writes checkpoints on the configured
//! cadence. With the `parallel` feature and more than one worker, candidates
//! are tested in batches on a rayon pool where every worker owns a clone of
//! the session.

use std::time::{Duration, Instant};

use crate::candidates::CandidateSupplier;
use crate::config::CrackConfig;
use crate::encryption::EncryptionParameters;
use crate::engine::{Checkpoint, Mode, Session};
use crate::error::Result;

/// Clock reads happen once per this many candidates.
const TICK_EVERY: u64 = 1024;

/// Outcome of one search phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    /// Mode the phase ran in
    pub mode: Mode,
    /// Matching candidate, if any
    pub found: Option<Vec<u8>>,
    /// User password known at the end of the phase
    pub user_password: Option<Vec<u8>>,
    /// Candidates tested
    pub total_processed: u64,
    /// Wall time
    pub elapsed: Duration,
}

/// Outcome of [`recover`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecoveryReport {
    /// Owner phase, unless the run worked as user only
    pub owner: Option<PhaseReport>,
    /// User phase, if one ran
    pub user: Option<PhaseReport>,
}

impl RecoveryReport {
    /// Recovered owner password.
    pub fn owner_password(&self) -> Option<&[u8]> {
        self.owner.as_ref()?.found.as_deref()
    }

    /// Recovered or known user password.
    pub fn user_password(&self) -> Option<&[u8]> {
        if let Some(found) = self.user.as_ref().and_then(|p| p.found.as_deref()) {
            return Some(found);
        }
        self.owner.as_ref()?.user_password.as_deref()
    }
}

struct Ticker {
    progress_interval: Duration,
    checkpoint_interval: Duration,
    last_progress: Instant,
    last_checkpoint: Instant,
}

impl Ticker {
    fn new(config: &CrackConfig) -> Self {
        let now = Instant::now();
        Self {
            progress_interval: config.progress_interval,
            checkpoint_interval: config.checkpoint_interval,
            last_progress: now,
            last_checkpoint: now,
        }
    }

    fn tick(&mut self, session: &mut Session, config: &CrackConfig) -> Result<()> {
        let now = Instant::now();
        if now.duration_since(self.last_progress) >= self.progress_interval {
            log::info!("{}", session.report_progress());
            self.last_progress = now;
        }
        if let Some(path) = &config.checkpoint_path {
            if now.duration_since(self.last_checkpoint) >= self.checkpoint_interval {
                session.checkpoint().save(path)?;
                self.last_checkpoint = now;
            }
        }
        Ok(())
    }
}

/// Run `session` over the candidates of `supplier` until a match or until
/// the supply runs out.
///
/// A session restored from a checkpoint that already holds a confirmed
/// password returns it without testing anything. So does a session whose
/// user password is already established; the report then carries that
/// password as found.
pub fn run(
    mut session: Session,
    supplier: &mut dyn CandidateSupplier,
    config: &CrackConfig,
) -> Result<PhaseReport> {
    if !session.mode().is_search() {
        log::info!("User password already established, nothing to search");
    } else if session.found_password().is_none() {
        log::debug!("Searching in mode: {}", session.mode());
        if config.workers == 1 {
            run_sequential(&mut session, supplier, config)?;
        } else {
            run_batched(&mut session, supplier, config)?;
        }
        if let Some(path) = &config.checkpoint_path {
            session.checkpoint().save(path)?;
        }
    } else {
        log::info!("Checkpoint already holds the password, nothing to search");
    }

    let mode = session.mode();
    let user_password = session.recovered_user_password();
    let summary = session.end();
    let found = match summary.found {
        Some(found) => Some(found),
        None if !mode.is_search() => user_password.clone(),
        None => None,
    };
    Ok(PhaseReport {
        mode,
        found,
        user_password,
        total_processed: summary.total_processed,
        elapsed: summary.elapsed,
    })
}

fn run_sequential(
    session: &mut Session,
    supplier: &mut dyn CandidateSupplier,
    config: &CrackConfig,
) -> Result<()> {
    let mut ticker = Ticker::new(config);
    let mut buf = Vec::with_capacity(64);
    let mut since_tick = 0u64;

    while supplier.next_into(&mut buf)? {
        if session.test(&buf) {
            return Ok(());
        }
        since_tick += 1;
        if since_tick == TICK_EVERY {
            since_tick = 0;
            ticker.tick(session, config)?;
        }
    }
    Ok(())
}

fn fill_batch(
    supplier: &mut dyn CandidateSupplier,
    batch: &mut Vec<Vec<u8>>,
    size: usize,
) -> Result<()> {
    batch.clear();
    let mut buf = Vec::new();
    while batch.len() < size && supplier.next_into(&mut buf)? {
        batch.push(std::mem::take(&mut buf));
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn run_batched(
    session: &mut Session,
    supplier: &mut dyn CandidateSupplier,
    config: &CrackConfig,
) -> Result<()> {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut builder = rayon::ThreadPoolBuilder::new();
    if config.workers > 0 {
        builder = builder.num_threads(config.workers);
    }
    let pool = match builder.build() {
        Ok(pool) => pool,
        Err(e) => {
            log::warn!("Could not start worker pool ({}), searching on one thread", e);
            return run_sequential(session, supplier, config);
        },
    };
    log::debug!("Searching with {} workers", pool.current_num_threads());

    let mut ticker = Ticker::new(config);
    let mut batch = Vec::with_capacity(config.batch_size);
    let chunk = (config.batch_size / pool.current_num_threads()).max(1);

    loop {
        fill_batch(supplier, &mut batch, config.batch_size)?;
        let Some(last) = batch.last() else {
            return Ok(());
        };

        let stop = AtomicBool::new(false);
        let base: &Session = session;
        let baseline = base.total_processed();
        let workers: Vec<Session> = pool.install(|| {
            batch
                .par_chunks(chunk)
                .map(|candidates| {
                    let mut worker = base.clone();
                    for candidate in candidates {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        if worker.test(candidate) {
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                    worker
                })
                .collect()
        });

        session.mark_current(last);
        for worker in workers {
            session.absorb(worker, baseline);
        }
        if session.found_password().is_some() {
            return Ok(());
        }
        ticker.tick(session, config)?;
    }
}

#[cfg(not(feature = "parallel"))]
fn run_batched(
    session: &mut Session,
    supplier: &mut dyn CandidateSupplier,
    config: &CrackConfig,
) -> Result<()> {
    log::warn!("Built without the `parallel` feature, searching on one thread");
    run_sequential(session, supplier, config)
}

/// Recover passwords for `params`.
///
/// Unless the run works as user, the owner password is searched first. An
/// owner hit also yields the user password. When the owner phase finds
/// nothing and `config.user_fallback` is set, the user password is searched
/// over a fresh supply from `make_supplier`.
pub fn recover<F>(
    params: &EncryptionParameters,
    config: &CrackConfig,
    mut make_supplier: F,
) -> Result<RecoveryReport>
where
    F: FnMut() -> Result<Box<dyn CandidateSupplier>>,
{
    let mut report = RecoveryReport::default();

    if !config.working_as_user {
        let session = Session::from_config(params, config)?;
        let phase = run(session, make_supplier()?.as_mut(), config)?;
        let done =
            phase.found.is_some() || phase.user_password.is_some() || !config.user_fallback;
        report.owner = Some(phase);
        if done {
            return Ok(report);
        }
        log::info!("Owner password not found, searching the user password");
    }

    let user_config = config.clone().with_working_as_user(true);
    let session = Session::from_config(params, &user_config)?;
    report.user = Some(run(session, make_supplier()?.as_mut(), &user_config)?);
    Ok(report)
}

/// Continue the search recorded in `checkpoint`.
pub fn resume(
    params: &EncryptionParameters,
    checkpoint: &Checkpoint,
    supplier: &mut dyn CandidateSupplier,
    config: &CrackConfig,
) -> Result<PhaseReport> {
    let session = Session::restore_from(params, checkpoint)?;
    if session.mode().is_search() && session.found_password().is_none() {
        supplier.resume_at(&checkpoint.current_candidate)?;
    }
    run(session, supplier, config)
}
