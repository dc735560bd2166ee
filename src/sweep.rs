//! Background retention for rotated backups.
//!
//! After every rotation the writer wakes a [`Sweeper`], which spawns at most one
//! worker thread at a time. The worker repeatedly plans a pass with
//! [`collect_sweep`], removes expired backups and compresses the rest, until a
//! pass finds nothing to do, a compression fails, or the writer asks it to stop.
//!
//! Sweeps only ever touch backups, never the active file, so they run without
//! holding the writer's lock.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use crate::backups::{list_backups, log_dir};
use crate::clock::Clock;
use crate::compressor::compress;
use crate::config::{ErrorHandler, RollingConfig};
use crate::stats::SweepStats;
use crate::{Error, Result};

/// Retention rules for the backups of one log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Path of the active log file whose backups are managed.
    pub path: PathBuf,

    /// Number of backups to keep (0 keeps all).
    pub max_backups: usize,

    /// Days to keep backups (0 keeps all).
    pub max_age_days: u32,

    /// Compress surviving backups.
    pub compress: bool,

    /// Clock the age cutoff is computed in.
    pub clock: Clock,
}

impl RetentionPolicy {
    pub fn from_config(config: &RollingConfig) -> Self {
        Self {
            path: config.path.clone(),
            max_backups: config.max_backups,
            max_age_days: config.max_age_days,
            compress: config.compress,
            clock: Clock::new(config.local_time),
        }
    }

    /// Whether any rule is enabled. Without one, sweeps never run.
    pub fn is_active(&self) -> bool {
        self.max_backups > 0 || self.max_age_days > 0 || self.compress
    }
}

/// Work for one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    /// Backups to delete, newest first.
    pub remove: Vec<PathBuf>,

    /// Backups to compress, newest first.
    pub compress: Vec<PathBuf>,
}

impl SweepPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.compress.is_empty()
    }
}

/// Plan one sweep pass from the current contents of the log directory.
///
/// Backups older than the age limit are removed first, then the oldest
/// backups beyond the count limit. If compression is enabled, every surviving
/// backup without the compressed suffix is scheduled for compression.
pub fn collect_sweep(policy: &RetentionPolicy) -> Result<SweepPlan> {
    let mut backups = list_backups(&policy.path)?;
    let dir = log_dir(&policy.path);
    let mut plan = SweepPlan::default();

    // Backups are sorted newest first, so expired ones sit at the tail.
    // A cutoff before the earliest representable date expires nothing.
    let cutoff = match policy.max_age_days {
        0 => None,
        days => policy
            .clock
            .now()
            .checked_sub(time::Duration::days(i64::from(days))),
    };
    if let Some(cutoff) = cutoff {
        while let Some(oldest) = backups.last() {
            if oldest.timestamp >= cutoff {
                break;
            }
            plan.remove.push(dir.join(&oldest.name));
            backups.pop();
        }
    }

    if policy.max_backups > 0 {
        while backups.len() > policy.max_backups {
            if let Some(oldest) = backups.pop() {
                plan.remove.push(dir.join(&oldest.name));
            }
        }
    }

    if policy.compress {
        plan.compress = backups
            .iter()
            .filter(|backup| !backup.is_compressed())
            .map(|backup| dir.join(&backup.name))
            .collect();
    }

    Ok(plan)
}

/// Run sweep passes until there is nothing left to do.
///
/// A failed removal is reported and skipped. A failed compression is reported
/// and ends the run; it will be retried after the next rotation.
pub fn run_sweep(
    policy: &RetentionPolicy,
    on_error: &dyn Fn(&Error),
    shutdown: &AtomicBool,
) -> SweepStats {
    let start = Instant::now();
    let mut stats = SweepStats::new();

    let report = |stats: &mut SweepStats, err: Error| {
        log::debug!("sweep of {} failed: {err}", policy.path.display());
        stats.record_error();
        on_error(&err);
    };

    'passes: loop {
        if shutdown.load(Ordering::Acquire) {
            stats.interrupted = true;
            break;
        }
        stats.passes += 1;

        let plan = match collect_sweep(policy) {
            Ok(plan) if plan.is_empty() => break,
            Ok(plan) => plan,
            Err(err) => {
                report(&mut stats, err);
                break;
            }
        };

        let mut progressed = false;
        for path in &plan.remove {
            match fs::remove_file(path) {
                Ok(()) => {
                    log::debug!("removed backup {}", path.display());
                    stats.record_removal();
                    progressed = true;
                }
                Err(err) => report(&mut stats, Error::io("remove", path, err)),
            }
        }

        for path in &plan.compress {
            if shutdown.load(Ordering::Acquire) {
                stats.interrupted = true;
                break 'passes;
            }
            if let Err(err) = compress(path) {
                report(&mut stats, err);
                break 'passes;
            }
            log::debug!("compressed backup {}", path.display());
            stats.record_compression();
            progressed = true;
        }

        // Every removal failed; another pass would fail the same way.
        if !progressed {
            break;
        }
    }

    stats.duration = start.elapsed();
    stats
}

struct Shared {
    running: Mutex<bool>,
    idle: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn running(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self) {
        *self.running() = false;
        self.idle.notify_all();
    }
}

/// Clears the running flag when the worker exits, even by panic.
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Launches background sweeps for one writer, one at a time.
pub(crate) struct Sweeper {
    policy: RetentionPolicy,
    on_error: ErrorHandler,
    shared: Arc<Shared>,
}

impl Sweeper {
    pub(crate) fn new(policy: RetentionPolicy, on_error: ErrorHandler) -> Self {
        Self {
            policy,
            on_error,
            shared: Arc::new(Shared {
                running: Mutex::new(false),
                idle: Condvar::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Start a sweep unless one is already running or no rule is enabled.
    ///
    /// A running sweep re-reads the directory before it stops, so it picks up
    /// the backup that caused this trigger.
    pub(crate) fn trigger(&self) {
        if !self.policy.is_active() {
            return;
        }

        {
            let mut running = self.shared.running();
            if *running {
                return;
            }
            *running = true;
        }

        let policy = self.policy.clone();
        let on_error = Arc::clone(&self.on_error);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("logroll-sweep".to_string())
            .spawn(move || {
                let guard = RunningGuard(shared);
                let stats = run_sweep(&policy, &*on_error, &guard.0.shutdown);
                log::debug!("sweep of {} done. {}", policy.path.display(), stats.summary());
            });

        if let Err(err) = spawned {
            self.shared.finish();
            (self.on_error)(&Error::io("spawn sweep for", &self.policy.path, err));
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.shared.running()
    }

    /// Block until no sweep is running.
    pub(crate) fn wait_idle(&self) {
        let mut running = self.shared.running();
        while *running {
            running = self
                .shared
                .idle
                .wait(running)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Ask a running sweep to stop at its next checkpoint and wait for it.
    pub(crate) fn shutdown(&self) {
        if !self.is_running() {
            return;
        }
        self.shared.shutdown.store(true, Ordering::Release);
        self.wait_idle();
        self.shared.shutdown.store(false, Ordering::Release);
    }
}
