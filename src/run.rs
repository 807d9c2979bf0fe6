//! Drive a [`Schedule`] through the commit emitter.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::emit::{Backend, CommitEmitter, EmitError};
use crate::message::MessageProvider;
use crate::random::Randomness;
use crate::schedule::{Decision, Schedule, SkipReason};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub days_processed: u64,
    pub active_days: u64,
    pub total_commits: u64,
    pub skipped_days: u64,
    pub fixed_skips: u64,
    pub weekday_skips: u64,
    pub monthly_skips: u64,
}

impl RunStatistics {
    /// Count one processed day.
    pub fn record(&mut self, decision: Decision) {
        self.days_processed += 1;
        match decision {
            Decision::Produce(count) => {
                self.active_days += 1;
                self.total_commits += u64::from(count);
            }
            Decision::Skip(reason) => {
                self.skipped_days += 1;
                match reason {
                    SkipReason::Fixed => self.fixed_skips += 1,
                    SkipReason::WeekdayChance => self.weekday_skips += 1,
                    SkipReason::MonthlyQuota => self.monthly_skips += 1,
                }
            }
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Days processed:   {}", self.days_processed)?;
        writeln!(f, "Active days:      {}", self.active_days)?;
        writeln!(f, "Commits created:  {}", self.total_commits)?;
        writeln!(f, "Days skipped:     {}", self.skipped_days)?;
        writeln!(f, "  fixed date:     {}", self.fixed_skips)?;
        writeln!(f, "  weekday chance: {}", self.weekday_skips)?;
        write!(f, "  monthly quota:  {}", self.monthly_skips)
    }
}

/// Receives a notification after every processed day.
pub trait ProgressSink {
    /// `index` is 0-based; `total` is the number of days in the schedule.
    fn on_day_processed(&mut self, date: NaiveDate, index: usize, total: usize);
}

impl<F: FnMut(NaiveDate, usize, usize)> ProgressSink for F {
    fn on_day_processed(&mut self, date: NaiveDate, index: usize, total: usize) {
        self(date, index, total)
    }
}

/// Progress sink that logs each day through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_day_processed(&mut self, date: NaiveDate, index: usize, total: usize) {
        let done = index + 1;
        let percent = done as f64 * 100.0 / total.max(1) as f64;
        info!(%date, "day {done}/{total} ({percent:.1}%)");
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub stats: RunStatistics,
    /// Set when the interrupt flag stopped the run early.
    pub interrupted: bool,
}

/// Process every day of `schedule` in date order.
///
/// `interrupt` is checked before each day; once set, the run stops without
/// touching further days. A failing day aborts the run, and the error carries
/// the statistics of the days completed before it.
pub fn run<B, R, M>(
    schedule: &Schedule,
    emitter: &mut CommitEmitter<B, R>,
    messages: &mut MessageProvider<M>,
    progress: &mut impl ProgressSink,
    interrupt: &AtomicBool,
) -> Result<RunReport, RunError>
where
    B: Backend,
    R: Randomness,
    M: Randomness,
{
    let total = schedule.len();
    let mut stats = RunStatistics::default();

    for (index, day) in schedule.days().iter().enumerate() {
        if interrupt.load(Ordering::SeqCst) {
            warn!(date = %day.date, "interrupted, stopping before this day");
            return Ok(RunReport {
                stats,
                interrupted: true,
            });
        }

        match day.decision {
            Decision::Produce(count) => {
                emitter
                    .commit_day(day.date, count, messages)
                    .map_err(|source| {
                        let mut stats = stats;
                        stats.total_commits += source.committed() as u64;
                        RunError {
                            date: day.date,
                            stats,
                            source,
                        }
                    })?;
                debug!(date = %day.date, commits = count, "committed");
            }
            Decision::Skip(reason) => {
                debug!(date = %day.date, %reason, "skipped");
            }
        }
        stats.record(day.decision);
        progress.on_day_processed(day.date, index, total);
    }

    Ok(RunReport {
        stats,
        interrupted: false,
    })
}

/// A run aborted by a failing day.
#[derive(Debug, Error)]
#[error("run aborted on {date}")]
pub struct RunError {
    pub date: NaiveDate,
    /// Statistics of the days completed before `date`, plus the commits
    /// `date` made before failing in `total_commits`.
    pub stats: RunStatistics,
    #[source]
    pub source: EmitError,
}
