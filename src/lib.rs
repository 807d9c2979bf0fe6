//! Backfill: give a git repository a plausible history of backdated commits.
//!
//! A config file describes a date range, how many commits an active day
//! gets, and which days to leave empty. Backfill plans every day up front and
//! then creates the commits, oldest first, each stamped at noon on its day.
//!
//! # Architecture
//!
//! - **Config**: Parse and validate the TOML run configuration
//! - **Schedule**: Classify each day as skipped (and why) or producing commits
//! - **Message**: Pick commit messages from a pool file or generate them
//! - **Emit**: Rewrite the scratch file and commit it with forced dates
//! - **Run**: Walk the schedule in date order and collect statistics

pub mod config;
pub mod emit;
pub mod git;
pub mod message;
pub mod random;
pub mod run;
pub mod schedule;
mod template;

pub use config::{Config, ConfigError, ConfigFile, Range};
pub use emit::{Backend, CommitEmitter, EmitError};
pub use git::Git;
pub use message::{MessagePool, MessageProvider, PoolError};
pub use random::Randomness;
pub use run::{LogProgress, ProgressSink, RunError, RunReport, RunStatistics, run};
pub use schedule::{Decision, MonthlySkips, Schedule, ScheduledDay, SkipReason};
pub use template::example_config;
