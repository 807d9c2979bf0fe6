//! Day scheduling.
//!
//! A [`Schedule`] expands the configured date range into one
//! [`ScheduledDay`] per calendar date and decides, for each, whether it gets
//! commits or is skipped. Skip rules are checked in the order listed in
//! [`SKIP_RULES`]; the first one that matches wins.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::config::Config;
use crate::random::Randomness;
use crate::run::RunStatistics;

/// Why a day gets no commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The date is listed in the config's fixed skip dates.
    Fixed,
    /// The weekday's skip chance came up.
    WeekdayChance,
    /// The date was picked for its month's skip quota.
    MonthlyQuota,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Fixed => write!(f, "fixed date"),
            SkipReason::WeekdayChance => write!(f, "weekday chance"),
            SkipReason::MonthlyQuota => write!(f, "monthly quota"),
        }
    }
}

/// What happens on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    /// Create this many commits. Zero is allowed and still counts as active.
    Produce(u32),
}

/// A calendar date and its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledDay {
    pub date: NaiveDate,
    pub decision: Decision,
}

/// Skip rules, highest priority first.
pub const SKIP_RULES: [SkipReason; 3] = [
    SkipReason::Fixed,
    SkipReason::WeekdayChance,
    SkipReason::MonthlyQuota,
];

/// Dates pre-selected for each month's skip quota.
///
/// Computed once, before any day is classified, so every month's quota is
/// fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlySkips {
    dates: BTreeSet<NaiveDate>,
}

impl MonthlySkips {
    /// Sample each month's quota from all days of that calendar month, for
    /// every month touched by `config.start..=config.end`.
    ///
    /// The sampled count is clamped to the month's length. Picks that fall
    /// outside the range are dropped, so a month the range only partly
    /// covers loses proportionally fewer days.
    pub fn select(config: &Config, rng: &mut impl Randomness) -> Self {
        let months: BTreeSet<NaiveDate> = days(config.start, config.end)
            .filter_map(|date| date.with_day(1))
            .collect();

        let mut dates = BTreeSet::new();
        for first in months {
            let month_days: Vec<NaiveDate> = first
                .iter_days()
                .take_while(|d| d.month() == first.month())
                .collect();
            let quota = rng.uniform_int(config.monthly_skips.min, config.monthly_skips.max);
            let quota = (quota as usize).min(month_days.len());
            dates.extend(
                rng.sample_without_replacement(&month_days, quota)
                    .into_iter()
                    .filter(|d| (config.start..=config.end).contains(d)),
            );
        }
        Self { dates }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of pre-selected dates in the given month.
    pub fn in_month(&self, year: i32, month: u32) -> usize {
        self.dates
            .iter()
            .filter(|d| d.year() == year && d.month() == month)
            .count()
    }
}

/// Every date from `start` to `end` inclusive, ascending.
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Inputs to classifying one day.
pub struct Classifier<'a> {
    config: &'a Config,
    monthly: &'a MonthlySkips,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a Config, monthly: &'a MonthlySkips) -> Self {
        Self { config, monthly }
    }

    /// Decide what happens on `date`.
    pub fn classify(&self, date: NaiveDate, rng: &mut impl Randomness) -> Decision {
        for rule in SKIP_RULES {
            if self.applies(rule, date, rng) {
                return Decision::Skip(rule);
            }
        }
        let commits = self.config.commits;
        Decision::Produce(rng.uniform_int(commits.min, commits.max))
    }

    fn applies(&self, rule: SkipReason, date: NaiveDate, rng: &mut impl Randomness) -> bool {
        match rule {
            SkipReason::Fixed => self.config.fixed_skips.contains(&date),
            SkipReason::WeekdayChance => {
                rng.uniform_int(1, 100) <= u32::from(self.config.skip_chance(date))
            }
            SkipReason::MonthlyQuota => self.monthly.contains(date),
        }
    }
}

/// The full, ordered plan for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    days: Vec<ScheduledDay>,
}

impl Schedule {
    /// Classify every day of the configured range.
    pub fn plan(config: &Config, rng: &mut impl Randomness) -> Self {
        let monthly = MonthlySkips::select(config, rng);
        Self::plan_with(config, &monthly, rng)
    }

    /// Classify every day against an already selected monthly quota.
    pub fn plan_with(config: &Config, monthly: &MonthlySkips, rng: &mut impl Randomness) -> Self {
        let classifier = Classifier::new(config, monthly);
        let days = days(config.start, config.end)
            .map(|date| ScheduledDay {
                date,
                decision: classifier.classify(date, rng),
            })
            .collect();
        Self { days }
    }

    pub fn days(&self) -> &[ScheduledDay] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The statistics a run of this schedule would produce if every commit
    /// succeeded.
    pub fn predicted_statistics(&self) -> RunStatistics {
        let mut stats = RunStatistics::default();
        for day in &self.days {
            stats.record(day.decision);
        }
        stats
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a ScheduledDay;
    type IntoIter = std::slice::Iter<'a, ScheduledDay>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.iter()
    }
}
