//! Run configuration.
//!
//! The config is a TOML file. It is parsed into [`ConfigFile`], which mirrors
//! the file layout, and then validated into [`Config`]. Nothing downstream of
//! [`Config`] re-checks ranges: once validated, scheduling and message
//! selection cannot fail.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use thiserror::Error;

/// Scratch file written by every commit when the config names none.
pub const DEFAULT_SCRATCH_FILE: &str = ".backfill";

/// The raw config file, as written by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub dates: DatesSection,

    #[serde(default)]
    pub commits: Range,

    #[serde(default)]
    pub skip: SkipSection,

    #[serde(default)]
    pub messages: MessagesSection,

    #[serde(default)]
    pub repo: RepoSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatesSection {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive `min..=max` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Default for Range {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipSection {
    /// Days to skip per calendar month
    #[serde(default = "zero_range")]
    pub monthly: Range,

    /// Dates that never get commits
    #[serde(default)]
    pub dates: Vec<NaiveDate>,

    /// Weekday name to skip percentage
    #[serde(default)]
    pub weekdays: BTreeMap<String, u8>,
}

impl Default for SkipSection {
    fn default() -> Self {
        Self {
            monthly: zero_range(),
            dates: Vec::new(),
            weekdays: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesSection {
    /// Newline-delimited message pool; synthetic messages when absent
    #[serde(default)]
    pub source: Option<PathBuf>,

    #[serde(default = "full_uniqueness")]
    pub uniqueness: f64,
}

impl Default for MessagesSection {
    fn default() -> Self {
        Self {
            source: None,
            uniqueness: full_uniqueness(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSection {
    /// Path of the scratch file, relative to the repository root
    #[serde(default = "default_scratch_file")]
    pub scratch_file: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch to push; the current branch when absent
    #[serde(default)]
    pub branch: Option<String>,
}

impl Default for RepoSection {
    fn default() -> Self {
        Self {
            scratch_file: default_scratch_file(),
            remote: default_remote(),
            branch: None,
        }
    }
}

fn zero_range() -> Range {
    Range { min: 0, max: 0 }
}

fn full_uniqueness() -> f64 {
    1.0
}

fn default_scratch_file() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_FILE)
}

fn default_remote() -> String {
    "origin".to_string()
}

/// A validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub commits: Range,
    pub monthly_skips: Range,
    pub fixed_skips: BTreeSet<NaiveDate>,
    /// Skip percentage per weekday, indexed by `num_days_from_monday`
    pub weekday_skip_chance: [u8; 7],
    pub message_source: Option<PathBuf>,
    pub uniqueness: f64,
    pub scratch_file: PathBuf,
    pub remote: String,
    pub branch: Option<String>,
}

impl Config {
    /// A config for `start..=end` with every other field at its default.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            commits: Range::default(),
            monthly_skips: zero_range(),
            fixed_skips: BTreeSet::new(),
            weekday_skip_chance: [0; 7],
            message_source: None,
            uniqueness: full_uniqueness(),
            scratch_file: default_scratch_file(),
            remote: default_remote(),
            branch: None,
        }
    }

    /// Read, parse and validate a config file.
    ///
    /// A relative message source is resolved against the directory holding
    /// the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let file = ConfigFile::from_toml(&content)?;
        let base = path.parent().unwrap_or(Path::new(""));
        let mut config = file.validate()?;
        if let Some(source) = &config.message_source {
            if source.is_relative() {
                config.message_source = Some(base.join(source));
            }
        }
        Ok(config)
    }

    /// Skip percentage for the weekday `date` falls on.
    pub fn skip_chance(&self, date: NaiveDate) -> u8 {
        self.weekday_skip_chance[date.weekday().num_days_from_monday() as usize]
    }

    /// Check every invariant the scheduler and message provider rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::DateRange {
                start: self.start,
                end: self.end,
            });
        }
        check_range("commits", self.commits)?;
        check_range("skip.monthly", self.monthly_skips)?;
        for (day, chance) in self.weekday_skip_chance.iter().enumerate() {
            if *chance > 100 {
                return Err(ConfigError::Chance {
                    weekday: weekday_from_index(day).to_string(),
                    chance: *chance,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.uniqueness) {
            return Err(ConfigError::Uniqueness(self.uniqueness));
        }
        let escapes = self
            .scratch_file
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || self.scratch_file.as_os_str().is_empty() {
            return Err(ConfigError::ScratchFile(
                self.scratch_file.display().to_string(),
            ));
        }
        Ok(())
    }
}

impl ConfigFile {
    /// Parse a config file from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Turn the raw file into a validated [`Config`].
    pub fn validate(self) -> Result<Config, ConfigError> {
        let mut weekday_skip_chance = [0u8; 7];
        let mut seen = [false; 7];
        for (name, chance) in &self.skip.weekdays {
            let weekday: Weekday = name
                .parse()
                .map_err(|_| ConfigError::Weekday(name.clone()))?;
            let index = weekday.num_days_from_monday() as usize;
            if std::mem::replace(&mut seen[index], true) {
                return Err(ConfigError::Weekday(name.clone()));
            }
            weekday_skip_chance[index] = *chance;
        }

        let config = Config {
            start: self.dates.start,
            end: self.dates.end,
            commits: self.commits,
            monthly_skips: self.skip.monthly,
            fixed_skips: self.skip.dates.into_iter().collect(),
            weekday_skip_chance,
            message_source: self.messages.source,
            uniqueness: self.messages.uniqueness,
            scratch_file: self.repo.scratch_file,
            remote: self.repo.remote,
            branch: self.repo.branch,
        };
        config.validate()?;
        Ok(config)
    }
}

fn check_range(field: &'static str, range: Range) -> Result<(), ConfigError> {
    if range.min > range.max {
        return Err(ConfigError::Range {
            field,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

fn weekday_from_index(index: usize) -> Weekday {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ][index % 7]
}

/// Errors from loading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),

    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("{field}: min ({min}) is greater than max ({max})")]
    Range {
        field: &'static str,
        min: u32,
        max: u32,
    },

    #[error("unknown or repeated weekday '{0}'")]
    Weekday(String),

    #[error("skip chance for {weekday} is {chance}%, must be at most 100")]
    Chance { weekday: String, chance: u8 },

    #[error("uniqueness must be between 0 and 1, got {0}")]
    Uniqueness(f64),

    #[error("scratch file '{0}' must be a relative path inside the repository")]
    ScratchFile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[dates]
start = "2020-01-01"
end = "2020-03-31"

[commits]
min = 0
max = 5

[skip]
monthly = { min = 1, max = 4 }
dates = ["2020-01-03", "2020-02-14"]

[skip.weekdays]
Saturday = 60
sun = 100

[messages]
source = "messages.txt"
uniqueness = 0.5

[repo]
scratch_file = "notes/scratch.txt"
remote = "upstream"
branch = "main"
"#;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn parse_full_config() {
        let config = ConfigFile::from_toml(FULL).unwrap().validate().unwrap();
        assert_eq!(config.start, date("2020-01-01"));
        assert_eq!(config.end, date("2020-03-31"));
        assert_eq!(config.commits, Range { min: 0, max: 5 });
        assert_eq!(config.monthly_skips, Range { min: 1, max: 4 });
        assert!(config.fixed_skips.contains(&date("2020-02-14")));
        assert_eq!(config.weekday_skip_chance, [0, 0, 0, 0, 0, 60, 100]);
        assert_eq!(config.message_source, Some(PathBuf::from("messages.txt")));
        assert_eq!(config.uniqueness, 0.5);
        assert_eq!(config.scratch_file, PathBuf::from("notes/scratch.txt"));
        assert_eq!(config.remote, "upstream");
        assert_eq!(config.branch.as_deref(), Some("main"));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let toml = "[dates]\nstart = \"2021-05-01\"\nend = \"2021-05-01\"\n";
        let config = ConfigFile::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(config, Config::new(date("2021-05-01"), date("2021-05-01")));
    }

    #[test]
    fn skip_chance_follows_weekday() {
        let config = ConfigFile::from_toml(FULL).unwrap().validate().unwrap();
        // 2020-01-04 is a Saturday, 2020-01-05 a Sunday, 2020-01-06 a Monday.
        assert_eq!(config.skip_chance(date("2020-01-04")), 60);
        assert_eq!(config.skip_chance(date("2020-01-05")), 100);
        assert_eq!(config.skip_chance(date("2020-01-06")), 0);
    }

    #[test]
    fn rejects_inverted_dates() {
        let mut config = Config::new(date("2020-02-01"), date("2020-01-01"));
        assert!(matches!(config.validate(), Err(ConfigError::DateRange { .. })));
        config.end = config.start;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let mut config = Config::new(date("2020-01-01"), date("2020-01-02"));
        config.commits = Range { min: 4, max: 2 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Range { field: "commits", .. })
        ));

        config.commits = Range { min: 0, max: 0 };
        config.monthly_skips = Range { min: 3, max: 1 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Range { field: "skip.monthly", .. })
        ));
    }

    #[test]
    fn rejects_bad_weekday_entries() {
        let toml = "[dates]\nstart = \"2020-01-01\"\nend = \"2020-01-02\"\n\
                    [skip.weekdays]\nfunday = 10\n";
        let err = ConfigFile::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Weekday(name) if name == "funday"));

        let mut config = Config::new(date("2020-01-01"), date("2020-01-02"));
        config.weekday_skip_chance[2] = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Chance { chance: 101, .. })
        ));
    }

    #[test]
    fn rejects_weekday_listed_twice() {
        let toml = "[dates]\nstart = \"2020-01-01\"\nend = \"2020-01-02\"\n\
                    [skip.weekdays]\nsat = 10\nsaturday = 90\n";
        let err = ConfigFile::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Weekday(_)));
    }

    #[test]
    fn rejects_uniqueness_out_of_bounds() {
        let mut config = Config::new(date("2020-01-01"), date("2020-01-02"));
        for bad in [-0.1, 1.01, f64::NAN] {
            config.uniqueness = bad;
            assert!(matches!(config.validate(), Err(ConfigError::Uniqueness(_))));
        }
        config.uniqueness = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_scratch_file_outside_repo() {
        let mut config = Config::new(date("2020-01-01"), date("2020-01-02"));
        for bad in ["../outside", "/etc/passwd", ""] {
            config.scratch_file = PathBuf::from(bad);
            assert!(
                matches!(config.validate(), Err(ConfigError::ScratchFile(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn rejects_unknown_keys() {
        let toml = "[dates]\nstart = \"2020-01-01\"\nend = \"2020-01-02\"\nfinish = \"x\"\n";
        assert!(ConfigFile::from_toml(toml).is_err());
    }

    #[test]
    fn load_resolves_message_source_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backfill.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.message_source, Some(dir.path().join("messages.txt")));
    }
}
