//! Git repository operations.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Format git accepts for `GIT_AUTHOR_DATE` / `GIT_COMMITTER_DATE`.
///
/// No offset is given, so git interprets it in the local timezone.
const GIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A git repository handle that provides common operations.
pub struct Git {
    root: PathBuf,
}

/// Author and committer timestamps of one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitDates {
    pub author: DateTime<FixedOffset>,
    pub committer: DateTime<FixedOffset>,
}

impl Git {
    /// Find the git repository containing the directory `start`.
    pub fn discover(start: &Path) -> Result<Self, Error> {
        let start_dir = if start.as_os_str().is_empty() {
            Path::new(".")
        } else {
            start
        };

        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(start_dir)
            .output()
            .map_err(|e| Error::Exec(format!("git rev-parse: {e}")))?;

        if !output.status.success() {
            return Err(Error::NotARepo(start_dir.display().to_string()));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Create a repository in `dir` (a no-op for an existing one) and open it.
    pub fn init(dir: &Path) -> Result<Self, Error> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Exec(format!("create {}: {e}", dir.display())))?;
        let output = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(dir)
            .output()
            .map_err(|e| Error::Exec(format!("git init: {e}")))?;
        check(&["init"], &output)?;
        Self::discover(dir)
    }

    /// Get the repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if a branch or ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", refname])
            .current_dir(&self.root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Stage a single path, relative to the repository root.
    pub fn stage(&self, path: &Path) -> Result<(), Error> {
        let path = path.to_string_lossy();
        self.run(&["add", "--", &path], &[])
    }

    /// Commit the index with author and committer dates forced to `when`,
    /// returning the short hash.
    pub fn commit_at(&self, message: &str, when: NaiveDateTime) -> Result<String, Error> {
        let date = when.format(GIT_DATE_FORMAT).to_string();
        let envs = [
            ("GIT_AUTHOR_DATE", date.as_str()),
            ("GIT_COMMITTER_DATE", date.as_str()),
        ];
        self.run(&["commit", "--quiet", "-m", message], &envs)?;
        self.head_short()
    }

    /// Push HEAD to `remote`, onto `branch` or the current branch.
    pub fn push(&self, remote: &str, branch: Option<&str>) -> Result<(), Error> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.current_branch()?,
        };
        let refspec = format!("HEAD:refs/heads/{branch}");
        self.run(&["push", remote, &refspec], &[])
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self) -> Result<String, Error> {
        let name = self.run_output(&["symbolic-ref", "--short", "HEAD"])?;
        Ok(name.trim().to_string())
    }

    /// Get the short hash of HEAD.
    pub fn head_short(&self) -> Result<String, Error> {
        let hash = self.run_output(&["rev-parse", "HEAD"])?;
        let hash = hash.trim();
        Ok(hash[..8.min(hash.len())].to_string())
    }

    /// Number of commits reachable from HEAD; zero on an unborn branch.
    pub fn commit_count(&self) -> Result<usize, Error> {
        if !self.ref_exists("HEAD") {
            return Ok(0);
        }
        let count = self.run_output(&["rev-list", "--count", "HEAD"])?;
        count
            .trim()
            .parse()
            .map_err(|_| Error::Output(format!("rev-list --count: {}", count.trim())))
    }

    /// Dates of the last `n` commits, newest first.
    pub fn commit_dates(&self, n: usize) -> Result<Vec<CommitDates>, Error> {
        if !self.ref_exists("HEAD") {
            return Ok(Vec::new());
        }
        let limit = format!("--max-count={n}");
        let log = self.run_output(&["log", &limit, "--format=%aI %cI"])?;
        log.lines()
            .map(|line| {
                let (author, committer) = line
                    .split_once(' ')
                    .ok_or_else(|| Error::Output(format!("git log: {line}")))?;
                Ok(CommitDates {
                    author: parse_iso(author)?,
                    committer: parse_iso(committer)?,
                })
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Run a git command that produces no output we care about.
    fn run(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<(), Error> {
        let output = Command::new("git")
            .args(args)
            .envs(envs.iter().copied())
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::Exec(format!("git {}: {e}", args.first().unwrap_or(&""))))?;
        check(args, &output)
    }

    /// Run a git command and capture its stdout.
    fn run_output(&self, args: &[&str]) -> Result<String, Error> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::Exec(format!("git {}: {e}", args.first().unwrap_or(&""))))?;
        check(args, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn check(args: &[&str], output: &Output) -> Result<(), Error> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("no output");
    Err(Error::Failed(format!("git {}: {detail}", args.join(" "))))
}

fn parse_iso(s: &str) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_rfc3339(s).map_err(|_| Error::Output(format!("bad date '{s}'")))
}

/// Errors from git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute: {0}")]
    Exec(String),

    #[error("not a git repository (searched from '{0}')")]
    NotARepo(String),

    #[error("{0}")]
    Failed(String),

    #[error("unexpected git output: {0}")]
    Output(String),
}
