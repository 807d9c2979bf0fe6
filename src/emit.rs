//! Backdated commit creation.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::debug;

use crate::git::{self, Git};
use crate::message::MessageProvider;
use crate::random::Randomness;

/// Time of day every commit is stamped with. Noon keeps the calendar date
/// stable across timezone conversions.
pub const COMMIT_TIME: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(time) => time,
    None => panic!("invalid commit time"),
};

/// Length of the random token written to the scratch file per commit.
const SCRATCH_TOKEN_LEN: usize = 32;

/// The version-control operations the emitter needs.
pub trait Backend {
    /// Repository root; the scratch path is relative to it.
    fn root(&self) -> &Path;

    /// Stage `path`, relative to the root.
    fn stage(&self, path: &Path) -> Result<(), git::Error>;

    /// Commit the index with author and committer dates set to `when`.
    fn commit(&self, message: &str, when: NaiveDateTime) -> Result<String, git::Error>;
}

impl Backend for Git {
    fn root(&self) -> &Path {
        Git::root(self)
    }

    fn stage(&self, path: &Path) -> Result<(), git::Error> {
        Git::stage(self, path)
    }

    fn commit(&self, message: &str, when: NaiveDateTime) -> Result<String, git::Error> {
        self.commit_at(message, when)
    }
}

/// Writes the scratch file and commits it, one commit at a time.
pub struct CommitEmitter<B, R> {
    backend: B,
    scratch: PathBuf,
    rng: R,
}

impl<B: Backend, R: Randomness> CommitEmitter<B, R> {
    /// `scratch` is relative to the backend's root.
    pub fn new(backend: B, scratch: impl Into<PathBuf>, rng: R) -> Self {
        Self {
            backend,
            scratch: scratch.into(),
            rng,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create `count` commits dated `date` at [`COMMIT_TIME`], returning
    /// their ids in order.
    ///
    /// Stops at the first failure; commits already made stay in history.
    pub fn commit_day<M: Randomness>(
        &mut self,
        date: NaiveDate,
        count: u32,
        messages: &mut MessageProvider<M>,
    ) -> Result<Vec<String>, EmitError> {
        let when = date.and_time(COMMIT_TIME);
        let mut ids = Vec::with_capacity(count as usize);
        for index in 0..count {
            self.touch_scratch(date, index)?;
            self.backend
                .stage(&self.scratch)
                .map_err(|source| EmitError::Git {
                    date,
                    committed: ids.len(),
                    source,
                })?;

            let message = messages.next_message();
            let id = self
                .backend
                .commit(&message, when)
                .map_err(|source| EmitError::Git {
                    date,
                    committed: ids.len(),
                    source,
                })?;
            debug!(%date, %id, %message, "created commit");
            ids.push(id);
        }
        Ok(ids)
    }

    fn touch_scratch(&mut self, date: NaiveDate, index: u32) -> Result<(), EmitError> {
        let path = self.backend.root().join(&self.scratch);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EmitError::Scratch {
                path: path.clone(),
                source: e,
            })?;
        }
        let content = format!("{date} #{index} {}\n", self.rng.token(SCRATCH_TOKEN_LEN));
        std::fs::write(&path, content).map_err(|e| EmitError::Scratch { path, source: e })
    }
}

/// Errors from emitting a day's commits.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write scratch file '{}'", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git failed on {date} after {committed} commit(s)")]
    Git {
        date: NaiveDate,
        committed: usize,
        #[source]
        source: git::Error,
    },
}

impl EmitError {
    /// Commits that were created for the failing day before the error.
    pub fn committed(&self) -> usize {
        match self {
            EmitError::Scratch { .. } => 0,
            EmitError::Git { committed, .. } => *committed,
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend for emitter and orchestrator tests.

    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use chrono::NaiveDateTime;

    use super::Backend;
    use crate::git;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FakeCommit {
        pub message: String,
        pub when: NaiveDateTime,
        pub content: String,
    }

    /// Records commits; fails the commit with the given 1-based ordinal.
    pub struct FakeBackend {
        pub root: PathBuf,
        pub staged: RefCell<Vec<PathBuf>>,
        pub commits: RefCell<Vec<FakeCommit>>,
        pub fail_at: Option<usize>,
    }

    impl FakeBackend {
        pub fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                staged: RefCell::new(Vec::new()),
                commits: RefCell::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    impl Backend for FakeBackend {
        fn root(&self) -> &Path {
            &self.root
        }

        fn stage(&self, path: &Path) -> Result<(), git::Error> {
            self.staged.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn commit(&self, message: &str, when: NaiveDateTime) -> Result<String, git::Error> {
            let mut commits = self.commits.borrow_mut();
            if self.fail_at == Some(commits.len() + 1) {
                return Err(git::Error::Failed("git commit: nothing to commit".into()));
            }
            let path = self.staged.borrow().last().cloned().unwrap_or_default();
            let content = std::fs::read_to_string(self.root.join(path)).unwrap_or_default();
            commits.push(FakeCommit {
                message: message.to_string(),
                when,
                content,
            });
            Ok(format!("{:08x}", commits.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::fake::FakeBackend;
    use super::*;
    use crate::message::MessagePool;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn commits_are_dated_at_noon() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter =
            CommitEmitter::new(FakeBackend::new(dir.path()), ".scratch", StdRng::seed_from_u64(1));
        let mut messages = MessageProvider::synthetic(StdRng::seed_from_u64(2));

        let ids = emitter
            .commit_day(date("2020-02-29"), 3, &mut messages)
            .unwrap();
        assert_eq!(ids.len(), 3);

        let commits = emitter.backend().commits.borrow();
        assert_eq!(commits.len(), 3);
        for commit in commits.iter() {
            assert_eq!(commit.when, date("2020-02-29").and_hms_opt(12, 0, 0).unwrap());
        }
        assert!(
            emitter
                .backend()
                .staged
                .borrow()
                .iter()
                .all(|p| p == Path::new(".scratch"))
        );
    }

    #[test]
    fn every_commit_changes_the_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = CommitEmitter::new(
            FakeBackend::new(dir.path()),
            "nested/dir/scratch.txt",
            StdRng::seed_from_u64(1),
        );
        let mut messages = MessageProvider::synthetic(StdRng::seed_from_u64(2));

        emitter
            .commit_day(date("2020-01-01"), 5, &mut messages)
            .unwrap();
        let contents: HashSet<String> = emitter
            .backend()
            .commits
            .borrow()
            .iter()
            .map(|c| c.content.clone())
            .collect();
        assert_eq!(contents.len(), 5);
        assert!(dir.path().join("nested/dir/scratch.txt").exists());
    }

    #[test]
    fn messages_come_from_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter =
            CommitEmitter::new(FakeBackend::new(dir.path()), ".scratch", StdRng::seed_from_u64(1));
        let pool = MessagePool::parse("alpha\nbeta\n", 1.0).unwrap();
        let mut messages = MessageProvider::pooled(pool, StdRng::seed_from_u64(2));

        emitter
            .commit_day(date("2020-01-01"), 2, &mut messages)
            .unwrap();
        let used: HashSet<String> = emitter
            .backend()
            .commits
            .borrow()
            .iter()
            .map(|c| c.message.clone())
            .collect();
        assert_eq!(used, HashSet::from(["alpha".to_string(), "beta".to_string()]));
    }

    #[test]
    fn zero_count_makes_no_commits() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter =
            CommitEmitter::new(FakeBackend::new(dir.path()), ".scratch", StdRng::seed_from_u64(1));
        let mut messages = MessageProvider::synthetic(StdRng::seed_from_u64(2));

        let ids = emitter
            .commit_day(date("2020-01-01"), 0, &mut messages)
            .unwrap();
        assert!(ids.is_empty());
        assert!(emitter.backend().commits.borrow().is_empty());
        assert!(!dir.path().join(".scratch").exists());
    }

    #[test]
    fn failure_aborts_rest_of_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(dir.path());
        backend.fail_at = Some(3);
        let mut emitter = CommitEmitter::new(backend, ".scratch", StdRng::seed_from_u64(1));
        let mut messages = MessageProvider::synthetic(StdRng::seed_from_u64(2));

        let err = emitter
            .commit_day(date("2020-01-01"), 5, &mut messages)
            .unwrap_err();
        assert!(matches!(err, EmitError::Git { committed: 2, .. }));
        assert_eq!(err.committed(), 2);
        assert_eq!(emitter.backend().commits.borrow().len(), 2);
    }
}
