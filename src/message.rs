//! Commit messages.
//!
//! Messages come either from a pool file (one message per non-blank line) or,
//! when no pool is configured, from a synthetic generator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::random::Randomness;

/// Conventional-commit prefixes used for synthetic messages.
const SYNTHETIC_PREFIXES: [&str; 5] = ["chore", "docs", "refactor", "fix", "style"];

/// Length of the random token in a synthetic message.
const SYNTHETIC_TOKEN_LEN: usize = 8;

/// Messages read from a pool file, with rotation state.
///
/// Each draw picks uniformly among the messages not yet used in the current
/// rotation. The rotation resets when every message has been used, or early
/// when a uniform draw exceeds `uniqueness`: with `uniqueness = 1.0` no
/// message repeats before the whole pool is used, with `0.0` almost every
/// draw is from the full pool again.
#[derive(Debug, Clone)]
pub struct MessagePool {
    messages: Vec<String>,
    used: HashSet<usize>,
    uniqueness: f64,
}

impl MessagePool {
    /// Build a pool from file content.
    ///
    /// Lines are trimmed and blank lines dropped.
    pub fn parse(content: &str, uniqueness: f64) -> Option<Self> {
        let messages: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if messages.is_empty() {
            return None;
        }
        Some(Self {
            messages,
            used: HashSet::new(),
            uniqueness,
        })
    }

    /// Read the pool file at `path`.
    ///
    /// A missing file is reported as [`PoolError::Missing`] so the caller can
    /// decide whether to fall back to synthetic messages.
    pub fn load(path: &Path, uniqueness: f64) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PoolError::Missing(path.to_path_buf())
            } else {
                PoolError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::parse(&content, uniqueness).ok_or_else(|| PoolError::Empty(path.to_path_buf()))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages used in the current rotation.
    pub fn used(&self) -> usize {
        self.used.len()
    }

    /// Draw the next message.
    pub fn draw(&mut self, rng: &mut impl Randomness) -> &str {
        // Drawn on every call, even when the rotation is already exhausted.
        let early_reset = rng.uniform_real() > self.uniqueness;
        if self.used.len() >= self.messages.len() || early_reset {
            self.used.clear();
        }

        let available: Vec<usize> = (0..self.messages.len())
            .filter(|i| !self.used.contains(i))
            .collect();
        let pick = available[rng.uniform_int(0, (available.len() - 1) as u32) as usize];
        self.used.insert(pick);
        &self.messages[pick]
    }
}

/// A synthetic message such as `chore: update 3fQa9LxZ`.
pub fn synthetic(rng: &mut impl Randomness) -> String {
    let last = (SYNTHETIC_PREFIXES.len() - 1) as u32;
    let prefix = SYNTHETIC_PREFIXES[rng.uniform_int(0, last) as usize];
    format!("{prefix}: update {}", rng.token(SYNTHETIC_TOKEN_LEN))
}

/// Hands out one commit message per call.
#[derive(Debug)]
pub struct MessageProvider<R> {
    pool: Option<MessagePool>,
    rng: R,
}

impl<R: Randomness> MessageProvider<R> {
    /// Provider drawing from `pool`.
    pub fn pooled(pool: MessagePool, rng: R) -> Self {
        Self {
            pool: Some(pool),
            rng,
        }
    }

    /// Provider generating synthetic messages.
    pub fn synthetic(rng: R) -> Self {
        Self { pool: None, rng }
    }

    /// Load the pool at `source`, or go synthetic when there is none.
    pub fn from_source(source: Option<&Path>, uniqueness: f64, rng: R) -> Result<Self, PoolError> {
        match source {
            Some(path) => Ok(Self::pooled(MessagePool::load(path, uniqueness)?, rng)),
            None => Ok(Self::synthetic(rng)),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.pool.is_none()
    }

    pub fn pool(&self) -> Option<&MessagePool> {
        self.pool.as_ref()
    }

    /// The next commit message. Never fails.
    pub fn next_message(&mut self) -> String {
        match &mut self.pool {
            Some(pool) => pool.draw(&mut self.rng).to_string(),
            None => synthetic(&mut self.rng),
        }
    }
}

/// Errors from loading a message pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("message file '{}' does not exist", .0.display())]
    Missing(PathBuf),

    #[error("message file '{}' has no messages", .0.display())]
    Empty(PathBuf),

    #[error("failed to read message file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PoolError {
    /// Whether the pool is simply absent, as opposed to broken.
    pub fn is_missing(&self) -> bool {
        matches!(self, PoolError::Missing(_))
    }
}
