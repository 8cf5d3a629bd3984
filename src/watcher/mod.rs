//! Live-code watcher
//!
//! Polls source files under a [`LiveCodeDirSet`] and, on the first modified
//! file, hands a restart of the autoreload programs to the supervisor as a
//! detached process. The watcher then stops; the daemon restarts it along
//! with everything else when needed.
//!
//! States: `Idle -> Polling -> ChangeDetected -> RestartIssued -> Terminal`.
//! The first sighting of a file only records its mtime. New and removed
//! files never trigger a restart.

mod live_dirs;

pub use live_dirs::LiveCodeDirSet;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::control::{ControlError, Supervisor};

/// Client verb used to restart programs
pub const RESTART_VERB: &str = "restart";

/// Watcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Polling,
    ChangeDetected,
    RestartIssued,
    Terminal,
}

/// Watcher errors
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Failed to issue restart: {0}")]
    Restart(#[from] ControlError),

    #[error("Nothing to watch")]
    NoDirectories,
}

/// Polling mtime watcher
#[derive(Debug)]
pub struct Watcher {
    dirs: LiveCodeDirSet,
    extensions: Vec<String>,
    interval: Duration,
    mtimes: HashMap<PathBuf, SystemTime>,
    state: WatcherState,
}

impl Watcher {
    pub fn new(dirs: LiveCodeDirSet, extensions: Vec<String>, interval: Duration) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        Self {
            dirs,
            extensions,
            interval,
            mtimes: HashMap::new(),
            state: WatcherState::Idle,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Number of files with a recorded mtime
    pub fn tracked_files(&self) -> usize {
        self.mtimes.len()
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|want| want == ext))
            .unwrap_or(false)
    }

    /// One pass over all live dirs. Returns the first file whose mtime
    /// differs from the recorded one.
    pub fn poll_once(&mut self) -> Option<PathBuf> {
        self.state = WatcherState::Polling;

        let mut changed = None;
        for dir in self.dirs.iter() {
            let walker = WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
                .filter_map(Result::ok);

            for entry in walker {
                if !entry.file_type().is_file() || !self.is_source(entry.path()) {
                    continue;
                }
                // Stat failures skip the file for this cycle.
                let Some(mtime) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                    continue;
                };

                match self.mtimes.insert(entry.path().to_path_buf(), mtime) {
                    Some(previous) if previous != mtime && changed.is_none() => {
                        changed = Some(entry.path().to_path_buf());
                    }
                    _ => {}
                }
            }
        }

        if let Some(path) = &changed {
            info!(path = %path.display(), "source file changed");
            self.state = WatcherState::ChangeDetected;
        }
        changed
    }

    /// Poll until a file changes
    pub fn wait_for_change(&mut self) -> PathBuf {
        loop {
            if let Some(path) = self.poll_once() {
                return path;
            }
            std::thread::sleep(self.interval);
        }
    }

    /// Hand a restart of `programs` to the supervisor without waiting
    pub fn issue_restart(
        &mut self,
        supervisor: &dyn Supervisor,
        config: &str,
        programs: &[String],
    ) -> Result<(), WatcherError> {
        let mut args = Vec::with_capacity(programs.len() + 1);
        args.push(RESTART_VERB.to_string());
        args.extend(programs.iter().cloned());

        info!(?programs, "restarting programs");
        supervisor.spawn_detached(config, &args)?;
        self.state = WatcherState::RestartIssued;
        Ok(())
    }

    /// Watch until the first change, restart `programs`, then stop.
    pub fn run(
        &mut self,
        supervisor: &dyn Supervisor,
        config: &str,
        programs: &[String],
    ) -> Result<PathBuf, WatcherError> {
        if self.dirs.is_empty() {
            return Err(WatcherError::NoDirectories);
        }
        info!(
            dirs = self.dirs.len(),
            interval_ms = self.interval.as_millis() as u64,
            "watching for source changes"
        );

        let changed = self.wait_for_change();
        self.issue_restart(supervisor, config, programs)?;
        self.state = WatcherState::Terminal;
        debug!("watcher finished");
        Ok(changed)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
