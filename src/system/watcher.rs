// src/system/watcher.rs

//! Polling file watchers.
//!
//! Each watcher runs on its own thread and only ever sends `WatchEvent`s; the
//! thread that owns the `WatchHub` is the one that handles them. Callbacks into
//! the script therefore never run concurrently.

use crate::CancellationToken;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// How often idle loops re-check the cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot watch '{0}': not a directory.")]
    NotADirectory(PathBuf),
    #[error("Invalid watch filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// What one watcher observes.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub dir: PathBuf,
    pub recursive: bool,
    pub filter: Option<Regex>,
    /// Directories whose name contains any of these are skipped.
    pub exclude: Vec<String>,
}

impl WatchSpec {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recursive: false,
            filter: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_filter(mut self, pattern: &str) -> Result<Self, WatchError> {
        let regex = Regex::new(pattern).map_err(|source| WatchError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        self.filter = Some(regex);
        Ok(self)
    }

    fn skips_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        (self.recursive && name.starts_with('.'))
            || self.exclude.iter().any(|ex| name.contains(ex.as_str()))
    }

    fn matches(&self, path: &Path) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|re| re.is_match(&path.to_string_lossy()))
    }

    /// Modification times of every matching file below `dir`.
    fn snapshot(&self) -> HashMap<PathBuf, SystemTime> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        WalkDir::new(&self.dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| !self.skips_dir(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && self.matches(entry.path()))
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((entry.into_path(), modified))
            })
            .collect()
    }
}

/// A file under a watched directory was created or modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Index of the watcher, in the order `WatchHub::watch` was called.
    pub watcher: usize,
    pub path: PathBuf,
}

impl WatchEvent {
    pub const KIND: &'static str = "write";
}

/// Owns every watcher thread and the channel they report on.
#[derive(Debug)]
pub struct WatchHub {
    sender: Sender<WatchEvent>,
    receiver: Receiver<WatchEvent>,
    token: CancellationToken,
    gate: Arc<AtomicBool>,
    interval: Duration,
    workers: Vec<JoinHandle<()>>,
}

impl WatchHub {
    /// `gate` is armed as soon as the first watcher starts.
    pub fn new(token: CancellationToken, gate: Arc<AtomicBool>, interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            token,
            gate,
            interval,
            workers: Vec::new(),
        }
    }

    pub fn is_armed(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Starts a watcher and returns its index. The first snapshot is taken
    /// before returning, so files written afterwards are always reported.
    pub fn watch(&mut self, spec: WatchSpec) -> Result<usize, WatchError> {
        if !spec.dir.is_dir() {
            return Err(WatchError::NotADirectory(spec.dir));
        }
        let id = self.workers.len();
        let initial = spec.snapshot();
        log::debug!(
            "Watcher {} on '{}' (recursive: {}, {} files)",
            id,
            dunce::simplified(&spec.dir).display(),
            spec.recursive,
            initial.len()
        );

        let sender = self.sender.clone();
        let token = Arc::clone(&self.token);
        let interval = self.interval;
        let handle = thread::spawn(move || poll_loop(id, spec, initial, interval, token, sender));
        self.workers.push(handle);
        self.gate.store(true, Ordering::SeqCst);
        Ok(id)
    }

    /// Hands every event to `handler` on the calling thread until the
    /// cancellation token is set, then joins the workers.
    pub fn run_until_cancelled<H>(&mut self, mut handler: H) -> anyhow::Result<()>
    where
        H: FnMut(WatchEvent) -> anyhow::Result<()>,
    {
        let result = loop {
            if self.token.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.receiver.recv_timeout(CANCEL_POLL) {
                Ok(event) => {
                    log::debug!("Watcher {} saw a write to '{}'", event.watcher, event.path.display());
                    if let Err(e) = handler(event) {
                        break Err(e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Ok(()),
            }
        };
        self.shutdown();
        result
    }

    fn shutdown(&mut self) {
        self.token.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("A watcher thread panicked");
            }
        }
        log::debug!("All watchers stopped");
    }
}

fn poll_loop(
    id: usize,
    spec: WatchSpec,
    mut known: HashMap<PathBuf, SystemTime>,
    interval: Duration,
    token: CancellationToken,
    sender: Sender<WatchEvent>,
) {
    loop {
        let mut waited = Duration::ZERO;
        while waited < interval {
            if token.load(Ordering::SeqCst) {
                return;
            }
            let step = CANCEL_POLL.min(interval - waited);
            thread::sleep(step);
            waited += step;
        }

        let current = spec.snapshot();
        let mut changed: Vec<&PathBuf> = current
            .iter()
            .filter(|(path, modified)| known.get(*path) != Some(*modified))
            .map(|(path, _)| path)
            .collect();
        changed.sort();
        for path in changed {
            let event = WatchEvent {
                watcher: id,
                path: path.clone(),
            };
            if sender.send(event).is_err() {
                return;
            }
        }
        known = current;
    }
}

// MARK: --- UNIT TESTS ---
