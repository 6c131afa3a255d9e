// src/state.rs

use crate::CancellationToken;
use crate::core::config::Settings;
use crate::system::watcher::WatchHub;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything an invocation shares between the main thread, the script
/// runtime and the background workers. Built once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    /// Set once the run should wind down. Watchers stop when they see it.
    pub token: CancellationToken,
    /// Armed when a watcher starts; tells the interrupt worker to cancel
    /// instead of exiting.
    pub wait_gate: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            token: Arc::new(AtomicBool::new(false)),
            wait_gate: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.load(Ordering::SeqCst)
    }

    /// A hub whose watchers share this context's token and gate.
    pub fn watch_hub(&self) -> WatchHub {
        WatchHub::new(
            Arc::clone(&self.token),
            Arc::clone(&self.wait_gate),
            self.settings.watch_interval(),
        )
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
