// src/system/signals.rs

use crate::CancellationToken;
use crate::constants::INTERRUPTED_EXIT_CODE;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// What to do with an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Watchers are running: ask them to wind down.
    Cancel,
    /// Nothing is waiting on the token (or it was already set): leave now.
    Exit,
}

/// Decides the reaction to one interrupt and applies it to the token.
pub fn on_interrupt(gate: &AtomicBool, token: &CancellationToken) -> InterruptAction {
    if gate.load(Ordering::SeqCst) && !token.load(Ordering::SeqCst) {
        token.store(true, Ordering::SeqCst);
        InterruptAction::Cancel
    } else {
        InterruptAction::Exit
    }
}

/// Spawns the interrupt worker: a thread with its own single-threaded tokio
/// runtime that waits for Ctrl+C (and SIGTERM on unix).
///
/// With the wait gate armed the first interrupt sets `token`; otherwise the
/// process exits with status 130.
pub fn spawn_interrupt_worker(
    gate: Arc<AtomicBool>,
    token: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("whet-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if !wait_for_interrupt().await {
                        return;
                    }
                    match on_interrupt(&gate, &token) {
                        InterruptAction::Cancel => log::debug!("Interrupt received, stopping watchers"),
                        InterruptAction::Exit => {
                            log::debug!("Interrupt received, exiting");
                            std::process::exit(INTERRUPTED_EXIT_CODE);
                        }
                    }
                }
            });
        })
}

/// Resolves on the next interrupt. `false` means signals cannot be received.
async fn wait_for_interrupt() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                return tokio::signal::ctrl_c().await.is_ok();
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.is_ok(),
            _ = sigterm.recv() => true,
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.is_ok()
    }
}

// MARK: --- UNIT TESTS ---
