//! Cooperative cancellation.
//!
//! A [`CancellationSource`] counts interrupts. Each worker registers its own
//! [`Listener`], which only reacts to interrupts raised after registration,
//! and polls it between iterations. Nothing is preempted: a statement that is
//! already executing always runs to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Broadcast interrupt signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    interrupts: Arc<AtomicU64>,
}

impl CancellationSource {
    /// A private source, independent from the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide source fed by Ctrl-C.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<CancellationSource> = OnceLock::new();
        GLOBAL.get_or_init(CancellationSource::new).clone()
    }

    /// Raise an interrupt, observed by every registered listener.
    pub fn interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of interrupts raised so far.
    pub fn interrupts(&self) -> u64 {
        self.interrupts.load(Ordering::SeqCst)
    }

    /// Register a listener for interrupts raised from now on.
    pub fn listen(&self) -> Listener {
        Listener {
            interrupts: Arc::clone(&self.interrupts),
            registered_at: self.interrupts(),
            tripped: false,
        }
    }
}

/// One worker's registration with a [`CancellationSource`].
#[derive(Debug)]
pub struct Listener {
    interrupts: Arc<AtomicU64>,
    registered_at: u64,
    tripped: bool,
}

impl Listener {
    /// Non-blocking check. Once it returns `true` it keeps returning `true`.
    pub fn interrupted(&mut self) -> bool {
        if !self.tripped {
            self.tripped = self.interrupts.load(Ordering::SeqCst) > self.registered_at;
        }
        self.tripped
    }
}

/// Raise an interrupt on `source` every time the process receives Ctrl-C.
///
/// Installing the handler replaces the default SIGINT behaviour, so the
/// process keeps running and workers wind down at their next iteration.
#[cfg(feature = "ctrl-c")]
pub fn forward_ctrl_c(source: CancellationSource) -> std::io::Result<std::thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("dbstress-ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            tracing::warn!("interrupt received, stopping workers");
                            source.interrupt();
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to listen for Ctrl-C");
                            break;
                        }
                    }
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_notify_every_listener_when_interrupted() {
        let source = CancellationSource::new();
        let mut a = source.listen();
        let mut b = source.listen();
        assert!(!a.interrupted());
        assert!(!b.interrupted());

        source.interrupt();
        assert!(a.interrupted());
        assert!(b.interrupted());
    }

    #[test]
    fn should_ignore_interrupts_raised_before_registration() {
        let source = CancellationSource::new();
        source.interrupt();

        let mut late = source.listen();
        assert!(!late.interrupted());
        source.interrupt();
        assert!(late.interrupted());
    }

    #[test]
    fn should_stay_tripped_once_observed() {
        let source = CancellationSource::new();
        let mut listener = source.listen();
        source.interrupt();
        assert!(listener.interrupted());
        assert!(listener.interrupted());
        assert_eq!(source.interrupts(), 1);
    }

    #[test]
    fn should_not_leak_between_private_sources() {
        let a = CancellationSource::new();
        let b = CancellationSource::new();
        let mut on_b = b.listen();
        a.interrupt();
        assert!(!on_b.interrupted());
    }

    #[test]
    fn should_share_state_across_global_handles() {
        let one = CancellationSource::global();
        let two = CancellationSource::global();
        let mut listener = two.listen();
        one.interrupt();
        assert!(listener.interrupted());
    }
}
