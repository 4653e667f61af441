//! Termination signals from the host environment
//!
//! [`HostSignals`] plays the part of the page's window: history navigation
//! and unload are emitted there and reach every listener registered at that
//! moment. A [`SignalListener`] unregisters itself when dropped, so a
//! controller that is activated and deactivated repeatedly never leaves
//! stale listeners behind.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;

/// A client-observable sign that the participant is leaving the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    /// Browser history back/forward navigation
    HistoryNavigation,
    /// In-app page transition started by the surrounding application
    PageTransition,
    /// Page or tab closed, or navigated away from entirely
    Unload,
}

impl TerminationSignal {
    /// Signals delivered through [`HostSignals`] rather than the application
    pub const WINDOW_SCOPED: [TerminationSignal; 2] =
        [TerminationSignal::HistoryNavigation, TerminationSignal::Unload];
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::HistoryNavigation => write!(f, "history-navigation"),
            TerminationSignal::PageTransition => write!(f, "page-transition"),
            TerminationSignal::Unload => write!(f, "unload"),
        }
    }
}

struct Registration {
    signals: Vec<TerminationSignal>,
    tx: mpsc::UnboundedSender<TerminationSignal>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: DashMap<u64, Registration>,
}

/// Hub for window-scoped termination signals
#[derive(Clone, Default)]
pub struct HostSignals {
    registry: Arc<Registry>,
}

impl HostSignals {
    /// Create a hub with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for the given signals
    pub fn listen(&self, signals: &[TerminationSignal]) -> SignalListener {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.registry.listeners.insert(
            id,
            Registration {
                signals: signals.to_vec(),
                tx,
            },
        );

        SignalListener {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a signal to every listener registered for it
    ///
    /// Returns the number of listeners reached.
    pub fn emit(&self, signal: TerminationSignal) -> usize {
        let mut reached = 0;
        for entry in self.registry.listeners.iter() {
            let registration = entry.value();
            if registration.signals.contains(&signal) && registration.tx.send(signal).is_ok() {
                reached += 1;
            }
        }
        tracing::debug!("Emitted {} to {} listener(s)", signal, reached);
        reached
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.len()
    }
}

/// Registration on a [`HostSignals`] hub; unregisters on drop
pub struct SignalListener {
    id: u64,
    rx: mpsc::UnboundedReceiver<TerminationSignal>,
    registry: Weak<Registry>,
}

impl SignalListener {
    /// Wait for the next signal; `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<TerminationSignal> {
        self.rx.recv().await
    }

    /// Take a queued signal without waiting
    pub fn try_recv(&mut self) -> Option<TerminationSignal> {
        self.rx.try_recv().ok()
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_matching_listeners_only() {
        let host = HostSignals::new();
        let mut window = host.listen(&TerminationSignal::WINDOW_SCOPED);
        let mut unload_only = host.listen(&[TerminationSignal::Unload]);

        assert_eq!(host.emit(TerminationSignal::HistoryNavigation), 1);
        assert_eq!(host.emit(TerminationSignal::Unload), 2);

        assert_eq!(window.try_recv(), Some(TerminationSignal::HistoryNavigation));
        assert_eq!(window.try_recv(), Some(TerminationSignal::Unload));
        assert_eq!(window.try_recv(), None);
        assert_eq!(unload_only.try_recv(), Some(TerminationSignal::Unload));
    }

    #[test]
    fn test_drop_unregisters() {
        let host = HostSignals::new();
        let listener = host.listen(&TerminationSignal::WINDOW_SCOPED);
        assert_eq!(host.listener_count(), 1);

        drop(listener);
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.emit(TerminationSignal::Unload), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_when_hub_dropped() {
        let host = HostSignals::new();
        let mut listener = host.listen(&[TerminationSignal::Unload]);
        drop(host);
        assert_eq!(listener.recv().await, None);
    }
}
