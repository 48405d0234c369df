//! Shared utilities and common patterns used across the codebase

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Type-safe wrapper for client ordinals to prevent confusion with other numeric types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Create a new ClientId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the underlying u32 value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Stable string key used on presence channels and in reports
    pub fn key(&self) -> String {
        format!("user_{}", self.0)
    }
}

impl From<u32> for ClientId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user_{}", self.0)
    }
}

/// Receiver side of the graceful-shutdown broadcast channel.
///
/// Once the signal fires it stays fired. A closed channel counts as
/// never-firing, so runs driven without an operator signal behave the same.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    fired: bool,
}

impl ShutdownSignal {
    pub fn new(rx: broadcast::Receiver<()>) -> Self {
        Self { rx, fired: false }
    }

    /// A signal that can never fire, for runs with no operator channel
    pub fn disabled() -> Self {
        let (tx, rx) = broadcast::channel(1);
        // Leak the sender so the channel never reads as closed
        std::mem::forget(tx);
        Self::new(rx)
    }

    /// Non-blocking check, suitable between fan-out barriers
    pub fn fired(&mut self) -> bool {
        if self.fired {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => {
                self.fired = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Resolves when the signal fires; pends forever on a closed channel
    pub async fn wait(&mut self) {
        if self.fired {
            return;
        }
        loop {
            match self.rx.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    self.fired = true;
                    return;
                }
                Err(RecvError::Closed) => {
                    futures_util::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_key_is_ordinal_derived() {
        let id = ClientId::new(7);
        assert_eq!(id.key(), "user_7");
        assert_eq!(id.to_string(), "user_7");
        assert_eq!(id.get(), 7);
    }

    #[tokio::test]
    async fn shutdown_signal_latches_once_fired() {
        let (tx, rx) = broadcast::channel(1);
        let mut signal = ShutdownSignal::new(rx);
        assert!(!signal.fired());

        tx.send(()).expect("receiver alive");
        assert!(signal.fired());
        // Stays fired without further sends
        assert!(signal.fired());
    }

    #[tokio::test]
    async fn disabled_signal_never_fires() {
        let mut signal = ShutdownSignal::disabled();
        assert!(!signal.fired());
        assert!(!signal.fired());
    }
}
