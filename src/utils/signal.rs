use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// One-shot broadcast signal.
///
/// Fires at most once; any number of tasks may wait on it, before or after it
/// fired. Clones observe the same signal.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires. Returns immediately if it already did.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}
