//! Per-channel claims so that at most one pass reconciles a channel at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    channels: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `channel`, or `None` if another pass holds it. The claim is
    /// released when the guard is dropped.
    pub fn try_claim(&self, channel: &str) -> Option<InFlightGuard> {
        let key = channel.to_ascii_lowercase();
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self.clone(),
            channel: key,
        })
    }

    pub fn is_claimed(&self, channel: &str) -> bool {
        self.lock().contains(&channel.to_ascii_lowercase())
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    owner: InFlight,
    channel: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.channel);
    }
}
