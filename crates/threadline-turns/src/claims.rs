use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Turns currently being streamed by a live connection in this process
#[derive(Debug, Clone, Default)]
pub struct StreamClaims {
    active: Arc<Mutex<HashSet<String>>>,
}

impl StreamClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `turn_id`, or `None` if another connection already holds it
    pub fn try_claim(&self, turn_id: &str) -> Option<StreamClaim> {
        if !lock(&self.active).insert(turn_id.to_string()) {
            return None;
        }
        Some(StreamClaim {
            active: Arc::clone(&self.active),
            turn_id: turn_id.to_string(),
        })
    }

    pub fn is_claimed(&self, turn_id: &str) -> bool {
        lock(&self.active).contains(turn_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the lifetime of a stream; dropping it releases the turn
#[derive(Debug)]
pub struct StreamClaim {
    active: Arc<Mutex<HashSet<String>>>,
    turn_id: String,
}

impl StreamClaim {
    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.turn_id);
    }
}

// The set stays consistent even if a holder panicked
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
