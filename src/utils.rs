//! Utility functions shared across the follower.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Resize `values` to `len`, broadcasting the first element when the length differs.
///
/// An empty input broadcasts 0.0.
pub fn broadcast(values: &[f64], len: usize) -> Vec<f64> {
    if values.len() == len {
        return values.to_vec();
    }
    let fill = values.first().copied().unwrap_or(0.0);
    vec![fill; len]
}

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning message only once.
///
/// Subsequent calls with the same message are ignored.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.insert(message.to_string()) {
        log::warn!("{}", message);
    }
}

/// Sum of squared weights inverted: the effective number of samples.
///
/// Returns 0.0 when the weights are all zero or not finite.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 0.0 && sum_sq.is_finite() {
        1.0 / sum_sq
    } else {
        0.0
    }
}
