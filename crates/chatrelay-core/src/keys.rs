//! Upstream API key pools.
//!
//! `OPENAI_API_KEY` may hold several comma-separated keys. One of them is
//! picked when the configuration is built and used for the lifetime of the
//! process. The choice goes through a [`KeySelector`] so tests can pin it.

use rand::Rng;

/// Picks one key out of a non-empty pool.
pub trait KeySelector: Send + Sync {
    /// Return the index of the chosen key, or `None` to select nothing.
    fn select(&self, pool: &[String]) -> Option<usize>;
}

/// Uniform random choice, the production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeySelector;

impl KeySelector for RandomKeySelector {
    fn select(&self, pool: &[String]) -> Option<usize> {
        if pool.is_empty() {
            return None;
        }
        Some(rand::rng().random_range(0..pool.len()))
    }
}

/// Always the first key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstKeySelector;

impl KeySelector for FirstKeySelector {
    fn select(&self, pool: &[String]) -> Option<usize> {
        if pool.is_empty() { None } else { Some(0) }
    }
}

impl<F> KeySelector for F
where
    F: Fn(&[String]) -> Option<usize> + Send + Sync,
{
    fn select(&self, pool: &[String]) -> Option<usize> {
        self(pool)
    }
}

/// Split a comma-separated key list, dropping blank entries.
pub fn parse_key_pool(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Resolve the key for this process from `pool` using `selector`.
///
/// Out-of-range indices from a misbehaving selector yield `None`.
pub fn pick_key(pool: &[String], selector: &dyn KeySelector) -> Option<String> {
    if pool.is_empty() {
        return None;
    }
    selector
        .select(pool)
        .and_then(|idx| pool.get(idx))
        .cloned()
}
