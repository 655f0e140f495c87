//! Round-robin pool of feed credentials.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotating pool of API keys. Each call to `next` hands out the following
/// key, wrapping around at the end.
#[derive(Debug, Default)]
pub struct RotatingCredentialPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl RotatingCredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Parse a comma-separated key list (e.g. `KEY1,KEY2,KEY3`).
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(',').map(str::to_string).collect())
    }

    /// Next credential in rotation.
    pub fn next(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[index])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_and_wraps() {
        let pool = RotatingCredentialPool::from_csv("a, b,c");
        let seen: Vec<&str> = (0..4).filter_map(|_| pool.next()).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let pool = RotatingCredentialPool::from_csv(" , ,");
        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn test_pools_are_independent() {
        let first = RotatingCredentialPool::from_csv("a,b");
        let second = RotatingCredentialPool::from_csv("a,b");
        first.next();
        assert_eq!(second.next(), Some("a"));
        assert_eq!(first.next(), Some("b"));
    }
}
