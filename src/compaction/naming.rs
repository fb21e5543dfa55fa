//! Unique suffixes for aggregate object names.
//!
//! Every aggregate write gets a fresh token so a re-invoked or concurrent run
//! covering the same bucket writes a second object instead of overwriting
//! the first.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of unique name suffixes.
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random UUID v4 tokens, hyphen-free.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn next_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic tokens: `{prefix}{n}` with n counting from 0.
#[derive(Debug, Default)]
pub struct SequentialTokens {
    prefix: String,
    next: AtomicU64,
}

impl SequentialTokens {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl TokenSource for SequentialTokens {
    fn next_token(&self) -> String {
        format!("{}{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_tokens_are_unique_and_hyphen_free() {
        let a = UuidTokens.next_token();
        let b = UuidTokens.next_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
    }

    #[test]
    fn test_sequential_tokens() {
        let tokens = SequentialTokens::new("run");
        assert_eq!(tokens.next_token(), "run0");
        assert_eq!(tokens.next_token(), "run1");
    }
}
