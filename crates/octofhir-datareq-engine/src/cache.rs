//! Memoized named-expression results

use std::collections::{HashMap, HashSet};

use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::frame::Frame;

type Key = (String, String);

fn key(library: &str, name: &str) -> Key {
    (library.to_string(), name.to_string())
}

/// Resolved frames keyed by (library id, expression name).
///
/// A name is marked as resolving between [`begin`](Self::begin) and
/// [`complete`](Self::complete); asking to begin it again in that window is
/// a reference cycle and fails.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    resolved: HashMap<Key, Frame>,
    resolving: HashSet<Key>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, library: &str, name: &str) -> Option<&Frame> {
        self.resolved.get(&key(library, name))
    }

    pub fn contains(&self, library: &str, name: &str) -> bool {
        self.resolved.contains_key(&key(library, name))
    }

    pub fn is_resolving(&self, library: &str, name: &str) -> bool {
        self.resolving.contains(&key(library, name))
    }

    /// Mark a name as resolving
    pub fn begin(&mut self, library: &str, name: &str) -> DataRequirementsResult<()> {
        if !self.resolving.insert(key(library, name)) {
            return Err(DataRequirementsError::ReentrantExpression {
                name: format!("{library}.{name}"),
            });
        }
        Ok(())
    }

    /// Store the resolved frame of a name marked by `begin`
    pub fn complete(&mut self, library: &str, name: &str, frame: Frame) {
        let key = key(library, name);
        self.resolving.remove(&key);
        self.resolved.insert(key, frame);
    }

    /// Drop the resolving mark after a failure
    pub fn abandon(&mut self, library: &str, name: &str) {
        self.resolving.remove(&key(library, name));
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn clear(&mut self) {
        self.resolved.clear();
        self.resolving.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::DataRequirement;

    #[test]
    fn test_begin_complete_get() {
        let mut cache = ExpressionCache::new();
        cache.begin("Lib", "Obs").unwrap();
        assert!(cache.is_resolving("Lib", "Obs"));

        let frame = Frame::single(DataRequirement::of_type("Observation"));
        cache.complete("Lib", "Obs", frame.clone());
        assert!(!cache.is_resolving("Lib", "Obs"));
        assert_eq!(cache.get("Lib", "Obs"), Some(&frame));
        assert!(cache.get("Other", "Obs").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reentry_fails() {
        let mut cache = ExpressionCache::new();
        cache.begin("Lib", "Loop").unwrap();
        assert_eq!(
            cache.begin("Lib", "Loop").unwrap_err(),
            DataRequirementsError::ReentrantExpression {
                name: "Lib.Loop".into()
            }
        );

        cache.abandon("Lib", "Loop");
        assert!(cache.begin("Lib", "Loop").is_ok());
    }
}
