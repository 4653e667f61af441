//! In-memory storage backend

use dashmap::DashMap;

use crate::error::StoreError;
use crate::traits::KeyValueBackend;

/// Process-local backend; never fails, forgets everything on drop
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, String>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("a").unwrap(), None);

        backend.set("a", "1").unwrap();
        backend.set("a", "2").unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(backend.len(), 1);

        backend.remove("a").unwrap();
        backend.remove("a").unwrap();
        assert!(backend.is_empty());
    }
}
