//! Query definition registry.
//!
//! The registry compiles and validates query definitions elsewhere; the
//! board only asks it what it knows about a content hash.

use std::collections::HashMap;

use wrb_types::RadHash;

/// What the registry knows about a verified query definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisteredRequest {
    /// Upper bound on the encoded result size, in bytes.
    pub result_max_size: u16,
    /// Whether the definition may still be posted.
    pub valid: bool,
}

/// Lookup capability over verified query definitions.
pub trait RequestRegistry {
    fn lookup(&self, rad_hash: &RadHash) -> Option<RegisteredRequest>;
}

/// Registry kept in memory, keyed by the content hash of the bytecode.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: HashMap<RadHash, RegisteredRequest>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytecode` and return its content hash.
    ///
    /// Registering the same bytecode twice keeps a single entry, updated
    /// with the latest size bound.
    pub fn verify_and_register(&mut self, bytecode: &[u8], result_max_size: u16) -> RadHash {
        let rad_hash = wrb_crypto::blake3::rad_hash(bytecode);
        self.entries.insert(
            rad_hash,
            RegisteredRequest {
                result_max_size,
                valid: true,
            },
        );
        tracing::debug!(rad_hash = %hex::encode(rad_hash), result_max_size, "registered query definition");
        rad_hash
    }

    /// Mark a definition as no longer postable. Returns whether it existed.
    pub fn invalidate(&mut self, rad_hash: &RadHash) -> bool {
        match self.entries.get_mut(rad_hash) {
            Some(entry) => {
                entry.valid = false;
                true
            }
            None => false,
        }
    }

    /// Number of registered definitions, valid or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RequestRegistry for InMemoryRegistry {
    fn lookup(&self, rad_hash: &RadHash) -> Option<RegisteredRequest> {
        self.entries.get(rad_hash).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = InMemoryRegistry::new();
        let hash = registry.verify_and_register(b"price feed script", 32);
        assert!(wrb_crypto::blake3::verify_rad_hash(b"price feed script", &hash));

        let entry = registry.lookup(&hash).expect("registered");
        assert_eq!(entry.result_max_size, 32);
        assert!(entry.valid);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_hash() {
        let registry = InMemoryRegistry::new();
        assert!(registry.lookup(&[9; 32]).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let mut registry = InMemoryRegistry::new();
        let hash = registry.verify_and_register(b"script", 8);
        assert!(registry.invalidate(&hash));
        assert!(!registry.lookup(&hash).expect("still present").valid);
        assert!(!registry.invalidate(&[0; 32]));
    }
}
