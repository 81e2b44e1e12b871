//! Domain-separated BLAKE3 hashing for the WRB board.
//!
//! Cross-domain collisions are prevented by BLAKE3's key derivation mode:
//! every derived digest is bound to one of the registered [`contexts`].
//!
//! ## Modes
//!
//! - [`hash`] — Pure hashing
//! - [`derive_key`] — Context-bound digests (content hashes, tally digests)

use wrb_types::{Address, Hash, QueryId};

/// Registered BLAKE3 context strings.
pub mod contexts {
    pub const RAD_HASH: &str = "WRB v1 rad-hash";
    pub const TALLY_DIGEST: &str = "WRB v1 tally-digest";
    pub const FEED_ADDRESS: &str = "WRB v1 feed-address";

    /// All registered context strings. Used for validation.
    pub const ALL_CONTEXTS: &[&str] = &[RAD_HASH, TALLY_DIGEST, FEED_ADDRESS];
}

/// Compute the BLAKE3 hash of the input data.
pub fn hash(data: &[u8]) -> Hash {
    *::blake3::hash(data).as_bytes()
}

/// Derive a digest bound to a registered context string.
pub fn derive_key(context: &str, key_material: &[u8]) -> Hash {
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    *hasher.finalize().as_bytes()
}

/// Verify that a context string is registered.
pub fn is_registered_context(context: &str) -> bool {
    contexts::ALL_CONTEXTS.contains(&context)
}

/// Encode multiple dynamic fields using length-prefixed encoding.
///
/// `LE32(len(field1)) || field1 || LE32(len(field2)) || field2 || ...`
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    let total_len: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut output = Vec::with_capacity(total_len);
    for field in fields {
        output.extend_from_slice(&(field.len() as u32).to_le_bytes());
        output.extend_from_slice(field);
    }
    output
}

/// Content hash of raw query bytecode.
///
/// This is the identifier under which the registry stores a verified query
/// definition.
pub fn rad_hash(bytecode: &[u8]) -> Hash {
    derive_key(contexts::RAD_HASH, bytecode)
}

/// Check that `bytecode` hashes to `expected`.
pub fn verify_rad_hash(bytecode: &[u8], expected: &Hash) -> bool {
    &rad_hash(bytecode) == expected
}

/// Digest binding a result payload to the query it resolves.
///
/// Used by local witnessing simulations to produce tally hashes.
pub fn tally_digest(query_id: QueryId, payload: &[u8]) -> Hash {
    let id_bytes = query_id.to_le_bytes();
    let input = encode_multi_field(&[&id_bytes, payload]);
    derive_key(contexts::TALLY_DIGEST, &input)
}

/// Deterministic account of the price feed with the given caption.
pub fn feed_address(caption: &str) -> Address {
    let digest = derive_key(contexts::FEED_ADDRESS, caption.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address(bytes)
}
