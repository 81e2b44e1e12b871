//! CBOR serialization helpers.
//!
//! Thin wrappers around [`ciborium`] that map failures into [`CodecError`].

use serde::{de::DeserializeOwned, Serialize};

use crate::{CodecError, Result};

/// Serialize a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the value cannot be serialized.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the bytes cannot be deserialized
/// into the target type.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data)
        .map_err(|e| CodecError::Deserialization(format!("CBOR deserialization failed: {e}")))
}

/// Decode CBOR bytes into a dynamically typed value.
pub fn value_from_slice(data: &[u8]) -> Result<ciborium::Value> {
    from_slice(data)
}
