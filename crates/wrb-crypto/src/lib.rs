//! # wrb-crypto
//!
//! Hashing primitives for the WRB board.
//!
//! ## Modules
//!
//! - [`blake3`] — Domain-separated BLAKE3 hashing (content hashes, tally digests, feed accounts)

pub mod blake3;
