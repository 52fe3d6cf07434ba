//! Cryptographic primitives for cairn.
//!
//! Provides domain-separated BLAKE3 hashing, both one-shot and incremental.
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, StreamingHasher};
