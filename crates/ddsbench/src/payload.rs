// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deterministic benchmark payloads.
//!
//! Byte `i` of a payload is always `i mod 256`, so a receiver can check
//! integrity and two runs with the same size send identical bytes.

/// Generate a payload of `size` bytes where `byte[i] == i % 256`.
pub fn generate(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Check that `payload` follows the `i mod 256` pattern.
pub fn is_valid(payload: &[u8]) -> bool {
    payload
        .iter()
        .enumerate()
        .all(|(i, &b)| b == (i % 256) as u8)
}
