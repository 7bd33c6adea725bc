#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic synthesis of bid data from bidder and scope identifiers.
//!
//! Every value produced here is a pure function of its identifier inputs.
//! Repeated calls, re-renders and separate processes all observe the same
//! numbers, so presentation layers never flicker between passes.

use bid_leveling_core::{BidderId, CoverageStatus, ScopeId};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

const STATUS_BUCKETS: u32 = 100;
const INCLUDED_CEILING: u32 = 62;
const CLARIFY_CEILING: u32 = 78;
const EXCLUDED_CEILING: u32 = 92;

const RAW_VALUE_BUCKETS: u32 = 9_000;
const RAW_VALUE_FLOOR: i64 = 12_000;
const RAW_VALUE_STEP: i64 = 7;

/// Smallest raw value [`derive_raw_value`] can produce.
pub const MIN_RAW_VALUE: i64 = RAW_VALUE_FLOOR;
/// Largest raw value [`derive_raw_value`] can produce.
pub const MAX_RAW_VALUE: i64 = RAW_VALUE_FLOOR + (RAW_VALUE_BUCKETS as i64 - 1) * RAW_VALUE_STEP;

/// Hashes a string into a stable 32-bit fingerprint.
///
/// FNV-1a over the UTF-16 code units of the input, so identifiers outside
/// the basic multilingual plane hash exactly like they do in UTF-16 hosts.
#[must_use]
pub fn fingerprint(input: &str) -> u32 {
    input.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Fingerprints the parts joined without allocating an intermediate string.
fn fingerprint_parts(parts: &[&str]) -> u32 {
    parts
        .iter()
        .flat_map(|part| part.encode_utf16())
        .fold(FNV_OFFSET_BASIS, |hash, unit| {
            (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
        })
}

/// Derives how the bidder covered the scope item.
///
/// Keyed on `bidder::scope`; buckets are skewed toward `Included` (62%),
/// then `Clarify` (16%), `Excluded` (14%) and `Alternate` (8%).
#[must_use]
pub fn derive_status(bidder: &BidderId, scope: &ScopeId) -> CoverageStatus {
    let bucket = fingerprint_parts(&[bidder.as_str(), "::", scope.as_str()]) % STATUS_BUCKETS;
    if bucket < INCLUDED_CEILING {
        CoverageStatus::Included
    } else if bucket < CLARIFY_CEILING {
        CoverageStatus::Clarify
    } else if bucket < EXCLUDED_CEILING {
        CoverageStatus::Excluded
    } else {
        CoverageStatus::Alternate
    }
}

/// Derives the bidder's unadjusted price for the scope item.
///
/// Keyed on `scope::bidder`, the reverse of [`derive_status`]; the result
/// lies within [`MIN_RAW_VALUE`]..=[`MAX_RAW_VALUE`].
#[must_use]
pub fn derive_raw_value(bidder: &BidderId, scope: &ScopeId) -> i64 {
    let bucket = fingerprint_parts(&[scope.as_str(), "::", bidder.as_str()]) % RAW_VALUE_BUCKETS;
    RAW_VALUE_FLOOR + i64::from(bucket) * RAW_VALUE_STEP
}

/// Derives the fraction in `0.0..0.5` that perturbs the raw value during leveling.
#[must_use]
pub fn derive_normalization_tweak(bidder: &BidderId, scope: &ScopeId) -> f64 {
    let bucket = fingerprint_parts(&[bidder.as_str(), "::norm::", scope.as_str()]) % 500;
    f64::from(bucket) / 1_000.0
}

/// Derives how many clarification notes are attached to the cell (0 to 3).
#[must_use]
pub fn derive_notes_count(bidder: &BidderId, scope: &ScopeId) -> u8 {
    match fingerprint_parts(&["note::", bidder.as_str(), "::", scope.as_str()]) % 10 {
        0..=5 => 0,
        6 | 7 => 1,
        8 => 2,
        _ => 3,
    }
}
