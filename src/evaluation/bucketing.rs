use sha2::{Digest, Sha256};

use super::validation::{validate_percentage, ValidationError};

/// Number of buckets a subject can land in; one bucket is 0.01% of traffic
pub const BUCKET_COUNT: u64 = 10_000;

/// Stable bucket in `[0, 9999]` for a (seed, flag key, sticky key) triple
///
/// The triple is hashed with SHA-256 over a length-delimited encoding: the seed as
/// 8 big-endian bytes, the flag key prefixed by its byte length, then the sticky key.
/// No two distinct triples share an encoding. The first 8 digest bytes are read as a
/// big-endian `u64` and reduced modulo [`BUCKET_COUNT`].
pub fn bucket(seed: i64, flag_key: &str, sticky_key: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update((flag_key.len() as u32).to_be_bytes());
    hasher.update(flag_key.as_bytes());
    hasher.update(sticky_key.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    (u64::from_be_bytes(prefix) % BUCKET_COUNT) as u32
}

/// Whether the subject falls inside a `percentage` rollout
///
/// Holds when `bucket < percentage * 100`, so raising the percentage only ever adds
/// subjects. Percentages outside `[0, 100]` are rejected rather than clamped.
pub fn passes_percentage(
    percentage: i32,
    seed: i64,
    flag_key: &str,
    sticky_key: &str,
) -> Result<bool, ValidationError> {
    validate_percentage(percentage)?;

    let threshold = percentage as u32 * 100;
    Ok(bucket(seed, flag_key, sticky_key) < threshold)
}
