use sha2::{Digest, Sha256};

use crate::evaluation::context::EvaluationContext;
use crate::evaluation::model::FlagScope;

const KEY_PREFIX: &str = "flag-eval";
const INDEX_PREFIX: &str = "flag-eval-index";

// 16 bytes of SHA-256, hex encoded
const ATTRS_HASH_BYTES: usize = 16;

/// Cache key for one evaluation of a flag for one context
///
/// Attributes are hashed in name order so the same attribute set always yields the
/// same key, whatever order the caller supplied it in. The flag key and sticky key are
/// length-prefixed, so a `:` inside either cannot shift bytes between the two.
pub fn evaluation_key(scope: &FlagScope, context: &EvaluationContext) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}",
        KEY_PREFIX,
        scope.organization_id,
        scope.project_id,
        scope.environment_id,
        segment(&scope.flag_key),
        segment(context.sticky_key()),
        attrs_hash(context),
    )
}

/// Key of the set listing every evaluation key saved under `scope`
pub fn index_key(scope: &FlagScope) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        INDEX_PREFIX,
        scope.organization_id,
        scope.project_id,
        scope.environment_id,
        segment(&scope.flag_key),
    )
}

// Free-form text as "<byte length>:<text>"
fn segment(text: &str) -> String {
    format!("{}:{}", text.len(), text)
}

fn attrs_hash(context: &EvaluationContext) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in context.attrs() {
        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(&hasher.finalize()[..ATTRS_HASH_BYTES])
}
