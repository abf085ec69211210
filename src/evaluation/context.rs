use std::collections::{BTreeMap, HashMap};

/// Who a flag is being evaluated for
///
/// Attribute names are case-insensitive; they are folded to lowercase on the way in,
/// which also keeps them sorted for cache key derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    sticky_key: String,
    attrs: BTreeMap<String, String>,
}

impl EvaluationContext {
    pub fn new(sticky_key: impl Into<String>) -> Self {
        Self {
            sticky_key: sticky_key.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn from_parts(sticky_key: impl Into<String>, attrs: HashMap<String, String>) -> Self {
        attrs
            .into_iter()
            .fold(Self::new(sticky_key), |ctx, (name, value)| ctx.with_attr(name, value))
    }

    pub fn with_attr(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn sticky_key(&self) -> &str {
        &self.sticky_key
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(parse_number)
    }

    /// Attributes ordered by (lowercased) name
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse "true"/"false" in any letter case
pub fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a finite decimal; "NaN" and "inf" are rejected
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
