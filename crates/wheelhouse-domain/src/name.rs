use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// A distribution name that compares equal across case and separator spelling.
///
/// The rendered form follows PEP 503 (`Foo.Bar_baz` becomes `foo-bar-baz`) so it
/// can be handed to pip. Equality, ordering and hashing ignore separators
/// entirely, which makes `AIOhttp`, `aio_http` and `aio-http` the same key.
#[derive(Debug, Clone)]
pub struct PackageName {
    normalized: String,
    key: String,
}

impl PackageName {
    pub fn new(raw: &str) -> Self {
        let normalized = canonicalize_package_name(raw);
        let key = normalized.chars().filter(|ch| *ch != '-').collect();
        Self { normalized, key }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Separator-free comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

pub fn canonicalize_package_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.push(ch.to_ascii_lowercase());
    }
    normalized
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PackageName {}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl From<&str> for PackageName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized)
    }
}
