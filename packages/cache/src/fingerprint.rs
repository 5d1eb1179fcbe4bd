//! Canonical, content-addressed cache keys.

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A deterministic encoding of the inputs that determine a cached result.
///
/// Two fingerprints are equal exactly when they were built from the same
/// namespace, field names and values (sets compared after sorting and
/// de-duplication).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Starts a fingerprint in `namespace` (e.g. `"facts"`).
    #[must_use]
    pub fn builder(namespace: &str) -> FingerprintBuilder {
        FingerprintBuilder {
            namespace: namespace.to_string(),
            hasher: Sha256::new(),
        }
    }

    /// The encoded key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulates fields into a [`Fingerprint`].
pub struct FingerprintBuilder {
    namespace: String,
    hasher: Sha256,
}

impl FingerprintBuilder {
    /// Adds a scalar field.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Display) -> Self {
        self.hasher.update(name.as_bytes());
        self.hasher.update(b"=");
        self.hasher.update(value.to_string().as_bytes());
        self.hasher.update(b";");
        self
    }

    /// Adds a set-valued field. Order and duplicates in `values` do not
    /// affect the result.
    #[must_use]
    pub fn set<T, I>(mut self, name: &str, values: I) -> Self
    where
        T: Ord + Display,
        I: IntoIterator<Item = T>,
    {
        let canonical: BTreeSet<T> = values.into_iter().collect();
        self.hasher.update(name.as_bytes());
        self.hasher.update(b"={");
        for value in &canonical {
            self.hasher.update(value.to_string().as_bytes());
            self.hasher.update(b",");
        }
        self.hasher.update(b"};");
        self
    }

    /// Finishes the fingerprint as `namespace:<sha256 hex>`.
    #[must_use]
    pub fn finish(self) -> Fingerprint {
        Fingerprint(format!("{}:{:x}", self.namespace, self.hasher.finalize()))
    }
}
