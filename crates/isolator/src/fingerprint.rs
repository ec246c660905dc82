//! Artifact fingerprints.
//!
//! A fingerprint is a SHA-256 digest fed, in order, with the class name, the
//! function count, every function name in enumeration order, the host
//! environment version and the generator version. Every string is preceded by
//! its byte length so no two distinct inputs feed the same byte stream. Two
//! artifacts with equal fingerprints are interchangeable.

use std::fmt;

use sha2::{Digest, Sha256};

/// Version of the code generator. Changing the emitted dialect must bump it.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hex-encoded artifact digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn compute<S: AsRef<str>>(
        class_name: &str,
        functions: &[S],
        environment_version: &str,
        generator_version: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, class_name);
        hasher.update((functions.len() as u64).to_le_bytes());
        for function in functions {
            update_field(&mut hasher, function.as_ref());
        }
        update_field(&mut hasher, environment_version);
        update_field(&mut hasher, generator_version);
        Self(hex_lower(&hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the artifact identified by this fingerprint.
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        format!("Isolator{}.php", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
