//! Enumerable sources of function signatures.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReflectionError;
use crate::signature::FunctionSignature;

/// Anything that can enumerate global functions and describe each one.
pub trait SignatureSource {
    /// Function names in enumeration order.
    fn function_names(&self) -> Vec<String>;

    /// Reflect one function's signature.
    fn reflect(&self, name: &str) -> Result<FunctionSignature, ReflectionError>;
}

/// Signature-only table, typically loaded from JSON.
///
/// Used where only generation is needed and no function bodies exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FunctionSignature>", into = "Vec<FunctionSignature>")]
pub struct Inventory {
    signatures: Vec<FunctionSignature>,
    index: HashMap<String, usize>,
}

impl Inventory {
    #[must_use]
    pub fn new(signatures: Vec<FunctionSignature>) -> Self {
        let mut inventory = Self::default();
        for signature in signatures {
            inventory.push(signature);
        }
        inventory
    }

    /// Add or replace a signature. Replacement keeps the original position.
    pub fn push(&mut self, signature: FunctionSignature) {
        if let Some(&slot) = self.index.get(&signature.name) {
            self.signatures[slot] = signature;
        } else {
            self.index
                .insert(signature.name.clone(), self.signatures.len());
            self.signatures.push(signature);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.signatures.iter()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

impl From<Vec<FunctionSignature>> for Inventory {
    fn from(signatures: Vec<FunctionSignature>) -> Self {
        Self::new(signatures)
    }
}

impl From<Inventory> for Vec<FunctionSignature> {
    fn from(inventory: Inventory) -> Self {
        inventory.signatures
    }
}

impl SignatureSource for Inventory {
    fn function_names(&self) -> Vec<String> {
        self.signatures.iter().map(|s| s.name.clone()).collect()
    }

    fn reflect(&self, name: &str) -> Result<FunctionSignature, ReflectionError> {
        self.index
            .get(name)
            .map(|&slot| self.signatures[slot].clone())
            .ok_or_else(|| ReflectionError::UnknownFunction(name.to_string()))
    }
}
