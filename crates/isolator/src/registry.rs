//! Registry of live global functions.
//!
//! Each entry pairs a reflected [`FunctionSignature`] with a native body. A
//! body receives exactly the arguments the caller supplied, as a mutable
//! frame; writes to frame slots are how reference parameters report back.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CallError, ReflectionError};
use crate::inventory::SignatureSource;
use crate::signature::FunctionSignature;
use crate::value::Value;

/// Native function body.
pub type NativeFn = Arc<dyn Fn(&mut [Value]) -> Result<Value, CallError> + Send + Sync>;

struct Entry {
    signature: FunctionSignature,
    body: NativeFn,
}

/// Ordered table of global functions.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.entries.len())
            .finish()
    }
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a function. Replacement keeps enumeration order.
    pub fn register<F>(&mut self, signature: FunctionSignature, body: F)
    where
        F: Fn(&mut [Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let entry = Entry {
            signature,
            body: Arc::new(body),
        };
        if let Some(&slot) = self.index.get(&entry.signature.name) {
            self.entries[slot] = entry;
        } else {
            self.index
                .insert(entry.signature.name.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Mark functions as disabled. Unknown names are ignored.
    pub fn disable<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            if let Some(&slot) = self.index.get(name.as_ref()) {
                self.entries[slot].signature.disabled = true;
            }
        }
    }

    /// Names of disabled functions in enumeration order.
    #[must_use]
    pub fn disabled_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.signature.disabled)
            .map(|e| e.signature.name.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.index.get(name).map(|&slot| &self.entries[slot].signature)
    }

    /// Call a function with exactly the arguments in `frame`.
    pub fn invoke(&self, name: &str, frame: &mut [Value]) -> Result<Value, CallError> {
        let entry = self
            .index
            .get(name)
            .map(|&slot| &self.entries[slot])
            .ok_or_else(|| CallError::UndefinedFunction(name.to_string()))?;

        let signature = &entry.signature;
        if signature.disabled {
            return Err(CallError::Disabled(name.to_string()));
        }

        let min = signature.required_count();
        let max = (!signature.is_variadic()).then(|| signature.declared_count());
        let given = frame.len();
        if given < min || max.is_some_and(|max| given > max) {
            return Err(CallError::ArgumentCount {
                function: name.to_string(),
                expected: match max {
                    Some(max) if max == min => format!("exactly {min}"),
                    Some(max) if given > max => format!("at most {max}"),
                    _ => format!("at least {min}"),
                },
                given,
            });
        }

        (entry.body)(frame)
    }
}

impl SignatureSource for FunctionRegistry {
    fn function_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.signature.name.clone())
            .collect()
    }

    fn reflect(&self, name: &str) -> Result<FunctionSignature, ReflectionError> {
        self.signature(name)
            .cloned()
            .ok_or_else(|| ReflectionError::UnknownFunction(name.to_string()))
    }
}
