//! Reflected function signatures.
//!
//! A [`FunctionSignature`] is an immutable snapshot of what the host reports
//! about one global function. Signatures are built once, either by the
//! registry that owns the function bodies or by deserializing an inventory,
//! and never mutated afterward.

use serde::{Deserialize, Serialize};

use crate::error::SignatureError;
use crate::value::Value;

/// How a parameter participates in a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Must be supplied.
    Required,
    /// May be omitted; the host reports the value used when it is.
    OptionalWithDefault(Value),
    /// May be omitted, but the default cannot be introspected (it depends on
    /// other arguments or on internal state). Always forces an override.
    OptionalOpaque,
    /// Accepts an arbitrary number of trailing arguments.
    Variadic,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub by_reference: bool,
    pub kind: ParamKind,
}

impl Parameter {
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        !matches!(self.kind, ParamKind::Required)
    }

    #[must_use]
    pub const fn has_known_default(&self) -> bool {
        matches!(self.kind, ParamKind::OptionalWithDefault(_))
    }

    #[must_use]
    pub const fn is_variadic(&self) -> bool {
        matches!(self.kind, ParamKind::Variadic)
    }

    /// Optional, yet no default value is retrievable.
    #[must_use]
    pub const fn has_phantom_default(&self) -> bool {
        matches!(self.kind, ParamKind::OptionalOpaque)
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            ParamKind::OptionalWithDefault(value) => Some(value),
            _ => None,
        }
    }
}

/// Snapshot of a global function's reflected signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub returns_reference: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl FunctionSignature {
    /// Start a signature with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns_reference: false,
            disabled: false,
        }
    }

    fn push(mut self, name: &str, by_reference: bool, kind: ParamKind) -> Self {
        let position = self.parameters.len();
        self.parameters.push(Parameter {
            name: name.to_string(),
            position,
            by_reference,
            kind,
        });
        self
    }

    #[must_use]
    pub fn required(self, name: &str) -> Self {
        self.push(name, false, ParamKind::Required)
    }

    #[must_use]
    pub fn required_ref(self, name: &str) -> Self {
        self.push(name, true, ParamKind::Required)
    }

    #[must_use]
    pub fn optional(self, name: &str, default: impl Into<Value>) -> Self {
        self.push(name, false, ParamKind::OptionalWithDefault(default.into()))
    }

    #[must_use]
    pub fn optional_ref(self, name: &str, default: impl Into<Value>) -> Self {
        self.push(name, true, ParamKind::OptionalWithDefault(default.into()))
    }

    /// Optional parameter whose default cannot be introspected.
    #[must_use]
    pub fn opaque(self, name: &str) -> Self {
        self.push(name, false, ParamKind::OptionalOpaque)
    }

    #[must_use]
    pub fn opaque_ref(self, name: &str) -> Self {
        self.push(name, true, ParamKind::OptionalOpaque)
    }

    #[must_use]
    pub fn variadic(self, name: &str) -> Self {
        self.push(name, false, ParamKind::Variadic)
    }

    #[must_use]
    pub fn variadic_ref(self, name: &str) -> Self {
        self.push(name, true, ParamKind::Variadic)
    }

    #[must_use]
    pub fn returning_reference(mut self) -> Self {
        self.returns_reference = true;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.parameters.iter().any(Parameter::is_variadic)
    }

    /// Number of leading required parameters.
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.parameters
            .iter()
            .take_while(|p| !p.is_optional())
            .count()
    }

    /// Declared parameter count excluding the variadic marker.
    #[must_use]
    pub fn declared_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.is_variadic()).count()
    }

    /// Check the shape is one the synthesizer can express.
    pub fn validate(&self) -> Result<(), SignatureError> {
        if !is_valid_function_name(&self.name) {
            return Err(SignatureError::InvalidName {
                function: self.name.clone(),
            });
        }
        for (index, parameter) in self.parameters.iter().enumerate() {
            if parameter.position != index {
                return Err(SignatureError::PositionMismatch {
                    function: self.name.clone(),
                    index,
                    declared: parameter.position,
                });
            }
            if parameter.is_variadic() && index + 1 != self.parameters.len() {
                return Err(SignatureError::VariadicNotLast {
                    function: self.name.clone(),
                    name: parameter.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Identifier segments separated by single namespace separators.
pub(crate) fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('\\').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        })
}
