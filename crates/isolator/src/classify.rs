//! Decide which functions need a generated override.
//!
//! The base proxy forwards by value with exactly the arguments supplied, which
//! is enough for most functions. An override is needed only where that loses
//! information: reference parameters, reference returns, and optional
//! parameters whose default cannot be reproduced.

use serde::Serialize;

use crate::signature::FunctionSignature;

/// Why a signature needs an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "position")]
pub enum OverrideReason {
    ReturnsReference,
    ReferenceParameter(usize),
    PhantomDefault(usize),
}

/// Outcome of classifying one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "classification")]
pub enum Classification {
    /// Disabled in this environment; calls must fail like a direct call.
    Disabled,
    /// Generic by-value forwarding is sufficient.
    Passthrough,
    Override { because: OverrideReason },
}

impl Classification {
    #[must_use]
    pub const fn needs_override(self) -> bool {
        matches!(self, Self::Override { .. })
    }
}

/// Classify a signature. Rules are evaluated in order and short-circuit.
#[must_use]
pub fn classify(signature: &FunctionSignature) -> Classification {
    if signature.disabled {
        return Classification::Disabled;
    }
    if signature.returns_reference {
        return Classification::Override {
            because: OverrideReason::ReturnsReference,
        };
    }
    if let Some(parameter) = signature.parameters.iter().find(|p| p.by_reference) {
        return Classification::Override {
            because: OverrideReason::ReferenceParameter(parameter.position),
        };
    }
    if let Some(parameter) = signature
        .parameters
        .iter()
        .find(|p| p.has_phantom_default())
    {
        return Classification::Override {
            because: OverrideReason::PhantomDefault(parameter.position),
        };
    }
    Classification::Passthrough
}

#[must_use]
pub fn needs_override(signature: &FunctionSignature) -> bool {
    classify(signature).needs_override()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn disabled_never_overridden() {
        let sig = FunctionSignature::new("exec")
            .required("command")
            .optional_ref("output", Value::Null)
            .returning_reference()
            .disabled();
        assert_eq!(classify(&sig), Classification::Disabled);
        assert!(!needs_override(&sig));
    }

    #[test]
    fn reference_return_wins_over_parameters() {
        let sig = FunctionSignature::new("f")
            .required_ref("a")
            .returning_reference();
        assert_eq!(
            classify(&sig),
            Classification::Override {
                because: OverrideReason::ReturnsReference
            }
        );
    }

    #[test]
    fn any_reference_parameter_needs_override() {
        let sig = FunctionSignature::new("preg_match")
            .required("pattern")
            .required("subject")
            .optional_ref("matches", Value::Null);
        assert_eq!(
            classify(&sig),
            Classification::Override {
                because: OverrideReason::ReferenceParameter(2)
            }
        );
    }

    #[test]
    fn variadic_reference_needs_override() {
        let sig = FunctionSignature::new("f").variadic_ref("vars");
        assert!(needs_override(&sig));
    }

    #[test]
    fn phantom_default_needs_override() {
        let sig = FunctionSignature::new("substr")
            .required("string")
            .required("offset")
            .opaque("length");
        assert_eq!(
            classify(&sig),
            Classification::Override {
                because: OverrideReason::PhantomDefault(2)
            }
        );
    }

    #[test]
    fn ordinary_parameters_pass_through() {
        let sig = FunctionSignature::new("str_repeat")
            .required("string")
            .required("times");
        assert_eq!(classify(&sig), Classification::Passthrough);

        let sig = FunctionSignature::new("sprintf")
            .required("format")
            .variadic("values");
        assert_eq!(classify(&sig), Classification::Passthrough);

        let sig = FunctionSignature::new("microtime").optional("as_float", false);
        assert!(!needs_override(&sig));
    }
}
