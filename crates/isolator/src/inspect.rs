//! Signature inspection: arity bounds and reference flags.

use serde::Serialize;

use crate::signature::FunctionSignature;

/// Number of synthetic slots a variadic marker expands into.
///
/// This bounds the highest arity a generated override dispatches explicitly.
/// Calls beyond it still work through the fallback branch, but reference
/// arguments past the expanded slots are passed by value.
pub const DEFAULT_ELLIPSIS_EXPANSION: usize = 10;

/// Widest accepted expansion. Each slot adds one arity case to every variadic
/// override, so wider values are clamped to this.
pub const MAX_ELLIPSIS_EXPANSION: usize = 64;

/// Arity bounds and per-slot reference flags derived from a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArityProfile {
    /// Parameters in the required prefix.
    pub min_arity: usize,
    /// Declared parameters, with the variadic marker expanded.
    pub max_arity: usize,
    /// One entry per slot, `true` where the slot is passed by reference.
    pub reference_flags: Vec<bool>,
}

impl ArityProfile {
    /// Positions of by-reference slots.
    pub fn reference_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.reference_flags
            .iter()
            .enumerate()
            .filter_map(|(index, &is_ref)| is_ref.then_some(index))
    }

    #[must_use]
    pub fn is_reference(&self, position: usize) -> bool {
        self.reference_flags.get(position).copied().unwrap_or(false)
    }
}

/// Walk the declared parameters and compute the [`ArityProfile`].
///
/// A variadic marker stops the walk and contributes `expansion` slots that
/// all carry the marker's reference flag.
#[must_use]
pub fn inspect(signature: &FunctionSignature, expansion: usize) -> ArityProfile {
    let mut min_arity = 0;
    let mut reference_flags = Vec::with_capacity(signature.parameters.len());
    let mut in_required_prefix = true;

    for parameter in &signature.parameters {
        if parameter.is_variadic() {
            reference_flags.extend(std::iter::repeat_n(parameter.by_reference, expansion));
            break;
        }

        reference_flags.push(parameter.by_reference);

        if parameter.is_optional() {
            in_required_prefix = false;
        } else if in_required_prefix {
            min_arity += 1;
        }
    }

    ArityProfile {
        min_arity,
        max_arity: reference_flags.len(),
        reference_flags,
    }
}

/// True if any parameter is optional without an introspectable default.
#[must_use]
pub fn has_phantom_default(signature: &FunctionSignature) -> bool {
    signature
        .parameters
        .iter()
        .any(|parameter| parameter.has_phantom_default())
}
