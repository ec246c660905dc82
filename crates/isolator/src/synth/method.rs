//! Synthesis of one forwarding method.
//!
//! The emitted method declares one positional slot per profile position.
//! Slots past the required prefix default to `null`, which only makes them
//! omissible at the call site; the body never forwards that placeholder.
//! Instead it switches on the number of arguments actually supplied and calls
//! the target with exactly that many. A trailing fallback collects the full
//! argument list, re-attaches reference slots and forwards generically.

use std::fmt::Write as _;

use crate::error::SignatureError;
use crate::inspect::ArityProfile;
use crate::signature::FunctionSignature;

pub(crate) const INDENT: &str = "    ";
pub(crate) const ABSENT_DEFAULT: &str = " = null";

/// Method name for a (possibly namespaced) function name.
#[must_use]
pub fn method_name(function: &str) -> String {
    function.replace('\\', "_")
}

/// Single-quoted literal with backslashes and quotes escaped.
#[must_use]
pub(crate) fn export_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\\' || ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

fn slot(index: usize) -> String {
    format!("$p{index}")
}

fn argument_list(arity: usize) -> String {
    (0..arity).map(slot).collect::<Vec<_>>().join(", ")
}

fn render_signature(function: &str, returns_reference: bool, profile: &ArityProfile) -> String {
    let parameters: Vec<String> = profile
        .reference_flags
        .iter()
        .enumerate()
        .map(|(index, &is_ref)| {
            let mut param = String::new();
            if is_ref {
                param.push('&');
            }
            param.push_str(&slot(index));
            if index >= profile.min_arity {
                param.push_str(ABSENT_DEFAULT);
            }
            param
        })
        .collect();

    format!(
        "public function {}{}({})",
        if returns_reference { "&" } else { "" },
        method_name(function),
        parameters.join(", ")
    )
}

fn render_switch(out: &mut String, function: &str, profile: &ArityProfile) {
    let _ = writeln!(out, "{INDENT}{INDENT}switch (\\func_num_args()) {{");
    for arity in profile.min_arity..=profile.max_arity {
        let _ = writeln!(
            out,
            "{INDENT}{INDENT}{INDENT}case {arity}: return \\{function}({});",
            argument_list(arity)
        );
    }
    let _ = writeln!(out, "{INDENT}{INDENT}}}");
}

fn render_fallback(out: &mut String, function: &str, profile: &ArityProfile) {
    let _ = writeln!(out, "{INDENT}{INDENT}$arguments = \\func_get_args();");
    for index in profile.reference_positions() {
        let _ = writeln!(out, "{INDENT}{INDENT}$arguments[{index}] = &$p{index};");
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "{INDENT}{INDENT}return \\call_user_func_array({}, $arguments);",
        export_string(function)
    );
}

/// Emit the source text of one override.
///
/// Output depends only on `signature` and `profile`; identical inputs always
/// produce byte-identical text.
pub fn synthesize_method(
    signature: &FunctionSignature,
    profile: &ArityProfile,
) -> Result<String, SignatureError> {
    signature.validate()?;

    let function = signature.name.as_str();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{INDENT}{}",
        render_signature(function, signature.returns_reference, profile)
    );
    let _ = writeln!(out, "{INDENT}{{");
    render_switch(&mut out, function, profile);
    out.push('\n');
    render_fallback(&mut out, function, profile);
    let _ = writeln!(out, "{INDENT}}}");
    Ok(out)
}
