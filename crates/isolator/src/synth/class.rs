//! Synthesis of the complete proxy class.

use std::fmt::Write as _;

use serde::Serialize;

use crate::classify::classify;
use crate::inspect::{DEFAULT_ELLIPSIS_EXPANSION, MAX_ELLIPSIS_EXPANSION, inspect};
use crate::inventory::SignatureSource;
use crate::synth::method::synthesize_method;

/// Fully qualified name of the base proxy every generated class extends.
pub const BASE_PROXY: &str = "Isolator\\Detail\\AbstractIsolator";

/// A class name split on its last namespace separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassName {
    pub namespace: Option<String>,
    pub short_name: String,
}

impl ClassName {
    #[must_use]
    pub fn parse(qualified: &str) -> Self {
        let qualified = qualified.trim_start_matches('\\');
        match qualified.rfind('\\') {
            Some(pos) if pos > 0 => Self {
                namespace: Some(qualified[..pos].to_string()),
                short_name: qualified[pos + 1..].to_string(),
            },
            _ => Self {
                namespace: None,
                short_name: qualified.to_string(),
            },
        }
    }

    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}\\{}", self.short_name),
            None => self.short_name.clone(),
        }
    }
}

/// A function left out of the generated class because it could not be
/// reflected or its signature could not be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFunction {
    pub name: String,
    pub reason: String,
}

/// Result of synthesizing one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisReport {
    pub source: String,
    /// Functions that received an override, in enumeration order.
    pub overridden: Vec<String>,
    pub skipped: Vec<SkippedFunction>,
}

/// Assembles overrides for every qualifying function into one class.
#[derive(Debug, Clone, Copy)]
pub struct ClassSynthesizer {
    ellipsis_expansion: usize,
}

impl Default for ClassSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_ELLIPSIS_EXPANSION)
    }
}

impl ClassSynthesizer {
    #[must_use]
    /// Synthesizer expanding variadics into `ellipsis_expansion` slots,
    /// clamped to [`MAX_ELLIPSIS_EXPANSION`].
    pub const fn new(ellipsis_expansion: usize) -> Self {
        let ellipsis_expansion = if ellipsis_expansion > MAX_ELLIPSIS_EXPANSION {
            MAX_ELLIPSIS_EXPANSION
        } else {
            ellipsis_expansion
        };
        Self { ellipsis_expansion }
    }

    #[must_use]
    pub const fn ellipsis_expansion(&self) -> usize {
        self.ellipsis_expansion
    }

    /// Generate a proxy class named `class_name` covering `functions`.
    ///
    /// Functions that need no override are omitted; the base proxy already
    /// forwards them. Reflection and signature failures skip the function and
    /// are listed in the report.
    pub fn synthesize<S: AsRef<str>>(
        &self,
        class_name: &str,
        functions: &[S],
        source: &dyn SignatureSource,
    ) -> SynthesisReport {
        let class = ClassName::parse(class_name);
        let base = ClassName::parse(BASE_PROXY);

        let mut code = String::from("<?php\n");
        if let Some(namespace) = &class.namespace {
            let _ = writeln!(code, "namespace {namespace};");
        }
        code.push('\n');
        let _ = writeln!(code, "use {BASE_PROXY};");
        code.push('\n');
        let _ = writeln!(code, "class {} extends {}", class.short_name, base.short_name);
        code.push_str("{\n");

        let mut overridden = Vec::new();
        let mut skipped = Vec::new();

        for function in functions {
            let function = function.as_ref();
            let signature = match source.reflect(function) {
                Ok(signature) => signature,
                Err(err) => {
                    skipped.push(SkippedFunction {
                        name: function.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if !classify(&signature).needs_override() {
                continue;
            }

            let profile = inspect(&signature, self.ellipsis_expansion);
            match synthesize_method(&signature, &profile) {
                Ok(method) => {
                    if !overridden.is_empty() {
                        code.push('\n');
                    }
                    code.push_str(&method);
                    overridden.push(signature.name);
                }
                Err(err) => skipped.push(SkippedFunction {
                    name: function.to_string(),
                    reason: err.to_string(),
                }),
            }
        }

        code.push_str("}\n");

        SynthesisReport {
            source: code,
            overridden,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;
    use crate::signature::FunctionSignature;
    use crate::value::Value;

    fn inventory() -> Inventory {
        Inventory::new(vec![
            FunctionSignature::new("strlen").required("string"),
            FunctionSignature::new("preg_match")
                .required("pattern")
                .required("subject")
                .optional_ref("matches", Value::Null),
            FunctionSignature::new("sort").required_ref("array"),
            FunctionSignature::new("exec")
                .required("command")
                .optional_ref("output", Value::Null)
                .disabled(),
        ])
    }

    #[test]
    fn empty_class() {
        let report = ClassSynthesizer::default().synthesize::<&str>("Foo", &[], &inventory());
        let expected = concat!(
            "<?php\n",
            "\n",
            "use Isolator\\Detail\\AbstractIsolator;\n",
            "\n",
            "class Foo extends AbstractIsolator\n",
            "{\n",
            "}\n",
        );
        assert_eq!(report.source, expected);
        assert!(report.overridden.is_empty());
    }

    #[test]
    fn class_in_namespace() {
        let report =
            ClassSynthesizer::default().synthesize::<&str>("Foo\\Bar\\Spam", &[], &inventory());
        assert!(report.source.starts_with("<?php\nnamespace Foo\\Bar;\n\n"));
        assert!(report.source.contains("class Spam extends AbstractIsolator\n"));
    }

    #[test]
    fn only_qualifying_functions_are_emitted() {
        let report = ClassSynthesizer::default().synthesize(
            "Foo",
            &["strlen", "preg_match", "exec", "sort"],
            &inventory(),
        );
        assert_eq!(report.overridden, vec!["preg_match", "sort"]);
        assert!(!report.source.contains("function strlen"));
        assert!(!report.source.contains("function exec"));
        assert!(report.source.contains("    }\n\n    public function sort(&$p0)\n"));
        assert!(report.source.ends_with("    }\n}\n"));
    }

    #[test]
    fn unknown_and_malformed_functions_are_skipped() {
        let mut bad = FunctionSignature::new("broken").required_ref("a");
        bad.parameters[0].position = 3;
        let mut inventory = inventory();
        inventory.push(bad);

        let report = ClassSynthesizer::default().synthesize(
            "Foo",
            &["missing", "broken", "sort"],
            &inventory,
        );
        assert_eq!(report.overridden, vec!["sort"]);
        let names: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["missing", "broken"]);
    }

    #[test]
    fn output_is_deterministic() {
        let functions = ["strlen", "preg_match", "sort"];
        let first = ClassSynthesizer::default().synthesize("A\\B", &functions, &inventory());
        let second = ClassSynthesizer::default().synthesize("A\\B", &functions, &inventory());
        assert_eq!(first.source, second.source);
    }

    #[test]
    fn class_name_split() {
        assert_eq!(
            ClassName::parse("Foo\\Bar\\Spam"),
            ClassName {
                namespace: Some("Foo\\Bar".into()),
                short_name: "Spam".into()
            }
        );
        assert_eq!(ClassName::parse("\\Spam").namespace, None);
        assert_eq!(ClassName::parse("A\\B").qualified(), "A\\B");
    }

    #[test]
    fn expansion_width_is_clamped() {
        assert_eq!(
            ClassSynthesizer::new(usize::MAX).ellipsis_expansion(),
            MAX_ELLIPSIS_EXPANSION
        );
        assert_eq!(ClassSynthesizer::new(3).ellipsis_expansion(), 3);
    }
}
