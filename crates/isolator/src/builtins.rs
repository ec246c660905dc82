//! Curated table of standard global functions.
//!
//! This is the live function inventory used when no other registry is
//! supplied. It deliberately mixes the signature shapes the proxy must handle:
//! plain by-value functions, variadics, reference outputs and optional
//! parameters whose default cannot be introspected.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::error::CallError;
use crate::registry::FunctionRegistry;
use crate::signature::FunctionSignature;
use crate::value::Value;

/// Longest string a builtin may produce.
pub const MAX_STRING_LEN: usize = 1 << 30;

/// Register every builtin into `registry`.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    register_string(registry);
    register_pcre(registry);
    register_array(registry);
    register_filesystem(registry);
    register_misc(registry);
}

fn string_arg(args: &[Value], position: usize, function: &str) -> Result<String, CallError> {
    match &args[position] {
        Value::Array(_) | Value::Object { .. } => Err(CallError::Type {
            function: function.to_string(),
            position: position + 1,
            expected: "string",
            given: args[position].type_name(),
        }),
        other => Ok(other.to_host_string()),
    }
}

fn array_arg<'a>(
    args: &'a [Value],
    position: usize,
    function: &str,
) -> Result<&'a [Value], CallError> {
    args[position].as_array().ok_or_else(|| CallError::Type {
        function: function.to_string(),
        position: position + 1,
        expected: "array",
        given: args[position].type_name(),
    })
}

fn register_string(registry: &mut FunctionRegistry) {
    registry.register(FunctionSignature::new("strlen").required("string"), |args| {
        Ok(Value::from(string_arg(args, 0, "strlen")?.len()))
    });

    registry.register(
        FunctionSignature::new("strtoupper").required("string"),
        |args| Ok(Value::from(string_arg(args, 0, "strtoupper")?.to_uppercase())),
    );

    registry.register(
        FunctionSignature::new("str_repeat")
            .required("string")
            .required("times"),
        |args| {
            let string = string_arg(args, 0, "str_repeat")?;
            let times = usize::try_from(args[1].to_int()).unwrap_or(0);
            match string.len().checked_mul(times) {
                Some(total) if total <= MAX_STRING_LEN => Ok(Value::from(string.repeat(times))),
                _ => Err(CallError::Script(
                    "str_repeat(): result exceeds the maximum string length".to_string(),
                )),
            }
        },
    );

    registry.register(
        FunctionSignature::new("implode")
            .required("separator")
            .required("array"),
        |args| {
            let separator = string_arg(args, 0, "implode")?;
            let pieces: Vec<String> = array_arg(args, 1, "implode")?
                .iter()
                .map(Value::to_host_string)
                .collect();
            Ok(Value::from(pieces.join(&separator)))
        },
    );

    registry.register(
        FunctionSignature::new("sprintf")
            .required("format")
            .variadic("values"),
        |args| {
            let format = string_arg(args, 0, "sprintf")?;
            format_values(&format, &args[1..]).map(Value::from)
        },
    );

    // `length` defaults to "the rest of the string", which no literal expresses.
    registry.register(
        FunctionSignature::new("substr")
            .required("string")
            .required("offset")
            .opaque("length"),
        |args| {
            let chars: Vec<char> = string_arg(args, 0, "substr")?.chars().collect();
            let len = chars.len() as i64;
            let mut start = args[1].to_int();
            if start < 0 {
                start = len.saturating_add(start).max(0);
            }
            let start = start.min(len);
            let end = match args.get(2) {
                None | Some(Value::Null) => len,
                Some(length) => {
                    let length = length.to_int();
                    if length < 0 {
                        len.saturating_add(length).max(start)
                    } else {
                        start.saturating_add(length).min(len)
                    }
                }
            };
            Ok(Value::from(
                chars[start as usize..end as usize].iter().collect::<String>(),
            ))
        },
    );

    registry.register(
        FunctionSignature::new("str_replace")
            .required("search")
            .required("replace")
            .required("subject")
            .opaque_ref("count"),
        |args| {
            let search = string_arg(args, 0, "str_replace")?;
            let replace = string_arg(args, 1, "str_replace")?;
            let subject = string_arg(args, 2, "str_replace")?;
            let count = if search.is_empty() {
                0
            } else {
                subject.matches(search.as_str()).count()
            };
            let result = if search.is_empty() {
                subject
            } else {
                subject.replace(&search, &replace)
            };
            if let Some(slot) = args.get_mut(3) {
                *slot = Value::from(count);
            }
            Ok(Value::from(result))
        },
    );
}

fn format_values(format: &str, values: &[Value]) -> Result<String, CallError> {
    let mut out = String::with_capacity(format.len());
    let mut values = values.iter();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let spec = chars.next().ok_or_else(|| {
            CallError::Script("sprintf(): missing format specifier at end of string".to_string())
        })?;
        if spec == '%' {
            out.push('%');
            continue;
        }
        let value = values.next().ok_or_else(|| CallError::ArgumentCount {
            function: "sprintf".to_string(),
            expected: "more".to_string(),
            given: 0,
        })?;
        match spec {
            'd' | 'i' => out.push_str(&value.to_int().to_string()),
            'f' | 'F' => out.push_str(&format!("{:.6}", value.to_float())),
            's' => out.push_str(&value.to_host_string()),
            'x' => out.push_str(&format!("{:x}", value.to_int())),
            other => {
                return Err(CallError::Script(format!(
                    "sprintf(): unknown format specifier \"{other}\""
                )));
            }
        }
    }
    Ok(out)
}

/// Compile a delimited pattern such as `/ab+c/i`.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let delimiter = pattern.chars().next()?;
    if delimiter.is_ascii_alphanumeric() || delimiter == '\\' {
        return None;
    }
    let closing = match delimiter {
        '(' => ')',
        '{' => '}',
        '[' => ']',
        '<' => '>',
        other => other,
    };
    let body_start = delimiter.len_utf8();
    let body_end = pattern.rfind(closing).filter(|&end| end >= body_start)?;
    if body_end == 0 {
        return None;
    }
    let mut builder = RegexBuilder::new(&pattern[body_start..body_end]);
    for modifier in pattern[body_end + closing.len_utf8()..].chars() {
        match modifier {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            'u' => builder.unicode(true),
            _ => return None,
        };
    }
    builder.build().ok()
}

fn register_pcre(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionSignature::new("preg_match")
            .required("pattern")
            .required("subject")
            .optional_ref("matches", Value::Null)
            .optional("flags", 0)
            .optional("offset", 0),
        |args| {
            let Some(regex) = compile_pattern(&string_arg(args, 0, "preg_match")?) else {
                return Ok(Value::Bool(false));
            };
            let subject = string_arg(args, 1, "preg_match")?;
            let offset = args
                .get(4)
                .map_or(0, |o| usize::try_from(o.to_int()).unwrap_or(0))
                .min(subject.len());
            let captures = subject
                .get(offset..)
                .and_then(|haystack| regex.captures(haystack));

            let matched = captures.is_some();
            if let Some(slot) = args.get_mut(2) {
                *slot = Value::Array(
                    captures
                        .map(|caps| {
                            caps.iter()
                                .map(|group| Value::from(group.map_or("", |m| m.as_str())))
                                .collect()
                        })
                        .unwrap_or_default(),
                );
            }
            Ok(Value::from(i64::from(matched)))
        },
    );

    registry.register(
        FunctionSignature::new("preg_replace")
            .required("pattern")
            .required("replacement")
            .required("subject")
            .optional("limit", -1)
            .opaque_ref("count"),
        |args| {
            let Some(regex) = compile_pattern(&string_arg(args, 0, "preg_replace")?) else {
                return Ok(Value::Null);
            };
            let replacement = expand_backreferences(&string_arg(args, 1, "preg_replace")?);
            let subject = string_arg(args, 2, "preg_replace")?;
            let limit = args.get(3).map_or(-1, Value::to_int);
            let found = regex.find_iter(&subject).count();
            let count = if limit < 0 {
                found
            } else {
                found.min(usize::try_from(limit).unwrap_or(0))
            };
            // A zero limit means "replace all" to the regex engine.
            let result = if count == 0 {
                subject.clone()
            } else {
                regex
                    .replacen(&subject, count, replacement.as_str())
                    .into_owned()
            };
            if let Some(slot) = args.get_mut(4) {
                *slot = Value::from(count);
            }
            Ok(Value::from(result))
        },
    );
}

/// Rewrite `\N` and `$N` group references into `${N}` and escape every other
/// `$`, so the replacement means the same thing to the regex engine.
fn expand_backreferences(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' | '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut group = String::new();
                while group.len() < 2 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            group.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => a
            .to_float()
            .partial_cmp(&b.to_float())
            .unwrap_or(Ordering::Equal),
        _ => a.to_host_string().cmp(&b.to_host_string()),
    }
}

fn register_array(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionSignature::new("sort")
            .required_ref("array")
            .optional("flags", 0),
        |args| match &mut args[0] {
            Value::Array(items) => {
                items.sort_by(compare_values);
                Ok(Value::Bool(true))
            }
            other => Err(CallError::Type {
                function: "sort".to_string(),
                position: 1,
                expected: "array",
                given: other.type_name(),
            }),
        },
    );

    registry.register(
        FunctionSignature::new("array_push")
            .required_ref("array")
            .variadic("values"),
        |args| {
            let (target, values) = args.split_at_mut(1);
            match &mut target[0] {
                Value::Array(items) => {
                    items.extend(values.iter().cloned());
                    Ok(Value::from(items.len()))
                }
                other => Err(CallError::Type {
                    function: "array_push".to_string(),
                    position: 1,
                    expected: "array",
                    given: other.type_name(),
                }),
            }
        },
    );

    registry.register(
        FunctionSignature::new("array_pop").required_ref("array"),
        |args| match &mut args[0] {
            Value::Array(items) => Ok(items.pop().unwrap_or(Value::Null)),
            other => Err(CallError::Type {
                function: "array_pop".to_string(),
                position: 1,
                expected: "array",
                given: other.type_name(),
            }),
        },
    );

    registry.register(FunctionSignature::new("count").required("value"), |args| {
        Ok(Value::from(array_arg(args, 0, "count")?.len()))
    });
}

fn register_filesystem(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionSignature::new("file_exists").required("filename"),
        |args| {
            let path = string_arg(args, 0, "file_exists")?;
            Ok(Value::Bool(std::path::Path::new(&path).exists()))
        },
    );

    registry.register(FunctionSignature::new("is_dir").required("filename"), |args| {
        let path = string_arg(args, 0, "is_dir")?;
        Ok(Value::Bool(std::path::Path::new(&path).is_dir()))
    });

    registry.register(
        FunctionSignature::new("file_get_contents").required("filename"),
        |args| {
            let path = string_arg(args, 0, "file_get_contents")?;
            Ok(std::fs::read_to_string(path).map_or(Value::Bool(false), Value::from))
        },
    );

    registry.register(
        FunctionSignature::new("file_put_contents")
            .required("filename")
            .required("data"),
        |args| {
            let path = string_arg(args, 0, "file_put_contents")?;
            let data = string_arg(args, 1, "file_put_contents")?;
            Ok(std::fs::write(path, data.as_bytes())
                .map_or(Value::Bool(false), |()| Value::from(data.len())))
        },
    );

    registry.register(FunctionSignature::new("unlink").required("filename"), |args| {
        let path = string_arg(args, 0, "unlink")?;
        Ok(Value::Bool(std::fs::remove_file(path).is_ok()))
    });
}

fn register_misc(registry: &mut FunctionRegistry) {
    // Without a name, every variable is returned; no literal default expresses that.
    registry.register(FunctionSignature::new("getenv").opaque("name"), |args| {
        match args.first() {
            None | Some(Value::Null) => Ok(Value::Array(
                std::env::vars()
                    .map(|(key, value)| Value::from(format!("{key}={value}")))
                    .collect(),
            )),
            Some(name) => Ok(std::env::var(name.to_host_string())
                .map_or(Value::Bool(false), Value::from)),
        }
    });

    registry.register(
        FunctionSignature::new("microtime").optional("as_float", false),
        |args| {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default();
            if args.first().is_some_and(Value::is_truthy) {
                Ok(Value::Float(now.as_secs_f64()))
            } else {
                Ok(Value::from(format!(
                    "{:.8} {}",
                    f64::from(now.subsec_micros()) / 1e6,
                    now.as_secs()
                )))
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        register_builtins(&mut registry);
        registry
    }

    fn call(name: &str, args: &mut [Value]) -> Value {
        registry().invoke(name, args).unwrap()
    }

    #[test]
    fn string_functions() {
        assert_eq!(call("strlen", &mut ["foo".into()]), Value::Int(3));
        assert_eq!(call("strtoupper", &mut ["abc".into()]), Value::from("ABC"));
        assert_eq!(
            call("str_repeat", &mut ["ab".into(), 3.into()]),
            Value::from("ababab")
        );
        assert_eq!(
            call("implode", &mut [",".into(), vec![1, 2, 3].into()]),
            Value::from("1,2,3")
        );
    }

    #[test]
    fn sprintf_formats_variadic_values() {
        assert_eq!(
            call(
                "sprintf",
                &mut ["%d-%s %%".into(), 7.into(), "x".into()]
            ),
            Value::from("7-x %")
        );
    }

    #[test]
    fn substr_distinguishes_omitted_length() {
        assert_eq!(
            call("substr", &mut ["abcdef".into(), 2.into()]),
            Value::from("cdef")
        );
        assert_eq!(
            call("substr", &mut ["abcdef".into(), 1.into(), 3.into()]),
            Value::from("bcd")
        );
        assert_eq!(
            call("substr", &mut ["abcdef".into(), (-2).into()]),
            Value::from("ef")
        );
        assert_eq!(
            call("substr", &mut ["abcdef".into(), 0.into(), 0.into()]),
            Value::from("")
        );
    }

    #[test]
    fn preg_match_fills_matches() {
        let mut frame = ["/(a)(b)?/".into(), "xa".into(), Value::Null];
        assert_eq!(call("preg_match", &mut frame), Value::Int(1));
        assert_eq!(frame[2], Value::from(vec!["a", "a", ""]));

        let mut frame = ["/z/".into(), "abc".into(), Value::Null];
        assert_eq!(call("preg_match", &mut frame), Value::Int(0));
        assert_eq!(frame[2], Value::Array(Vec::new()));

        assert_eq!(
            call("preg_match", &mut ["not a pattern".into(), "x".into()]),
            Value::Bool(false)
        );
        assert_eq!(
            call("preg_match", &mut ["/A/i".into(), "a".into()]),
            Value::Int(1)
        );
    }

    #[test]
    fn preg_replace_counts_replacements() {
        let mut frame = [
            "/o/".into(),
            "0".into(),
            "foo boo".into(),
            Value::Int(-1),
            Value::Null,
        ];
        assert_eq!(call("preg_replace", &mut frame), Value::from("f00 b00"));
        assert_eq!(frame[4], Value::Int(4));
    }

    #[test]
    fn preg_replace_keeps_literal_dollars() {
        let mut frame = [
            "/(\\w+)@(\\w+)/".into(),
            "$2 at \\1, $x costs $5".into(),
            "user@host".into(),
        ];
        assert_eq!(
            call("preg_replace", &mut frame),
            Value::from("host at user, $x costs ")
        );
        let mut frame = ["/a/".into(), "$$".into(), "banana".into()];
        assert_eq!(call("preg_replace", &mut frame), Value::from("b$$n$$n$$"));
    }

    #[test]
    fn oversized_lengths_do_not_overflow() {
        assert_eq!(
            call("substr", &mut ["abc".into(), 1.into(), Value::Int(i64::MAX)]),
            Value::from("bc")
        );
        assert_eq!(
            call("substr", &mut ["abc".into(), Value::Int(i64::MIN), Value::Int(i64::MIN)]),
            Value::from("")
        );
        let registry = registry();
        let mut frame = ["ab".into(), Value::Int(i64::MAX)];
        assert!(matches!(
            registry.invoke("str_repeat", &mut frame),
            Err(CallError::Script(_))
        ));
    }

    #[test]
    fn str_replace_reports_count() {
        let mut frame = ["a".into(), "b".into(), "banana".into(), Value::Null];
        assert_eq!(call("str_replace", &mut frame), Value::from("bbnbnb"));
        assert_eq!(frame[3], Value::Int(3));
    }

    #[test]
    fn array_functions_mutate_in_place() {
        let mut frame = [Value::from(vec![3, 1, 2])];
        assert_eq!(call("sort", &mut frame), Value::Bool(true));
        assert_eq!(frame[0], Value::from(vec![1, 2, 3]));

        let mut frame = [Value::from(vec![1]), 2.into(), 3.into()];
        assert_eq!(call("array_push", &mut frame), Value::Int(3));
        assert_eq!(frame[0], Value::from(vec![1, 2, 3]));

        let mut frame = [Value::from(vec![1, 2])];
        assert_eq!(call("array_pop", &mut frame), Value::Int(2));
        assert_eq!(frame[0], Value::from(vec![1]));
    }

    #[test]
    fn sort_rejects_non_arrays() {
        let err = registry().invoke("sort", &mut ["x".into()]).unwrap_err();
        assert!(matches!(err, CallError::Type { position: 1, .. }));
    }

    #[test]
    fn filesystem_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let name = Value::from(path.to_string_lossy().into_owned());
        assert_eq!(call("file_exists", &mut [name.clone()]), Value::Bool(false));
        assert_eq!(
            call("file_put_contents", &mut [name.clone(), "data".into()]),
            Value::Int(4)
        );
        assert_eq!(call("file_get_contents", &mut [name.clone()]), Value::from("data"));
        assert_eq!(call("unlink", &mut [name.clone()]), Value::Bool(true));
        assert_eq!(call("file_get_contents", &mut [name]), Value::Bool(false));
    }

    #[test]
    fn compile_pattern_requires_delimiters() {
        assert!(compile_pattern("/a+/").is_some());
        assert!(compile_pattern("{a+}i").is_some());
        assert!(compile_pattern("abc").is_none());
        assert!(compile_pattern("/a/q").is_none());
        assert!(compile_pattern("/").is_none());
    }
}
