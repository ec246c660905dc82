//! Activation of generated proxy classes.
//!
//! [`ProxyClass::parse`] accepts exactly the dialect the class synthesizer
//! emits and turns it into a dispatch table. Anything else, including an
//! artifact whose arity switch and fallback disagree, is rejected with the
//! offending line.

use std::collections::HashMap;

use crate::error::ActivationError;
use crate::synth::class::{BASE_PROXY, ClassName};
use crate::synth::method::{ABSENT_DEFAULT, method_name};

const METHOD_PREFIX: &str = "    public function ";
const SWITCH_OPEN: &str = "        switch (\\func_num_args()) {";
const SWITCH_CLOSE: &str = "        }";
const CASE_PREFIX: &str = "            case ";
const COLLECT_ARGS: &str = "        $arguments = \\func_get_args();";
const REATTACH_PREFIX: &str = "        $arguments[";
const FORWARD_PREFIX: &str = "        return \\call_user_func_array(";
const FORWARD_SUFFIX: &str = ", $arguments);";

/// One activated override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMethod {
    pub method_name: String,
    /// Global function the method forwards to.
    pub function: String,
    pub returns_reference: bool,
    pub min_arity: usize,
    pub max_arity: usize,
    pub reference_flags: Vec<bool>,
}

impl ProxyMethod {
    #[must_use]
    pub fn is_reference(&self, position: usize) -> bool {
        self.reference_flags.get(position).copied().unwrap_or(false)
    }
}

/// An activated proxy class: its name and dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyClass {
    name: ClassName,
    methods: HashMap<String, ProxyMethod>,
    order: Vec<String>,
}

impl ProxyClass {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.name.qualified()
    }

    /// Override for a function, if the class defines one.
    #[must_use]
    pub fn method(&self, function: &str) -> Option<&ProxyMethod> {
        self.methods.get(&method_name(function))
    }

    /// Overrides in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &ProxyMethod> {
        self.order.iter().filter_map(|name| self.methods.get(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Activate a generated source unit.
    pub fn parse(source: &str) -> Result<Self, ActivationError> {
        let mut cursor = Cursor::new(source);
        let base = ClassName::parse(BASE_PROXY);

        cursor.expect("<?php")?;
        let namespace = match cursor.peek() {
            Some(line) if line.starts_with("namespace ") => {
                let (number, line) = cursor.take()?;
                let namespace = line
                    .strip_prefix("namespace ")
                    .and_then(|rest| rest.strip_suffix(';'))
                    .filter(|ns| !ns.is_empty())
                    .ok_or_else(|| ActivationError::new(number, "malformed namespace"))?;
                Some(namespace.to_string())
            }
            _ => None,
        };
        cursor.expect("")?;
        cursor.expect(&format!("use {BASE_PROXY};"))?;
        cursor.expect("")?;

        let (number, line) = cursor.take()?;
        let short_name = line
            .strip_prefix("class ")
            .and_then(|rest| rest.strip_suffix(&format!(" extends {}", base.short_name)))
            .filter(|name| !name.is_empty() && !name.contains(' '))
            .ok_or_else(|| ActivationError::new(number, "expected class declaration"))?;
        let name = ClassName {
            namespace,
            short_name: short_name.to_string(),
        };
        cursor.expect("{")?;

        let mut methods = HashMap::new();
        let mut order = Vec::new();
        loop {
            if cursor.peek() == Some("}") {
                cursor.take()?;
                break;
            }
            if !order.is_empty() {
                cursor.expect("")?;
            }
            let start = cursor.line_number();
            let method = parse_method(&mut cursor)?;
            if methods.contains_key(&method.method_name) {
                return Err(ActivationError::new(
                    start,
                    format!("duplicate method {}", method.method_name),
                ));
            }
            order.push(method.method_name.clone());
            methods.insert(method.method_name.clone(), method);
        }

        if let Some((number, _)) = cursor.remaining_content() {
            return Err(ActivationError::new(number, "content after class body"));
        }

        Ok(Self {
            name,
            methods,
            order,
        })
    }
}

struct Cursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
            pos: 0,
        }
    }

    /// 1-based number of the next line.
    fn line_number(&self) -> usize {
        self.pos + 1
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn take(&mut self) -> Result<(usize, &'a str), ActivationError> {
        let number = self.line_number();
        let line = self
            .peek()
            .ok_or_else(|| ActivationError::new(number, "unexpected end of artifact"))?;
        self.pos += 1;
        Ok((number, line))
    }

    fn expect(&mut self, expected: &str) -> Result<(), ActivationError> {
        let (number, line) = self.take()?;
        if line == expected {
            Ok(())
        } else {
            Err(ActivationError::new(
                number,
                format!("expected {expected:?}, found {line:?}"),
            ))
        }
    }

    fn remaining_content(&self) -> Option<(usize, &'a str)> {
        self.lines[self.pos..]
            .iter()
            .enumerate()
            .find(|(_, line)| !line.trim().is_empty())
            .map(|(offset, line)| (self.pos + offset + 1, *line))
    }
}

struct Header {
    method_name: String,
    returns_reference: bool,
    min_arity: usize,
    reference_flags: Vec<bool>,
}

fn parse_header(number: usize, line: &str) -> Result<Header, ActivationError> {
    let malformed = |message: &str| ActivationError::new(number, message.to_string());

    let rest = line
        .strip_prefix(METHOD_PREFIX)
        .ok_or_else(|| malformed("expected method declaration"))?;
    let (returns_reference, rest) = match rest.strip_prefix('&') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let open = rest
        .find('(')
        .ok_or_else(|| malformed("missing parameter list"))?;
    let method_name = &rest[..open];
    if method_name.is_empty()
        || !method_name
            .chars()
            .all(|c| c == '_' || c.is_ascii_alphanumeric())
    {
        return Err(malformed("invalid method name"));
    }
    let params = rest[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| malformed("unterminated parameter list"))?;

    let mut reference_flags = Vec::new();
    let mut min_arity = None;
    if !params.is_empty() {
        for (index, param) in params.split(", ").enumerate() {
            let (is_ref, param) = match param.strip_prefix('&') {
                Some(param) => (true, param),
                None => (false, param),
            };
            let (optional, param) = match param.strip_suffix(ABSENT_DEFAULT) {
                Some(param) => (true, param),
                None => (false, param),
            };
            if param != format!("$p{index}") {
                return Err(malformed(&format!("unexpected parameter {param}")));
            }
            match (optional, min_arity) {
                (true, None) => min_arity = Some(index),
                (false, Some(_)) => {
                    return Err(malformed("required parameter after optional parameter"));
                }
                _ => {}
            }
            reference_flags.push(is_ref);
        }
    }

    Ok(Header {
        method_name: method_name.to_string(),
        returns_reference,
        min_arity: min_arity.unwrap_or(reference_flags.len()),
        reference_flags,
    })
}

fn expected_arguments(arity: usize) -> String {
    (0..arity)
        .map(|index| format!("$p{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_case(number: usize, line: &str) -> Result<(usize, String, String), ActivationError> {
    let malformed = || ActivationError::new(number, format!("malformed case {line:?}"));

    let rest = line.strip_prefix(CASE_PREFIX).ok_or_else(malformed)?;
    let (arity, rest) = rest.split_once(": return \\").ok_or_else(malformed)?;
    let arity: usize = arity.parse().map_err(|_| malformed())?;
    let call = rest.strip_suffix(");").ok_or_else(malformed)?;
    let (function, arguments) = call.split_once('(').ok_or_else(malformed)?;
    Ok((arity, function.to_string(), arguments.to_string()))
}

fn unexport_string(number: usize, literal: &str) -> Result<String, ActivationError> {
    let inner = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| ActivationError::new(number, "expected quoted function name"))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(escaped @ ('\\' | '\'')) => out.push(escaped),
                _ => return Err(ActivationError::new(number, "invalid escape")),
            }
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

fn parse_method(cursor: &mut Cursor<'_>) -> Result<ProxyMethod, ActivationError> {
    let (number, line) = cursor.take()?;
    let header = parse_header(number, line)?;
    let max_arity = header.reference_flags.len();

    cursor.expect("    {")?;
    cursor.expect(SWITCH_OPEN)?;

    let mut function: Option<String> = None;
    let mut next_arity = header.min_arity;
    while cursor.peek().is_some_and(|l| l.starts_with(CASE_PREFIX)) {
        let (number, line) = cursor.take()?;
        let (arity, target, arguments) = parse_case(number, line)?;
        if arity != next_arity || arity > max_arity {
            return Err(ActivationError::new(
                number,
                format!("unexpected case {arity}, expected {next_arity}"),
            ));
        }
        if arguments != expected_arguments(arity) {
            return Err(ActivationError::new(
                number,
                format!("case {arity} forwards the wrong arguments"),
            ));
        }
        match &function {
            Some(existing) if *existing != target => {
                return Err(ActivationError::new(
                    number,
                    format!("case {arity} forwards to {target}, expected {existing}"),
                ));
            }
            Some(_) => {}
            None => function = Some(target),
        }
        next_arity += 1;
    }
    let Some(function) = function else {
        return Err(ActivationError::new(
            cursor.line_number(),
            "method has no arity cases",
        ));
    };
    if next_arity != max_arity + 1 {
        return Err(ActivationError::new(
            cursor.line_number(),
            format!("arity cases stop at {}, expected {max_arity}", next_arity - 1),
        ));
    }
    if method_name(&function) != header.method_name {
        return Err(ActivationError::new(
            number,
            format!("method {} forwards to {function}", header.method_name),
        ));
    }

    cursor.expect(SWITCH_CLOSE)?;
    cursor.expect("")?;
    cursor.expect(COLLECT_ARGS)?;

    let mut reattached = Vec::new();
    while cursor.peek().is_some_and(|l| l.starts_with(REATTACH_PREFIX)) {
        let (number, line) = cursor.take()?;
        let index = line
            .strip_prefix(REATTACH_PREFIX)
            .and_then(|rest| rest.split_once("] = &$p"))
            .and_then(|(index, slot)| {
                let slot = slot.strip_suffix(';')?;
                (index == slot).then(|| index.parse::<usize>().ok()).flatten()
            })
            .ok_or_else(|| ActivationError::new(number, "malformed reference re-attachment"))?;
        reattached.push(index);
    }
    let flagged: Vec<usize> = header
        .reference_flags
        .iter()
        .enumerate()
        .filter_map(|(index, &is_ref)| is_ref.then_some(index))
        .collect();
    if reattached != flagged {
        return Err(ActivationError::new(
            cursor.line_number(),
            "fallback reference slots disagree with the signature",
        ));
    }

    cursor.expect("")?;
    let (number, line) = cursor.take()?;
    let literal = line
        .strip_prefix(FORWARD_PREFIX)
        .and_then(|rest| rest.strip_suffix(FORWARD_SUFFIX))
        .ok_or_else(|| ActivationError::new(number, "expected generic forwarding"))?;
    if unexport_string(number, literal)? != function {
        return Err(ActivationError::new(
            number,
            format!("fallback does not forward to {function}"),
        ));
    }
    cursor.expect("    }")?;

    Ok(ProxyMethod {
        method_name: header.method_name,
        function,
        returns_reference: header.returns_reference,
        min_arity: header.min_arity,
        max_arity,
        reference_flags: header.reference_flags,
    })
}
