//! Error families for reflection, synthesis, activation, persistence and
//! forwarded calls.

use std::path::PathBuf;

use thiserror::Error;

/// The host cannot describe a function.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReflectionError {
    #[error("function {0}() does not exist")]
    UnknownFunction(String),
}

/// A signature shape the method synthesizer cannot express.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{function}: invalid function name")]
    InvalidName { function: String },
    #[error("{function}: parameter #{index} declares position {declared}")]
    PositionMismatch {
        function: String,
        index: usize,
        declared: usize,
    },
    #[error("{function}: variadic parameter ${name} is not last")]
    VariadicNotLast { function: String, name: String },
}

/// The generated artifact could not be activated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ActivationError {
    pub line: usize,
    pub message: String,
}

impl ActivationError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Failure while locating, generating, persisting or activating an artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot persist isolator artifact {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot activate isolator artifact {path}: {source}")]
    Activation {
        path: PathBuf,
        #[source]
        source: ActivationError,
    },
    #[error("artifact {path} declares class {found}, expected {expected}")]
    ClassMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Failure of a forwarded call. The proxy never translates these: callers see
/// exactly what the underlying function reported.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("call to undefined function {0}()")]
    UndefinedFunction(String),
    #[error("{0}() has been disabled for security reasons")]
    Disabled(String),
    #[error("{function}() expects {expected} argument(s), {given} given")]
    ArgumentCount {
        function: String,
        expected: String,
        given: usize,
    },
    #[error("{function}(): argument #{position} must be of type {expected}, {given} given")]
    Type {
        function: String,
        position: usize,
        expected: &'static str,
        given: &'static str,
    },
    #[error("{0}")]
    Unsupported(String),
    #[error("failed opening required '{}'", .0.display())]
    RequireFailed(PathBuf),
    #[error("class \"{0}\" not found")]
    UnknownClass(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}
