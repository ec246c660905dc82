//! The host environment a proxy forwards into.
//!
//! Besides the function registry, a host supplies what the base proxy needs
//! for the language constructs that are not functions: an output sink for
//! `echo`, a script engine for `eval` and file inclusion, a class table for
//! dynamic construction, and the process exit hook.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::builtins;
use crate::config::IsolatorConfig;
use crate::error::CallError;
use crate::registry::FunctionRegistry;
use crate::value::Value;

/// Version reported by hosts built from the curated builtin table.
pub const BUILTIN_HOST_VERSION: &str = concat!("isolator-builtins/", env!("CARGO_PKG_VERSION"));

/// Evaluates host source code for `eval` and the include constructs.
pub trait ScriptEngine: Send + Sync {
    fn eval(&self, code: &str) -> Result<Value, CallError>;
}

/// Constructor registered for dynamic construction.
pub type Constructor = Arc<dyn Fn(Vec<Value>) -> Result<Value, CallError> + Send + Sync>;

/// Shared in-memory output sink.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Host environment.
pub struct Host {
    functions: FunctionRegistry,
    version: String,
    output: Mutex<Box<dyn Write + Send>>,
    engine: Option<Arc<dyn ScriptEngine>>,
    classes: HashMap<String, Constructor>,
    included: Mutex<HashSet<PathBuf>>,
    exit: fn(i32) -> !,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("version", &self.version)
            .field("functions", &self.functions)
            .field("engine", &self.engine.is_some())
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

impl Host {
    #[must_use]
    pub fn builder(functions: FunctionRegistry) -> HostBuilder {
        HostBuilder {
            functions,
            version: BUILTIN_HOST_VERSION.to_string(),
            output: Box::new(std::io::stdout()),
            engine: None,
            classes: HashMap::new(),
            exit: std::process::exit,
        }
    }

    /// Host over the curated builtin table with the configured functions
    /// disabled.
    #[must_use]
    pub fn with_builtins(config: &IsolatorConfig) -> Self {
        let mut functions = FunctionRegistry::new();
        builtins::register_builtins(&mut functions);
        functions.disable(&config.disabled_functions);
        Self::builder(functions).build()
    }

    #[must_use]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Version string used for artifact fingerprints.
    ///
    /// Disabling a function changes the generated class, so the disabled set is
    /// part of the environment identity.
    #[must_use]
    pub fn environment_version(&self) -> String {
        let disabled = self.functions.disabled_names();
        if disabled.is_empty() {
            self.version.clone()
        } else {
            format!("{};disabled={}", self.version, disabled.join(","))
        }
    }

    pub fn invoke(&self, name: &str, frame: &mut [Value]) -> Result<Value, CallError> {
        self.functions.invoke(name, frame)
    }

    pub fn echo(&self, text: &str) -> Result<(), CallError> {
        let mut output = self.output.lock();
        output.write_all(text.as_bytes())?;
        output.flush()?;
        Ok(())
    }

    pub fn eval(&self, code: &str) -> Result<Value, CallError> {
        match &self.engine {
            Some(engine) => engine.eval(code),
            None => Err(CallError::Unsupported(
                "eval() requires a script engine".to_string(),
            )),
        }
    }

    /// Evaluate a file through the script engine.
    ///
    /// `once` skips files already included and returns `true`. A missing file
    /// yields `false` unless `required`, which fails instead.
    pub fn include(&self, path: &Path, once: bool, required: bool) -> Result<Value, CallError> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if once && self.included.lock().contains(&key) {
            return Ok(Value::Bool(true));
        }

        let code = match std::fs::read_to_string(path) {
            Ok(code) => code,
            Err(_) if required => return Err(CallError::RequireFailed(path.to_path_buf())),
            Err(_) => return Ok(Value::Bool(false)),
        };

        self.included.lock().insert(key);
        let result = self.eval(&code)?;
        Ok(if result.is_null() { Value::Int(1) } else { result })
    }

    /// Construct an instance of a registered class.
    pub fn construct(&self, class: &str, arguments: Vec<Value>) -> Result<Value, CallError> {
        let constructor = self
            .classes
            .get(class.trim_start_matches('\\'))
            .ok_or_else(|| CallError::UnknownClass(class.to_string()))?;
        constructor(arguments)
    }

    pub fn exit(&self, status: i32) -> ! {
        (self.exit)(status)
    }
}

/// Builder for [`Host`].
pub struct HostBuilder {
    functions: FunctionRegistry,
    version: String,
    output: Box<dyn Write + Send>,
    engine: Option<Arc<dyn ScriptEngine>>,
    classes: HashMap<String, Constructor>,
    exit: fn(i32) -> !,
}

impl HostBuilder {
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: impl ScriptEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    #[must_use]
    pub fn class<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.classes.insert(name.to_string(), Arc::new(constructor));
        self
    }

    #[must_use]
    pub fn exit_handler(mut self, exit: fn(i32) -> !) -> Self {
        self.exit = exit;
        self
    }

    #[must_use]
    pub fn build(self) -> Host {
        Host {
            functions: self.functions,
            version: self.version,
            output: Mutex::new(self.output),
            engine: self.engine,
            classes: self.classes,
            included: Mutex::new(HashSet::new()),
            exit: self.exit,
        }
    }
}
