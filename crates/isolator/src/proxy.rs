//! Proxies that stand in for direct calls to global functions.
//!
//! Code that depends on an [`Isolator`] instead of calling globals directly can
//! be handed a fake in tests. [`BaseProxy`] forwards every call by value with
//! the arguments supplied; [`GeneratedProxy`] layers an activated
//! [`ProxyClass`] on top so functions with reference parameters, reference
//! returns or phantom defaults are forwarded faithfully.

use std::path::Path;
use std::sync::Arc;

use crate::artifact::{ProxyClass, ProxyMethod};
use crate::error::CallError;
use crate::host::Host;
use crate::value::Value;

/// One call argument: a value, or an alias to a caller-owned variable.
#[derive(Debug)]
pub enum Arg<'a> {
    Val(Value),
    Ref(&'a mut Value),
}

impl<'a> Arg<'a> {
    /// Alias a caller variable so by-reference parameters can write to it.
    pub fn by_ref(variable: &'a mut Value) -> Self {
        Self::Ref(variable)
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Val(value) => value,
            Self::Ref(variable) => variable,
        }
    }
}

impl<T: Into<Value>> From<T> for Arg<'_> {
    fn from(value: T) -> Self {
        Self::Val(value.into())
    }
}

/// Copy argument values into a fresh call frame.
fn frame_of(args: &[Arg<'_>]) -> Vec<Value> {
    args.iter().map(|arg| arg.value().clone()).collect()
}

/// Make calls to global functions via a mockable object.
pub trait Isolator: Send + Sync {
    /// Forward a call to the global function `name`.
    ///
    /// Besides functions, the language constructs `exit`, `die`, `echo`,
    /// `eval`, `include`, `include_once`, `require`, `require_once` and `new`
    /// are supported.
    fn call(&self, name: &str, args: &mut [Arg<'_>]) -> Result<Value, CallError>;
}

/// Shared handle to an isolator.
pub type SharedIsolator = Arc<dyn Isolator>;

/// Generic forwarding with language-construct special cases.
#[derive(Debug, Clone)]
pub struct BaseProxy {
    host: Arc<Host>,
}

impl BaseProxy {
    #[must_use]
    pub fn new(host: Arc<Host>) -> Self {
        Self { host }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    fn first(args: &[Arg<'_>]) -> Value {
        args.first().map(|arg| arg.value().clone()).unwrap_or_default()
    }

    /// Forward by value: the callee sees exactly the supplied arguments, and
    /// nothing it writes reaches the caller.
    pub fn forward(&self, name: &str, args: &[Arg<'_>]) -> Result<Value, CallError> {
        self.host.invoke(name, &mut frame_of(args))
    }
}

impl Isolator for BaseProxy {
    fn call(&self, name: &str, args: &mut [Arg<'_>]) -> Result<Value, CallError> {
        match name {
            "exit" | "die" => {
                let status = match Self::first(args) {
                    Value::Int(code) => i32::try_from(code).unwrap_or(255),
                    message => {
                        self.host.echo(&message.to_host_string())?;
                        0
                    }
                };
                self.host.exit(status)
            }
            "echo" => {
                self.host.echo(&Self::first(args).to_host_string())?;
                Ok(Value::Null)
            }
            "eval" => self.host.eval(&Self::first(args).to_host_string()),
            "include" | "include_once" | "require" | "require_once" => {
                let path = Self::first(args).to_host_string();
                self.host.include(
                    Path::new(&path),
                    name.ends_with("_once"),
                    name.starts_with("require"),
                )
            }
            "new" => {
                let Some((class, constructor_args)) = args.split_first() else {
                    return Err(CallError::ArgumentCount {
                        function: "new".to_string(),
                        expected: "at least 1".to_string(),
                        given: 0,
                    });
                };
                self.host
                    .construct(&class.value().to_host_string(), frame_of(constructor_args))
            }
            _ => self.forward(name, args),
        }
    }
}

/// A base proxy extended with an activated proxy class.
#[derive(Debug, Clone)]
pub struct GeneratedProxy {
    base: BaseProxy,
    class: Arc<ProxyClass>,
}

impl GeneratedProxy {
    #[must_use]
    pub fn new(class: Arc<ProxyClass>, host: Arc<Host>) -> Self {
        Self {
            base: BaseProxy::new(host),
            class,
        }
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ProxyClass> {
        &self.class
    }

    #[must_use]
    pub fn host(&self) -> &Arc<Host> {
        self.base.host()
    }

    fn dispatch(&self, method: &ProxyMethod, args: &mut [Arg<'_>]) -> Result<Value, CallError> {
        // Exact-arity branches and the fallback both forward every supplied
        // argument and nothing more; they differ only in which slots are
        // re-attached as references. Past `max_arity` only the declared
        // reference slots are re-attached.
        let mut frame = frame_of(args);
        let result = self.host().invoke(&method.function, &mut frame);

        for (position, (arg, value)) in args.iter_mut().zip(frame).enumerate() {
            if let Arg::Ref(variable) = arg
                && method.is_reference(position)
            {
                **variable = value;
            }
        }

        result
    }
}

impl Isolator for GeneratedProxy {
    fn call(&self, name: &str, args: &mut [Arg<'_>]) -> Result<Value, CallError> {
        match self.class.method(name) {
            Some(method) => self.dispatch(method, args),
            None => self.base.call(name, args),
        }
    }
}
