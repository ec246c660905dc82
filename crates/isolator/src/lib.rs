//! Mockable proxies for global functions.
//!
//! Code that calls global functions through an [`Isolator`] can be handed a
//! test double instead. This crate provides:
//! - Signature inspection: arity range and reference slots per function.
//! - Classification: which functions the generic forwarding cannot serve.
//! - Synthesis: source text for a proxy class with one override per such
//!   function.
//! - Activation: parsing that source into a dispatch table.
//! - Caching: fingerprinted, persisted artifacts reused across processes.
//! - A process-wide instance holder and a per-object slot.

pub mod artifact;
pub mod builtins;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod global;
pub mod host;
pub mod inspect;
pub mod inventory;
pub mod proxy;
pub mod registry;
pub mod signature;
pub mod structured_log;
pub mod synth;
#[allow(unsafe_code)]
pub mod umask;
pub mod value;

pub use artifact::{ProxyClass, ProxyMethod};
pub use cache::{ArtifactLoader, ArtifactOrigin, LoadedArtifact};
pub use classify::{Classification, OverrideReason, classify, needs_override};
pub use config::IsolatorConfig;
pub use error::{ActivationError, CallError, LoadError, ReflectionError, SignatureError};
pub use fingerprint::Fingerprint;
pub use global::{IsolatorContext, IsolatorSlot};
pub use host::{Host, OutputBuffer, ScriptEngine};
pub use inspect::{ArityProfile, DEFAULT_ELLIPSIS_EXPANSION, MAX_ELLIPSIS_EXPANSION, inspect};
pub use inventory::{Inventory, SignatureSource};
pub use proxy::{Arg, BaseProxy, GeneratedProxy, Isolator, SharedIsolator};
pub use registry::FunctionRegistry;
pub use signature::{FunctionSignature, ParamKind, Parameter};
pub use synth::{ClassSynthesizer, SynthesisReport};
pub use value::Value;
