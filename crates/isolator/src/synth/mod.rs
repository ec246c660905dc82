//! Source generation for proxy classes.

pub mod class;
pub mod method;

pub use class::{BASE_PROXY, ClassName, ClassSynthesizer, SkippedFunction, SynthesisReport};
pub use method::{method_name, synthesize_method};
