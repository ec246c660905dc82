//! Isolator configuration.
//!
//! Values come from the environment, falling back to defaults when a variable
//! is unset or malformed:
//! - `ISOLATOR_CACHE_DIR`: directory for generated artifacts
//!   (default `<temp>/isolator`).
//! - `ISOLATOR_CLASS`: name of the generated class (default `Isolator\Isolator`).
//! - `ISOLATOR_ELLIPSIS_EXPANSION`: slots a variadic parameter expands into
//!   (default 10, must be positive, clamped to 64).
//! - `ISOLATOR_DISABLE_FUNCTIONS`: comma-separated functions to disable.
//! - `ISOLATOR_LOG`: path of a JSONL log file; unset disables logging.

use std::path::PathBuf;

use crate::inspect::{DEFAULT_ELLIPSIS_EXPANSION, MAX_ELLIPSIS_EXPANSION};

/// Default name of the generated proxy class.
pub const DEFAULT_CLASS_NAME: &str = "Isolator\\Isolator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatorConfig {
    pub storage_root: PathBuf,
    pub class_name: String,
    pub ellipsis_expansion: usize,
    pub disabled_functions: Vec<String>,
    pub log_path: Option<PathBuf>,
}

impl Default for IsolatorConfig {
    fn default() -> Self {
        Self {
            storage_root: std::env::temp_dir().join("isolator"),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            ellipsis_expansion: DEFAULT_ELLIPSIS_EXPANSION,
            disabled_functions: Vec::new(),
            log_path: None,
        }
    }
}

impl IsolatorConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("ISOLATOR_CACHE_DIR") {
            config.storage_root = PathBuf::from(dir);
        }
        if let Some(class) = non_empty("ISOLATOR_CLASS") {
            config.class_name = class.trim().to_string();
        }
        if let Some(width) = non_empty("ISOLATOR_ELLIPSIS_EXPANSION") {
            config.ellipsis_expansion = parse_expansion(&width);
        }
        if let Some(list) = non_empty("ISOLATOR_DISABLE_FUNCTIONS") {
            config.disabled_functions = parse_function_list(&list);
        }
        config.log_path = non_empty("ISOLATOR_LOG").map(PathBuf::from);
        config
    }
}

fn parse_expansion(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(width) if width > 0 => width.min(MAX_ELLIPSIS_EXPANSION),
        _ => DEFAULT_ELLIPSIS_EXPANSION,
    }
}

/// Split a comma list, dropping blanks and duplicates while keeping order.
fn parse_function_list(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}
