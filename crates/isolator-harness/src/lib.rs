//! Tooling behind the `isolator` command.
//!
//! This crate provides:
//! - Source generation for a class over the live builtins or a JSON inventory.
//! - Per-function inspection: arity profile and override classification.
//! - Fingerprinting and cache warming for the configured storage root.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use serde::Serialize;

use isolator::{
    ArityProfile, ArtifactLoader, ArtifactOrigin, Classification, ClassSynthesizer, Fingerprint,
    Host, Inventory, IsolatorConfig, LoadError, ReflectionError, SignatureSource, SynthesisReport,
    classify, inspect,
};

/// Where function signatures come from.
#[derive(Debug)]
pub enum InventorySource {
    /// The builtin host, with configured functions disabled.
    Live(Host),
    /// A signature table loaded from JSON.
    File(Inventory),
}

impl InventorySource {
    pub fn load(
        inventory: Option<&Path>,
        config: &IsolatorConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(match inventory {
            Some(path) => Self::File(Inventory::from_file(path)?),
            None => Self::Live(Host::with_builtins(config)),
        })
    }

    #[must_use]
    pub fn signatures(&self) -> &dyn SignatureSource {
        match self {
            Self::Live(host) => host.functions(),
            Self::File(inventory) => inventory,
        }
    }
}

/// Synthesize `class_name` over `functions`, or the whole inventory.
#[must_use]
pub fn generate(
    source: &InventorySource,
    class_name: &str,
    functions: Option<&[String]>,
    config: &IsolatorConfig,
) -> SynthesisReport {
    let signatures = source.signatures();
    let names = match functions {
        Some(names) => names.to_vec(),
        None => signatures.function_names(),
    };
    ClassSynthesizer::new(config.ellipsis_expansion).synthesize(class_name, &names, signatures)
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub function: String,
    #[serde(flatten)]
    pub classification: Classification,
    pub profile: ArityProfile,
}

pub fn inspect_function(
    source: &InventorySource,
    function: &str,
    config: &IsolatorConfig,
) -> Result<InspectReport, ReflectionError> {
    let signature = source.signatures().reflect(function)?;
    Ok(InspectReport {
        function: signature.name.clone(),
        classification: classify(&signature),
        profile: inspect(&signature, config.ellipsis_expansion),
    })
}

/// Fingerprint of the configured class over the live builtin inventory.
#[must_use]
pub fn fingerprint(config: &IsolatorConfig) -> Fingerprint {
    let host = Host::with_builtins(config);
    let loader = ArtifactLoader::from_config(config);
    loader.fingerprint(&config.class_name, &host.functions().function_names(), &host)
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmReport {
    pub class_name: String,
    pub fingerprint: String,
    pub path: PathBuf,
    pub origin: &'static str,
    pub overrides: usize,
}

/// Load the configured class, generating its artifact when missing.
pub fn warm(config: &IsolatorConfig) -> Result<WarmReport, LoadError> {
    let host = Host::with_builtins(config);
    let loaded = ArtifactLoader::from_config(config).load(&config.class_name, &host)?;
    Ok(WarmReport {
        class_name: loaded.class.qualified_name(),
        fingerprint: loaded.fingerprint.to_string(),
        path: loaded.path,
        origin: match loaded.origin {
            ArtifactOrigin::Active => "active",
            ArtifactOrigin::Cached => "reused",
            ArtifactOrigin::Generated => "generated",
        },
        overrides: loaded.class.len(),
    })
}
