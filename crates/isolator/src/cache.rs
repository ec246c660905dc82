//! Artifact cache and loader.
//!
//! Generated classes are persisted under a storage root, one file per
//! fingerprint, and activated into [`ProxyClass`] dispatch tables. A class
//! already active in this loader, or already on disk, is reused without
//! running the synthesizer again.
//!
//! Concurrent processes may race to generate the same fingerprint. Each writes
//! a private temporary file and renames it into place, so the last writer wins
//! and every reader sees a complete artifact.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::artifact::ProxyClass;
use crate::config::IsolatorConfig;
use crate::error::LoadError;
use crate::fingerprint::{Fingerprint, GENERATOR_VERSION};
use crate::host::Host;
use crate::inventory::SignatureSource;
use crate::proxy::GeneratedProxy;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, events};
use crate::synth::class::{ClassName, ClassSynthesizer, SynthesisReport};
use crate::umask::UmaskGuard;

/// Permission bits of the storage directory.
pub const DIRECTORY_MODE: u32 = 0o777;
/// Permission bits of a persisted artifact.
pub const ARTIFACT_MODE: u32 = 0o444;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where a loaded class came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// Already activated by this loader.
    Active,
    /// Read from an existing artifact file.
    Cached,
    /// Synthesized and persisted by this call.
    Generated,
}

/// An activated class together with its cache identity.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub class: Arc<ProxyClass>,
    pub fingerprint: Fingerprint,
    pub path: PathBuf,
    pub origin: ArtifactOrigin,
}

/// Loads proxy classes, generating and persisting them on first use.
#[derive(Debug)]
pub struct ArtifactLoader {
    root: PathBuf,
    synthesizer: ClassSynthesizer,
    /// Activated classes keyed by fingerprint and qualified class name.
    active: Mutex<HashMap<(Fingerprint, String), Arc<ProxyClass>>>,
    generations: AtomicUsize,
    log: Option<Arc<Mutex<LogEmitter>>>,
}

impl ArtifactLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, synthesizer: ClassSynthesizer) -> Self {
        Self {
            root: root.into(),
            synthesizer,
            active: Mutex::new(HashMap::new()),
            generations: AtomicUsize::new(0),
            log: None,
        }
    }

    /// Loader over the configured storage root and expansion width. A
    /// configured log file that cannot be opened leaves logging disabled.
    #[must_use]
    pub fn from_config(config: &IsolatorConfig) -> Self {
        let loader = Self::new(
            &config.storage_root,
            ClassSynthesizer::new(config.ellipsis_expansion),
        );
        match config
            .log_path
            .as_deref()
            .map(|path| LogEmitter::to_file(path, &std::process::id().to_string()))
        {
            Some(Ok(emitter)) => loader.with_log(emitter),
            _ => loader,
        }
    }

    #[must_use]
    pub fn with_log(mut self, emitter: LogEmitter) -> Self {
        self.log = Some(Arc::new(Mutex::new(emitter)));
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of classes this loader has synthesized.
    #[must_use]
    pub fn generation_count(&self) -> usize {
        self.generations.load(Ordering::Relaxed)
    }

    /// Generator identity folded into fingerprints. The expansion width
    /// changes emitted methods, so it is part of it.
    #[must_use]
    pub fn generator_version(&self) -> String {
        format!(
            "{GENERATOR_VERSION}/expand={}",
            self.synthesizer.ellipsis_expansion()
        )
    }

    #[must_use]
    pub fn fingerprint<S: AsRef<str>>(
        &self,
        class_name: &str,
        functions: &[S],
        host: &Host,
    ) -> Fingerprint {
        Fingerprint::compute(
            class_name,
            functions,
            &host.environment_version(),
            &self.generator_version(),
        )
    }

    #[must_use]
    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint.artifact_file_name())
    }

    /// Load a class covering every function the host defines.
    pub fn load(&self, class_name: &str, host: &Host) -> Result<LoadedArtifact, LoadError> {
        let functions = host.functions().function_names();
        self.load_functions(class_name, &functions, host)
    }

    /// Load a class covering `functions`.
    pub fn load_functions<S: AsRef<str>>(
        &self,
        class_name: &str,
        functions: &[S],
        host: &Host,
    ) -> Result<LoadedArtifact, LoadError> {
        let started = Instant::now();
        let fingerprint = self.fingerprint(class_name, functions, host);
        let path = self.artifact_path(&fingerprint);
        let key = (fingerprint.clone(), ClassName::parse(class_name).qualified());

        if let Some(class) = self.active.lock().get(&key).cloned() {
            return Ok(LoadedArtifact {
                class,
                fingerprint,
                path,
                origin: ArtifactOrigin::Active,
            });
        }

        let loaded = if path.is_file() {
            self.reuse(class_name, &path)
                .map(|class| (class, ArtifactOrigin::Cached))
        } else {
            self.generate(class_name, functions, host.functions(), &path)
                .map(|class| (class, ArtifactOrigin::Generated))
        };

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match loaded {
            Ok((class, origin)) => {
                let event = match origin {
                    ArtifactOrigin::Generated => events::ARTIFACT_GENERATED,
                    _ => events::ARTIFACT_REUSED,
                };
                self.log(
                    LogEntry::new(String::new(), LogLevel::Info, event)
                        .with_class(class_name)
                        .with_fingerprint(fingerprint.as_str())
                        .with_artifact(&path)
                        .with_outcome(Outcome::Pass)
                        .with_duration_ms(elapsed)
                        .with_details(serde_json::json!({ "overrides": class.len() })),
                );
                let class = Arc::clone(
                    self.active
                        .lock()
                        .entry(key)
                        .or_insert(class),
                );
                Ok(LoadedArtifact {
                    class,
                    fingerprint,
                    path,
                    origin,
                })
            }
            Err(err) => {
                self.log(
                    LogEntry::new(String::new(), LogLevel::Error, events::ARTIFACT_FAILED)
                        .with_class(class_name)
                        .with_fingerprint(fingerprint.as_str())
                        .with_artifact(&path)
                        .with_outcome(Outcome::Fail)
                        .with_duration_ms(elapsed)
                        .with_details(serde_json::json!({ "error": err.to_string() })),
                );
                Err(err)
            }
        }
    }

    /// Load the host's full inventory and wrap it in a proxy.
    pub fn instantiate(
        &self,
        class_name: &str,
        host: Arc<Host>,
    ) -> Result<GeneratedProxy, LoadError> {
        let loaded = self.load(class_name, &host)?;
        Ok(GeneratedProxy::new(loaded.class, host))
    }

    fn reuse(&self, class_name: &str, path: &Path) -> Result<Arc<ProxyClass>, LoadError> {
        let source = fs::read_to_string(path).map_err(|source| LoadError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        activate(class_name, path, &source)
    }

    fn generate<S: AsRef<str>>(
        &self,
        class_name: &str,
        functions: &[S],
        source: &dyn SignatureSource,
        path: &Path,
    ) -> Result<Arc<ProxyClass>, LoadError> {
        let persistence = |source| LoadError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let report = {
            let _umask = UmaskGuard::relaxed();
            ensure_directory(&self.root).map_err(persistence)?;
            let report = self.synthesizer.synthesize(class_name, functions, source);
            self.generations.fetch_add(1, Ordering::Relaxed);
            persist(path, &report.source).map_err(persistence)?;
            report
        };

        self.log_skips(class_name, &report);
        activate(class_name, path, &report.source)
    }

    fn log_skips(&self, class_name: &str, report: &SynthesisReport) {
        for skipped in &report.skipped {
            self.log(
                LogEntry::new(String::new(), LogLevel::Warn, events::FUNCTION_SKIPPED)
                    .with_class(class_name)
                    .with_function(&skipped.name)
                    .with_outcome(Outcome::Skip)
                    .with_details(serde_json::json!({ "reason": skipped.reason })),
            );
        }
    }

    fn log(&self, entry: LogEntry) {
        if let Some(log) = &self.log {
            // Logging never fails a load.
            let _ = log.lock().emit_entry(entry);
        }
    }
}

fn activate(class_name: &str, path: &Path, source: &str) -> Result<Arc<ProxyClass>, LoadError> {
    let class = ProxyClass::parse(source).map_err(|source| LoadError::Activation {
        path: path.to_path_buf(),
        source,
    })?;
    let expected = ClassName::parse(class_name).qualified();
    let found = class.qualified_name();
    if found != expected {
        return Err(LoadError::ClassMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }
    Ok(Arc::new(class))
}

/// Create the storage directory; an existing directory is fine.
fn ensure_directory(root: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIRECTORY_MODE);
    }
    match builder.create(root) {
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists && root.is_dir() => Ok(()),
        other => other,
    }
}

/// Write `contents` to a read-only file at `path` via a temporary sibling.
fn persist(path: &Path, contents: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = write_read_only(&temp, contents).and_then(|()| fs::rename(&temp, path));
    if written.is_err() {
        let _ = fs::remove_file(&temp);
    }
    written
}

fn write_read_only(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(ARTIFACT_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    #[cfg(not(unix))]
    {
        let mut permissions = file.metadata()?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FunctionRegistry;
    use crate::signature::FunctionSignature;
    use crate::value::Value;

    fn host() -> Host {
        let mut functions = FunctionRegistry::new();
        functions.register(FunctionSignature::new("length").required("s"), |args| {
            Ok(Value::from(args[0].to_host_string().len()))
        });
        functions.register(
            FunctionSignature::new("fill").required("n").optional_ref("out", Value::Null),
            |args| {
                if args.len() > 1 {
                    args[1] = args[0].clone();
                }
                Ok(Value::Bool(true))
            },
        );
        Host::builder(functions).version("test-host/1").build()
    }

    #[test]
    fn persist_replaces_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Isolatorabc.php");
        persist(&path, "first").unwrap();
        persist(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn ensure_directory_tolerates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a/b");
        ensure_directory(&root).unwrap();
        ensure_directory(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn ensure_directory_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "x").unwrap();
        assert!(ensure_directory(&file).is_err());
    }

    #[test]
    fn second_load_is_active() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
        let host = host();
        let first = loader.load("Test\\Proxy", &host).unwrap();
        let second = loader.load("Test\\Proxy", &host).unwrap();
        assert_eq!(first.origin, ArtifactOrigin::Generated);
        assert_eq!(second.origin, ArtifactOrigin::Active);
        assert!(Arc::ptr_eq(&first.class, &second.class));
        assert_eq!(loader.generation_count(), 1);
        assert!(first.class.method("fill").is_some());
        assert!(first.class.method("length").is_none());
    }

    #[test]
    fn active_classes_are_not_shared_across_class_names() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
        let host = host();
        let foo = loader.load_functions("Foo", &["fill"], &host).unwrap();
        let foofill = loader.load_functions::<&str>("Foofill", &[], &host).unwrap();
        assert_ne!(foo.fingerprint, foofill.fingerprint);
        assert_eq!(foo.class.qualified_name(), "Foo");
        assert_eq!(foofill.class.qualified_name(), "Foofill");
        assert_eq!(foofill.origin, ArtifactOrigin::Generated);

        let again = loader.load_functions::<&str>("Foofill", &[], &host).unwrap();
        assert_eq!(again.origin, ArtifactOrigin::Active);
        assert!(Arc::ptr_eq(&again.class, &foofill.class));

        let fresh = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
        let reloaded = fresh.load_functions::<&str>("Foofill", &[], &host).unwrap();
        assert_eq!(reloaded.origin, ArtifactOrigin::Cached);
        assert_eq!(reloaded.class.qualified_name(), "Foofill");
    }

    #[test]
    fn expansion_width_changes_fingerprint() {
        let host = host();
        let narrow = ArtifactLoader::new("/unused", ClassSynthesizer::new(2));
        let wide = ArtifactLoader::new("/unused", ClassSynthesizer::new(10));
        assert_ne!(
            narrow.fingerprint("P", &["fill"], &host),
            wide.fingerprint("P", &["fill"], &host)
        );
    }

    #[test]
    fn renamed_class_is_a_mismatch() {
        let source = ClassSynthesizer::default()
            .synthesize::<&str>("Other", &[], &FunctionRegistry::new())
            .source;
        let err = activate("Expected", Path::new("x.php"), &source).unwrap_err();
        assert!(matches!(err, LoadError::ClassMismatch { .. }));
        assert!(activate("\\Other", Path::new("x.php"), &source).is_ok());
    }
}
