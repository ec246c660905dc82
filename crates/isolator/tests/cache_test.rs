//! Artifact generation, persistence and reuse.

use std::fs;
use std::sync::Arc;

use isolator::structured_log::{LogEmitter, events, validate_log_line};
use isolator::umask::current_umask;
use isolator::{
    ArtifactLoader, ArtifactOrigin, ClassSynthesizer, FunctionRegistry, FunctionSignature, Host,
    Isolator, LoadError, SignatureSource, Value,
};

fn host() -> Host {
    let mut functions = FunctionRegistry::new();
    functions.register(FunctionSignature::new("length").required("s"), |args| {
        Ok(Value::from(args[0].to_host_string().len()))
    });
    functions.register(
        FunctionSignature::new("grow").required_ref("items").variadic("values"),
        |args| {
            let (target, values) = args.split_at_mut(1);
            if let Value::Array(items) = &mut target[0] {
                items.extend(values.iter().cloned());
                return Ok(Value::from(items.len()));
            }
            Ok(Value::Null)
        },
    );
    Host::builder(functions).version("cache-test/1").build()
}

#[test]
fn second_loader_reuses_persisted_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(host());

    let first = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
    let generated = first.load("Cache\\Proxy", &host).unwrap();
    assert_eq!(generated.origin, ArtifactOrigin::Generated);
    assert_eq!(first.generation_count(), 1);
    assert!(generated.path.is_file());
    assert_eq!(
        generated.path.file_name().unwrap().to_string_lossy(),
        format!("Isolator{}.php", generated.fingerprint)
    );

    let second = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
    let cached = second.load("Cache\\Proxy", &host).unwrap();
    assert_eq!(cached.origin, ArtifactOrigin::Cached);
    assert_eq!(second.generation_count(), 0);
    assert_eq!(cached.fingerprint, generated.fingerprint);
    assert_eq!(*cached.class, *generated.class);

    let proxy = second.instantiate("Cache\\Proxy", Arc::clone(&host)).unwrap();
    let mut items = Value::from(vec![1]);
    let len = proxy
        .call("grow", &mut [isolator::Arg::by_ref(&mut items), 2.into()])
        .unwrap();
    assert_eq!(len, Value::Int(2));
    assert_eq!(items, Value::from(vec![1, 2]));
}

#[test]
fn different_inventories_get_different_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let loader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
    let all = loader.load("P", &host).unwrap();
    let some = loader.load_functions("P", &["length"], &host).unwrap();
    assert_ne!(all.fingerprint, some.fingerprint);
    assert!(some.class.is_empty());
    assert_eq!(all.class.len(), 1);
    assert_eq!(loader.generation_count(), 2);
}

#[test]
fn synthesis_is_deterministic() {
    let host = host();
    let names = host.functions().function_names();
    let synthesizer = ClassSynthesizer::default();
    let a = synthesizer.synthesize("Det\\Proxy", &names, host.functions());
    let b = synthesizer.synthesize("Det\\Proxy", &names, host.functions());
    assert_eq!(a.source, b.source);
}

#[cfg(unix)]
#[test]
fn artifact_is_read_only_and_directory_open() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("fresh");
    let loader = ArtifactLoader::new(&root, ClassSynthesizer::default());
    let loaded = loader.load("P", &host()).unwrap();

    let file_mode = fs::metadata(&loaded.path).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o444);
    let dir_mode = fs::metadata(&root).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode, 0o777);
}

#[cfg(unix)]
#[test]
fn umask_restored_after_success_and_failure() {
    let before = current_umask();
    let dir = tempfile::tempdir().unwrap();
    let host = host();

    let loader = ArtifactLoader::new(dir.path().join("ok"), ClassSynthesizer::default());
    loader.load("P", &host).unwrap();
    assert_eq!(current_umask(), before);

    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let loader = ArtifactLoader::new(blocker.join("cache"), ClassSynthesizer::default());
    let err = loader.load("P", &host).unwrap_err();
    assert!(matches!(err, LoadError::Persistence { .. }));
    assert_eq!(current_umask(), before);
}

#[test]
fn corrupted_artifact_fails_activation() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let loader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
    let names = host.functions().function_names();
    let path = loader.artifact_path(&loader.fingerprint("P", &names, &host));
    fs::write(&path, "<?php\n\nthis is not a class\n").unwrap();

    let err = loader.load("P", &host).unwrap_err();
    match err {
        LoadError::Activation { path: failed, source } => {
            assert_eq!(failed, path);
            assert_eq!(source.line, 3);
        }
        other => panic!("expected activation failure, got {other:?}"),
    }
    assert_eq!(loader.generation_count(), 0);
}

#[test]
fn loads_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let (emitter, buffer) = LogEmitter::to_buffer("cache-test");
    let loader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default()).with_log(emitter);

    loader
        .load_functions("P", &["grow", "vanished"], &host)
        .unwrap();
    let reader = ArtifactLoader::new(dir.path(), ClassSynthesizer::default());
    reader.load_functions("P", &["grow", "vanished"], &host).unwrap();

    let contents = buffer.contents();
    let entries: Vec<_> = contents
        .lines()
        .enumerate()
        .map(|(i, line)| validate_log_line(line, i + 1).unwrap())
        .collect();
    let names: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec![events::FUNCTION_SKIPPED, events::ARTIFACT_GENERATED]);
    assert_eq!(entries[0].function.as_deref(), Some("vanished"));
    assert!(entries[1].fingerprint.is_some());
}
