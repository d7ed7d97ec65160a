mod common;

use autoreg_core::cache::CacheStore;
use autoreg_core::inject::CodeInjector;
use autoreg_core::pipeline::InjectionStatus;
use autoreg_core::{AutoregError, PipelineState};
use autoreg_java::ClassFileCodec;
use common::*;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[test]
fn test_end_to_end_tree_and_archive() {
    let ws = Workspace::new();
    let classes = ws.classes_dir(
        "classes",
        &entries(&[implementer("com/example/Foo"), registry()]),
    );
    let lib = ws.jar("lib.jar", &entries(&[implementer("com/example/Bar")]));
    let config = plugin_config();

    let mut pipeline = ws.pipeline(&config, &[&lib], &[&classes]);
    let report = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(
        pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Foo", "com/example/Bar"]
    );

    let registry_out = ws.output_dir().join("classes/com/example/Registry.class");
    let bytes = fs::read(&registry_out).unwrap();
    assert_eq!(register_calls(&bytes), 2);
    assert_eq!(constructed(&bytes), vec!["com/example/Foo", "com/example/Bar"]);
    assert_eq!(
        report.injections[0].status,
        InjectionStatus::Injected { count: 2 }
    );

    // Input tree is untouched, the copy was rewritten.
    let registry_in = fs::read(classes.join("com/example/Registry.class")).unwrap();
    assert_eq!(register_calls(&registry_in), 0);

    let destination = &report.archives[0].destination;
    let name = destination.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("lib_") && name.ends_with(".jar"), "{name}");
    assert!(destination.exists());

    let cached = CacheStore::new(ws.cache_file()).load(config.fingerprint());
    assert_eq!(cached.len(), 1);
    let key = std::path::absolute(&lib).unwrap();
    assert_eq!(
        cached[key.to_string_lossy().as_ref()].implementers[PLUGIN],
        vec!["com/example/Bar".to_string()]
    );
}

#[test]
fn test_unchanged_archive_skips_scan_and_copy() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let lib = ws.jar("lib.jar", &entries(&[implementer("com/example/Bar")]));
    let config = plugin_config();

    let first = ws.pipeline(&config, &[&lib], &[&classes]).run().unwrap();
    assert!(!first.archives[0].cache_hit);
    assert!(first.archives[0].classified > 0);
    assert!(first.archives[0].copied);

    let mut second_pipeline = ws.pipeline(&config, &[&lib], &[&classes]);
    let second = second_pipeline.run().unwrap();
    assert!(second.archives[0].cache_hit);
    assert_eq!(second.archives[0].classified, 0);
    assert!(!second.archives[0].copied);
    assert!(second.archives[0].destination.exists());

    // Cached harvests still feed the registration list.
    assert_eq!(
        second_pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Bar"]
    );
    let bytes = fs::read(ws.output_dir().join("classes/com/example/Registry.class")).unwrap();
    assert_eq!(register_calls(&bytes), 1);
}

#[test]
fn test_registry_archive_is_always_copied() {
    let ws = Workspace::new();
    let lib = ws.jar(
        "app.jar",
        &entries(&[implementer("com/example/Foo"), registry()]),
    );
    let config = plugin_config();

    let first = ws.pipeline(&config, &[&lib], &[]).run().unwrap();
    let destination = first.archives[0].destination.clone();
    let entry = format!("{REGISTRY}.class");
    assert_eq!(register_calls(&read_jar_entry(&destination, &entry)), 1);

    let second = ws.pipeline(&config, &[&lib], &[]).run().unwrap();
    assert!(second.archives[0].cache_hit);
    assert_eq!(second.archives[0].classified, 0);
    assert!(second.archives[0].copied);

    // Re-copied from the input, so exactly one round of calls.
    assert_eq!(register_calls(&read_jar_entry(&destination, &entry)), 1);
}

#[test]
fn test_changed_archive_is_rescanned() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let config = plugin_config();

    let lib = ws.jar("lib.jar", &entries(&[implementer("com/example/Bar")]));
    ws.pipeline(&config, &[&lib], &[&classes]).run().unwrap();

    ws.jar(
        "lib.jar",
        &entries(&[implementer("com/example/Bar"), implementer("com/example/Baz")]),
    );
    let mut pipeline = ws.pipeline(&config, &[&lib], &[&classes]);
    let report = pipeline.run().unwrap();

    assert!(!report.archives[0].cache_hit);
    assert!(report.archives[0].copied);
    assert_eq!(
        pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Bar", "com/example/Baz"]
    );
}

#[test]
fn test_same_size_archive_with_restored_mtime_is_rescanned() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let config = plugin_config();
    let lib = ws.path("in/lib.jar");
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);

    write_stored_jar(&lib, &entries(&[implementer("com/example/Foo")]));
    let first_size = fs::metadata(&lib).unwrap().len();
    set_mtime(&lib, mtime);
    ws.pipeline(&config, &[&lib], &[&classes]).run().unwrap();

    write_stored_jar(&lib, &entries(&[implementer("com/example/Goo")]));
    assert_eq!(fs::metadata(&lib).unwrap().len(), first_size);
    set_mtime(&lib, mtime);

    let mut pipeline = ws.pipeline(&config, &[&lib], &[&classes]);
    let report = pipeline.run().unwrap();

    assert!(!report.archives[0].cache_hit);
    assert_eq!(
        pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Goo"]
    );
    let bytes = fs::read(ws.output_dir().join("classes/com/example/Registry.class")).unwrap();
    assert_eq!(constructed(&bytes), vec!["com/example/Goo"]);
}

#[cfg(unix)]
#[test]
fn test_symlinked_unit_in_tree_is_scanned_and_copied() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let outside = ws.classes_dir("elsewhere", &entries(&[implementer("com/example/Foo")]));
    std::os::unix::fs::symlink(
        outside.join("com/example/Foo.class"),
        classes.join("com/example/Foo.class"),
    )
    .unwrap();

    let config = plugin_config();
    let mut pipeline = ws.pipeline(&config, &[], &[&classes]);
    pipeline.run().unwrap();

    assert_eq!(
        pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Foo"]
    );
    let copied = ws.output_dir().join("classes/com/example/Foo.class");
    assert!(copied.is_file());
    let bytes = fs::read(ws.output_dir().join("classes/com/example/Registry.class")).unwrap();
    assert_eq!(constructed(&bytes), vec!["com/example/Foo"]);
}

#[test]
fn test_order_follows_archive_path_not_input_order() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let x = ws.jar("x.jar", &entries(&[implementer("com/example/A")]));
    let y = ws.jar("y.jar", &entries(&[implementer("com/example/B")]));
    let config = plugin_config();

    let mut forward = ws.pipeline(&config, &[&x, &y], &[&classes]);
    forward.run().unwrap();
    let mut reverse = ws.pipeline(&config, &[&y, &x], &[&classes]);
    reverse.run().unwrap();

    assert_eq!(
        forward.discoveries()[0].implementer_names(),
        vec!["com/example/A", "com/example/B"]
    );
    assert_eq!(forward.discoveries(), reverse.discoveries());

    let bytes = fs::read(ws.output_dir().join("classes/com/example/Registry.class")).unwrap();
    assert_eq!(constructed(&bytes), vec!["com/example/A", "com/example/B"]);
}

#[test]
fn test_no_implementers_leaves_target_byte_identical() {
    let ws = Workspace::new();
    let (entry, original) = registry();
    let classes = ws.classes_dir("classes", &[(entry.as_str(), original.clone())]);

    let report = ws.pipeline(&plugin_config(), &[], &[&classes]).run().unwrap();

    assert_eq!(report.injections[0].status, InjectionStatus::NoImplementers);
    let bytes = fs::read(ws.output_dir().join("classes").join(&entry)).unwrap();
    assert_eq!(bytes, original);
}

#[test]
fn test_missing_target_is_not_fatal() {
    let ws = Workspace::new();
    let lib = ws.jar("lib.jar", &entries(&[implementer("com/example/Bar")]));

    let mut pipeline = ws.pipeline(&plugin_config(), &[&lib], &[]);
    let report = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(report.injections[0].status, InjectionStatus::MissingTarget);
}

#[test]
fn test_injecting_twice_is_rejected() {
    let ws = Workspace::new();
    let classes = ws.classes_dir(
        "classes",
        &entries(&[implementer("com/example/Foo"), registry()]),
    );
    let config = plugin_config();
    let mut pipeline = ws.pipeline(&config, &[], &[&classes]);
    pipeline.run().unwrap();

    let err = pipeline.inject().unwrap_err();
    assert!(matches!(
        err,
        AutoregError::InvalidTransition {
            from: PipelineState::Done,
            to: PipelineState::Injecting
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Done);

    let registry_out = ws.output_dir().join("classes/com/example/Registry.class");
    assert_eq!(register_calls(&fs::read(&registry_out).unwrap()), 1);

    // Bypassing the state machine duplicates every registration.
    let discovery = pipeline.discoveries()[0].clone();
    let tracked = config.tracked().unwrap();
    let injector = CodeInjector::new(Arc::new(ClassFileCodec::new()));
    injector
        .inject(
            &tracked[0],
            discovery.target.as_ref().unwrap(),
            &discovery.implementers,
        )
        .unwrap();
    assert_eq!(register_calls(&fs::read(&registry_out).unwrap()), 2);
}

#[test]
fn test_reset_allows_a_fresh_run() {
    let ws = Workspace::new();
    let classes = ws.classes_dir(
        "classes",
        &entries(&[implementer("com/example/Foo"), registry()]),
    );
    let mut pipeline = ws.pipeline(&plugin_config(), &[], &[&classes]);
    pipeline.run().unwrap();

    pipeline.reset().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Init);
    assert!(pipeline.discoveries().is_empty());
    pipeline.run().unwrap();

    // The tree is mirrored again before injection, so no duplicates.
    let registry_out = ws.output_dir().join("classes/com/example/Registry.class");
    assert_eq!(register_calls(&fs::read(&registry_out).unwrap()), 1);
}

#[test]
fn test_injection_failure_moves_to_failed() {
    let ws = Workspace::new();
    let broken_registry = autoreg_java::fixture::ClassFixture::new(REGISTRY).to_bytes();
    let (foo, foo_bytes) = implementer("com/example/Foo");
    let classes = ws.classes_dir(
        "classes",
        &[
            (foo.as_str(), foo_bytes),
            ("com/example/Registry.class", broken_registry),
        ],
    );

    let mut pipeline = ws.pipeline(&plugin_config(), &[], &[&classes]);
    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, AutoregError::Injection { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(pipeline.reset().is_ok());
}

#[test]
fn test_stale_outputs_and_cache_entries_are_dropped() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let keep = ws.jar("keep.jar", &entries(&[implementer("com/example/A")]));
    let gone = ws.jar("gone.jar", &entries(&[implementer("com/example/B")]));
    let config = plugin_config();

    let first = ws.pipeline(&config, &[&keep, &gone], &[&classes]).run().unwrap();
    let gone_copy = first
        .archives
        .iter()
        .find(|a| a.archive.ends_with("gone.jar"))
        .unwrap()
        .destination
        .clone();
    assert!(gone_copy.exists());

    ws.pipeline(&config, &[&keep], &[&classes]).run().unwrap();

    assert!(!gone_copy.exists());
    let cached = CacheStore::new(ws.cache_file()).load(config.fingerprint());
    assert_eq!(cached.len(), 1);
    assert!(cached.keys().all(|k| k.ends_with("keep.jar")));
}

#[test]
fn test_overstated_entry_size_does_not_abort_the_run() {
    let ws = Workspace::new();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));
    let lib = ws.path("in/lib.jar");
    write_stored_jar(&lib, &entries(&[implementer("com/example/Foo")]));
    overstate_entry_sizes(&lib, 0xFFFF_FFF0);
    let config = plugin_config();

    let mut pipeline = ws.pipeline(&config, &[&lib], &[&classes]);
    let report = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(report.archives.len(), 1);
    assert!(report.archives[0].destination.exists());
}

#[test]
fn test_malformed_units_and_archives_are_skipped() {
    let ws = Workspace::new();
    let (foo, foo_bytes) = implementer("com/example/Foo");
    let lib = ws.jar(
        "lib.jar",
        &[
            (foo.as_str(), foo_bytes),
            ("com/example/Broken.class", b"not a class".to_vec()),
        ],
    );
    let not_a_zip = ws.path("in/corrupt.jar");
    fs::write(&not_a_zip, b"garbage").unwrap();
    let classes = ws.classes_dir("classes", &entries(&[registry()]));

    let mut pipeline = ws.pipeline(&plugin_config(), &[&lib, &not_a_zip], &[&classes]);
    let report = pipeline.run().unwrap();

    assert_eq!(
        pipeline.discoveries()[0].implementer_names(),
        vec!["com/example/Foo"]
    );
    assert!(report.archives.iter().all(|a| a.copied));
}

#[test]
fn test_missing_archive_input_is_fatal() {
    let ws = Workspace::new();
    let missing = ws.path("in/missing.jar");

    let mut pipeline = ws.pipeline(&plugin_config(), &[&missing], &[]);
    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, AutoregError::Input { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}
