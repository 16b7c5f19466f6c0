use serde_json::json;
use tempfile::tempdir;

use crate::extension::error::ExtensionError;
use crate::extension::loader::{load_bundle, read_descriptor};
use crate::tests::integration::common::{
    bundle_document, class_registry, plugin_entry, write_bundle, RunnerProbe, BROKEN_CONTROLLER, PROBE_RUNNER,
    WIDGET_CONTROLLER,
};

#[tokio::test]
async fn test_load_bundle_instantiates_controllers() {
    let dir = tempdir().unwrap();
    let path = write_bundle(
        dir.path(),
        "erp.bundle",
        &bundle_document("erp", &[WIDGET_CONTROLLER], vec![plugin_entry("erp1", PROBE_RUNNER)]),
    );
    let extension = load_bundle(&path, &class_registry(&RunnerProbe::new())).await.unwrap();
    assert_eq!(extension.name(), "erp");
    assert_eq!(extension.path(), path.as_path());
    assert_eq!(extension.controllers().len(), 1);
    assert!(extension.descriptor().plugin("erp1").is_some());
    assert_eq!(extension.context().extension(), "erp");
}

#[tokio::test]
async fn test_missing_bundle() {
    let dir = tempdir().unwrap();
    let err = read_descriptor(&dir.path().join("absent.bundle")).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_directory_is_not_a_bundle() {
    let dir = tempdir().unwrap();
    let err = read_descriptor(dir.path()).await.unwrap_err();
    assert!(err.to_string().contains("not a regular file"));
}

#[tokio::test]
async fn test_bundle_without_descriptor() {
    let dir = tempdir().unwrap();
    let path = write_bundle(dir.path(), "empty.bundle", &json!({ "resources": ["a.txt"] }));
    let err = read_descriptor(&path).await.unwrap_err();
    assert!(matches!(err, ExtensionError::LoadError { ref message, .. } if message.contains("absent")));
}

#[tokio::test]
async fn test_controller_failure_fails_the_load() {
    let dir = tempdir().unwrap();
    let path = write_bundle(
        dir.path(),
        "broken.bundle",
        &bundle_document("broken", &[WIDGET_CONTROLLER, BROKEN_CONTROLLER], vec![]),
    );
    let err = load_bundle(&path, &class_registry(&RunnerProbe::new())).await.unwrap_err();
    assert!(err.to_string().contains(BROKEN_CONTROLLER));
}

#[tokio::test]
async fn test_reloaded_bundle_is_not_the_same_extension() {
    let dir = tempdir().unwrap();
    let path = write_bundle(dir.path(), "erp.bundle", &bundle_document("erp", &[], vec![]));
    let classes = class_registry(&RunnerProbe::new());
    let first = load_bundle(&path, &classes).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = load_bundle(&path, &classes).await.unwrap();
    assert!(first.is_same(&first));
    assert!(!first.is_same(&second));
}
