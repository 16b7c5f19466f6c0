use std::sync::Arc;

use crate::extension::classes::ClassRegistry;
use crate::extension::error::ExtensionError;
use crate::tests::integration::common::{
    class_registry, RunnerProbe, WidgetController, BROKEN_CONTROLLER, PROBE_RUNNER, WIDGET_CONTROLLER,
};
use crate::web_command::controller::Controller;

#[test]
fn test_host_classes_are_visible_to_every_extension() {
    let registry = class_registry(&RunnerProbe::new());
    let first = registry.context_for("a");
    let second = registry.context_for("b");
    assert_eq!(first.instantiate_controller(WIDGET_CONTROLLER).unwrap().class_name(), WIDGET_CONTROLLER);
    assert!(second.instantiate_runner(PROBE_RUNNER).is_ok());
    assert_eq!(first.extension(), "a");
}

#[test]
fn test_private_classes_stay_in_their_extension() {
    let registry = ClassRegistry::builder()
        .bundle_controller("private", "p.Controller", || {
            Ok(Arc::new(WidgetController) as Arc<dyn Controller>)
        })
        .build();
    assert!(registry.context_for("private").instantiate_controller("p.Controller").is_ok());
    let err = registry.context_for("other").instantiate_controller("p.Controller").unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::UnknownClass { ref extension, ref class_name } if extension == "other" && class_name == "p.Controller"
    ));
}

#[test]
fn test_failing_factory() {
    let registry = class_registry(&RunnerProbe::new());
    let err = registry.context_for("a").instantiate_controller(BROKEN_CONTROLLER).unwrap_err();
    assert!(err.to_string().contains("no database connection"));
}

#[test]
fn test_panicking_factory_is_an_error() {
    let registry = ClassRegistry::builder()
        .controller("p.Panics", || -> Result<Arc<dyn Controller>, _> { panic!("factory bug") })
        .build();
    let err = registry.context_for("a").instantiate_controller("p.Panics").unwrap_err();
    assert!(err.to_string().contains("panicked"));
}

#[test]
fn test_runner_and_controller_namespaces_are_distinct() {
    let registry = class_registry(&RunnerProbe::new());
    let context = registry.context_for("a");
    assert!(context.instantiate_runner(WIDGET_CONTROLLER).is_err());
    assert!(context.instantiate_controller(PROBE_RUNNER).is_err());
}
