use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::debug;
use tokio::fs;

use crate::extension::classes::{ClassRegistry, LoadingContext};
use crate::extension::descriptor::ExtensionDescriptor;
use crate::extension::error::ExtensionError;
use crate::extension::i18n::AddedMessages;
use crate::web_command::controller::Controller;

/// File extension of bundle files
pub const BUNDLE_EXTENSION: &str = "bundle";

/// A loaded bundle
pub struct Extension {
    name: String,
    path: PathBuf,
    loading_time: SystemTime,
    context: LoadingContext,
    descriptor: Arc<ExtensionDescriptor>,
    controllers: Vec<Arc<dyn Controller>>,
    pub(crate) messages: Vec<AddedMessages>,
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("loading_time", &self.loading_time)
            .field("controllers", &self.controllers.len())
            .finish_non_exhaustive()
    }
}

impl Extension {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loading_time(&self) -> SystemTime {
        self.loading_time
    }

    pub fn context(&self) -> &LoadingContext {
        &self.context
    }

    pub fn descriptor(&self) -> &Arc<ExtensionDescriptor> {
        &self.descriptor
    }

    pub fn controllers(&self) -> &[Arc<dyn Controller>] {
        &self.controllers
    }

    /// Same bundle, same load
    pub fn is_same(&self, other: &Extension) -> bool {
        self.name == other.name && self.path == other.path && self.loading_time == other.loading_time
    }
}

/// Read and validate the descriptor resource of a bundle file.
pub async fn read_descriptor(path: &Path) -> Result<ExtensionDescriptor, ExtensionError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ExtensionError::load_with_source(path, "the bundle file does not exist", e))?;
    if !metadata.is_file() {
        return Err(ExtensionError::load(path, "the bundle is not a regular file"));
    }

    let content = fs::read(path)
        .await
        .map_err(|e| ExtensionError::load_with_source(path, "unable to read the bundle", e))?;

    match ExtensionDescriptor::from_bundle_bytes(&content) {
        Ok(Some(descriptor)) => Ok(descriptor),
        Ok(None) => Err(ExtensionError::load(path, "the descriptor resource is absent")),
        Err(e) => Err(ExtensionError::load_with_source(path, "the descriptor cannot be parsed", e)),
    }
}

/// Turn a bundle file into an [`Extension`]: read its descriptor, create
/// its loading context and instantiate its declared controllers.
pub async fn load_bundle(path: &Path, classes: &Arc<ClassRegistry>) -> Result<Extension, ExtensionError> {
    let loading_time = SystemTime::now();
    let descriptor = read_descriptor(path).await?;
    let context = classes.context_for(&descriptor.name);

    let mut controllers = Vec::with_capacity(descriptor.controllers.len());
    for class_name in &descriptor.controllers {
        let controller = context.instantiate_controller(class_name).map_err(|e| {
            ExtensionError::load_with_source(
                path,
                format!("unable to instantiate the controller '{}'", class_name),
                e,
            )
        })?;
        debug!("Instantiated controller {} of {}", class_name, descriptor.name);
        controllers.push(controller);
    }

    Ok(Extension {
        name: descriptor.name.clone(),
        path: path.to_path_buf(),
        loading_time,
        context,
        descriptor: Arc::new(descriptor),
        controllers,
        messages: Vec::new(),
    })
}
