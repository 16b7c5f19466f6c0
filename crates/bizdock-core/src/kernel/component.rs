use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;

/// Lifecycle of a runtime component owned by the [`Application`](crate::kernel::Application)
#[async_trait]
pub trait KernelComponent: Any + Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn initialize(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Components keyed by their concrete type
#[derive(Default, Debug)]
pub struct DependencyRegistry {
    instances: HashMap<TypeId, Arc<dyn KernelComponent>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under the type id of `V`, replacing any previous one
    pub fn register_instance<V>(&mut self, instance: Arc<V>)
    where
        V: KernelComponent + 'static,
    {
        self.instances.insert(TypeId::of::<V>(), instance);
    }

    pub fn get_component_by_id(&self, type_id: &TypeId) -> Option<Arc<dyn KernelComponent>> {
        self.instances.get(type_id).cloned()
    }

    pub fn get_concrete<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        let component = self.instances.get(&TypeId::of::<T>())?.clone();
        let any: Arc<dyn Any + Send + Sync> = component;
        Arc::downcast::<T>(any).ok()
    }

    pub fn get_all_components(&self) -> Vec<Arc<dyn KernelComponent>> {
        self.instances.values().cloned().collect()
    }

    pub fn get_registered_ids(&self) -> Vec<TypeId> {
        self.instances.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}
