use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::error::Result;

#[derive(Debug, Default)]
struct CountingComponent {
    starts: AtomicUsize,
}

#[async_trait]
impl KernelComponent for CountingComponent {
    fn name(&self) -> &'static str {
        "CountingComponent"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct OtherComponent;

#[async_trait]
impl KernelComponent for OtherComponent {
    fn name(&self) -> &'static str {
        "OtherComponent"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_registry_lookup_by_concrete_type() {
    let mut registry = DependencyRegistry::new();
    let counting = Arc::new(CountingComponent::default());
    registry.register_instance(counting.clone());

    let found = registry.get_concrete::<CountingComponent>().unwrap();
    assert!(Arc::ptr_eq(&found, &counting));
    assert!(registry.get_concrete::<OtherComponent>().is_none());

    let by_id = registry.get_component_by_id(&TypeId::of::<CountingComponent>()).unwrap();
    by_id.start().await.unwrap();
    assert_eq!(counting.starts.load(Ordering::SeqCst), 1);

    registry.register_instance(Arc::new(OtherComponent));
    assert_eq!(registry.get_all_components().len(), 2);
    assert_eq!(registry.get_registered_ids().len(), 2);

    registry.clear();
    assert!(registry.get_all_components().is_empty());
}
