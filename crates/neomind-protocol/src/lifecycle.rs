//! Lifecycle hooks.
//!
//! Each device/product event has one slot; setting a slot again replaces the
//! previous hook. Dispatching an event with an empty slot succeeds without
//! doing anything. Init callbacks run in registration order and disposers
//! run at most once.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::Result;
use crate::operator::{DeviceOperator, ProductOperator};

/// Hook invoked with a device.
pub type DeviceHook = Arc<dyn Fn(Arc<dyn DeviceOperator>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Hook invoked with a product.
pub type ProductHook = Arc<dyn Fn(Arc<dyn ProductOperator>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callback receiving the protocol configuration on init.
pub type InitCallback = Arc<dyn Fn(&Configuration) + Send + Sync>;

/// Callback run once on dispose.
pub type Disposer = Box<dyn FnOnce() + Send>;

/// Device lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    Register,
    UnRegister,
    MetadataChanged,
}

/// Product lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductEvent {
    Register,
    UnRegister,
    MetadataChanged,
}

/// Wrap an async closure as a [`DeviceHook`].
pub fn device_hook<F, Fut>(hook: F) -> DeviceHook
where
    F: Fn(Arc<dyn DeviceOperator>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |device| hook(device).boxed())
}

/// Wrap an async closure as a [`ProductHook`].
pub fn product_hook<F, Fut>(hook: F) -> ProductHook
where
    F: Fn(Arc<dyn ProductOperator>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |product| hook(product).boxed())
}

#[derive(Default)]
struct DeviceSlots {
    register: Option<DeviceHook>,
    unregister: Option<DeviceHook>,
    metadata_changed: Option<DeviceHook>,
}

impl DeviceSlots {
    fn slot(&mut self, event: DeviceEvent) -> &mut Option<DeviceHook> {
        match event {
            DeviceEvent::Register => &mut self.register,
            DeviceEvent::UnRegister => &mut self.unregister,
            DeviceEvent::MetadataChanged => &mut self.metadata_changed,
        }
    }

    fn get(&self, event: DeviceEvent) -> Option<DeviceHook> {
        match event {
            DeviceEvent::Register => self.register.clone(),
            DeviceEvent::UnRegister => self.unregister.clone(),
            DeviceEvent::MetadataChanged => self.metadata_changed.clone(),
        }
    }
}

#[derive(Default)]
struct ProductSlots {
    register: Option<ProductHook>,
    unregister: Option<ProductHook>,
    metadata_changed: Option<ProductHook>,
}

impl ProductSlots {
    fn slot(&mut self, event: ProductEvent) -> &mut Option<ProductHook> {
        match event {
            ProductEvent::Register => &mut self.register,
            ProductEvent::UnRegister => &mut self.unregister,
            ProductEvent::MetadataChanged => &mut self.metadata_changed,
        }
    }

    fn get(&self, event: ProductEvent) -> Option<ProductHook> {
        match event {
            ProductEvent::Register => self.register.clone(),
            ProductEvent::UnRegister => self.unregister.clone(),
            ProductEvent::MetadataChanged => self.metadata_changed.clone(),
        }
    }
}

/// Single-slot lifecycle hooks plus init and dispose callbacks.
#[derive(Default)]
pub struct LifecycleHookTable {
    device: RwLock<DeviceSlots>,
    product: RwLock<ProductSlots>,
    init: RwLock<Vec<InitCallback>>,
    disposers: Mutex<Vec<Disposer>>,
}

impl LifecycleHookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook for a device event, replacing any previous one.
    pub fn set_device_hook(&self, event: DeviceEvent, hook: DeviceHook) {
        *self.device.write().slot(event) = Some(hook);
    }

    pub fn device_hook(&self, event: DeviceEvent) -> Option<DeviceHook> {
        self.device.read().get(event)
    }

    /// Install the hook for a product event, replacing any previous one.
    pub fn set_product_hook(&self, event: ProductEvent, hook: ProductHook) {
        *self.product.write().slot(event) = Some(hook);
    }

    pub fn product_hook(&self, event: ProductEvent) -> Option<ProductHook> {
        self.product.read().get(event)
    }

    /// Run the hook for `event`, or nothing if unset.
    pub async fn fire_device(&self, event: DeviceEvent, device: Arc<dyn DeviceOperator>) -> Result<()> {
        match self.device_hook(event) {
            Some(hook) => hook(device).await,
            None => Ok(()),
        }
    }

    /// Run the hook for `event`, or nothing if unset.
    pub async fn fire_product(&self, event: ProductEvent, product: Arc<dyn ProductOperator>) -> Result<()> {
        match self.product_hook(event) {
            Some(hook) => hook(product).await,
            None => Ok(()),
        }
    }

    pub fn add_init(&self, callback: InitCallback) {
        self.init.write().push(callback);
    }

    /// Run every init callback in registration order with the same map.
    pub fn run_init(&self, config: &Configuration) {
        let callbacks = self.init.read().clone();
        for callback in callbacks {
            callback(config);
        }
    }

    pub fn add_disposer(&self, disposer: Disposer) {
        self.disposers.lock().push(disposer);
    }

    /// Run and drop all disposers. Returns how many ran.
    pub fn run_disposers(&self) -> usize {
        let disposers = std::mem::take(&mut *self.disposers.lock());
        let count = disposers.len();
        for disposer in disposers {
            disposer();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Device(&'static str);

    impl DeviceOperator for Device {
        fn device_id(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let table = LifecycleHookTable::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        table.set_device_hook(
            DeviceEvent::Register,
            device_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        );
        let counter = Arc::clone(&second);
        table.set_device_hook(
            DeviceEvent::Register,
            device_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        );

        table.fire_device(DeviceEvent::Register, Arc::new(Device("d1"))).await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_error_propagates() {
        let table = LifecycleHookTable::new();
        table.set_device_hook(
            DeviceEvent::UnRegister,
            device_hook(|device| async move {
                Err(anyhow::anyhow!("cannot release {}", device.device_id()).into())
            }),
        );

        let err = table
            .fire_device(DeviceEvent::UnRegister, Arc::new(Device("d2")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot release d2"));
    }

    #[test]
    fn test_disposers_run_once() {
        let table = LifecycleHookTable::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        table.add_disposer(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(table.run_disposers(), 1);
        assert_eq!(table.run_disposers(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
