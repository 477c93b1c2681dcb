//! Outbound message interceptors.
//!
//! Interceptors see every message the platform sends to a device before it
//! goes out (`pre_send`) and the replies that come back (`after_sent`).
//! A protocol holds an [`InterceptorChain`]; adding a second interceptor
//! promotes the chain to a composite that runs all of them in registration
//! order. Callers only ever see one interceptor handle.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::Result;
use crate::message::{DeviceMessage, DeviceMessageReply};
use crate::operator::DeviceOperator;

/// Hook around outbound device messages.
#[async_trait]
pub trait DeviceMessageSenderInterceptor: Send + Sync {
    /// Transform a message before it is sent.
    async fn pre_send(
        &self,
        _device: &dyn DeviceOperator,
        message: DeviceMessage,
    ) -> Result<DeviceMessage> {
        Ok(message)
    }

    /// Transform the replies of a sent message.
    async fn after_sent(
        &self,
        _device: &dyn DeviceOperator,
        _message: &DeviceMessage,
        replies: Vec<DeviceMessageReply>,
    ) -> Result<Vec<DeviceMessageReply>> {
        Ok(replies)
    }
}

/// Interceptor that passes everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInterceptor;

#[async_trait]
impl DeviceMessageSenderInterceptor for NoopInterceptor {}

/// Runs several interceptors in order.
#[derive(Clone, Default)]
pub struct CompositeInterceptor {
    interceptors: Vec<Arc<dyn DeviceMessageSenderInterceptor>>,
}

impl CompositeInterceptor {
    pub fn new(interceptors: Vec<Arc<dyn DeviceMessageSenderInterceptor>>) -> Self {
        Self { interceptors }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

#[async_trait]
impl DeviceMessageSenderInterceptor for CompositeInterceptor {
    async fn pre_send(
        &self,
        device: &dyn DeviceOperator,
        mut message: DeviceMessage,
    ) -> Result<DeviceMessage> {
        for interceptor in &self.interceptors {
            message = interceptor.pre_send(device, message).await?;
        }
        Ok(message)
    }

    async fn after_sent(
        &self,
        device: &dyn DeviceOperator,
        message: &DeviceMessage,
        mut replies: Vec<DeviceMessageReply>,
    ) -> Result<Vec<DeviceMessageReply>> {
        for interceptor in &self.interceptors {
            replies = interceptor.after_sent(device, message, replies).await?;
        }
        Ok(replies)
    }
}

enum Slot {
    Empty,
    Single(Arc<dyn DeviceMessageSenderInterceptor>),
    Composite(Vec<Arc<dyn DeviceMessageSenderInterceptor>>),
}

/// Interceptor storage that upgrades from one to many on demand.
pub struct InterceptorChain {
    slot: RwLock<Slot>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot::Empty),
        }
    }

    /// Append an interceptor after any already registered.
    pub fn add(&self, interceptor: Arc<dyn DeviceMessageSenderInterceptor>) {
        let mut slot = self.slot.write();
        *slot = match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Empty => Slot::Single(interceptor),
            Slot::Single(first) => Slot::Composite(vec![first, interceptor]),
            Slot::Composite(mut all) => {
                all.push(interceptor);
                Slot::Composite(all)
            }
        };
    }

    /// The effective interceptor; a no-op when none is registered.
    ///
    /// A composite is snapshotted, so interceptors added afterwards are not
    /// seen by handles already resolved.
    pub fn resolve(&self) -> Arc<dyn DeviceMessageSenderInterceptor> {
        match &*self.slot.read() {
            Slot::Empty => Arc::new(NoopInterceptor),
            Slot::Single(interceptor) => Arc::clone(interceptor),
            Slot::Composite(all) => Arc::new(CompositeInterceptor::new(all.clone())),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.slot.read() {
            Slot::Empty => 0,
            Slot::Single(_) => 1,
            Slot::Composite(all) => all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}
