//! Lazily produced capabilities.
//!
//! A [`LazyCapability`] wraps a zero-argument producer returning a future.
//! Each call to [`LazyCapability::resolve`] runs the producer again, so two
//! resolutions may yield different instances. Adapters that want a cached
//! value either register a fixed value or call [`LazyCapability::memoized`].

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Option<T>> + Send + Sync>;

/// A deferred, asynchronously produced capability value.
pub struct LazyCapability<T> {
    producer: Producer<T>,
}

impl<T> Clone for LazyCapability<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for LazyCapability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCapability").finish_non_exhaustive()
    }
}

impl<T> LazyCapability<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap an async producer.
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self {
            producer: Arc::new(move || producer().boxed()),
        }
    }

    /// Always resolves to a clone of `value`.
    pub fn fixed(value: T) -> Self {
        Self {
            producer: Arc::new(move || {
                let value = value.clone();
                async move { Some(value) }.boxed()
            }),
        }
    }

    /// Always resolves to nothing.
    pub fn absent() -> Self {
        Self {
            producer: Arc::new(|| async { None }.boxed()),
        }
    }

    /// Run the producer.
    pub fn resolve(&self) -> BoxFuture<'static, Option<T>> {
        (self.producer)()
    }

    /// Cache the first resolution and hand out clones afterwards.
    pub fn memoized(self) -> Self {
        let cell: Arc<OnceCell<Option<T>>> = Arc::new(OnceCell::new());
        let inner = self.producer;
        Self {
            producer: Arc::new(move || {
                let cell = Arc::clone(&cell);
                let inner = Arc::clone(&inner);
                async move { cell.get_or_init(|| inner()).await.clone() }.boxed()
            }),
        }
    }
}

/// The kinds of per-transport capability a protocol can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    MessageCodec,
    Authenticator,
    ConfigMetadata,
    DefaultMetadata,
    ExpandsConfigMetadata,
    ConnectionHandler,
    Features,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 7] = [
        CapabilityKind::MessageCodec,
        CapabilityKind::Authenticator,
        CapabilityKind::ConfigMetadata,
        CapabilityKind::DefaultMetadata,
        CapabilityKind::ExpandsConfigMetadata,
        CapabilityKind::ConnectionHandler,
        CapabilityKind::Features,
    ];
}
