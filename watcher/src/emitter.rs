//! Listener registry and concurrent event dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{trace, warn};

use crate::event::{Event, EventKind};

/// Receives events of the kinds it was registered for.
///
/// Any `Fn(Event) -> impl Future<Output = anyhow::Result<()>>` is a
/// listener, so plain async functions and closures can be registered
/// directly.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn on_event(&self, event: Event) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Listener for F
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_event(&self, event: Event) -> anyhow::Result<()> {
        (self)(event).await
    }
}

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Listeners the event was dispatched to.
    pub listeners: usize,

    /// Listeners that returned an error or panicked.
    pub failures: usize,
}

/// Per-kind listener lists.
///
/// Listeners accumulate for the emitter's lifetime; there is no
/// de-duplication and no removal.
#[derive(Default)]
pub struct Emitter {
    listeners: RwLock<HashMap<EventKind, Vec<Arc<dyn Listener>>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`.
    pub fn register<L: Listener>(&self, kind: EventKind, listener: L) {
        self.register_shared(kind, Arc::new(listener));
    }

    /// Append an already shared listener for `kind`, e.g. to reuse one
    /// listener for several kinds.
    pub fn register_shared(&self, kind: EventKind, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(listener);
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener for its kind.
    ///
    /// Listeners run concurrently, each on its own task, and this call
    /// returns once all of them have finished. A listener that fails or
    /// panics is logged and counted; it never stops its siblings.
    pub async fn emit(&self, event: &Event) -> Delivery {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        if listeners.is_empty() {
            return Delivery::default();
        }

        trace!(
            "Dispatching {} event for {} to {} listeners",
            event.kind,
            event.id,
            listeners.len()
        );

        let mut delivery = Delivery {
            listeners: listeners.len(),
            failures: 0,
        };

        let mut tasks = JoinSet::new();
        for listener in listeners {
            let event = event.clone();
            tasks.spawn(async move { listener.on_event(event).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    delivery.failures += 1;
                    warn!("Listener for {} event on {} failed: {e:#}", event.kind, event.id);
                }
                Err(e) => {
                    delivery.failures += 1;
                    warn!("Listener for {} event on {} panicked: {e}", event.kind, event.id);
                }
            }
        }

        delivery
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = listeners
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("Emitter").field("listeners", &counts).finish()
    }
}
