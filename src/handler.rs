//! Event handler registry keyed by event name

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

use crate::{constants::WILDCARD_HANDLER, event::EslEvent};

/// Error a handler may return; it is logged and otherwise ignored.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// Type-erased async handler.
pub type EventHandler = Arc<dyn Fn(Arc<EslEvent>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// What happened to one dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Handlers the event was handed to
    pub invoked: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

/// Shared map from event name to handlers.
///
/// Clones share the same map, so handlers registered after the event loop
/// started are picked up from the next event on. The lock is never held
/// while a handler runs.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type-erased handler for `event_name` (`"*"` for every event)
    pub fn register(&self, event_name: impl Into<String>, handler: EventHandler) {
        let mut map = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(event_name.into())
            .or_default()
            .push(handler);
    }

    /// Register a synchronous handler
    pub fn on<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&EslEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(
            event_name,
            Arc::new(move |event: Arc<EslEvent>| {
                let handler = handler.clone();
                async move { handler(&event) }.boxed()
            }),
        );
    }

    /// Register an async handler.
    ///
    /// The dispatcher awaits it before reading the next event, so a slow
    /// handler slows consumption instead of piling events up in memory.
    pub fn on_async<F, Fut>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(Arc<EslEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(
            event_name,
            Arc::new(move |event: Arc<EslEvent>| handler(event).boxed()),
        );
    }

    /// Register a synchronous handler for every event
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&EslEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(WILDCARD_HANDLER, handler);
    }

    /// Handlers for `event_name` followed by wildcard handlers
    pub fn handlers_for(&self, event_name: &str) -> Vec<EventHandler> {
        let map = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(event_name)
            .into_iter()
            .chain(map.get(WILDCARD_HANDLER))
            .flatten()
            .cloned()
            .collect()
    }

    /// Event names with at least one handler
    pub fn event_names(&self) -> Vec<String> {
        let map = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.keys()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }

    /// Hand `event` to each matching handler in registration order.
    ///
    /// A handler that errors or panics is logged and skipped; the remaining
    /// handlers still run. Events nobody registered for are dropped.
    pub async fn dispatch(&self, event: EslEvent) -> DispatchReport {
        let handlers = self.handlers_for(event.event_name());
        let mut report = DispatchReport::default();
        if handlers.is_empty() {
            return report;
        }

        let event = Arc::new(event);
        for handler in handlers {
            report.invoked += 1;
            let call = AssertUnwindSafe(async { handler(event.clone()).await });
            match call
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!("Handler for {} failed: {}", event.event_name(), e);
                }
                Err(_) => {
                    report.failed += 1;
                    error!("Handler for {} panicked", event.event_name());
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Headers;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn event(name: &str) -> EslEvent {
        let mut headers = Headers::new();
        headers.insert("Event-Name".to_string(), name.to_string());
        EslEvent::new(headers, None).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        registry.on("CHANNEL_ANSWER", move |e| {
            s.lock()
                .unwrap()
                .push(e.event_name().to_string());
            Ok(())
        });

        let report = registry
            .dispatch(event("CHANNEL_CREATE"))
            .await;
        assert_eq!(report.invoked, 0);
        let report = registry
            .dispatch(event("CHANNEL_ANSWER"))
            .await;
        assert_eq!(report.invoked, 1);

        assert_eq!(*seen.lock().unwrap(), vec!["CHANNEL_ANSWER".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_handler_isolated() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        registry.on("HEARTBEAT", |_| Err("boom".into()));
        registry.on("HEARTBEAT", |_| panic!("handler bug"));
        let c = count.clone();
        registry.on("HEARTBEAT", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry
            .dispatch(event("HEARTBEAT"))
            .await;
        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The registry keeps working after a panic
        let report = registry
            .dispatch(event("HEARTBEAT"))
            .await;
        assert_eq!(report.failed, 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wildcard_and_async_handlers() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        registry.on_any(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let c = count.clone();
        registry.on_async("CHANNEL_HANGUP_COMPLETE", move |e| {
            let c = c.clone();
            async move {
                tokio::task::yield_now().await;
                assert_eq!(e.event_name(), "CHANNEL_HANGUP_COMPLETE");
                c.fetch_add(10, Ordering::SeqCst);
                Ok(())
            }
        });

        registry
            .dispatch(event("CHANNEL_HANGUP_COMPLETE"))
            .await;
        registry
            .dispatch(event("CHANNEL_CREATE"))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 12);
        assert_eq!(registry.event_names().len(), 2);
    }
}
