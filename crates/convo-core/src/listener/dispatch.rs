use std::sync::Arc;

use tracing::{debug, warn};

use crate::listener::{
    client::Listeners,
    record::{Delivery, Listener, ListenerEvent, ListenerKind, ListenerType},
};

/// What one dispatch pass did with an inbound event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// One-shot listeners resolved with this event.
    pub fulfilled: usize,
    /// Persistent handlers scheduled with this event.
    pub callbacks: usize,
    /// The presser was told the button is not theirs.
    pub alerted: bool,
}

impl DispatchReport {
    /// At least one listener accepted the event.
    pub fn is_match(&self) -> bool {
        self.fulfilled > 0 || self.callbacks > 0
    }

    /// The event was handled here and should not reach the application's own handlers.
    pub fn is_consumed(&self) -> bool {
        self.is_match() || self.alerted
    }
}

/// Persistent handlers matched by one pass, run in registration order.
pub(crate) struct HandlerRun<P> {
    listeners: Listeners<P>,
    matched: Vec<Arc<Listener<P>>>,
    event: P,
}

impl<P: ListenerEvent> HandlerRun<P> {
    pub(crate) fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Invokes each handler still registered when its turn comes. Returns how many ran.
    pub(crate) async fn run(self) -> usize {
        let mut fired = 0;
        for listener in &self.matched {
            if !self.listeners.inner.registry.contains(listener.id) {
                continue;
            }
            if let ListenerKind::Callback(handler) = &listener.kind {
                handler.handle(self.event.clone()).await;
                fired += 1;
            }
        }
        fired
    }
}

impl<P: ListenerEvent> Listeners<P> {
    /// Feeds one inbound event through the listeners registered for its kind.
    ///
    /// One-shot listeners are resolved before this returns. Persistent
    /// handlers run afterwards on their own task, in registration order, so a
    /// handler may `listen` for a reply that the next dispatch delivers.
    pub async fn dispatch(&self, event: &P) -> DispatchReport {
        let (report, handlers) = self.resolve(event).await;
        if !handlers.is_empty() {
            tokio::spawn(handlers.run());
        }
        report
    }

    /// Resolves one-shot listeners for `event` against a snapshot of its
    /// bucket and collects the matching persistent handlers.
    pub(crate) async fn resolve(&self, event: &P) -> (DispatchReport, HandlerRun<P>) {
        let listener_type = event.listener_type();
        let data = event.identifier();
        let registry = &self.inner.registry;

        let mut report = DispatchReport::default();
        let mut refused_click = false;
        let mut matched = Vec::new();

        for listener in registry.snapshot(listener_type) {
            if !listener.identifier.matches(&data) {
                continue;
            }

            if !listener.accepts(event) {
                if listener_type == ListenerType::CallbackQuery && listener.unallowed_click_alert {
                    refused_click = true;
                }
                continue;
            }

            match &listener.kind {
                ListenerKind::OneShot(_) => {
                    let delivered = registry.remove_with(listener.id, |l| match &l.kind {
                        ListenerKind::OneShot(slot) => {
                            slot.resolve(Delivery::Fulfilled(event.clone()))
                        }
                        ListenerKind::Callback(_) => false,
                    });
                    match delivered {
                        Some(true) => {
                            debug!(listener = %listener.id, "one-shot listener fulfilled");
                            report.fulfilled += 1;
                        }
                        Some(false) => {
                            debug!(listener = %listener.id, "one-shot waiter already gone");
                        }
                        None => {}
                    }
                }
                ListenerKind::Callback(_) => {
                    if registry.contains(listener.id) {
                        matched.push(listener.clone());
                    }
                }
            }
        }
        report.callbacks = matched.len();

        if refused_click && !report.is_match() {
            if let Some(callback_id) = event.callback_query_id() {
                let text = &self.inner.cfg.unallowed_click_alert_text;
                match self
                    .inner
                    .messenger
                    .answer_callback_query(callback_id, Some(text.as_str()), true)
                    .await
                {
                    Ok(()) => report.alerted = true,
                    Err(e) => warn!(error = %e, "failed to answer refused button press"),
                }
            }
        }

        let handlers = HandlerRun {
            listeners: self.clone(),
            matched,
            event: event.clone(),
        };
        (report, handlers)
    }
}
