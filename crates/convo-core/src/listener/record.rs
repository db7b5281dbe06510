use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::listener::identifier::Identifier;

/// Event kind a listener watches. Each kind has its own registry bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerType {
    Message,
    CallbackQuery,
}

/// An inbound event as seen by the listener engine.
pub trait ListenerEvent: Clone + Send + Sync + 'static {
    fn listener_type(&self) -> ListenerType;

    /// Concrete provenance of this event; dimensions it lacks are `Field::Any`.
    fn identifier(&self) -> Identifier;

    /// Interaction id to answer when a button press is refused.
    fn callback_query_id(&self) -> Option<&str> {
        None
    }
}

/// Process-unique listener identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Secondary predicate over the payload, orthogonal to the identifier.
pub type Filter<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// Callback contract for persistent listeners.
///
/// Any `Fn(P) -> impl Future<Output = ()>` closure implements it.
#[async_trait]
pub trait NextStepHandler<P>: Send + Sync {
    async fn handle(&self, payload: P);
}

#[async_trait]
impl<P, F, Fut> NextStepHandler<P> for F
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, payload: P) {
        (self)(payload).await
    }
}

/// What a one-shot waiter receives.
#[derive(Debug)]
pub(crate) enum Delivery<P> {
    Fulfilled(P),
    Stopped,
}

/// Write-once result slot of a one-shot listener.
pub(crate) struct ResultSlot<P> {
    tx: Mutex<Option<oneshot::Sender<Delivery<P>>>>,
}

impl<P> ResultSlot<P> {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Delivery<P>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Writes the slot. Returns `false` if it was already written or the waiter is gone.
    pub(crate) fn resolve(&self, delivery: Delivery<P>) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match tx {
            Some(tx) => tx.send(delivery).is_ok(),
            None => false,
        }
    }

    /// Drops the sender so the waiter wakes up with a closed channel.
    pub(crate) fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .is_some()
    }
}

pub(crate) enum ListenerKind<P> {
    OneShot(ResultSlot<P>),
    Callback(Arc<dyn NextStepHandler<P>>),
}

/// A registered waiter.
pub struct Listener<P> {
    pub(crate) id: ListenerId,
    pub(crate) listener_type: ListenerType,
    pub(crate) identifier: Identifier,
    pub(crate) filter: Option<Filter<P>>,
    pub(crate) unallowed_click_alert: bool,
    pub(crate) kind: ListenerKind<P>,
}

impl<P> Listener<P> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn listener_type(&self) -> ListenerType {
        self.listener_type
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn unallowed_click_alert(&self) -> bool {
        self.unallowed_click_alert
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self.kind, ListenerKind::OneShot(_))
    }

    pub(crate) fn accepts(&self, payload: &P) -> bool {
        self.filter.as_ref().map_or(true, |f| f(payload))
    }
}

impl<P> fmt::Debug for Listener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("listener_type", &self.listener_type)
            .field("identifier", &self.identifier)
            .field("has_filter", &self.filter.is_some())
            .field("unallowed_click_alert", &self.unallowed_click_alert)
            .field("one_shot", &self.is_one_shot())
            .finish()
    }
}
