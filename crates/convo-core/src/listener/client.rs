use std::{fmt, ops::Deref, sync::Arc, time::Duration};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::ListenerConfig,
    domain::{MessageRef, Peer},
    listener::{
        identifier::{Field, Identifier},
        record::{
            Delivery, Filter, Listener, ListenerEvent, ListenerId, ListenerKind, ListenerType,
            NextStepHandler, ResultSlot,
        },
        registry::ListenerRegistry,
    },
    messaging::port::MessagingPort,
    Error, Result,
};

/// Entry point of the listener engine: conversational API plus dispatch.
///
/// Cheap to clone; clones share one registry.
pub struct Listeners<P> {
    pub(crate) inner: Arc<ListenersInner<P>>,
}

pub(crate) struct ListenersInner<P> {
    pub(crate) registry: ListenerRegistry<P>,
    pub(crate) messenger: Arc<dyn MessagingPort>,
    pub(crate) cfg: ListenerConfig,
}

impl<P> Clone for Listeners<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// What to listen for and for how long.
///
/// `timeout` and `cancel` only apply to one-shot listeners; persistent
/// handlers ignore them.
pub struct ListenOptions<P> {
    pub identifier: Identifier,
    pub listener_type: ListenerType,
    pub filter: Option<Filter<P>>,
    /// `None` falls back to `ListenerConfig::default_timeout`.
    pub timeout: Option<Duration>,
    /// `None` falls back to `ListenerConfig::unallowed_click_alert`.
    pub unallowed_click_alert: Option<bool>,
    pub cancel: Option<CancellationToken>,
}

impl<P> Default for ListenOptions<P> {
    fn default() -> Self {
        Self {
            identifier: Identifier::any(),
            listener_type: ListenerType::Message,
            filter: None,
            timeout: None,
            unallowed_click_alert: None,
            cancel: None,
        }
    }
}

impl<P> ListenOptions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn chat(mut self, chat: impl Into<Field<Peer>>) -> Self {
        self.identifier = self.identifier.with_chat(chat);
        self
    }

    pub fn user(mut self, user: impl Into<Field<Peer>>) -> Self {
        self.identifier = self.identifier.with_user(user);
        self
    }

    pub fn listener_type(mut self, listener_type: ListenerType) -> Self {
        self.listener_type = listener_type;
        self
    }

    pub fn callback_query(self) -> Self {
        self.listener_type(ListenerType::CallbackQuery)
    }

    pub fn filter(mut self, filter: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn unallowed_click_alert(mut self, enabled: bool) -> Self {
        self.unallowed_click_alert = Some(enabled);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of `ask`: the matching event plus the question that was sent.
#[derive(Clone, Debug)]
pub struct Answer<P> {
    pub payload: P,
    pub sent_message: Option<MessageRef>,
}

impl<P> Answer<P> {
    pub fn into_inner(self) -> P {
        self.payload
    }
}

impl<P> Deref for Answer<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.payload
    }
}

/// A registered one-shot listener whose result has not been awaited yet.
///
/// Dropping it removes the listener from the registry.
pub struct PendingListener<P> {
    id: ListenerId,
    rx: oneshot::Receiver<Delivery<P>>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    inner: Arc<ListenersInner<P>>,
}

impl<P> fmt::Debug for PendingListener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingListener")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P> PendingListener<P> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Suspends until the listener is fulfilled, times out, or is stopped.
    pub async fn wait(mut self) -> Result<P> {
        let timer = sleep_or_forever(self.timeout);
        let cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel {
                Some(token) => token.cancelled_owned().await,
                None => std::future::pending().await,
            }
        };

        let exit = tokio::select! {
            biased;
            delivery = &mut self.rx => return settle(delivery),
            _ = cancelled => WaitExit::Cancelled,
            _ = timer => WaitExit::Timeout,
        };
        self.conclude(exit)
    }

    /// Settles a wait that ended on the timer or the cancel token.
    ///
    /// Whoever removes the record first owns its outcome. If dispatch or
    /// stop already removed it, their delivery is in the channel.
    fn conclude(&mut self, exit: WaitExit) -> Result<P> {
        if !self.inner.registry.remove(self.id) {
            match self.rx.try_recv() {
                Ok(delivery) => return settle(Ok(delivery)),
                Err(oneshot::error::TryRecvError::Closed) => return Err(Error::ListenerStopped),
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }

        match exit {
            WaitExit::Timeout => {
                let timeout = self.timeout.unwrap_or_default();
                debug!(listener = %self.id, ?timeout, "listener timed out");
                Err(Error::ListenerTimeout { timeout })
            }
            WaitExit::Cancelled => {
                debug!(listener = %self.id, "listener cancelled");
                Err(Error::ListenerStopped)
            }
        }
    }
}

enum WaitExit {
    Timeout,
    Cancelled,
}

impl<P> Drop for PendingListener<P> {
    fn drop(&mut self) {
        self.inner.registry.remove(self.id);
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn settle<P>(delivery: std::result::Result<Delivery<P>, oneshot::error::RecvError>) -> Result<P> {
    match delivery {
        Ok(Delivery::Fulfilled(payload)) => Ok(payload),
        Ok(Delivery::Stopped) | Err(_) => Err(Error::ListenerStopped),
    }
}

impl<P: ListenerEvent> Listeners<P> {
    pub fn new(messenger: Arc<dyn MessagingPort>, cfg: ListenerConfig) -> Self {
        Self {
            inner: Arc::new(ListenersInner {
                registry: ListenerRegistry::new(),
                messenger,
                cfg,
            }),
        }
    }

    pub fn registry(&self) -> &ListenerRegistry<P> {
        &self.inner.registry
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.inner.cfg
    }

    pub fn messenger(&self) -> Arc<dyn MessagingPort> {
        self.inner.messenger.clone()
    }

    fn build(&self, opts: &mut ListenOptions<P>, kind: ListenerKind<P>) -> Arc<Listener<P>> {
        Arc::new(Listener {
            id: ListenerId::next(),
            listener_type: opts.listener_type,
            identifier: std::mem::take(&mut opts.identifier),
            filter: opts.filter.take(),
            unallowed_click_alert: opts
                .unallowed_click_alert
                .unwrap_or(self.inner.cfg.unallowed_click_alert),
            kind,
        })
    }

    /// Registers a one-shot listener without waiting on it yet.
    pub fn register_listener(&self, mut opts: ListenOptions<P>) -> PendingListener<P> {
        let (slot, rx) = ResultSlot::new();
        let listener = self.build(&mut opts, ListenerKind::OneShot(slot));
        debug!(listener = %listener.id, kind = ?listener.listener_type, identifier = ?listener.identifier, "one-shot listener registered");
        let id = self.inner.registry.register(listener);

        PendingListener {
            id,
            rx,
            timeout: opts.timeout.or(self.inner.cfg.default_timeout),
            cancel: opts.cancel,
            inner: self.inner.clone(),
        }
    }

    /// Waits for the next event matching `opts`.
    pub async fn listen(&self, opts: ListenOptions<P>) -> Result<P> {
        self.register_listener(opts).wait().await
    }

    /// Sends `text` to the first chat in `chat`, then waits for a reply from any of them.
    ///
    /// The listener is registered before the question goes out so an instant
    /// reply cannot slip past. Whitespace-only `text` sends nothing.
    pub async fn ask(
        &self,
        chat: impl Into<Field<Peer>>,
        text: &str,
        opts: ListenOptions<P>,
    ) -> Result<Answer<P>> {
        let chat = chat.into();
        let target = chat.first().cloned();
        let send = !text.trim().is_empty();
        if send && target.is_none() {
            return Err(Error::InvalidTarget(
                "ask needs a chat to send the question to".to_string(),
            ));
        }

        let pending = self.register_listener(opts.chat(chat));

        let mut sent_message = None;
        if let (true, Some(target)) = (send, target) {
            sent_message = Some(self.inner.messenger.send_text(&target, text).await?);
        }

        let payload = pending.wait().await?;
        Ok(Answer {
            payload,
            sent_message,
        })
    }

    /// Registers a persistent handler that fires on every matching event until stopped.
    pub fn register_next_step_handler(
        &self,
        handler: impl NextStepHandler<P> + 'static,
        mut opts: ListenOptions<P>,
    ) -> ListenerId {
        let listener = self.build(&mut opts, ListenerKind::Callback(Arc::new(handler)));
        debug!(listener = %listener.id, kind = ?listener.listener_type, identifier = ?listener.identifier, "next-step handler registered");
        self.inner.registry.register(listener)
    }

    pub fn get_many_listeners_matching_with_identifier_pattern(
        &self,
        pattern: &Identifier,
        listener_type: ListenerType,
    ) -> Vec<Arc<Listener<P>>> {
        self.inner.registry.find_matching(pattern, listener_type)
    }

    pub fn get_listener_matching_with_identifier_pattern(
        &self,
        pattern: &Identifier,
        listener_type: ListenerType,
    ) -> Option<Arc<Listener<P>>> {
        self.inner.registry.find_first_matching(pattern, listener_type)
    }

    /// Removes a listener without delivering to it. A pending waiter ends
    /// with `ListenerStopped` even while other holders keep the record alive.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner
            .registry
            .remove_with(id, |listener| {
                if let ListenerKind::OneShot(slot) = &listener.kind {
                    slot.close();
                }
            })
            .is_some()
    }

    /// Stops one listener: one-shot waiters resume with `ListenerStopped`,
    /// persistent handlers are dropped without firing.
    pub fn stop_listener(&self, id: ListenerId) -> bool {
        let stopped = self.inner.registry.remove_with(id, |listener| {
            if let ListenerKind::OneShot(slot) = &listener.kind {
                slot.resolve(Delivery::Stopped);
            }
        });
        if stopped.is_some() {
            debug!(listener = %id, "listener stopped");
        }
        stopped.is_some()
    }

    /// Stops every listener of `listener_type` matched by `pattern`. Returns how many.
    pub fn stop_listening(&self, pattern: &Identifier, listener_type: ListenerType) -> usize {
        self.inner
            .registry
            .find_matching(pattern, listener_type)
            .iter()
            .filter(|listener| self.stop_listener(listener.id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::fake::FakeMessenger;
    use crate::messaging::types::{InboundEvent, TextMessage};
    use std::time::Instant;

    fn listeners(messenger: Arc<FakeMessenger>) -> Listeners<InboundEvent> {
        Listeners::new(messenger, ListenerConfig::default())
    }

    fn text(chat: i64, user: i64, body: &str) -> InboundEvent {
        InboundEvent::Message(TextMessage::new(chat, user, 1, body))
    }

    async fn wait_registered(l: &Listeners<InboundEvent>, n: usize) {
        for _ in 0..1000 {
            if l.registry().len(ListenerType::Message) == n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("listener never registered");
    }

    #[tokio::test]
    async fn zero_timeout_yields_timeout_and_cleans_up() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let started = Instant::now();
        let err = l
            .listen(ListenOptions::new().chat(Peer::Id(1)).timeout(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn default_timeout_comes_from_config() {
        let cfg = ListenerConfig {
            default_timeout: Some(Duration::from_millis(10)),
            ..ListenerConfig::default()
        };
        let l: Listeners<InboundEvent> = Listeners::new(Arc::new(FakeMessenger::default()), cfg);
        let err = l.listen(ListenOptions::new()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ListenerTimeout { timeout } if timeout == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn stop_listening_resumes_waiter_with_stopped() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let pending = l.register_listener(
            ListenOptions::new()
                .chat(Peer::Id(5))
                .timeout(Duration::from_secs(30)),
        );

        assert_eq!(
            l.stop_listening(&Identifier::chat(Peer::Id(5)), ListenerType::Message),
            1
        );
        let err = pending.wait().await.unwrap_err();
        assert!(err.is_stopped(), "{err}");
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn stop_listening_without_matches_is_noop() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let _pending = l.register_listener(ListenOptions::new().chat(Peer::Id(5)));
        assert_eq!(
            l.stop_listening(&Identifier::chat(Peer::Id(6)), ListenerType::Message),
            0
        );
        assert_eq!(
            l.stop_listening(&Identifier::chat(Peer::Id(5)), ListenerType::CallbackQuery),
            0
        );
        assert_eq!(l.registry().len(ListenerType::Message), 1);
    }

    #[tokio::test]
    async fn stop_listening_removes_persistent_handlers_without_firing() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = fired.clone();
        l.register_next_step_handler(
            move |_ev: InboundEvent| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            },
            ListenOptions::new().chat(Peer::Id(9)),
        );

        assert_eq!(
            l.stop_listening(&Identifier::chat(Peer::Id(8)), ListenerType::Message),
            0
        );
        assert_eq!(
            l.stop_listening(&Identifier::chat(Peer::Id(9)), ListenerType::Message),
            1
        );
        let report = l.dispatch(&text(9, 1, "hi")).await;
        assert!(!report.is_match());
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_token_stops_waiter_and_removes_listener() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let token = CancellationToken::new();
        let pending = l.register_listener(ListenOptions::new().cancel_on(token.clone()));
        token.cancel();
        let err = pending.wait().await.unwrap_err();
        assert!(err.is_stopped());
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn dropped_listen_future_removes_listener() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let outer = tokio::time::timeout(
            Duration::from_millis(20),
            l.listen(ListenOptions::new().chat(Peer::Id(1))),
        )
        .await;
        assert!(outer.is_err());
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn ask_sends_and_annotates_answer() {
        let messenger = Arc::new(FakeMessenger::default());
        let l = listeners(messenger.clone());

        let asker = l.clone();
        let task = tokio::spawn(async move {
            asker
                .ask(
                    Peer::Id(5),
                    "pick one",
                    ListenOptions::new().timeout(Duration::from_secs(5)),
                )
                .await
        });

        wait_registered(&l, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = l.dispatch(&text(5, 7, "blue")).await;
        assert_eq!(report.fulfilled, 1);

        let answer = task.await.expect("join").expect("answer");
        assert!(matches!(&*answer, InboundEvent::Message(m) if m.text == "blue"));
        let sent = answer.sent_message.expect("sent message");
        assert_eq!(sent.chat_id.0, 5);
        assert_eq!(messenger.sent(), vec![(Peer::Id(5), "pick one".to_string())]);
    }

    #[tokio::test]
    async fn ask_with_many_chats_sends_to_first_and_accepts_any() {
        let messenger = Arc::new(FakeMessenger::default());
        let l = listeners(messenger.clone());

        let asker = l.clone();
        let task = tokio::spawn(async move {
            asker
                .ask(
                    vec![Peer::Id(5), Peer::Id(6)],
                    "anyone?",
                    ListenOptions::new(),
                )
                .await
        });

        wait_registered(&l, 1).await;
        assert!(!l.dispatch(&text(7, 1, "wrong chat")).await.is_match());
        assert_eq!(l.dispatch(&text(6, 1, "me")).await.fulfilled, 1);

        let answer = task.await.expect("join").expect("answer");
        assert!(answer.sent_message.is_some());
        assert_eq!(messenger.sent()[0].0, Peer::Id(5));
    }

    #[tokio::test]
    async fn ask_with_blank_text_only_listens() {
        let messenger = Arc::new(FakeMessenger::default());
        let l = listeners(messenger.clone());

        let asker = l.clone();
        let task = tokio::spawn(async move {
            asker
                .ask(Peer::Id(5), "   ", ListenOptions::new())
                .await
        });

        wait_registered(&l, 1).await;
        l.dispatch(&text(5, 7, "hello")).await;

        let answer = task.await.expect("join").expect("answer");
        assert!(answer.sent_message.is_none());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn ask_send_failure_leaves_no_listener() {
        let l = listeners(Arc::new(FakeMessenger::failing()));
        let err = l
            .ask(Peer::Id(5), "question", ListenOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn ask_without_target_is_rejected() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let err = l
            .ask(Field::Any, "question", ListenOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn remove_listener_closes_waiter() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let pending = l.register_listener(ListenOptions::new());
        assert!(l.remove_listener(pending.id()));
        assert!(!l.remove_listener(pending.id()));
        assert!(pending.wait().await.unwrap_err().is_stopped());
    }

    #[tokio::test]
    async fn remove_listener_wakes_waiter_while_record_is_still_held() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let pending = l.register_listener(
            ListenOptions::new()
                .chat(Peer::Id(3))
                .timeout(Duration::from_secs(5)),
        );
        let held = l.get_many_listeners_matching_with_identifier_pattern(
            &Identifier::chat(Peer::Id(3)),
            ListenerType::Message,
        );
        assert_eq!(held.len(), 1);

        assert!(l.remove_listener(pending.id()));
        let started = Instant::now();
        let err = pending.wait().await.unwrap_err();
        assert!(err.is_stopped(), "{err}");
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(held);
    }

    #[tokio::test]
    async fn delivery_landing_after_the_timer_fired_still_wins() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let mut pending = l.register_listener(
            ListenOptions::new()
                .chat(Peer::Id(1))
                .timeout(Duration::from_millis(10)),
        );

        // The timer arm was chosen, then dispatch removed and fulfilled the record.
        assert_eq!(l.dispatch(&text(1, 2, "late")).await.fulfilled, 1);
        let got = pending.conclude(WaitExit::Timeout).expect("delivery wins");
        assert!(matches!(got, InboundEvent::Message(m) if m.text == "late"));
        assert!(l.registry().is_empty());
    }

    #[tokio::test]
    async fn stop_landing_after_the_timer_fired_reports_stopped() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let mut pending = l.register_listener(ListenOptions::new().timeout(Duration::ZERO));

        assert!(l.stop_listener(pending.id()));
        let err = pending.conclude(WaitExit::Timeout).unwrap_err();
        assert!(err.is_stopped(), "{err}");
        assert!(!l.stop_listener(pending.id()));
    }

    #[tokio::test]
    async fn removal_landing_after_the_timer_fired_reports_stopped() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let mut pending = l.register_listener(ListenOptions::new().timeout(Duration::ZERO));

        assert!(l.remove_listener(pending.id()));
        let err = pending.conclude(WaitExit::Timeout).unwrap_err();
        assert!(err.is_stopped(), "{err}");
    }

    #[tokio::test]
    async fn timer_that_wins_removes_the_record_once() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let mut pending = l.register_listener(ListenOptions::new().timeout(Duration::ZERO));
        let id = pending.id();

        let err = pending.conclude(WaitExit::Timeout).unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(l.registry().is_empty());
        assert!(!l.stop_listener(id));
        assert_eq!(l.dispatch(&text(1, 1, "too late")).await.fulfilled, 0);
    }

    #[tokio::test]
    async fn lookups_by_pattern() {
        let l = listeners(Arc::new(FakeMessenger::default()));
        let a = l.register_listener(ListenOptions::new().chat(Peer::Id(1)));
        let b = l.register_next_step_handler(
            |_ev: InboundEvent| async {},
            ListenOptions::new().chat(Peer::Id(1)).user(Peer::Id(2)),
        );

        let many = l.get_many_listeners_matching_with_identifier_pattern(
            &Identifier::chat(Peer::Id(1)),
            ListenerType::Message,
        );
        assert_eq!(
            many.iter().map(|x| x.id()).collect::<Vec<_>>(),
            vec![a.id(), b]
        );
        let first = l
            .get_listener_matching_with_identifier_pattern(
                &Identifier::user(Peer::Id(2)),
                ListenerType::Message,
            )
            .expect("listener");
        assert_eq!(first.id(), b);
        assert!(!first.is_one_shot());
        assert!(first.unallowed_click_alert());
    }
}
