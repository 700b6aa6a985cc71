use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use crate::broker::event::{BrokerEvent, EventSender};
use crate::broker::inbox::{Inbox, InboxSender};
use crate::broker::message::Message;

pub type ConsumerId = String;

/// User-supplied message handler, invoked synchronously on the consumer's
/// processing loop. Errors and panics are caught and logged; they never
/// terminate the loop.
pub type Handler =
    Box<dyn FnMut(&Message) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Lifecycle of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConsumerState {
    Created = 0,
    Subscribed = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl ConsumerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConsumerState::Created,
            1 => ConsumerState::Subscribed,
            2 => ConsumerState::Running,
            3 => ConsumerState::Stopping,
            _ => ConsumerState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StopSignal {
    Run,
    Stop { drain: bool },
}

/// A message consumer: one bounded inbox plus one processing loop that
/// drains it and runs the registered handler.
///
/// `Consumer` is a cheap cloneable handle; the broker keeps a clone of
/// every consumer it has seen a subscribe for, so that shutdown can stop
/// them all. The processing loop itself is spawned by the broker (at
/// `start`, or at subscribe time if the broker is already running).
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    id: ConsumerId,
    inbox_sender: InboxSender,
    /// Receiver half of the inbox, taken by the processing loop at spawn.
    inbox_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    /// Handler, moved into the processing loop at spawn.
    handler: Mutex<Option<Handler>>,
    subscribed: Mutex<HashSet<String>>,
    state: AtomicU8,
    stop_tx: watch::Sender<StopSignal>,
    stop_rx: watch::Receiver<StopSignal>,
    /// Taken by whoever joins the loop; the abort handle stays usable even
    /// while a join is in flight.
    join: Mutex<Option<JoinHandle<()>>>,
    abort: Mutex<Option<AbortHandle>>,
}

impl Consumer {
    /// Creates a consumer with a bounded inbox of `inbox_capacity` and the
    /// handler its processing loop will invoke for every received message.
    pub fn new(id: impl Into<ConsumerId>, inbox_capacity: usize, handler: Handler) -> Self {
        let inbox = Inbox::new(inbox_capacity);
        let (stop_tx, stop_rx) = watch::channel(StopSignal::Run);
        Self {
            inner: Arc::new(ConsumerInner {
                id: id.into(),
                inbox_sender: inbox.sender(),
                inbox_rx: Mutex::new(Some(inbox.into_receiver())),
                handler: Mutex::new(Some(handler)),
                subscribed: Mutex::new(HashSet::new()),
                state: AtomicU8::new(ConsumerState::Created as u8),
                stop_tx,
                stop_rx,
                join: Mutex::new(None),
                abort: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Names of the topics this consumer is currently subscribed to.
    pub fn subscribed_topics(&self) -> Vec<String> {
        let subs = self.inner.subscribed.lock().unwrap();
        subs.iter().cloned().collect()
    }

    /// Requests a cooperative stop and waits for the processing loop to
    /// finish. With `drain` the loop first processes everything still
    /// buffered in the inbox; without it the buffered messages are
    /// discarded and the discard is reported.
    pub async fn stop(&self, drain: bool) {
        self.request_stop(drain);
        self.wait().await;
    }

    /// Signals the processing loop to stop without waiting for it.
    pub(crate) fn request_stop(&self, drain: bool) {
        self.inner
            .state
            .fetch_max(ConsumerState::Stopping as u8, Ordering::SeqCst);
        let _ = self.inner.stop_tx.send(StopSignal::Stop { drain });
    }

    /// Waits for the processing loop to finish. Returns immediately if it
    /// was never spawned.
    pub(crate) async fn wait(&self) {
        let handle = self.inner.join.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner
            .state
            .store(ConsumerState::Stopped as u8, Ordering::SeqCst);
    }

    /// Forcibly terminates the processing loop. Last resort when the
    /// shutdown budget has run out.
    pub(crate) fn abort(&self) {
        if let Some(abort) = self.inner.abort.lock().unwrap().take() {
            abort.abort();
        }
        self.inner
            .state
            .store(ConsumerState::Stopped as u8, Ordering::SeqCst);
    }

    pub(crate) fn inbox_sender(&self) -> InboxSender {
        self.inner.inbox_sender.clone()
    }

    pub(crate) fn note_subscribed(&self, topic: &str) {
        self.inner
            .subscribed
            .lock()
            .unwrap()
            .insert(topic.to_string());
        self.inner
            .state
            .fetch_max(ConsumerState::Subscribed as u8, Ordering::SeqCst);
    }

    pub(crate) fn note_unsubscribed(&self, topic: &str) {
        self.inner.subscribed.lock().unwrap().remove(topic);
    }

    /// Spawns the processing loop. Idempotent: a second call finds the
    /// inbox receiver already taken and does nothing.
    pub(crate) fn spawn(&self, events: EventSender) {
        let rx = match self.inner.inbox_rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => return,
        };
        let handler = match self.inner.handler.lock().unwrap().take() {
            Some(h) => h,
            None => return,
        };
        let inner = Arc::clone(&self.inner);
        let stop_rx = self.inner.stop_rx.clone();
        let handle = tokio::spawn(async move {
            processing_loop(inner, rx, handler, stop_rx, events).await;
        });
        *self.inner.abort.lock().unwrap() = Some(handle.abort_handle());
        *self.inner.join.lock().unwrap() = Some(handle);
    }
}

/// Blocks on the inbox, runs the handler for each message, and watches the
/// stop signal at every await point so shutdown never has to wait for a
/// timeout to fire.
async fn processing_loop(
    inner: Arc<ConsumerInner>,
    mut rx: mpsc::Receiver<Message>,
    mut handler: Handler,
    mut stop_rx: watch::Receiver<StopSignal>,
    events: EventSender,
) {
    inner
        .state
        .fetch_max(ConsumerState::Running as u8, Ordering::SeqCst);
    info!(consumer = %inner.id, "processing loop started");

    // A stop requested before the loop was spawned is already the current
    // value of the watch and would not show up through `changed`.
    let initial = *stop_rx.borrow_and_update();
    let drain = match initial {
        StopSignal::Stop { drain } => drain,
        StopSignal::Run => loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    if let StopSignal::Stop { drain } = *stop_rx.borrow() {
                        break drain;
                    }
                }
                maybe = rx.recv() => match maybe {
                    Some(msg) => run_handler(&inner, &mut handler, &msg, &events),
                    // Every sender gone means nothing can arrive anymore.
                    None => break true,
                },
            }
        },
    };

    if drain {
        while let Ok(msg) = rx.try_recv() {
            run_handler(&inner, &mut handler, &msg, &events);
        }
    } else {
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(consumer = %inner.id, discarded, "stopped without drain, inbox discarded");
            events.emit(BrokerEvent::MessagesDiscarded {
                consumer_id: inner.id.clone(),
                count: discarded,
            });
        }
    }

    inner
        .state
        .store(ConsumerState::Stopped as u8, Ordering::SeqCst);
    info!(consumer = %inner.id, "processing loop stopped");
}

/// Runs the handler on one message, containing errors and panics so one
/// bad message cannot stop future processing.
fn run_handler(inner: &ConsumerInner, handler: &mut Handler, msg: &Message, events: &EventSender) {
    let outcome = catch_unwind(AssertUnwindSafe(|| handler(msg)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(consumer = %inner.id, message_id = %msg.id, %err, "handler failed");
            events.emit(BrokerEvent::HandlerFailed {
                consumer_id: inner.id.clone(),
                message_id: msg.id,
            });
        }
        Err(_) => {
            error!(consumer = %inner.id, message_id = %msg.id, "handler panicked");
            events.emit(BrokerEvent::HandlerFailed {
                consumer_id: inner.id.clone(),
                message_id: msg.id,
            });
        }
    }
}
